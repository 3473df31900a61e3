//! Request classification against the pattern catalog.

use axum::body::Bytes;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::borrow::Cow;

use crate::security::patterns::PatternCatalog;
use crate::security::types::{ShieldResult, ThreatCategory};

/// Read-only projection of an inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestView {
    /// Source identity (client address).
    pub source: String,
    pub method: String,
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub body: Option<Bytes>,
}

impl RequestView {
    pub fn new(source: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Body as text. Invalid UTF-8 sequences are replaced, never rejected.
    pub fn body_text(&self) -> Cow<'_, str> {
        match &self.body {
            Some(body) => String::from_utf8_lossy(body),
            None => Cow::Borrowed(""),
        }
    }

    /// Build the buffer the combined patterns run against:
    /// path (raw, then percent-decoded), body (raw, then form-decoded),
    /// query (raw, then form-decoded), user agent, referer.
    pub fn scan_buffer(&self) -> String {
        let decoded_path = percent_decode_str(&self.path).decode_utf8_lossy();
        let body = self.body_text();
        let decoded_body = form_decode(&body);
        let query = self.query.as_deref().unwrap_or("");
        let decoded_query = form_decode(query);

        [
            self.path.as_str(),
            &*decoded_path,
            &*body,
            decoded_body.as_str(),
            query,
            decoded_query.as_str(),
            self.user_agent.as_deref().unwrap_or(""),
            self.referer.as_deref().unwrap_or(""),
        ]
        .join(" ")
    }
}

/// `application/x-www-form-urlencoded` decoding, pairs rejoined with `&`.
fn form_decode(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| {
            if v.is_empty() {
                k.into_owned()
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// One category detected in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatMatch {
    pub category: ThreatCategory,
    /// Catalog id of the first pattern that fired. Never shown to clients.
    pub pattern_id: String,
}

/// Detects threats in a request.
pub trait ThreatClassifier: Send + Sync {
    /// Zero or more matches, at most one per category, in catalog order.
    fn classify(&self, view: &RequestView) -> ShieldResult<Vec<ThreatMatch>>;
}

/// Classifier backed by a [`PatternCatalog`].
#[derive(Debug)]
pub struct PatternClassifier {
    catalog: PatternCatalog,
}

impl PatternClassifier {
    pub fn new(catalog: PatternCatalog) -> Self {
        Self { catalog }
    }

    pub fn builtin() -> Result<Self, regex::Error> {
        Ok(Self::new(PatternCatalog::builtin()?))
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }
}

impl ThreatClassifier for PatternClassifier {
    fn classify(&self, view: &RequestView) -> ShieldResult<Vec<ThreatMatch>> {
        let buffer = view.scan_buffer();
        let user_agent = view.user_agent.as_deref().unwrap_or("");

        let matches = self
            .catalog
            .groups()
            .iter()
            .filter_map(|group| {
                group
                    .patterns
                    .iter()
                    .find(|p| p.is_match(&buffer, user_agent))
                    .map(|p| ThreatMatch {
                        category: group.category,
                        pattern_id: p.id().to_string(),
                    })
            })
            .collect();

        Ok(matches)
    }
}
