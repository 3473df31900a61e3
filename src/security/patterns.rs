//! Pattern catalog.
//!
//! # Responsibilities
//! - Hold the named detector patterns, grouped by threat category
//! - Preserve declaration order (categories and patterns within them)
//!
//! # Design Decisions
//! - Immutable once built; shared read-only by every request
//! - All patterns are compiled case-insensitive
//! - Scanner signatures only ever look at the User-Agent header
//! - Pattern ids are operator-facing only and never sent to clients

use regex::{Regex, RegexBuilder};

use crate::security::types::ThreatCategory;

/// Which part of the request a pattern is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTarget {
    /// Path, body, query, user agent and referer joined together.
    Combined,
    /// The `User-Agent` header alone.
    UserAgent,
}

/// Static definition of a pattern, compiled by [`PatternCatalog::from_definitions`].
#[derive(Debug, Clone, Copy)]
pub struct PatternDefinition {
    pub category: ThreatCategory,
    pub id: &'static str,
    pub target: ScanTarget,
    pub pattern: &'static str,
}

const fn def(
    category: ThreatCategory,
    id: &'static str,
    target: ScanTarget,
    pattern: &'static str,
) -> PatternDefinition {
    PatternDefinition { category, id, target, pattern }
}

use ScanTarget::{Combined, UserAgent};
use ThreatCategory::{PathTraversal, ScannerSignature, SqlInjection, Xss};

/// Built-in detector set.
pub const BUILTIN_PATTERNS: &[PatternDefinition] = &[
    // SQL injection
    def(SqlInjection, "sqli.union-select", Combined, r"\bunion\b(?:\s+all)?\s+select\b"),
    def(SqlInjection, "sqli.select-from", Combined, r"\bselect\b.+\bfrom\b"),
    def(SqlInjection, "sqli.drop-table", Combined, r"\bdrop\s+table\b"),
    def(SqlInjection, "sqli.insert-into", Combined, r"\binsert\s+into\b"),
    def(SqlInjection, "sqli.tautology", Combined, r#"\bor\b\s+['"]?\d+['"]?\s*=\s*['"]?\d+"#),
    def(SqlInjection, "sqli.quoted-or", Combined, r#"['"]\s*or\s+['"]"#),
    def(SqlInjection, "sqli.comment-terminator", Combined, r#"['"]\s*(?:--|#|/\*)"#),
    def(SqlInjection, "sqli.time-delay", Combined, r"\bwaitfor\s+delay\b|\bpg_sleep\s*\(|\bbenchmark\s*\("),
    // Cross-site scripting
    def(Xss, "xss.script-tag", Combined, r"<\s*script\b"),
    def(Xss, "xss.javascript-uri", Combined, r"javascript\s*:"),
    def(
        Xss,
        "xss.inline-handler",
        Combined,
        r"\bon(?:load|error|click|dblclick|mouse\w+|focus|blur|key\w+|submit|change|input)\s*=",
    ),
    def(Xss, "xss.iframe", Combined, r"<\s*iframe\b"),
    def(Xss, "xss.eval", Combined, r"\beval\s*\("),
    def(Xss, "xss.alert", Combined, r"\balert\s*\("),
    // Directory traversal
    def(PathTraversal, "traversal.dot-dot-slash", Combined, r"\.\./"),
    def(PathTraversal, "traversal.dot-dot-backslash", Combined, r"\.\.\\"),
    def(PathTraversal, "traversal.encoded", Combined, r"%2e%2e(?:%2f|%5c|/|\\)|\.\.%2f|\.\.%5c"),
    def(PathTraversal, "traversal.double-encoded", Combined, r"%252e%252e"),
    def(PathTraversal, "traversal.etc-passwd", Combined, r"/etc/(?:passwd|shadow)\b"),
    def(PathTraversal, "traversal.windows-system", Combined, r"[\\/]windows[\\/]system32\b"),
    def(PathTraversal, "traversal.proc-self", Combined, r"/proc/self/"),
    // Scanner tooling
    def(
        ScannerSignature,
        "scanner.user-agent",
        UserAgent,
        r"\b(?:sqlmap|nikto|nmap|masscan|acunetix|burp\s*suite|burpcollaborator|wpscan|dirbuster|gobuster|nuclei|zgrab|w3af|havij)\b",
    ),
];

/// A compiled detector pattern.
#[derive(Debug)]
pub struct DetectorPattern {
    id: &'static str,
    target: ScanTarget,
    regex: Regex,
}

impl DetectorPattern {
    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn target(&self) -> ScanTarget {
        self.target
    }

    /// Test the pattern against the combined buffer or the user agent.
    pub fn is_match(&self, combined: &str, user_agent: &str) -> bool {
        match self.target {
            ScanTarget::Combined => self.regex.is_match(combined),
            ScanTarget::UserAgent => self.regex.is_match(user_agent),
        }
    }
}

/// The patterns of a single category, in declaration order.
#[derive(Debug)]
pub struct PatternGroup {
    pub category: ThreatCategory,
    pub patterns: Vec<DetectorPattern>,
}

/// Immutable, ordered set of detector patterns.
#[derive(Debug)]
pub struct PatternCatalog {
    groups: Vec<PatternGroup>,
}

impl PatternCatalog {
    /// Compile the built-in catalog.
    pub fn builtin() -> Result<Self, regex::Error> {
        Self::from_definitions(BUILTIN_PATTERNS)
    }

    /// Compile a catalog from definitions.
    ///
    /// Categories are ordered by their first appearance.
    pub fn from_definitions(definitions: &[PatternDefinition]) -> Result<Self, regex::Error> {
        let mut groups: Vec<PatternGroup> = Vec::new();

        for definition in definitions {
            let regex = RegexBuilder::new(definition.pattern)
                .case_insensitive(true)
                .build()?;
            let compiled = DetectorPattern {
                id: definition.id,
                target: definition.target,
                regex,
            };

            match groups.iter_mut().find(|g| g.category == definition.category) {
                Some(group) => group.patterns.push(compiled),
                None => groups.push(PatternGroup {
                    category: definition.category,
                    patterns: vec![compiled],
                }),
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[PatternGroup] {
        &self.groups
    }

    /// Total number of patterns across all categories.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.patterns.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
