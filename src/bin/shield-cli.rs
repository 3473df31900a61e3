use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "shield-cli")]
#[command(about = "Management CLI for the request shield", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check shield status
    Status,
    /// Summarize recent security events
    Stats {
        /// Summary window in milliseconds (server default when omitted)
        #[arg(long)]
        window_ms: Option<u64>,
    },
    /// List the most recent security events
    Events {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// List currently blocked sources
    Blocked,
    /// Wipe events, blocks and rate counters
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Stats { window_ms } => {
            let request = client.get(format!("{}/admin/stats", base));
            match window_ms {
                Some(window_ms) => request.query(&[("window_ms", window_ms)]),
                None => request,
            }
        }
        Commands::Events { limit } => client
            .get(format!("{}/admin/events", base))
            .query(&[("limit", limit)]),
        Commands::Blocked => client.get(format!("{}/admin/blocked", base)),
        Commands::Clear => client.post(format!("{}/admin/clear", base)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
