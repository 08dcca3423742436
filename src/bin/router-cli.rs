use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use sequencer_router::config::{load_config, ProxyConfig};
use sequencer_router::routing::Classifier;

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Management CLI for the sequencer router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check router status
    Status,
    /// Show the live registry snapshot
    Registry,
    /// Ask the router where a request would go
    Route {
        #[arg(short, long, default_value = "GET")]
        method: String,
        path: String,
    },
    /// Classify a request locally, without contacting the router
    Classify {
        #[arg(short, long, default_value = "POST")]
        method: String,
        #[arg(default_value = "/rpc")]
        path: String,
        /// Request body, e.g. a JSON-RPC envelope
        #[arg(short, long)]
        body: Option<String>,
        /// Treat the request as a WebSocket upgrade
        #[arg(long)]
        websocket: bool,
        /// Use the classifier settings from this config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
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

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Registry => {
            let res = client.get(format!("{}/admin/registry", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Route { method, path } => {
            let res = client.get(format!("{}/admin/route", cli.url))
                .query(&[("method", method.as_str()), ("path", path.as_str())])
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Classify { method, path, body, websocket, config } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => ProxyConfig::default(),
            };
            let classifier = Classifier::from_config(
                &config.classifier,
                Duration::from_millis(config.timeouts.body_read_ms),
            );

            let method = axum::http::Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut request_headers = axum::http::HeaderMap::new();
            if websocket {
                request_headers.insert("connection", axum::http::HeaderValue::from_static("upgrade"));
                request_headers.insert("upgrade", axum::http::HeaderValue::from_static("websocket"));
            }
            let result = classifier.classify(&method, &path, &request_headers, body.as_deref().map(str::as_bytes));
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
