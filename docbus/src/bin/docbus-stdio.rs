//! Serves the store endpoints over stdin/stdout against ArangoDB.
//!
//! ```text
//! docbus-stdio --config docbus.toml < requests.jsonl
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{BufReader, BufWriter};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docbus::{arangodb::ArangoConnector, config::ServiceConfig, service::StoreService, stdio};

#[derive(Parser, Debug)]
#[command(name = "docbus-stdio", version, about = "Document store endpoints over line-delimited JSON")]
struct Cli {
    /// Path to the TOML service configuration; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServiceConfig::default(),
    };

    let connector = ArangoConnector::new().context("creating http client")?;
    let service = StoreService::from_config(&config, connector);
    info!(
        topic = %config.topic,
        url = %config.arango.url,
        default_database = %config.default_database(),
        "docbus stdio host started"
    );

    stdio::serve(
        &service,
        BufReader::new(tokio::io::stdin()),
        BufWriter::new(tokio::io::stdout()),
    )
    .await?;

    Ok(())
}
