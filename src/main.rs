mod config;
mod enrich;
mod error;
mod query;
mod server;
mod session;
mod speech;
mod store;
mod tools;
mod types;

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;
use tracing::info;

use crate::config::Config;
use crate::speech::Transcriber;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storyshare=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--export") {
        return run_export(&config);
    }

    run_mcp_server(config).await
}

async fn run_mcp_server(config: Config) -> Result<()> {
    let store = store::Store::init(&config)?;
    let enricher = enrich::Enricher::from_config(&config);
    let transcriber: Option<Arc<dyn Transcriber>> = match config.speech_api_key.as_deref() {
        Some(key) => Some(Arc::new(speech::GoogleSpeech::new(key))),
        None => {
            info!("GOOGLE_SPEECH_API_KEY not set, audio stories need typed text");
            None
        }
    };

    let server = server::StoryServer::new(config, store, enricher, transcriber);

    let transport = rmcp::transport::io::stdio();
    info!("starting storyshare MCP server (stdio)");

    let service = server.serve(transport).await
        .map_err(|e| anyhow::anyhow!("MCP server failed: {}", e))?;

    let _ = service.waiting().await;
    Ok(())
}

fn run_export(config: &Config) -> Result<()> {
    let store = store::Store::init(config)?;
    let export = store.export_data(chrono::Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&export)?);
    info!("exported data from {}", config.data_dir.display());
    Ok(())
}
