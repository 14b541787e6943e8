//! gemini-relay: streaming Gemini prompt relay.
//!
//! Relays `/chat` and `/vision` prompts to the Gemini streaming API and
//! forwards the output as newline-delimited plain text.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use gemini_relay::config::{ApiKey, Cli, Config};
use gemini_relay::gemini::GeminiClient;
use gemini_relay::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "gemini_relay=debug,tower_http=debug"
    } else {
        "gemini_relay=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("gemini-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);
    let config = Arc::new(config);

    info!(
        model = config.model.name,
        base_url = config.model.base_url,
        vision_mime_type = config.vision.mime_type,
        trust_upload_content_type = config.vision.trust_upload_content_type,
        max_body_bytes = config.server.max_body_bytes,
        "Configuration loaded"
    );

    // The credential is resolved once and never changes afterwards.
    let api_key = ApiKey::from_cli(&cli)?;
    let client = GeminiClient::new(api_key, &config.model)?;

    let state = Arc::new(AppState::new(Arc::new(client), config.clone())?);

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
