//! Main Entrypoint for the Skill Bridge API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the agent table.
//! 3. Initializing the backend and QR code clients and the skill pipeline.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use skillbridge_api::{config::Config, router::create_router, state::AppState};
use skillbridge_core::{
    agent::AgentRegistry,
    chatbot_client::{ChatbotClient, HttpChatbotClient},
    pipeline::{PipelineOptions, SkillPipeline},
    qrcode::{HttpQrCodeProvider, QrCodeProvider},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Agent Table ---
    let registry = Arc::new(AgentRegistry::from_file(&config.agents_path)?);
    if registry.is_empty() {
        error!(path = %config.agents_path.display(), "Agent table is empty; every request will run without an agent");
    }
    info!(agents = registry.len(), "Agent table loaded.");

    // --- 4. Initialize Shared Services ---
    let chatbot: Arc<dyn ChatbotClient> = Arc::new(
        HttpChatbotClient::new(
            config.chatbot_url.clone(),
            config.source.clone(),
            config.http_timeout,
        )
        .context("Failed to build chatbot client")?,
    );
    let qrcode: Arc<dyn QrCodeProvider> = Arc::new(
        HttpQrCodeProvider::new(
            config.wechat_url.clone(),
            config.source.clone(),
            config.http_timeout,
        )
        .context("Failed to build QR code client")?,
    );

    let pipeline = Arc::new(SkillPipeline::new(
        registry,
        chatbot,
        qrcode,
        PipelineOptions {
            mode: config.response_mode,
            user_id_prefix: config.user_id_prefix.clone(),
            strict_registry: config.strict_agent_registry,
        },
    ));

    let app_state = Arc::new(AppState { pipeline });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // --- 6. Start Server ---
    info!(
        response_mode = %config.response_mode,
        chatbot_url = %config.chatbot_url,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
