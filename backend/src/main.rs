use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use ai_chatbot::config::Config;
use ai_chatbot::services::{
    ChatService, ContextRetriever, EmbeddingRetriever, LLMClient, NoopRetriever, OpenAIClient,
};
use ai_chatbot::utils::{init_logging, with_startup_logging};
use ai_chatbot::{AppState, build_router};

#[derive(Debug, Parser)]
#[command(name = "ai-chatbot", version, about = "AI chatbot HTTP backend")]
struct Args {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Listen host, overrides config and environment
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides config and environment
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = with_startup_logging(|| Config::load(args.config.as_deref()))
        .context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _log_guard = init_logging(&config.logging);

    tracing::info!(
        "Starting {} ({}) with model {}",
        config.app.name,
        config.app.environment,
        config.llm.chat_model
    );

    let client: Arc<dyn LLMClient> = Arc::new(
        OpenAIClient::new(&config.llm).context("Failed to create LLM client")?,
    );

    let retriever: Arc<dyn ContextRetriever> =
        match EmbeddingRetriever::from_config(client.clone(), &config.retrieval).await {
            Ok(retriever) => Arc::new(retriever),
            Err(e) => {
                tracing::warn!("Retrieval index unavailable, RAG requests get no context: {}", e);
                Arc::new(NoopRetriever)
            },
        };

    let chat_service = Arc::new(ChatService::new(client, retriever));
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = Arc::new(AppState { chat_service });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API docs at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
