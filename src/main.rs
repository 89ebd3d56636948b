use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::Mutex;

use astro_guide::cli::CliRunner;
use astro_guide::config::GuideConfig;
use astro_guide::llm::{LlmConfig, create_provider};
use astro_guide::session::{GuideSession, SessionRouteState, session_routes};
use astro_guide::stages::{GeneratorConfig, StageGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = GuideConfig::from_env()?;

    // Read API key from environment
    let key_var = config.api_key_var();
    let api_key = std::env::var(key_var).unwrap_or_else(|_| {
        eprintln!("Error: {} not set", key_var);
        eprintln!("  export {}=...", key_var);
        std::process::exit(1);
    });

    eprintln!("🔮 Astro Guide v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {} ({})", config.backend, config.model);
    if let Some(port) = config.port {
        eprintln!("   Session API: http://0.0.0.0:{}/api/session", port);
    }
    eprintln!("   Answer each question and press Enter. /help for commands, /quit to exit.\n");

    let llm = create_provider(&LlmConfig {
        backend: config.backend,
        api_key: SecretString::from(api_key),
        model: config.model.clone(),
    })?;
    let generator = Arc::new(StageGenerator::new(llm, GeneratorConfig::from(&config)));
    let session = Arc::new(Mutex::new(GuideSession::new(generator, config.settle_delay)));

    // Optional REST surface over the same session
    if let Some(port) = config.port {
        let app = session_routes(SessionRouteState {
            session: Arc::clone(&session),
        });
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(port, error = %e, "Failed to bind session API port");
                    return;
                }
            };
            tracing::info!(port, "Session API started");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Session API stopped");
            }
        });
    }

    CliRunner::new(session, config.caption_interval).run().await;
    Ok(())
}
