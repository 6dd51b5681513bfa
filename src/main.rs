use std::net::SocketAddr;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use surooh::config::SuroohConfig;
use surooh::llm::create_provider;
use surooh::server::{AppState, api_routes};
use surooh::store::open_store;

/// Console logging, plus a daily log file when `SUROOH_LOG_DIR` is set.
fn init_tracing(config: &SuroohConfig) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(filter());

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "surooh.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            tracing_subscriber::registry().with(console).with(file).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage. A second install
    // (already set by a dependency) is harmless.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = SuroohConfig::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(&config);

    eprintln!("🤖 سُروح v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config.store)
        .await
        .context("failed to open document store")?;
    eprintln!("   Storage: {}", store.backend_name());

    let llm = match &config.llm {
        Some(llm_config) => {
            let provider = create_provider(llm_config).context("failed to create LLM provider")?;
            eprintln!("   Model: {}", provider.model_name());
            Some(provider)
        }
        None => {
            eprintln!("   Model: none (brain disabled, complex messages get an apology)");
            None
        }
    };
    eprintln!(
        "   Gmail: {}",
        if config.gmail.is_some() { "enabled" } else { "disabled" }
    );
    eprintln!(
        "   GitHub: {}",
        config
            .github
            .as_ref()
            .map_or("disabled".to_string(), |g| g.repo.clone())
    );

    let state = AppState::new(&config, store, llm).context("failed to build application state")?;
    let app = api_routes(state);

    let addr = SocketAddr::new(config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    eprintln!("   API: http://{addr}\n");
    tracing::info!(%addr, "Surooh server started");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
