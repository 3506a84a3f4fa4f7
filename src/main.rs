use std::sync::Arc;

use anyhow::Context;
use ephemeral_rooms::{
    app,
    clock::SystemClock,
    config::Config,
    password::CredentialHasher,
    storage::{MemoryStorage, Storage},
    sweeper::Sweeper,
    AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ephemeral_rooms=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().context("load config")?;
    tracing::debug!(?config, "config loaded");

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new(Arc::new(SystemClock), config.max_message_chars));
    let sweeper = Sweeper::new(storage.clone(), config.sweep_interval).spawn();

    let app = app(AppState::new(&config, storage, CredentialHasher::default()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("serve")?;

    sweeper.stop().await;
    tracing::info!("shut down");
    Ok(())
}
