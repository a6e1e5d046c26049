//! `tandem-server`: runs the relay with settings from the environment.

use tandem::{ServerConfig, TandemServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = TandemServer::builder().config(&config).build().await?;
    tracing::info!(
        addr = %server.local_addr()?,
        path = config.path.as_deref().unwrap_or("*"),
        origins = ?config.allowed_origins,
        "starting tandem relay"
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
