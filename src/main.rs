use eyre::Result;
use soundnet::config::AppConfig;
use soundnet::server::ScopeServer;

pub fn build_logger() -> Result<()> {
    // Create an env filter that defaults to "info" level if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize logger: {}", e))?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    build_logger()?;
    tracing::info!("SoundNet version: {}", env!("CARGO_PKG_VERSION"));

    let config_path =
        std::env::var("SOUNDNET_CONFIG").unwrap_or_else(|_| "soundnet.toml".to_string());
    let config = AppConfig::load_or_default(&config_path)?;

    let bind_addr = config.server.bind_addr()?;
    let server = ScopeServer::new(bind_addr, config.encoder);
    server.run().await
}
