use tracing_subscriber::EnvFilter;
use uplink_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (database, storage, routes)
    let (_state, router) = uplink_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    uplink_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
