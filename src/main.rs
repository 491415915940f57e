use std::error::Error;

use log::*;
use service::{config::Config, logging::Logger};
use web::{AppState, Registry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::new();
    Logger::init_logger(&config)?;

    info!("Starting external auth drivers on {}", config.public_base_url());

    let registry = Registry::from_config(&config)?;
    if registry.names().is_empty() {
        warn!("No identity provider credentials configured, every login route answers 404");
    }

    let app_state = AppState::new(config, registry);
    web::init_server(app_state).await?;

    Ok(())
}
