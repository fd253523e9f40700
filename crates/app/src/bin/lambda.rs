//! Chatline API - AWS Lambda Runtime

use lambda_http::{run, Error};
use tracing::info;

use chatline_app::{create_app, with_layers};
use chatline_common::Config;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .without_time()
        .init();

    info!("Initializing Chatline API Lambda");

    let config =
        Config::from_env().map_err(|e| Error::from(format!("Configuration error: {}", e)))?;

    // Shared state lives for the warm instance and is reused across invocations
    let app = create_app()
        .await
        .map_err(|e| Error::from(format!("App initialization error: {}", e)))?;

    let app = with_layers(app, &config);

    info!("Chatline API Lambda ready to serve requests");

    run(app).await
}
