//! Courier relay entry point.

use courier_relay::bootstrap;
use courier_relay::config::AppConfig;
use courier_relay::error::AppError;
use courier_relay::telemetry;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Courier relay");

    let result = bootstrap::run(config).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "relay failed");
    }

    telemetry.shutdown();
    result
}
