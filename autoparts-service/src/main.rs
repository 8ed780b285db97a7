use autoparts_service::{config::ServiceConfig, services, startup::Application};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = ServiceConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting auto-parts service"
    );

    let app = Application::build(config).await?;
    app.run_until_stopped().await?;

    Ok(())
}
