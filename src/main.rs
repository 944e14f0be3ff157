use newsletter_api::configuration::get_configuration;
use newsletter_api::startup::Application;
use newsletter_api::telemetry::get_subscriber;
use newsletter_api::telemetry::init_subscriber;

/// Initialise telemetry, load config, and serve until the server stops.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("newsletter-api", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    let cfg = get_configuration()?;
    let app = Application::build(cfg).await?;
    if let Err(e) = app.run_until_stopped().await {
        tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "API failed"
        );
        return Err(e.into());
    }
    tracing::info!("API exited gracefully");
    Ok(())
}
