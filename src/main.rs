use anyhow::Context;

use contact_intake::configuration::get_configuration;
use contact_intake::startup::Application;
use contact_intake::telemetry::{get_subscriber, initialize_subscriber};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("contact-intake".into(), "info".into(), std::io::stdout);
    initialize_subscriber(subscriber);

    let configuration = get_configuration().context("Failed to read configuration")?;
    let application = Application::build(&configuration)
        .await
        .context("Failed to build the application")?;

    tracing::info!(port = application.port(), "Listening for contact submissions");
    application.run_until_stopped().await?;

    Ok(())
}
