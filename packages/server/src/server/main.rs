// Main entry point for the engagement server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server_core::config::Config;
use server_core::kernel::sms::TwilioOptions;
use server_core::kernel::{
    LoggingReportService, OpenAIClassifier, ServerKernel, TwilioSmsService,
};
use server_core::server::build_app;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Daily Signal engagement server");

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let sms = Arc::new(TwilioSmsService::new(TwilioOptions {
        account_sid: config.twilio_account_sid.clone(),
        auth_token: config.twilio_auth_token.clone(),
        from_number: config.twilio_from_number.clone(),
    }));
    let classifier = Arc::new(OpenAIClassifier::new(
        &config.openai_api_key,
        Duration::from_secs(config.classifier_timeout_secs),
    ));
    let kernel = Arc::new(ServerKernel::new(
        pool,
        sms,
        classifier,
        Arc::new(LoggingReportService),
    ));

    let app = build_app(kernel, config.dispatch_auth_token.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
