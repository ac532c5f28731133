//! Entry point for the saved-query notifier.
//! One invocation performs one run over every stored query and exits; an
//! external scheduler provides the periodic trigger.

use std::sync::Arc;

use anyhow::Context;
use notification_services::{NotificationService, SesSettings};
use opportunity_scan::{
    LogOnlySender, NotificationDispatcher, NotificationSender, PgQueryStore, SamGovClient,
    UrlWindowRewriter,
};
use postgres::database::*;

/// Environment-driven configuration
mod config;
use config::NotifierConfig;

async fn build_sender(config: &NotifierConfig) -> anyhow::Result<Arc<dyn NotificationSender>> {
    if config.dry_run {
        log::warn!("🔧 DRY_RUN is set, digests will be logged instead of emailed");
        return Ok(Arc::new(LogOnlySender));
    }

    let settings = SesSettings {
        from_email: config.sender_email.clone().unwrap_or_default(),
        region: config.aws_region.clone(),
        endpoint_url: config.aws_endpoint.clone(),
    };
    let service = NotificationService::new(settings)
        .await
        .context("failed to initialize notification service")?;
    log::info!(
        "📧 Notification service initialized, sending as {}",
        service.from_email()
    );

    Ok(Arc::new(service))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting saved-query notifier run...");

    let config = NotifierConfig::from_env().context("invalid configuration")?;

    let pool = create_connection_pool(&config.database_url)
        .await
        .context("failed to create database pool")?;
    log::info!("🗃️ Database pool created successfully");
    if let Err(e) = test_connection(&pool).await {
        log::error!("❌ Database connection test failed: {}", e);
    }

    let store = PgQueryStore::new(pool, config.table.clone(), config.scan_page_size)
        .context("invalid saved-query table")?;
    log::info!("📋 Reading saved queries from {}", store.table());

    let sam_gov = Arc::new(
        SamGovClient::new(config.detail_base_url.clone())
            .context("failed to create SAM.gov client")?,
    );
    let sender = build_sender(&config).await?;

    let dispatcher = NotificationDispatcher::new(
        Arc::new(store),
        sam_gov.clone(),
        sam_gov,
        sender,
        UrlWindowRewriter::new(config.time_zone),
    );

    let summary = dispatcher.run().await.context("notification run aborted")?;

    if summary.errored > 0 {
        log::warn!(
            "⚠️ {} of {} saved queries failed this run and will be retried next run",
            summary.errored,
            summary.queries
        );
    }
    log::info!(
        "✅ Run complete: {} digests sent covering {} new results",
        summary.delivered,
        summary.results_notified
    );

    Ok(())
}
