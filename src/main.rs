use anyhow::Context;
use paykit::chains::tron::TronPaymentProvider;
use paykit::config::AppConfig;
use paykit::logging::{init_tracing, mask_address};
use paykit::payments::fulfillment::ChannelFulfillmentSink;
use paykit::payments::PaymentRegistry;
use paykit::services::exchange_rate::{ExchangeRateService, RateRefreshJob};
use paykit::services::rate_providers::OpenErApiProvider;
use paykit::workers::scheduler::{Scheduler, TokioScheduler};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping providers");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.logging);
    config.validate().context("invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        network = config.tron.network_name(),
        address = %mask_address(&config.tron.address),
        "Starting paykit"
    );

    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::default());

    let rate_provider = OpenErApiProvider::new(
        &config.exchange_rate.api_url,
        config.exchange_rate.request_timeout,
    )
    .context("failed to build exchange rate provider")?;
    let rates = Arc::new(ExchangeRateService::new(
        Arc::new(rate_provider),
        config.exchange_rate.service_config(),
    ));
    match rates.refresh().await {
        Ok(count) => info!(rates = count, "Initial exchange rates loaded"),
        Err(e) => warn!(
            error = %e,
            "Initial exchange rate fetch failed; orders fail until a refresh succeeds"
        ),
    }
    // The first refresh already ran above.
    let rate_job = TokioScheduler::new(false).schedule(
        config.exchange_rate.refresh_interval,
        Box::new(RateRefreshJob::new(rates.clone())),
    );

    let (sink, mut fulfilled) = ChannelFulfillmentSink::new();
    let tron = TronPaymentProvider::new(
        "tron",
        config.tron.clone(),
        rates.clone(),
        scheduler.clone(),
        Arc::new(sink),
    )
    .context("failed to build tron provider")?;
    tron.start();

    let registry = PaymentRegistry::new();
    registry.add_or_update(Arc::new(tron)).await;

    let fulfillment_task = tokio::spawn(async move {
        while let Some(out_trade_no) = fulfilled.recv().await {
            info!(out_trade_no = %out_trade_no, "Order fulfilled");
        }
    });

    for (payment_key, provider) in registry.list() {
        info!(payment_key = %payment_key, provider = %provider, "Provider ready");
    }

    shutdown_signal().await;

    registry.stop_all().await;
    rate_job.stop().await;
    // Every sink clone is gone once the providers are dropped, which closes the channel.
    drop(registry);
    if let Err(e) = fulfillment_task.await {
        error!(error = %e, "Fulfillment task ended abnormally");
    }

    info!("Shutdown complete");
    Ok(())
}
