//! Application startup and orchestration
//!
//! Resolves settings, starts logging, runs the order services on one shared
//! queue and shuts everything down in order: services first, then the
//! consumer (waiting for in-flight handlers), then the queue.

use super::cli::args::Args;
use super::cli::config::Settings;
use super::services::{ConsumerService, ProducerService};
use crate::broker::{BrokerError, BrokerResult, ConfigError, QueueConsumer, QueueProducer};
use crate::core::logging::{init_logging, LoggingError};
use crate::core::shutdown::ShutdownCoordinator;
use crate::queue::{InMemoryQueue, Queue};
use log::{debug, error, info, warn};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Head start the consumer gets before the producer begins publishing
pub const CONSUMER_WARMUP: Duration = Duration::from_millis(500);
/// Upper bound on waiting for services after shutdown was requested
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("{count} service(s) ended with an error")]
    ServicesFailed { count: usize },
}

/// What a completed run achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub published: u64,
    pub processed: u64,
    pub high_value: u64,
}

/// Binary entry point
pub async fn startup() -> ExitCode {
    let args = Args::parse_from_env();

    let mut settings = match Settings::resolve(&args).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    settings.logging.color = settings.use_color(std::io::stderr().is_terminal());

    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    debug!("Resolved settings: {:?}", settings);

    match ShutdownCoordinator::guard(|shutdown| run(&settings, shutdown)).await {
        Ok(summary) => {
            info!(
                "Example completed: {} published, {} processed, {} high value",
                summary.published, summary.processed, summary.high_value
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run producer and consumer services until `shutdown` fires or the
/// configured duration elapses
pub async fn run(settings: &Settings, shutdown: CancellationToken) -> Result<RunSummary, StartupError> {
    info!("Starting topic queue example on topic '{}'", settings.topic);

    let queue = Arc::new(InMemoryQueue::from_config(&settings.broker));
    let producer = Arc::new(QueueProducer::new(queue.clone()));
    let consumer = Arc::new(QueueConsumer::with_config(queue.clone(), &settings.broker));

    let producer_service = Arc::new(ProducerService::new(
        producer,
        settings.topic.as_str(),
        settings.publish_interval,
    ));
    let consumer_service = Arc::new(ConsumerService::new(consumer, settings.topic.as_str()));

    let services_cancel = CancellationToken::new();
    let mut services: JoinSet<(&'static str, BrokerResult<()>)> = JoinSet::new();

    {
        let service = Arc::clone(&consumer_service);
        let cancel = services_cancel.clone();
        services.spawn(async move { ("consumer", service.start(cancel).await) });
    }

    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = sleep(CONSUMER_WARMUP) => {
            let service = Arc::clone(&producer_service);
            let cancel = services_cancel.clone();
            services.spawn(async move { ("producer", service.start(cancel).await) });
            info!("Services started. Press Ctrl+C to stop...");
        }
    }

    match settings.duration {
        Some(duration) => {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = sleep(duration) => info!("Run duration of {:?} reached", duration),
            }
        }
        None => shutdown.cancelled().await,
    }

    info!("Shutting down services...");
    services_cancel.cancel();

    let failures = match timeout(SHUTDOWN_TIMEOUT, drain_services(&mut services)).await {
        Ok(failures) => {
            info!("All services shut down gracefully");
            failures
        }
        Err(_) => {
            warn!("Shutdown timeout reached after {:?}", SHUTDOWN_TIMEOUT);
            services.abort_all();
            0
        }
    };

    if let Err(e) = producer_service.stop() {
        warn!("Error stopping producer service: {}", e);
    }
    if let Err(e) = consumer_service.stop().await {
        warn!("Error stopping consumer service: {}", e);
    }
    queue.close().map_err(BrokerError::from)?;

    if failures > 0 {
        return Err(StartupError::ServicesFailed { count: failures });
    }

    let stats = consumer_service.stats();
    Ok(RunSummary {
        published: producer_service.published(),
        processed: stats.processed.load(Ordering::Relaxed),
        high_value: stats.high_value.load(Ordering::Relaxed),
    })
}

/// Wait for every service task, returning how many failed
async fn drain_services(services: &mut JoinSet<(&'static str, BrokerResult<()>)>) -> usize {
    let mut failures = 0;
    while let Some(joined) = services.join_next().await {
        match joined {
            Ok((name, Ok(()))) => debug!("{} service finished", name),
            Ok((name, Err(e))) => {
                error!("{} service error: {}", name, e);
                failures += 1;
            }
            Err(e) => {
                error!("Service task failed: {}", e);
                failures += 1;
            }
        }
    }
    failures
}
