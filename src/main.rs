use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt as _,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use foglio::{
    application::{
        error::AppError,
        jobs::{ReconcileJobContext, process_reconcile_job, reconcile_schedule},
        reconcile::Reconciler,
        repos::PostsWriteRepo,
    },
    cache::{CacheInvalidator, CounterStore, QueryCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        telemetry,
        volatile::{MemoryVolatileStore, RedisVolatileStore},
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Reconcile(_) => run_reconcile(settings).await,
        config::Command::Worker(_) => run_worker(settings).await,
    }
}

/// One-shot reconciliation for external schedulers. The process exit code is
/// the contract: 0 only when every per-record ratchet landed.
async fn run_reconcile(settings: config::Settings) -> Result<(), AppError> {
    let reconciler = build_reconciler(&settings).await?;

    let outcome = reconciler
        .run_pass()
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    if !outcome.fully_succeeded() {
        return Err(AppError::unexpected(format!(
            "{} of {} ratchet updates failed; safe to re-invoke",
            outcome.failed, outcome.scanned
        )));
    }

    Ok(())
}

/// Resident worker: reconciliation on a cron cadence via apalis.
async fn run_worker(settings: config::Settings) -> Result<(), AppError> {
    let schedule =
        reconcile_schedule(&settings.reconciler.schedule).map_err(AppError::validation)?;
    let reconciler = build_reconciler(&settings).await?;

    info!(
        target = "foglio::worker",
        schedule = %settings.reconciler.schedule,
        "starting reconciliation worker"
    );

    let context = ReconcileJobContext { reconciler };
    let worker = WorkerBuilder::new("reconcile-worker")
        .data(context)
        .backend(CronStream::new(schedule))
        .build_fn(process_reconcile_job);

    Monitor::new()
        .register(worker)
        .run()
        .await
        .map_err(|err| AppError::unexpected(format!("worker monitor stopped: {err}")))?;

    Ok(())
}

async fn build_reconciler(settings: &config::Settings) -> Result<Arc<Reconciler>, AppError> {
    let repositories = init_repositories(settings).await?;
    let (cache, counters) = init_volatile(settings).await?;

    let invalidator = Arc::new(CacheInvalidator::new(cache, counters.clone()));
    let posts_write: Arc<dyn PostsWriteRepo> = repositories;

    Ok(Arc::new(Reconciler::new(
        posts_write,
        counters,
        invalidator,
    )))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn init_volatile(
    settings: &config::Settings,
) -> Result<(Arc<dyn QueryCache>, Arc<dyn CounterStore>), AppError> {
    match settings.volatile.url.as_deref() {
        Some(url) => {
            let store = Arc::new(
                RedisVolatileStore::connect(url, settings.volatile.op_timeout)
                    .await
                    .map_err(AppError::from)?,
            );
            let cache: Arc<dyn QueryCache> = store.clone();
            let counters: Arc<dyn CounterStore> = store;
            Ok((cache, counters))
        }
        None => {
            warn!(
                target = "foglio::worker",
                "volatile url not configured; using the in-process store (single instance only)"
            );
            let store = Arc::new(MemoryVolatileStore::new());
            let cache: Arc<dyn QueryCache> = store.clone();
            let counters: Arc<dyn CounterStore> = store;
            Ok((cache, counters))
        }
    }
}
