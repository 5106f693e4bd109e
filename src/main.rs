use clap::Parser;
use paybridge_core::adapters::{
    InMemoryTransactionRepository, InMemoryWalletRepository, PostgresTransactionRepository,
    PostgresWalletRepository,
};
use paybridge_core::cli::{Cli, Commands, DbCommands, TxCommands};
use paybridge_core::config::Config;
use paybridge_core::health::{HealthChecker, PostgresChecker};
use paybridge_core::middleware::request_logger::RequestLogConfig;
use paybridge_core::ports::{TransactionRepository, WalletRepository};
use paybridge_core::services::{PaymentService, Reconciler, SubmissionQueue, SubmissionWorker};
use paybridge_core::{build_gateway_router, cli, create_app, db, startup, AppState};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Some(Commands::Serve { in_memory }) => serve(config, in_memory).await,
        None => serve(config, false).await,
        Some(Commands::Tx(tx)) => {
            let pool = db::create_pool(&config).await?;
            match tx {
                TxCommands::Show { tx_id } => cli::handle_tx_show(&pool, tx_id).await,
                TxCommands::Review => cli::handle_tx_review(&pool).await,
                TxCommands::Resolve { tx_id, status } => {
                    cli::handle_tx_resolve(&pool, &config, tx_id, status).await
                }
            }
        }
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => cli::handle_config_validate(&config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

type Repositories = (Arc<dyn TransactionRepository>, Arc<dyn WalletRepository>);

async fn serve(config: Config, in_memory: bool) -> anyhow::Result<()> {
    let pool: Option<PgPool> = if in_memory {
        tracing::warn!("running with in-memory storage, data is lost on exit");
        None
    } else {
        let pool = db::create_pool(&config).await?;
        db::run_migrations(&pool).await?;
        Some(pool)
    };

    let report = startup::validate_environment(&config, pool.as_ref()).await;
    if !report.is_valid() {
        report.print();
        anyhow::bail!("startup validation failed");
    }

    let (transactions, wallets): Repositories = match &pool {
        Some(pool) => (
            Arc::new(PostgresTransactionRepository::new(pool.clone())),
            Arc::new(PostgresWalletRepository::new(pool.clone())),
        ),
        None => (
            Arc::new(InMemoryTransactionRepository::new()),
            Arc::new(InMemoryWalletRepository::new()),
        ),
    };

    let router = build_gateway_router(&config)?;
    let mut health = HealthChecker::builder();
    if let Some(pool) = &pool {
        health = health.critical("postgres", PostgresChecker::new(pool.clone()));
    }
    let health = health.gateways(&router).build();

    let queue = Arc::new(SubmissionQueue::new());
    let state = AppState {
        payments: PaymentService::new(
            transactions.clone(),
            wallets,
            router.clone(),
            queue.clone(),
        ),
        reconciler: Reconciler::new(transactions.clone(), router.clone()),
        health,
        request_log: RequestLogConfig {
            log_body: config.log_request_body,
        },
    };
    let worker = SubmissionWorker::new(
        queue,
        transactions,
        router,
        config.payment_callback_pattern.clone(),
        config.queue_poll_interval,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(worker.run(shutdown_rx.clone()));
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    worker.await?;
    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
}
