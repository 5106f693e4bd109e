use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::PostgresTransactionRepository;
use crate::config::Config;
use crate::domain::{Transaction, TransactionStatus};
use crate::ports::TransactionRepository;
use crate::services::Reconciler;

#[derive(Parser)]
#[command(name = "paybridge-core")]
#[command(about = "Paybridge Core - payment orchestration and reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and submission worker (default)
    Serve {
        /// Keep wallets and transactions in memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Print the configuration and validate it
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Show a transaction by ID
    Show {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// List transactions flagged for manual review
    Review,

    /// Resolve a flagged transaction as completed or failed
    Resolve {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,

        #[arg(value_name = "STATUS", value_parser = parse_resolution)]
        status: TransactionStatus,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

fn parse_resolution(raw: &str) -> Result<TransactionStatus, String> {
    let status: TransactionStatus = raw.parse()?;
    if !status.is_terminal() {
        return Err(format!("expected completed or failed, got {}", raw));
    }
    Ok(status)
}

pub async fn handle_tx_show(pool: &PgPool, tx_id: Uuid) -> anyhow::Result<()> {
    let repo = PostgresTransactionRepository::new(pool.clone());
    let tx = repo
        .get_by_id(tx_id)
        .await
        .with_context(|| format!("failed to load transaction {}", tx_id))?;

    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

pub async fn handle_tx_review(pool: &PgPool) -> anyhow::Result<()> {
    let repo = PostgresTransactionRepository::new(pool.clone());
    let flagged = repo.list_needing_review().await?;

    if flagged.is_empty() {
        println!("No transactions need review");
        return Ok(());
    }

    println!(
        "{:<38} {:<38} {:<10} {:<12} {:<20}",
        "Transaction", "Wallet", "Gateway", "Amount", "Reference"
    );
    println!("{}", "-".repeat(120));
    for tx in &flagged {
        print_review_row(tx);
    }

    Ok(())
}

fn print_review_row(tx: &Transaction) {
    println!(
        "{:<38} {:<38} {:<10} {:<12} {:<20}",
        tx.id,
        tx.wallet_id,
        tx.payment_gateway,
        tx.amount,
        tx.reference_id.as_deref().unwrap_or("-")
    );
}

pub async fn handle_tx_resolve(
    pool: &PgPool,
    config: &Config,
    tx_id: Uuid,
    status: TransactionStatus,
) -> anyhow::Result<()> {
    let router = crate::build_gateway_router(config)?;
    let reconciler = Reconciler::new(
        Arc::new(PostgresTransactionRepository::new(pool.clone())),
        router,
    );

    let tx = reconciler
        .resolve_review(tx_id, status)
        .await
        .with_context(|| format!("failed to resolve transaction {}", tx_id))?;

    println!("✓ Transaction {} resolved as {}", tx.id, tx.status);
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Callback Pattern: {}", config.payment_callback_pattern);
    println!("  Queue Poll Interval: {:?}", config.queue_poll_interval);
    for (name, gateway) in config.gateways() {
        println!("  {}:", name);
        println!("    Base URL: {}", gateway.base_url);
        println!("    Request Timeout: {:?}", gateway.request_timeout);
        println!(
            "    Retry: {} attempts, {:?} apart",
            gateway.retry_attempts, gateway.retry_delay
        );
        println!(
            "    Breaker: trips after {} consecutive / {} total failures, open {:?}, {} half-open trials",
            gateway.breaker.max_consecutive_failures,
            gateway
                .breaker
                .max_total_failures
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unbounded".to_string()),
            gateway.breaker.open_timeout,
            gateway.breaker.max_half_open_requests
        );
    }

    let problems = crate::startup::validate_settings(config);
    if !problems.is_empty() {
        for problem in &problems {
            println!("  ❌ {}", problem);
        }
        anyhow::bail!("configuration has {} problem(s)", problems.len());
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");
    Ok(())
}

pub fn mask_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_ok() {
                parsed.to_string()
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_password() {
        assert_eq!(
            mask_password("postgres://pay:s3cret@db:5432/paybridge"),
            "postgres://pay:****@db:5432/paybridge"
        );
        assert_eq!(
            mask_password("postgres://db:5432/paybridge"),
            "postgres://db:5432/paybridge"
        );
        assert_eq!(mask_password("not a url"), "not a url");
    }

    #[test]
    fn test_resolution_must_be_terminal() {
        assert_eq!(parse_resolution("completed"), Ok(TransactionStatus::Completed));
        assert_eq!(parse_resolution("failed"), Ok(TransactionStatus::Failed));
        assert!(parse_resolution("pending").is_err());
        assert!(parse_resolution("bogus").is_err());
    }

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["paybridge-core"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["paybridge-core", "serve", "--in-memory"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { in_memory: true })));

        let id = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["paybridge-core", "tx", "resolve", &id, "failed"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Tx(TxCommands::Resolve {
                status: TransactionStatus::Failed,
                ..
            }))
        ));
    }
}
