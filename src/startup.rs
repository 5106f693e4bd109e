use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    /// `None` when running without a database.
    pub database: Option<bool>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database.unwrap_or(true)
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Configuration:         {}", status(self.environment));
        match self.database {
            Some(ok) => println!("Database Connectivity: {}", status(ok)),
            None => println!("Database Connectivity: skipped (in-memory)"),
        }

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let errors = validate_settings(config);
    let mut report = ValidationReport {
        environment: errors.is_empty(),
        database: None,
        errors,
    };

    if let Some(pool) = pool {
        let result = validate_database(pool).await;
        report.database = Some(result.is_ok());
        if let Err(e) = result {
            report.errors.push(format!("Database: {:#}", e));
        }
    }

    report
}

/// Checks the loaded configuration for values that parse but cannot work.
pub fn validate_settings(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();

    if config.server_port == 0 {
        errors.push("SERVER_PORT must be greater than 0".to_string());
    }
    if config.database_max_connections == 0 {
        errors.push("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
    }

    let pattern = &config.payment_callback_pattern;
    if let Err(e) = url::Url::parse(pattern) {
        errors.push(format!("PAYMENT_CALLBACK_PATTERN is not a valid URL: {}", e));
    }
    for placeholder in ["{wallet_id}", "{transaction_id}"] {
        if !pattern.contains(placeholder) {
            errors.push(format!(
                "PAYMENT_CALLBACK_PATTERN is missing the {} placeholder",
                placeholder
            ));
        }
    }

    for (name, gateway) in config.gateways() {
        let prefix = name.to_uppercase();
        match url::Url::parse(&gateway.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(format!(
                "{}_API_BASE_URL must be http or https, got {}",
                prefix,
                url.scheme()
            )),
            Err(e) => errors.push(format!("{}_API_BASE_URL is not a valid URL: {}", prefix, e)),
        }
        if gateway.retry_attempts < 1 {
            errors.push(format!("{}_RETRY_ATTEMPT must be at least 1", prefix));
        }
        if gateway.breaker.max_consecutive_failures < 1 {
            errors.push(format!(
                "{}_CB_MAX_CONSECUTIVE_FAILURES must be at least 1",
                prefix
            ));
        }
        if gateway.breaker.max_half_open_requests < 1 {
            errors.push(format!("{}_CB_MAX_REQUESTS must be at least 1", prefix));
        }
    }

    errors
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}
