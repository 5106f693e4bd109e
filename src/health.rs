use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::gateway::{CircuitState, GatewayName, GatewayRouter};

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: BTreeMap<String, DependencyStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }

    fn is_unhealthy(&self) -> bool {
        matches!(self, DependencyStatus::Unhealthy { .. })
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

/// Reports a gateway as unhealthy while its circuit breaker is open.
pub struct GatewayCircuitChecker {
    router: GatewayRouter,
    gateway: GatewayName,
}

impl GatewayCircuitChecker {
    pub fn new(router: GatewayRouter, gateway: GatewayName) -> Self {
        Self { router, gateway }
    }
}

#[async_trait]
impl DependencyChecker for GatewayCircuitChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        let state = self
            .router
            .circuit_states()
            .into_iter()
            .find(|(name, _)| *name == self.gateway)
            .map(|(_, state)| state);

        match state {
            Some(CircuitState::Open) => DependencyStatus::unhealthy("circuit breaker open"),
            Some(_) => DependencyStatus::healthy(start),
            None => DependencyStatus::unhealthy("gateway not registered"),
        }
    }
}

struct NamedCheck {
    name: String,
    critical: bool,
    checker: Arc<dyn DependencyChecker>,
}

/// Runs every registered check concurrently, each bounded by a timeout.
/// A failing critical check makes the service unhealthy; any other
/// failure only degrades it.
#[derive(Clone)]
pub struct HealthChecker {
    checks: Arc<Vec<NamedCheck>>,
    started: Instant,
}

impl HealthChecker {
    pub fn builder() -> HealthCheckerBuilder {
        HealthCheckerBuilder { checks: Vec::new() }
    }

    pub async fn check(&self) -> HealthResponse {
        let results = join_all(self.checks.iter().map(|check| async move {
            let status = timeout(CHECK_TIMEOUT, check.checker.check())
                .await
                .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
            (check, status)
        }))
        .await;

        let mut has_critical_failure = false;
        let mut has_non_critical_failure = false;
        let mut dependencies = BTreeMap::new();

        for (check, status) in results {
            if status.is_unhealthy() {
                if check.critical {
                    has_critical_failure = true;
                } else {
                    has_non_critical_failure = true;
                }
            }
            dependencies.insert(check.name.clone(), status);
        }

        let status = if has_critical_failure {
            "unhealthy"
        } else if has_non_critical_failure {
            "degraded"
        } else {
            "healthy"
        };

        HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
            dependencies,
        }
    }
}

pub struct HealthCheckerBuilder {
    checks: Vec<NamedCheck>,
}

impl HealthCheckerBuilder {
    pub fn critical(mut self, name: impl Into<String>, checker: impl DependencyChecker + 'static) -> Self {
        self.checks.push(NamedCheck {
            name: name.into(),
            critical: true,
            checker: Arc::new(checker),
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, checker: impl DependencyChecker + 'static) -> Self {
        self.checks.push(NamedCheck {
            name: name.into(),
            critical: false,
            checker: Arc::new(checker),
        });
        self
    }

    /// Adds a non-critical circuit check for every gateway in `router`.
    pub fn gateways(mut self, router: &GatewayRouter) -> Self {
        for (name, _) in router.circuit_states() {
            self = self.optional(
                name.to_string(),
                GatewayCircuitChecker::new(router.clone(), name),
            );
        }
        self
    }

    pub fn build(self) -> HealthChecker {
        HealthChecker {
            checks: Arc::new(self.checks),
            started: Instant::now(),
        }
    }
}
