//! Per-gateway circuit breaker.
//!
//! Built on failsafe's state machine with a trip policy that counts both
//! consecutive failures and total failures per rolling interval. failsafe
//! admits every call while half-open, so the number of trial requests is
//! bounded here through the state reported by [`StateRecorder`].

use failsafe::failure_policy::FailurePolicy;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{Config, Error as FailsafeError, Instrument, StateMachine};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::GatewayName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Trips once consecutive failures exceed this.
    pub max_consecutive_failures: u32,
    /// Trips once failures within `interval` exceed this.
    pub max_total_failures: Option<u32>,
    /// Rolling window for the total count. Zero never resets it while closed.
    pub interval: Duration,
    /// How long the breaker stays open before admitting trial requests.
    pub open_timeout: Duration,
    pub max_half_open_requests: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            max_total_failures: None,
            interval: Duration::from_secs(60),
            open_timeout: Duration::from_secs(30),
            max_half_open_requests: 1,
        }
    }
}

#[derive(Debug)]
pub enum BreakerError<E> {
    Open,
    Inner(E),
}

#[derive(Debug, Clone)]
struct TripPolicy {
    max_consecutive: u32,
    max_total: Option<u32>,
    interval: Duration,
    open_timeout: Duration,
    consecutive: u32,
    total: u32,
    window_started: Instant,
}

impl TripPolicy {
    fn new(settings: &BreakerSettings) -> Self {
        Self {
            max_consecutive: settings.max_consecutive_failures,
            max_total: settings.max_total_failures,
            interval: settings.interval,
            open_timeout: settings.open_timeout,
            consecutive: 0,
            total: 0,
            window_started: Instant::now(),
        }
    }

    fn roll_window(&mut self) {
        if !self.interval.is_zero() && self.window_started.elapsed() >= self.interval {
            self.total = 0;
            self.window_started = Instant::now();
        }
    }
}

impl FailurePolicy for TripPolicy {
    fn record_success(&mut self) {
        self.roll_window();
        self.consecutive = 0;
    }

    fn mark_dead_on_failure(&mut self) -> Option<Duration> {
        self.roll_window();
        self.consecutive += 1;
        self.total += 1;

        let too_many_consecutive = self.consecutive > self.max_consecutive;
        let too_many_total = self.max_total.map_or(false, |max| self.total > max);

        if too_many_consecutive || too_many_total {
            Some(self.open_timeout)
        } else {
            None
        }
    }

    fn revived(&mut self) {
        self.consecutive = 0;
        self.total = 0;
        self.window_started = Instant::now();
    }
}

#[derive(Debug)]
struct StateCell {
    state: CircuitState,
    half_open_trials: u32,
}

/// Mirrors failsafe's transitions into a readable state and logs them.
#[derive(Debug, Clone)]
struct StateRecorder {
    gateway: GatewayName,
    cell: Arc<Mutex<StateCell>>,
}

impl StateRecorder {
    fn lock(&self) -> MutexGuard<'_, StateCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, state: CircuitState, half_open_trials: u32) {
        let mut cell = self.lock();
        cell.state = state;
        cell.half_open_trials = half_open_trials;
    }
}

impl Instrument for StateRecorder {
    fn on_call_rejected(&self) {
        debug!(gateway = %self.gateway, "circuit breaker rejected call");
    }

    fn on_open(&self) {
        self.set(CircuitState::Open, 0);
        warn!(gateway = %self.gateway, "circuit breaker opened");
    }

    fn on_half_open(&self) {
        // the call that triggered the transition is the first trial
        self.set(CircuitState::HalfOpen, 1);
        info!(gateway = %self.gateway, "circuit breaker half-open");
    }

    fn on_closed(&self) {
        self.set(CircuitState::Closed, 0);
        info!(gateway = %self.gateway, "circuit breaker closed");
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    machine: StateMachine<TripPolicy, StateRecorder>,
    recorder: StateRecorder,
    max_half_open_requests: u32,
}

impl CircuitBreaker {
    pub fn new(gateway: GatewayName, settings: &BreakerSettings) -> Self {
        let recorder = StateRecorder {
            gateway,
            cell: Arc::new(Mutex::new(StateCell {
                state: CircuitState::Closed,
                half_open_trials: 0,
            })),
        };

        let machine = Config::new()
            .failure_policy(TripPolicy::new(settings))
            .instrument(recorder.clone())
            .build();

        Self {
            machine,
            recorder,
            max_half_open_requests: settings.max_half_open_requests.max(1),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.recorder.lock().state
    }

    /// Runs `call` if the breaker admits it and records its outcome.
    pub async fn call<T, E, Fut>(&self, call: Fut) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit_half_open_trial() {
            self.recorder.on_call_rejected();
            return Err(BreakerError::Open);
        }

        match self.machine.call(call).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(BreakerError::Open),
            Err(FailsafeError::Inner(e)) => Err(BreakerError::Inner(e)),
        }
    }

    fn admit_half_open_trial(&self) -> bool {
        let mut cell = self.recorder.lock();
        if cell.state != CircuitState::HalfOpen {
            return true;
        }
        if cell.half_open_trials >= self.max_half_open_requests {
            return false;
        }
        cell.half_open_trials += 1;
        true
    }
}
