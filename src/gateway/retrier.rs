use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::Shutdown;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("max_attempts must be at least 1, got {0}")]
pub struct InvalidRetryConfig(pub u32);

#[derive(Debug)]
pub enum RetryError<E> {
    /// Shutdown was signalled while waiting between attempts.
    Cancelled,
    /// The last attempt's error.
    Failed(E),
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone)]
pub struct Retrier {
    max_attempts: u32,
    delay: Duration,
}

impl Retrier {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, InvalidRetryConfig> {
        if max_attempts < 1 {
            return Err(InvalidRetryConfig(max_attempts));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op` until it succeeds or `max_attempts` is reached. `op`
    /// receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, shutdown: &Shutdown, mut op: F) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= self.max_attempts {
                return Err(RetryError::Failed(err));
            }

            debug!(
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                "attempt failed, retrying"
            );

            let mut shutdown = shutdown.clone();
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = shutdown_requested(&mut shutdown) => return Err(RetryError::Cancelled),
            }

            attempt += 1;
        }
    }
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut Shutdown) {
    let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}
