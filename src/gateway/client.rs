use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::warn;

use super::breaker::{BreakerError, CircuitBreaker, CircuitState};
use super::retrier::{InvalidRetryConfig, Retrier, RetryError};
use super::{GatewayError, GatewayName, Shutdown};
use crate::config::GatewaySettings;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// HTTP transport shared by gateway adapters.
///
/// Every POST runs inside the gateway's circuit breaker, and the retry
/// loop runs inside that, so one logical submission counts once toward
/// tripping the breaker and an open breaker skips the retries entirely.
#[derive(Clone)]
pub struct GatewayClient {
    name: GatewayName,
    http: Client,
    base_url: String,
    retrier: Retrier,
    breaker: CircuitBreaker,
}

impl GatewayClient {
    pub fn new(name: GatewayName, settings: &GatewaySettings) -> Result<Self, InvalidRetryConfig> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .unwrap_or_default();

        Ok(Self {
            retrier: Retrier::new(settings.retry_attempts, settings.retry_delay)?,
            breaker: CircuitBreaker::new(name.clone(), &settings.breaker),
            name,
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn name(&self) -> &GatewayName {
        &self.name
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// POSTs `body` to `path` and returns the body of a 200 response.
    ///
    /// Transport errors and 5xx responses are retried; any other non-200
    /// status ends the call immediately.
    pub async fn post(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: &'static str,
        shutdown: &Shutdown,
    ) -> Result<Vec<u8>, GatewayError> {
        let url = format!("{}{}", self.base_url, path);

        let result = self
            .breaker
            .call(async {
                let (status, response_body) = self
                    .retrier
                    .run(shutdown, |attempt| self.send_once(&url, &body, content_type, attempt))
                    .await
                    .map_err(|err| match err {
                        RetryError::Cancelled => GatewayError::Cancelled,
                        RetryError::Failed(err) => err,
                    })?;

                if status != StatusCode::OK {
                    return Err(GatewayError::UnexpectedStatus {
                        status: status.as_u16(),
                        body: truncated(&response_body),
                    });
                }

                Ok(response_body)
            })
            .await;

        match result {
            Ok(body) => Ok(body),
            Err(BreakerError::Open) => Err(GatewayError::CircuitOpen(self.name.clone())),
            Err(BreakerError::Inner(err)) => Err(err),
        }
    }

    /// One attempt. Fails only for outcomes worth retrying.
    async fn send_once(
        &self,
        url: &str,
        body: &[u8],
        content_type: &'static str,
        attempt: u32,
    ) -> Result<(StatusCode, Vec<u8>), GatewayError> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|err| {
                warn!(gateway = %self.name, attempt, error = %err, "gateway request failed");
                GatewayError::Transport(err)
            })?;

        let status = response.status();
        let response_body = response.bytes().await?.to_vec();

        if status.is_server_error() {
            warn!(
                gateway = %self.name,
                attempt,
                status = status.as_u16(),
                "gateway returned server error"
            );
            return Err(GatewayError::UnexpectedStatus {
                status: status.as_u16(),
                body: truncated(&response_body),
            });
        }

        Ok((status, response_body))
    }
}

fn truncated(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.chars().take(MAX_ERROR_BODY).collect()
}
