//! Thin HTTP client for a running pyrepl server.

use std::time::Duration;

use serde::de::DeserializeOwned;

use pyrepl_server::protocol::{ErrorReply, ExecuteBody, ExecuteReply, HealthReply, StatusReply};

/// Probe timeout; a server that cannot answer `/health` this fast is
/// treated as not running.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Client-side failure classes, kept distinct so the caller can present
/// them differently: busy is a warning, a server error shows status and
/// body, unreachable means the server is not running at all.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Busy(String),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("{0}")]
    Unreachable(#[from] reqwest::Error),
}

pub struct PyreplClient {
    base_url: String,
    http: reqwest::Client,
}

impl PyreplClient {
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            http: reqwest::Client::new(),
        }
    }

    /// Probe `/health`. Any failure here means "server not running".
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn health(&self) -> Result<HealthReply, ClientError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Submit source lines to `/execute`. No timeout: the server answers
    /// when the snippet finishes, however long that takes.
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn execute(&self, lines: Vec<String>) -> Result<ExecuteReply, ClientError> {
        let response = self
            .http
            .post(format!("{}/execute", self.base_url))
            .json(&ExecuteBody { code: lines })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Ask the server to clear its REPL scope.
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn reset(&self) -> Result<StatusReply, ClientError> {
        let response = self
            .http
            .post(format!("{}/reset", self.base_url))
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::CONFLICT {
            let message = serde_json::from_str::<ErrorReply>(&body)
                .map(|reply| reply.error)
                .unwrap_or_else(|_| body.clone());
            return Err(ClientError::Busy(message));
        }
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| ClientError::Server {
            status: status.as_u16(),
            body: format!("unexpected response body: {err}"),
        })
    }
}
