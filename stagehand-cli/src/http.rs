//! HTTP platform client.
//!
//! `ureq` is a blocking client, so every call runs under `spawn_blocking`.
//! The agent is cheap to clone and shares its connection pool.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use stagehand_session::{PlatformClient, PushReceipt, RemoteSessionError, SessionPayload};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pushes session updates and fetches extension logs over HTTP.
pub struct HttpPlatformClient {
    agent: ureq::Agent,
    endpoint: String,
    token: Option<String>,
}

impl HttpPlatformClient {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            endpoint: endpoint.into(),
            token,
        }
    }

    /// Blocking fetch of recent extension log lines.
    pub(crate) fn fetch_recent_logs(&self) -> Result<Vec<String>, RemoteSessionError> {
        let url = format!("{}/logs", self.endpoint);
        let request = with_auth(self.agent.get(&url), self.token.as_deref());
        let response = request.call().map_err(classify)?;
        response
            .into_json::<Vec<String>>()
            .map_err(|err| RemoteSessionError::transport(format!("malformed log response: {err}")))
    }

    fn push_blocking(
        agent: ureq::Agent,
        endpoint: String,
        token: Option<String>,
        body: serde_json::Value,
    ) -> Result<PushReceipt, RemoteSessionError> {
        let request = with_auth(agent.put(&endpoint), token.as_deref());
        let response = request.send_json(body).map_err(classify)?;
        response
            .into_json::<PushReceipt>()
            .map_err(|err| RemoteSessionError::transport(format!("malformed push receipt: {err}")))
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn push_dev_session_update(
        &self,
        payload: &SessionPayload,
    ) -> Result<PushReceipt, RemoteSessionError> {
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let token = self.token.clone();
        let body = json!({
            "checksum": payload.checksum,
            "manifest": payload.manifest,
        });
        tokio::task::spawn_blocking(move || {
            Self::push_blocking(agent, endpoint, token, body)
        })
        .await
        .map_err(|err| RemoteSessionError::transport(format!("push task aborted: {err}")))?
    }
}

fn with_auth(request: ureq::Request, token: Option<&str>) -> ureq::Request {
    match token {
        Some(token) => request.set("Authorization", &format!("Bearer {token}")),
        None => request,
    }
}

/// Map HTTP failures onto the session error taxonomy: auth rejections are
/// terminal, 5xx and transport failures are retryable, any other status is a
/// platform rejection of this particular update.
fn classify(err: ureq::Error) -> RemoteSessionError {
    match err {
        ureq::Error::Status(401 | 403, _) => RemoteSessionError::Unauthorized,
        ureq::Error::Status(code, response) if code >= 500 => {
            let message = response
                .into_string()
                .unwrap_or_else(|_| format!("HTTP {code}"));
            RemoteSessionError::transport(format!("HTTP {code}: {message}"))
        }
        ureq::Error::Status(code, response) => {
            let message = response
                .into_string()
                .unwrap_or_else(|_| format!("HTTP {code}"));
            RemoteSessionError::Platform {
                message: format!("HTTP {code}: {message}"),
                retryable: false,
            }
        }
        ureq::Error::Transport(transport) => RemoteSessionError::transport(transport.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_refused_classifies_as_retryable_transport() {
        let client = HttpPlatformClient::new("http://localhost:1", Some("tok".into()));
        // Port 1 refuses connections, so the blocking call fails at the
        // transport level and must classify as retryable.
        let err = client.fetch_recent_logs().expect_err("nothing listening");
        assert!(err.retryable());
    }
}
