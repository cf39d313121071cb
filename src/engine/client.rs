use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::types::{EngineStateSnapshot, ResumeCommand, SuspendRequest};
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;
use std::pin::Pin;
use std::sync::OnceLock;
#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use crate::types::InterruptValue;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Scripted stand-in for the engine service, injected in tests.
#[cfg(test)]
pub trait MockEngineTransport: Send + Sync {
    fn open_stream(&self, input: Option<&str>, mode: &str) -> Result<ByteStream>;
    fn pending_interrupt(&self) -> Result<Option<InterruptValue>>;
    fn record_resume(&self, command: &ResumeCommand) -> Result<()>;
}

/// Client for the reasoning engine's per-session streaming endpoints.
///
/// The underlying HTTP client is a process-wide lazily-initialized resource
/// that is never torn down: the engine transport must be reused across turns
/// rather than rebound per turn.
#[derive(Clone)]
pub struct EngineClient {
    base_url: String,
    model: String,
    #[cfg(test)]
    mock_transport: Option<Arc<dyn MockEngineTransport>>,
}

pub(crate) fn shared_http_client() -> &'static reqwest::Client {
    static HTTP: OnceLock<reqwest::Client> = OnceLock::new();
    HTTP.get_or_init(reqwest::Client::new)
}

impl EngineClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.engine_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            #[cfg(test)]
            mock_transport: None,
        }
    }

    #[cfg(test)]
    pub fn new_mock(mock_transport: Arc<dyn MockEngineTransport>) -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            model: "mock:mock-model".to_string(),
            mock_transport: Some(mock_transport),
        }
    }

    pub fn set_model(&mut self, model: String) {
        self.model = model;
    }

    /// Open one stream pass for a session. A `None` input signals "continue
    /// the same turn" after a resume command rather than a new user message.
    pub async fn open_stream(
        &self,
        session: &str,
        input: Option<&str>,
        mode: &str,
    ) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(transport) = &self.mock_transport {
                return transport.open_stream(input, mode);
            }
        }

        let request_url = format!("{}/sessions/{}/stream", self.base_url, session);
        let payload = json!({
            "input": input,
            "mode": mode,
            "model": self.model,
        });

        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &payload);
        }

        let response = shared_http_client()
            .post(&request_url)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_engine_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_engine_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_engine_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }

    /// Forward an approval decision for a suspended session.
    pub async fn send_resume(&self, session: &str, command: &ResumeCommand) -> Result<()> {
        #[cfg(test)]
        {
            if let Some(transport) = &self.mock_transport {
                return transport.record_resume(command);
            }
        }

        let request_url = format!("{}/sessions/{}/resume", self.base_url, session);

        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &json!({ "approved": command.approved }));
        }

        shared_http_client()
            .post(&request_url)
            .json(command)
            .send()
            .await
            .map_err(|error| map_engine_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_engine_request_error(error, &request_url))?;
        Ok(())
    }

    /// Query the engine's persisted execution state for a pending interrupt.
    pub async fn pending_interrupt(&self, session: &str) -> Result<Option<SuspendRequest>> {
        #[cfg(test)]
        {
            if let Some(transport) = &self.mock_transport {
                return Ok(transport.pending_interrupt()?.map(SuspendRequest::from));
            }
        }

        let request_url = format!("{}/sessions/{}/state", self.base_url, session);
        let snapshot: EngineStateSnapshot = shared_http_client()
            .get(&request_url)
            .send()
            .await
            .map_err(|error| map_engine_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_engine_request_error(error, &request_url))?
            .json()
            .await
            .map_err(|error| map_engine_request_error(error, &request_url))?;

        Ok(snapshot.pending_interrupt.map(SuspendRequest::from))
    }
}

fn map_engine_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local engine endpoint '{}': {}. Start the engine service or update RUDDER_ENGINE_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach engine endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("engine request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "engine endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("engine request to '{}' failed: {}", request_url, error)
}
