use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::rpc::{self, CodecError, RpcRequest, RpcResponse};

pub const MOCK_RESPONSE_TEXT: &str = "This is a mock LLM response for testing.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend reply is not a valid envelope: {0}")]
    Protocol(#[from] CodecError),
}

/// A strategy for delivering a request envelope to a model backend.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, request: &RpcRequest) -> Result<RpcResponse, GatewayError>;
}

// Deterministic stand-in used when no backend endpoint is configured
#[derive(Debug, Default, Clone)]
pub struct MockBackend;

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, request: &RpcRequest) -> Result<RpcResponse, GatewayError> {
        Ok(RpcResponse::success(
            request.id,
            json!({
                "text": MOCK_RESPONSE_TEXT,
                "tools_used": [],
            }),
        ))
    }
}

/// Posts envelopes to a real JSON-RPC endpoint. One attempt per call, bounded
/// by the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self { client, endpoint: endpoint.into(), timeout })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, request: &RpcRequest) -> Result<RpcResponse, GatewayError> {
        let body = rpc::encode(request)?;

        let response = self.client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(rpc::decode_response(&bytes)?)
    }
}

impl HttpBackend {
    fn transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

/// Single entry point to the model backend.
#[derive(Clone)]
pub struct Gateway {
    backend: Arc<dyn Backend>,
}

impl Gateway {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn mock() -> Self {
        Self::new(Arc::new(MockBackend))
    }

    // An empty endpoint means "no real backend configured"
    pub fn for_endpoint(endpoint: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Ok(Self::mock());
        }
        Ok(Self::new(Arc::new(HttpBackend::new(endpoint, timeout)?)))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn send(&self, request: &RpcRequest) -> Result<RpcResponse, GatewayError> {
        info!("Sending request {} to {} backend", request.id, self.backend.name());
        if let Ok(pretty) = rpc::encode_pretty(request) {
            debug!("Outbound envelope:\n{}", pretty);
        }

        let response = self.backend.send(request).await?;
        debug!("Backend answered request {} (success: {})", response.id, response.is_success());
        Ok(response)
    }
}

// One-shot helper for callers that do not keep a Gateway around
pub async fn send(endpoint: &str, request: &RpcRequest, timeout: Duration) -> Result<RpcResponse, GatewayError> {
    Gateway::for_endpoint(endpoint, timeout)?.send(request).await
}
