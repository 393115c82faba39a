use thiserror::Error;

use crate::llm::GatewayError;
use crate::rpc::CodecError;
use crate::runtime::TaskError;

/// Failure of one orchestration request. Nothing partial is returned.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed or missing user text, rejected before any work starts
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend unreachable or answered with an error envelope
    #[error("Gateway failure: {0}")]
    GatewayFailure(String),

    /// Envelope could not be built, serialized or deserialized
    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    #[error("Task failure: {0}")]
    Task(#[from] TaskError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl From<GatewayError> for OrchestratorError {
    fn from(err: GatewayError) -> Self {
        match err {
            // A reply we cannot decode is still the backend's fault
            GatewayError::Protocol(e) => Self::GatewayFailure(format!("undecodable reply: {}", e)),
            other => Self::GatewayFailure(other.to_string()),
        }
    }
}

impl From<CodecError> for OrchestratorError {
    fn from(err: CodecError) -> Self {
        Self::EncodingFailure(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::EncodingFailure(err.to_string())
    }
}
