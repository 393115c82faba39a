//! JSON-RPC 2.0 envelopes exchanged with the model backend.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::messages::Message;

pub const JSONRPC_VERSION: &str = "2.0";
pub const LLM_METHOD: &str = "llm/message";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported jsonrpc version '{0}'")]
    UnsupportedVersion(String),

    #[error("response {0} carries both a result and an error")]
    AmbiguousOutcome(i64),

    #[error("response {0} carries neither a result nor an error")]
    MissingOutcome(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmParams {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: LlmParams,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }
}

/// Response envelope. Exactly one of `result` / `error` is set; build it with
/// [`RpcResponse::success`] or [`RpcResponse::failure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    // A present `"result": null` stays `Some(Value::Null)`
    #[serde(default, deserialize_with = "present_value", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: i64,
}

impl RpcResponse {
    pub fn success(id: i64, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), result: Some(result), error: None, id }
    }

    pub fn failure(id: i64, error: RpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), result: None, error: Some(error), id }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }

    fn validate(&self) -> Result<(), CodecError> {
        check_version_str(&self.jsonrpc)?;
        match (&self.result, &self.error) {
            (Some(_), Some(_)) => Err(CodecError::AmbiguousOutcome(self.id)),
            (None, None) => Err(CodecError::MissingOutcome(self.id)),
            _ => Ok(()),
        }
    }
}

fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Request(RpcRequest),
    Response(RpcResponse),
}

impl From<RpcRequest> for Envelope {
    fn from(req: RpcRequest) -> Self {
        Envelope::Request(req)
    }
}

impl From<RpcResponse> for Envelope {
    fn from(resp: RpcResponse) -> Self {
        Envelope::Response(resp)
    }
}

// Wraps an outbound conversation into an `llm/message` request
pub fn make_request(messages: Vec<Message>, id: i64) -> RpcRequest {
    RpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        method: LLM_METHOD.to_string(),
        params: LlmParams { messages },
        id,
    }
}

/// Anything [`encode`] accepts. The check runs before serializing so that
/// only envelopes [`decode`] would accept ever reach the wire.
pub trait Encodable: Serialize {
    fn check(&self) -> Result<(), CodecError>;
}

impl Encodable for RpcRequest {
    fn check(&self) -> Result<(), CodecError> {
        check_version_str(&self.jsonrpc)
    }
}

impl Encodable for RpcResponse {
    fn check(&self) -> Result<(), CodecError> {
        self.validate()
    }
}

impl Encodable for Envelope {
    fn check(&self) -> Result<(), CodecError> {
        match self {
            Envelope::Request(req) => req.check(),
            Envelope::Response(resp) => resp.check(),
        }
    }
}

pub fn encode<T: Encodable>(envelope: &T) -> Result<Vec<u8>, CodecError> {
    envelope.check()?;
    Ok(serde_json::to_vec(envelope)?)
}

// Indented form, used for logging
pub fn encode_pretty<T: Encodable>(envelope: &T) -> Result<String, CodecError> {
    envelope.check()?;
    Ok(serde_json::to_string_pretty(envelope)?)
}

/// Decodes either envelope kind. A body with a `method` field is a request,
/// anything else must be a well-formed response.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let raw: Value = serde_json::from_slice(bytes)?;
    check_version(&raw)?;

    if raw.get("method").is_some() {
        Ok(Envelope::Request(serde_json::from_value(raw)?))
    } else {
        Ok(Envelope::Response(response_from_value(raw)?))
    }
}

pub fn decode_response(bytes: &[u8]) -> Result<RpcResponse, CodecError> {
    let raw: Value = serde_json::from_slice(bytes)?;
    check_version(&raw)?;
    response_from_value(raw)
}

fn response_from_value(raw: Value) -> Result<RpcResponse, CodecError> {
    let response: RpcResponse = serde_json::from_value(raw)?;
    response.validate()?;
    Ok(response)
}

fn check_version(raw: &Value) -> Result<(), CodecError> {
    check_version_str(raw.get("jsonrpc").and_then(Value::as_str).unwrap_or_default())
}

fn check_version_str(version: &str) -> Result<(), CodecError> {
    if version == JSONRPC_VERSION {
        Ok(())
    } else {
        Err(CodecError::UnsupportedVersion(version.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_request() -> RpcRequest {
        make_request(
            vec![Message::system("be careful"), Message::user("Is the crane safe?")],
            7,
        )
    }

    #[test]
    fn test_request_wire_shape() {
        let value: Value = serde_json::from_slice(&encode(&sample_request()).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "method": "llm/message",
                "params": {"messages": [
                    {"role": "system", "content": "be careful"},
                    {"role": "user", "content": "Is the crane safe?"}
                ]},
                "id": 7
            })
        );
    }

    #[test]
    fn test_request_roundtrip() {
        let req = sample_request();
        let decoded = decode(&encode(&req).unwrap()).unwrap();
        assert_eq!(decoded, Envelope::Request(req));
    }

    #[test]
    fn test_success_response_roundtrip_omits_error() {
        let resp = RpcResponse::success(3, json!({"text": "fine", "tools_used": []}));
        let bytes = encode(&resp).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(!text.contains("\"error\""));

        assert_eq!(decode(&bytes).unwrap(), Envelope::Response(resp));
    }

    #[test]
    fn test_error_response_roundtrip_omits_result() {
        let resp = RpcResponse::failure(4, RpcError::new(-32000, "backend exploded"));
        let bytes = encode(&Envelope::from(resp.clone())).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], -32000);

        let decoded = decode_response(&bytes).unwrap();
        assert_eq!(decoded, resp);
        assert!(!decoded.is_success());
    }

    #[test]
    fn test_rejects_both_result_and_error() {
        let body = br#"{"jsonrpc":"2.0","result":{},"error":{"code":1,"message":"x"},"id":1}"#;
        assert!(matches!(decode(body), Err(CodecError::AmbiguousOutcome(1))));
    }

    #[test]
    fn test_rejects_missing_outcome() {
        assert!(matches!(
            decode_response(br#"{"jsonrpc":"2.0","id":2}"#),
            Err(CodecError::MissingOutcome(2))
        ));
    }

    #[test]
    fn test_null_result_is_a_present_result() {
        let resp = RpcResponse::success(9, Value::Null);
        let bytes = encode(&resp).unwrap();
        assert_eq!(String::from_utf8(bytes.clone()).unwrap(), r#"{"jsonrpc":"2.0","result":null,"id":9}"#);

        let decoded = decode_response(&bytes).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(decode(&bytes).unwrap(), Envelope::Response(resp));
    }

    #[test]
    fn test_encode_refuses_envelopes_decode_would_reject() {
        let mut both = RpcResponse::success(1, json!({"text": "ok"}));
        both.error = Some(RpcError::new(-1, "also failed"));
        assert!(matches!(encode(&both), Err(CodecError::AmbiguousOutcome(1))));
        assert!(matches!(encode(&Envelope::from(both)), Err(CodecError::AmbiguousOutcome(1))));

        let mut neither = RpcResponse::success(2, json!({}));
        neither.result = None;
        assert!(matches!(encode(&neither), Err(CodecError::MissingOutcome(2))));

        let mut old = sample_request();
        old.jsonrpc = "1.0".to_string();
        assert!(matches!(encode_pretty(&old), Err(CodecError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_rejects_wrong_version_and_garbage() {
        assert!(matches!(
            decode(br#"{"jsonrpc":"1.0","result":{},"id":1}"#),
            Err(CodecError::UnsupportedVersion(v)) if v == "1.0"
        ));
        assert!(matches!(decode(b"not json"), Err(CodecError::Json(_))));
    }
}
