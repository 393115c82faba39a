use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::llm::Gateway;
use crate::messages::build_messages_with_tools;
use crate::registry::Registry;
use crate::rpc::{make_request, RpcResponse};
use crate::runtime::Runtime;
use crate::task::{build_run_with_output, Run};

pub const TOOLS_DETECTED_KEY: &str = "tools_detected";

#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    // Backend response with `tools_detected` merged into its result
    pub envelope: RpcResponse,
    pub tools_detected: Vec<String>,
}

/// Caller-facing pipeline. Holds the registry, the gateway and the task
/// runtime; all three are injected and read-only.
pub struct Orchestrator {
    registry: Arc<Registry>,
    gateway: Gateway,
    runtime: Runtime,
    next_id: AtomicI64,
}

impl Orchestrator {
    pub fn new(registry: Arc<Registry>, gateway: Gateway, runtime: Runtime) -> Self {
        Self { registry, gateway, runtime, next_id: AtomicI64::new(1) }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn orchestrate_chat(&self, text: &str) -> OrchestratorResult<ChatOutcome> {
        // 1. Validate before building anything
        if text.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput("request text is empty".to_string()));
        }

        // 2. Detect tools and build the conversation
        let tools = self.registry.determine_tools(text);
        info!("Tools detected: {:?}", tools);
        let messages = build_messages_with_tools(text, &tools);

        // 3. Wrap and send
        let request = make_request(messages, self.next_id.fetch_add(1, Ordering::Relaxed));
        let response = self.gateway.send(&request).await.map_err(|e| {
            error!("Gateway call {} failed: {}", request.id, e);
            OrchestratorError::from(e)
        })?;

        if let Some(err) = &response.error {
            return Err(OrchestratorError::GatewayFailure(format!(
                "backend error {}: {}",
                err.code, err.message
            )));
        }
        if response.id != request.id {
            return Err(OrchestratorError::GatewayFailure(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        // 4. Merge detected tools into a copy of the result
        let result = merge_tools(response.result.as_ref(), &tools)?;
        Ok(ChatOutcome {
            envelope: RpcResponse::success(response.id, result),
            tools_detected: tools,
        })
    }

    pub async fn build_and_run_demo(&self, input: &str) -> OrchestratorResult<Run> {
        let mut run = build_run_with_output(input);
        self.runtime.execute_run(&mut run).await?;
        Ok(run)
    }
}

fn merge_tools(result: Option<&Value>, tools: &[String]) -> OrchestratorResult<Value> {
    let mut merged = match result {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(OrchestratorError::EncodingFailure(format!(
                "result payload is not an object: {}",
                other
            )))
        }
        None => return Err(OrchestratorError::GatewayFailure("response has no result".to_string())),
    };
    merged.insert(TOOLS_DETECTED_KEY.to_string(), serde_json::to_value(tools)?);
    Ok(Value::Object(merged))
}
