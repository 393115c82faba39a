use async_recursion::async_recursion;
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::llm::Gateway;
use crate::messages::build_messages;
use crate::rpc::make_request;
use crate::task::{Command, Run, Task, TaskKind, TaskStatus};

pub const DEMO_MACHINERY: [&str; 3] = ["Excavator", "Crane", "Bulldozer"];
pub const CATEGORY_LABEL: &str = "Heavy Equipment";
pub const CATEGORIZED_OUTPUT: &str = "Categorized machinery";

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {task_id}: no tool action for input '{input}'")]
    MissingCommand { task_id: String, input: String },

    #[error("task {task_id}: command {command:?} cannot run as a {kind:?} task")]
    KindMismatch { task_id: String, command: Command, kind: TaskKind },

    #[error("task {task_id}: responder failed: {message}")]
    Responder { task_id: String, message: String },
}

/// Produces the text answer for an LLM task.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, input: &str) -> anyhow::Result<String>;
}

// Deterministic stand-in for a model call
#[derive(Debug, Default, Clone)]
pub struct StubResponder;

#[async_trait]
impl Responder for StubResponder {
    async fn respond(&self, input: &str) -> anyhow::Result<String> {
        Ok(format!("Fake LLM response for: {}", input))
    }
}

/// Answers LLM tasks through the backend gateway, reading `result.text`.
pub struct GatewayResponder {
    gateway: Gateway,
    next_id: AtomicI64,
}

impl GatewayResponder {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway, next_id: AtomicI64::new(1) }
    }
}

#[async_trait]
impl Responder for GatewayResponder {
    async fn respond(&self, input: &str) -> anyhow::Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self.gateway.send(&make_request(build_messages(input), id)).await?;

        if let Some(err) = response.error {
            anyhow::bail!("backend error {}: {}", err.code, err.message);
        }
        anyhow::ensure!(
            response.id == id,
            "response id {} does not match request id {}",
            response.id,
            id
        );
        response
            .result
            .as_ref()
            .and_then(|r| r.get("text"))
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("backend result has no text field"))
    }
}

/// Drives task trees depth-first: a parent finishes its own step before its
/// subtasks start, siblings run in declared order, one at a time.
#[derive(Clone)]
pub struct Runtime {
    responder: Arc<dyn Responder>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(StubResponder))
    }
}

impl Runtime {
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self { responder }
    }

    /// Executes every root task of `run` in order. Stops at the first failure.
    pub async fn execute_run(&self, run: &mut Run) -> Result<Vec<String>, TaskError> {
        info!("Executing run {} ({} root tasks)", run.id, run.tasks.len());
        let mut executed = Vec::new();
        for task in run.tasks.iter_mut() {
            self.visit(task, &mut executed).await?;
        }
        info!("Run {} finished, {} tasks executed", run.id, executed.len());
        Ok(executed)
    }

    /// Executes `task` and its subtree, returning the ids of the tasks run, in
    /// execution order.
    ///
    /// A failing task is marked `failed` and execution halts: its subtasks and
    /// any later siblings are left `pending`.
    pub async fn execute_task(&self, task: &mut Task) -> Result<Vec<String>, TaskError> {
        let mut executed = Vec::new();
        self.visit(task, &mut executed).await?;
        Ok(executed)
    }

    #[async_recursion]
    async fn visit(&self, task: &mut Task, executed: &mut Vec<String>) -> Result<(), TaskError> {
        task.status = TaskStatus::Running;
        executed.push(task.id.clone());

        if let Err(e) = self.perform(task).await {
            error!("Task failed: {}", e);
            task.status = TaskStatus::Failed;
            task.error = Some(e.to_string());
            return Err(e);
        }

        task.status = TaskStatus::Done;
        info!("Task done: {} Output: {}", task.input, task.output);

        for sub in task.subtasks.iter_mut() {
            self.visit(sub, executed).await?;
        }
        Ok(())
    }

    // The type-specific step of a single task
    async fn perform(&self, task: &mut Task) -> Result<(), TaskError> {
        if let Some(command) = task.command {
            if command.kind() != task.kind {
                return Err(TaskError::KindMismatch {
                    task_id: task.id.clone(),
                    command,
                    kind: task.kind,
                });
            }
        }

        match task.kind {
            TaskKind::Llm => {
                let response = self.responder.respond(&task.input).await.map_err(|e| {
                    TaskError::Responder { task_id: task.id.clone(), message: e.to_string() }
                })?;
                task.output = response;

                match task.command {
                    Some(Command::Analyze) => task.run_output.set_answer(task.output.clone()),
                    Some(Command::EnumerateMachinery) => task.run_output.extend_machinery(DEMO_MACHINERY),
                    _ => {}
                }
            }
            TaskKind::Tool => match task.command {
                Some(Command::CategorizeMachinery) => {
                    task.run_output.map_machinery(|m| format!("{}: {}", m, CATEGORY_LABEL));
                    task.output = CATEGORIZED_OUTPUT.to_string();
                }
                _ => {
                    return Err(TaskError::MissingCommand {
                        task_id: task.id.clone(),
                        input: task.input.clone(),
                    })
                }
            },
        }
        Ok(())
    }
}
