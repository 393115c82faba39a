//! Run / Task tree and the output accumulator its tasks share.
//!
//! A [`Run`] owns its root tasks, each task owns its subtasks, and every task
//! in the run holds a clone of the same [`SharedOutput`] handle. Subtask nodes
//! are never shared between parents, so the tree is acyclic by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::ids::{new_run_id, new_task_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "LLM")]
    Llm,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// Well-known steps whose results are merged into the run output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// LLM step whose response becomes the run's answer.
    Analyze,
    /// LLM step that contributes the machinery list.
    EnumerateMachinery,
    /// Tool step that labels every machinery entry with its category.
    CategorizeMachinery,
}

// (command, kind it runs as, canonical prompt)
const COMMANDS: &[(Command, TaskKind, &str)] = &[
    (Command::Analyze, TaskKind::Llm, "Analyze scenario"),
    (Command::EnumerateMachinery, TaskKind::Llm, "List all machinery"),
    (Command::CategorizeMachinery, TaskKind::Tool, "Categorize machinery"),
];

impl Command {
    fn entry(&self) -> &'static (Command, TaskKind, &'static str) {
        COMMANDS
            .iter()
            .find(|(c, _, _)| c == self)
            .unwrap_or_else(|| unreachable!("every command has a table entry"))
    }

    pub fn kind(&self) -> TaskKind {
        self.entry().1
    }

    pub fn prompt(&self) -> &'static str {
        self.entry().2
    }

    /// Resolves a canonical prompt to its command. Exact match only.
    pub fn from_prompt(prompt: &str) -> Option<Command> {
        COMMANDS.iter().find(|(_, _, p)| *p == prompt).map(|(c, _, _)| *c)
    }

    pub fn all() -> impl Iterator<Item = Command> {
        COMMANDS.iter().map(|(c, _, _)| *c)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub id: String,
    pub answer: String,
    pub machinery: Vec<String>,
}

/// Handle to a run's single [`RunOutput`]. Clones point at the same value;
/// every mutation takes the lock, so writers are serialized.
#[derive(Debug, Clone)]
pub struct SharedOutput(Arc<Mutex<RunOutput>>);

impl SharedOutput {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(RunOutput { id: run_id.into(), ..Default::default() })))
    }

    fn lock(&self) -> MutexGuard<'_, RunOutput> {
        // A panicked writer cannot leave RunOutput half-updated in a way we care about
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn run_id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn snapshot(&self) -> RunOutput {
        self.lock().clone()
    }

    pub fn set_answer(&self, answer: impl Into<String>) {
        self.lock().answer = answer.into();
    }

    pub fn extend_machinery<I, S>(&self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().machinery.extend(items.into_iter().map(Into::into));
    }

    // Rewrites every entry in place; count and order are preserved
    pub fn map_machinery(&self, f: impl Fn(&str) -> String) {
        let mut output = self.lock();
        for item in output.machinery.iter_mut() {
            *item = f(item);
        }
    }

    pub fn same_as(&self, other: &SharedOutput) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Serialize for SharedOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    pub run_id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    pub input: String,
    pub output: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub subtasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub run_output: SharedOutput,
}

impl Task {
    pub fn new(run_output: &SharedOutput, kind: TaskKind, input: impl Into<String>) -> Self {
        Self {
            id: new_task_id(),
            run_id: run_output.run_id(),
            kind,
            command: None,
            input: input.into(),
            output: String::new(),
            status: TaskStatus::Pending,
            error: None,
            subtasks: Vec::new(),
            created_at: Utc::now(),
            run_output: run_output.clone(),
        }
    }

    // A task for a well-known command, using its canonical kind and prompt
    pub fn for_command(run_output: &SharedOutput, command: Command) -> Self {
        let mut task = Self::new(run_output, command.kind(), command.prompt());
        task.command = Some(command);
        task
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_subtasks(mut self, subtasks: Vec<Task>) -> Self {
        self.subtasks = subtasks;
        self
    }

    /// This task and all of its descendants, parent before children.
    pub fn walk(&self) -> Vec<&Task> {
        let mut out = vec![self];
        for sub in &self.subtasks {
            out.extend(sub.walk());
        }
        out
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub output: SharedOutput,
}

impl Run {
    pub fn new() -> Self {
        let id = new_run_id();
        Self {
            output: SharedOutput::new(id.clone()),
            id,
            created_at: Utc::now(),
            tasks: Vec::new(),
        }
    }

    pub fn find(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().flat_map(|t| t.walk()).find(|t| t.id == task_id)
    }

    pub fn is_complete(&self) -> bool {
        self.tasks.iter().flat_map(|t| t.walk()).all(|t| t.status == TaskStatus::Done)
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}

/// The canonical demo topology: an `Analyze` root with an `EnumerateMachinery`
/// and a `CategorizeMachinery` subtask, all writing to one output.
pub fn build_run_with_output(input: &str) -> Run {
    info!("Building demo run for input: {}", input);
    let mut run = Run::new();

    let root = Task::for_command(&run.output, Command::Analyze).with_subtasks(vec![
        Task::for_command(&run.output, Command::EnumerateMachinery),
        Task::for_command(&run.output, Command::CategorizeMachinery),
    ]);

    if let Ok(json) = root.to_json_pretty() {
        debug!("Task tree:\n{}", json);
    }

    run.tasks.push(root);
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table_is_consistent() {
        for command in Command::all() {
            assert_eq!(Command::from_prompt(command.prompt()), Some(command));
        }
        assert_eq!(Command::CategorizeMachinery.kind(), TaskKind::Tool);
        assert_eq!(Command::from_prompt("analyze scenario"), None);
    }

    #[test]
    fn test_demo_run_shape() {
        let run = build_run_with_output("x");
        assert_eq!(run.tasks.len(), 1);

        let root = &run.tasks[0];
        assert_eq!(root.kind, TaskKind::Llm);
        assert_eq!(root.input, "Analyze scenario");
        assert_eq!(root.subtasks.len(), 2);
        assert_eq!(root.subtasks[0].command, Some(Command::EnumerateMachinery));
        assert_eq!(root.subtasks[1].kind, TaskKind::Tool);

        for task in root.walk() {
            assert_eq!(task.run_id, run.id);
            assert_eq!(task.status, TaskStatus::Pending);
            assert!(task.run_output.same_as(&run.output));
        }
        assert_eq!(run.output.snapshot().id, run.id);
    }

    #[test]
    fn test_shared_output_is_not_copied_per_task() {
        let run = build_run_with_output("x");
        run.tasks[0].subtasks[1].run_output.extend_machinery(["Forklift"]);
        assert_eq!(run.tasks[0].run_output.snapshot().machinery, vec!["Forklift"]);
    }

    #[test]
    fn test_map_machinery_keeps_order_and_count() {
        let output = SharedOutput::new("run-1");
        output.extend_machinery(["a", "b", "c"]);
        output.map_machinery(|m| m.to_uppercase());
        assert_eq!(output.snapshot().machinery, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_task_json_shape() {
        let run = build_run_with_output("x");
        let value = serde_json::to_value(&run).unwrap();

        assert_eq!(value["output"]["id"], run.id.as_str());
        let root = &value["tasks"][0];
        assert_eq!(root["type"], "LLM");
        assert_eq!(root["status"], "pending");
        assert_eq!(root["command"], "analyze");
        assert!(root.get("run_output").is_none());
        assert!(root.get("error").is_none());
        assert_eq!(root["subtasks"][1]["type"], "Tool");
    }
}
