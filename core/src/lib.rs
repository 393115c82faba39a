//! Task orchestration for the risk assessment assistant.
//!
//! Free text comes in, the tool registry and input classifier decide how to
//! frame it, the message builder and envelope codec turn it into a JSON-RPC
//! request, and the gateway delivers it to the model backend. Separately, a
//! [`task::Run`] tree can be built and driven by the [`runtime::Runtime`].

pub mod classify;
pub mod config;
pub mod error;
pub mod ids;
pub mod llm;
pub mod messages;
pub mod orchestrator;
pub mod registry;
pub mod rpc;
pub mod runtime;
pub mod task;

pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{ChatOutcome, Orchestrator};
