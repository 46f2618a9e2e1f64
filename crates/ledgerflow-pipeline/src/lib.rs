//! Ledgerflow Pipeline
//!
//! This crate runs a fixed, ordered list of agent steps (navigate, fetch
//! data, analyze, compose, persist) against a streaming producer and an
//! artifact sink, threading each step's output into the next through a
//! typed memory.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PipelineDriver                         │
//! │  - tick() runs at most one step                             │
//! │  - run_to_completion() ticks until nothing advances         │
//! │  - pacing dwell between steps                               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PipelineSession                         │
//! │  - Arc<RwLock<Pipeline>> shared with the host               │
//! │  - ReentrancyGuard: processing latch + mounted token        │
//! │  - writes are dropped once detached                         │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       StepExecutor                          │
//! │  - streams producer fragments into the step preview         │
//! │  - records memory, applies the error policy                 │
//! │  - persists the report through PersistenceStep              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use ledgerflow_config::PipelineDef;
//! use ledgerflow_pipeline::{Pipeline, PipelineDriver, PipelineSession, StepExecutor};
//!
//! let def = PipelineDef::audit_report(Some("doc-1".to_string()));
//! let session = PipelineSession::attach(Pipeline::from_def(&def));
//! let executor = StepExecutor::from_def(&def, producer, sink);
//! let driver = PipelineDriver::new(session.clone(), Arc::new(executor));
//!
//! let summary = driver.run_to_completion().await?;
//! ```

mod driver;
mod error;
mod executor;
mod guard;
mod memory;
mod pacing;
mod persist;
mod session;
mod state;
mod status;
mod step;

pub use driver::{PipelineDriver, RunSummary, TickOutcome};
pub use error::{PipelineError, StateError, StepError};
pub use executor::{
  ANALYSIS_INCOMPLETE, ERROR_MARKER, NO_DATA_FOUND, StepExecutor, StepRun, error_fragment,
};
pub use guard::{ProcessingPermit, ReentrancyGuard};
pub use memory::{ANALYSIS_KEY, EXCEL_DATA_KEY, Memory};
pub use pacing::Pacing;
pub use persist::{EMPTY_REPORT, Persisted, PersistenceStep};
pub use session::PipelineSession;
pub use state::{Pipeline, PipelineSnapshot};
pub use status::{
  AgentPhase, ChannelBroadcaster, NoopBroadcaster, StatusBroadcaster, StatusUpdate,
  TracingBroadcaster,
};
pub use step::{Step, StepOutcome, StepStatus};

/// Build a session and driver for a definition.
///
/// Validates the definition first.
pub fn launch(
  def: &ledgerflow_config::PipelineDef,
  executor: StepExecutor,
) -> Result<PipelineDriver, PipelineError> {
  def.validate()?;
  let session = PipelineSession::attach(Pipeline::from_def(def));
  Ok(PipelineDriver::new(session, std::sync::Arc::new(executor)))
}
