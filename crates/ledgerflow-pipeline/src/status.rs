//! Agent status broadcasting.
//!
//! Status updates are a side channel for observers (a dashboard badge, a
//! log). They are fire-and-forget: a broadcaster must never block or fail
//! the pipeline.

use ledgerflow_config::Action;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

/// What the agent is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentPhase {
  Navigating,
  Reading,
  Analyzing,
  Writing,
  Saving,
  Saved,
  Complete,
  Halted,
}

impl AgentPhase {
  pub fn for_action(action: Action) -> Self {
    match action {
      Action::Navigate => AgentPhase::Navigating,
      Action::FetchData => AgentPhase::Reading,
      Action::Analyze => AgentPhase::Analyzing,
      Action::Compose => AgentPhase::Writing,
      Action::Persist => AgentPhase::Saving,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
  pub phase: AgentPhase,
  pub detail: String,
}

impl StatusUpdate {
  pub fn new(phase: AgentPhase, detail: impl Into<String>) -> Self {
    Self {
      phase,
      detail: detail.into(),
    }
  }
}

/// Receiver of status updates.
pub trait StatusBroadcaster: Send + Sync {
  fn update(&self, update: StatusUpdate);
}

/// Discards all updates.
#[derive(Debug, Clone, Default)]
pub struct NoopBroadcaster;

impl StatusBroadcaster for NoopBroadcaster {
  fn update(&self, _update: StatusUpdate) {}
}

/// Sends updates to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
  // Unbounded so a slow consumer never stalls a step. Volume is a handful
  // of updates per step.
  sender: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelBroadcaster {
  pub fn new(sender: mpsc::UnboundedSender<StatusUpdate>) -> Self {
    Self { sender }
  }
}

impl StatusBroadcaster for ChannelBroadcaster {
  fn update(&self, update: StatusUpdate) {
    // Receiver may have been dropped
    let _ = self.sender.send(update);
  }
}

/// Logs updates as tracing events.
#[derive(Debug, Clone, Default)]
pub struct TracingBroadcaster;

impl StatusBroadcaster for TracingBroadcaster {
  fn update(&self, update: StatusUpdate) {
    info!(phase = ?update.phase, detail = %update.detail, "agent_status");
  }
}
