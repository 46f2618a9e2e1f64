//! Single-flight and teardown guard.
//!
//! Two independent pieces of state:
//! - a processing latch so at most one step executes at a time, released
//!   when its [`ProcessingPermit`] is dropped (also on early return)
//! - a mounted token, cancelled when the host detaches, after which nothing
//!   may write pipeline state

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct ReentrancyGuard {
  processing: AtomicBool,
  mounted: CancellationToken,
}

impl ReentrancyGuard {
  pub fn new() -> Self {
    Self::default()
  }

  /// Take the latch, or `None` if a step is already executing.
  pub fn try_acquire(&self) -> Option<ProcessingPermit<'_>> {
    self
      .processing
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| ProcessingPermit { guard: self })
  }

  pub fn is_busy(&self) -> bool {
    self.processing.load(Ordering::Acquire)
  }

  pub fn is_mounted(&self) -> bool {
    !self.mounted.is_cancelled()
  }

  /// Mark the host as gone. Irreversible.
  pub fn detach(&self) {
    self.mounted.cancel();
  }

  /// Token cancelled on detach.
  pub fn mounted_token(&self) -> CancellationToken {
    self.mounted.clone()
  }
}

/// Proof of holding the processing latch.
#[derive(Debug)]
pub struct ProcessingPermit<'a> {
  guard: &'a ReentrancyGuard,
}

impl Drop for ProcessingPermit<'_> {
  fn drop(&mut self) {
    self.guard.processing.store(false, Ordering::Release);
  }
}
