//! Flags that keep saves and uploads from overlapping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Upload-enabled state shared by every collection of a view.
///
/// Uploads are enabled while no submission cycle holds the gate.
#[derive(Debug, Clone, Default)]
pub struct UploadGate(Arc<AtomicUsize>);

impl UploadGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire) == 0
    }

    /// Suppress uploads until the returned hold is dropped.
    pub fn hold(&self) -> GateHold {
        self.0.fetch_add(1, Ordering::AcqRel);
        GateHold(self.0.clone())
    }
}

/// Keeps an [`UploadGate`] closed while alive.
#[derive(Debug)]
pub struct GateHold(Arc<AtomicUsize>);

impl Drop for GateHold {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Marks a collection as having a submission cycle in flight.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFlag(Arc<AtomicBool>);

impl SubmissionFlag {
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Claim the flag, or `None` when a cycle is already running.
    pub fn try_acquire(&self) -> Option<SubmissionTicket> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmissionTicket(self.0.clone()))
    }
}

/// Releases its [`SubmissionFlag`] on drop.
#[derive(Debug)]
pub struct SubmissionTicket(Arc<AtomicBool>);

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
