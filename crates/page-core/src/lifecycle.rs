//! Worker lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Phases of the worker's request loop.
///
/// The loop has a single steady cycle:
/// `WaitingForRequest -> Processing -> Sending -> WaitingForRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Blocked on the channel for the next message.
    WaitingForRequest,
    /// Synthesizing options, rendering and classifying.
    Processing,
    /// Writing the response to the channel.
    Sending,
    /// The loop has stopped; the process is about to exit.
    Terminated,
}

impl WorkerPhase {
    /// Check whether moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: WorkerPhase) -> bool {
        use WorkerPhase::*;
        matches!(
            (self, next),
            (WaitingForRequest, Processing)
                | (Processing, Sending)
                | (Sending, WaitingForRequest)
                | (_, Terminated)
        ) && self != Terminated
    }

    /// Short lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaitingForRequest => "waiting",
            Self::Processing => "processing",
            Self::Sending => "sending",
            Self::Terminated => "terminated",
        }
    }
}

/// Timing marks for one request cycle.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context starting now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Time between two marks, if both were recorded in order.
    pub fn between(&self, from: &str, to: &str) -> Option<Duration> {
        let from = self.marks.get(from)?;
        let to = self.marks.get(to)?;
        to.checked_duration_since(*from)
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_cycle_transitions() {
        assert!(WorkerPhase::WaitingForRequest.can_transition_to(WorkerPhase::Processing));
        assert!(WorkerPhase::Processing.can_transition_to(WorkerPhase::Sending));
        assert!(WorkerPhase::Sending.can_transition_to(WorkerPhase::WaitingForRequest));
    }

    #[test]
    fn test_no_skipping_send() {
        assert!(!WorkerPhase::Processing.can_transition_to(WorkerPhase::WaitingForRequest));
        assert!(!WorkerPhase::WaitingForRequest.can_transition_to(WorkerPhase::Sending));
    }

    #[test]
    fn test_terminated_is_final() {
        assert!(WorkerPhase::Processing.can_transition_to(WorkerPhase::Terminated));
        assert!(!WorkerPhase::Terminated.can_transition_to(WorkerPhase::WaitingForRequest));
        assert!(!WorkerPhase::Terminated.can_transition_to(WorkerPhase::Terminated));
    }

    #[test]
    fn test_between_marks() {
        let mut timing = TimingContext::new();
        timing.mark("a");
        timing.mark("b");
        assert!(timing.between("a", "b").is_some());
        assert!(timing.between("a", "missing").is_none());
    }
}
