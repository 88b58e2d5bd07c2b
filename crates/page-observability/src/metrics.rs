//! Per-request render timing metrics.

use std::time::Duration;

use page_core::{RequestId, TimingContext};
use serde::{Deserialize, Serialize};

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Html,
    Data,
    NotFound,
    Redirect,
    Rewrite,
}

impl OutcomeKind {
    /// Label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Data => "data",
            Self::NotFound => "not_found",
            Self::Redirect => "redirect",
            Self::Rewrite => "rewrite",
        }
    }
}

/// Metrics for one completed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    /// Request ID for correlation.
    pub request_id: String,
    /// Page pathname.
    pub path: String,
    /// Whether it was a data request.
    pub data_request: bool,
    /// Options synthesis duration (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesize_us: Option<u64>,
    /// Engine render duration (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_us: Option<u64>,
    /// Classification duration (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classify_us: Option<u64>,
    /// Total processing duration (microseconds).
    pub total_us: u64,
    /// Outcome kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeKind>,
    /// HTTP status code (absent for rewrites).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Response body size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_bytes: Option<usize>,
}

impl RequestMetrics {
    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.request_id.clone())
    }
}

/// Collector for request metrics.
#[derive(Debug)]
pub struct MetricsCollector {
    request_id: RequestId,
    path: String,
    data_request: bool,
    timing: TimingContext,
    outcome: Option<OutcomeKind>,
    status_code: Option<u16>,
    body_bytes: Option<usize>,
}

const SYNTH_START: &str = "synthesize_start";
const SYNTH_END: &str = "synthesize_end";
const RENDER_START: &str = "render_start";
const RENDER_END: &str = "render_end";
const CLASSIFY_START: &str = "classify_start";
const CLASSIFY_END: &str = "classify_end";

impl MetricsCollector {
    /// Create a new collector; the clock starts now.
    pub fn new(request_id: RequestId, path: impl Into<String>, data_request: bool) -> Self {
        Self {
            request_id,
            path: path.into(),
            data_request,
            timing: TimingContext::new(),
            outcome: None,
            status_code: None,
            body_bytes: None,
        }
    }

    /// Record synthesis start.
    pub fn synthesize_started(&mut self) {
        self.timing.mark(SYNTH_START);
    }

    /// Record synthesis end.
    pub fn synthesize_finished(&mut self) {
        self.timing.mark(SYNTH_END);
    }

    /// Record engine render start.
    pub fn render_started(&mut self) {
        self.timing.mark(RENDER_START);
    }

    /// Record engine render end.
    pub fn render_finished(&mut self) {
        self.timing.mark(RENDER_END);
    }

    /// Record classification start.
    pub fn classify_started(&mut self) {
        self.timing.mark(CLASSIFY_START);
    }

    /// Record the classified response.
    pub fn classify_finished(
        &mut self,
        outcome: OutcomeKind,
        status_code: Option<u16>,
        body_bytes: Option<usize>,
    ) {
        self.timing.mark(CLASSIFY_END);
        self.outcome = Some(outcome);
        self.status_code = status_code;
        self.body_bytes = body_bytes;
    }

    /// Finish collection.
    pub fn finish(self) -> RequestMetrics {
        let us = |d: Duration| d.as_micros() as u64;
        RequestMetrics {
            request_id: self.request_id.to_string(),
            path: self.path,
            data_request: self.data_request,
            synthesize_us: self.timing.between(SYNTH_START, SYNTH_END).map(us),
            render_us: self.timing.between(RENDER_START, RENDER_END).map(us),
            classify_us: self.timing.between(CLASSIFY_START, CLASSIFY_END).map(us),
            total_us: us(self.timing.elapsed()),
            outcome: self.outcome,
            status_code: self.status_code,
            body_bytes: self.body_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle_records_all_phases() {
        let mut collector = MetricsCollector::new(RequestId::from_string("r-1"), "/about", false);
        collector.synthesize_started();
        collector.synthesize_finished();
        collector.render_started();
        collector.render_finished();
        collector.classify_started();
        collector.classify_finished(OutcomeKind::Html, Some(200), Some(42));

        let metrics = collector.finish();
        assert_eq!(metrics.request_id, "r-1");
        assert!(metrics.synthesize_us.is_some());
        assert!(metrics.render_us.is_some());
        assert!(metrics.classify_us.is_some());
        assert_eq!(metrics.outcome, Some(OutcomeKind::Html));
        assert_eq!(metrics.status_code, Some(200));
        assert_eq!(metrics.body_bytes, Some(42));
    }

    #[test]
    fn test_partial_cycle_skips_missing_phases() {
        let mut collector = MetricsCollector::new(RequestId::from_string("r-2"), "/", true);
        collector.synthesize_started();
        collector.synthesize_finished();

        let metrics = collector.finish();
        assert!(metrics.render_us.is_none());
        assert!(metrics.outcome.is_none());

        let json = metrics.to_json();
        assert!(json.contains(r#""data_request":true"#));
        assert!(!json.contains("render_us"));
    }

    #[test]
    fn test_rewrite_has_no_status() {
        let mut collector = MetricsCollector::new(RequestId::from_string("r-3"), "/x", false);
        collector.classify_started();
        collector.classify_finished(OutcomeKind::Rewrite, None, None);
        let metrics = collector.finish();
        assert_eq!(metrics.outcome.map(OutcomeKind::as_str), Some("rewrite"));
        assert!(metrics.status_code.is_none());
    }
}
