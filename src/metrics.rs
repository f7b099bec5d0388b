//! Request metrics for the chat endpoint
//!
//! Metrics are emitted through the `metrics` facade and are no-ops unless a
//! recorder is installed (see [`init_metrics_exporter`]).
//!
//! # Metrics
//!
//! - `chat_requests_total`: Counter of chat requests by mode
//! - `chat_request_duration_seconds`: Histogram of request duration by mode and outcome
//! - `chat_errors_total`: Counter of failed requests by error kind
//! - `chat_active_streams`: Gauge of streaming responses currently open
//! - `conversations_pruned_total`: Counter of conversations removed by expiry
//!
//! # Examples
//!
//! ```
//! use chatrelay::metrics::{ChatMode, RequestMetrics};
//!
//! let metrics = RequestMetrics::new(ChatMode::Stream);
//! metrics.record_completion();
//! ```

use metrics::{counter, decrement_gauge, histogram, increment_counter, increment_gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Response mode of a chat request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// One JSON response
    Blocking,
    /// Server-push event stream
    Stream,
}

impl ChatMode {
    /// Label value for this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Stream => "stream",
        }
    }
}

/// Metrics tracker for a single chat request
///
/// Streaming requests hold the `chat_active_streams` gauge for as long as
/// the tracker lives. The gauge is released on [`Drop`] even if the stream
/// is abandoned before an outcome is recorded.
///
/// Uses an atomic flag instead of a `Cell` so the tracker can move into the
/// task that drives the event stream.
#[derive(Debug)]
pub struct RequestMetrics {
    mode: ChatMode,
    start: Instant,
    recorded: AtomicBool,
}

impl RequestMetrics {
    /// Starts tracking a request
    pub fn new(mode: ChatMode) -> Self {
        increment_counter!("chat_requests_total", "mode" => mode.as_str());
        if mode == ChatMode::Stream {
            increment_gauge!("chat_active_streams", 1.0);
        }

        Self {
            mode,
            start: Instant::now(),
            recorded: AtomicBool::new(false),
        }
    }

    /// Records a successful request
    pub fn record_completion(&self) {
        if self.mark_recorded() {
            return;
        }
        self.finish("success");
    }

    /// Records a failed request
    ///
    /// # Arguments
    ///
    /// * `kind` - Error kind label ("upstream", "stream_interrupted", "disconnected", ...)
    pub fn record_error(&self, kind: &str) {
        if self.mark_recorded() {
            return;
        }
        increment_counter!(
            "chat_errors_total",
            "mode" => self.mode.as_str(),
            "kind" => kind.to_string()
        );
        self.finish("error");
    }

    /// Response mode being tracked
    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Time since the request started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    fn is_recorded(&self) -> bool {
        self.recorded.load(Ordering::SeqCst)
    }

    /// Returns true if an outcome was already recorded
    fn mark_recorded(&self) -> bool {
        self.recorded.swap(true, Ordering::SeqCst)
    }

    fn finish(&self, outcome: &'static str) {
        histogram!(
            "chat_request_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "mode" => self.mode.as_str(),
            "outcome" => outcome
        );
        self.release_stream();
    }

    fn release_stream(&self) {
        if self.mode == ChatMode::Stream {
            decrement_gauge!("chat_active_streams", 1.0);
        }
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        if !self.is_recorded() {
            self.release_stream();
        }
    }
}

/// Records conversations removed by an expiry sweep
pub fn record_pruned(count: usize) {
    if count > 0 {
        counter!("conversations_pruned_total", count as u64);
    }
}

/// Initializes the metrics exporter for Prometheus
///
/// With the `prometheus` feature enabled this installs the Prometheus
/// exporter on its default listen address. Without it the call is a no-op.
///
/// # Examples
///
/// ```
/// use chatrelay::metrics::init_metrics_exporter;
///
/// init_metrics_exporter();
/// ```
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metrics_creation() {
        let metrics = RequestMetrics::new(ChatMode::Blocking);
        assert_eq!(metrics.mode(), ChatMode::Blocking);
        assert!(!metrics.is_recorded());
    }

    #[test]
    fn test_record_completion_sets_flag() {
        let metrics = RequestMetrics::new(ChatMode::Stream);
        metrics.record_completion();
        assert!(metrics.is_recorded());
    }

    #[test]
    fn test_record_error_then_completion_ignored() {
        let metrics = RequestMetrics::new(ChatMode::Stream);
        metrics.record_error("upstream");
        metrics.record_completion();
        assert!(metrics.is_recorded());
    }

    #[test]
    fn test_drop_without_recording() {
        let _metrics = RequestMetrics::new(ChatMode::Stream);
    }

    #[test]
    fn test_elapsed_increases() {
        let metrics = RequestMetrics::new(ChatMode::Blocking);
        let t1 = metrics.elapsed();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(metrics.elapsed() > t1);
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(ChatMode::Blocking.as_str(), "blocking");
        assert_eq!(ChatMode::Stream.as_str(), "stream");
    }

    #[test]
    fn test_record_pruned_and_exporter_do_not_panic() {
        record_pruned(0);
        record_pruned(3);
        init_metrics_exporter();
    }
}
