use std::time::Duration;

/// Monitoring and timeout settings of an
/// [`InstrumentedExecutor`](super::InstrumentedExecutor).
///
/// Monitoring is off until [`enable_monitoring`](Self::enable_monitoring) is
/// called; hooks run regardless.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    /// Per-statement timeout. `None` means no timeout.
    pub query_timeout: Option<Duration>,
    /// Statements slower than this trigger `on_slow_query`.
    pub slow_query_threshold: Option<Duration>,
    pub monitoring_enabled: bool,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements exceeding `timeout` fail with a cancellation error. For
    /// queries the timeout covers reading the whole row stream.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        self.monitoring_enabled = true;
        self
    }

    pub fn disable_monitoring(mut self) -> Self {
        self.monitoring_enabled = false;
        self
    }
}
