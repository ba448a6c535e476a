//! Statement monitoring and hooks.
//!
//! [`InstrumentedExecutor`] wraps any [`Executor`](crate::Executor). Hooks can
//! log, rewrite or veto SQL before it runs; monitors receive the duration and
//! outcome afterwards. Queries are reported when their row stream is
//! exhausted or dropped, with the number of rows actually read.
//!
//! ```rust,ignore
//! use sqldbr::monitor::{InstrumentedExecutor, MonitorConfig, StatsMonitor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let conn = InstrumentedExecutor::new(conn)
//!     .with_config(
//!         MonitorConfig::new()
//!             .with_query_timeout(Duration::from_secs(30))
//!             .with_slow_query_threshold(Duration::from_secs(1))
//!             .enable_monitoring(),
//!     )
//!     .with_monitor_arc(stats.clone());
//!
//! let n = select.with_args().with_id("recent").load(&conn, &mut rows).await?;
//! let recent = stats.stats().statement("recent", "").cloned();
//! ```

mod config;
mod instrumented;
mod monitors;
mod stream;
mod types;

#[cfg(feature = "tracing")]
mod tracing_hook;

#[cfg(test)]
mod tests;

pub use config::MonitorConfig;
pub use instrumented::InstrumentedExecutor;
pub use monitors::{
    CompositeHook, CompositeMonitor, LoggingMonitor, NoopMonitor, QueryStats, StatementKey,
    StatementStats, StatsMonitor,
};
pub use types::{
    Binding, HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryType, StreamEnd,
};

#[cfg(feature = "tracing")]
pub use tracing_hook::TracingSqlHook;

/// Cut `sql` to at most `max_bytes` without splitting a character.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
