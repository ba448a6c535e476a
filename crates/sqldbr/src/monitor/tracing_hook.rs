use super::truncate_sql_bytes;
use super::types::{HookAction, QueryContext, QueryHook, QueryResult};
use std::time::Duration;
use tracing::Level;

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN => tracing::warn!($($field)*),
            Level::INFO => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// Emits every statement under the `sqldbr.sql` target.
///
/// The SQL is logged from [`QueryHook::before_query`], so it shows up even
/// when monitoring is disabled. With monitoring enabled the outcome and
/// duration follow as a second event; failures are always logged at `WARN`.
#[derive(Debug, Clone)]
pub struct TracingSqlHook {
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingSqlHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingSqlHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryHook for TracingSqlHook {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        let id = ctx.statement_id.as_deref().unwrap_or("-");
        let sql = self.truncate_sql(&ctx.exec_sql);
        if ctx.exec_sql != ctx.canonical_sql {
            let canonical_sql = self.truncate_sql(&ctx.canonical_sql);
            emit_at_level!(
                self.level,
                target: "sqldbr.sql",
                kind = %ctx.query_type,
                id,
                cache_key = ctx.cache_key.as_deref(),
                binding = ?ctx.binding,
                param_count = ctx.param_count,
                sql = %sql,
                canonical_sql = %canonical_sql,
            );
        } else {
            emit_at_level!(
                self.level,
                target: "sqldbr.sql",
                kind = %ctx.query_type,
                id,
                cache_key = ctx.cache_key.as_deref(),
                binding = ?ctx.binding,
                param_count = ctx.param_count,
                sql = %sql,
            );
        }
        HookAction::Continue
    }

    fn after_query(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        let id = ctx.statement_id.as_deref().unwrap_or("-");
        let stream_end = ctx.stream_end.map(tracing::field::debug);
        match result {
            QueryResult::Error(error) => tracing::warn!(
                target: "sqldbr.sql",
                kind = %ctx.query_type,
                id,
                ?duration,
                error = %error,
                stream_end,
                "statement failed"
            ),
            ok => emit_at_level!(
                self.level,
                target: "sqldbr.sql",
                kind = %ctx.query_type,
                id,
                ?duration,
                result = %ok,
                stream_end,
                "statement finished"
            ),
        }
    }
}
