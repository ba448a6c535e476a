use super::truncate_sql_bytes;
use super::types::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryType};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A monitor that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl QueryMonitor for NoopMonitor {
    fn on_query_complete(&self, _ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {}
}

/// Writes one line per statement to stderr:
///
/// ```text
/// sqldbr select id=load-customers key=by-email interpolated 1.2ms 3 rows | SELECT ...
/// ```
///
/// The id, key and binding parts only appear for statements issued by a
/// [`Dbr`](crate::Dbr) which has them.
#[derive(Debug, Clone)]
pub struct LoggingMonitor {
    /// Skip statements faster than this.
    pub min_duration: Option<Duration>,
    /// Cut logged SQL to this many bytes.
    pub max_sql_length: Option<usize>,
}

impl Default for LoggingMonitor {
    fn default() -> Self {
        Self {
            min_duration: None,
            max_sql_length: Some(200),
        }
    }
}

impl LoggingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_duration(mut self, duration: Duration) -> Self {
        self.min_duration = Some(duration);
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub(crate) fn truncate_sql<'s>(&self, sql: &'s str) -> std::borrow::Cow<'s, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)).into(),
            _ => sql.into(),
        }
    }

    pub(crate) fn line(&self, ctx: &QueryContext, duration: Duration, outcome: &str) -> String {
        let mut line = format!("sqldbr {}", ctx.query_type);
        if let Some(id) = &ctx.statement_id {
            let _ = write!(line, " id={id}");
        }
        if let Some(key) = ctx.cache_key.as_deref().filter(|key| !key.is_empty()) {
            let _ = write!(line, " key={key}");
        }
        if ctx.is_interpolated() {
            line.push_str(" interpolated");
        }
        let _ = write!(line, " {duration:?} {outcome} | {}", self.truncate_sql(&ctx.exec_sql));
        line
    }
}

impl QueryMonitor for LoggingMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        if self.min_duration.is_some_and(|min| duration < min) {
            return;
        }
        eprintln!("{}", self.line(ctx, duration, &result.to_string()));
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        eprintln!("{}", self.line(ctx, duration, "SLOW"));
    }
}

/// Identifies one bound statement: the DBR's id and the cache key of the
/// template it ran. Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatementKey {
    pub id: String,
    pub cache_key: String,
}

impl StatementKey {
    pub fn new(id: impl Into<String>, cache_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cache_key: cache_key.into(),
        }
    }

    /// The key of a context issued by a DBR; `None` for raw SQL.
    fn of(ctx: &QueryContext) -> Option<Self> {
        let cache_key = ctx.cache_key.as_deref()?;
        Some(Self::new(ctx.statement_id.as_deref().unwrap_or_default(), cache_key))
    }
}

/// Counters for one [`StatementKey`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementStats {
    pub executions: u64,
    pub failures: u64,
    /// Executions with arguments written into the SQL.
    pub interpolated: u64,
    /// Rows read plus rows affected.
    pub rows: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    /// SQL sent by the latest execution.
    pub last_sql: String,
}

impl StatementStats {
    fn record(&mut self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        self.executions += 1;
        self.failures += u64::from(result.is_error());
        self.interpolated += u64::from(ctx.is_interpolated());
        self.rows = self.rows.saturating_add(result.row_count());
        self.total_duration = self.total_duration.saturating_add(duration);
        self.max_duration = self.max_duration.max(duration);
        ctx.exec_sql.clone_into(&mut self.last_sql);
    }
}

/// Snapshot of a [`StatsMonitor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    pub total_queries: u64,
    pub failed_queries: u64,
    pub total_duration: Duration,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    /// Statements whose arguments were interpolated.
    pub interpolated_count: u64,
    /// Statements sending arguments for `?` placeholders, raw SQL included.
    pub placeholder_count: u64,
    /// Per DBR statement. Raw SQL only shows up in the totals.
    pub statements: BTreeMap<StatementKey, StatementStats>,
}

impl QueryStats {
    pub fn statement(&self, id: &str, cache_key: &str) -> Option<&StatementStats> {
        self.statements.get(&StatementKey::new(id, cache_key))
    }

    /// The statement with the largest single execution time.
    pub fn slowest(&self) -> Option<(&StatementKey, &StatementStats)> {
        self.statements.iter().max_by_key(|(_, stats)| stats.max_duration)
    }
}

/// Aggregates statement counts, durations and per-statement figures.
#[derive(Debug, Default)]
pub struct StatsMonitor {
    stats: Mutex<QueryStats>,
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> QueryStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn reset(&self) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = QueryStats::default();
    }
}

impl QueryMonitor for StatsMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.total_queries += 1;
        stats.failed_queries += u64::from(result.is_error());
        stats.total_duration = stats.total_duration.saturating_add(duration);
        match ctx.query_type {
            QueryType::Select => stats.select_count += 1,
            QueryType::Insert => stats.insert_count += 1,
            QueryType::Update => stats.update_count += 1,
            QueryType::Delete => stats.delete_count += 1,
            QueryType::Other => {}
        }
        if ctx.is_interpolated() {
            stats.interpolated_count += 1;
        } else {
            stats.placeholder_count += 1;
        }
        if let Some(key) = StatementKey::of(ctx) {
            stats
                .statements
                .entry(key)
                .or_default()
                .record(ctx, duration, result);
        }
    }
}

/// Forwards every event to several monitors in order.
#[derive(Default)]
pub struct CompositeMonitor {
    monitors: Vec<Arc<dyn QueryMonitor>>,
}

impl CompositeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add<M: QueryMonitor + 'static>(self, monitor: M) -> Self {
        self.add_arc(Arc::new(monitor))
    }

    pub fn add_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitors.push(monitor);
        self
    }
}

impl QueryMonitor for CompositeMonitor {
    fn on_query_start(&self, ctx: &QueryContext) {
        self.monitors.iter().for_each(|m| m.on_query_start(ctx));
    }

    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        self.monitors
            .iter()
            .for_each(|m| m.on_query_complete(ctx, duration, result));
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        self.monitors.iter().for_each(|m| m.on_slow_query(ctx, duration));
    }
}

/// Runs several hooks in order. Each hook sees the SQL as rewritten by the
/// hooks before it, and the first abort wins.
#[derive(Default)]
pub struct CompositeHook {
    hooks: Vec<Arc<dyn QueryHook>>,
}

impl CompositeHook {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add<H: QueryHook + 'static>(self, hook: H) -> Self {
        self.add_arc(Arc::new(hook))
    }

    pub fn add_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hooks.push(hook);
        self
    }
}

impl QueryHook for CompositeHook {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        let mut exec_sql: Option<String> = None;
        let mut canonical_sql: Option<String> = None;
        let mut current = ctx.clone();
        for hook in &self.hooks {
            match hook.before_query(&current) {
                HookAction::Continue => continue,
                HookAction::Abort(reason) => return HookAction::Abort(reason),
                HookAction::ModifySql {
                    exec_sql: exec,
                    canonical_sql: canonical,
                } => {
                    exec.clone_into(&mut current.exec_sql);
                    exec_sql = Some(exec);
                    if let Some(canonical) = canonical {
                        canonical.clone_into(&mut current.canonical_sql);
                        current.query_type = QueryType::from_sql(&canonical);
                        canonical_sql = Some(canonical);
                    }
                }
            }
        }
        match exec_sql {
            Some(exec_sql) => HookAction::ModifySql {
                exec_sql,
                canonical_sql,
            },
            None => HookAction::Continue,
        }
    }

    fn after_query(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        for hook in &self.hooks {
            hook.after_query(ctx, duration, result);
        }
    }
}
