use super::*;
use crate::client::{ExecResult, Executor, Row, RowStream, StatementTag};
use crate::error::{DbrError, DbrResult};
use crate::value::Value;
use futures_util::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns `rows` integer rows for every query and records the SQL it saw.
#[derive(Default)]
struct FakeExecutor {
    rows: i64,
    delay: Option<Duration>,
    seen: Mutex<Vec<String>>,
}

impl FakeExecutor {
    fn with_rows(rows: i64) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }
}

impl Executor for FakeExecutor {
    async fn query(&self, sql: &str, _args: &[Value]) -> DbrResult<RowStream> {
        self.seen.lock().unwrap().push(sql.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let columns: Arc<[String]> = vec!["n".to_string()].into();
        let rows = (0..self.rows)
            .map(|n| Row::new(columns.clone(), vec![Value::Int(n)]))
            .collect::<DbrResult<Vec<_>>>()?;
        Ok(RowStream::from_rows(rows))
    }

    async fn exec(&self, sql: &str, _args: &[Value]) -> DbrResult<ExecResult> {
        self.seen.lock().unwrap().push(sql.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if sql.starts_with("BROKEN") {
            return Err(DbrError::fatal("syntax error"));
        }
        Ok(ExecResult {
            rows_affected: 3,
            last_insert_id: 0,
        })
    }
}

#[derive(Default)]
struct RecordingMonitor {
    /// (statement id, result, stream end)
    events: Mutex<Vec<(Option<String>, String, Option<StreamEnd>)>>,
    slow: Mutex<usize>,
}

impl QueryMonitor for RecordingMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, _duration: Duration, result: &QueryResult) {
        self.events.lock().unwrap().push((
            ctx.statement_id.clone(),
            result.to_string(),
            ctx.stream_end,
        ));
    }

    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {
        *self.slow.lock().unwrap() += 1;
    }
}

#[test]
fn test_query_type_detection() {
    assert_eq!(QueryType::from_sql("SELECT * FROM users"), QueryType::Select);
    assert_eq!(QueryType::from_sql("  select * FROM users"), QueryType::Select);
    assert_eq!(
        QueryType::from_sql("(SELECT `a` FROM `t`) UNION (SELECT `a` FROM `u`)"),
        QueryType::Select
    );
    assert_eq!(
        QueryType::from_sql("/* report */ -- x\nSELECT 1"),
        QueryType::Select
    );
    assert_eq!(
        QueryType::from_sql("INSERT INTO `users` (`name`) VALUES (?)"),
        QueryType::Insert
    );
    assert_eq!(
        QueryType::from_sql("REPLACE INTO `users` (`name`) VALUES (?)"),
        QueryType::Insert
    );
    assert_eq!(
        QueryType::from_sql("UPDATE `users` SET `name`=?"),
        QueryType::Update
    );
    assert_eq!(
        QueryType::from_sql("DELETE FROM `users` WHERE (`id` = ?)"),
        QueryType::Delete
    );
    assert_eq!(QueryType::from_sql("SHOW TABLES"), QueryType::Other);
    assert_eq!(QueryType::from_sql("SELECTED"), QueryType::Other);
}

#[test]
fn test_query_type_after_cte() {
    assert_eq!(
        QueryType::from_sql("WITH `c` AS (SELECT 1) SELECT * FROM `c`"),
        QueryType::Select
    );
    assert_eq!(
        QueryType::from_sql("WITH `c` AS (SELECT ')' AS p) DELETE FROM `t`"),
        QueryType::Delete
    );
    assert_eq!(
        QueryType::from_sql("WITH `a` AS (SELECT 1), `b` AS (SELECT (2)) UPDATE `t` SET `x`=1"),
        QueryType::Update
    );
}

#[test]
fn test_truncate_sql_bytes_respects_char_boundaries() {
    assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
    assert_eq!(truncate_sql_bytes("héllo", 2), "h");
}

#[test]
fn test_logging_monitor_truncation() {
    let monitor = LoggingMonitor::new().max_sql_length(10);
    assert_eq!(monitor.truncate_sql("SELECT * FROM users"), "SELECT * F...");
    assert_eq!(monitor.truncate_sql("SELECT 1"), "SELECT 1");
}

#[test]
fn test_logging_monitor_line() {
    let monitor = LoggingMonitor::new();
    let raw = QueryContext::new("SHOW TABLES", 0);
    assert_eq!(
        monitor.line(&raw, Duration::from_millis(2), "4 rows"),
        "sqldbr other 2ms 4 rows | SHOW TABLES"
    );

    let tag = StatementTag::new("by-email", QueryType::Select)
        .cache_key("v2")
        .interpolated(true);
    let ctx = QueryContext::tagged("SELECT `id` FROM `user` WHERE (`email` = 'a@b')", 0, tag);
    assert_eq!(
        monitor.line(&ctx, Duration::from_millis(1), "SLOW"),
        "sqldbr select id=by-email key=v2 interpolated 1ms SLOW | SELECT `id` FROM `user` WHERE (`email` = 'a@b')"
    );
}

#[test]
fn test_tagged_context_takes_kind_from_tag() {
    // a WITH whose terminal statement is an UPDATE
    let sql = "WITH `c` AS (SELECT 1) UPDATE `t` SET `a`=?";
    let ctx = QueryContext::tagged(sql, 1, StatementTag::new("", QueryType::Update));
    assert_eq!(ctx.query_type, QueryType::Update);
    assert_eq!(ctx.statement_id, None);
    assert_eq!(ctx.cache_key.as_deref(), Some(""));
    assert_eq!(ctx.binding, Binding::Placeholders);
}

#[test]
fn test_query_result_error_truncation() {
    let long = "x".repeat(600);
    let QueryResult::Error(msg) = QueryResult::error(long) else {
        panic!("expected error");
    };
    assert_eq!(msg.len(), 515);
    assert!(msg.ends_with("..."));
}

#[test]
fn test_stats_monitor_totals() {
    let monitor = StatsMonitor::new();
    let select = QueryContext::new("SELECT * FROM `users`", 0);
    let insert = QueryContext::new("INSERT INTO `users` (`a`) VALUES (?)", 1);

    monitor.on_query_complete(&select, Duration::from_millis(10), &QueryResult::Rows(5));
    monitor.on_query_complete(&select, Duration::from_millis(20), &QueryResult::Rows(3));
    monitor.on_query_complete(
        &insert,
        Duration::from_millis(5),
        &QueryResult::error("duplicate key"),
    );

    let stats = monitor.stats();
    assert_eq!(stats.total_queries, 3);
    assert_eq!(stats.select_count, 2);
    assert_eq!(stats.insert_count, 1);
    assert_eq!(stats.failed_queries, 1);
    assert_eq!(stats.total_duration, Duration::from_millis(35));
    assert_eq!(stats.placeholder_count, 3);
    // raw SQL has no statement key
    assert!(stats.statements.is_empty());

    monitor.reset();
    assert_eq!(monitor.stats(), QueryStats::default());
}

#[test]
fn test_stats_monitor_per_statement() {
    let monitor = StatsMonitor::new();
    let by_id = |key: &'static str, interpolated: bool, sql: &str| {
        let tag = StatementTag::new("find-user", QueryType::Select)
            .cache_key(key)
            .interpolated(interpolated);
        QueryContext::tagged(sql, usize::from(!interpolated), tag)
    };
    let placeholder = by_id("", false, "SELECT `id` FROM `user` WHERE (`id` = ?)");
    let literal = by_id("", true, "SELECT `id` FROM `user` WHERE (`id` = 7)");
    let by_email = by_id("email", false, "SELECT `id` FROM `user` WHERE (`email` = ?)");

    monitor.on_query_complete(&placeholder, Duration::from_millis(4), &QueryResult::Rows(1));
    monitor.on_query_complete(&literal, Duration::from_millis(9), &QueryResult::Rows(1));
    monitor.on_query_complete(&by_email, Duration::from_millis(2), &QueryResult::error("gone"));

    let stats = monitor.stats();
    assert_eq!(stats.interpolated_count, 1);
    assert_eq!(stats.placeholder_count, 2);
    assert_eq!(stats.statements.len(), 2);

    let default_key = stats.statement("find-user", "").unwrap();
    assert_eq!(default_key.executions, 2);
    assert_eq!(default_key.interpolated, 1);
    assert_eq!(default_key.rows, 2);
    assert_eq!(default_key.max_duration, Duration::from_millis(9));
    assert_eq!(default_key.last_sql, "SELECT `id` FROM `user` WHERE (`id` = 7)");

    let email = stats.statement("find-user", "email").unwrap();
    assert_eq!((email.executions, email.failures, email.rows), (1, 1, 0));

    let (slowest, _) = stats.slowest().unwrap();
    assert_eq!(slowest, &StatementKey::new("find-user", ""));
}

#[test]
fn test_composite_hook_modify() {
    struct AddCommentHook;
    impl QueryHook for AddCommentHook {
        fn before_query(&self, ctx: &QueryContext) -> HookAction {
            HookAction::ModifySql {
                exec_sql: format!("/* app */ {}", ctx.exec_sql),
                canonical_sql: None,
            }
        }
    }

    let hook = CompositeHook::new().add(AddCommentHook).add(AddCommentHook);
    let ctx = QueryContext::new("SELECT 1", 0);

    match hook.before_query(&ctx) {
        HookAction::ModifySql {
            exec_sql,
            canonical_sql,
        } => {
            assert_eq!(exec_sql, "/* app */ /* app */ SELECT 1");
            assert!(canonical_sql.is_none());
        }
        other => panic!("expected ModifySql, got {other:?}"),
    }
}

struct BlockDeleteHook;
impl QueryHook for BlockDeleteHook {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        if ctx.query_type == QueryType::Delete {
            HookAction::Abort("DELETE not allowed".to_string())
        } else {
            HookAction::Continue
        }
    }
}

#[test]
fn test_composite_hook_abort() {
    let hook = CompositeHook::new().add(BlockDeleteHook);
    assert!(matches!(
        hook.before_query(&QueryContext::new("DELETE FROM `t`", 0)),
        HookAction::Abort(_)
    ));
    assert!(matches!(
        hook.before_query(&QueryContext::new("SELECT 1", 0)),
        HookAction::Continue
    ));
}

#[tokio::test]
async fn test_hook_abort_is_not_allowed() {
    let conn = InstrumentedExecutor::new(FakeExecutor::default()).with_hook(BlockDeleteHook);
    let err = conn.exec("DELETE FROM `t`", &[]).await.unwrap_err();
    assert!(err.is_not_allowed());
    assert!(conn.inner().seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_hook_rewrites_exec_sql() {
    struct Prefix;
    impl QueryHook for Prefix {
        fn before_query(&self, ctx: &QueryContext) -> HookAction {
            HookAction::ModifySql {
                exec_sql: format!("/* svc */ {}", ctx.exec_sql),
                canonical_sql: None,
            }
        }
    }

    let conn = InstrumentedExecutor::new(FakeExecutor::default())
        .add_hook(Prefix)
        .add_hook(BlockDeleteHook);
    conn.exec("UPDATE `t` SET `a`=?", &[Value::Int(1)]).await.unwrap();
    assert_eq!(
        conn.inner().seen.lock().unwrap().as_slice(),
        ["/* svc */ UPDATE `t` SET `a`=?"]
    );
}

#[tokio::test]
async fn test_exec_reports_affected_rows() {
    let monitor = Arc::new(RecordingMonitor::default());
    let conn = InstrumentedExecutor::new(FakeExecutor::default())
        .with_config(MonitorConfig::new().enable_monitoring())
        .with_monitor_arc(monitor.clone());

    let tag = StatementTag::new("bump", QueryType::Update);
    conn.exec_tagged(tag, "UPDATE `t` SET `a`=1", &[]).await.unwrap();
    conn.exec("BROKEN", &[]).await.unwrap_err();

    let events = monitor.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0.as_deref(), Some("bump"));
    assert_eq!(events[0].1, "3 affected");
    assert!(events[1].1.starts_with("error:"));
}

#[tokio::test]
async fn test_query_reported_when_stream_ends() {
    let monitor = Arc::new(RecordingMonitor::default());
    let conn = InstrumentedExecutor::new(FakeExecutor::with_rows(3))
        .with_config(MonitorConfig::new().enable_monitoring())
        .with_monitor_arc(monitor.clone());

    let mut rows = conn.query("SELECT `n` FROM `t`", &[]).await.unwrap();
    assert!(monitor.events.lock().unwrap().is_empty());
    let mut read = 0;
    while let Some(row) = rows.next().await {
        row.unwrap();
        read += 1;
    }
    assert_eq!(read, 3);

    let events = monitor.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, "3 rows");
    assert_eq!(events[0].2, Some(StreamEnd::Finished));
}

#[tokio::test]
async fn test_query_reported_when_stream_dropped() {
    let monitor = Arc::new(RecordingMonitor::default());
    let conn = InstrumentedExecutor::new(FakeExecutor::with_rows(5))
        .with_config(MonitorConfig::new().enable_monitoring())
        .with_monitor_arc(monitor.clone());

    let mut rows = conn.query("SELECT `n` FROM `t`", &[]).await.unwrap();
    rows.next().await.unwrap().unwrap();
    drop(rows);

    let events = monitor.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, "1 rows");
    assert_eq!(events[0].2, Some(StreamEnd::Dropped));
}

#[tokio::test]
async fn test_monitoring_disabled_reports_nothing() {
    let monitor = Arc::new(RecordingMonitor::default());
    let conn = InstrumentedExecutor::new(FakeExecutor::with_rows(1)).with_monitor_arc(monitor.clone());
    assert!(!conn.is_monitoring_enabled());

    let rows: Vec<_> = conn.query("SELECT 1", &[]).await.unwrap().collect().await;
    assert_eq!(rows.len(), 1);
    conn.exec("UPDATE `t` SET `a`=1", &[]).await.unwrap();
    assert!(monitor.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_query_threshold() {
    let monitor = Arc::new(RecordingMonitor::default());
    let conn = InstrumentedExecutor::new(FakeExecutor {
        delay: Some(Duration::from_millis(20)),
        ..FakeExecutor::default()
    })
    .with_config(
        MonitorConfig::new()
            .with_slow_query_threshold(Duration::from_millis(1))
            .enable_monitoring(),
    )
    .with_monitor_arc(monitor.clone());

    conn.exec("UPDATE `t` SET `a`=1", &[]).await.unwrap();
    assert_eq!(*monitor.slow.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_query_timeout_is_cancelled() {
    let monitor = Arc::new(RecordingMonitor::default());
    let conn = InstrumentedExecutor::new(FakeExecutor {
        delay: Some(Duration::from_secs(5)),
        ..FakeExecutor::default()
    })
    .with_config(MonitorConfig::new().enable_monitoring())
    .with_monitor_arc(monitor.clone())
    .with_query_timeout(Duration::from_millis(10));

    let err = conn.exec("UPDATE `t` SET `a`=1", &[]).await.unwrap_err();
    assert!(err.is_cancelled());
    let err = conn.query("SELECT 1", &[]).await.unwrap_err();
    assert!(err.is_cancelled());

    let events = monitor.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|(_, result, _)| result.contains("timed out")));
}
