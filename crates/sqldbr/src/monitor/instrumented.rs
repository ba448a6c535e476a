use super::config::MonitorConfig;
use super::monitors::{CompositeHook, NoopMonitor};
use super::stream::CountingRowStream;
use super::types::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryType};
use crate::client::{ExecResult, Executor, RowStream, StatementTag};
use crate::error::{DbrError, DbrResult};
use crate::value::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An [`Executor`] wrapper which runs hooks, enforces a statement timeout and
/// reports to a [`QueryMonitor`].
///
/// Monitoring must be explicitly enabled via `MonitorConfig::enable_monitoring()`.
pub struct InstrumentedExecutor<E> {
    executor: E,
    pub(super) monitor: Arc<dyn QueryMonitor>,
    pub(super) hook: Option<Arc<dyn QueryHook>>,
    pub(super) config: MonitorConfig,
}

impl<E: Executor> InstrumentedExecutor<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            monitor: Arc::new(NoopMonitor),
            hook: None,
            config: MonitorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Replace the hook.
    pub fn with_hook<H: QueryHook + 'static>(mut self, hook: H) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn with_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Add a hook after the existing one.
    pub fn add_hook<H: QueryHook + 'static>(self, hook: H) -> Self {
        self.add_hook_arc(Arc::new(hook))
    }

    pub fn add_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hook = Some(match self.hook.take() {
            None => hook,
            Some(existing) => Arc::new(CompositeHook::new().add_arc(existing).add_arc(hook)),
        });
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = Some(timeout);
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        self.config.monitoring_enabled = true;
        self
    }

    pub fn disable_monitoring(mut self) -> Self {
        self.config.monitoring_enabled = false;
        self
    }

    pub fn is_monitoring_enabled(&self) -> bool {
        self.config.monitoring_enabled
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut MonitorConfig {
        &mut self.config
    }

    pub fn inner(&self) -> &E {
        &self.executor
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    fn context(
        &self,
        sql: &str,
        args: &[Value],
        tag: Option<StatementTag<'_>>,
    ) -> DbrResult<QueryContext> {
        let mut ctx = match tag {
            Some(tag) => QueryContext::tagged(sql, args.len(), tag),
            None => QueryContext::new(sql, args.len()),
        };
        self.apply_hook(&mut ctx)?;
        if self.config.monitoring_enabled {
            self.monitor.on_query_start(&ctx);
        }
        Ok(ctx)
    }

    fn apply_hook(&self, ctx: &mut QueryContext) -> DbrResult<()> {
        let Some(hook) = &self.hook else {
            return Ok(());
        };

        match hook.before_query(ctx) {
            HookAction::Continue => Ok(()),
            HookAction::ModifySql {
                exec_sql,
                canonical_sql,
            } => {
                ctx.exec_sql = exec_sql;
                if let Some(canonical_sql) = canonical_sql {
                    ctx.canonical_sql = canonical_sql;
                }
                ctx.query_type = QueryType::from_sql(&ctx.canonical_sql);
                Ok(())
            }
            HookAction::Abort(reason) => Err(DbrError::not_allowed(format!(
                "statement aborted by hook: {reason}"
            ))),
        }
    }

    pub(super) fn report_result(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        report(&self.config, self.monitor.as_ref(), self.hook.as_deref(), ctx, duration, result);
    }

    async fn execute_with_timeout<T, F>(&self, future: F) -> DbrResult<T>
    where
        F: Future<Output = DbrResult<T>> + Send,
    {
        match self.config.query_timeout {
            Some(timeout) => {
                tokio::pin!(future);
                tokio::select! {
                    result = &mut future => result,
                    _ = tokio::time::sleep(timeout) => Err(timed_out(timeout)),
                }
            }
            None => future.await,
        }
    }

    async fn query_inner(
        &self,
        sql: &str,
        args: &[Value],
        tag: Option<StatementTag<'_>>,
    ) -> DbrResult<RowStream> {
        let ctx = self.context(sql, args, tag)?;
        let start = Instant::now();
        let result = self
            .execute_with_timeout(self.executor.query(&ctx.exec_sql, args))
            .await;

        match result {
            Ok(stream) => {
                if !self.config.monitoring_enabled && self.config.query_timeout.is_none() {
                    return Ok(stream);
                }
                let timeout_remaining = self
                    .config
                    .query_timeout
                    .map(|t| t.saturating_sub(start.elapsed()));
                Ok(RowStream::new(CountingRowStream::new(
                    stream,
                    self.monitor.clone(),
                    self.hook.clone(),
                    self.config.clone(),
                    ctx,
                    start,
                    timeout_remaining,
                )))
            }
            Err(e) => {
                self.report_result(&ctx, start.elapsed(), &QueryResult::error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn exec_inner(
        &self,
        sql: &str,
        args: &[Value],
        tag: Option<StatementTag<'_>>,
    ) -> DbrResult<ExecResult> {
        let ctx = self.context(sql, args, tag)?;
        let start = Instant::now();
        let result = self
            .execute_with_timeout(self.executor.exec(&ctx.exec_sql, args))
            .await;

        let query_result = match &result {
            Ok(res) => QueryResult::Affected(res.rows_affected),
            Err(e) => QueryResult::error(e.to_string()),
        };
        self.report_result(&ctx, start.elapsed(), &query_result);
        result
    }
}

pub(super) fn timed_out(timeout: Duration) -> DbrError {
    DbrError::cancelled(format!("statement timed out after {timeout:?}"))
}

pub(super) fn report(
    config: &MonitorConfig,
    monitor: &dyn QueryMonitor,
    hook: Option<&dyn QueryHook>,
    ctx: &QueryContext,
    duration: Duration,
    result: &QueryResult,
) {
    if !config.monitoring_enabled {
        return;
    }

    if let Some(hook) = hook {
        hook.after_query(ctx, duration, result);
    }

    monitor.on_query_complete(ctx, duration, result);

    if config
        .slow_query_threshold
        .is_some_and(|threshold| duration > threshold)
    {
        monitor.on_slow_query(ctx, duration);
    }
}

impl<E: Executor> Executor for InstrumentedExecutor<E> {
    async fn query(&self, sql: &str, args: &[Value]) -> DbrResult<RowStream> {
        self.query_inner(sql, args, None).await
    }

    async fn query_tagged(
        &self,
        tag: StatementTag<'_>,
        sql: &str,
        args: &[Value],
    ) -> DbrResult<RowStream> {
        self.query_inner(sql, args, Some(tag)).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> DbrResult<ExecResult> {
        self.exec_inner(sql, args, None).await
    }

    async fn exec_tagged(
        &self,
        tag: StatementTag<'_>,
        sql: &str,
        args: &[Value],
    ) -> DbrResult<ExecResult> {
        self.exec_inner(sql, args, Some(tag)).await
    }
}
