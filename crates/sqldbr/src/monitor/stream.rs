use super::config::MonitorConfig;
use super::instrumented::{report, timed_out};
use super::types::{QueryContext, QueryHook, QueryMonitor, QueryResult, StreamEnd};
use crate::client::{Row, RowStream};
use crate::error::{DbrError, DbrResult};
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Counts rows as they are read and reports the query once the stream ends,
/// fails, times out or is dropped early.
pub(super) struct CountingRowStream {
    inner: RowStream,
    monitor: Arc<dyn QueryMonitor>,
    hook: Option<Arc<dyn QueryHook>>,
    config: MonitorConfig,
    ctx: QueryContext,
    start: Instant,
    rows: usize,
    timeout_sleep: Option<Pin<Box<tokio::time::Sleep>>>,
    finished: bool,
    terminated: bool,
}

impl CountingRowStream {
    pub(super) fn new(
        inner: RowStream,
        monitor: Arc<dyn QueryMonitor>,
        hook: Option<Arc<dyn QueryHook>>,
        config: MonitorConfig,
        ctx: QueryContext,
        start: Instant,
        timeout_remaining: Option<Duration>,
    ) -> Self {
        Self {
            inner,
            monitor,
            hook,
            config,
            ctx,
            start,
            rows: 0,
            timeout_sleep: timeout_remaining.map(|d| Box::pin(tokio::time::sleep(d))),
            finished: false,
            terminated: false,
        }
    }

    fn finalize(&mut self, dropped: bool, err: Option<&DbrError>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.ctx.stream_end = Some(if dropped {
            StreamEnd::Dropped
        } else {
            StreamEnd::Finished
        });

        let result = match err {
            None => QueryResult::Rows(self.rows),
            Some(e) => QueryResult::error(e.to_string()),
        };
        report(
            &self.config,
            self.monitor.as_ref(),
            self.hook.as_deref(),
            &self.ctx,
            self.start.elapsed(),
            &result,
        );
    }
}

impl Stream for CountingRowStream {
    type Item = DbrResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        if let (Some(timeout), Some(sleep)) = (self.config.query_timeout, self.timeout_sleep.as_mut())
            && sleep.as_mut().poll(cx).is_ready()
        {
            self.timeout_sleep = None;
            self.terminated = true;
            let err = timed_out(timeout);
            self.finalize(false, Some(&err));
            return Poll::Ready(Some(Err(err)));
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => {
                self.rows += 1;
                Poll::Ready(Some(Ok(row)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.terminated = true;
                self.finalize(false, Some(&e));
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.terminated = true;
                self.finalize(false, None);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for CountingRowStream {
    fn drop(&mut self) {
        if !self.terminated {
            self.finalize(true, None);
        }
    }
}
