//! Execution against an [`Executor`].
//!
//! Every call honours the statement's cancellation token and timeout and
//! resets arguments and records afterwards, whether it succeeded or not.

use super::Dbr;
use super::cancel::Guard;
use crate::client::{ExecResult, Executor, Prepared, Preparer, Row, RowStream, StatementTag};
use crate::error::{DbrError, DbrResult, ResultExt};
use crate::mapper::{ColumnMap, ColumnMapper, ColumnValue};
use chrono::NaiveDateTime;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

impl Dbr<'_> {
    fn guard(&self) -> Guard {
        Guard::new(self.cancel.as_ref(), self.timeout)
    }

    fn tag(&self) -> StatementTag<'_> {
        StatementTag::new(&self.config.id, self.kind)
            .cache_key(&self.cache_key)
            .interpolated(self.config.interpolate)
    }

    /// Prepare the statement for the current cache key on `conn`.
    ///
    /// The returned handle is an [`Executor`] for this statement only; bind
    /// new arguments and pass it to `load`, `exec` or `query` as often as
    /// needed, then [`Prepared::close`] it.
    pub async fn prepare<P: Preparer>(&mut self, conn: &P) -> DbrResult<Prepared<P::Statement>> {
        let sql = self.statement_text().with_context(|| self.describe())?;
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "sqldbr", id = %self.config.id, sql = %sql, "prepare");
        let stmt = self
            .guard()
            .run(conn.prepare(&sql))
            .await
            .with_context(|| format!("prepare {sql:?}"))?;
        Ok(Prepared::new(stmt))
    }

    /// Run the statement and stream its rows.
    pub async fn query<E: Executor>(&mut self, conn: &E) -> DbrResult<RowStream> {
        let guard = self.guard();
        let result = guard.run(self.query_rows(conn)).await;
        self.reset();
        result
    }

    /// Run a statement which returns no rows. After an INSERT the generated
    /// auto-increment ids are handed to the bound records.
    pub async fn exec<E: Executor>(&mut self, conn: &E) -> DbrResult<ExecResult> {
        let guard = self.guard();
        let result = guard.run(self.exec_statement(conn)).await;
        self.reset();
        result
    }

    /// Scan every row into `dest` and return the number of rows scanned.
    pub async fn load<E, M>(&mut self, conn: &E, dest: &mut M) -> DbrResult<u64>
    where
        E: Executor,
        M: ColumnMapper + ?Sized,
    {
        let guard = self.guard();
        let result = guard
            .run(self.iterate_rows(conn, |cm| dest.map_columns(cm)))
            .await;
        self.reset();
        result
    }

    /// Call `f` once per row, in result order.
    pub async fn iterate_serial<E, F>(&mut self, conn: &E, f: F) -> DbrResult<u64>
    where
        E: Executor,
        F: FnMut(&mut ColumnMap) -> DbrResult<()>,
    {
        let guard = self.guard();
        let result = guard.run(self.iterate_rows(conn, f)).await;
        self.reset();
        result
    }

    /// Call `f` for every row on `concurrency` worker tasks.
    ///
    /// Rows are read by the calling task and handed out through a bounded
    /// channel. The first error stops the reader and all workers and is
    /// returned. Row order across workers is not preserved.
    pub async fn iterate_parallel<E, F>(&mut self, conn: &E, concurrency: usize, f: F) -> DbrResult<()>
    where
        E: Executor,
        F: Fn(&mut ColumnMap) -> DbrResult<()> + Send + Sync + 'static,
    {
        if concurrency < 1 {
            self.reset();
            return Err(DbrError::out_of_range(format!(
                "iterate_parallel needs at least one worker, got {concurrency}"
            )));
        }
        let guard = self.guard();
        let mut result = self
            .dispatch_rows(conn, concurrency, &guard, Arc::new(f))
            .await;
        if result.is_ok() && guard.is_cancelled() {
            result = Err(DbrError::cancelled("iteration cancelled"));
        }
        self.reset();
        result
    }

    pub async fn load_null_int64<E: Executor>(&mut self, conn: &E) -> DbrResult<(Option<i64>, bool)> {
        self.load_nullable(conn).await
    }

    pub async fn load_null_uint64<E: Executor>(&mut self, conn: &E) -> DbrResult<(Option<u64>, bool)> {
        self.load_nullable(conn).await
    }

    pub async fn load_null_float64<E: Executor>(&mut self, conn: &E) -> DbrResult<(Option<f64>, bool)> {
        self.load_nullable(conn).await
    }

    pub async fn load_null_string<E: Executor>(&mut self, conn: &E) -> DbrResult<(Option<String>, bool)> {
        self.load_nullable(conn).await
    }

    pub async fn load_null_time<E: Executor>(
        &mut self,
        conn: &E,
    ) -> DbrResult<(Option<NaiveDateTime>, bool)> {
        self.load_nullable(conn).await
    }

    /// The single value of the first row; no rows is [`DbrError::NotFound`].
    pub async fn load_int64<E: Executor>(&mut self, conn: &E) -> DbrResult<i64> {
        self.load_required(conn).await
    }

    pub async fn load_uint64<E: Executor>(&mut self, conn: &E) -> DbrResult<u64> {
        self.load_required(conn).await
    }

    pub async fn load_float64<E: Executor>(&mut self, conn: &E) -> DbrResult<f64> {
        self.load_required(conn).await
    }

    pub async fn load_string<E: Executor>(&mut self, conn: &E) -> DbrResult<String> {
        self.load_required(conn).await
    }

    /// The single column of every row; `NULL`s are skipped.
    pub async fn load_int64s<E: Executor>(&mut self, conn: &E) -> DbrResult<Vec<i64>> {
        self.load_column(conn).await
    }

    pub async fn load_uint64s<E: Executor>(&mut self, conn: &E) -> DbrResult<Vec<u64>> {
        self.load_column(conn).await
    }

    pub async fn load_float64s<E: Executor>(&mut self, conn: &E) -> DbrResult<Vec<f64>> {
        self.load_column(conn).await
    }

    pub async fn load_strings<E: Executor>(&mut self, conn: &E) -> DbrResult<Vec<String>> {
        self.load_column(conn).await
    }

    async fn query_rows<E: Executor>(&mut self, conn: &E) -> DbrResult<RowStream> {
        let (sql, args) = self.resolve_statement().with_context(|| self.describe())?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "sqldbr",
            id = %self.config.id,
            kind = ?self.kind,
            args = args.len(),
            sql = %sql,
            "query"
        );
        conn.query_tagged(self.tag(), &sql, &args)
            .await
            .with_context(|| format!("query {sql:?}"))
    }

    async fn exec_statement<E: Executor>(&mut self, conn: &E) -> DbrResult<ExecResult> {
        let (sql, args) = self.resolve_statement().with_context(|| self.describe())?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "sqldbr",
            id = %self.config.id,
            kind = ?self.kind,
            args = args.len(),
            sql = %sql,
            "exec"
        );
        let result = conn
            .exec_tagged(self.tag(), &sql, &args)
            .await
            .with_context(|| format!("exec {sql:?}"))?;

        if result.last_insert_id > 0 {
            for (rec, offset) in self.records.iter_mut().zip(&self.record_offsets) {
                rec.record.assign_last_insert_id(result.last_insert_id + offset);
            }
        }
        Ok(result)
    }

    async fn iterate_rows<E, F>(&mut self, conn: &E, mut f: F) -> DbrResult<u64>
    where
        E: Executor,
        F: FnMut(&mut ColumnMap) -> DbrResult<()>,
    {
        let mut rows = self.query_rows(conn).await?;
        let mut cm = ColumnMap::scan();
        while let Some(row) = rows.next().await {
            cm.set_row(row.with_context(|| self.describe())?);
            f(&mut cm).with_context(|| format!("{} row {}", self.describe(), cm.rows_scanned()))?;
        }
        Ok(cm.rows_scanned())
    }

    /// The value of the first row, `None` without rows.
    async fn first_value<T, E>(&mut self, conn: &E) -> DbrResult<Option<Option<T>>>
    where
        T: ColumnValue,
        E: Executor,
    {
        let mut rows = self.query_rows(conn).await?;
        let Some(row) = rows.next().await else {
            return Ok(None);
        };
        let row = row.with_context(|| self.describe())?;
        Option::<T>::from_value(single(&row)?).map(Some)
    }

    async fn load_nullable<T, E>(&mut self, conn: &E) -> DbrResult<(Option<T>, bool)>
    where
        T: ColumnValue,
        E: Executor,
    {
        let guard = self.guard();
        let result = guard.run(self.first_value::<T, E>(conn)).await;
        self.reset();
        Ok(match result? {
            Some(value) => (value, true),
            None => (None, false),
        })
    }

    async fn load_required<T, E>(&mut self, conn: &E) -> DbrResult<T>
    where
        T: ColumnValue,
        E: Executor,
    {
        match self.load_nullable::<T, E>(conn).await? {
            (Some(value), _) => Ok(value),
            (None, true) => Err(DbrError::not_valid("the selected value is NULL")),
            (None, false) => Err(DbrError::not_found("the query returned no rows")),
        }
    }

    async fn load_column<T, E>(&mut self, conn: &E) -> DbrResult<Vec<T>>
    where
        T: ColumnValue,
        E: Executor,
    {
        let mut out = Vec::new();
        self.iterate_serial(conn, |cm| {
            let Some(row) = cm.row() else {
                return Ok(());
            };
            let value = single(row)?;
            if !value.is_null() {
                out.push(T::from_value(value)?);
            }
            Ok(())
        })
        .await?;
        Ok(out)
    }

    /// Reads rows and feeds the workers until the rows run out, a worker
    /// fails or `guard` stops. Every worker is joined before returning, so
    /// no callback runs once this returns.
    async fn dispatch_rows<E, F>(
        &mut self,
        conn: &E,
        concurrency: usize,
        guard: &Guard,
        f: Arc<F>,
    ) -> DbrResult<()>
    where
        E: Executor,
        F: Fn(&mut ColumnMap) -> DbrResult<()> + Send + Sync + 'static,
    {
        let mut rows = guard.run(self.query_rows(conn)).await?;
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel::<Row>(self.config.channel_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker in 0..concurrency {
            let rx = Arc::clone(&rx);
            let f = Arc::clone(&f);
            let token = token.clone();
            workers.spawn(async move {
                let mut cm = ColumnMap::scan();
                loop {
                    let row = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return Ok(()),
                            row = rx.recv() => row,
                        }
                    };
                    let Some(row) = row else {
                        return Ok(());
                    };
                    cm.set_row(row);
                    if let Err(err) = f(&mut cm) {
                        token.cancel();
                        return Err(err.context(format!("worker {worker}")));
                    }
                }
            });
        }

        let mut first_error = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                err = guard.stopped() => {
                    token.cancel();
                    first_error = Some(err);
                    break;
                }
                next = rows.next() => next,
            };
            match next {
                None => break,
                Some(Ok(row)) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        err = guard.stopped() => {
                            token.cancel();
                            first_error = Some(err);
                            break;
                        }
                        sent = tx.send(row) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    token.cancel();
                    first_error = Some(err.context(self.describe()));
                    break;
                }
            }
        }
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            let outcome = joined
                .unwrap_or_else(|e| Err(DbrError::fatal(format!("iteration worker failed: {e}"))));
            if let Err(err) = outcome {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// The only value of `row`.
fn single(row: &Row) -> DbrResult<&crate::value::Value> {
    match row.values() {
        [value] => Ok(value),
        values => Err(DbrError::mismatch(format!(
            "expected a single column, the row has {}",
            values.len()
        ))),
    }
}
