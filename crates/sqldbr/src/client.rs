//! Executor boundary.
//!
//! This crate never opens connections. Bound statements hand their final SQL
//! text and flattened arguments to an [`Executor`], which may be a connection,
//! a pool, a transaction or a test double.

use crate::error::{DbrError, DbrResult};
use crate::monitor::QueryType;
use crate::value::Value;
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A result row: shared column names plus one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. `values` must line up with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> DbrResult<Self> {
        if columns.len() != values.len() {
            return Err(DbrError::mismatch(format!(
                "row has {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the column at `idx`.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of the column named `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }
}

/// Outcome of a statement which does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// First auto-increment id generated by an INSERT, 0 if none.
    pub last_insert_id: u64,
}

/// Rows returned by [`Executor::query`], consumed incrementally.
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = DbrResult<Row>> + Send>>,
}

impl RowStream {
    /// Create a new `RowStream` from any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DbrResult<Row>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A stream over rows which are already in memory.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(futures_util::stream::iter(rows.into_iter().map(Ok)))
    }
}

impl Stream for RowStream {
    type Item = DbrResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream").finish_non_exhaustive()
    }
}

/// What a [`Dbr`](crate::Dbr) tells its executor about the statement it
/// runs. Monitoring executors key their reports on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementTag<'a> {
    /// Id set with `with_id`, empty when none was set.
    pub id: &'a str,
    /// Cache key of the template the SQL was bound from.
    pub cache_key: &'a str,
    pub kind: QueryType,
    /// Arguments were written into the SQL as literals.
    pub interpolated: bool,
}

impl<'a> StatementTag<'a> {
    pub fn new(id: &'a str, kind: QueryType) -> Self {
        Self {
            id,
            cache_key: "",
            kind,
            interpolated: false,
        }
    }

    pub fn cache_key(mut self, key: &'a str) -> Self {
        self.cache_key = key;
        self
    }

    pub fn interpolated(mut self, interpolated: bool) -> Self {
        self.interpolated = interpolated;
        self
    }
}

/// Something which can run SQL: a connection, a pool or a transaction.
///
/// Implementations report their own failures as [`DbrError::Driver`] so the
/// original error stays reachable through [`DbrError::driver_error`].
pub trait Executor: Send + Sync {
    /// Run a statement returning rows.
    fn query(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DbrResult<RowStream>> + Send;

    /// Run a statement returning rows on behalf of the [`Dbr`](crate::Dbr)
    /// described by `tag`.
    ///
    /// The default implementation ignores `tag` and calls [`Executor::query`].
    fn query_tagged(
        &self,
        tag: StatementTag<'_>,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DbrResult<RowStream>> + Send {
        let _ = tag;
        self.query(sql, args)
    }

    /// Run a statement which does not return rows.
    fn exec(&self, sql: &str, args: &[Value]) -> impl Future<Output = DbrResult<ExecResult>> + Send;

    /// Run a statement which does not return rows on behalf of the
    /// [`Dbr`](crate::Dbr) described by `tag`.
    ///
    /// The default implementation ignores `tag` and calls [`Executor::exec`].
    fn exec_tagged(
        &self,
        tag: StatementTag<'_>,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DbrResult<ExecResult>> + Send {
        let _ = tag;
        self.exec(sql, args)
    }
}

/// A statement prepared once on a connection and run with different
/// arguments.
///
/// Prepared statements belong to the connection which prepared them.
pub trait PreparedStatement: Send + Sync {
    /// The SQL text the statement was prepared from.
    fn sql(&self) -> &str;

    fn query(&self, args: &[Value]) -> impl Future<Output = DbrResult<RowStream>> + Send;

    fn exec(&self, args: &[Value]) -> impl Future<Output = DbrResult<ExecResult>> + Send;

    /// Release the statement on the server. The default does nothing.
    fn close(&self) -> impl Future<Output = DbrResult<()>> + Send {
        async { Ok(()) }
    }
}

/// An [`Executor`] which can prepare statements.
pub trait Preparer: Executor {
    type Statement: PreparedStatement;

    /// Prepare `sql` on this connection.
    fn prepare(&self, sql: &str) -> impl Future<Output = DbrResult<Self::Statement>> + Send;
}

/// A prepared statement seen through the [`Executor`] interface, so a
/// [`Dbr`](crate::Dbr) can load, exec and iterate with it.
///
/// Every call must carry the SQL text the statement was prepared from; a
/// statement rendered differently (for example a longer expanded `IN` list)
/// is a [`DbrError::Mismatch`].
#[derive(Debug)]
pub struct Prepared<S> {
    stmt: S,
}

impl<S: PreparedStatement> Prepared<S> {
    pub fn new(stmt: S) -> Self {
        Self { stmt }
    }

    pub fn sql(&self) -> &str {
        self.stmt.sql()
    }

    pub fn statement(&self) -> &S {
        &self.stmt
    }

    /// Close the statement on the server.
    pub async fn close(self) -> DbrResult<()> {
        self.stmt.close().await
    }

    fn check(&self, sql: &str) -> DbrResult<()> {
        if sql != self.stmt.sql() {
            return Err(DbrError::mismatch(format!(
                "statement was prepared as {:?} but renders as {sql:?}",
                self.stmt.sql()
            )));
        }
        Ok(())
    }
}

impl<S: PreparedStatement> Executor for Prepared<S> {
    async fn query(&self, sql: &str, args: &[Value]) -> DbrResult<RowStream> {
        self.check(sql)?;
        self.stmt.query(args).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> DbrResult<ExecResult> {
        self.check(sql)?;
        self.stmt.exec(args).await
    }
}

/// Require exactly one affected row.
pub fn exec_validate_one_affected_row(result: &ExecResult) -> DbrResult<()> {
    if result.rows_affected != 1 {
        return Err(DbrError::not_valid(format!(
            "expected exactly one affected row, got {}",
            result.rows_affected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup() {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        let row = Row::new(columns.clone(), vec![Value::Int(1), Value::Str("a".into())]).unwrap();
        assert_eq!(row.get_by_name("name"), Some(&Value::Str("a".into())));
        assert_eq!(row.get(0), Some(&Value::Int(1)));
        assert!(row.get_by_name("missing").is_none());
        assert!(Row::new(columns, vec![]).unwrap_err().is_mismatch());
    }

    #[test]
    fn test_exec_validate_one_affected_row() {
        let ok = ExecResult {
            rows_affected: 1,
            last_insert_id: 0,
        };
        assert!(exec_validate_one_affected_row(&ok).is_ok());
        let none = ExecResult::default();
        assert!(exec_validate_one_affected_row(&none).unwrap_err().is_not_valid());
    }
}
