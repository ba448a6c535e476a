//! # sqldbr
//!
//! A MySQL statement builder and argument binder.
//!
//! ## Features
//!
//! - **Two phases**: builders render SQL templates with `?` placeholders once;
//!   a [`Dbr`] binds arguments to a template for every execution
//! - **Arguments from anywhere**: positional values, named values (`:name`)
//!   and struct fields via [`ColumnMapper`], optionally table-qualified
//! - **Lists**: `IN (?)` with a collection expands to one placeholder per
//!   element, or the whole statement is interpolated into plain SQL
//! - **Template cache**: built SQL is kept per cache key and reused
//! - **Executor agnostic**: anything implementing [`Executor`] runs the final
//!   SQL, with cancellation, timeouts and parallel row iteration on top
//! - **Monitoring**: hooks and monitors around any executor (see [`monitor`])
//!
//! ## Example
//!
//! ```ignore
//! use sqldbr::condition::column;
//! use sqldbr::{ArgBuilder, Select, Update};
//!
//! let mut sel = Select::new(["id", "name", "email"]);
//! sel.from("customer")
//!     .where_([column("id").is_in().placeholder()])
//!     .with_cache_key("customers_by_id");
//!
//! let mut customers: Vec<Customer> = Vec::new();
//! sel.with_args()
//!     .expand_placeholders()
//!     .ints([1, 2, 3])
//!     .load(&conn, &mut customers)
//!     .await?;
//!
//! let mut upd = Update::new("customer");
//! upd.add_columns(["name", "email"])
//!     .where_([column("id").placeholder()]);
//! upd.with_args()
//!     .record("", &mut customers[0])
//!     .exec(&conn)
//!     .await?;
//! ```

// Lets `#[derive(ColumnMapper)]` expand to `::sqldbr::...` inside this crate.
extern crate self as sqldbr;

pub mod builder;
pub mod client;
pub mod condition;
pub mod dbr;
pub mod error;
pub mod ident;
pub mod interpolate;
pub mod mapper;
pub mod monitor;
pub mod pool;
pub mod value;

pub use builder::{Cte, Delete, Insert, Join, Listener, Select, Union, Update, With};
pub use client::{
    ExecResult, Executor, Prepared, PreparedStatement, Preparer, Row, RowStream, StatementTag,
    exec_validate_one_affected_row,
};
pub use condition::{Condition, Op, column, expr};
pub use dbr::{Dbr, DbrConfig};
pub use error::{DbrError, DbrResult, ErrorKind, ResultExt};
pub use ident::{Ident, Sort};
pub use mapper::{ColumnMap, ColumnMapper, ColumnValue, MapMode, QualifiedRecord, qualify};
pub use monitor::{
    Binding, CompositeHook, CompositeMonitor, HookAction, InstrumentedExecutor, LoggingMonitor,
    MonitorConfig, NoopMonitor, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryStats,
    QueryType, StatementKey, StatementStats, StatsMonitor, StreamEnd,
};
pub use value::{Arg, ArgBuilder, Args, Value, ValueList};

#[cfg(feature = "tracing")]
pub use monitor::TracingSqlHook;

#[cfg(feature = "derive")]
pub use sqldbr_derive::ColumnMapper;

/// The builders, binder and traits most code needs.
pub mod prelude {
    pub use crate::condition::{column, expr, paren_close, paren_open};
    pub use crate::{
        ArgBuilder, Args, ColumnMap, ColumnMapper, Dbr, DbrError, DbrResult, Delete, Executor,
        Insert, Select, Union, Update, With,
    };
}
