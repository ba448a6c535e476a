//! Bound statements.
//!
//! A [`Dbr`] couples the compiled templates of a statement with runtime
//! arguments and records. Placeholders are resolved in the order they appear
//! in the SQL text: named placeholders from named arguments, column
//! placeholders from the record whose qualifier matches, everything else from
//! the positional arguments.
//!
//! ```
//! use sqldbr::condition::column;
//! use sqldbr::{ArgBuilder, Select};
//!
//! let mut sel = Select::new(["a"]);
//! sel.from("t").where_([column("id").placeholder(), column("name").str("x")]);
//! let mut dbr = sel.with_args();
//! dbr.int(7);
//! let (sql, args) = dbr.to_sql().unwrap();
//! assert_eq!(sql, "SELECT `a` FROM `t` WHERE (`id` = ?) AND (`name` = ?)");
//! assert_eq!(args.len(), 2);
//! ```

mod bind;
mod cancel;
mod exec;


use crate::builder::writer::SqlWriter;
use crate::builder::{Common, Template};
use crate::error::{DbrError, DbrResult};
use crate::ident::Ident;
use crate::mapper::{ColumnMapper, QualifiedRecord};
use crate::monitor::QueryType;
use crate::value::{Arg, ArgBuilder, Args, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Rows buffered between the reader and the workers of
/// [`Dbr::iterate_parallel`] unless configured otherwise.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Per-statement execution options.
#[derive(Debug, Clone)]
pub struct DbrConfig {
    /// Identifier passed to the executor as tag and used in error context.
    pub id: String,
    /// Render values as SQL literals instead of sending arguments.
    pub interpolate: bool,
    /// Expand a single `?` bound to a list into one `?` per value.
    pub expand_placeholders: bool,
    /// Capacity of the row channel of parallel iteration.
    pub channel_capacity: usize,
}

impl Default for DbrConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            interpolate: false,
            expand_placeholders: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl DbrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_interpolate(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    pub fn with_expand_placeholders(mut self, expand: bool) -> Self {
        self.expand_placeholders = expand;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

/// A statement bound to arguments and records, ready for execution.
#[derive(Debug)]
pub struct Dbr<'a> {
    config: DbrConfig,
    kind: QueryType,
    templates: HashMap<String, Template>,
    cache_key: String,
    default_qualifier: String,
    build_error: Option<DbrError>,
    args: Vec<Arg>,
    records: Vec<QualifiedRecord<'a>>,
    column_aliases: Vec<String>,
    order_bys: Vec<Ident>,
    limit: Option<(u64, Option<u64>)>,
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
    /// Row offset of each record inside the last INSERT row list.
    record_offsets: Vec<u64>,
}

impl<'a> Dbr<'a> {
    /// Snapshot the compiled templates of a builder.
    pub(crate) fn from_builder(common: &Common, kind: QueryType, compiled: DbrResult<()>) -> Self {
        Self {
            config: DbrConfig::new().with_id(common.id.clone()),
            kind,
            templates: common.cache.clone(),
            cache_key: common.cache_key.clone(),
            default_qualifier: common.default_qualifier.clone(),
            build_error: compiled.err(),
            args: Vec::new(),
            records: Vec::new(),
            column_aliases: Vec::new(),
            order_bys: Vec::new(),
            limit: None,
            cancel: None,
            timeout: None,
            record_offsets: Vec::new(),
        }
    }

    /// Bind a hand-written SQL statement. Every `?` and `:name` becomes a
    /// placeholder resolved from positional or named arguments.
    pub fn raw(sql: &str) -> Self {
        let mut w = SqlWriter::new();
        w.raw(sql);
        let (text, slots) = w.finish();
        let template = Template {
            sql: text,
            slots,
            repeat: 1,
            insert: None,
        };
        let mut common = Common::default();
        common.cache.insert(String::new(), template);
        Self::from_builder(&common, QueryType::from_sql(sql), Ok(()))
    }

    pub fn config(&self) -> &DbrConfig {
        &self.config
    }

    pub fn with_config(&mut self, config: DbrConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn with_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.config.id = id.into();
        self
    }

    pub fn statement_kind(&self) -> QueryType {
        self.kind
    }

    /// Send values as SQL literals instead of placeholders.
    pub fn interpolate(&mut self) -> &mut Self {
        self.config.interpolate = true;
        self
    }

    /// Allow lists bound to a single `?` and expand them to `?,?,?`.
    pub fn expand_placeholders(&mut self) -> &mut Self {
        self.config.expand_placeholders = true;
        self
    }

    /// Append arguments.
    pub fn args(&mut self, args: Args) -> &mut Self {
        self.args.extend(args);
        self
    }

    /// Append an argument matched against the `:name` placeholder.
    pub fn named_arg(&mut self, name: impl Into<String>, arg: impl Into<Arg>) -> &mut Self {
        self.args.push(Arg::named(name, arg));
        self
    }

    /// Bind `record` to columns qualified with `qualifier`. An empty
    /// qualifier stands for the statement's main table.
    pub fn record(
        &mut self,
        qualifier: impl Into<String>,
        record: &'a mut (dyn ColumnMapper + Send),
    ) -> &mut Self {
        self.records.push(QualifiedRecord {
            qualifier: qualifier.into(),
            record,
        });
        self
    }

    pub fn records(&mut self, records: impl IntoIterator<Item = QualifiedRecord<'a>>) -> &mut Self {
        self.records.extend(records);
        self
    }

    /// Use these names instead of the placeholder columns when asking records
    /// for values. One alias per column placeholder, in SQL order.
    pub fn with_qualified_columns_aliases<S: Into<String>>(
        &mut self,
        aliases: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.column_aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Append an `ORDER BY` to the SQL text at execution time.
    pub fn order_by<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        for c in columns {
            let c: String = c.into();
            self.order_bys.push(Ident::sort_entry(&c, false));
        }
        self
    }

    pub fn order_by_desc<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        for c in columns {
            let c: String = c.into();
            self.order_bys.push(Ident::sort_entry(&c, false).desc());
        }
        self
    }

    /// Append a `LIMIT` to the SQL text at execution time.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some((limit, None));
        self
    }

    /// `LIMIT per_page OFFSET (page-1)*per_page`; pages start at 1.
    pub fn paginate(&mut self, page: u64, per_page: u64) -> &mut Self {
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.limit = Some((per_page, Some(offset)));
        self
    }

    /// Switch to another template compiled by the builder.
    pub fn with_cache_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.cache_key = key.into();
        self
    }

    /// Cached `(key, sql)` pairs sorted by key.
    pub fn cached_queries(&self) -> Vec<(String, String)> {
        let mut out: Vec<_> = self
            .templates
            .iter()
            .map(|(k, t)| (k.clone(), t.sql.clone()))
            .collect();
        out.sort();
        out
    }

    /// Placeholder columns of the current template in SQL order.
    pub fn qualified_columns(&self) -> Vec<String> {
        self.templates
            .get(&self.cache_key)
            .map(|t| t.qualified_columns().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Abort execution when `token` is cancelled.
    pub fn with_cancel_token(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = Some(token);
        self
    }

    /// Abort each execution call after `timeout`.
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run each callback against this statement, in order.
    pub fn apply_callbacks<F>(&mut self, callbacks: impl IntoIterator<Item = F>) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        for callback in callbacks {
            callback(self);
        }
        self
    }

    /// Drop arguments, records and execution-time clauses. Templates,
    /// options and the cancellation settings stay.
    pub fn reset(&mut self) -> &mut Self {
        self.args.clear();
        self.records.clear();
        self.column_aliases.clear();
        self.order_bys.clear();
        self.limit = None;
        self.record_offsets.clear();
        self
    }

    /// A copy with the same templates and options but no arguments or records.
    pub fn clone_fresh<'b>(&self) -> Dbr<'b> {
        Dbr {
            config: self.config.clone(),
            kind: self.kind,
            templates: self.templates.clone(),
            cache_key: self.cache_key.clone(),
            default_qualifier: self.default_qualifier.clone(),
            build_error: self.build_error.as_ref().map(DbrError::detached),
            args: Vec::new(),
            records: Vec::new(),
            column_aliases: Vec::new(),
            order_bys: Vec::new(),
            limit: None,
            cancel: self.cancel.clone(),
            timeout: self.timeout,
            record_offsets: Vec::new(),
        }
    }

    /// Final SQL and arguments as they would be sent to the executor.
    pub fn to_sql(&mut self) -> DbrResult<(String, Vec<Value>)> {
        self.resolve_statement()
    }

    fn check(&self) -> DbrResult<()> {
        match &self.build_error {
            Some(err) => Err(err.detached()),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        if self.config.id.is_empty() {
            format!("{:?} statement", self.kind)
        } else {
            format!("{:?} statement {:?}", self.kind, self.config.id)
        }
    }
}

impl<'a> ArgBuilder for &mut Dbr<'a> {
    fn arg(self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }
}
