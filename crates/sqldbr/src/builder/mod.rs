//! Statement builders.
//!
//! Every builder follows the same life cycle:
//!
//! 1. Accumulate columns, tables and conditions through `&mut self` methods.
//! 2. `to_sql()` serializes a template with `?` placeholders and returns the
//!    arguments bound while building.
//! 3. `with_args()` snapshots the compiled templates into a [`Dbr`](crate::Dbr)
//!    which resolves records and runtime arguments and talks to the executor.
//!
//! Compiled templates are kept per cache key on the statement itself. With
//! [`build_cache`](select::Select::build_cache) enabled the first SQL text of a
//! key is reused verbatim; only the arguments are collected again.

pub mod delete;
pub mod insert;
pub mod listen;
pub mod select;
pub mod union;
pub mod update;
pub mod with;
pub(crate) mod writer;

pub use delete::Delete;
pub use insert::Insert;
pub use listen::{Listener, ListenerFn};
pub use select::{Join, Select};
pub use union::Union;
pub use update::Update;
pub use with::{Cte, CteBody, Terminal, With};
pub use writer::Slot;

use crate::error::{DbrError, DbrResult};
use crate::ident::Ident;
use crate::value::Value;
use std::collections::HashMap;
use writer::SqlWriter;

/// Layout of a multi-row `VALUES` list inside an INSERT template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct InsertShape {
    pub columns: Vec<String>,
    /// Byte range of the row list in the SQL text.
    pub rows_start: usize,
    pub rows_end: usize,
    /// Slots belonging to the row list.
    pub row_slots: std::ops::Range<usize>,
    /// Rows requested with `set_row_count`, 0 if unset.
    pub row_count: usize,
    /// Rows were added with `add_values` and are final.
    pub explicit: bool,
}

/// A compiled statement: SQL text plus the ordered argument slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    pub(crate) sql: String,
    pub(crate) slots: Vec<Slot>,
    /// How often one select was repeated by a union template.
    pub(crate) repeat: usize,
    pub(crate) insert: Option<InsertShape>,
}

impl Template {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Placeholder columns in the order they appear in the SQL text.
    pub fn qualified_columns(&self) -> Vec<&str> {
        self.slots.iter().filter_map(Slot::column_name).collect()
    }

    /// Values bound while building, flattened.
    pub(crate) fn bound_values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        for slot in &self.slots {
            if let Slot::Bound { arg, .. } = slot {
                arg.flatten_into(&mut out);
            }
        }
        out
    }
}

/// State shared by all builders: template cache, cache key, default qualifier
/// and deferred build errors.
#[derive(Debug, Clone, Default)]
pub(crate) struct Common {
    pub id: String,
    pub cache: HashMap<String, Template>,
    pub cache_key: String,
    pub build_cache: bool,
    pub default_qualifier: String,
    pub build_error: Option<String>,
}

impl Common {
    pub fn fail(&mut self, message: String) {
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
    }

    pub fn check(&self) -> DbrResult<()> {
        match &self.build_error {
            Some(message) => Err(DbrError::mismatch(message.clone())),
            None => Ok(()),
        }
    }

    /// A writer for the current key; text is skipped when the cached SQL is
    /// reused.
    pub fn writer(&self) -> SqlWriter {
        if self.build_cache && self.cache.contains_key(&self.cache_key) {
            SqlWriter::slots_only()
        } else {
            SqlWriter::new()
        }
    }

    /// Store the output of `w` under the current key and return the template.
    pub fn store(
        &mut self,
        w: SqlWriter,
        repeat: usize,
        insert: Option<InsertShape>,
    ) -> Template {
        let reused = self.build_cache && self.cache.contains_key(&self.cache_key);
        let (sql, slots) = w.finish();
        let entry = self.cache.entry(self.cache_key.clone()).or_default();
        if !reused {
            entry.sql = sql;
            entry.insert = insert;
        }
        entry.slots = slots;
        entry.repeat = repeat.max(1);
        entry.clone()
    }

    /// Cached `(key, sql)` pairs sorted by key.
    pub fn cached_queries(&self) -> Vec<(String, String)> {
        let mut out: Vec<_> = self
            .cache
            .iter()
            .map(|(k, t)| (k.clone(), t.sql.clone()))
            .collect();
        out.sort();
        out
    }
}

/// Builder methods shared by all statements for cache control.
macro_rules! common_methods {
    () => {
        /// Keep the first SQL text generated for each cache key and reuse it
        /// on later builds; only arguments are collected again.
        pub fn build_cache(&mut self) -> &mut Self {
            self.common.build_cache = true;
            self
        }

        /// Select the cache entry subsequent builds read and write.
        pub fn with_cache_key(&mut self, key: impl Into<String>) -> &mut Self {
            self.common.cache_key = key.into();
            self
        }

        /// Identifier used in logs and error messages.
        pub fn with_id(&mut self, id: impl Into<String>) -> &mut Self {
            self.common.id = id.into();
            self
        }

        /// Cached `(key, sql)` pairs sorted by key.
        pub fn cached_queries(&self) -> Vec<(String, String)> {
            self.common.cached_queries()
        }

        /// Serialize the statement: SQL text with `?` placeholders plus the
        /// values bound while building.
        pub fn to_sql(&mut self) -> $crate::error::DbrResult<(String, Vec<$crate::value::Value>)> {
            let template = self.compile()?;
            let values = template.bound_values();
            Ok((template.sql, values))
        }

        /// Compile and snapshot the statement into a bound statement which
        /// resolves records and runtime arguments.
        pub fn with_args<'a>(&mut self) -> $crate::dbr::Dbr<'a> {
            let compiled = self.compile().map(|_| ());
            $crate::dbr::Dbr::from_builder(&self.common, self.statement_kind(), compiled)
        }
    };
}

pub(crate) use common_methods;

pub(crate) fn write_order_by(w: &mut SqlWriter, order_bys: &[Ident], deactivated: bool) {
    if deactivated {
        w.push_str(" ORDER BY NULL");
    } else if !order_bys.is_empty() {
        w.push_str(" ORDER BY ");
        w.idents(order_bys, ", ");
    }
}

pub(crate) fn write_limit(w: &mut SqlWriter, limit: Option<u64>, offset: Option<u64>) {
    if let Some(limit) = limit {
        w.push_str(" LIMIT ");
        w.push_str(&limit.to_string());
        if let Some(offset) = offset {
            w.push_str(" OFFSET ");
            w.push_str(&offset.to_string());
        }
    }
}

#[cfg(test)]
mod tests;
