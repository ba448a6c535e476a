use super::listen::{self, Listener};
use super::writer::SqlWriter;
use super::{Common, Template, common_methods, write_limit, write_order_by};
use crate::condition::{self, Condition};
use crate::error::{DbrError, DbrResult};
use crate::ident::Ident;
use crate::monitor::QueryType;

#[derive(Debug, Clone)]
enum Column {
    Ident(Ident),
    Cond(Condition),
}

#[derive(Debug, Clone, Default)]
enum Source {
    #[default]
    None,
    Table(Ident),
    Derived {
        select: Box<Select>,
        alias: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Lock {
    #[default]
    None,
    ShareMode,
    ForUpdate,
}

/// A JOIN clause with either ON conditions or a USING column list.
#[derive(Debug, Clone)]
pub struct Join {
    kind: &'static str,
    table: Ident,
    on: Vec<Condition>,
    using: Vec<String>,
}

/// SELECT statement builder.
///
/// ```
/// use sqldbr::condition::column;
/// use sqldbr::{ArgBuilder, Select};
///
/// let mut sel = Select::new(["a", "b"]);
/// sel.from("c").where_([column("id").equal().int(1)]);
/// let (sql, args) = sel.to_sql().unwrap();
/// assert_eq!(sql, "SELECT `a`, `b` FROM `c` WHERE (`id` = ?)");
/// assert_eq!(args.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub(crate) common: Common,
    source: Source,
    columns: Vec<Column>,
    original_columns: Option<Vec<Column>>,
    is_unsafe: bool,
    distinct: bool,
    straight_join: bool,
    sql_no_cache: bool,
    joins: Vec<Join>,
    wheres: Vec<Condition>,
    group_bys: Vec<Ident>,
    havings: Vec<Condition>,
    order_bys: Vec<Ident>,
    order_by_null: bool,
    limit: Option<u64>,
    offset: Option<u64>,
    lock: Lock,
    listeners: Vec<Listener>,
}

impl Select {
    /// Create a SELECT of the given columns. No columns selects `*`.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let mut sel = Self::default();
        sel.add_columns(columns);
        sel
    }

    /// Create a SELECT reading from a derived table: `FROM (SELECT ...) AS alias`.
    pub fn with_derived_table(inner: Select, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        let mut sel = Self::default();
        sel.common.default_qualifier = alias.clone();
        sel.source = Source::Derived {
            select: Box::new(inner),
            alias,
        };
        sel
    }

    common_methods!();

    pub fn statement_kind(&self) -> QueryType {
        QueryType::Select
    }

    /// Columns added after this call are quoted only when they are valid
    /// identifiers and written verbatim otherwise.
    pub fn unsafe_mode(&mut self) -> &mut Self {
        self.is_unsafe = true;
        self
    }

    fn ident(&self, name: impl Into<String>) -> Ident {
        if self.is_unsafe {
            Ident::lenient(name)
        } else {
            Ident::new(name)
        }
    }

    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        let table = table.into();
        self.common.default_qualifier = table.clone();
        self.source = Source::Table(Ident::new(table));
        self
    }

    pub fn from_as(&mut self, table: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        let ident = Ident::new(table).alias(alias);
        self.common.default_qualifier = ident.qualifier().to_string();
        self.source = Source::Table(ident);
        self
    }

    pub fn add_columns<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        for c in columns {
            let ident = self.ident(c);
            self.columns.push(Column::Ident(ident));
        }
        self
    }

    /// Add columns from alternating expression and alias entries:
    /// `["e.price", "final_price", "t.qty", "qty"]`.
    pub fn add_columns_aliases<S: Into<String>>(
        &mut self,
        expressions_aliases: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let entries: Vec<String> = expressions_aliases.into_iter().map(Into::into).collect();
        if entries.len() % 2 != 0 {
            self.common.fail(format!(
                "add_columns_aliases expects balanced expression/alias pairs, got {entries:?}"
            ));
            return self;
        }
        for pair in entries.chunks_exact(2) {
            let ident = self.ident(pair[0].clone()).alias(pair[1].clone());
            self.columns.push(Column::Ident(ident));
        }
        self
    }

    /// Add expression, sub-select or aliased columns.
    pub fn add_columns_conditions(&mut self, conds: impl IntoIterator<Item = Condition>) -> &mut Self {
        self.columns.extend(conds.into_iter().map(Column::Cond));
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    pub fn straight_join(&mut self) -> &mut Self {
        self.straight_join = true;
        self
    }

    pub fn sql_no_cache(&mut self) -> &mut Self {
        self.sql_no_cache = true;
        self
    }

    fn add_join(
        &mut self,
        kind: &'static str,
        table: Ident,
        on: Vec<Condition>,
        using: Vec<String>,
    ) -> &mut Self {
        self.joins.push(Join {
            kind,
            table,
            on,
            using,
        });
        self
    }

    pub fn join(
        &mut self,
        table: impl Into<Ident>,
        on: impl IntoIterator<Item = Condition>,
    ) -> &mut Self {
        self.add_join("INNER JOIN", table.into(), on.into_iter().collect(), Vec::new())
    }

    pub fn left_join(
        &mut self,
        table: impl Into<Ident>,
        on: impl IntoIterator<Item = Condition>,
    ) -> &mut Self {
        self.add_join("LEFT JOIN", table.into(), on.into_iter().collect(), Vec::new())
    }

    pub fn right_join(
        &mut self,
        table: impl Into<Ident>,
        on: impl IntoIterator<Item = Condition>,
    ) -> &mut Self {
        self.add_join("RIGHT JOIN", table.into(), on.into_iter().collect(), Vec::new())
    }

    pub fn join_using<S: Into<String>>(
        &mut self,
        table: impl Into<Ident>,
        columns: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let using = columns.into_iter().map(Into::into).collect();
        self.add_join("INNER JOIN", table.into(), Vec::new(), using)
    }

    pub fn left_join_using<S: Into<String>>(
        &mut self,
        table: impl Into<Ident>,
        columns: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let using = columns.into_iter().map(Into::into).collect();
        self.add_join("LEFT JOIN", table.into(), Vec::new(), using)
    }

    pub fn right_join_using<S: Into<String>>(
        &mut self,
        table: impl Into<Ident>,
        columns: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let using = columns.into_iter().map(Into::into).collect();
        self.add_join("RIGHT JOIN", table.into(), Vec::new(), using)
    }

    /// Append WHERE conditions.
    pub fn where_(&mut self, conds: impl IntoIterator<Item = Condition>) -> &mut Self {
        self.wheres.extend(conds);
        self
    }

    pub fn group_by<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        for c in columns {
            let c: String = c.into();
            let ident = Ident::sort_entry(&c, self.is_unsafe);
            self.group_bys.push(ident);
        }
        self
    }

    /// Append HAVING conditions.
    pub fn having(&mut self, conds: impl IntoIterator<Item = Condition>) -> &mut Self {
        self.havings.extend(conds);
        self
    }

    /// Append ORDER BY entries; a trailing ` ASC`/` DESC` is honoured.
    pub fn order_by<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        for c in columns {
            let c: String = c.into();
            let ident = Ident::sort_entry(&c, self.is_unsafe);
            self.order_bys.push(ident);
        }
        self
    }

    pub fn order_by_desc<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        for c in columns {
            let c: String = c.into();
            let ident = Ident::sort_entry(&c, self.is_unsafe).desc();
            self.order_bys.push(ident);
        }
        self
    }

    /// `ORDER BY NULL`, which skips the implicit sort of GROUP BY.
    pub fn order_by_deactivated(&mut self) -> &mut Self {
        self.order_by_null = true;
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// `LIMIT per_page OFFSET (page-1)*per_page`; pages start at 1.
    pub fn paginate(&mut self, page: u64, per_page: u64) -> &mut Self {
        self.limit = Some(per_page);
        self.offset = Some(page.saturating_sub(1).saturating_mul(per_page));
        self
    }

    pub fn lock_in_share_mode(&mut self) -> &mut Self {
        self.lock = Lock::ShareMode;
        self
    }

    pub fn for_update(&mut self) -> &mut Self {
        self.lock = Lock::ForUpdate;
        self
    }

    /// Replace the columns with `` COUNT(*) AS `counted` ``. The previous
    /// columns are kept and come back with [`original_columns`](Self::original_columns).
    pub fn count(&mut self) -> &mut Self {
        let counted = vec![Column::Ident(Ident::expr("COUNT(*)").alias("counted"))];
        let previous = std::mem::replace(&mut self.columns, counted);
        if self.original_columns.is_none() {
            self.original_columns = Some(previous);
        }
        self
    }

    /// Restore the columns replaced by [`count`](Self::count).
    pub fn original_columns(&mut self) -> &mut Self {
        if let Some(columns) = self.original_columns.take() {
            self.columns = columns;
        }
        self
    }

    /// Register a listener which runs before every serialization.
    pub fn listen(&mut self, listener: Listener) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    fn dispatch_listeners(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let listeners = std::mem::take(&mut self.listeners);
        let kept = listen::dispatch(listeners, self);
        let added = std::mem::replace(&mut self.listeners, kept);
        self.listeners.extend(added);
    }

    /// Run listeners, including those of nested selects.
    pub(crate) fn prepare(&mut self) {
        self.dispatch_listeners();
        if let Source::Derived { select, .. } = &mut self.source {
            select.prepare();
        }
        for cond in self.wheres.iter_mut().chain(self.havings.iter_mut()) {
            if let Some(sub) = cond.sub_select_mut() {
                sub.prepare();
            }
        }
    }

    fn compile(&mut self) -> DbrResult<Template> {
        self.prepare();
        self.common.check()?;
        let mut w = self.common.writer();
        self.write_sql(&mut w)?;
        Ok(self.common.store(w, 1, None))
    }

    pub(crate) fn write_sql(&self, w: &mut SqlWriter) -> DbrResult<()> {
        self.common.check()?;
        w.push_str("SELECT ");
        if self.distinct {
            w.push_str("DISTINCT ");
        }
        if self.straight_join {
            w.push_str("STRAIGHT_JOIN ");
        }
        if self.sql_no_cache {
            w.push_str("SQL_NO_CACHE ");
        }
        if self.columns.is_empty() {
            w.push('*');
        }
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                w.push_str(", ");
            }
            match column {
                Column::Ident(ident) => w.ident(ident),
                Column::Cond(cond) => condition::write_column(w, cond)?,
            }
        }

        match &self.source {
            Source::None => {}
            Source::Table(table) => {
                w.push_str(" FROM ");
                w.ident(table);
            }
            Source::Derived { select, alias } => {
                if alias.is_empty() {
                    return Err(DbrError::not_valid("a derived table requires an alias"));
                }
                w.push_str(" FROM (");
                select.write_sql(w)?;
                w.push(')');
                w.alias(alias);
            }
        }

        for join in &self.joins {
            w.push(' ');
            w.push_str(join.kind);
            w.push(' ');
            w.ident(&join.table);
            if !join.using.is_empty() {
                w.push_str(" USING ");
                w.column_list(&join.using);
            } else if !join.on.is_empty() {
                w.push_str(" ON ");
                condition::write_predicates(w, &join.on)?;
            }
        }

        if !self.wheres.is_empty() {
            w.push_str(" WHERE ");
            condition::write_predicates(w, &self.wheres)?;
        }
        if !self.group_bys.is_empty() {
            w.push_str(" GROUP BY ");
            w.idents(&self.group_bys, ", ");
        }
        if !self.havings.is_empty() {
            w.push_str(" HAVING ");
            condition::write_predicates(w, &self.havings)?;
        }
        write_order_by(w, &self.order_bys, self.order_by_null);
        write_limit(w, self.limit, self.offset);
        match self.lock {
            Lock::None => {}
            Lock::ShareMode => w.push_str(" LOCK IN SHARE MODE"),
            Lock::ForUpdate => w.push_str(" FOR UPDATE"),
        }
        Ok(())
    }
}
