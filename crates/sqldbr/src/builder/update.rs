use super::writer::SqlWriter;
use super::{Common, Template, common_methods, write_limit, write_order_by};
use crate::condition::{self, Condition};
use crate::error::{DbrError, DbrResult};
use crate::ident::Ident;
use crate::monitor::QueryType;

/// UPDATE statement builder.
///
/// SET entries are conditions written as assignments: `column("n").int(6)`
/// gives `` `n`=? ``, `column("n").placeholder()` leaves the value to a
/// record or positional argument and `expr("n=n+1")` is written verbatim.
#[derive(Debug, Clone, Default)]
pub struct Update {
    pub(crate) common: Common,
    table: Option<Ident>,
    sets: Vec<Condition>,
    wheres: Vec<Condition>,
    order_bys: Vec<Ident>,
    limit: Option<u64>,
}

impl Update {
    pub fn new(table: impl Into<String>) -> Self {
        let mut upd = Self::default();
        upd.table(table);
        upd
    }

    common_methods!();

    pub fn statement_kind(&self) -> QueryType {
        QueryType::Update
    }

    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        let table = table.into();
        self.common.default_qualifier = table.clone();
        self.table = Some(Ident::new(table));
        self
    }

    pub fn table_as(&mut self, table: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        let ident = Ident::new(table).alias(alias);
        self.common.default_qualifier = ident.qualifier().to_string();
        self.table = Some(ident);
        self
    }

    /// Append SET assignments.
    pub fn set(&mut self, assignments: impl IntoIterator<Item = Condition>) -> &mut Self {
        self.sets.extend(assignments);
        self
    }

    /// Assign every column a placeholder resolved at bind time.
    pub fn add_columns<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        self.sets
            .extend(columns.into_iter().map(|c| condition::column(c).placeholder()));
        self
    }

    /// Append WHERE conditions.
    pub fn where_(&mut self, conds: impl IntoIterator<Item = Condition>) -> &mut Self {
        self.wheres.extend(conds);
        self
    }

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

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    fn compile(&mut self) -> DbrResult<Template> {
        self.common.check()?;
        let mut w = self.common.writer();
        self.write_sql(&mut w)?;
        Ok(self.common.store(w, 1, None))
    }

    pub(crate) fn write_sql(&self, w: &mut SqlWriter) -> DbrResult<()> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| DbrError::empty("UPDATE requires a table"))?;
        if self.sets.is_empty() {
            return Err(DbrError::empty("UPDATE requires at least one SET assignment"));
        }
        w.push_str("UPDATE ");
        w.ident(table);
        w.push_str(" SET ");
        condition::write_assignments(w, &self.sets)?;
        if !self.wheres.is_empty() {
            w.push_str(" WHERE ");
            condition::write_predicates(w, &self.wheres)?;
        }
        write_order_by(w, &self.order_bys, false);
        write_limit(w, self.limit, None);
        Ok(())
    }
}
