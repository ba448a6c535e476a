use super::writer::SqlWriter;
use super::{Common, Template, common_methods, write_limit, write_order_by};
use crate::condition::{self, Condition};
use crate::error::{DbrError, DbrResult};
use crate::ident::Ident;
use crate::monitor::QueryType;

/// DELETE statement builder.
#[derive(Debug, Clone, Default)]
pub struct Delete {
    pub(crate) common: Common,
    table: Option<Ident>,
    wheres: Vec<Condition>,
    order_bys: Vec<Ident>,
    limit: Option<u64>,
}

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        let mut del = Self::default();
        del.from(table);
        del
    }

    common_methods!();

    pub fn statement_kind(&self) -> QueryType {
        QueryType::Delete
    }

    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        let table = table.into();
        self.common.default_qualifier = table.clone();
        self.table = Some(Ident::new(table));
        self
    }

    pub fn from_as(&mut self, table: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        let ident = Ident::new(table).alias(alias);
        self.common.default_qualifier = ident.qualifier().to_string();
        self.table = Some(ident);
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
            .ok_or_else(|| DbrError::empty("DELETE requires a table"))?;
        w.push_str("DELETE FROM ");
        w.ident(table);
        if !self.wheres.is_empty() {
            w.push_str(" WHERE ");
            condition::write_predicates(w, &self.wheres)?;
        }
        write_order_by(w, &self.order_bys, false);
        write_limit(w, self.limit, None);
        Ok(())
    }
}
