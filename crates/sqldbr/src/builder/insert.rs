use super::select::Select;
use super::writer::SqlWriter;
use super::{Common, InsertShape, Template, common_methods};
use crate::condition::{self, Condition};
use crate::error::{DbrError, DbrResult};
use crate::ident::Ident;
use crate::monitor::QueryType;
use crate::value::{Arg, Args};

/// INSERT statement builder.
///
/// Rows come from [`add_values`](Self::add_values), from records bound to the
/// [`Dbr`](crate::Dbr) or from a SELECT. Without explicit rows the template
/// carries one row of placeholders, which is regenerated at bind time to
/// match the number of values the arguments and records provide.
#[derive(Debug, Clone, Default)]
pub struct Insert {
    pub(crate) common: Common,
    table: Option<Ident>,
    columns: Vec<String>,
    rows: Vec<Vec<Arg>>,
    row_count: usize,
    on_duplicate_key: Vec<Condition>,
    ignore: bool,
    replace: bool,
    select: Option<Box<Select>>,
}

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        let mut ins = Self::default();
        ins.table(table);
        ins
    }

    common_methods!();

    pub fn statement_kind(&self) -> QueryType {
        QueryType::Insert
    }

    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = Some(Ident::new(table));
        self
    }

    pub fn add_columns<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Append one row of values. Lists are written as one `?` per value.
    pub fn add_values(&mut self, row: Args) -> &mut Self {
        self.rows.push(row.into_vec());
        self
    }

    /// Number of rows the bound values are split into. Without it the row
    /// count is derived from the column count.
    pub fn set_row_count(&mut self, rows: usize) -> &mut Self {
        self.row_count = rows;
        self
    }

    /// Append `ON DUPLICATE KEY UPDATE` assignments; `column("sku").values()`
    /// gives `` `sku`=VALUES(`sku`) ``.
    pub fn on_duplicate_key(&mut self, assignments: impl IntoIterator<Item = Condition>) -> &mut Self {
        self.on_duplicate_key.extend(assignments);
        self
    }

    /// `INSERT IGNORE`.
    pub fn ignore(&mut self) -> &mut Self {
        self.ignore = true;
        self
    }

    /// `REPLACE` instead of `INSERT`.
    pub fn replace(&mut self) -> &mut Self {
        self.replace = true;
        self
    }

    /// `INSERT ... SELECT`.
    pub fn from_select(&mut self, select: Select) -> &mut Self {
        self.select = Some(Box::new(select));
        self
    }

    fn compile(&mut self) -> DbrResult<Template> {
        self.common.check()?;
        if let Some(select) = self.select.as_mut() {
            select.prepare();
        }
        let mut w = self.common.writer();
        let shape = self.write_sql(&mut w)?;
        Ok(self.common.store(w, 1, shape))
    }

    fn write_sql(&self, w: &mut SqlWriter) -> DbrResult<Option<InsertShape>> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| DbrError::empty("INSERT requires a table"))?;
        w.push_str(if self.replace { "REPLACE " } else { "INSERT " });
        if self.ignore {
            w.push_str("IGNORE ");
        }
        w.push_str("INTO ");
        w.ident(table);
        if !self.columns.is_empty() {
            w.push(' ');
            w.column_list(&self.columns);
        }

        let shape = if let Some(select) = &self.select {
            w.push(' ');
            select.write_sql(w)?;
            None
        } else {
            Some(self.write_rows(w)?)
        };

        if !self.on_duplicate_key.is_empty() {
            w.push_str(" ON DUPLICATE KEY UPDATE ");
            condition::write_assignments(w, &self.on_duplicate_key)?;
        }
        Ok(shape)
    }

    fn write_rows(&self, w: &mut SqlWriter) -> DbrResult<InsertShape> {
        if self.rows.is_empty() && self.columns.is_empty() {
            return Err(DbrError::empty("INSERT requires columns, values or a SELECT"));
        }
        w.push_str(" VALUES ");
        let rows_start = w.sql_len();
        let slots_start = w.slot_count();
        if self.rows.is_empty() {
            for row in 0..self.row_count.max(1) {
                if row > 0 {
                    w.push(',');
                }
                w.push('(');
                for (i, column) in self.columns.iter().enumerate() {
                    if i > 0 {
                        w.push(',');
                    }
                    w.placeholder(column.as_str());
                }
                w.push(')');
            }
        } else {
            for (r, row) in self.rows.iter().enumerate() {
                if r > 0 {
                    w.push(',');
                }
                w.push('(');
                for (i, arg) in row.iter().enumerate() {
                    if i > 0 {
                        w.push(',');
                    }
                    w.bind_expanded(arg);
                }
                w.push(')');
            }
        }
        Ok(InsertShape {
            columns: self.columns.clone(),
            rows_start,
            rows_end: w.sql_len(),
            row_slots: slots_start..w.slot_count(),
            row_count: self.row_count,
            explicit: !self.rows.is_empty(),
        })
    }
}
