use super::select::Select;
use super::writer::SqlWriter;
use super::{Common, Template, common_methods, write_order_by};
use crate::condition::expr;
use crate::error::{DbrError, DbrResult};
use crate::ident::Ident;
use crate::monitor::QueryType;

const PRESERVE_COLUMN: &str = "_preserve_result_set";

/// UNION of SELECT statements.
///
/// Members are wrapped in parentheses and joined by `UNION` or `UNION ALL`
/// on their own lines. In template mode one SELECT is repeated once per
/// replacement value; its arguments repeat with it.
#[derive(Debug, Clone, Default)]
pub struct Union {
    pub(crate) common: Common,
    selects: Vec<Select>,
    all: bool,
    preserve_result_set: bool,
    preserve_applied: bool,
    order_bys: Vec<Ident>,
    replacements: Vec<(String, Vec<String>)>,
    is_template: bool,
}

impl Union {
    pub fn new(selects: impl IntoIterator<Item = Select>) -> Self {
        Self {
            selects: selects.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Repeat `select` once per value given to
    /// [`string_replace`](Self::string_replace).
    pub fn template(select: Select) -> Self {
        Self {
            selects: vec![select],
            is_template: true,
            ..Self::default()
        }
    }

    common_methods!();

    pub fn statement_kind(&self) -> QueryType {
        QueryType::Select
    }

    pub fn append(&mut self, selects: impl IntoIterator<Item = Select>) -> &mut Self {
        self.selects.extend(selects);
        self
    }

    /// `UNION ALL` instead of `UNION`.
    pub fn all(&mut self) -> &mut Self {
        self.all = true;
        self
    }

    /// Keep the rows of each member together and in member order by adding
    /// a `_preserve_result_set` column and sorting on it first.
    pub fn preserve_result_set(&mut self) -> &mut Self {
        self.preserve_result_set = true;
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

    /// In template mode, replace `key` in the SELECT text with the n-th value
    /// in the n-th repetition. All keys need the same number of values.
    pub fn string_replace<S: Into<String>>(
        &mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let key = key.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if let Some((first_key, first)) = self.replacements.first() {
            if first.len() != values.len() {
                self.common.fail(format!(
                    "string_replace {key:?} has {} values, {first_key:?} has {}",
                    values.len(),
                    first.len()
                ));
                return self;
            }
        }
        self.replacements.push((key, values));
        self
    }

    fn repetitions(&self) -> usize {
        if self.is_template {
            self.replacements.first().map_or(1, |(_, v)| v.len().max(1))
        } else {
            1
        }
    }

    pub(crate) fn prepare(&mut self) {
        if self.preserve_result_set && !self.preserve_applied && !self.is_template {
            for (i, select) in self.selects.iter_mut().enumerate() {
                select.add_columns_conditions([expr(i.to_string()).alias(PRESERVE_COLUMN)]);
            }
            self.preserve_applied = true;
        }
        for select in &mut self.selects {
            select.prepare();
        }
    }

    fn compile(&mut self) -> DbrResult<Template> {
        self.prepare();
        self.common.check()?;
        let mut w = self.common.writer();
        self.write_sql(&mut w)?;
        Ok(self.common.store(w, self.repetitions(), None))
    }

    pub(crate) fn write_sql(&self, w: &mut SqlWriter) -> DbrResult<()> {
        self.common.check()?;
        if self.selects.is_empty() {
            return Err(DbrError::empty("UNION requires at least one SELECT"));
        }
        let separator = if self.all {
            "\nUNION ALL\n"
        } else {
            "\nUNION\n"
        };
        if self.is_template {
            let select = &self.selects[0];
            for i in 0..self.repetitions() {
                if i > 0 {
                    w.push_str(separator);
                }
                let mut part = w.child();
                select.write_sql(&mut part)?;
                let (mut sql, slots) = part.finish();
                for (key, values) in &self.replacements {
                    if let Some(value) = values.get(i) {
                        sql = sql.replace(key.as_str(), value);
                    }
                }
                w.push('(');
                w.push_str(&sql);
                w.push(')');
                w.append_slots(slots);
            }
        } else {
            for (i, select) in self.selects.iter().enumerate() {
                if i > 0 {
                    w.push_str(separator);
                }
                w.push('(');
                select.write_sql(w)?;
                w.push(')');
            }
        }

        if self.preserve_applied {
            let mut order = Vec::with_capacity(self.order_bys.len() + 1);
            order.push(Ident::new(PRESERVE_COLUMN));
            order.extend(self.order_bys.iter().cloned());
            write_order_by(w, &order, false);
        } else {
            write_order_by(w, &self.order_bys, false);
        }
        Ok(())
    }
}
