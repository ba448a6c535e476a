//! Common table expressions: `WITH [RECURSIVE] name (cols) AS (...) stmt`.

use super::delete::Delete;
use super::select::Select;
use super::union::Union;
use super::update::Update;
use super::writer::SqlWriter;
use super::{Common, Template, common_methods};
use crate::error::{DbrError, DbrResult};
use crate::monitor::QueryType;

/// Body of a common table expression.
#[derive(Debug, Clone)]
pub enum CteBody {
    Select(Box<Select>),
    Union(Box<Union>),
}

/// One named subquery of a WITH clause.
#[derive(Debug, Clone)]
pub struct Cte {
    name: String,
    columns: Vec<String>,
    body: Option<CteBody>,
}

impl Cte {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            body: None,
        }
    }

    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn select(mut self, select: Select) -> Self {
        self.body = Some(CteBody::Select(Box::new(select)));
        self
    }

    pub fn union(mut self, union: Union) -> Self {
        self.body = Some(CteBody::Union(Box::new(union)));
        self
    }

    fn prepare(&mut self) {
        match &mut self.body {
            Some(CteBody::Select(s)) => s.prepare(),
            Some(CteBody::Union(u)) => u.prepare(),
            None => {}
        }
    }

    fn write_sql(&self, w: &mut SqlWriter) -> DbrResult<()> {
        let body = self.body.as_ref().ok_or_else(|| {
            DbrError::empty(format!("common table expression {:?} has no SELECT or UNION", self.name))
        })?;
        w.quoted(&self.name);
        if !self.columns.is_empty() {
            w.push(' ');
            w.column_list(&self.columns);
        }
        w.push_str(" AS (");
        match body {
            CteBody::Select(s) => s.write_sql(w)?,
            CteBody::Union(u) => u.write_sql(w)?,
        }
        w.push(')');
        Ok(())
    }
}

/// Statement following the WITH clause.
#[derive(Debug, Clone)]
pub enum Terminal {
    Select(Box<Select>),
    Update(Box<Update>),
    Delete(Box<Delete>),
    Union(Box<Union>),
}

/// WITH statement builder.
#[derive(Debug, Clone, Default)]
pub struct With {
    pub(crate) common: Common,
    ctes: Vec<Cte>,
    recursive: bool,
    terminal: Option<Terminal>,
}

impl With {
    pub fn new(ctes: impl IntoIterator<Item = Cte>) -> Self {
        Self {
            ctes: ctes.into_iter().collect(),
            ..Self::default()
        }
    }

    common_methods!();

    /// Kind of the terminal statement, `Select` if none is set yet.
    pub fn statement_kind(&self) -> QueryType {
        match &self.terminal {
            Some(Terminal::Update(_)) => QueryType::Update,
            Some(Terminal::Delete(_)) => QueryType::Delete,
            _ => QueryType::Select,
        }
    }

    pub fn recursive(&mut self) -> &mut Self {
        self.recursive = true;
        self
    }

    pub fn select(&mut self, select: Select) -> &mut Self {
        self.terminal = Some(Terminal::Select(Box::new(select)));
        self
    }

    pub fn update(&mut self, update: Update) -> &mut Self {
        self.terminal = Some(Terminal::Update(Box::new(update)));
        self
    }

    pub fn delete(&mut self, delete: Delete) -> &mut Self {
        self.terminal = Some(Terminal::Delete(Box::new(delete)));
        self
    }

    pub fn union(&mut self, union: Union) -> &mut Self {
        self.terminal = Some(Terminal::Union(Box::new(union)));
        self
    }

    fn compile(&mut self) -> DbrResult<Template> {
        for cte in &mut self.ctes {
            cte.prepare();
        }
        match &mut self.terminal {
            Some(Terminal::Select(s)) => s.prepare(),
            Some(Terminal::Union(u)) => u.prepare(),
            _ => {}
        }
        self.common.check()?;
        let mut w = self.common.writer();
        self.write_sql(&mut w)?;
        Ok(self.common.store(w, 1, None))
    }

    fn write_sql(&self, w: &mut SqlWriter) -> DbrResult<()> {
        if self.ctes.is_empty() {
            return Err(DbrError::empty("WITH requires at least one common table expression"));
        }
        let terminal = self
            .terminal
            .as_ref()
            .ok_or_else(|| DbrError::empty("WITH requires a terminal statement"))?;

        w.push_str("WITH ");
        if self.recursive {
            w.push_str("RECURSIVE ");
        }
        for (i, cte) in self.ctes.iter().enumerate() {
            if i > 0 {
                w.push_str(",\n");
            }
            cte.write_sql(w)?;
        }
        if self.recursive
            && !self
                .ctes
                .iter()
                .any(|cte| matches!(cte.body, Some(CteBody::Union(_))))
        {
            return Err(DbrError::not_valid(
                "WITH RECURSIVE requires a common table expression with a UNION body",
            ));
        }
        w.push('\n');
        match terminal {
            Terminal::Select(s) => s.write_sql(w),
            Terminal::Update(u) => u.write_sql(w),
            Terminal::Delete(d) => d.write_sql(w),
            Terminal::Union(u) => u.write_sql(w),
        }
    }
}
