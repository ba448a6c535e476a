//! SQL text writer shared by all statement builders.
//!
//! Besides the SQL text the writer records one [`Slot`] per argument position
//! in emission order. A slot is either a bound argument or a column waiting
//! for a value from a record or a positional argument.

use crate::ident::{self, Ident};
use crate::interpolate::{Token, placeholder_count, tokenize};
use crate::value::{Arg, leaf_count};

/// One argument position in a SQL template.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// A value bound while building. `expanded` lists occupy one `?` per value,
    /// all other arguments exactly one `?`.
    Bound { arg: Arg, expanded: bool },
    /// A single `?` resolved later. The name is a (possibly qualified) column,
    /// `:name` for named placeholders or empty for bare positional ones.
    Column(String),
}

impl Slot {
    pub fn column_name(&self) -> Option<&str> {
        match self {
            Slot::Column(name) => Some(name),
            Slot::Bound { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SqlWriter {
    sql: String,
    slots: Vec<Slot>,
    slots_only: bool,
}

impl SqlWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A writer which records slots but no SQL text, used when the SQL
    /// template is already cached.
    pub(crate) fn slots_only() -> Self {
        Self {
            slots_only: true,
            ..Self::default()
        }
    }

    /// An empty writer in the same mode, for parts which are post-processed
    /// before being appended.
    pub(crate) fn child(&self) -> Self {
        Self {
            slots_only: self.slots_only,
            ..Self::default()
        }
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        if !self.slots_only {
            self.sql.push_str(s);
        }
    }

    pub(crate) fn push(&mut self, c: char) {
        if !self.slots_only {
            self.sql.push(c);
        }
    }

    pub(crate) fn quoted(&mut self, name: &str) {
        if !self.slots_only {
            ident::write_quoted(&mut self.sql, name);
        }
    }

    pub(crate) fn alias(&mut self, alias: &str) {
        if !self.slots_only {
            ident::write_alias(&mut self.sql, alias);
        }
    }

    pub(crate) fn ident(&mut self, ident: &Ident) {
        if !self.slots_only {
            ident.write_to(&mut self.sql);
        }
    }

    pub(crate) fn idents(&mut self, idents: &[Ident], sep: &str) {
        if !self.slots_only {
            ident::write_list(&mut self.sql, idents, sep);
        }
    }

    /// Quoted column list in parentheses without spaces: `` (`a`,`b`) ``.
    pub(crate) fn column_list(&mut self, columns: &[String]) {
        self.push('(');
        for (i, c) in columns.iter().enumerate() {
            if i > 0 {
                self.push(',');
            }
            self.quoted(c);
        }
        self.push(')');
    }

    /// Bind `arg` writing one `?` per value: lists become `?,?,?`.
    pub(crate) fn bind_expanded(&mut self, arg: &Arg) {
        let n = arg.leaf_count();
        for i in 0..n {
            if i > 0 {
                self.push(',');
            }
            self.push('?');
        }
        self.slots.push(Slot::Bound {
            arg: arg.clone(),
            expanded: true,
        });
    }

    /// Bind `arg` to a single `?`.
    pub(crate) fn bind_one(&mut self, arg: &Arg) {
        self.push('?');
        self.slots.push(Slot::Bound {
            arg: arg.clone(),
            expanded: false,
        });
    }

    /// A `?` resolved later from records or positional arguments.
    pub(crate) fn placeholder(&mut self, column: impl Into<String>) {
        self.push('?');
        self.slots.push(Slot::Column(column.into()));
    }

    /// Write a raw SQL fragment and bind `args` to its placeholders.
    ///
    /// If the fragment has one `?` per value the arguments count as expanded.
    /// Without arguments every `?` and `:name` becomes a slot resolved later.
    pub(crate) fn fragment(&mut self, sql: &str, args: &[Arg]) {
        if args.is_empty() {
            self.raw(sql);
            return;
        }
        self.push_str(sql);
        let expanded = placeholder_count(sql) == leaf_count(args);
        for arg in args {
            self.slots.push(Slot::Bound {
                arg: arg.clone(),
                expanded,
            });
        }
    }

    /// Write raw SQL turning `:name` into `?` and registering every placeholder.
    pub(crate) fn raw(&mut self, sql: &str) {
        for token in tokenize(sql, true) {
            match token {
                Token::Text(text) => self.push_str(text),
                Token::Positional => self.placeholder(""),
                Token::Named(name) => self.placeholder(format!(":{name}")),
            }
        }
    }

    pub(crate) fn append_slots(&mut self, slots: impl IntoIterator<Item = Slot>) {
        self.slots.extend(slots);
    }

    pub(crate) fn sql_len(&self) -> usize {
        self.sql.len()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn finish(self) -> (String, Vec<Slot>) {
        (self.sql, self.slots)
    }
}
