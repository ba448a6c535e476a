//! WHERE, HAVING and ON predicates, SET assignments and expression columns.
//!
//! A [`Condition`] is built with free constructors and chained methods:
//!
//! ```
//! use sqldbr::condition::column;
//! use sqldbr::ArgBuilder;
//!
//! let cond = column("entity_id").is_in().ints([1, 2, 3]);
//! let other = column("name").like().str("Canon%").or();
//! # let _ = (cond, other);
//! ```
//!
//! Lists of conditions serialize in the order they were added. Each predicate
//! is wrapped in its own parentheses, the `or()` flag of a condition decides
//! the connector written before it, and [`paren_open`]/[`paren_close`] are
//! emitted literally. No precedence reordering takes place.

use crate::builder::select::Select;
use crate::builder::writer::SqlWriter;
use crate::error::{DbrError, DbrResult};
use crate::value::{Arg, ArgBuilder};

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equal,
    NotEqual,
    In,
    NotIn,
    Between,
    NotBetween,
    Like,
    NotLike,
    Null,
    NotNull,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Exists,
    NotExists,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Equal => "=",
            Op::NotEqual => "!=",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::Between => "BETWEEN",
            Op::NotBetween => "NOT BETWEEN",
            Op::Like => "LIKE",
            Op::NotLike => "NOT LIKE",
            Op::Null => "IS NULL",
            Op::NotNull => "IS NOT NULL",
            Op::Greater => ">",
            Op::Less => "<",
            Op::GreaterOrEqual => ">=",
            Op::LessOrEqual => "<=",
            Op::Exists => "EXISTS",
            Op::NotExists => "NOT EXISTS",
        }
    }

    fn is_list(self) -> bool {
        matches!(self, Op::In | Op::NotIn)
    }

    fn is_range(self) -> bool {
        matches!(self, Op::Between | Op::NotBetween)
    }

    fn is_null_check(self) -> bool {
        matches!(self, Op::Null | Op::NotNull)
    }
}

#[derive(Debug, Clone)]
enum Left {
    Column(String),
    Expr(String),
    ParenOpen,
    ParenClose,
}

#[derive(Debug, Clone)]
enum Right {
    /// The condition's own arguments.
    Args,
    Expr(String),
    Sub(Box<Select>),
    Column(String),
    Placeholder,
    NamedPlaceholder,
    Values,
}

/// A single predicate, assignment or expression column.
#[derive(Debug, Clone)]
pub struct Condition {
    left: Left,
    op: Option<Op>,
    right: Right,
    args: Vec<Arg>,
    or: bool,
    alias: String,
}

/// A condition on a column. Qualified names (`t.col`) are quoted per part.
pub fn column(name: impl Into<String>) -> Condition {
    Condition::new(Left::Column(name.into()))
}

/// A raw SQL expression written verbatim. `?` placeholders in it are bound to
/// the condition's arguments.
pub fn expr(sql: impl Into<String>) -> Condition {
    Condition::new(Left::Expr(sql.into()))
}

/// Open an explicit parenthesis group.
pub fn paren_open() -> Condition {
    Condition::new(Left::ParenOpen)
}

/// Close the innermost parenthesis group.
pub fn paren_close() -> Condition {
    Condition::new(Left::ParenClose)
}

macro_rules! op_methods {
    ($($(#[$doc:meta])* $name:ident => $op:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(self) -> Self {
                self.op(Op::$op)
            }
        )*
    };
}

impl Condition {
    fn new(left: Left) -> Self {
        Self {
            left,
            op: None,
            right: Right::Args,
            args: Vec::new(),
            or: false,
            alias: String::new(),
        }
    }

    /// Set the comparison operator.
    pub fn op(mut self, op: Op) -> Self {
        self.op = Some(op);
        self
    }

    op_methods! {
        equal => Equal,
        not_equal => NotEqual,
        /// `IN (...)`: every value of every argument gets its own `?`.
        is_in => In,
        not_in => NotIn,
        /// `BETWEEN ? AND ?`, from two scalars or one list of two values.
        between => Between,
        not_between => NotBetween,
        like => Like,
        not_like => NotLike,
        /// `IS NULL`; arguments are ignored.
        null => Null,
        not_null => NotNull,
        greater => Greater,
        less => Less,
        greater_or_equal => GreaterOrEqual,
        less_or_equal => LessOrEqual,
        exists => Exists,
        not_exists => NotExists,
    }

    /// Use a raw expression as right-hand side: `` `name` != CONCAT(...) ``.
    pub fn expr(mut self, sql: impl Into<String>) -> Self {
        self.right = Right::Expr(sql.into());
        self
    }

    /// Use a sub-select as right-hand side: `` `id` IN (SELECT ...) ``.
    pub fn sub(mut self, select: Select) -> Self {
        self.right = Right::Sub(Box::new(select));
        self
    }

    /// Compare with another column: `` `p2`.`id` = `p1`.`id` ``.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.right = Right::Column(name.into());
        self
    }

    /// Leave the value open; it is resolved from records or positional
    /// arguments when the statement is bound.
    pub fn placeholder(mut self) -> Self {
        self.right = Right::Placeholder;
        self
    }

    /// Like [`placeholder`](Self::placeholder) but resolved from the named
    /// argument matching the column name.
    pub fn named_placeholder(mut self) -> Self {
        self.right = Right::NamedPlaceholder;
        self
    }

    /// `` `col`=VALUES(`col`) `` in `ON DUPLICATE KEY UPDATE`.
    pub fn values(mut self) -> Self {
        self.right = Right::Values;
        self
    }

    /// Join this condition to the previous one with `OR` instead of `AND`.
    pub fn or(mut self) -> Self {
        self.or = true;
        self
    }

    /// Alias used when the condition is a SELECT column.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn is_or(&self) -> bool {
        self.or
    }

    pub fn arguments(&self) -> &[Arg] {
        &self.args
    }

    /// The column name, if this is a column condition.
    pub fn column_name(&self) -> Option<&str> {
        match &self.left {
            Left::Column(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn sub_select_mut(&mut self) -> Option<&mut Select> {
        match &mut self.right {
            Right::Sub(s) => Some(s),
            _ => None,
        }
    }

    fn effective_op(&self) -> Op {
        match self.op {
            Some(op) => op,
            None if matches!(self.right, Right::Args) && self.args.is_empty() => Op::Null,
            None => Op::Equal,
        }
    }

    fn write_predicate(&self, w: &mut SqlWriter) -> DbrResult<()> {
        let name = match &self.left {
            Left::Expr(sql) if self.op.is_none() && matches!(self.right, Right::Args) => {
                w.push('(');
                w.fragment(sql, &self.args);
                w.push(')');
                return Ok(());
            }
            Left::Expr(sql) => {
                w.push('(');
                w.push_str(sql);
                ""
            }
            Left::Column(c) => {
                w.push('(');
                w.quoted(c);
                c.as_str()
            }
            Left::ParenOpen | Left::ParenClose => return Ok(()),
        };
        let op = self.effective_op();
        w.push(' ');
        w.push_str(op.as_str());
        if op.is_null_check() {
            w.push(')');
            return Ok(());
        }
        w.push(' ');
        match &self.right {
            Right::Args if op.is_list() => {
                w.push('(');
                for (i, arg) in self.args.iter().enumerate() {
                    if i > 0 {
                        w.push(',');
                    }
                    w.bind_expanded(arg);
                }
                // An empty list leaves the clause open; the server reports it.
                if crate::value::leaf_count(&self.args) == 0 {
                    return Ok(());
                }
                w.push(')');
            }
            Right::Args if op.is_range() => {
                let values = crate::value::flatten(&self.args);
                if values.len() != 2 {
                    return Err(DbrError::mismatch(format!(
                        "{} on {name:?} requires exactly 2 values, got {}",
                        op.as_str(),
                        values.len()
                    )));
                }
                w.bind_one(&Arg::Value(values[0].clone()));
                w.push_str(" AND ");
                w.bind_one(&Arg::Value(values[1].clone()));
            }
            Right::Args => {
                for (i, arg) in self.args.iter().enumerate() {
                    if i > 0 {
                        w.push(',');
                    }
                    w.bind_one(arg);
                }
            }
            Right::Placeholder if op.is_range() => {
                w.placeholder(name);
                w.push_str(" AND ");
                w.placeholder(name);
            }
            Right::Placeholder if op.is_list() => {
                w.push('(');
                w.placeholder(name);
                w.push(')');
            }
            Right::NamedPlaceholder if op.is_list() => {
                w.push('(');
                w.placeholder(named(name));
                w.push(')');
            }
            right => self.write_right(w, right, name)?,
        }
        w.push(')');
        Ok(())
    }

    fn write_right(&self, w: &mut SqlWriter, right: &Right, name: &str) -> DbrResult<()> {
        match right {
            Right::Args => {
                if let Some(arg) = self.args.first() {
                    w.bind_one(arg);
                } else {
                    w.placeholder(name);
                }
            }
            Right::Expr(sql) => w.fragment(sql, &self.args),
            Right::Sub(select) => {
                w.push('(');
                select.write_sql(w)?;
                w.push(')');
            }
            Right::Column(other) => w.quoted(other),
            Right::Placeholder => w.placeholder(name),
            Right::NamedPlaceholder => w.placeholder(named(name)),
            Right::Values => {
                w.push_str("VALUES(");
                w.quoted(name);
                w.push(')');
            }
        }
        Ok(())
    }

    fn write_assignment(&self, w: &mut SqlWriter) -> DbrResult<()> {
        match &self.left {
            Left::Column(c) => {
                w.quoted(c);
                w.push('=');
                self.write_right(w, &self.right, c)
            }
            Left::Expr(sql) => {
                w.fragment(sql, &self.args);
                Ok(())
            }
            Left::ParenOpen | Left::ParenClose => Err(DbrError::not_allowed(
                "parentheses cannot be used as assignments",
            )),
        }
    }

    fn write_column(&self, w: &mut SqlWriter) -> DbrResult<()> {
        match (&self.left, &self.right) {
            (Left::Expr(sql), Right::Sub(select)) if sql.is_empty() => {
                w.push('(');
                select.write_sql(w)?;
                w.push(')');
            }
            (Left::Expr(sql), _) => w.fragment(sql, &self.args),
            (Left::Column(c), _) => w.quoted(c),
            (Left::ParenOpen | Left::ParenClose, _) => {
                return Err(DbrError::not_allowed(
                    "parentheses cannot be used as columns",
                ));
            }
        }
        w.alias(&self.alias);
        Ok(())
    }
}

fn named(column: &str) -> String {
    format!(":{column}")
}

impl ArgBuilder for Condition {
    fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Write `conds` as a boolean expression.
pub(crate) fn write_predicates(w: &mut SqlWriter, conds: &[Condition]) -> DbrResult<()> {
    let mut depth: usize = 0;
    let mut after_open = true;
    for cond in conds {
        if matches!(cond.left, Left::ParenClose) {
            depth = depth
                .checked_sub(1)
                .ok_or_else(|| DbrError::mismatch("closing parenthesis without opening one"))?;
            w.push(')');
            after_open = false;
            continue;
        }
        if !after_open {
            w.push_str(if cond.or { " OR " } else { " AND " });
        }
        if matches!(cond.left, Left::ParenOpen) {
            depth += 1;
            w.push('(');
            after_open = true;
            continue;
        }
        cond.write_predicate(w)?;
        after_open = false;
    }
    if depth != 0 {
        return Err(DbrError::mismatch(format!(
            "{depth} unclosed parenthesis in conditions"
        )));
    }
    Ok(())
}

/// Write `conds` as `SET`/`ON DUPLICATE KEY UPDATE` assignments.
pub(crate) fn write_assignments(w: &mut SqlWriter, conds: &[Condition]) -> DbrResult<()> {
    for (i, cond) in conds.iter().enumerate() {
        if i > 0 {
            w.push_str(", ");
        }
        cond.write_assignment(w)?;
    }
    Ok(())
}

/// Write a single condition as a SELECT column.
pub(crate) fn write_column(w: &mut SqlWriter, cond: &Condition) -> DbrResult<()> {
    cond.write_column(w)
}
