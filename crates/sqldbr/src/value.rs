//! Argument value model.
//!
//! Every value which can be bound to a placeholder is one of the closed set of
//! kinds in [`Value`]. Slice-valued arguments (for `IN (...)` lists and
//! collection records) are kept contiguous in [`ValueList`] so a list of a
//! thousand integers is one `Vec<i64>`, not a thousand enum values.
//!
//! [`Arg`] is what statements and the binder store: a scalar, a list, or a
//! named argument wrapping either of those. [`ArgBuilder`] provides the typed
//! setter methods shared by [`Args`], conditions and bound statements.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// A single SQL argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Time(NaiveDateTime),
}

impl Value {
    /// Returns true for SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int64",
            Value::Uint(_) => "uint64",
            Value::Float(_) => "float64",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "time",
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $cast)
                }
            }
        )*
    };
}

value_from! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    isize => Int as i64,
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    usize => Uint as u64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Time(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v.naive_utc())
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Str(v.hyphenated().to_string())
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            other => Value::Str(other.to_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from(&v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A slice-valued argument; each element is one leaf value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValueList {
    Bools(Vec<bool>),
    Ints(Vec<i64>),
    Uints(Vec<u64>),
    Floats(Vec<f64>),
    Strs(Vec<String>),
    Bytes(Vec<Vec<u8>>),
    Times(Vec<NaiveDateTime>),
    /// Mixed kinds or lists containing `NULL`.
    Nullable(Vec<Value>),
}

impl ValueList {
    /// Number of leaf values.
    pub fn len(&self) -> usize {
        match self {
            ValueList::Bools(v) => v.len(),
            ValueList::Ints(v) => v.len(),
            ValueList::Uints(v) => v.len(),
            ValueList::Floats(v) => v.len(),
            ValueList::Strs(v) => v.len(),
            ValueList::Bytes(v) => v.len(),
            ValueList::Times(v) => v.len(),
            ValueList::Nullable(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The leaf at `idx` as a scalar value.
    pub fn get(&self, idx: usize) -> Option<Value> {
        Some(match self {
            ValueList::Bools(v) => Value::Bool(*v.get(idx)?),
            ValueList::Ints(v) => Value::Int(*v.get(idx)?),
            ValueList::Uints(v) => Value::Uint(*v.get(idx)?),
            ValueList::Floats(v) => Value::Float(*v.get(idx)?),
            ValueList::Strs(v) => Value::Str(v.get(idx)?.clone()),
            ValueList::Bytes(v) => Value::Bytes(v.get(idx)?.clone()),
            ValueList::Times(v) => Value::Time(*v.get(idx)?),
            ValueList::Nullable(v) => v.get(idx)?.clone(),
        })
    }

    /// Iterate over the leaves as scalar values.
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Append all leaves to `out`.
    pub fn flatten_into(&self, out: &mut Vec<Value>) {
        out.reserve(self.len());
        out.extend(self.iter());
    }

    /// Build the most specific list for `values`: a typed list when every
    /// element has the same non-null kind, otherwise [`ValueList::Nullable`].
    pub fn from_values(values: Vec<Value>) -> Self {
        let Some(first) = values.first() else {
            return ValueList::Nullable(values);
        };
        let kind = std::mem::discriminant(first);
        let kind_name = first.kind_name();
        if first.is_null() || values.iter().any(|v| std::mem::discriminant(v) != kind) {
            return ValueList::Nullable(values);
        }
        macro_rules! collect {
            ($variant:ident, $list:ident) => {
                ValueList::$list(
                    values
                        .into_iter()
                        .filter_map(|v| match v {
                            Value::$variant(x) => Some(x),
                            _ => None,
                        })
                        .collect(),
                )
            };
        }
        match kind_name {
            "bool" => collect!(Bool, Bools),
            "int64" => collect!(Int, Ints),
            "uint64" => collect!(Uint, Uints),
            "float64" => collect!(Float, Floats),
            "string" => collect!(Str, Strs),
            "bytes" => collect!(Bytes, Bytes),
            "time" => collect!(Time, Times),
            _ => ValueList::Nullable(values),
        }
    }
}

impl From<Vec<bool>> for ValueList {
    fn from(v: Vec<bool>) -> Self {
        ValueList::Bools(v)
    }
}

impl From<Vec<i64>> for ValueList {
    fn from(v: Vec<i64>) -> Self {
        ValueList::Ints(v)
    }
}

impl From<Vec<u64>> for ValueList {
    fn from(v: Vec<u64>) -> Self {
        ValueList::Uints(v)
    }
}

impl From<Vec<f64>> for ValueList {
    fn from(v: Vec<f64>) -> Self {
        ValueList::Floats(v)
    }
}

impl From<Vec<String>> for ValueList {
    fn from(v: Vec<String>) -> Self {
        ValueList::Strs(v)
    }
}

impl From<Vec<&str>> for ValueList {
    fn from(v: Vec<&str>) -> Self {
        ValueList::Strs(v.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<NaiveDateTime>> for ValueList {
    fn from(v: Vec<NaiveDateTime>) -> Self {
        ValueList::Times(v)
    }
}

impl From<Vec<Value>> for ValueList {
    fn from(v: Vec<Value>) -> Self {
        ValueList::from_values(v)
    }
}

/// One bound argument: a scalar, a list or a named argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    List(ValueList),
    /// Matched against `:name` placeholders. The name is stored without the colon.
    Named { name: String, arg: Box<Arg> },
}

impl Arg {
    /// Create a named argument. A leading `:` in `name` is ignored.
    pub fn named(name: impl Into<String>, arg: impl Into<Arg>) -> Self {
        let mut name = name.into();
        if let Some(stripped) = name.strip_prefix(':') {
            name = stripped.to_owned();
        }
        Arg::Named {
            name,
            arg: Box::new(arg.into()),
        }
    }

    /// The name of a named argument.
    pub fn name(&self) -> Option<&str> {
        match self {
            Arg::Named { name, .. } if !name.is_empty() => Some(name),
            _ => None,
        }
    }

    /// The argument with any name stripped.
    pub fn unnamed(&self) -> &Arg {
        match self {
            Arg::Named { arg, .. } => arg.unnamed(),
            other => other,
        }
    }

    /// Number of leaf values this argument binds.
    pub fn leaf_count(&self) -> usize {
        match self.unnamed() {
            Arg::List(list) => list.len(),
            _ => 1,
        }
    }

    /// Returns true if this argument is slice-valued.
    pub fn is_list(&self) -> bool {
        matches!(self.unnamed(), Arg::List(_))
    }

    /// Append all leaves to `out`.
    pub fn flatten_into(&self, out: &mut Vec<Value>) {
        match self.unnamed() {
            Arg::Value(v) => out.push(v.clone()),
            Arg::List(list) => list.flatten_into(out),
            Arg::Named { .. } => {}
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

impl From<ValueList> for Arg {
    fn from(v: ValueList) -> Self {
        Arg::List(v)
    }
}

macro_rules! arg_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Value(Value::from(v))
                }
            }
        )*
    };
}

arg_from_value!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, &str,
    NaiveDateTime, uuid::Uuid,
);

/// Flatten a list of arguments into leaf values.
pub fn flatten(args: &[Arg]) -> Vec<Value> {
    let mut out = Vec::with_capacity(leaf_count(args));
    for arg in args {
        arg.flatten_into(&mut out);
    }
    out
}

/// Total number of leaf values in `args`.
pub fn leaf_count(args: &[Arg]) -> usize {
    args.iter().map(Arg::leaf_count).sum()
}

/// Typed argument setters shared by every type which accumulates arguments.
///
/// Implemented by value for [`Args`] and conditions, and for `&mut Dbr` so
/// bound statements chain in place.
pub trait ArgBuilder: Sized {
    /// Append one argument.
    fn arg(self, arg: impl Into<Arg>) -> Self;

    fn null(self) -> Self {
        self.arg(Value::Null)
    }

    fn int(self, v: i64) -> Self {
        self.arg(Value::Int(v))
    }

    fn ints(self, v: impl IntoIterator<Item = i64>) -> Self {
        self.arg(ValueList::Ints(v.into_iter().collect()))
    }

    fn uint(self, v: u64) -> Self {
        self.arg(Value::Uint(v))
    }

    fn uints(self, v: impl IntoIterator<Item = u64>) -> Self {
        self.arg(ValueList::Uints(v.into_iter().collect()))
    }

    fn float64(self, v: f64) -> Self {
        self.arg(Value::Float(v))
    }

    fn float64s(self, v: impl IntoIterator<Item = f64>) -> Self {
        self.arg(ValueList::Floats(v.into_iter().collect()))
    }

    fn bool(self, v: bool) -> Self {
        self.arg(Value::Bool(v))
    }

    fn bools(self, v: impl IntoIterator<Item = bool>) -> Self {
        self.arg(ValueList::Bools(v.into_iter().collect()))
    }

    fn str(self, v: impl Into<String>) -> Self {
        self.arg(Value::Str(v.into()))
    }

    fn strs<S: Into<String>>(self, v: impl IntoIterator<Item = S>) -> Self {
        self.arg(ValueList::Strs(v.into_iter().map(Into::into).collect()))
    }

    fn bytes(self, v: impl Into<Vec<u8>>) -> Self {
        self.arg(Value::Bytes(v.into()))
    }

    fn bytes_slice<B: Into<Vec<u8>>>(self, v: impl IntoIterator<Item = B>) -> Self {
        self.arg(ValueList::Bytes(v.into_iter().map(Into::into).collect()))
    }

    fn time(self, v: NaiveDateTime) -> Self {
        self.arg(Value::Time(v))
    }

    fn times(self, v: impl IntoIterator<Item = NaiveDateTime>) -> Self {
        self.arg(ValueList::Times(v.into_iter().collect()))
    }

    /// `NULL` for `None`, the value otherwise.
    fn opt<T: Into<Value>>(self, v: Option<T>) -> Self {
        self.arg(Value::from(v))
    }

    /// A list which may contain `NULL` entries.
    fn nullables<T: Into<Value>>(self, v: impl IntoIterator<Item = Option<T>>) -> Self {
        self.arg(ValueList::Nullable(v.into_iter().map(Value::from).collect()))
    }

    /// A JSON document bound as its compact text form.
    fn json(self, v: &serde_json::Value) -> Self {
        self.arg(Value::from(v))
    }

    /// An argument matched against the `:name` placeholder.
    fn named(self, name: impl Into<String>, v: impl Into<Arg>) -> Self {
        self.arg(Arg::named(name, v))
    }
}

/// An ordered argument list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    args: Vec<Arg>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list with room for `cap` arguments.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            args: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.args.iter()
    }

    pub fn as_slice(&self) -> &[Arg] {
        &self.args
    }

    pub fn into_vec(self) -> Vec<Arg> {
        self.args
    }

    /// Total number of leaf values.
    pub fn leaf_count(&self) -> usize {
        leaf_count(&self.args)
    }

    /// Returns true if any argument is slice-valued.
    pub fn has_list(&self) -> bool {
        self.args.iter().any(Arg::is_list)
    }

    /// All leaf values in order.
    pub fn flatten(&self) -> Vec<Value> {
        flatten(&self.args)
    }
}

impl ArgBuilder for Args {
    fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl From<Vec<Arg>> for Args {
    fn from(args: Vec<Arg>) -> Self {
        Self { args }
    }
}

impl IntoIterator for Args {
    type Item = Arg;
    type IntoIter = std::vec::IntoIter<Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.args.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_flatten_keeps_order() {
        let args = Args::new().int(9).ints([5, 6, 7]).str("x");
        assert_eq!(args.len(), 3);
        assert_eq!(args.leaf_count(), 5);
        assert!(args.has_list());
        assert_eq!(
            args.flatten(),
            vec![
                Value::Int(9),
                Value::Int(5),
                Value::Int(6),
                Value::Int(7),
                Value::Str("x".into())
            ]
        );
    }

    #[test]
    fn test_named_arg_strips_colon() {
        let arg = Arg::named(":id", 5_i64);
        assert_eq!(arg.name(), Some("id"));
        assert_eq!(arg.leaf_count(), 1);
        assert_eq!(arg.unnamed(), &Arg::Value(Value::Int(5)));
    }

    #[test]
    fn test_from_values_picks_typed_list() {
        let list = ValueList::from_values(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list, ValueList::Ints(vec![1, 2]));

        let mixed = ValueList::from_values(vec![Value::Int(1), Value::Null]);
        assert!(matches!(mixed, ValueList::Nullable(_)));
        assert_eq!(mixed.len(), 2);
    }

    #[test]
    fn test_opt_and_json() {
        let args = Args::new()
            .opt(None::<i64>)
            .opt(Some("a"))
            .json(&serde_json::json!({"k": 1}));
        assert_eq!(
            args.flatten(),
            vec![
                Value::Null,
                Value::Str("a".into()),
                Value::Str("{\"k\":1}".into())
            ]
        );
    }

    #[test]
    fn test_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![Value::Int(1), Value::Null, Value::Str("a".into())])
            .unwrap();
        assert_eq!(json, "[1,null,\"a\"]");
    }
}
