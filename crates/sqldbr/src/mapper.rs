//! Mapping between struct fields and columns.
//!
//! A type implementing [`ColumnMapper`] is used in both directions: binding
//! reads its fields as arguments and loading writes scanned row values into
//! them. The same `map_columns` body serves both, driven by [`ColumnMap`]:
//!
//! ```
//! use sqldbr::{ColumnMap, ColumnMapper, DbrError, DbrResult, MapMode};
//!
//! #[derive(Default)]
//! struct Person {
//!     id: i64,
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! impl ColumnMapper for Person {
//!     fn map_columns(&mut self, cm: &mut ColumnMap) -> DbrResult<()> {
//!         if cm.mode() == MapMode::ReadAll {
//!             cm.value(&mut self.id)?;
//!             cm.value(&mut self.name)?;
//!             return cm.value(&mut self.email);
//!         }
//!         while cm.next() {
//!             match cm.column() {
//!                 "id" => cm.value(&mut self.id)?,
//!                 "name" => cm.value(&mut self.name)?,
//!                 "email" => cm.value(&mut self.email)?,
//!                 other => return Err(DbrError::not_found(format!("column {other:?}"))),
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//! ```
//!
//! `#[derive(ColumnMapper)]` generates exactly this shape.

use crate::client::Row;
use crate::error::{DbrError, DbrResult};
use crate::value::{Arg, Value, ValueList};
use chrono::NaiveDateTime;

/// What a [`ColumnMap`] asks a mapper to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Emit every field as an argument, in declaration order.
    ReadAll,
    /// Emit the requested columns as arguments, in the requested order.
    ReadSet,
    /// Assign the current row's values to the fields.
    Scan,
}

/// Column cursor handed to [`ColumnMapper::map_columns`].
#[derive(Debug)]
pub struct ColumnMap {
    mode: MapMode,
    columns: Vec<String>,
    row: Option<Row>,
    /// Index of the current column; `None` before the first `next()`.
    index: Option<usize>,
    args: Vec<Arg>,
    rows_scanned: u64,
    row_major: bool,
}

impl ColumnMap {
    fn with_mode(mode: MapMode, columns: Vec<String>) -> Self {
        Self {
            mode,
            columns,
            row: None,
            index: None,
            args: Vec::new(),
            rows_scanned: 0,
            row_major: false,
        }
    }

    /// Collect every field of a record.
    pub fn read_all() -> Self {
        Self::with_mode(MapMode::ReadAll, Vec::new())
    }

    /// Collect the values of `columns`.
    pub fn read_set<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::with_mode(
            MapMode::ReadSet,
            columns.into_iter().map(Into::into).collect(),
        )
    }

    /// Collect the values of `columns` one record after another, which is the
    /// order of multi-row `VALUES` lists.
    pub(crate) fn read_rows(columns: &[String]) -> Self {
        Self {
            row_major: true,
            ..Self::read_set(columns.iter().cloned())
        }
    }

    /// Assign row values to records; feed rows with [`set_row`](Self::set_row).
    pub fn scan() -> Self {
        Self::with_mode(MapMode::Scan, Vec::new())
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Load the next row for scanning and rewind the column cursor.
    pub fn set_row(&mut self, row: Row) {
        self.columns.clear();
        self.columns.extend(row.columns().iter().cloned());
        self.row = Some(row);
        self.index = None;
        self.rows_scanned += 1;
    }

    /// The row currently being scanned.
    pub fn row(&self) -> Option<&Row> {
        self.row.as_ref()
    }

    /// Number of rows passed to [`set_row`](Self::set_row) so far.
    pub fn rows_scanned(&self) -> u64 {
        self.rows_scanned
    }

    /// Advance to the next column. Returns false once all columns are visited.
    pub fn next(&mut self) -> bool {
        let next = self.index.map_or(0, |i| i + 1);
        if next < self.columns.len() {
            self.index = Some(next);
            true
        } else {
            self.index = Some(self.columns.len());
            false
        }
    }

    /// Name of the current column.
    pub fn column(&self) -> &str {
        self.index
            .and_then(|i| self.columns.get(i))
            .map_or("", String::as_str)
    }

    /// Requested or scanned columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Read `field` into the collected arguments, or assign the current row
    /// value to it, depending on the mode.
    pub fn value<T: ColumnValue>(&mut self, field: &mut T) -> DbrResult<()> {
        match self.mode {
            MapMode::ReadAll | MapMode::ReadSet => {
                self.args.push(Arg::Value(field.to_value()));
                Ok(())
            }
            MapMode::Scan => {
                let column = self.column();
                let value = self
                    .index
                    .and_then(|i| self.row.as_ref()?.get(i))
                    .ok_or_else(|| DbrError::not_found(format!("no value for column {column:?}")))?;
                *field = T::from_value(value).map_err(|e| e.context(format!("column {column:?}")))?;
                Ok(())
            }
        }
    }

    /// Push a ready-made argument in read modes.
    pub fn arg(&mut self, arg: impl Into<Arg>) {
        self.args.push(arg.into());
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn take_args(&mut self) -> Vec<Arg> {
        std::mem::take(&mut self.args)
    }

    fn rewind(&mut self) {
        self.index = None;
    }
}

/// Field-to-column mapping of a domain type.
pub trait ColumnMapper {
    /// Read or write the fields selected by `cm`.
    fn map_columns(&mut self, cm: &mut ColumnMap) -> DbrResult<()>;

    /// Receives the auto-increment id generated when this record was
    /// inserted. The default ignores it.
    fn assign_last_insert_id(&mut self, id: u64) {
        let _ = id;
    }
}

/// A slice of records is a mapper too: scanning appends one element per row
/// and reading a column yields one list argument holding every element's
/// value, so a single `IN (?)` binds the whole collection.
///
/// A multi-row INSERT reports the id of its first row; the elements receive
/// consecutive ids from there.
impl<T: ColumnMapper + Default> ColumnMapper for Vec<T> {
    fn assign_last_insert_id(&mut self, id: u64) {
        for (item, id) in self.iter_mut().zip(id..) {
            item.assign_last_insert_id(id);
        }
    }

    fn map_columns(&mut self, cm: &mut ColumnMap) -> DbrResult<()> {
        match cm.mode {
            MapMode::Scan => {
                let mut item = T::default();
                item.map_columns(cm)?;
                self.push(item);
                Ok(())
            }
            MapMode::ReadAll => {
                for item in self.iter_mut() {
                    item.map_columns(cm)?;
                }
                Ok(())
            }
            MapMode::ReadSet if cm.row_major => {
                for item in self.iter_mut() {
                    cm.rewind();
                    item.map_columns(cm)?;
                }
                Ok(())
            }
            MapMode::ReadSet => {
                for column in cm.columns.clone() {
                    let mut values = Vec::with_capacity(self.len());
                    for item in self.iter_mut() {
                        let mut single = ColumnMap::read_set([column.as_str()]);
                        item.map_columns(&mut single)?;
                        for arg in single.take_args() {
                            arg.flatten_into(&mut values);
                        }
                    }
                    cm.args.push(Arg::List(ValueList::from_values(values)));
                }
                Ok(())
            }
        }
    }
}

/// Conversion between a field type and [`Value`].
pub trait ColumnValue: Sized {
    fn to_value(&self) -> Value;
    fn from_value(value: &Value) -> DbrResult<Self>;
}

fn unexpected<T>(value: &Value, target: &str) -> DbrResult<T> {
    Err(DbrError::not_valid(format!(
        "cannot convert {} value {value:?} into {target}",
        value.kind_name()
    )))
}

macro_rules! column_value_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl ColumnValue for $t {
                fn to_value(&self) -> Value {
                    Value::from(*self)
                }

                fn from_value(value: &Value) -> DbrResult<Self> {
                    let target = stringify!($t);
                    let out_of_range = || DbrError::out_of_range(format!("{value:?} does not fit into {target}"));
                    match value {
                        Value::Int(v) => <$t>::try_from(*v).map_err(|_| out_of_range()),
                        Value::Uint(v) => <$t>::try_from(*v).map_err(|_| out_of_range()),
                        Value::Bool(v) => Ok(<$t>::from(*v)),
                        Value::Str(s) => s.trim().parse().or_else(|_| unexpected(value, target)),
                        Value::Bytes(b) => std::str::from_utf8(b)
                            .ok()
                            .and_then(|s| s.trim().parse().ok())
                            .map_or_else(|| unexpected(value, target), Ok),
                        _ => unexpected(value, target),
                    }
                }
            }
        )*
    };
}

column_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! column_value_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl ColumnValue for $t {
                fn to_value(&self) -> Value {
                    Value::Float(f64::from(*self))
                }

                #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                fn from_value(value: &Value) -> DbrResult<Self> {
                    match value {
                        Value::Float(v) => Ok(*v as $t),
                        Value::Int(v) => Ok(*v as $t),
                        Value::Uint(v) => Ok(*v as $t),
                        Value::Str(s) => s.trim().parse().or_else(|_| unexpected(value, stringify!($t))),
                        Value::Bytes(b) => std::str::from_utf8(b)
                            .ok()
                            .and_then(|s| s.trim().parse().ok())
                            .map_or_else(|| unexpected(value, stringify!($t)), Ok),
                        _ => unexpected(value, stringify!($t)),
                    }
                }
            }
        )*
    };
}

column_value_float!(f32, f64);

impl ColumnValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> DbrResult<Self> {
        match value {
            Value::Bool(v) => Ok(*v),
            Value::Int(v) => Ok(*v != 0),
            Value::Uint(v) => Ok(*v != 0),
            Value::Str(s) => match s.as_str() {
                "1" | "true" | "TRUE" => Ok(true),
                "0" | "false" | "FALSE" => Ok(false),
                _ => unexpected(value, "bool"),
            },
            _ => unexpected(value, "bool"),
        }
    }
}

impl ColumnValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: &Value) -> DbrResult<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|e| DbrError::not_valid(format!("column bytes are not UTF-8: {e}"))),
            Value::Int(v) => Ok(v.to_string()),
            Value::Uint(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Bool(v) => Ok(if *v { "1" } else { "0" }.to_string()),
            Value::Time(t) => Ok(t.format("%Y-%m-%d %H:%M:%S").to_string()),
            Value::Null => unexpected(value, "String"),
        }
    }
}

impl ColumnValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: &Value) -> DbrResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Str(s) => Ok(s.as_bytes().to_vec()),
            _ => unexpected(value, "Vec<u8>"),
        }
    }
}

const TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

impl ColumnValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Time(*self)
    }

    fn from_value(value: &Value) -> DbrResult<Self> {
        let text = match value {
            Value::Time(t) => return Ok(*t),
            Value::Str(s) => s.as_str(),
            Value::Bytes(b) => std::str::from_utf8(b).unwrap_or_default(),
            _ => return unexpected(value, "NaiveDateTime"),
        };
        TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map_or_else(|| unexpected(value, "NaiveDateTime"), Ok)
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ColumnValue::to_value)
    }

    fn from_value(value: &Value) -> DbrResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// A record paired with the table qualifier it supplies values for.
pub struct QualifiedRecord<'a> {
    pub qualifier: String,
    pub record: &'a mut (dyn ColumnMapper + Send),
}

impl std::fmt::Debug for QualifiedRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualifiedRecord")
            .field("qualifier", &self.qualifier)
            .finish_non_exhaustive()
    }
}

/// Pair `record` with `qualifier`. An empty qualifier matches the statement's
/// main table.
pub fn qualify<'a>(
    qualifier: impl Into<String>,
    record: &'a mut (dyn ColumnMapper + Send),
) -> QualifiedRecord<'a> {
    QualifiedRecord {
        qualifier: qualifier.into(),
        record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i64,
        name: String,
        email: Option<String>,
    }

    impl ColumnMapper for Person {
        fn map_columns(&mut self, cm: &mut ColumnMap) -> DbrResult<()> {
            if cm.mode() == MapMode::ReadAll {
                cm.value(&mut self.id)?;
                cm.value(&mut self.name)?;
                return cm.value(&mut self.email);
            }
            while cm.next() {
                match cm.column() {
                    "id" => cm.value(&mut self.id)?,
                    "name" => cm.value(&mut self.name)?,
                    "email" => cm.value(&mut self.email)?,
                    other => return Err(DbrError::not_found(format!("column {other:?}"))),
                }
            }
            Ok(())
        }
    }

    fn person(id: i64, name: &str) -> Person {
        Person {
            id,
            name: name.to_string(),
            email: None,
        }
    }

    #[test]
    fn test_read_set_follows_requested_order() {
        let mut p = person(6666, "Hans Wurst");
        let mut cm = ColumnMap::read_set(["email", "id"]);
        p.map_columns(&mut cm).unwrap();
        assert_eq!(
            cm.take_args(),
            vec![Arg::Value(Value::Null), Arg::Value(Value::Int(6666))]
        );
    }

    #[test]
    fn test_unknown_column_is_not_found() {
        let mut p = person(1, "a");
        let mut cm = ColumnMap::read_set(["nope"]);
        assert!(p.map_columns(&mut cm).unwrap_err().is_not_found());
    }

    #[test]
    fn test_scan_into_collection() {
        let columns: Arc<[String]> =
            vec!["id".to_string(), "name".to_string(), "email".to_string()].into();
        let mut people: Vec<Person> = Vec::new();
        let mut cm = ColumnMap::scan();
        for (id, name) in [(1_i64, "a"), (2, "b")] {
            cm.set_row(
                Row::new(
                    columns.clone(),
                    vec![Value::Int(id), Value::Str(name.into()), Value::Null],
                )
                .unwrap(),
            );
            people.map_columns(&mut cm).unwrap();
        }
        assert_eq!(people, vec![person(1, "a"), person(2, "b")]);
        assert_eq!(cm.rows_scanned(), 2);
    }

    #[test]
    fn test_collection_read_set_yields_lists() {
        let mut people = vec![person(1, "a"), person(2, "b")];
        let mut cm = ColumnMap::read_set(["id"]);
        people.map_columns(&mut cm).unwrap();
        assert_eq!(cm.take_args(), vec![Arg::List(ValueList::Ints(vec![1, 2]))]);

        let columns = ["id".to_string(), "name".to_string()];
        let mut cm = ColumnMap::read_rows(&columns);
        people.map_columns(&mut cm).unwrap();
        assert_eq!(cm.take_args().len(), 4);
    }

    #[test]
    fn test_column_value_conversions() {
        assert_eq!(i32::from_value(&Value::Uint(7)).unwrap(), 7);
        assert!(u8::from_value(&Value::Int(300)).unwrap_err().is_out_of_range());
        assert!(i64::from_value(&Value::Null).unwrap_err().is_not_valid());
        assert_eq!(Option::<i64>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(String::from_value(&Value::Bytes(b"x".to_vec())).unwrap(), "x");
        assert!(bool::from_value(&Value::Int(1)).unwrap());
        let t = NaiveDateTime::from_value(&Value::Str("2024-01-02 03:04:05".into())).unwrap();
        assert_eq!(t.to_string(), "2024-01-02 03:04:05");
    }
}
