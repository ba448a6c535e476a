//! Argument resolution: turns a cached template plus runtime arguments and
//! records into the final SQL text and the flat list of values.

use super::Dbr;
use crate::builder::{InsertShape, Slot, Template};
use crate::error::{DbrError, DbrResult, ResultExt};
use crate::ident::{self, Ident, split_column};
use crate::interpolate::{Placed, expand_into, interpolate_into, placeholder_count};
use crate::mapper::{ColumnMap, QualifiedRecord};
use crate::pool;
use crate::value::{Arg, Value, ValueList};

/// An argument lined up with its `?`; `expanded` lists already carry one `?`
/// per value.
type Resolved = (Arg, bool);

impl Dbr<'_> {
    /// Resolve all placeholders and render the final statement.
    pub(super) fn resolve_statement(&mut self) -> DbrResult<(String, Vec<Value>)> {
        self.check()?;
        let Dbr {
            config,
            templates,
            cache_key,
            default_qualifier,
            args,
            records,
            column_aliases,
            order_bys,
            limit,
            record_offsets,
            ..
        } = self;

        let template = templates.get(cache_key.as_str()).ok_or_else(|| {
            DbrError::empty(format!("no cached SQL for cache key {cache_key:?}"))
        })?;
        let positional: Vec<&Arg> = args.iter().filter(|a| a.name().is_none()).collect();
        let mut resolver = Resolver {
            named: args.as_slice(),
            records: records.as_mut_slice(),
            default_qualifier: default_qualifier.as_str(),
        };

        record_offsets.clear();
        let (mut sql, placed) = match &template.insert {
            Some(shape) if !shape.explicit => {
                resolver.resolve_insert(template, shape, &positional, column_aliases.as_slice(), record_offsets)?
            }
            _ => {
                let placed = resolver.resolve(
                    &template.slots,
                    template.repeat,
                    &positional,
                    column_aliases.as_slice(),
                )?;
                (template.sql.clone(), placed)
            }
        };

        write_order_limit(&mut sql, order_bys, *limit);
        finish(config.interpolate, config.expand_placeholders, sql, &placed)
    }

    /// The SQL text sent for the current cache key before any argument is
    /// bound: one `?` per placeholder, execution-time ORDER BY and LIMIT
    /// appended.
    pub(super) fn statement_text(&self) -> DbrResult<String> {
        self.check()?;
        if self.config.interpolate {
            return Err(DbrError::not_allowed(
                "interpolated statements cannot be prepared",
            ));
        }
        let template = self.templates.get(self.cache_key.as_str()).ok_or_else(|| {
            DbrError::empty(format!("no cached SQL for cache key {:?}", self.cache_key))
        })?;
        let mut sql = template.sql.clone();
        write_order_limit(&mut sql, &self.order_bys, self.limit);
        Ok(sql)
    }
}

fn write_order_limit(sql: &mut String, order_bys: &[Ident], limit: Option<(u64, Option<u64>)>) {
    if !order_bys.is_empty() {
        sql.push_str(" ORDER BY ");
        ident::write_list(sql, order_bys, ", ");
    }
    if let Some((limit, offset)) = limit {
        sql.push_str(" LIMIT ");
        sql.push_str(&limit.to_string());
        if let Some(offset) = offset {
            sql.push_str(" OFFSET ");
            sql.push_str(&offset.to_string());
        }
    }
}

/// Render `sql` with `placed`: interpolated, expanded or verified as is.
fn finish(
    interpolate: bool,
    expand: bool,
    sql: String,
    placed: &[Resolved],
) -> DbrResult<(String, Vec<Value>)> {
    let refs: Vec<Placed<'_>> = placed
        .iter()
        .map(|(arg, expanded)| Placed {
            arg,
            expanded: *expanded,
        })
        .collect();

    if interpolate {
        let mut out = pool::get();
        interpolate_into(&mut out, &sql, &refs)?;
        return Ok((out.to_string_lossy(), Vec::new()));
    }

    let mut values = Vec::with_capacity(placed.len());
    for (arg, _) in placed {
        arg.flatten_into(&mut values);
    }

    if placed.iter().any(|(arg, expanded)| !expanded && arg.is_list()) {
        if !expand {
            return Err(DbrError::mismatch(
                "a list argument is bound to a single placeholder; enable placeholder expansion or interpolation",
            ));
        }
        let mut out = pool::get();
        expand_into(&mut out, &sql, &refs)?;
        return Ok((out.to_string_lossy(), values));
    }

    let count = placeholder_count(&sql);
    if count != values.len() {
        return Err(DbrError::mismatch(format!(
            "{count} placeholders but {} values",
            values.len()
        )));
    }
    Ok((sql, values))
}

/// Does a record registered for `record` supply columns qualified with `column`?
fn qualifier_matches(record: &str, column: &str, default: &str) -> bool {
    record == column
        || (record.is_empty() && (column.is_empty() || column == default))
        || (column.is_empty() && record == default)
}

struct Resolver<'r, 'a> {
    named: &'r [Arg],
    records: &'r mut [QualifiedRecord<'a>],
    default_qualifier: &'r str,
}

impl Resolver<'_, '_> {
    /// Line up `slots` with their arguments.
    ///
    /// Union templates repeat one select `repeat` times; every repetition
    /// consumes the positional arguments from the start.
    fn resolve(
        &mut self,
        slots: &[Slot],
        repeat: usize,
        positional: &[&Arg],
        aliases: &[String],
    ) -> DbrResult<Vec<Resolved>> {
        let columns = slots.iter().filter(|s| s.column_name().is_some()).count();
        if !aliases.is_empty() && aliases.len() != columns {
            return Err(DbrError::mismatch(format!(
                "{} column aliases for {columns} placeholder columns",
                aliases.len()
            )));
        }

        let block = if repeat > 1 && slots.len() % repeat == 0 {
            slots.len() / repeat
        } else {
            slots.len()
        };

        let mut out = Vec::with_capacity(slots.len());
        let mut alias_idx = 0;
        if slots.is_empty() {
            check_consumed(0, positional.len())?;
        }
        for chunk in slots.chunks(block.max(1)) {
            let mut cursor = 0;
            for slot in chunk {
                match slot {
                    Slot::Bound { arg, expanded } => out.push((arg.clone(), *expanded)),
                    Slot::Column(name) => {
                        let column = aliases.get(alias_idx).unwrap_or(name);
                        alias_idx += 1;
                        let arg = self.column_arg(column, positional, &mut cursor)?;
                        out.push((arg, false));
                    }
                }
            }
            check_consumed(cursor, positional.len())?;
        }
        Ok(out)
    }

    fn column_arg(&mut self, column: &str, positional: &[&Arg], cursor: &mut usize) -> DbrResult<Arg> {
        if let Some(name) = column.strip_prefix(':') {
            if let Some(arg) = self.named.iter().find(|a| a.name() == Some(name)) {
                return Ok(arg.unnamed().clone());
            }
            if let Some(arg) = self.record_arg(name)? {
                return Ok(arg);
            }
            return Err(DbrError::mismatch(format!(
                "no argument for named placeholder {column:?}"
            )));
        }

        if !column.is_empty() {
            if let Some(arg) = self.record_arg(column)? {
                return Ok(arg);
            }
        }
        match positional.get(*cursor) {
            Some(arg) => {
                *cursor += 1;
                Ok((*arg).clone())
            }
            None => Err(DbrError::mismatch(format!(
                "no record or positional argument for placeholder {}",
                if column.is_empty() { "?" } else { column }
            ))),
        }
    }

    /// Ask the first record whose qualifier matches `column` for its value.
    fn record_arg(&mut self, column: &str) -> DbrResult<Option<Arg>> {
        let (qualifier, name) = split_column(column);
        let default = self.default_qualifier;
        let Some(rec) = self
            .records
            .iter_mut()
            .find(|r| qualifier_matches(&r.qualifier, qualifier, default))
        else {
            return Ok(None);
        };

        let mut cm = ColumnMap::read_set([name]);
        rec.record
            .map_columns(&mut cm)
            .with_context(|| format!("record {:?}", rec.qualifier))?;
        let mut args = cm.take_args();
        match args.len() {
            0 => Err(DbrError::not_found(format!(
                "record {:?} returned no value for column {name:?}",
                rec.qualifier
            ))),
            1 => Ok(args.pop()),
            _ => {
                let mut values = Vec::with_capacity(args.len());
                for arg in &args {
                    arg.flatten_into(&mut values);
                }
                Ok(Some(Arg::List(ValueList::from_values(values))))
            }
        }
    }

    /// Regenerate the row list of an INSERT for the values at hand.
    ///
    /// Positional arguments come first, then the rows of every record in
    /// registration order. Column aliases rename the columns asked from
    /// records.
    fn resolve_insert(
        &mut self,
        template: &Template,
        shape: &InsertShape,
        positional: &[&Arg],
        aliases: &[String],
        record_offsets: &mut Vec<u64>,
    ) -> DbrResult<(String, Vec<Resolved>)> {
        let columns: &[String] = if aliases.is_empty() {
            &shape.columns
        } else if aliases.len() == shape.columns.len() {
            aliases
        } else {
            return Err(DbrError::mismatch(format!(
                "{} column aliases for {} insert columns",
                aliases.len(),
                shape.columns.len()
            )));
        };

        let mut values = Vec::new();
        for arg in positional {
            arg.flatten_into(&mut values);
        }
        let mut starts = Vec::with_capacity(self.records.len());
        for rec in self.records.iter_mut() {
            if !rec.qualifier.is_empty() && rec.qualifier != self.default_qualifier {
                return Err(DbrError::fatal(format!(
                    "INSERT records take no qualifier, got {:?}",
                    rec.qualifier
                )));
            }
            starts.push(values.len());
            let mut cm = ColumnMap::read_rows(columns);
            rec.record.map_columns(&mut cm).with_context(|| "insert record")?;
            for arg in cm.take_args() {
                arg.flatten_into(&mut values);
            }
        }
        if values.is_empty() {
            return Err(DbrError::mismatch("INSERT has no values to bind"));
        }

        let (rows, per_row) = if shape.row_count > 0 {
            if values.len() % shape.row_count != 0 {
                return Err(DbrError::mismatch(format!(
                    "{} values cannot be split into {} rows",
                    values.len(),
                    shape.row_count
                )));
            }
            (shape.row_count, values.len() / shape.row_count)
        } else {
            if columns.is_empty() || values.len() % columns.len() != 0 {
                return Err(DbrError::mismatch(format!(
                    "{} values do not fill rows of {} columns",
                    values.len(),
                    columns.len()
                )));
            }
            (values.len() / columns.len(), columns.len())
        };
        record_offsets.clear();
        record_offsets.extend(starts.iter().map(|start| (start / per_row) as u64));

        let (head, tail) = template
            .sql
            .get(..shape.rows_start)
            .zip(template.sql.get(shape.rows_end..))
            .ok_or_else(|| DbrError::fatal("INSERT row list lies outside the cached SQL"))?;
        let mut sql = String::with_capacity(head.len() + tail.len() + rows * (per_row * 2 + 2));
        sql.push_str(head);
        for r in 0..rows {
            if r > 0 {
                sql.push(',');
            }
            sql.push('(');
            for c in 0..per_row {
                if c > 0 {
                    sql.push(',');
                }
                sql.push('?');
            }
            sql.push(')');
        }
        sql.push_str(tail);

        let prefix = template
            .slots
            .get(..shape.row_slots.start)
            .zip(template.slots.get(shape.row_slots.end..))
            .ok_or_else(|| DbrError::fatal("INSERT row slots lie outside the template"))?;
        let mut placed = self.resolve(prefix.0, 1, &[], &[])?;
        placed.push((Arg::List(ValueList::from_values(values)), true));
        placed.extend(self.resolve(prefix.1, 1, &[], &[])?);
        Ok((sql, placed))
    }
}

fn check_consumed(used: usize, supplied: usize) -> DbrResult<()> {
    if used < supplied {
        return Err(DbrError::mismatch(format!(
            "{supplied} positional arguments supplied but only {used} placeholders take them"
        )));
    }
    Ok(())
}
