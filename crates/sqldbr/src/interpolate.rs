//! Placeholder expansion and interpolation.
//!
//! Both transforms walk a SQL template token by token, skipping quoted
//! strings and backtick identifiers, and pair every `?` with the argument it
//! belongs to. Expansion rewrites a single `?` bound to a list of N values
//! into `?,?,...`; interpolation replaces placeholders with SQL literals.
//!
//! The template itself is never modified. Output is written into a pooled
//! scratch buffer which is swapped in only once the whole rewrite succeeded.

use crate::error::{DbrError, DbrResult};
use crate::pool::{self, PooledBuf};
use crate::value::{Arg, Value, leaf_count};
use bytes::BufMut;
use chrono::{NaiveDateTime, Timelike};

/// A lexical piece of a SQL template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    /// `?`
    Positional,
    /// `:name`, without the colon.
    Named(&'a str),
}

/// Split `sql` into text and placeholder tokens. Named placeholders are only
/// recognised when `named` is set.
pub(crate) fn tokenize(sql: &str, named: bool) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, quote);
                continue;
            }
            b'?' => {
                if start < i {
                    tokens.push(Token::Text(&sql[start..i]));
                }
                tokens.push(Token::Positional);
                i += 1;
                start = i;
                continue;
            }
            b':' if named && is_named_start(bytes, i) => {
                let name_start = i + 1;
                let mut end = name_start;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                    end += 1;
                }
                if start < i {
                    tokens.push(Token::Text(&sql[start..i]));
                }
                tokens.push(Token::Named(&sql[name_start..end]));
                i = end;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if start < bytes.len() {
        tokens.push(Token::Text(&sql[start..]));
    }
    tokens
}

fn is_named_start(bytes: &[u8], i: usize) -> bool {
    let prev_ok = i == 0 || !(bytes[i - 1] == b':' || bytes[i - 1].is_ascii_alphanumeric());
    let next_ok = bytes
        .get(i + 1)
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_');
    prev_ok && next_ok
}

/// Index just past the closing quote of the quoted region starting at `open`.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && quote != b'`' {
            i += 2;
            continue;
        }
        if b == quote {
            // doubled quote escapes itself
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Number of `?` placeholders outside quoted regions.
pub fn placeholder_count(sql: &str) -> usize {
    tokenize(sql, false)
        .iter()
        .filter(|t| matches!(t, Token::Positional))
        .count()
}

/// An argument positioned in a template.
///
/// `expanded` arguments occupy one `?` per leaf value; all others occupy a
/// single `?` regardless of how many leaves they carry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Placed<'a> {
    pub arg: &'a Arg,
    pub expanded: bool,
}

/// Decide how `args` line up with the `?` count of `sql`.
///
/// One `?` per leaf means the template is already expanded; one `?` per
/// argument means lists still need expansion. Anything else is a mismatch.
fn place<'a>(sql: &str, args: &'a [Arg]) -> DbrResult<Vec<Placed<'a>>> {
    let count = placeholder_count(sql);
    let leaves = leaf_count(args);
    let expanded = if count == leaves {
        true
    } else if count == args.len() {
        false
    } else {
        return Err(DbrError::mismatch(format!(
            "{count} placeholders do not match {} arguments with {leaves} values",
            args.len()
        )));
    };
    Ok(args.iter().map(|arg| Placed { arg, expanded }).collect())
}

/// Expand single `?` placeholders bound to lists into one `?` per value.
///
/// `expand_placeholders("id IN (?)", [ints(1, 2, 3)])` gives `id IN (?,?,?)`.
/// A template which already carries one `?` per value is returned unchanged.
pub fn expand_placeholders(sql: &str, args: &[Arg]) -> DbrResult<String> {
    let placed = place(sql, args)?;
    let mut out = pool::get();
    expand_into(&mut out, sql, &placed)?;
    Ok(out.to_string_lossy())
}

/// Replace every placeholder with the SQL literal of its value.
pub fn interpolate(sql: &str, args: &[Arg]) -> DbrResult<String> {
    let placed = place(sql, args)?;
    let mut out = pool::get();
    interpolate_into(&mut out, sql, &placed)?;
    Ok(out.to_string_lossy())
}

pub(crate) fn expand_into(out: &mut PooledBuf, sql: &str, args: &[Placed<'_>]) -> DbrResult<()> {
    rewrite(out, sql, args, |out, leaves| {
        for i in 0..leaves.len() {
            if i > 0 {
                out.put_u8(b',');
            }
            out.put_u8(b'?');
        }
        Ok(())
    })
}

pub(crate) fn interpolate_into(
    out: &mut PooledBuf,
    sql: &str,
    args: &[Placed<'_>],
) -> DbrResult<()> {
    rewrite(out, sql, args, |out, leaves| {
        for (i, value) in leaves.iter().enumerate() {
            if i > 0 {
                out.put_u8(b',');
            }
            write_literal(&mut **out, value)?;
        }
        Ok(())
    })
}

/// Walk `sql`, calling `emit` with the values belonging to each `?`.
fn rewrite<F>(out: &mut PooledBuf, sql: &str, args: &[Placed<'_>], mut emit: F) -> DbrResult<()>
where
    F: FnMut(&mut PooledBuf, &[Value]) -> DbrResult<()>,
{
    let mut scratch = pool::get();
    let mut arg_idx = 0;
    let mut leaf_idx = 0;
    let mut leaves: Vec<Value> = Vec::new();
    let mut current: Vec<Value> = Vec::with_capacity(1);

    for token in tokenize(sql, false) {
        match token {
            Token::Text(text) => scratch.put_slice(text.as_bytes()),
            Token::Named(name) => {
                scratch.put_u8(b':');
                scratch.put_slice(name.as_bytes());
            }
            Token::Positional => {
                skip_empty_expanded(args, &mut arg_idx);
                let Some(placed) = args.get(arg_idx) else {
                    return Err(DbrError::mismatch(format!(
                        "placeholder {} has no argument, {} arguments supplied",
                        arg_idx + 1,
                        args.len()
                    )));
                };
                if leaf_idx == 0 {
                    leaves.clear();
                    placed.arg.flatten_into(&mut leaves);
                }
                current.clear();
                if placed.expanded && placed.arg.is_list() {
                    current.push(leaves[leaf_idx].clone());
                    leaf_idx += 1;
                    if leaf_idx == leaves.len() {
                        arg_idx += 1;
                        leaf_idx = 0;
                    }
                } else {
                    current.append(&mut leaves);
                    arg_idx += 1;
                    leaf_idx = 0;
                }
                emit(&mut scratch, &current)?;
            }
        }
    }
    skip_empty_expanded(args, &mut arg_idx);
    if arg_idx < args.len() {
        return Err(DbrError::mismatch(format!(
            "{} arguments supplied but only {arg_idx} placeholders found",
            args.len()
        )));
    }
    std::mem::swap(out, &mut scratch);
    Ok(())
}

fn skip_empty_expanded(args: &[Placed<'_>], idx: &mut usize) {
    while let Some(p) = args.get(*idx) {
        if p.expanded && p.arg.is_list() && p.arg.leaf_count() == 0 {
            *idx += 1;
        } else {
            break;
        }
    }
}

/// Write the MySQL literal for `value`.
pub fn write_literal<B: BufMut + std::fmt::Write>(out: &mut B, value: &Value) -> DbrResult<()> {
    match value {
        Value::Null => out.put_slice(b"NULL"),
        Value::Bool(true) => out.put_u8(b'1'),
        Value::Bool(false) => out.put_u8(b'0'),
        Value::Int(v) => write_fmt(out, format_args!("{v}"))?,
        Value::Uint(v) => write_fmt(out, format_args!("{v}"))?,
        Value::Float(v) => {
            if !v.is_finite() {
                return Err(DbrError::not_valid(format!(
                    "float {v} has no SQL literal"
                )));
            }
            write_fmt(out, format_args!("{v}"))?
        }
        Value::Str(s) => write_escaped_str(out, s),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => {
                out.put_slice(b"_binary");
                write_escaped_str(out, s);
            }
            Err(_) => {
                out.put_slice(b"X'");
                for byte in b {
                    write_fmt(out, format_args!("{byte:02X}"))?;
                }
                out.put_u8(b'\'');
            }
        },
        Value::Time(t) => write_time(out, t)?,
    }
    Ok(())
}

/// Render `value` as a literal string.
pub fn literal(value: &Value) -> DbrResult<String> {
    let mut out = pool::get();
    write_literal(&mut *out, value)?;
    Ok(out.to_string_lossy())
}

fn write_fmt<B: std::fmt::Write>(out: &mut B, args: std::fmt::Arguments<'_>) -> DbrResult<()> {
    out.write_fmt(args)
        .map_err(|_| DbrError::fatal("formatting into buffer failed"))
}

fn write_escaped_str<B: BufMut>(out: &mut B, s: &str) {
    out.put_u8(b'\'');
    for &b in s.as_bytes() {
        match b {
            0 => out.put_slice(b"\\0"),
            b'\n' => out.put_slice(b"\\n"),
            b'\r' => out.put_slice(b"\\r"),
            b'\\' => out.put_slice(b"\\\\"),
            b'\'' => out.put_slice(b"\\'"),
            b'"' => out.put_slice(b"\\\""),
            0x1a => out.put_slice(b"\\Z"),
            other => out.put_u8(other),
        }
    }
    out.put_u8(b'\'');
}

fn write_time<B: BufMut + std::fmt::Write>(out: &mut B, t: &NaiveDateTime) -> DbrResult<()> {
    out.put_u8(b'\'');
    write_fmt(out, format_args!("{}", t.format("%Y-%m-%d %H:%M:%S")))?;
    let micros = t.nanosecond() / 1_000;
    if micros > 0 {
        write_fmt(out, format_args!(".{micros:06}"))?;
    }
    out.put_u8(b'\'');
    Ok(())
}
