use crate::client::StatementTag;
use std::fmt;
use std::time::Duration;

/// The kind of SQL statement being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// SELECT, including UNIONs and `WITH ... SELECT`
    Select,
    /// INSERT or REPLACE
    Insert,
    Update,
    Delete,
    /// Anything else (DDL, SHOW, ...)
    Other,
}

impl QueryType {
    /// Detect the statement kind from SQL text.
    ///
    /// Statements run through a [`Dbr`](crate::Dbr) carry their kind in the
    /// [`StatementTag`]; this is the fallback for raw SQL and for SQL a hook
    /// rewrote. Leading comments and parentheses are skipped, and after
    /// `WITH` the first statement keyword outside the CTE bodies decides.
    pub fn from_sql(sql: &str) -> Self {
        let mut words = Words::new(sql);
        let Some((depth, first)) = words.next() else {
            return QueryType::Other;
        };
        if first.eq_ignore_ascii_case("WITH") {
            return words
                .filter(|(d, _)| *d == depth)
                .find_map(|(_, word)| Self::from_keyword(word))
                .unwrap_or(QueryType::Select);
        }
        Self::from_keyword(first).unwrap_or(QueryType::Other)
    }

    fn from_keyword(word: &str) -> Option<Self> {
        const KEYWORDS: [(&str, QueryType); 5] = [
            ("SELECT", QueryType::Select),
            ("INSERT", QueryType::Insert),
            ("REPLACE", QueryType::Insert),
            ("UPDATE", QueryType::Update),
            ("DELETE", QueryType::Delete),
        ];
        KEYWORDS
            .iter()
            .find(|(keyword, _)| word.eq_ignore_ascii_case(keyword))
            .map(|(_, kind)| *kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Select => "select",
            QueryType::Insert => "insert",
            QueryType::Update => "update",
            QueryType::Delete => "delete",
            QueryType::Other => "other",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bare words of a SQL string with their parenthesis depth. Quoted strings,
/// quoted identifiers and comments produce nothing.
struct Words<'a> {
    sql: &'a str,
    pos: usize,
    depth: u32,
}

impl<'a> Words<'a> {
    fn new(sql: &'a str) -> Self {
        Self { sql, pos: 0, depth: 0 }
    }

    /// Index just past the next `end` at or after `from`, or the end of input.
    fn skip_past(&self, from: usize, end: &str) -> usize {
        self.sql
            .get(from..)
            .and_then(|rest| rest.find(end))
            .map_or(self.sql.len(), |at| from + at + end.len())
    }

    /// Index just past the quoted region opening at `self.pos`.
    fn skip_quoted(&self, quote: u8) -> usize {
        let bytes = self.sql.as_bytes();
        let mut i = self.pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if quote != b'`' => i += 2,
                b if b == quote && bytes.get(i + 1) == Some(&quote) => i += 2,
                b if b == quote => return i + 1,
                _ => i += 1,
            }
        }
        bytes.len()
    }
}

impl<'a> Iterator for Words<'a> {
    type Item = (u32, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.sql.as_bytes();
        while let Some(&b) = bytes.get(self.pos) {
            let next = bytes.get(self.pos + 1).copied();
            match b {
                b'(' => {
                    self.depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.pos += 1;
                }
                b'\'' | b'"' | b'`' => self.pos = self.skip_quoted(b),
                b'#' => self.pos = self.skip_past(self.pos, "\n"),
                b'-' if next == Some(b'-') => self.pos = self.skip_past(self.pos, "\n"),
                b'/' if next == Some(b'*') => self.pos = self.skip_past(self.pos + 2, "*/"),
                b if b.is_ascii_alphabetic() || b == b'_' => {
                    let start = self.pos;
                    while bytes
                        .get(self.pos)
                        .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
                    {
                        self.pos += 1;
                    }
                    return Some((self.depth, &self.sql[start..self.pos]));
                }
                b if b.is_ascii_digit() => {
                    // numbers like `1e5` are not words
                    while bytes.get(self.pos).is_some_and(u8::is_ascii_alphanumeric) {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        None
    }
}

/// How the arguments of a statement reached the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Sent separately, one per `?`.
    #[default]
    Placeholders,
    /// Written into the SQL text as literals.
    Interpolated,
}

/// How a query's row stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Read to the end, or stopped by an error or timeout.
    Finished,
    /// Dropped by the caller before the last row.
    Dropped,
}

/// What monitors and hooks know about a statement.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// SQL as bound by the DBR; hooks may override it for reporting.
    pub canonical_sql: String,
    /// SQL actually sent to the executor.
    pub exec_sql: String,
    /// Number of flattened argument values.
    pub param_count: usize,
    pub query_type: QueryType,
    /// Id of the issuing [`Dbr`](crate::Dbr), if it was given one.
    pub statement_id: Option<String>,
    /// Cache key of the template the SQL came from. `None` for raw calls.
    pub cache_key: Option<String>,
    pub binding: Binding,
    /// Set on query contexts once the row stream is over.
    pub stream_end: Option<StreamEnd>,
}

impl QueryContext {
    /// Context for raw SQL passed straight to the executor.
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            canonical_sql: sql.to_string(),
            exec_sql: sql.to_string(),
            param_count,
            query_type: QueryType::from_sql(sql),
            statement_id: None,
            cache_key: None,
            binding: Binding::Placeholders,
            stream_end: None,
        }
    }

    /// Context for a statement issued by a [`Dbr`](crate::Dbr).
    pub fn tagged(sql: &str, param_count: usize, tag: StatementTag<'_>) -> Self {
        Self {
            query_type: tag.kind,
            statement_id: (!tag.id.is_empty()).then(|| tag.id.to_string()),
            cache_key: Some(tag.cache_key.to_string()),
            binding: if tag.interpolated {
                Binding::Interpolated
            } else {
                Binding::Placeholders
            },
            ..Self::new(sql, param_count)
        }
    }

    pub fn is_interpolated(&self) -> bool {
        self.binding == Binding::Interpolated
    }
}

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of a statement.
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// Rows read from a query stream.
    Rows(usize),
    /// Rows affected by an exec.
    Affected(u64),
    /// The statement failed (message cut at 512 bytes).
    Error(String),
}

impl QueryResult {
    pub fn error(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.len() > MAX_ERROR_LEN {
            return Self::Error(format!("{}...", super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)));
        }
        Self::Error(msg)
    }

    /// Rows read or affected; zero for errors.
    pub fn row_count(&self) -> u64 {
        match self {
            QueryResult::Rows(n) => *n as u64,
            QueryResult::Affected(n) => *n,
            QueryResult::Error(_) => 0,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Receives timing and outcome of every statement run through an
/// [`InstrumentedExecutor`](super::InstrumentedExecutor).
pub trait QueryMonitor: Send + Sync {
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// Called once the statement finished. For queries this is when the row
    /// stream ended or was dropped.
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}

/// What to do with a statement after a hook saw it.
#[derive(Debug, Clone)]
pub enum HookAction {
    Continue,
    /// Send `exec_sql` instead; `canonical_sql` optionally replaces the SQL
    /// monitors report.
    ModifySql {
        exec_sql: String,
        canonical_sql: Option<String>,
    },
    /// Refuse to run the statement.
    Abort(String),
}

/// Inspects, rewrites or vetoes statements before they run.
pub trait QueryHook: Send + Sync {
    fn before_query(&self, _ctx: &QueryContext) -> HookAction {
        HookAction::Continue
    }

    /// Called after a statement completed, before monitors are notified.
    fn after_query(&self, _ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {}
}
