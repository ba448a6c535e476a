//! Identifier quoting for MySQL.
//!
//! Identifiers are quoted with backticks per dot-separated segment:
//! `catalog_product_entity.sku` becomes `` `catalog_product_entity`.`sku` ``.
//!
//! - Backticks inside the input are stripped, never escaped.
//! - Only the first dot splits: everything after it is the column part.
//! - `*` is never quoted, neither alone nor as column part (`p1.*`).
//!
//! Expressions which must reach the database verbatim (`COUNT(*)`,
//! `DATE_FORMAT(...)`) are represented by [`Ident::expr`] or by columns added
//! while a statement is in unsafe mode.

/// Maximum identifier length accepted by MySQL.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

const QUOTE: char = '`';

/// Returns true if `name` is a valid, possibly qualified, identifier.
///
/// Each dot-separated segment must be non-empty, at most 64 bytes long,
/// consist of ASCII letters, digits, `_` or `$`, and must not start with a
/// digit.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.split('.').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Quote `name`, splitting at the first dot.
pub fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    write_quoted(&mut out, name);
    out
}

/// Quote `name` and append `` AS `alias` `` when `alias` is not empty.
pub fn quote_as(name: &str, alias: &str) -> String {
    let mut out = String::with_capacity(name.len() + alias.len() + 8);
    write_quoted(&mut out, name);
    write_alias(&mut out, alias);
    out
}

/// Alias of [`quote_as`]: `` `name` AS `alias` ``.
pub fn name_alias(name: &str, alias: &str) -> String {
    quote_as(name, alias)
}

pub(crate) fn write_quoted(out: &mut String, name: &str) {
    if name == "*" {
        out.push('*');
        return;
    }
    let stripped;
    let name = if name.contains(QUOTE) {
        stripped = name.replace(QUOTE, "");
        stripped.as_str()
    } else {
        name
    };
    match name.split_once('.') {
        Some((qualifier, column)) => {
            write_segment(out, qualifier);
            out.push('.');
            if column == "*" {
                out.push('*');
            } else {
                write_segment(out, column);
            }
        }
        None => write_segment(out, name),
    }
}

fn write_segment(out: &mut String, segment: &str) {
    out.push(QUOTE);
    out.push_str(segment);
    out.push(QUOTE);
}

pub(crate) fn write_alias(out: &mut String, alias: &str) {
    if alias.is_empty() {
        return;
    }
    out.push_str(" AS ");
    out.push(QUOTE);
    for c in alias.chars().filter(|c| *c != QUOTE) {
        out.push(c);
    }
    out.push(QUOTE);
}

/// Split `identifier` into qualifier and column at the first dot.
///
/// `"dp.id"` gives `("dp", "id")`, `"id"` gives `("", "id")`.
pub fn split_column(identifier: &str) -> (&str, &str) {
    match identifier.split_once('.') {
        Some((qualifier, column)) => (qualifier, column),
        None => ("", identifier),
    }
}

/// Sort direction of an ORDER BY entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sort {
    #[default]
    Unspecified,
    Asc,
    Desc,
}

/// A column, table or expression reference with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub(crate) name: String,
    pub(crate) alias: String,
    pub(crate) expression: bool,
    pub(crate) sort: Sort,
}

impl Ident {
    /// A quoted identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: String::new(),
            expression: false,
            sort: Sort::Unspecified,
        }
    }

    /// A raw SQL expression written verbatim.
    pub fn expr(expression: impl Into<String>) -> Self {
        Self {
            expression: true,
            ..Self::new(expression)
        }
    }

    /// Quoted if `name` is a valid identifier, verbatim otherwise.
    pub fn lenient(name: impl Into<String>) -> Self {
        let name = name.into();
        let expression = !is_valid_identifier(&name);
        Self {
            expression,
            ..Self::new(name)
        }
    }

    /// Parse an ORDER BY entry, honouring a trailing ` ASC` or ` DESC`.
    pub(crate) fn sort_entry(entry: &str, lenient: bool) -> Self {
        let (name, sort) = split_sort_suffix(entry);
        let ident = if lenient {
            Self::lenient(name)
        } else {
            Self::new(name)
        };
        ident.with_sort(sort)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn asc(self) -> Self {
        self.with_sort(Sort::Asc)
    }

    pub fn desc(self) -> Self {
        self.with_sort(Sort::Desc)
    }

    pub(crate) fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias_name(&self) -> &str {
        &self.alias
    }

    /// The name other clauses use to refer to this reference: the alias if set.
    pub fn qualifier(&self) -> &str {
        if self.alias.is_empty() {
            &self.name
        } else {
            &self.alias
        }
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        if self.expression {
            out.push_str(&self.name);
        } else {
            write_quoted(out, &self.name);
        }
        write_alias(out, &self.alias);
        match self.sort {
            Sort::Unspecified => {}
            Sort::Asc => out.push_str(" ASC"),
            Sort::Desc => out.push_str(" DESC"),
        }
    }

    /// Render this reference as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + self.alias.len() + 8);
        self.write_to(&mut out);
        out
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Ident {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

fn split_sort_suffix(entry: &str) -> (&str, Sort) {
    let trimmed = entry.trim_end();
    if let Some((head, tail)) = trimmed.rsplit_once(' ') {
        if tail.eq_ignore_ascii_case("DESC") {
            return (head.trim_end(), Sort::Desc);
        }
        if tail.eq_ignore_ascii_case("ASC") {
            return (head.trim_end(), Sort::Asc);
        }
    }
    (entry, Sort::Unspecified)
}

pub(crate) fn write_list(out: &mut String, idents: &[Ident], sep: &str) {
    for (i, ident) in idents.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        ident.write_to(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("id"));
        assert!(is_valid_identifier("catalog_product_entity.sku"));
        assert!(is_valid_identifier("$col1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1col"));
        assert!(!is_valid_identifier("a b"));
        assert!(!is_valid_identifier("`a`"));
        assert!(!is_valid_identifier("a."));
        assert!(!is_valid_identifier("count(*)"));
        assert!(!is_valid_identifier(&"x".repeat(65)));
    }

    #[test]
    fn test_quote_splits_first_dot() {
        assert_eq!(quote("id"), "`id`");
        assert_eq!(quote("t.value"), "`t`.`value`");
        assert_eq!(quote(" `t.value`"), "` t`.`value`");
        assert_eq!(
            quote("t.{column} AS `col_type`"),
            "`t`.`{column} AS col_type`"
        );
        assert_eq!(quote("id, name, email"), "`id, name, email`");
        assert_eq!(quote("z`z"), "`zz`");
        assert_eq!(quote("p1.*"), "`p1`.*");
        assert_eq!(quote("*"), "*");
        assert_eq!(quote("count(*)"), "`count(*)`");
        assert_eq!(quote("`t1`.period"), "`t1`.`period`");
    }

    #[test]
    fn test_name_alias() {
        assert_eq!(name_alias("e.price", "final_price"), "`e`.`price` AS `final_price`");
        assert_eq!(quote_as("SUM(price)", "total_price"), "`SUM(price)` AS `total_price`");
        assert_eq!(quote_as("a", ""), "`a`");
        assert_eq!(quote_as("`t2`.`total_qty`", "`qty_ordered`"), "`t2`.`total_qty` AS `qty_ordered`");
    }

    #[test]
    fn test_lenient_ident() {
        assert_eq!(Ident::lenient("t3.store_id").to_sql(), "`t3`.`store_id`");
        assert_eq!(Ident::lenient("count(*)").to_sql(), "count(*)");
        assert_eq!(Ident::lenient("n+1").to_sql(), "n+1");
        assert_eq!(Ident::lenient("1").to_sql(), "1");
    }

    #[test]
    fn test_sort_entry() {
        assert_eq!(Ident::sort_entry("id DESC", false).to_sql(), "`id` DESC");
        assert_eq!(Ident::sort_entry("name asc", false).to_sql(), "`name` ASC");
        assert_eq!(Ident::sort_entry("name", false).to_sql(), "`name`");
        assert_eq!(
            Ident::sort_entry("DATE_FORMAT(t3.period, '%Y-%m-01')", true).to_sql(),
            "DATE_FORMAT(t3.period, '%Y-%m-01')"
        );
    }

    #[test]
    fn test_split_column() {
        assert_eq!(split_column("dp.id"), ("dp", "id"));
        assert_eq!(split_column("id"), ("", "id"));
        assert_eq!(split_column(":name"), ("", ":name"));
    }
}
