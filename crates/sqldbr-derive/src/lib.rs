//! Derive macros for sqldbr
//!
//! Provides `#[derive(ColumnMapper)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod column_mapper;

/// Derive `ColumnMapper` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use sqldbr::ColumnMapper;
///
/// #[derive(ColumnMapper, Default)]
/// struct Customer {
///     #[dbr(column = "customer_id", last_insert_id)]
///     id: i64,
///     name: String,
///     email: Option<String>,
///     #[dbr(skip)]
///     cached_score: f64,
/// }
/// ```
///
/// # Generated
///
/// - In read-all mode every mapped field is emitted in declaration order.
/// - In read-set and scan mode columns are matched by name; an unknown
///   column is a `NotFound` error.
/// - `assign_last_insert_id` stores the id into the `last_insert_id` field.
///
/// # Attributes
///
/// - `#[dbr(rename_all = "...")]` - Column naming for the struct: `snake_case`
///   (default), `camelCase`, `PascalCase`, `SCREAMING_SNAKE_CASE`, `kebab-case`
/// - `#[dbr(column = "name")]` - Map field to a different column name
/// - `#[dbr(skip)]` - Leave the field out of the mapping
/// - `#[dbr(last_insert_id)]` - Receive the auto-increment id after INSERT
#[proc_macro_derive(ColumnMapper, attributes(dbr))]
pub fn derive_column_mapper(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    column_mapper::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
