//! Parsing of `#[dbr(...)]` attributes.

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use syn::{DeriveInput, Result};

/// How field names become column names.
#[derive(Debug, Clone, Copy, Default)]
pub(super) enum RenameRule {
    #[default]
    Snake,
    LowerCamel,
    UpperCamel,
    ShoutySnake,
    Kebab,
}

impl RenameRule {
    fn parse(lit: &syn::LitStr) -> Result<Self> {
        match lit.value().as_str() {
            "snake_case" => Ok(Self::Snake),
            "camelCase" => Ok(Self::LowerCamel),
            "PascalCase" => Ok(Self::UpperCamel),
            "SCREAMING_SNAKE_CASE" => Ok(Self::ShoutySnake),
            "kebab-case" => Ok(Self::Kebab),
            other => Err(syn::Error::new_spanned(
                lit,
                format!("unsupported rename_all rule {other:?}"),
            )),
        }
    }

    pub(super) fn apply(self, field: &str) -> String {
        let field = field.strip_prefix("r#").unwrap_or(field);
        match self {
            Self::Snake => field.to_snake_case(),
            Self::LowerCamel => field.to_lower_camel_case(),
            Self::UpperCamel => field.to_upper_camel_case(),
            Self::ShoutySnake => field.to_shouty_snake_case(),
            Self::Kebab => field.to_kebab_case(),
        }
    }
}

/// Struct-level `#[dbr(rename_all = "...")]`.
pub(super) fn rename_rule(input: &DeriveInput) -> Result<RenameRule> {
    let mut rule = RenameRule::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("dbr") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                rule = RenameRule::parse(&meta.value()?.parse()?)?;
                Ok(())
            } else {
                Err(meta.error("expected `rename_all`"))
            }
        })?;
    }
    Ok(rule)
}

/// Field-level `#[dbr(...)]` options.
#[derive(Default)]
pub(super) struct FieldAttr {
    pub column: Option<String>,
    pub skip: bool,
    pub last_insert_id: bool,
}

impl FieldAttr {
    pub(super) fn from_field(field: &syn::Field) -> Result<Self> {
        let mut out = FieldAttr::default();
        for attr in &field.attrs {
            if !attr.path().is_ident("dbr") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("column") {
                    let lit: syn::LitStr = meta.value()?.parse()?;
                    out.column = Some(lit.value());
                } else if meta.path.is_ident("skip") {
                    out.skip = true;
                } else if meta.path.is_ident("last_insert_id") {
                    out.last_insert_id = true;
                } else {
                    return Err(meta.error("expected `column`, `skip` or `last_insert_id`"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}
