//! ColumnMapper derive macro implementation

mod attrs;

use attrs::{FieldAttr, rename_rule};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "ColumnMapper can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "ColumnMapper can only be derived for structs",
            ));
        }
    };

    let rule = rename_rule(&input)?;
    let mut read_all = Vec::new();
    let mut arms = Vec::new();
    let mut columns = Vec::new();
    let mut id_field = None;

    for field in fields {
        let attr = FieldAttr::from_field(field)?;
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if attr.last_insert_id {
            if id_field.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field can be marked #[dbr(last_insert_id)]",
                ));
            }
            id_field = Some(ident);
        }
        if attr.skip {
            continue;
        }

        let column = attr
            .column
            .unwrap_or_else(|| rule.apply(&ident.to_string()));
        if columns.contains(&column) {
            return Err(syn::Error::new_spanned(
                field,
                format!("column {column:?} is mapped twice"),
            ));
        }
        read_all.push(quote! { cm.value(&mut self.#ident)?; });
        arms.push(quote! { #column => cm.value(&mut self.#ident)?, });
        columns.push(column);
    }

    let assign_id = id_field.map(|ident| {
        quote! {
            fn assign_last_insert_id(&mut self, id: u64) {
                if let Ok(id) = ::core::convert::TryFrom::try_from(id) {
                    self.#ident = id;
                }
            }
        }
    });

    let type_name = name.to_string();

    Ok(quote! {
        impl #impl_generics ::sqldbr::ColumnMapper for #name #ty_generics #where_clause {
            fn map_columns(&mut self, cm: &mut ::sqldbr::ColumnMap) -> ::sqldbr::DbrResult<()> {
                if cm.mode() == ::sqldbr::MapMode::ReadAll {
                    #(#read_all)*
                    return Ok(());
                }
                while cm.next() {
                    match cm.column() {
                        #(#arms)*
                        other => {
                            return Err(::sqldbr::DbrError::not_found(format!(
                                "column {:?} is not mapped by {}",
                                other, #type_name
                            )));
                        }
                    }
                }
                Ok(())
            }

            #assign_id
        }
    })
}
