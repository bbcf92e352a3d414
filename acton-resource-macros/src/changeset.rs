use proc_macro2::TokenStream;
use quote::quote;
use syn::{spanned::Spanned, Data, DeriveInput, Field, Fields, LitStr};

use crate::util::{field_ident_name, option_inner};

/// Options parsed from `#[changeset(...)]`
#[derive(Default)]
struct ColumnOptions {
    skip: bool,
    column: Option<String>,
}

fn parse_options(field: &Field) -> syn::Result<ColumnOptions> {
    let mut options = ColumnOptions::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("changeset") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else if meta.path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                options.column = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `column = \"...\"`"))
            }
        })?;
    }
    Ok(options)
}

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "#[derive(Changeset)] requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "#[derive(Changeset)] can only be applied to structs",
            ))
        }
    };

    let mut pushes = Vec::new();
    for field in fields {
        let options = parse_options(field)?;
        if options.skip {
            continue;
        }
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let column = options
            .column
            .unwrap_or_else(|| field_ident_name(field_ident));

        // Option<T> fields are only written when set
        if option_inner(&field.ty).is_some() {
            pushes.push(quote! {
                if let ::std::option::Option::Some(value) = &self.#field_ident {
                    changes.push((
                        #column,
                        ::acton_resource::repository::Value::from(
                            ::std::clone::Clone::clone(value)
                        ),
                    ));
                }
            });
        } else {
            pushes.push(quote! {
                changes.push((
                    #column,
                    ::acton_resource::repository::Value::from(
                        ::std::clone::Clone::clone(&self.#field_ident)
                    ),
                ));
            });
        }
    }

    Ok(quote! {
        impl #impl_generics ::acton_resource::repository::Changeset for #ident #ty_generics #where_clause {
            fn changes(
                &self,
            ) -> ::std::vec::Vec<(&'static str, ::acton_resource::repository::Value)> {
                #[allow(unused_mut)]
                let mut changes = ::std::vec::Vec::new();
                #(#pushes)*
                changes
            }
        }
    })
}
