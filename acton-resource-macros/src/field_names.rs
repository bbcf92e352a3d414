use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, LitStr};

use crate::util::{field_ident_name, option_inner};

/// Options parsed from `#[field_names(...)]`
#[derive(Default)]
struct FieldOptions {
    nested: bool,
    skip: bool,
    rename: Option<String>,
}

fn parse_options(field: &Field) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("field_names") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("nested") {
                options.nested = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                options.rename = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `nested`, `skip` or `rename = \"...\"`"))
            }
        })?;
    }
    Ok(options)
}

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut pushes = Vec::new();

    // Only structs with named fields contribute names
    if let Data::Struct(data) = &input.data {
        if let Fields::Named(fields) = &data.fields {
            for field in &fields.named {
                let options = parse_options(field)?;
                if options.skip {
                    continue;
                }

                if options.nested {
                    let ty = option_inner(&field.ty).unwrap_or(&field.ty);
                    pushes.push(quote! {
                        names.extend(
                            <#ty as ::acton_resource::introspect::FieldNames>::field_names()
                        );
                    });
                    continue;
                }

                let name = match options.rename {
                    Some(name) => name,
                    None => match &field.ident {
                        Some(field_ident) => field_ident_name(field_ident).to_case(Case::Camel),
                        None => continue,
                    },
                };
                pushes.push(quote! {
                    names.push(::std::string::String::from(#name));
                });
            }
        }
    }

    Ok(quote! {
        impl #impl_generics ::acton_resource::introspect::FieldNames for #ident #ty_generics #where_clause {
            fn field_names() -> ::std::vec::Vec<::std::string::String> {
                #[allow(unused_mut)]
                let mut names = ::std::vec::Vec::new();
                #(#pushes)*
                names
            }
        }
    })
}
