//! Implementation of the `#[derive(Class)]` macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

use crate::attrs::{FieldAttrs, TypeAttrs};

pub fn derive_class_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_class_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct ExportedField {
    ident: syn::Ident,
    ty: syn::Type,
    name: String,
    range: Option<String>,
    read_only: bool,
}

fn derive_class_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let attrs = TypeAttrs::from_attrs(&input.attrs)?;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "host classes cannot be generic",
        ));
    }

    let name_override = match &attrs.name {
        Some(name) => quote! { ::core::option::Option::Some(#name) },
        None => quote! { ::core::option::Option::None },
    };

    let fields = collect_exported(input)?;

    let property_infos = fields.iter().map(|f| {
        let ty = &f.ty;
        let name = &f.name;
        let mut info = quote! { ::hostbind::registry::PropertyInfo::of::<#ty>(#name) };
        if let Some(range) = &f.range {
            info = quote! { #info.with_hint(::hostbind::registry::PropertyHint::Range, #range) };
        }
        if f.read_only {
            info = quote! {
                #info.with_usage(
                    ::hostbind::registry::PropertyUsage::DEFAULT
                        | ::hostbind::registry::PropertyUsage::READ_ONLY
                )
            };
        }
        info
    });

    let getters = fields.iter().map(|f| {
        let field = &f.ident;
        let name = &f.name;
        quote! {
            #name => ::core::option::Option::Some(::hostbind::ToVariant::to_variant(&self.#field)),
        }
    });

    let setters = fields.iter().filter(|f| !f.read_only).map(|f| {
        let field = &f.ident;
        let ty = &f.ty;
        let name = &f.name;
        quote! {
            #name => ::core::option::Option::Some(
                <#ty as ::hostbind::FromVariant>::from_variant(value).map(|v| self.#field = v)
            ),
        }
    });

    Ok(quote! {
        impl ::hostbind::ClassMeta for #ident {
            fn class_name_override() -> ::core::option::Option<&'static str> {
                #name_override
            }

            fn exported_properties() -> ::std::vec::Vec<::hostbind::registry::PropertyInfo> {
                ::std::vec![#(#property_infos),*]
            }

            fn get_exported(&self, name: &str) -> ::core::option::Option<::hostbind::Variant> {
                match name {
                    #(#getters)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set_exported(
                &mut self,
                name: &str,
                value: &::hostbind::Variant,
            ) -> ::core::option::Option<::core::result::Result<(), ::hostbind::VariantError>> {
                match name {
                    #(#setters)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

/// Collect fields marked `#[hostbind(export)]`.
fn collect_exported(input: &DeriveInput) -> syn::Result<Vec<ExportedField>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "#[derive(Class)] only supports structs",
        ));
    };

    let mut exported = Vec::new();
    if let Fields::Named(fields) = &data.fields {
        for field in &fields.named {
            let attrs = FieldAttrs::from_attrs(&field.attrs)?;
            if !attrs.export {
                continue;
            }
            let Some(ident) = field.ident.clone() else {
                continue;
            };
            let name = attrs.name.unwrap_or_else(|| ident.to_string());
            exported.push(ExportedField {
                ident,
                ty: field.ty.clone(),
                name,
                range: attrs.range,
                read_only: attrs.read_only,
            });
        }
    }
    Ok(exported)
}
