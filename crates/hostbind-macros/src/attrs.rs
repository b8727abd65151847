//! Attribute parsing for `#[hostbind(...)]`.

use syn::{Attribute, LitStr};

/// Parsed `#[hostbind(...)]` attributes on a type.
#[derive(Debug, Default)]
pub struct TypeAttrs {
    /// Override the class name handed to the host (default: Rust struct name)
    pub name: Option<String>,
}

/// Parsed `#[hostbind(...)]` attributes on a field.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    /// Expose the field as a host property
    pub export: bool,
    /// Override the property name
    pub name: Option<String>,
    /// Range hint string, e.g. "0,100,1"
    pub range: Option<String>,
    /// Visible to the host but not writable from it
    pub read_only: bool,
}

impl TypeAttrs {
    /// Parse attributes from a list of `#[hostbind(...)]` attributes.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("hostbind") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else {
                    return Err(meta.error(format!(
                        "unknown hostbind attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}

impl FieldAttrs {
    /// Parse attributes from a list of `#[hostbind(...)]` attributes.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("hostbind") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("export") {
                    result.export = true;
                } else if meta.path.is_ident("read_only") {
                    result.read_only = true;
                } else if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else if meta.path.is_ident("range") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.range = Some(value.value());
                } else {
                    return Err(meta.error(format!(
                        "unknown hostbind field attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        if !result.export && (result.name.is_some() || result.range.is_some() || result.read_only) {
            return Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                "`name`, `range` and `read_only` require `export`",
            ));
        }

        Ok(result)
    }
}
