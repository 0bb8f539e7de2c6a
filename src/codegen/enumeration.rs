//! Enum translation

use super::{deprecated_attr, Declaration, DeclarationKind, FileContext, Site};
use crate::comments::{child_path, ENUM_VALUE};
use crate::names::{self, camel_ident, Scope};
use crate::GeneratorError;
use heck::ToShoutySnakeCase;
use proc_macro2::{Literal, TokenStream};
use prost_types::EnumDescriptorProto;
use quote::quote;
use std::collections::HashMap;

/// Translate an enum into a `#[repr(i32)]` Rust enum.
///
/// Constants keep their declaration order. A constant whose value was already
/// used becomes an associated constant aliasing the first variant with that
/// value, since Rust enums cannot repeat discriminants.
pub fn translate_enum(
    ctx: &FileContext<'_>,
    site: &Site,
    descriptor: &EnumDescriptorProto,
) -> Result<Declaration, GeneratorError> {
    let entry = ctx.lookup(&site.fqn)?;
    let name = entry.path.last().cloned().unwrap_or_else(|| camel_ident(descriptor.name()));

    if descriptor.value.is_empty() {
        return Err(GeneratorError::MalformedDescriptor(format!(
            "enum `{}` has no values",
            site.fqn.trim_start_matches('.')
        )));
    }

    let idents = value_idents(descriptor);
    let mut variants = Vec::new();
    let mut aliases = Vec::new();
    let mut to_str = Vec::new();
    let mut from_str = Vec::new();

    for (i, (value, assigned)) in descriptor.value.iter().zip(&idents).enumerate() {
        let docs = ctx
            .comments
            .doc_attrs(&child_path(&site.source_path, ENUM_VALUE, i));
        let deprecated = deprecated_attr(value.options.as_ref().and_then(|o| o.deprecated));
        let proto_name = value.name();

        if let Some(first) = assigned.alias_of {
            let alias = names::ident(&assigned.ident);
            let first = names::ident(&idents[first].ident);
            aliases.push(quote! {
                #docs
                #deprecated
                pub const #alias: Self = Self::#first;
            });
            from_str.push(quote!(#proto_name => Some(Self::#first)));
            continue;
        }

        let variant = names::ident(&assigned.ident);
        let discriminant = discriminant(value.number());
        variants.push(quote! {
            #docs
            #deprecated
            #variant = #discriminant
        });
        to_str.push(quote!(Self::#variant => #proto_name));
        from_str.push(quote!(#proto_name => Some(Self::#variant)));
    }

    let ident = names::ident(&name);
    let derive = ctx.runtime_path(&site.location, "Enumeration")?;
    let docs = ctx.comments.doc_attrs(&site.source_path);
    let deprecated = deprecated_attr(descriptor.options.as_ref().and_then(|o| o.deprecated));

    let tokens = quote! {
        #docs
        #deprecated
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, #derive)]
        #[repr(i32)]
        pub enum #ident {
            #(#variants,)*
        }

        impl #ident {
            #(#aliases)*

            /// String value of the enum field names used in the ProtoBuf definition.
            pub fn as_str_name(&self) -> &'static str {
                match self {
                    #(#to_str,)*
                }
            }

            /// Creates an enum from field names used in the ProtoBuf definition.
            pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
                match value {
                    #(#from_str,)*
                    _ => None,
                }
            }
        }
    };

    Ok(Declaration {
        name,
        kind: DeclarationKind::Enum,
        tokens,
    })
}

/// Identifier assigned to one enum constant
struct ValueIdent {
    ident: String,
    /// Index of the first constant with the same number, for aliases
    alias_of: Option<usize>,
}

/// Identifiers of every constant in declaration order. Variants and alias
/// constants share one scope.
fn value_idents(descriptor: &EnumDescriptorProto) -> Vec<ValueIdent> {
    let mut scope = Scope::default();
    let mut first_by_number: HashMap<i32, usize> = HashMap::new();

    descriptor
        .value
        .iter()
        .enumerate()
        .map(|(i, value)| match first_by_number.get(&value.number()) {
            Some(&first) => ValueIdent {
                ident: scope.claim(names::escape(&value.name().to_shouty_snake_case())),
                alias_of: Some(first),
            },
            None => {
                first_by_number.insert(value.number(), i);
                ValueIdent {
                    ident: scope.claim(camel_ident(value.name())),
                    alias_of: None,
                }
            }
        })
        .collect()
}

/// Variant identifier the constant `name` evaluates to. Aliases resolve to
/// the first variant with their number.
pub fn variant_ident(descriptor: &EnumDescriptorProto, name: &str) -> Option<String> {
    let index = descriptor.value.iter().position(|v| v.name() == name)?;
    let idents = value_idents(descriptor);
    let target = idents[index].alias_of.unwrap_or(index);
    Some(idents[target].ident.clone())
}

/// Discriminant tokens; negative values are a negated literal
fn discriminant(number: i32) -> TokenStream {
    let magnitude = Literal::u32_unsuffixed(number.unsigned_abs());
    if number < 0 {
        quote!(-#magnitude)
    } else {
        quote!(#magnitude)
    }
}
