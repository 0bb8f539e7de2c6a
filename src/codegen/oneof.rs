//! Oneof code generation
//!
//! A protobuf oneof becomes a Rust enum deriving `prost::Oneof` with exactly
//! one variant per member field, held by the message in a single
//! `Option<Enum>` field. proto3 `optional` fields are wrapped by protoc in
//! synthetic single-member oneofs; those are not real oneofs and are emitted
//! as plain `Option<T>` fields instead.

use super::field::value_type;
use super::{parse_path, Declaration, DeclarationKind, FileContext, Site};
use crate::comments::{child_path, MESSAGE_FIELD, MESSAGE_ONEOF};
use crate::names::{self, camel_ident, snake_ident, Scope};
use crate::GeneratorError;
use proc_macro2::TokenStream;
use prost_types::field_descriptor_proto::Label;
use prost_types::{DescriptorProto, FieldDescriptorProto};
use quote::quote;

/// Information about a oneof and its members
#[derive(Debug)]
pub struct OneofInfo<'a> {
    /// Index in `oneof_decl`
    pub index: usize,
    /// Protobuf name of the oneof
    pub name: &'a str,
    /// Identifier of the generated enum
    pub ident: String,
    /// Member fields with their index in the message's field list
    pub fields: Vec<(usize, &'a FieldDescriptorProto)>,
}

/// Whether the oneof at `index` only exists to track proto3 `optional` presence
pub fn is_synthetic_oneof(message: &DescriptorProto, index: usize) -> bool {
    let mut members = message
        .field
        .iter()
        .filter(|f| f.oneof_index == Some(index as i32))
        .peekable();
    members.peek().is_some() && members.all(|f| f.proto3_optional())
}

/// Check if a field belongs to a real (non-synthetic) oneof
pub fn is_oneof_field(field: &FieldDescriptorProto, message: &DescriptorProto) -> bool {
    match field.oneof_index {
        Some(idx) if idx >= 0 && (idx as usize) < message.oneof_decl.len() => {
            !field.proto3_optional() && !is_synthetic_oneof(message, idx as usize)
        }
        _ => false,
    }
}

/// Extract the real oneofs of a message.
///
/// `idents` are the enum identifiers assigned by the symbol table, indexed
/// like `oneof_decl` (`None` for synthetic oneofs). Out-of-range oneof
/// indices, empty oneofs and repeated members are malformed.
pub fn extract_oneofs<'a>(
    message: &'a DescriptorProto,
    idents: &[Option<String>],
) -> Result<Vec<OneofInfo<'a>>, GeneratorError> {
    for field in &message.field {
        if let Some(idx) = field.oneof_index {
            if idx < 0 || idx as usize >= message.oneof_decl.len() {
                return Err(GeneratorError::MalformedDescriptor(format!(
                    "field `{}.{}` references oneof index {} but the message declares {}",
                    message.name(),
                    field.name(),
                    idx,
                    message.oneof_decl.len()
                )));
            }
        }
    }

    let mut oneofs = Vec::new();
    for (idx, oneof_desc) in message.oneof_decl.iter().enumerate() {
        let Some(ident) = idents.get(idx).cloned().flatten() else {
            continue;
        };

        let fields: Vec<(usize, &FieldDescriptorProto)> = message
            .field
            .iter()
            .enumerate()
            .filter(|(_, f)| f.oneof_index == Some(idx as i32))
            .collect();

        if fields.is_empty() {
            return Err(GeneratorError::MalformedDescriptor(format!(
                "oneof `{}.{}` has no fields",
                message.name(),
                oneof_desc.name()
            )));
        }
        if let Some((_, f)) = fields.iter().find(|(_, f)| f.label() == Label::Repeated) {
            return Err(GeneratorError::MalformedDescriptor(format!(
                "oneof member `{}.{}` cannot be repeated",
                message.name(),
                f.name()
            )));
        }

        oneofs.push(OneofInfo {
            index: idx,
            name: oneof_desc.name(),
            ident,
            fields,
        });
    }

    Ok(oneofs)
}

/// Generate the oneof enum, emitted in the message's module (`module_location`)
pub fn generate_oneof_enum(
    ctx: &FileContext<'_>,
    site: &Site,
    module_location: &[String],
    oneof: &OneofInfo<'_>,
) -> Result<Declaration, GeneratorError> {
    let mut scope = Scope::default();
    let mut variants = Vec::with_capacity(oneof.fields.len());

    for (field_index, field) in &oneof.fields {
        let variant = names::ident(&scope.claim(camel_ident(field.name())));
        let value = value_type(ctx, module_location, &site.fqn, field)?;
        let tag = field.number().to_string();
        let docs = ctx
            .comments
            .doc_attrs(&child_path(&site.source_path, MESSAGE_FIELD, *field_index));

        let kind = value.attr;
        let boxed = if value.boxed { quote!(boxed,) } else { quote!() };
        let rust = value.rust;
        let ty = if value.boxed {
            quote!(Box<#rust>)
        } else {
            rust
        };

        variants.push(quote! {
            #docs
            #[prost(#kind, #boxed tag = #tag)]
            #variant(#ty)
        });
    }

    let ident = names::ident(&oneof.ident);
    let derive = ctx.runtime_path(module_location, "Oneof")?;
    let docs = ctx
        .comments
        .doc_attrs(&child_path(&site.source_path, MESSAGE_ONEOF, oneof.index));

    Ok(Declaration {
        name: oneof.ident.clone(),
        kind: DeclarationKind::Oneof,
        tokens: quote! {
            #docs
            #[derive(Clone, PartialEq, #derive)]
            pub enum #ident {
                #(#variants,)*
            }
        },
    })
}

/// Generate the message field holding the oneof
pub fn generate_oneof_field(
    ctx: &FileContext<'_>,
    site: &Site,
    module: &str,
    oneof: &OneofInfo<'_>,
    scope: &mut Scope,
) -> Result<TokenStream, GeneratorError> {
    let field_ident = names::ident(&scope.claim(snake_ident(oneof.name)));
    let enum_path = format!("{}::{}", module, oneof.ident);
    let path = parse_path(&enum_path)?;
    let tags = oneof
        .fields
        .iter()
        .map(|(_, f)| f.number().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let docs = ctx
        .comments
        .doc_attrs(&child_path(&site.source_path, MESSAGE_ONEOF, oneof.index));

    Ok(quote! {
        #docs
        #[prost(oneof = #enum_path, tags = #tags)]
        pub #field_ident: ::core::option::Option<#path>
    })
}
