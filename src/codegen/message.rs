//! Message translation
//!
//! A message becomes a struct deriving `prost::Message`, an `impl
//! prost::Name` carrying its protobuf full name, and (when it has nested
//! types or oneofs) a snake_case module holding them. Nested descriptors are
//! translated depth-first before the enclosing struct is assembled.

use super::field::generate_field;
use super::oneof::{extract_oneofs, generate_oneof_enum, generate_oneof_field, is_oneof_field};
use super::{
    deprecated_attr, translate_enum, Cardinality, Declaration, DeclarationKind, FieldMeta,
    FileContext, MessageLayout, Site,
};
use crate::comments::{child_path, MESSAGE_ENUM, MESSAGE_NESTED};
use crate::names::{self, Scope};
use crate::resolver::is_map_entry;
use crate::GeneratorError;
use prost_types::DescriptorProto;
use quote::quote;
use std::collections::HashSet;

/// Translate a message and everything nested in it.
///
/// Map entry messages yield no declarations; the fields referencing them
/// become `HashMap` fields instead.
pub fn translate_message(
    ctx: &FileContext<'_>,
    site: &Site,
    message: &DescriptorProto,
) -> Result<Vec<Declaration>, GeneratorError> {
    if is_map_entry(message) {
        return Ok(Vec::new());
    }

    let names = ctx
        .symbols
        .message_names(&site.fqn)
        .ok_or_else(|| GeneratorError::UnresolvedType {
            file: ctx.name().to_string(),
            type_name: site.fqn.clone(),
        })?;

    let mut module_location = site.location.clone();
    module_location.push(names.module.clone());

    let mut nested = Vec::new();
    for (i, enum_desc) in message.enum_type.iter().enumerate() {
        let child = site.child(
            enum_desc.name(),
            module_location.clone(),
            child_path(&site.source_path, MESSAGE_ENUM, i),
        );
        nested.push(translate_enum(ctx, &child, enum_desc)?);
    }
    for (i, nested_message) in message.nested_type.iter().enumerate() {
        let child = site.child(
            nested_message.name(),
            module_location.clone(),
            child_path(&site.source_path, MESSAGE_NESTED, i),
        );
        nested.extend(translate_message(ctx, &child, nested_message)?);
    }

    let oneofs = extract_oneofs(message, &names.oneofs)?;
    for oneof in &oneofs {
        nested.push(generate_oneof_enum(ctx, site, &module_location, oneof)?);
    }

    let mut scope = Scope::default();
    let mut fields = Vec::with_capacity(message.field.len());
    let mut layout = Vec::with_capacity(message.field.len());
    let mut emitted_oneofs = HashSet::new();

    for (i, field) in message.field.iter().enumerate() {
        if is_oneof_field(field, message) {
            let Some(oneof) = oneofs
                .iter()
                .find(|o| Some(o.index as i32) == field.oneof_index)
            else {
                return Err(GeneratorError::MalformedDescriptor(format!(
                    "field `{}.{}` belongs to an unknown oneof",
                    message.name(),
                    field.name()
                )));
            };
            if emitted_oneofs.insert(oneof.index) {
                fields.push(generate_oneof_field(ctx, site, &names.module, oneof, &mut scope)?);
            }
            layout.push(FieldMeta {
                name: field.name().to_string(),
                number: field.number(),
                kind: field.r#type(),
                cardinality: Cardinality::Oneof(oneof.name.to_string()),
            });
            continue;
        }

        let plan = generate_field(ctx, site, message, i, &mut scope)?;
        fields.push(plan.tokens);
        layout.push(plan.meta);
    }

    let ident = names::ident(&names.ident);
    let derive = ctx.runtime_path(&site.location, "Message")?;
    let docs = ctx.comments.doc_attrs(&site.source_path);
    let deprecated = deprecated_attr(message.options.as_ref().and_then(|o| o.deprecated));

    let full_name = site.fqn.trim_start_matches('.').to_string();
    let package = ctx.package();
    let proto_name = full_name
        .strip_prefix(&format!("{}.", package))
        .unwrap_or(&full_name)
        .to_string();
    let type_url = format!("type.googleapis.com/{}", full_name);
    let name_trait = ctx.runtime_path(&site.location, "Name")?;

    let mut declarations = vec![
        Declaration {
            name: names.ident.clone(),
            kind: DeclarationKind::Message(MessageLayout {
                full_name: full_name.clone(),
                fields: layout,
            }),
            tokens: quote! {
                #docs
                #deprecated
                #[derive(Clone, PartialEq, #derive)]
                pub struct #ident {
                    #(#fields,)*
                }
            },
        },
        Declaration {
            name: names.ident.clone(),
            kind: DeclarationKind::Support,
            tokens: quote! {
                impl #name_trait for #ident {
                    const NAME: &'static str = #proto_name;
                    const PACKAGE: &'static str = #package;
                    fn full_name() -> String {
                        #full_name.into()
                    }
                    fn type_url() -> String {
                        #type_url.into()
                    }
                }
            },
        },
    ];

    if !nested.is_empty() {
        let module = names::ident(&names.module);
        let doc = format!(" Nested message and enum types in `{}`.", message.name());
        let items = nested.iter().map(|d| &d.tokens);
        declarations.push(Declaration {
            name: names.module.clone(),
            kind: DeclarationKind::Module,
            tokens: quote! {
                #[doc = #doc]
                pub mod #module {
                    #(#items)*
                }
            },
        });
    }

    Ok(declarations)
}
