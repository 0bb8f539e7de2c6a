//! Field generation for message structs
//!
//! This module generates the `#[prost(...)]` attribute and Rust type of each
//! struct field. The attribute is the serialization metadata of the field:
//! wire kind, number, presence and repeated/packed/map-ness.

use super::enumeration::variant_ident;
use super::{parse_type, Cardinality, FieldMeta, FileContext, Site};
use crate::comments::{child_path, MESSAGE_FIELD};
use crate::names::{self, snake_ident, Scope};
use crate::resolver::{is_map_entry, TypeKind};
use crate::types::ScalarKind;
use crate::GeneratorError;
use proc_macro2::{Literal, TokenStream};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto};
use quote::quote;

/// A generated struct field
pub struct FieldPlan {
    /// Serialization metadata
    pub meta: FieldMeta,
    /// `#[prost(...)] pub name: Type`
    pub tokens: TokenStream,
}

/// Attribute kind and Rust type of a single field value
pub struct ValueType {
    /// Kind tokens (`int32`, `message`, `enumeration = "Path"`)
    pub attr: TokenStream,
    /// Rust type of one value (unboxed)
    pub rust: TokenStream,
    /// Numeric kinds that may be packed
    pub packable: bool,
    /// Message value that must be boxed to break a cycle
    pub boxed: bool,
    /// Message or group value
    pub message: bool,
}

/// Resolve the value type of `field` as seen from `location`.
///
/// `container` is the fully-qualified name of the enclosing message and is
/// used to decide whether a message value must be boxed.
pub fn value_type(
    ctx: &FileContext<'_>,
    location: &[String],
    container: &str,
    field: &FieldDescriptorProto,
) -> Result<ValueType, GeneratorError> {
    match field.r#type() {
        Type::Enum => {
            let entry = ctx.lookup(field.type_name())?;
            if !matches!(entry.kind, TypeKind::Enum(_)) {
                return Err(malformed_reference(field, "an enum"));
            }
            let path = ctx.type_path(field.type_name(), location)?;
            Ok(ValueType {
                attr: quote!(enumeration = #path),
                rust: quote!(i32),
                packable: true,
                boxed: false,
                message: false,
            })
        }
        ty @ (Type::Message | Type::Group) => {
            let entry = ctx.lookup(field.type_name())?;
            if !matches!(entry.kind, TypeKind::Message { .. }) || entry.is_map_entry() {
                return Err(malformed_reference(field, "a message"));
            }
            let path = ctx.type_path(field.type_name(), location)?;
            let rust = parse_type(&path)?;
            let attr = if ty == Type::Group {
                quote!(group)
            } else {
                quote!(message)
            };
            Ok(ValueType {
                attr,
                rust: quote!(#rust),
                packable: false,
                boxed: ctx.symbols.is_recursive(field.type_name(), container),
                message: true,
            })
        }
        other => {
            let scalar = ScalarKind::from_type(other).ok_or_else(|| {
                GeneratorError::MalformedDescriptor(format!(
                    "field `{}` has unsupported type {:?}",
                    field.name(),
                    other
                ))
            })?;
            Ok(ValueType {
                attr: scalar.attribute(),
                rust: scalar.rust_type(),
                packable: scalar.is_packable(),
                boxed: false,
                message: false,
            })
        }
    }
}

fn malformed_reference(field: &FieldDescriptorProto, expected: &str) -> GeneratorError {
    GeneratorError::MalformedDescriptor(format!(
        "field `{}` references `{}`, which is not {}",
        field.name(),
        field.type_name(),
        expected
    ))
}

/// Generate a regular (non-oneof) struct field
pub fn generate_field(
    ctx: &FileContext<'_>,
    site: &Site,
    message: &DescriptorProto,
    index: usize,
    scope: &mut Scope,
) -> Result<FieldPlan, GeneratorError> {
    let field = &message.field[index];
    if field.number() <= 0 {
        return Err(GeneratorError::MalformedDescriptor(format!(
            "field `{}.{}` has invalid number {}",
            message.name(),
            field.name(),
            field.number()
        )));
    }

    let ident = names::ident(&scope.claim(snake_ident(field.name())));
    let tag = field.number().to_string();
    let docs = ctx
        .comments
        .doc_attrs(&child_path(&site.source_path, MESSAGE_FIELD, index));
    let deprecated = super::deprecated_attr(field.options.as_ref().and_then(|o| o.deprecated));

    if field.label() == Label::Repeated && field.r#type() == Type::Message {
        let entry = ctx.lookup(field.type_name())?;
        if let TypeKind::Message { descriptor, .. } = entry.kind {
            if is_map_entry(descriptor) {
                let (attr, rust, cardinality) = map_field(ctx, &site.location, field, descriptor)?;
                return Ok(FieldPlan {
                    meta: FieldMeta {
                        name: field.name().to_string(),
                        number: field.number(),
                        kind: Type::Message,
                        cardinality,
                    },
                    tokens: quote! {
                        #docs
                        #deprecated
                        #[prost(map = #attr, tag = #tag)]
                        pub #ident: #rust
                    },
                });
            }
        }
    }

    let value = value_type(ctx, &site.location, &site.fqn, field)?;
    let packed_option = field.options.as_ref().and_then(|o| o.packed);
    let mut parts = vec![value.attr.clone()];
    let rust = &value.rust;

    let (ty, cardinality) = match field.label() {
        Label::Repeated => {
            let packed = value.packable && packed_option.unwrap_or(ctx.is_proto3());
            parts.push(quote!(repeated));
            if value.packable && !packed {
                parts.push(quote!(packed = "false"));
            }
            (quote!(Vec<#rust>), Cardinality::Repeated { packed })
        }
        // prost-derive only accepts `optional` on `Option` message fields
        Label::Required if value.message => {
            parts.push(quote!(optional));
            if value.boxed {
                parts.push(quote!(boxed));
                (
                    quote!(::core::option::Option<Box<#rust>>),
                    Cardinality::Required,
                )
            } else {
                (quote!(::core::option::Option<#rust>), Cardinality::Required)
            }
        }
        Label::Required => {
            parts.push(quote!(required));
            (quote!(#rust), Cardinality::Required)
        }
        Label::Optional if value.message => {
            parts.push(quote!(optional));
            if value.boxed {
                parts.push(quote!(boxed));
                (
                    quote!(::core::option::Option<Box<#rust>>),
                    Cardinality::Optional,
                )
            } else {
                (quote!(::core::option::Option<#rust>), Cardinality::Optional)
            }
        }
        Label::Optional if field.proto3_optional() || !ctx.is_proto3() => {
            parts.push(quote!(optional));
            (quote!(::core::option::Option<#rust>), Cardinality::Optional)
        }
        Label::Optional => (quote!(#rust), Cardinality::Singular),
    };

    if let Some(default) = default_value(ctx, field)? {
        parts.push(quote!(default = #default));
    }
    parts.push(quote!(tag = #tag));

    Ok(FieldPlan {
        meta: FieldMeta {
            name: field.name().to_string(),
            number: field.number(),
            kind: field.r#type(),
            cardinality,
        },
        tokens: quote! {
            #docs
            #deprecated
            #[prost(#(#parts),*)]
            pub #ident: #ty
        },
    })
}

/// Declared proto2 default in the form `#[prost(default = "...")]` expects.
///
/// Enum defaults name the variant the constant evaluates to; bytes defaults
/// are protoc's C-escaped text re-encoded as a byte string literal.
fn default_value(
    ctx: &FileContext<'_>,
    field: &FieldDescriptorProto,
) -> Result<Option<String>, GeneratorError> {
    if ctx.is_proto3() || field.label() == Label::Repeated {
        return Ok(None);
    }
    let Some(default) = field.default_value.as_ref() else {
        return Ok(None);
    };

    match field.r#type() {
        Type::Message | Type::Group => Ok(None),
        Type::Enum => {
            let TypeKind::Enum(descriptor) = ctx.lookup(field.type_name())?.kind else {
                return Err(malformed_reference(field, "an enum"));
            };
            let variant = variant_ident(descriptor, default).ok_or_else(|| {
                GeneratorError::MalformedDescriptor(format!(
                    "field `{}` defaults to `{}`, which is not a value of `{}`",
                    field.name(),
                    default,
                    field.type_name()
                ))
            })?;
            Ok(Some(variant.trim_start_matches("r#").to_string()))
        }
        Type::Bytes => {
            let bytes = unescape_bytes(default).map_err(|reason| {
                GeneratorError::MalformedDescriptor(format!(
                    "field `{}` has an invalid bytes default: {}",
                    field.name(),
                    reason
                ))
            })?;
            Ok(Some(Literal::byte_string(&bytes).to_string()))
        }
        _ => Ok(Some(default.clone())),
    }
}

/// Undo protoc's C escaping of a bytes default
fn unescape_bytes(text: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes().peekable();

    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let escaped = bytes.next().ok_or("trailing backslash")?;
        match escaped {
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'\\' | b'\'' | b'"' | b'?' => out.push(escaped),
            b'0'..=b'7' => {
                let mut value = u32::from(escaped - b'0');
                for _ in 0..2 {
                    match bytes.peek() {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            bytes.next();
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(value)
                    .map_err(|_| format!("octal escape {:o} out of range", value))?;
                out.push(byte);
            }
            b'x' | b'X' => {
                let mut value = 0u8;
                let mut digits = 0;
                while digits < 2 {
                    let Some(d) = bytes.peek().and_then(|&d| (d as char).to_digit(16)) else {
                        break;
                    };
                    value = value * 16 + d as u8;
                    bytes.next();
                    digits += 1;
                }
                if digits == 0 {
                    return Err("`\\x` without hex digits".to_string());
                }
                out.push(value);
            }
            other => return Err(format!("unknown escape `\\{}`", other as char)),
        }
    }

    Ok(out)
}

/// `map = "k, v"` attribute, Rust type and cardinality of a map field
fn map_field(
    ctx: &FileContext<'_>,
    location: &[String],
    field: &FieldDescriptorProto,
    entry: &DescriptorProto,
) -> Result<(String, TokenStream, Cardinality), GeneratorError> {
    let malformed = |reason: &str| {
        GeneratorError::MalformedDescriptor(format!(
            "map entry `{}` of field `{}` {}",
            entry.name(),
            field.name(),
            reason
        ))
    };

    if entry.field.len() != 2 {
        return Err(malformed("must have exactly two fields"));
    }
    let key_field = entry
        .field
        .iter()
        .find(|f| f.number() == 1)
        .ok_or_else(|| malformed("has no key field"))?;
    let value_field = entry
        .field
        .iter()
        .find(|f| f.number() == 2)
        .ok_or_else(|| malformed("has no value field"))?;

    let key = ScalarKind::from_type(key_field.r#type())
        .filter(|k| k.is_map_key())
        .ok_or_else(|| malformed("has an invalid key type"))?;
    let key_rust = key.rust_type();

    let (value_attr, value_rust) = match value_field.r#type() {
        Type::Enum => {
            let path = ctx.type_path(value_field.type_name(), location)?;
            (format!("enumeration({})", path), quote!(i32))
        }
        Type::Message => {
            let target = ctx.lookup(value_field.type_name())?;
            if target.is_map_entry() {
                return Err(malformed("has a map entry as its value"));
            }
            let path = ctx.type_path(value_field.type_name(), location)?;
            let rust = parse_type(&path)?;
            ("message".to_string(), quote!(#rust))
        }
        Type::Group => return Err(malformed("has a group value")),
        other => {
            let scalar = ScalarKind::from_type(other)
                .ok_or_else(|| malformed("has an invalid value type"))?;
            (scalar.prost_name().to_string(), scalar.rust_type())
        }
    };

    Ok((
        format!("{}, {}", key.prost_name(), value_attr),
        quote!(::std::collections::HashMap<#key_rust, #value_rust>),
        Cardinality::Map {
            key: key_field.r#type(),
            value: value_field.r#type(),
        },
    ))
}
