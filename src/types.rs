//! Protobuf scalar type mapping
//!
//! Maps protobuf scalar field types to the `#[prost(...)]` kind used by the
//! serialization runtime and to the Rust type of the generated field.

use proc_macro2::TokenStream;
use prost_types::field_descriptor_proto::Type;
use quote::quote;

/// A protobuf scalar wire kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
}

impl ScalarKind {
    /// Scalar kind of a descriptor type, `None` for message, group and enum
    pub fn from_type(ty: Type) -> Option<Self> {
        let kind = match ty {
            Type::Double => ScalarKind::Double,
            Type::Float => ScalarKind::Float,
            Type::Int32 => ScalarKind::Int32,
            Type::Int64 => ScalarKind::Int64,
            Type::Uint32 => ScalarKind::Uint32,
            Type::Uint64 => ScalarKind::Uint64,
            Type::Sint32 => ScalarKind::Sint32,
            Type::Sint64 => ScalarKind::Sint64,
            Type::Fixed32 => ScalarKind::Fixed32,
            Type::Fixed64 => ScalarKind::Fixed64,
            Type::Sfixed32 => ScalarKind::Sfixed32,
            Type::Sfixed64 => ScalarKind::Sfixed64,
            Type::Bool => ScalarKind::Bool,
            Type::String => ScalarKind::String,
            Type::Bytes => ScalarKind::Bytes,
            Type::Message | Type::Group | Type::Enum => return None,
        };
        Some(kind)
    }

    /// Name of the kind inside `#[prost(...)]` and `map = "..."`
    pub fn prost_name(self) -> &'static str {
        match self {
            ScalarKind::Double => "double",
            ScalarKind::Float => "float",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Sint32 => "sint32",
            ScalarKind::Sint64 => "sint64",
            ScalarKind::Fixed32 => "fixed32",
            ScalarKind::Fixed64 => "fixed64",
            ScalarKind::Sfixed32 => "sfixed32",
            ScalarKind::Sfixed64 => "sfixed64",
            ScalarKind::Bool => "bool",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
        }
    }

    /// Kind tokens for a field attribute (`int32`, `bytes = "vec"`)
    pub fn attribute(self) -> TokenStream {
        match self {
            ScalarKind::Bytes => quote!(bytes = "vec"),
            other => {
                let name = crate::names::ident(other.prost_name());
                quote!(#name)
            }
        }
    }

    /// Rust type of a single value
    pub fn rust_type(self) -> TokenStream {
        match self {
            ScalarKind::Double => quote!(f64),
            ScalarKind::Float => quote!(f32),
            ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => quote!(i32),
            ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => quote!(i64),
            ScalarKind::Uint32 | ScalarKind::Fixed32 => quote!(u32),
            ScalarKind::Uint64 | ScalarKind::Fixed64 => quote!(u64),
            ScalarKind::Bool => quote!(bool),
            ScalarKind::String => quote!(String),
            ScalarKind::Bytes => quote!(Vec<u8>),
        }
    }

    /// Whether repeated values of this kind can use packed encoding
    pub fn is_packable(self) -> bool {
        !matches!(self, ScalarKind::String | ScalarKind::Bytes)
    }

    /// Whether this kind is a legal map key
    pub fn is_map_key(self) -> bool {
        !matches!(
            self,
            ScalarKind::Double | ScalarKind::Float | ScalarKind::Bytes
        )
    }
}

/// Prost kind name for any descriptor type (`message`, `enumeration`, scalars)
pub fn kind_name(ty: Type) -> &'static str {
    match ty {
        Type::Message => "message",
        Type::Group => "group",
        Type::Enum => "enumeration",
        other => ScalarKind::from_type(other)
            .map(ScalarKind::prost_name)
            .unwrap_or("message"),
    }
}
