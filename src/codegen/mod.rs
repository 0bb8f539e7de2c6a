//! Code generation for protobuf types
//!
//! This module contains the type translator: it turns enum and message
//! descriptors into Rust declarations that the `prost` runtime can encode and
//! decode. RPC declarations are produced separately by [`crate::backend`].

pub mod enumeration;
pub mod field;
pub mod message;
pub mod oneof;

use crate::comments::{Comments, FILE_ENUM, FILE_MESSAGE};
use crate::names::{RPC_ALIAS, RUNTIME_ALIAS};
use crate::resolver::{DependencyMap, SymbolTable, TypeEntry};
use crate::GeneratorError;
use proc_macro2::TokenStream;
use prost_types::field_descriptor_proto::Type;
use prost_types::FileDescriptorProto;

pub use enumeration::translate_enum;
pub use message::translate_message;

/// What a generated declaration is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    /// A `#[repr(i32)]` protobuf enum with its helper impl
    Enum,
    /// A message struct, with its serialization layout
    Message(MessageLayout),
    /// A oneof enum
    Oneof,
    /// Auxiliary impl blocks (e.g. `prost::Name`)
    Support,
    /// A module of nested declarations
    Module,
    /// An RPC client
    Client,
    /// An RPC server skeleton
    Server,
    /// Types shared by the RPC declarations of one file
    Shared,
}

/// One generated item (or a tightly coupled group of items)
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Rust identifier of the main item
    pub name: String,
    /// What the declaration is
    pub kind: DeclarationKind,
    /// Generated tokens
    pub tokens: TokenStream,
}

/// Field cardinality as encoded on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cardinality {
    /// proto3 implicit presence
    Singular,
    /// Explicit presence (`Option<T>`)
    Optional,
    /// proto2 `required`
    Required,
    /// Repeated field
    Repeated {
        /// Packed encoding
        packed: bool,
    },
    /// `map<K, V>` field
    Map {
        /// Key kind
        key: Type,
        /// Value kind
        value: Type,
    },
    /// Member of the named oneof
    Oneof(String),
}

/// Serialization metadata of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    /// Protobuf field name
    pub name: String,
    /// Wire number
    pub number: i32,
    /// Wire kind
    pub kind: Type,
    /// Cardinality
    pub cardinality: Cardinality,
}

impl FieldMeta {
    /// Wire kind as spelled in `#[prost(...)]` (`int32`, `message`, ...)
    pub fn kind_name(&self) -> &'static str {
        crate::types::kind_name(self.kind)
    }
}

/// Serialization metadata of one message, in field declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLayout {
    /// Fully-qualified protobuf name (without leading dot)
    pub full_name: String,
    /// Field metadata
    pub fields: Vec<FieldMeta>,
}

/// Where a descriptor is being translated
#[derive(Debug, Clone)]
pub struct Site {
    /// Fully-qualified name with leading dot
    pub fqn: String,
    /// Module path (from the file root) the declaration is emitted in
    pub location: Vec<String>,
    /// Source code info path of the descriptor
    pub source_path: Vec<i32>,
}

impl Site {
    /// Site of a child descriptor emitted in `location`
    pub fn child(&self, name: &str, location: Vec<String>, source_path: Vec<i32>) -> Site {
        Site {
            fqn: format!("{}.{}", self.fqn, name),
            location,
            source_path,
        }
    }
}

/// Per-file translation context, threaded through translator and backend
pub struct FileContext<'a> {
    /// The file being compiled
    pub file: &'a FileDescriptorProto,
    /// Whole-run symbol table
    pub symbols: &'a SymbolTable<'a>,
    /// Aliases of this file's dependencies
    pub deps: DependencyMap,
    /// Source comments of this file
    pub comments: Comments,
    /// Namespace module path, empty when unwrapped
    pub namespace: Vec<String>,
}

impl<'a> FileContext<'a> {
    /// Context for compiling `file`
    pub fn new(
        file: &'a FileDescriptorProto,
        symbols: &'a SymbolTable<'a>,
        deps: DependencyMap,
    ) -> Result<Self, GeneratorError> {
        let entry = symbols.file(file.name()).ok_or_else(|| {
            GeneratorError::MalformedDescriptor(format!("file `{}` is not indexed", file.name()))
        })?;
        Ok(FileContext {
            file,
            symbols,
            deps,
            comments: Comments::from_file(file),
            namespace: entry.namespace.clone(),
        })
    }

    /// Schema file name
    pub fn name(&self) -> &str {
        self.file.name()
    }

    /// Schema package (possibly empty)
    pub fn package(&self) -> &str {
        self.file.package()
    }

    /// proto3 field presence rules apply
    pub fn is_proto3(&self) -> bool {
        self.file.syntax() == "proto3"
    }

    /// Fully-qualified prefix of top-level names (`.pkg` or empty)
    pub fn fqn_prefix(&self) -> String {
        if self.package().is_empty() {
            String::new()
        } else {
            format!(".{}", self.package())
        }
    }

    /// Protobuf full name of a type in this package (`pkg.Name`)
    pub fn full_name(&self, name: &str) -> String {
        if self.package().is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.package(), name)
        }
    }

    /// Look up a type, failing on unresolved references
    pub fn lookup(&self, type_name: &str) -> Result<&TypeEntry<'a>, GeneratorError> {
        self.symbols
            .lookup(type_name)
            .ok_or_else(|| self.unresolved(type_name))
    }

    fn unresolved(&self, type_name: &str) -> GeneratorError {
        GeneratorError::UnresolvedType {
            file: self.name().to_string(),
            type_name: type_name.to_string(),
        }
    }

    /// Rust path to `type_name` as seen from module `location`.
    ///
    /// Types of this file are addressed relative to the common module prefix;
    /// types of other files go through the dependency alias bound at the
    /// file root.
    pub fn type_path(&self, type_name: &str, location: &[String]) -> Result<String, GeneratorError> {
        let entry = self.lookup(type_name)?;
        let target_file = self
            .symbols
            .file(entry.file)
            .ok_or_else(|| self.unresolved(type_name))?;

        let mut target = target_file.namespace.clone();
        target.extend(entry.path.iter().cloned());

        let mut segments = Vec::new();
        if entry.file == self.name() {
            let modules = &target[..target.len() - 1];
            let common = location
                .iter()
                .zip(modules)
                .take_while(|(a, b)| a == b)
                .count();
            segments.extend(std::iter::repeat("super".to_string()).take(location.len() - common));
            segments.extend(target[common..].iter().cloned());
        } else {
            let alias = self
                .deps
                .alias_for(entry.file)
                .ok_or_else(|| self.unresolved(type_name))?;
            segments.extend(std::iter::repeat("super".to_string()).take(location.len()));
            segments.push(alias.to_string());
            segments.extend(target);
        }
        Ok(segments.join("::"))
    }

    /// Path to an item of the serialization runtime (`pb_1::Message`)
    pub fn runtime_path(&self, location: &[String], item: &str) -> Result<syn::Path, GeneratorError> {
        root_alias_path(location, RUNTIME_ALIAS, item)
    }

    /// Path to an item of the RPC framework (`grpc_1::Status`)
    pub fn rpc_path(&self, location: &[String], item: &str) -> Result<syn::Path, GeneratorError> {
        root_alias_path(location, RPC_ALIAS, item)
    }
}

fn root_alias_path(location: &[String], alias: &str, item: &str) -> Result<syn::Path, GeneratorError> {
    let mut path = "super::".repeat(location.len());
    path.push_str(alias);
    if !item.is_empty() {
        path.push_str("::");
        path.push_str(item);
    }
    parse_path(&path)
}

/// Parse a Rust path
pub fn parse_path(path: &str) -> Result<syn::Path, GeneratorError> {
    syn::parse_str(path)
        .map_err(|e| GeneratorError::CodeGenError(format!("invalid path `{}`: {}", path, e)))
}

/// Parse a Rust type
pub fn parse_type(ty: &str) -> Result<syn::Type, GeneratorError> {
    syn::parse_str(ty)
        .map_err(|e| GeneratorError::CodeGenError(format!("invalid type `{}`: {}", ty, e)))
}

/// `#[deprecated]` when the descriptor option is set
pub fn deprecated_attr(deprecated: Option<bool>) -> TokenStream {
    if deprecated.unwrap_or(false) {
        quote::quote!(#[deprecated])
    } else {
        TokenStream::new()
    }
}

/// Translate every top-level enum and message of the context's file
pub fn translate_file_types(ctx: &FileContext<'_>) -> Result<Vec<Declaration>, GeneratorError> {
    let prefix = ctx.fqn_prefix();
    let mut declarations = Vec::new();

    for (i, enum_desc) in ctx.file.enum_type.iter().enumerate() {
        let site = Site {
            fqn: format!("{}.{}", prefix, enum_desc.name()),
            location: ctx.namespace.clone(),
            source_path: vec![FILE_ENUM, i as i32],
        };
        declarations.push(translate_enum(ctx, &site, enum_desc)?);
    }

    for (i, message) in ctx.file.message_type.iter().enumerate() {
        let site = Site {
            fqn: format!("{}.{}", prefix, message.name()),
            location: ctx.namespace.clone(),
            source_path: vec![FILE_MESSAGE, i as i32],
        };
        declarations.extend(translate_message(ctx, &site, message)?);
    }

    Ok(declarations)
}
