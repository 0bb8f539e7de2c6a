//! protoc-gen-rust-rpc library
//!
//! This crate provides the code generation logic for converting Protocol Buffer
//! descriptor sets into Rust modules: `prost` message and enum types plus RPC
//! client/server scaffolding produced by a pluggable [`backend::Backend`].

#![deny(warnings)]
#![deny(missing_docs)]

pub mod backend;
pub mod codegen;
pub mod comments;
pub mod generator;
pub mod names;
pub mod options;
pub mod resolver;
pub mod types;

use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use thiserror::Error;

/// Errors that can occur during code generation
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Invalid plugin configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested `style` does not name a registered backend
    #[error("Unknown style `{style}` (available: {available})")]
    UnknownBackend {
        /// The style that was requested
        style: String,
        /// Comma separated list of registered styles
        available: String,
    },

    /// A file imports a dependency that is missing from the descriptor set
    #[error("{file}: dependency `{dependency}` is not part of the request")]
    MissingDependency {
        /// The importing file
        file: String,
        /// The missing dependency
        dependency: String,
    },

    /// A type reference does not resolve to any known descriptor
    #[error("{file}: unresolved type reference `{type_name}`")]
    UnresolvedType {
        /// The file being compiled when resolution failed
        file: String,
        /// The fully-qualified type name that failed to resolve
        type_name: String,
    },

    /// A descriptor has a shape the generator cannot translate
    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),

    /// General code generation failure
    #[error("Code generation failed: {0}")]
    CodeGenError(String),

    /// Failed to decode protobuf message
    #[error("Decode error: {0}")]
    DecodeError(String),
}

/// Generate Rust modules from a protobuf CodeGeneratorRequest
///
/// This is the main entry point for the code generator. The backend is
/// selected from the `style` parameter of the request.
pub fn generate(request: CodeGeneratorRequest) -> Result<CodeGeneratorResponse, GeneratorError> {
    generator::generate(request)
}

/// Generate Rust modules from raw protobuf bytes
pub fn generate_from_bytes(bytes: &[u8]) -> Result<CodeGeneratorResponse, GeneratorError> {
    generator::generate_from_bytes(bytes)
}
