//! RPC backends
//!
//! A [`Backend`] turns service descriptors into RPC declarations for one
//! target framework. Every operation is optional: the default implementations
//! report that the backend does not support it, and the orchestrator simply
//! skips the corresponding output. Message and enum translation never depends
//! on the backend.
//!
//! Backends are registered by style name in a static registry and selected
//! once per run with [`lookup`].

pub mod messages;
pub mod tonic;

use crate::codegen::{parse_type, Declaration, FileContext};
use crate::comments::{child_path, SERVICE_METHOD};
use crate::names::{snake_ident, Scope};
use crate::options::Options;
use crate::resolver::{ServiceModules, ServiceNames, TypeKind};
use crate::GeneratorError;
use once_cell::sync::Lazy;
use prost_types::{FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto};
use std::collections::BTreeMap;

/// Code generation strategy for the RPC layer of a generated file
pub trait Backend: Send + Sync {
    /// Style name the backend is registered under
    fn name(&self) -> &'static str;

    /// Identifiers the backend declares at the root of generated files.
    /// Schema types never claim these names.
    fn reserved_idents(&self) -> &'static [&'static str] {
        &[]
    }

    /// Per-service modules the backend declares at the root of generated
    /// files. Only these claim a name there.
    fn service_modules(&self) -> ServiceModules {
        ServiceModules::default()
    }

    /// Client type with one method per RPC, shaped by its streaming flags
    fn service_client(
        &self,
        _ctx: &FileContext<'_>,
        _service: &ServiceInput<'_>,
        _options: &Options,
    ) -> Result<Option<Declaration>, GeneratorError> {
        Ok(None)
    }

    /// Server skeleton with one overridable slot per RPC
    fn unimplemented_server(
        &self,
        _ctx: &FileContext<'_>,
        _service: &ServiceInput<'_>,
    ) -> Result<Option<Declaration>, GeneratorError> {
        Ok(None)
    }

    /// Types shared by every service of a generated file, emitted once
    fn shared_interface_types(
        &self,
        _ctx: &FileContext<'_>,
    ) -> Result<Option<Vec<Declaration>>, GeneratorError> {
        Ok(None)
    }

    /// Whether the file's declarations are nested in its package namespace.
    /// `None` is treated as `false`.
    fn wraps_output_in_namespace(&self, _file: &FileDescriptorProto) -> Option<bool> {
        None
    }
}

/// A service handed to a backend
#[derive(Debug, Clone, Copy)]
pub struct ServiceInput<'a> {
    /// The service descriptor
    pub descriptor: &'a ServiceDescriptorProto,
    /// Identifiers reserved for the service at the file root
    pub names: &'a ServiceNames,
    /// Source code info path of the service
    pub source_path: &'a [i32],
}

/// Streaming shape of an RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodShape {
    /// Single request, single response
    Unary,
    /// Single request, response stream
    ServerStreaming,
    /// Request stream, single response
    ClientStreaming,
    /// Request stream, response stream
    Streaming,
}

impl MethodShape {
    /// Shape from the descriptor's streaming flags
    pub fn of(method: &MethodDescriptorProto) -> Self {
        match (method.client_streaming(), method.server_streaming()) {
            (false, false) => MethodShape::Unary,
            (false, true) => MethodShape::ServerStreaming,
            (true, false) => MethodShape::ClientStreaming,
            (true, true) => MethodShape::Streaming,
        }
    }

    /// Request side is a stream
    pub fn client_streaming(self) -> bool {
        matches!(self, MethodShape::ClientStreaming | MethodShape::Streaming)
    }

    /// Response side is a stream
    pub fn server_streaming(self) -> bool {
        matches!(self, MethodShape::ServerStreaming | MethodShape::Streaming)
    }
}

/// An RPC with its types resolved from a particular module
pub struct ResolvedMethod<'a> {
    /// The method descriptor
    pub descriptor: &'a MethodDescriptorProto,
    /// Legalized snake_case identifier, unique within the service
    pub ident: String,
    /// Request message type
    pub input: syn::Type,
    /// Response message type
    pub output: syn::Type,
    /// Streaming shape
    pub shape: MethodShape,
    /// Source code info path of the method
    pub source_path: Vec<i32>,
}

impl<'a> ServiceInput<'a> {
    /// Fully-qualified service name used on the wire (`pkg.Service`)
    pub fn full_name(&self, ctx: &FileContext<'_>) -> String {
        ctx.full_name(self.descriptor.name())
    }

    /// Resolve every method's message types as seen from module `location`
    pub fn methods(
        &self,
        ctx: &FileContext<'_>,
        location: &[String],
    ) -> Result<Vec<ResolvedMethod<'a>>, GeneratorError> {
        let mut scope = Scope::default();
        self.descriptor
            .method
            .iter()
            .enumerate()
            .map(|(i, method)| -> Result<ResolvedMethod<'a>, GeneratorError> {
                Ok(ResolvedMethod {
                    descriptor: method,
                    ident: scope.claim(snake_ident(method.name())),
                    input: message_type(ctx, location, method, method.input_type())?,
                    output: message_type(ctx, location, method, method.output_type())?,
                    shape: MethodShape::of(method),
                    source_path: child_path(self.source_path, SERVICE_METHOD, i),
                })
            })
            .collect()
    }
}

fn message_type(
    ctx: &FileContext<'_>,
    location: &[String],
    method: &MethodDescriptorProto,
    type_name: &str,
) -> Result<syn::Type, GeneratorError> {
    let entry = ctx.lookup(type_name)?;
    if !matches!(entry.kind, TypeKind::Message { .. }) || entry.is_map_entry() {
        return Err(GeneratorError::MalformedDescriptor(format!(
            "method `{}` uses `{}`, which is not a message",
            method.name(),
            type_name
        )));
    }
    parse_type(&ctx.type_path(type_name, location)?)
}

type Factory = fn() -> Box<dyn Backend>;

static REGISTRY: Lazy<BTreeMap<&'static str, Factory>> = Lazy::new(|| {
    let mut registry: BTreeMap<&'static str, Factory> = BTreeMap::new();
    registry.insert(messages::STYLE, || -> Box<dyn Backend> {
        Box::new(messages::MessagesBackend)
    });
    registry.insert(tonic::STYLE, || -> Box<dyn Backend> { Box::new(tonic::TonicBackend) });
    registry.insert(tonic::CLIENT_STYLE, || -> Box<dyn Backend> {
        Box::new(tonic::TonicClientBackend::default())
    });
    registry
});

/// Registered style names, sorted
pub fn available() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}

/// Instantiate the backend registered under `style`
pub fn lookup(style: &str) -> Result<Box<dyn Backend>, GeneratorError> {
    let factory = REGISTRY
        .get(style)
        .ok_or_else(|| GeneratorError::UnknownBackend {
            style: style.to_string(),
            available: available().join(", "),
        })?;
    Ok(factory())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_registered_styles() {
        assert_eq!(available(), vec!["messages", "tonic", "tonic-client"]);
        for style in available() {
            assert_eq!(lookup(style).unwrap().name(), style);
        }
    }

    #[test]
    fn test_lookup_unknown_style() {
        match lookup("grpc-web") {
            Err(GeneratorError::UnknownBackend { style, available }) => {
                assert_eq!(style, "grpc-web");
                assert_eq!(available, "messages, tonic, tonic-client");
            }
            other => panic!("expected UnknownBackend, got {:?}", other.map(|b| b.name())),
        }
    }

    #[test]
    fn test_method_shape() {
        let mut method = MethodDescriptorProto::default();
        assert_eq!(MethodShape::of(&method), MethodShape::Unary);
        method.server_streaming = Some(true);
        assert_eq!(MethodShape::of(&method), MethodShape::ServerStreaming);
        method.client_streaming = Some(true);
        assert_eq!(MethodShape::of(&method), MethodShape::Streaming);
        assert!(MethodShape::Streaming.client_streaming());
        assert!(!MethodShape::ClientStreaming.server_streaming());
    }
}
