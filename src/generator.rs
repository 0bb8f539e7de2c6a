//! Main generator logic
//!
//! Drives one compilation run. The backend is resolved once, the symbol table
//! is built over every file of the request, and then each requested file goes
//! through the same sequence: resolve dependency aliases, translate types,
//! build RPC declarations, assemble imports, wrap in the package namespace
//! when the backend asks for it, and render.

use crate::backend::{self, Backend, ServiceInput};
use crate::codegen::{parse_path, translate_file_types, Declaration, FileContext};
use crate::comments::FILE_SERVICE;
use crate::names::{self, RPC_ALIAS, RUNTIME_ALIAS};
use crate::options::{Options, RUNTIME_PACKAGE};
use crate::resolver::{self, relative_module_path, AliasAllocator, SymbolTable};
use crate::GeneratorError;
use proc_macro2::TokenStream;
use prost::Message;
use prost_types::compiler::code_generator_response::{Feature, File};
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse, Version};
use prost_types::FileDescriptorProto;
use quote::{format_ident, quote};
use std::collections::HashSet;

/// One generated file before it is put in the response
#[derive(Debug)]
pub struct CompiledFile {
    /// Schema file the output was generated from
    pub source: String,
    /// Output file name
    pub name: String,
    /// Declarations in emission order (before namespace wrapping)
    pub declarations: Vec<Declaration>,
    /// Rendered file content
    pub content: String,
}

/// Generate from a request, selecting the backend from its `style` parameter
pub fn generate(request: CodeGeneratorRequest) -> Result<CodeGeneratorResponse, GeneratorError> {
    let options = Options::parse(request.parameter.as_deref())?;
    let backend = backend::lookup(&options.style)?;
    generate_with(&request, backend.as_ref(), &options)
}

/// Decode a serialized request and generate from it
pub fn generate_from_bytes(bytes: &[u8]) -> Result<CodeGeneratorResponse, GeneratorError> {
    let request = CodeGeneratorRequest::decode(bytes)
        .map_err(|e| GeneratorError::DecodeError(format!("Failed to decode request: {}", e)))?;
    generate(request)
}

/// Generate with an explicit backend
pub fn generate_with(
    request: &CodeGeneratorRequest,
    backend: &dyn Backend,
    options: &Options,
) -> Result<CodeGeneratorResponse, GeneratorError> {
    let file = compile(request, backend, options)?
        .into_iter()
        .map(|compiled| File {
            name: Some(compiled.name),
            content: Some(compiled.content),
            ..Default::default()
        })
        .collect();

    Ok(CodeGeneratorResponse {
        file,
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    })
}

/// Compile every requested file, in request order.
///
/// Fails on the first error; nothing is returned for the other files.
pub fn compile(
    request: &CodeGeneratorRequest,
    backend: &dyn Backend,
    options: &Options,
) -> Result<Vec<CompiledFile>, GeneratorError> {
    let span = tracing::info_span!("generate", style = backend.name());
    let _enter = span.enter();

    let symbols = SymbolTable::build(
        &request.proto_file,
        backend.reserved_idents(),
        backend.service_modules(),
        |file| backend.wraps_output_in_namespace(file).unwrap_or(false),
    )?;

    let selected = select_files(request)?;
    let protoc = protoc_version(request.compiler_version.as_ref());
    let mut allocator = AliasAllocator::default();
    let mut compiled = Vec::with_capacity(selected.len());

    for file in selected {
        compiled.push(compile_file(
            &symbols,
            file,
            backend,
            options,
            &mut allocator,
            &protoc,
        )?);
    }

    tracing::info!(files = compiled.len(), "generation complete");
    Ok(compiled)
}

/// Files listed in `file_to_generate`, in `proto_file` order. An empty list
/// selects every file.
fn select_files(request: &CodeGeneratorRequest) -> Result<Vec<&FileDescriptorProto>, GeneratorError> {
    if request.file_to_generate.is_empty() {
        return Ok(request.proto_file.iter().collect());
    }

    let known: HashSet<&str> = request.proto_file.iter().map(|f| f.name()).collect();
    if let Some(missing) = request
        .file_to_generate
        .iter()
        .find(|name| !known.contains(name.as_str()))
    {
        return Err(GeneratorError::MalformedDescriptor(format!(
            "file to generate `{}` is not part of the request",
            missing
        )));
    }

    let wanted: HashSet<&str> = request.file_to_generate.iter().map(String::as_str).collect();
    Ok(request
        .proto_file
        .iter()
        .filter(|f| wanted.contains(f.name()))
        .collect())
}

fn compile_file(
    symbols: &SymbolTable<'_>,
    file: &FileDescriptorProto,
    backend: &dyn Backend,
    options: &Options,
    allocator: &mut AliasAllocator,
    protoc: &str,
) -> Result<CompiledFile, GeneratorError> {
    let span = tracing::debug_span!("file", name = file.name());
    let _enter = span.enter();

    let deps = resolver::resolve(symbols, file, allocator)?;
    let ctx = FileContext::new(file, symbols, deps)?;

    let mut declarations = translate_file_types(&ctx)?;
    declarations.extend(rpc_declarations(&ctx, backend, options)?);

    let imports = imports(&ctx, options)?;
    let items = declarations.iter().map(|d| &d.tokens);
    let body = wrap_in_namespace(&ctx.namespace, quote!(#(#items)*));
    let tokens = quote! {
        #imports
        #body
    };

    let syntax = syn::parse2::<syn::File>(tokens).map_err(|e| {
        GeneratorError::CodeGenError(format!("{}: generated code does not parse: {}", file.name(), e))
    })?;
    let content = format!("{}{}", header(file, protoc), prettyplease::unparse(&syntax));

    tracing::debug!(
        declarations = declarations.len(),
        dependencies = ctx.deps.imports().len(),
        "compiled file"
    );

    Ok(CompiledFile {
        source: file.name().to_string(),
        name: output_name(file.name()),
        declarations,
        content,
    })
}

/// Shared types (once, when the file has services), then client and server
/// of each service in declaration order
fn rpc_declarations(
    ctx: &FileContext<'_>,
    backend: &dyn Backend,
    options: &Options,
) -> Result<Vec<Declaration>, GeneratorError> {
    let mut declarations = Vec::new();
    if ctx.file.service.is_empty() {
        return Ok(declarations);
    }

    if let Some(shared) = backend.shared_interface_types(ctx)? {
        declarations.extend(shared);
    }

    let entry = ctx.symbols.file(ctx.name()).ok_or_else(|| {
        GeneratorError::MalformedDescriptor(format!("file `{}` is not indexed", ctx.name()))
    })?;

    for (i, (descriptor, names)) in ctx.file.service.iter().zip(&entry.services).enumerate() {
        let source_path = [FILE_SERVICE, i as i32];
        let service = ServiceInput {
            descriptor,
            names,
            source_path: &source_path,
        };
        if let Some(client) = backend.service_client(ctx, &service, options)? {
            declarations.push(client);
        }
        if let Some(server) = backend.unimplemented_server(ctx, &service)? {
            declarations.push(server);
        }
    }

    Ok(declarations)
}

/// Dependency imports in declared order, then the two runtime imports
fn imports(ctx: &FileContext<'_>, options: &Options) -> Result<TokenStream, GeneratorError> {
    let mut tokens = TokenStream::new();

    for import in ctx.deps.imports() {
        let path = parse_path(&relative_module_path(ctx.name(), &import.file).join("::"))?;
        let alias = names::ident(&import.alias);
        tokens.extend(quote! {
            #[allow(unused_imports)]
            use #path as #alias;
        });
    }

    let runtime = parse_path(&format!("::{}", RUNTIME_PACKAGE))?;
    let rpc = parse_path(&format!("::{}", options.grpc_package))?;
    let runtime_alias = format_ident!("{}", RUNTIME_ALIAS);
    let rpc_alias = format_ident!("{}", RPC_ALIAS);
    tokens.extend(quote! {
        #[allow(unused_imports)]
        use #runtime as #runtime_alias;
        #[allow(unused_imports)]
        use #rpc as #rpc_alias;
    });

    Ok(tokens)
}

/// Nest `body` in one `pub mod` per namespace segment
fn wrap_in_namespace(namespace: &[String], body: TokenStream) -> TokenStream {
    namespace.iter().rev().fold(body, |inner, segment| {
        let module = names::ident(segment);
        quote! {
            pub mod #module {
                #inner
            }
        }
    })
}

/// `foo/bar.proto` -> `foo/bar.rs`
pub fn output_name(name: &str) -> String {
    match name.strip_suffix(".proto") {
        Some(stem) => format!("{}.rs", stem),
        None => format!("{}.rs", name),
    }
}

fn protoc_version(version: Option<&Version>) -> String {
    match version {
        Some(v) => {
            let mut text = format!("{}.{}.{}", v.major(), v.minor(), v.patch());
            if !v.suffix().is_empty() {
                text.push('-');
                text.push_str(v.suffix());
            }
            text
        }
        None => "(unknown)".to_string(),
    }
}

fn header(file: &FileDescriptorProto, protoc: &str) -> String {
    format!(
        "// @generated by {} v{}. DO NOT EDIT.\n// protoc: {}\n// source: {}\n\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        protoc,
        file.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("a.proto"), "a.rs");
        assert_eq!(output_name("foo/bar.proto"), "foo/bar.rs");
        assert_eq!(output_name("schema"), "schema.rs");
    }

    #[test]
    fn test_protoc_version() {
        let version = Version {
            major: Some(3),
            minor: Some(21),
            patch: Some(12),
            suffix: Some(String::new()),
        };
        assert_eq!(protoc_version(Some(&version)), "3.21.12");
        assert_eq!(protoc_version(None), "(unknown)");
    }

    #[test]
    fn test_wrap_in_namespace() {
        let wrapped = wrap_in_namespace(&["x".to_string(), "y".to_string()], quote!(pub struct A;));
        let file = syn::parse2::<syn::File>(wrapped).unwrap();
        let rendered = prettyplease::unparse(&file);
        assert!(rendered.contains("pub mod x {"));
        assert!(rendered.contains("pub mod y {"));
    }

    #[test]
    fn test_select_files_unknown_entry() {
        let request = CodeGeneratorRequest {
            file_to_generate: vec!["missing.proto".to_string()],
            proto_file: vec![FileDescriptorProto {
                name: Some("a.proto".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            select_files(&request),
            Err(GeneratorError::MalformedDescriptor(_))
        ));
    }
}
