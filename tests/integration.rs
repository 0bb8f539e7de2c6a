//! Integration tests for protoc-gen-rust-rpc
//!
//! These tests exercise the full code generation pipeline.

use prost_types::compiler::CodeGeneratorRequest;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::source_code_info::Location;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions, MethodDescriptorProto, OneofDescriptorProto,
    ServiceDescriptorProto, SourceCodeInfo,
};
use protoc_gen_rust_rpc::backend::{self, Backend};
use protoc_gen_rust_rpc::codegen::{Cardinality, Declaration, DeclarationKind, FileContext};
use protoc_gen_rust_rpc::generator;
use protoc_gen_rust_rpc::options::Options;
use protoc_gen_rust_rpc::GeneratorError;
use quote::quote;

fn file(name: &str, package: &str) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn scalar(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional.into()),
        r#type: Some(ty.into()),
        ..Default::default()
    }
}

fn reference(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..scalar(name, number, ty)
    }
}

fn message(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field,
        ..Default::default()
    }
}

fn color_enum() -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: vec![
            EnumValueDescriptorProto {
                name: Some("RED".to_string()),
                number: Some(0),
                ..Default::default()
            },
            EnumValueDescriptorProto {
                name: Some("GREEN".to_string()),
                number: Some(1),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

fn method(name: &str, input: &str, output: &str) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        ..Default::default()
    }
}

fn request(style: &str, proto_file: Vec<FileDescriptorProto>) -> CodeGeneratorRequest {
    CodeGeneratorRequest {
        parameter: Some(format!("style={}", style)),
        proto_file,
        ..Default::default()
    }
}

/// Generate and return `(name, content)` pairs
fn generate(request: CodeGeneratorRequest) -> Vec<(String, String)> {
    let response = protoc_gen_rust_rpc::generate(request).expect("generation should succeed");
    assert!(response.error.is_none(), "should have no error");
    response
        .file
        .into_iter()
        .map(|f| (f.name.unwrap_or_default(), f.content.unwrap_or_default()))
        .collect()
}

fn assert_parses(content: &str) -> syn::File {
    match syn::parse_file(content) {
        Ok(file) => file,
        Err(e) => panic!("generated code should parse: {}\n{}", e, content),
    }
}

/// Every enum with the given name, at any module depth
fn find_enums<'a>(items: &'a [syn::Item], name: &str, found: &mut Vec<&'a syn::ItemEnum>) {
    for item in items {
        match item {
            syn::Item::Enum(e) if e.ident == name => found.push(e),
            syn::Item::Mod(m) => {
                if let Some((_, nested)) = &m.content {
                    find_enums(nested, name, found);
                }
            }
            _ => {}
        }
    }
}

fn map_entry(name: &str, key: Type, value: Type) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![scalar("key", 1, key), scalar("value", 2, value)],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[allow(dead_code)]
mod fixture {
    include!("fixtures/defaults.rs");
}

/// Every struct with the given name, at any module depth
fn find_structs<'a>(items: &'a [syn::Item], name: &str, found: &mut Vec<&'a syn::ItemStruct>) {
    for item in items {
        match item {
            syn::Item::Struct(s) if s.ident == name => found.push(s),
            syn::Item::Mod(m) => {
                if let Some((_, nested)) = &m.content {
                    find_structs(nested, name, found);
                }
            }
            _ => {}
        }
    }
}

fn struct_fields(file: &syn::File, name: &str) -> Vec<String> {
    let mut found = Vec::new();
    find_structs(&file.items, name, &mut found);
    assert_eq!(found.len(), 1, "should declare `{}` once", name);
    found[0].fields.iter().map(|f| quote!(#f).to_string()).collect()
}

fn enum_variants(file: &syn::File, name: &str) -> Vec<String> {
    let mut found = Vec::new();
    find_enums(&file.items, name, &mut found);
    assert_eq!(found.len(), 1, "should declare `{}` once", name);
    found[0].variants.iter().map(|v| quote!(#v).to_string()).collect()
}

/// Whitespace-free content, for matching fragments regardless of line breaks
fn flatten(content: &str) -> String {
    content.split_whitespace().collect()
}

/// proto2 schema behind `tests/fixtures/defaults.rs`
fn defaults_file() -> FileDescriptorProto {
    let mut color = color_enum();
    color.value.push(EnumValueDescriptorProto {
        name: Some("CRIMSON".to_string()),
        number: Some(0),
        ..Default::default()
    });

    let leaf = message(
        "Leaf",
        vec![FieldDescriptorProto {
            default_value: Some("hi".to_string()),
            ..scalar("label", 1, Type::String)
        }],
    );

    let mut node = message(
        "Node",
        vec![
            reference("next", 1, Type::Message, ".fx.Node"),
            FieldDescriptorProto {
                label: Some(Label::Required.into()),
                ..reference("leaf", 2, Type::Message, ".fx.Leaf")
            },
            FieldDescriptorProto {
                default_value: Some("GREEN".to_string()),
                ..reference("color", 3, Type::Enum, ".fx.Color")
            },
            FieldDescriptorProto {
                default_value: Some("\\001ab".to_string()),
                ..scalar("blob", 4, Type::Bytes)
            },
            FieldDescriptorProto {
                label: Some(Label::Repeated.into()),
                ..reference("counts", 5, Type::Message, ".fx.Node.CountsEntry")
            },
            FieldDescriptorProto {
                oneof_index: Some(0),
                ..scalar("name", 6, Type::String)
            },
            FieldDescriptorProto {
                oneof_index: Some(0),
                ..scalar("id", 7, Type::Int64)
            },
            FieldDescriptorProto {
                default_value: Some("CRIMSON".to_string()),
                ..reference("shade", 8, Type::Enum, ".fx.Color")
            },
        ],
    );
    node.nested_type
        .push(map_entry("CountsEntry", Type::String, Type::Int32));
    node.oneof_decl.push(OneofDescriptorProto {
        name: Some("choice".to_string()),
        ..Default::default()
    });

    let mut f = file("defaults.proto", "fx");
    f.syntax = Some("proto2".to_string());
    f.enum_type.push(color);
    f.message_type.push(leaf);
    f.message_type.push(node);
    f
}

#[test]
fn test_enum_only_file_with_message_style() {
    let mut a = file("a.proto", "x.y");
    a.enum_type.push(color_enum());

    let files = generate(request("messages", vec![a]));
    assert_eq!(files.len(), 1, "should generate one file");
    let (name, content) = &files[0];
    assert_eq!(name, "a.rs");

    assert!(
        content.starts_with("// @generated by protoc-gen-rust-rpc"),
        "should start with the header comment"
    );
    assert!(content.contains("// source: a.proto"));
    assert!(content.contains("use ::prost as pb_1;"), "should import the runtime");
    assert!(content.contains("use ::tonic as grpc_1;"), "should import the RPC framework");
    assert!(content.contains("pub enum Color"), "should declare the enum");
    assert!(content.contains("Red = 0"));
    assert!(content.contains("Green = 1"));
    assert!(content.contains("\"RED\""), "should keep the original constant names");
    assert!(!content.contains("pub mod x"), "should not wrap in the namespace");
    assert!(!content.contains("_client"), "should have no RPC declarations");

    let parsed = assert_parses(content);
    let mut enums = Vec::new();
    find_enums(&parsed.items, "Color", &mut enums);
    assert_eq!(enums.len(), 1, "should declare exactly one enum");
    assert_eq!(enums[0].variants.len(), 2);
}

#[test]
fn test_cross_file_reference_uses_dependency_alias() {
    let mut a = file("a.proto", "x");
    a.enum_type.push(color_enum());

    let mut b = file("b.proto", "x");
    b.dependency.push("a.proto".to_string());
    b.message_type.push(message(
        "Paint",
        vec![reference("color", 1, Type::Enum, ".x.Color")],
    ));

    let files = generate(request("messages", vec![a, b]));
    assert_eq!(files.len(), 2);
    let (_, a_content) = &files[0];
    let (name, content) = &files[1];
    assert_eq!(name, "b.rs");

    assert!(
        !a_content.contains("dependency_"),
        "a file without dependencies binds no alias"
    );
    assert!(content.contains("use super::a as dependency_1;"));
    assert!(
        content.contains("enumeration = \"dependency_1::Color\""),
        "should qualify the enum through the alias"
    );
    assert_eq!(
        content.matches("dependency_1").count(),
        2,
        "alias should only appear in the import and the qualified reference"
    );
    assert!(content.contains("pub color: i32"));
    assert_parses(content);
}

#[test]
fn test_aliases_are_fresh_per_file() {
    let mut a = file("a.proto", "x");
    a.enum_type.push(color_enum());
    let mut b = file("b.proto", "x");
    b.dependency.push("a.proto".to_string());
    b.message_type.push(message(
        "B",
        vec![reference("color", 1, Type::Enum, ".x.Color")],
    ));
    let mut c = file("c.proto", "x");
    c.dependency.push("a.proto".to_string());
    c.message_type.push(message(
        "C",
        vec![reference("color", 1, Type::Enum, ".x.Color")],
    ));

    let files = generate(request("messages", vec![a, b, c]));
    assert!(files[1].1.contains("use super::a as dependency_1;"));
    assert!(files[2].1.contains("use super::a as dependency_2;"));
    assert!(
        !files[2].1.contains("dependency_1"),
        "no alias should leak from a previous file"
    );
}

#[test]
fn test_map_field_never_emits_entry() {
    let mut m = message(
        "Inventory",
        vec![FieldDescriptorProto {
            label: Some(Label::Repeated.into()),
            ..reference("counts", 1, Type::Message, ".x.Inventory.CountsEntry")
        }],
    );
    m.nested_type
        .push(map_entry("CountsEntry", Type::String, Type::Int32));
    let mut a = file("a.proto", "x");
    a.message_type.push(m);

    let files = generate(request("messages", vec![a]));
    let (_, content) = &files[0];

    assert!(content.contains("map = \"string, int32\""));
    assert!(content.contains("::std::collections::HashMap<String, i32>"));
    assert!(!content.contains("CountsEntry"), "map entry should never be declared");
    assert!(
        !content.contains("pub mod inventory"),
        "no nested module for a message whose only nested type is a map entry"
    );
    assert_parses(content);
}

#[test]
fn test_oneof_becomes_single_variant_enum() {
    let mut m = message(
        "Payment",
        vec![
            scalar("id", 1, Type::Int64),
            FieldDescriptorProto {
                oneof_index: Some(0),
                ..scalar("card", 2, Type::String)
            },
            FieldDescriptorProto {
                oneof_index: Some(0),
                ..scalar("bank", 3, Type::String)
            },
        ],
    );
    m.oneof_decl.push(OneofDescriptorProto {
        name: Some("method".to_string()),
        ..Default::default()
    });
    let mut a = file("a.proto", "x");
    a.message_type.push(m);

    let files = generate(request("messages", vec![a]));
    let (_, content) = &files[0];

    assert!(content.contains("oneof = \"payment::Method\""));
    assert!(content.contains("tags = \"2, 3\""));
    assert!(content.contains("::core::option::Option<payment::Method>"));
    assert!(!content.contains("pub card:"), "oneof members are not independent fields");

    let parsed = assert_parses(content);
    let mut enums = Vec::new();
    find_enums(&parsed.items, "Method", &mut enums);
    assert_eq!(enums.len(), 1);
    assert_eq!(enums[0].variants.len(), 2, "one variant per member");
}

#[test]
fn test_proto3_optional_is_not_a_oneof() {
    let mut m = message(
        "Profile",
        vec![FieldDescriptorProto {
            oneof_index: Some(0),
            proto3_optional: Some(true),
            ..scalar("nickname", 1, Type::String)
        }],
    );
    m.oneof_decl.push(OneofDescriptorProto {
        name: Some("_nickname".to_string()),
        ..Default::default()
    });
    let mut a = file("a.proto", "x");
    a.message_type.push(m);

    let files = generate(request("messages", vec![a]));
    let (_, content) = &files[0];
    assert!(content.contains("pub nickname: ::core::option::Option<String>"));
    assert!(!content.contains("oneof"));
}

#[test]
fn test_field_metadata_round_trip() {
    let mut a = file("a.proto", "x");
    a.message_type.push(message(
        "Sample",
        vec![
            scalar("id", 7, Type::Int64),
            scalar("name", 3, Type::String),
            FieldDescriptorProto {
                label: Some(Label::Repeated.into()),
                ..scalar("scores", 12, Type::Sint32)
            },
            scalar("digest", 100, Type::Bytes),
        ],
    ));
    let request = request("messages", vec![a]);
    let backend = backend::lookup("messages").unwrap();
    let options = Options::parse(request.parameter.as_deref()).unwrap();

    let compiled = generator::compile(&request, backend.as_ref(), &options).unwrap();
    let layout = compiled[0]
        .declarations
        .iter()
        .find_map(|d| match &d.kind {
            DeclarationKind::Message(layout) => Some(layout),
            _ => None,
        })
        .expect("should declare a message");

    assert_eq!(layout.full_name, "x.Sample");
    let expected: Vec<(i32, &str)> = request.proto_file[0].message_type[0]
        .field
        .iter()
        .map(|f| (f.number(), protoc_gen_rust_rpc::types::kind_name(f.r#type())))
        .collect();
    let actual: Vec<(i32, &str)> = layout
        .fields
        .iter()
        .map(|f| (f.number, f.kind_name()))
        .collect();
    assert_eq!(actual, expected, "field numbers and kinds should be preserved");

    let content = &compiled[0].content;
    for (number, kind) in expected {
        assert!(content.contains(&format!("tag = \"{}\"", number)));
        assert!(content.contains(kind));
    }
    assert!(content.contains("bytes = \"vec\""));
}

#[test]
fn test_output_order_and_idempotence() {
    let mut files = Vec::new();
    for name in ["z.proto", "a.proto", "m/n.proto"] {
        let mut f = file(name, "x");
        f.message_type.push(message(
            &format!("Msg{}", files.len()),
            vec![scalar("id", 1, Type::Int32)],
        ));
        files.push(f);
    }

    let first = generate(request("tonic", files.clone()));
    let second = generate(request("tonic", files));
    let names: Vec<&str> = first.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["z.rs", "a.rs", "m/n.rs"], "should preserve input order");
    assert_eq!(first, second, "output should be byte-identical across runs");
}

#[test]
fn test_tonic_service_in_namespace() {
    let mut a = file("helloworld.proto", "helloworld");
    a.message_type.push(message(
        "HelloRequest",
        vec![scalar("name", 1, Type::String)],
    ));
    a.message_type.push(message(
        "HelloReply",
        vec![scalar("message", 1, Type::String)],
    ));
    let mut stream = method(
        "StreamHellos",
        ".helloworld.HelloRequest",
        ".helloworld.HelloReply",
    );
    stream.server_streaming = Some(true);
    a.service.push(ServiceDescriptorProto {
        name: Some("Greeter".to_string()),
        method: vec![
            method("SayHello", ".helloworld.HelloRequest", ".helloworld.HelloReply"),
            stream,
        ],
        ..Default::default()
    });

    let files = generate(request("tonic", vec![a]));
    let (_, content) = &files[0];

    assert!(content.contains("pub mod helloworld {"), "should wrap in the package");
    assert!(content.contains("pub mod greeter_client {"));
    assert!(content.contains("pub struct GreeterClient<T>"));
    assert!(content.contains("pub mod greeter_server {"));
    assert!(content.contains("pub trait Greeter:"));
    assert!(content.contains("pub struct GreeterServer<T>"));
    assert!(content.contains("\"/helloworld.Greeter/SayHello\""));
    assert!(content.contains("pub async fn say_hello("));
    assert!(content.contains("self.inner.server_streaming(req, path, codec).await"));
    assert!(content.contains("super::BoxResponseStream<super::HelloReply>"));
    assert!(content.contains("Status::unimplemented"));
    assert!(content.contains("PartialEq, super::pb_1::Message)"));
    assert!(content.contains("use super::super::grpc_1;"), "client module reaches the root alias");
    assert_eq!(
        content.matches("pub type BoxResponseStream<T>").count(),
        1,
        "shared types should be emitted once"
    );
    assert_parses(content);
}

#[test]
fn test_tonic_client_style_has_no_server() {
    let mut a = file("svc.proto", "");
    a.message_type.push(message("Ping", vec![]));
    a.service.push(ServiceDescriptorProto {
        name: Some("Health".to_string()),
        method: vec![method("Check", ".Ping", ".Ping")],
        ..Default::default()
    });

    let files = generate(CodeGeneratorRequest {
        parameter: Some("style=tonic-client,transport=false".to_string()),
        proto_file: vec![a],
        ..Default::default()
    });
    let (_, content) = &files[0];
    assert!(content.contains("pub mod health_client {"));
    assert!(!content.contains("health_server"));
    assert!(!content.contains("pub async fn connect"));
    assert_parses(content);
}

#[test]
fn test_message_style_skips_services() {
    let mut a = file("svc.proto", "x");
    a.message_type.push(message("Ping", vec![]));
    a.service.push(ServiceDescriptorProto {
        name: Some("Health".to_string()),
        method: vec![method("Check", ".x.Ping", ".x.Ping")],
        ..Default::default()
    });

    let files = generate(request("messages", vec![a]));
    let (_, content) = &files[0];
    assert!(content.contains("pub struct Ping"));
    assert!(!content.contains("health"));
    assert!(!content.contains("BoxResponseStream"));
}

#[test]
fn test_cross_file_reference_inside_namespace() {
    let mut a = file("a.proto", "x.y");
    a.enum_type.push(color_enum());
    let mut b = file("sub/b.proto", "x.z");
    b.dependency.push("a.proto".to_string());
    b.message_type.push(message(
        "Paint",
        vec![reference("color", 1, Type::Enum, ".x.y.Color")],
    ));

    let files = generate(request("tonic", vec![a, b]));
    let (_, content) = &files[1];
    assert!(content.contains("use super::super::a as dependency_1;"));
    assert!(content.contains("super::super::dependency_1::x::y::Color"));
    assert_parses(content);
}

#[test]
fn test_nested_and_recursive_messages() {
    let mut outer = message(
        "Outer",
        vec![reference("inner", 1, Type::Message, ".x.Outer.Inner")],
    );
    outer.nested_type.push(message(
        "Inner",
        vec![reference("parent", 1, Type::Message, ".x.Outer")],
    ));
    let node = message(
        "Node",
        vec![
            reference("next", 1, Type::Message, ".x.Node"),
            FieldDescriptorProto {
                label: Some(Label::Repeated.into()),
                ..reference("children", 2, Type::Message, ".x.Node")
            },
        ],
    );
    let mut a = file("a.proto", "x");
    a.message_type.push(outer);
    a.message_type.push(node);

    let files = generate(request("messages", vec![a]));
    let (_, content) = &files[0];

    assert!(content.contains("pub mod outer {"));
    assert!(content.contains("::core::option::Option<Box<outer::Inner>>"));
    assert!(content.contains("::core::option::Option<Box<super::Outer>>"));
    assert!(content.contains("::core::option::Option<Box<Node>>"));
    assert!(content.contains("pub children: Vec<Node>"), "repeated fields are not boxed");
    assert!(content.contains("const NAME: &'static str = \"Outer.Inner\";"));
    assert_parses(content);
}

#[test]
fn test_keyword_and_colliding_names() {
    let mut a = file("a.proto", "x");
    a.message_type.push(message(
        "Token",
        vec![scalar("type", 1, Type::String), scalar("self", 2, Type::Bool)],
    ));
    a.message_type.push(message("pb_1", vec![]));

    let files = generate(request("messages", vec![a]));
    let (_, content) = &files[0];
    assert!(content.contains("pub r#type: String"));
    assert!(content.contains("pub self_: bool"));
    assert!(content.contains("pub struct Pb1"));
    assert!(content.contains("use ::prost as pb_1;"));
    assert_parses(content);
}

#[test]
fn test_doc_comments_from_source_info() {
    let mut a = file("a.proto", "x");
    a.message_type.push(message("Greeting", vec![scalar("text", 1, Type::String)]));
    a.source_code_info = Some(SourceCodeInfo {
        location: vec![
            Location {
                path: vec![4, 0],
                leading_comments: Some(" A friendly greeting.\n".to_string()),
                ..Default::default()
            },
            Location {
                path: vec![4, 0, 2, 0],
                trailing_comments: Some(" What to say.\n".to_string()),
                ..Default::default()
            },
        ],
    });

    let files = generate(request("messages", vec![a]));
    let (_, content) = &files[0];
    assert!(content.contains("/// A friendly greeting."));
    assert!(content.contains("/// What to say."));
}

#[test]
fn test_file_to_generate_filters_output() {
    let mut a = file("a.proto", "x");
    a.enum_type.push(color_enum());
    let mut b = file("b.proto", "x");
    b.dependency.push("a.proto".to_string());
    b.message_type.push(message(
        "Paint",
        vec![reference("color", 1, Type::Enum, ".x.Color")],
    ));

    let mut req = request("messages", vec![a, b]);
    req.file_to_generate.push("b.proto".to_string());
    let files = generate(req);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, "b.rs");
}

#[test]
fn test_unknown_style_is_fatal() {
    let result = protoc_gen_rust_rpc::generate(request("grpc-web", vec![file("a.proto", "x")]));
    match result {
        Err(GeneratorError::UnknownBackend { style, available }) => {
            assert_eq!(style, "grpc-web");
            assert!(available.contains("tonic"));
        }
        other => panic!("expected UnknownBackend, got {:?}", other),
    }
}

#[test]
fn test_missing_style_is_fatal() {
    let result = protoc_gen_rust_rpc::generate(CodeGeneratorRequest {
        proto_file: vec![file("a.proto", "x")],
        ..Default::default()
    });
    assert!(matches!(result, Err(GeneratorError::InvalidConfig(_))));
}

#[test]
fn test_unresolved_type_is_fatal() {
    let mut a = file("a.proto", "x");
    a.message_type.push(message(
        "Broken",
        vec![reference("missing", 1, Type::Message, ".x.Nowhere")],
    ));
    let result = protoc_gen_rust_rpc::generate(request("messages", vec![a]));
    assert!(matches!(
        result,
        Err(GeneratorError::UnresolvedType { ref type_name, .. }) if type_name == ".x.Nowhere"
    ));
}

#[test]
fn test_missing_dependency_is_fatal() {
    let mut a = file("a.proto", "x");
    a.dependency.push("gone.proto".to_string());
    let result = protoc_gen_rust_rpc::generate(request("messages", vec![a]));
    assert!(matches!(result, Err(GeneratorError::MissingDependency { .. })));
}

#[test]
fn test_generate_from_bytes_rejects_garbage() {
    let result = protoc_gen_rust_rpc::generate_from_bytes(&[0xff, 0xff, 0xff]);
    assert!(matches!(result, Err(GeneratorError::DecodeError(_))));
}

/// Backend that only provides shared types
struct SharedOnly;

impl Backend for SharedOnly {
    fn name(&self) -> &'static str {
        "shared-only"
    }

    fn reserved_idents(&self) -> &'static [&'static str] {
        &["Marker"]
    }

    fn shared_interface_types(
        &self,
        _ctx: &FileContext<'_>,
    ) -> Result<Option<Vec<Declaration>>, GeneratorError> {
        Ok(Some(vec![Declaration {
            name: "Marker".to_string(),
            kind: DeclarationKind::Shared,
            tokens: quote!(pub struct Marker;),
        }]))
    }
}

#[test]
fn test_partial_backend() {
    let mut a = file("a.proto", "x");
    a.message_type.push(message("Marker", vec![]));
    a.message_type.push(message("Ping", vec![]));
    for name in ["One", "Two"] {
        a.service.push(ServiceDescriptorProto {
            name: Some(name.to_string()),
            method: vec![method("Check", ".x.Ping", ".x.Ping")],
            ..Default::default()
        });
    }
    let request = request("shared-only", vec![a]);
    let options = Options::parse(request.parameter.as_deref()).unwrap();

    let response = generator::generate_with(&request, &SharedOnly, &options).unwrap();
    let content = response.file[0].content.as_deref().unwrap();
    assert_eq!(content.matches("pub struct Marker;").count(), 1);
    assert!(content.contains("pub struct Marker2"), "schema types avoid reserved names");
    assert!(!content.contains("pub mod x"));
    assert_parses(content);
}

#[test]
fn test_proto2_field_attributes_match_prost() {
    let files = generate(CodeGeneratorRequest {
        parameter: Some("style=messages,grpc_package=prost".to_string()),
        proto_file: vec![defaults_file()],
        ..Default::default()
    });
    let (name, content) = &files[0];
    assert_eq!(name, "defaults.rs");

    assert!(
        content.contains("#[prost(message, optional, tag = \"2\")]"),
        "required message fields use `optional` so prost accepts the `Option`"
    );
    assert!(content.contains("default = \"Green\""), "enum defaults name the variant");
    assert!(content.contains("default = \"Red\""), "alias defaults name the first variant");
    assert!(content.contains("default = \"b\\\"\\\\x01ab\\\"\""));

    let generated = assert_parses(content);
    let expected = assert_parses(include_str!("fixtures/defaults.rs"));
    for name in ["Leaf", "Node"] {
        assert_eq!(
            struct_fields(&generated, name),
            struct_fields(&expected, name),
            "fields of `{}`",
            name
        );
    }
    assert_eq!(enum_variants(&generated, "Color"), enum_variants(&expected, "Color"));
    assert_eq!(enum_variants(&generated, "Choice"), enum_variants(&expected, "Choice"));
}

#[test]
fn test_required_message_keeps_required_cardinality() {
    let request = CodeGeneratorRequest {
        parameter: Some("style=messages".to_string()),
        proto_file: vec![defaults_file()],
        ..Default::default()
    };
    let backend = backend::lookup("messages").unwrap();
    let options = Options::parse(request.parameter.as_deref()).unwrap();
    let compiled = generator::compile(&request, backend.as_ref(), &options).unwrap();

    let node = compiled[0]
        .declarations
        .iter()
        .find_map(|d| match &d.kind {
            DeclarationKind::Message(layout) if layout.full_name == "fx.Node" => Some(layout),
            _ => None,
        })
        .expect("should declare Node");
    let leaf = node.fields.iter().find(|f| f.name == "leaf").unwrap();
    assert_eq!(leaf.cardinality, Cardinality::Required);
}

#[test]
fn test_generated_types_encode_and_decode() {
    use fixture::{node, Color, Leaf, Node};
    use prost::{Message, Name};

    let empty = Node::default();
    assert_eq!(empty.color(), Color::Green);
    assert_eq!(empty.shade(), Color::Red);
    assert_eq!(empty.blob(), b"\x01ab");
    assert_eq!(Leaf::default().label(), "hi");
    assert_eq!(Color::CRIMSON, Color::Red);
    assert_eq!(Color::from_str_name("CRIMSON"), Some(Color::Red));
    assert_eq!(Node::full_name(), "fx.Node");

    let mut value = Node {
        next: Some(Box::new(Node {
            leaf: Some(Leaf::default()),
            ..Default::default()
        })),
        leaf: Some(Leaf {
            label: Some("root".to_string()),
        }),
        choice: Some(node::Choice::Id(42)),
        ..Default::default()
    };
    value.counts.insert("apples".to_string(), 3);
    value.set_color(Color::CRIMSON);

    let bytes = value.encode_to_vec();
    let decoded = Node::decode(bytes.as_slice()).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(decoded.color(), Color::Red);
    assert_eq!(decoded.counts.get("apples"), Some(&3));
    assert_eq!(decoded.next.unwrap().leaf.unwrap().label(), "hi");
}

#[test]
fn test_tonic_server_routes_each_method() {
    let mut a = file("echo.proto", "x");
    a.message_type.push(message("Ping", vec![]));
    let shapes = [
        ("Unary", false, false),
        ("Watch", false, true),
        ("Upload", true, false),
        ("Chat", true, true),
    ];
    a.service.push(ServiceDescriptorProto {
        name: Some("Echo".to_string()),
        method: shapes
            .iter()
            .map(|(name, client, server)| MethodDescriptorProto {
                client_streaming: Some(*client),
                server_streaming: Some(*server),
                ..method(name, ".x.Ping", ".x.Ping")
            })
            .collect(),
        ..Default::default()
    });

    let files = generate(request("tonic", vec![a]));
    let (_, content) = &files[0];
    let flat = flatten(content);

    assert!(flat.contains("grpc_1::codegen::Service<http::Request<B>>forEchoServer<T>"));
    assert!(flat.contains("matchreq.uri().path(){"));
    for (name, _, _) in shapes {
        assert!(
            flat.contains(&format!("\"/x.Echo/{}\"=>{{", name)),
            "should route {}",
            name
        );
    }
    assert!(flat.contains("UnaryService<super::Ping>forUnarySvc<T>"));
    assert!(flat.contains("ServerStreamingService<super::Ping>forWatchSvc<T>"));
    assert!(flat.contains("ClientStreamingService<super::Ping>forUploadSvc<T>"));
    assert!(flat.contains("StreamingService<super::Ping>forChatSvc<T>"));
    assert!(flat.contains("typeResponseStream=super::BoxResponseStream<super::Ping>;"));
    for call in ["unary", "server_streaming", "client_streaming", "streaming"] {
        assert!(flat.contains(&format!("grpc.{}(method,req).await", call)));
    }
    assert!(flat.contains("<TasEcho>::upload(&inner,request).await"));
    assert!(
        flat.contains("(grpc_1::Code::Unimplementedasi32).into()"),
        "unknown paths answer unimplemented"
    );
    assert!(flat.contains("impl<T>grpc_1::server::NamedServiceforEchoServer<T>"));
    assert_parses(content);
}

#[test]
fn test_service_does_not_rename_messages() {
    let mut a = file("health.proto", "x");
    a.message_type.push(message("Health", vec![]));
    a.message_type.push(message("HealthClient", vec![]));
    a.service.push(ServiceDescriptorProto {
        name: Some("Health".to_string()),
        method: vec![method("Check", ".x.Health", ".x.Health")],
        ..Default::default()
    });

    let files = generate(request("messages", vec![a.clone()]));
    let flat = flatten(&files[0].1);
    assert!(flat.contains("pubstructHealth{}"));
    assert!(flat.contains("pubstructHealthClient{}"));
    assert!(!flat.contains("Health2"));

    let files = generate(request("tonic-client", vec![a]));
    let flat = flatten(&files[0].1);
    assert!(flat.contains("pubstructHealth{}"), "the trait lives in its own module");
    assert!(flat.contains("pubmodhealth_client{"));
    assert!(!flat.contains("health_server"));
    assert!(flat.contains("pubstructHealthClient{}"));
}
