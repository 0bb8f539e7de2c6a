// @generated by protoc-gen-rust-rpc v0.1.0. DO NOT EDIT.
// protoc: (unknown)
// source: defaults.proto

#[allow(unused_imports)]
use ::prost as pb_1;
#[allow(unused_imports)]
use ::prost as grpc_1;
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, pb_1::Enumeration)]
#[repr(i32)]
pub enum Color {
    Red = 0,
    Green = 1,
}
impl Color {
    pub const CRIMSON: Self = Self::Red;
    /// String value of the enum field names used in the ProtoBuf definition.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Green => "GREEN",
        }
    }
    /// Creates an enum from field names used in the ProtoBuf definition.
    pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
        match value {
            "RED" => Some(Self::Red),
            "GREEN" => Some(Self::Green),
            "CRIMSON" => Some(Self::Red),
            _ => None,
        }
    }
}
#[derive(Clone, PartialEq, pb_1::Message)]
pub struct Leaf {
    #[prost(string, optional, default = "hi", tag = "1")]
    pub label: ::core::option::Option<String>,
}
impl pb_1::Name for Leaf {
    const NAME: &'static str = "Leaf";
    const PACKAGE: &'static str = "fx";
    fn full_name() -> String {
        "fx.Leaf".into()
    }
    fn type_url() -> String {
        "type.googleapis.com/fx.Leaf".into()
    }
}
#[derive(Clone, PartialEq, pb_1::Message)]
pub struct Node {
    #[prost(message, optional, boxed, tag = "1")]
    pub next: ::core::option::Option<Box<Node>>,
    #[prost(message, optional, tag = "2")]
    pub leaf: ::core::option::Option<Leaf>,
    #[prost(enumeration = "Color", optional, default = "Green", tag = "3")]
    pub color: ::core::option::Option<i32>,
    #[prost(bytes = "vec", optional, default = "b\"\\x01ab\"", tag = "4")]
    pub blob: ::core::option::Option<Vec<u8>>,
    #[prost(map = "string, int32", tag = "5")]
    pub counts: ::std::collections::HashMap<String, i32>,
    #[prost(oneof = "node::Choice", tags = "6, 7")]
    pub choice: ::core::option::Option<node::Choice>,
    #[prost(enumeration = "Color", optional, default = "Red", tag = "8")]
    pub shade: ::core::option::Option<i32>,
}
impl pb_1::Name for Node {
    const NAME: &'static str = "Node";
    const PACKAGE: &'static str = "fx";
    fn full_name() -> String {
        "fx.Node".into()
    }
    fn type_url() -> String {
        "type.googleapis.com/fx.Node".into()
    }
}
/// Nested message and enum types in `Node`.
pub mod node {
    #[derive(Clone, PartialEq, super::pb_1::Oneof)]
    pub enum Choice {
        #[prost(string, tag = "6")]
        Name(String),
        #[prost(int64, tag = "7")]
        Id(i64),
    }
}
