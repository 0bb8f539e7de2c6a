//! Source comments carried into generated doc attributes
//!
//! protoc attaches comments to descriptor elements through
//! `SourceCodeInfo` locations keyed by a path of field numbers and indices
//! (e.g. `[4, 0, 2, 1]` is the second field of the first message).

use proc_macro2::TokenStream;
use prost_types::FileDescriptorProto;
use quote::quote;
use std::collections::HashMap;

/// `FileDescriptorProto.message_type`
pub const FILE_MESSAGE: i32 = 4;
/// `FileDescriptorProto.enum_type`
pub const FILE_ENUM: i32 = 5;
/// `FileDescriptorProto.service`
pub const FILE_SERVICE: i32 = 6;
/// `DescriptorProto.field`
pub const MESSAGE_FIELD: i32 = 2;
/// `DescriptorProto.nested_type`
pub const MESSAGE_NESTED: i32 = 3;
/// `DescriptorProto.enum_type`
pub const MESSAGE_ENUM: i32 = 4;
/// `DescriptorProto.oneof_decl`
pub const MESSAGE_ONEOF: i32 = 8;
/// `EnumDescriptorProto.value`
pub const ENUM_VALUE: i32 = 2;
/// `ServiceDescriptorProto.method`
pub const SERVICE_METHOD: i32 = 2;

/// Comments of one file, indexed by location path
#[derive(Debug, Default)]
pub struct Comments {
    by_path: HashMap<Vec<i32>, String>,
}

impl Comments {
    /// Index the leading (or, failing that, trailing) comments of a file
    pub fn from_file(file: &FileDescriptorProto) -> Self {
        let mut by_path = HashMap::new();
        if let Some(info) = &file.source_code_info {
            for location in &info.location {
                let text = location
                    .leading_comments
                    .as_deref()
                    .or(location.trailing_comments.as_deref())
                    .map(str::trim_end)
                    .unwrap_or_default();
                if !text.is_empty() {
                    by_path.insert(location.path.clone(), text.to_string());
                }
            }
        }
        Comments { by_path }
    }

    /// `#[doc = "..."]` attributes for the element at `path`
    pub fn doc_attrs(&self, path: &[i32]) -> TokenStream {
        match self.by_path.get(path) {
            Some(text) => doc_lines(text),
            None => TokenStream::new(),
        }
    }
}

/// Render each line of `text` as a doc attribute
pub fn doc_lines(text: &str) -> TokenStream {
    let lines = text.lines().map(|line| {
        let line = if line.is_empty() || line.starts_with(' ') {
            line.to_string()
        } else {
            format!(" {}", line)
        };
        quote!(#[doc = #line])
    });
    quote!(#(#lines)*)
}

/// Extend a location path with a child field number and index
pub fn child_path(parent: &[i32], field: i32, index: usize) -> Vec<i32> {
    let mut path = Vec::with_capacity(parent.len() + 2);
    path.extend_from_slice(parent);
    path.push(field);
    path.push(index as i32);
    path
}
