//! Identifier legalization
//!
//! Protobuf names are converted to Rust naming conventions with `heck` and
//! escaped when they collide with Rust keywords. A [`Scope`] hands out names
//! within one Rust namespace and breaks ties deterministically: the first
//! claimant keeps the name, later claimants get the smallest free numeric
//! suffix.

use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::{Ident, Span};
use std::collections::HashSet;

/// Alias bound to the serialization runtime in every generated file
pub const RUNTIME_ALIAS: &str = "pb_1";

/// Alias bound to the RPC framework in every generated file
pub const RPC_ALIAS: &str = "grpc_1";

/// Prefix of dependency aliases (`dependency_1`, `dependency_2`, ...)
pub const DEPENDENCY_ALIAS_PREFIX: &str = "dependency_";

/// Keywords that can be used through the raw identifier syntax
const RAW_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers
const RESERVED_KEYWORDS: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Escape a Rust keyword (`type` becomes `r#type`, `self` becomes `self_`)
pub fn escape(name: &str) -> String {
    if RESERVED_KEYWORDS.contains(&name) {
        format!("{}_", name)
    } else if RAW_KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Field, method and module identifier
pub fn snake_ident(name: &str) -> String {
    let snake = name.to_snake_case();
    if snake.is_empty() {
        return "unnamed".to_string();
    }
    escape(&snake)
}

/// Type and variant identifier
pub fn camel_ident(name: &str) -> String {
    let camel = name.to_upper_camel_case();
    if camel.is_empty() {
        return "Unnamed".to_string();
    }
    escape(&camel)
}

/// Module identifier for a path component of a file name (`my-file` -> `my_file`)
pub fn path_ident(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        escape(&format!("_{}", cleaned))
    } else {
        escape(&cleaned)
    }
}

/// Turn a (possibly raw) identifier string into an [`Ident`]
pub fn ident(name: &str) -> Ident {
    match name.strip_prefix("r#") {
        Some(raw) => Ident::new_raw(raw, Span::call_site()),
        None => Ident::new(name, Span::call_site()),
    }
}

/// A set of identifiers that share one Rust namespace
#[derive(Debug, Default, Clone)]
pub struct Scope {
    taken: HashSet<String>,
    root: bool,
}

impl Scope {
    /// Scope of a generated file's root module. Runtime aliases and
    /// dependency aliases are never handed out here.
    pub fn root<'a>(reserved: impl IntoIterator<Item = &'a str>) -> Self {
        let mut scope = Scope {
            taken: HashSet::new(),
            root: true,
        };
        scope.taken.insert(RUNTIME_ALIAS.to_string());
        scope.taken.insert(RPC_ALIAS.to_string());
        scope.taken.extend(reserved.into_iter().map(str::to_string));
        scope
    }

    /// Claim `candidate` (already legalized), returning the unique name.
    pub fn claim(&mut self, candidate: String) -> String {
        let bare = candidate.strip_prefix("r#").unwrap_or(&candidate).to_string();
        if self.is_free(&bare) {
            self.taken.insert(bare);
            return candidate;
        }

        let snake = bare.contains('_') || bare.chars().all(|c| !c.is_ascii_uppercase());
        let mut n = 2;
        loop {
            let next = if snake {
                format!("{}_{}", bare.trim_end_matches('_'), n)
            } else {
                format!("{}{}", bare, n)
            };
            if self.is_free(&next) {
                self.taken.insert(next.clone());
                return next;
            }
            n += 1;
        }
    }

    fn is_free(&self, name: &str) -> bool {
        if self.taken.contains(name) {
            return false;
        }
        !(self.root && is_dependency_alias(name))
    }
}

/// Matches `dependency_<digits>`
fn is_dependency_alias(name: &str) -> bool {
    name.strip_prefix(DEPENDENCY_ALIAS_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}
