//! Symbol and dependency resolution
//!
//! [`SymbolTable`] is built once per run over every file in the request and
//! records where each fully-qualified protobuf type lives in the generated
//! module tree. [`resolve`] builds the per-file [`DependencyMap`] binding each
//! imported file to a fresh `dependency_N` alias.

use crate::codegen::oneof::is_synthetic_oneof;
use crate::names::{camel_ident, path_ident, snake_ident, Scope, DEPENDENCY_ALIAS_PREFIX};
use crate::GeneratorError;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto};
use std::collections::{HashMap, HashSet, VecDeque};

/// Legalized names of a generated message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNames {
    /// Struct identifier
    pub ident: String,
    /// Identifier of the module holding nested types and oneofs
    pub module: String,
    /// Oneof enum identifiers by oneof index, `None` for synthetic oneofs
    pub oneofs: Vec<Option<String>>,
}

/// Per-service modules a backend declares at the root of a generated file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceModules {
    /// `<service>_client`
    pub client: bool,
    /// `<service>_server`
    pub server: bool,
}

/// Legalized names of a service's generated declarations.
///
/// Only the modules the backend declares claim a name in the file-root
/// scope; the others are legalized but never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNames {
    /// Service identifier (server trait name, declared inside its module)
    pub ident: String,
    /// Client module identifier
    pub client_module: String,
    /// Server module identifier
    pub server_module: String,
}

/// What a fully-qualified name refers to
#[derive(Debug, Clone)]
pub enum TypeKind<'a> {
    /// A message, including synthetic map entries
    Message {
        /// The descriptor
        descriptor: &'a DescriptorProto,
        /// Generated names
        names: MessageNames,
    },
    /// An enum
    Enum(&'a EnumDescriptorProto),
}

/// A type known to the symbol table
#[derive(Debug, Clone)]
pub struct TypeEntry<'a> {
    /// Name of the defining file
    pub file: &'a str,
    /// Rust path inside the defining file (modules then type ident), excluding
    /// the package namespace
    pub path: Vec<String>,
    /// Descriptor and names
    pub kind: TypeKind<'a>,
}

impl TypeEntry<'_> {
    /// Whether this is a synthetic map entry message
    pub fn is_map_entry(&self) -> bool {
        matches!(self.kind, TypeKind::Message { descriptor, .. } if is_map_entry(descriptor))
    }
}

/// A file known to the symbol table
#[derive(Debug, Clone)]
pub struct FileEntry<'a> {
    /// The descriptor
    pub descriptor: &'a FileDescriptorProto,
    /// Module path the file's declarations are wrapped in (empty when unwrapped)
    pub namespace: Vec<String>,
    /// Names for each service, in declaration order
    pub services: Vec<ServiceNames>,
}

/// Every type of every file in the request, keyed by fully-qualified name
#[derive(Debug, Default)]
pub struct SymbolTable<'a> {
    files: HashMap<&'a str, FileEntry<'a>>,
    types: HashMap<String, TypeEntry<'a>>,
}

impl<'a> SymbolTable<'a> {
    /// Walk every file's enum and message tree.
    ///
    /// `reserved` are identifiers the backend declares at the file root and
    /// `modules` the per-service modules it declares there; `wraps` reports
    /// whether a file's declarations are nested in its package namespace.
    pub fn build(
        files: &'a [FileDescriptorProto],
        reserved: &[&str],
        modules: ServiceModules,
        wraps: impl Fn(&FileDescriptorProto) -> bool,
    ) -> Result<Self, GeneratorError> {
        let mut table = SymbolTable::default();
        for file in files {
            table.add_file(file, reserved, modules, wraps(file))?;
        }
        tracing::debug!(files = table.files.len(), types = table.types.len(), "symbol table built");
        Ok(table)
    }

    fn add_file(
        &mut self,
        file: &'a FileDescriptorProto,
        reserved: &[&str],
        modules: ServiceModules,
        wrapped: bool,
    ) -> Result<(), GeneratorError> {
        let name = file.name();
        if self.files.contains_key(name) {
            return Err(GeneratorError::MalformedDescriptor(format!(
                "file `{}` appears more than once",
                name
            )));
        }

        let package = file.package();
        let prefix = if package.is_empty() {
            String::new()
        } else {
            format!(".{}", package)
        };

        let mut scope = Scope::root(reserved.iter().copied());
        let services = file
            .service
            .iter()
            .map(|service| {
                let mut module = |declared: bool, suffix: &str| {
                    let name = snake_ident(&format!("{}_{}", service.name(), suffix));
                    if declared {
                        scope.claim(name)
                    } else {
                        name
                    }
                };
                ServiceNames {
                    ident: camel_ident(service.name()),
                    client_module: module(modules.client, "client"),
                    server_module: module(modules.server, "server"),
                }
            })
            .collect();

        for enum_desc in &file.enum_type {
            let ident = scope.claim(camel_ident(enum_desc.name()));
            self.insert(
                format!("{}.{}", prefix, enum_desc.name()),
                TypeEntry {
                    file: name,
                    path: vec![ident],
                    kind: TypeKind::Enum(enum_desc),
                },
            )?;
        }

        for message in &file.message_type {
            self.add_message(name, &prefix, &[], message, &mut scope)?;
        }

        let namespace = if wrapped && !package.is_empty() {
            namespace_idents(package)
        } else {
            Vec::new()
        };

        self.files.insert(
            name,
            FileEntry {
                descriptor: file,
                namespace,
                services,
            },
        );
        Ok(())
    }

    fn add_message(
        &mut self,
        file: &'a str,
        parent: &str,
        modules: &[String],
        message: &'a DescriptorProto,
        scope: &mut Scope,
    ) -> Result<(), GeneratorError> {
        let fqn = format!("{}.{}", parent, message.name());

        // Map entries are never emitted, so they do not claim names
        let (ident, module) = if is_map_entry(message) {
            (camel_ident(message.name()), snake_ident(message.name()))
        } else {
            (
                scope.claim(camel_ident(message.name())),
                scope.claim(snake_ident(message.name())),
            )
        };

        let mut child_modules = modules.to_vec();
        child_modules.push(module.clone());
        let mut child = Scope::default();

        for enum_desc in &message.enum_type {
            let enum_ident = child.claim(camel_ident(enum_desc.name()));
            let mut path = child_modules.clone();
            path.push(enum_ident);
            self.insert(
                format!("{}.{}", fqn, enum_desc.name()),
                TypeEntry {
                    file,
                    path,
                    kind: TypeKind::Enum(enum_desc),
                },
            )?;
        }

        for nested in &message.nested_type {
            self.add_message(file, &fqn, &child_modules, nested, &mut child)?;
        }

        let oneofs = message
            .oneof_decl
            .iter()
            .enumerate()
            .map(|(index, oneof)| {
                if is_synthetic_oneof(message, index) {
                    None
                } else {
                    Some(child.claim(camel_ident(oneof.name())))
                }
            })
            .collect();

        let mut path = modules.to_vec();
        path.push(ident.clone());
        self.insert(
            fqn,
            TypeEntry {
                file,
                path,
                kind: TypeKind::Message {
                    descriptor: message,
                    names: MessageNames {
                        ident,
                        module,
                        oneofs,
                    },
                },
            },
        )
    }

    fn insert(&mut self, fqn: String, entry: TypeEntry<'a>) -> Result<(), GeneratorError> {
        if let Some(existing) = self.types.get(&fqn) {
            return Err(GeneratorError::MalformedDescriptor(format!(
                "type `{}` is defined in both `{}` and `{}`",
                fqn, existing.file, entry.file
            )));
        }
        self.types.insert(fqn, entry);
        Ok(())
    }

    /// Look up a type by fully-qualified name (leading dot optional)
    pub fn lookup(&self, type_name: &str) -> Option<&TypeEntry<'a>> {
        if type_name.starts_with('.') {
            self.types.get(type_name)
        } else {
            self.types.get(&format!(".{}", type_name))
        }
    }

    /// Look up a file by name
    pub fn file(&self, name: &str) -> Option<&FileEntry<'a>> {
        self.files.get(name)
    }

    /// Generated names of a message
    pub fn message_names(&self, type_name: &str) -> Option<&MessageNames> {
        match &self.lookup(type_name)?.kind {
            TypeKind::Message { names, .. } => Some(names),
            TypeKind::Enum(_) => None,
        }
    }

    /// Whether a value of `target` would contain a `container` by value
    /// through singular message fields. Such fields must be boxed.
    pub fn is_recursive(&self, target: &str, container: &str) -> bool {
        let container = normalize(container);
        let mut stack = vec![normalize(target)];
        let mut seen = HashSet::new();

        while let Some(current) = stack.pop() {
            if current == container {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(TypeEntry {
                kind: TypeKind::Message { descriptor, .. },
                ..
            }) = self.types.get(&current)
            {
                for field in &descriptor.field {
                    if field.label() == Label::Repeated {
                        continue;
                    }
                    if matches!(field.r#type(), Type::Message | Type::Group) {
                        stack.push(normalize(field.type_name()));
                    }
                }
            }
        }
        false
    }
}

fn normalize(type_name: &str) -> String {
    if type_name.starts_with('.') {
        type_name.to_string()
    } else {
        format!(".{}", type_name)
    }
}

/// Whether a message is the synthetic entry type of a `map<K, V>` field
pub fn is_map_entry(message: &DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .and_then(|o| o.map_entry)
        .unwrap_or(false)
}

/// Module idents of a package namespace (`foo.bar_v1` -> `["foo", "bar_v1"]`)
pub fn namespace_idents(package: &str) -> Vec<String> {
    let mut root = Scope::root(std::iter::empty());
    package
        .split('.')
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .map(|(i, segment)| {
            if i == 0 {
                root.claim(snake_ident(segment))
            } else {
                snake_ident(segment)
            }
        })
        .collect()
}

/// Hands out `dependency_N` aliases, unique for the whole run
#[derive(Debug, Default)]
pub struct AliasAllocator {
    next: usize,
}

impl AliasAllocator {
    /// A fresh alias
    pub fn allocate(&mut self) -> String {
        self.next += 1;
        format!("{}{}", DEPENDENCY_ALIAS_PREFIX, self.next)
    }
}

/// One dependency import of a generated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyImport {
    /// Name of the imported schema file
    pub file: String,
    /// Alias the generated file binds the import to
    pub alias: String,
}

/// Per-file map from imported schema file to its local alias, in import order
#[derive(Debug, Default, Clone)]
pub struct DependencyMap {
    imports: Vec<DependencyImport>,
}

impl DependencyMap {
    /// Alias bound to `file`, if imported
    pub fn alias_for(&self, file: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|import| import.file == file)
            .map(|import| import.alias.as_str())
    }

    /// Imports in emission order
    pub fn imports(&self) -> &[DependencyImport] {
        &self.imports
    }

    fn bind(&mut self, file: &str, allocator: &mut AliasAllocator) {
        let alias = allocator.allocate();
        tracing::debug!(dependency = file, alias = %alias, "bound dependency alias");
        self.imports.push(DependencyImport {
            file: file.to_string(),
            alias,
        });
    }
}

/// Allocate aliases for the dependencies of `file`.
///
/// Declared dependencies come first, in declared order, followed by files
/// re-exported through `import public` chains of those dependencies.
pub fn resolve(
    symbols: &SymbolTable<'_>,
    file: &FileDescriptorProto,
    allocator: &mut AliasAllocator,
) -> Result<DependencyMap, GeneratorError> {
    let mut map = DependencyMap::default();
    let missing = |dependency: &str| GeneratorError::MissingDependency {
        file: file.name().to_string(),
        dependency: dependency.to_string(),
    };

    for dependency in &file.dependency {
        if symbols.file(dependency).is_none() {
            return Err(missing(dependency));
        }
        if map.alias_for(dependency).is_none() {
            map.bind(dependency, allocator);
        }
    }

    let mut queue: VecDeque<String> = file.dependency.iter().cloned().collect();
    let mut visited = HashSet::new();
    while let Some(dependency) = queue.pop_front() {
        if !visited.insert(dependency.clone()) {
            continue;
        }
        let entry = symbols.file(&dependency).ok_or_else(|| missing(&dependency))?;
        for &index in &entry.descriptor.public_dependency {
            let public = usize::try_from(index)
                .ok()
                .and_then(|i| entry.descriptor.dependency.get(i))
                .ok_or_else(|| {
                    GeneratorError::MalformedDescriptor(format!(
                        "{}: public dependency index {} out of range",
                        dependency, index
                    ))
                })?;
            if symbols.file(public).is_none() {
                return Err(missing(public));
            }
            if public != file.name() && map.alias_for(public).is_none() {
                map.bind(public, allocator);
            }
            queue.push_back(public.clone());
        }
    }

    Ok(map)
}

/// Split a schema file name into directories and module stem
fn split_file(name: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
    let file = parts.pop().unwrap_or(name);
    let stem = file
        .strip_suffix(".proto")
        .or_else(|| file.rsplit_once('.').map(|(stem, _)| stem))
        .unwrap_or(file);
    (parts, stem)
}

/// Rust module path from the generated module of `from` to that of `to`.
///
/// Generated files are expected to be mounted as a module tree mirroring the
/// output directories, so `foo/b.proto` importing `bar/a.proto` yields
/// `super::super::bar::a`.
pub fn relative_module_path(from: &str, to: &str) -> Vec<String> {
    let (from_dirs, _) = split_file(from);
    let (to_dirs, to_stem) = split_file(to);
    let common = from_dirs
        .iter()
        .zip(&to_dirs)
        .take_while(|(a, b)| a == b)
        .count();

    let mut path = vec!["super".to_string()];
    path.extend(std::iter::repeat("super".to_string()).take(from_dirs.len() - common));
    path.extend(to_dirs[common..].iter().map(|dir| path_ident(dir)));
    path.push(path_ident(to_stem));
    path
}
