//! Declaration universe handed to the generator.
//!
//! Everything here is plain data: parsed Go type expressions, named
//! declarations with their method sets, and the package/import context the
//! rendered file lives in. Nothing in this module knows about copying.
pub mod parse;

use std::fmt;
use indexmap::IndexMap;

pub use parse::parse_type_expr;

// ————————————————————————————————————————————————————————————————————————————
// TYPE EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Named { pkg: Option<String>, name: String },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: String, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, val: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Struct(Vec<FieldDecl>),
    Func(String),        // raw signature text, never inspected
    Interface(String),   // raw method list text, never inspected
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub embedded: bool,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named { pkg: None, name: name.into() }
    }

    pub fn pointer(to: TypeExpr) -> Self {
        TypeExpr::Pointer(Box::new(to))
    }

    /// Universe lookup key: `Name` or `pkg.Name`.
    pub fn qualified_name(&self) -> Option<String> {
        match self {
            TypeExpr::Named { pkg: Some(pkg), name } => Some(format!("{pkg}.{name}")),
            TypeExpr::Named { pkg: None, name } => Some(name.clone()),
            _ => None,
        }
    }

    /// Calls `f` with every package qualifier appearing in this expression.
    pub fn visit_qualifiers(&self, f: &mut impl FnMut(&str)) {
        match self {
            TypeExpr::Named { pkg: Some(pkg), .. } => f(pkg),
            TypeExpr::Named { pkg: None, .. } => {}
            TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) => inner.visit_qualifiers(f),
            TypeExpr::Array { elem, .. } | TypeExpr::Chan { elem, .. } => elem.visit_qualifiers(f),
            TypeExpr::Map { key, val } => {
                key.visit_qualifiers(f);
                val.visit_qualifiers(f);
            }
            TypeExpr::Struct(fields) => {
                for field in fields {
                    field.ty.visit_qualifiers(f);
                }
            }
            // opaque text; the declaration author owns its imports
            TypeExpr::Func(_) | TypeExpr::Interface(_) => {}
        }
    }
}

impl FieldDecl {
    /// Field name Go assigns to an embedded field: the type's base name.
    pub fn embedded_name(ty: &TypeExpr) -> Option<String> {
        match ty {
            TypeExpr::Named { name, .. } => Some(name.clone()),
            TypeExpr::Pointer(inner) => match inner.as_ref() {
                TypeExpr::Named { name, .. } => Some(name.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(char::is_uppercase)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named { pkg: Some(pkg), name } => write!(f, "{pkg}.{name}"),
            TypeExpr::Named { pkg: None, name } => f.write_str(name),
            TypeExpr::Pointer(inner) => write!(f, "*{inner}"),
            TypeExpr::Slice(elem) => write!(f, "[]{elem}"),
            TypeExpr::Array { len, elem } => write!(f, "[{len}]{elem}"),
            TypeExpr::Map { key, val } => write!(f, "map[{key}]{val}"),
            TypeExpr::Chan { dir: ChanDir::Both, elem } => write!(f, "chan {elem}"),
            TypeExpr::Chan { dir: ChanDir::Send, elem } => write!(f, "chan<- {elem}"),
            TypeExpr::Chan { dir: ChanDir::Recv, elem } => write!(f, "<-chan {elem}"),
            TypeExpr::Struct(fields) if fields.is_empty() => f.write_str("struct{}"),
            TypeExpr::Struct(fields) => {
                f.write_str("struct{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    if field.embedded {
                        write!(f, "{}", field.ty)?;
                    } else {
                        write!(f, "{} {}", field.name, field.ty)?;
                    }
                }
                f.write_str(" }")
            }
            TypeExpr::Func(raw) | TypeExpr::Interface(raw) => f.write_str(raw),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub pointer_receiver: bool,
    pub params: Vec<TypeExpr>,
    pub results: Vec<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    pub underlying: TypeExpr,
    pub methods: Vec<MethodDecl>,
}

/// Read-only snapshot of every declaration reachable in one generation run.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub package: String,
    /// package qualifier → import path
    pub imports: IndexMap<String, String>,
    pub decls: IndexMap<String, TypeDecl>,
}

impl Universe {
    pub fn new(package: impl Into<String>) -> Self {
        Self { package: package.into(), ..Self::default() }
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.decls.get(name)
    }

    /// Adds (or replaces) a declaration.
    pub fn insert(&mut self, decl: TypeDecl) {
        self.decls.insert(decl.name.clone(), decl);
    }

    /// Builder-style helper mostly used by tests and fixtures.
    pub fn declare(mut self, name: &str, underlying: &str) -> crate::Result<Self> {
        let underlying = parse_type_expr(underlying)?;
        self.insert(TypeDecl { name: name.to_string(), underlying, methods: Vec::new() });
        Ok(self)
    }

    /// Attaches a method to an already declared type.
    pub fn with_method(mut self, type_name: &str, method: MethodDecl) -> Self {
        if let Some(decl) = self.decls.get_mut(type_name) {
            decl.methods.push(method);
        }
        self
    }
}

// ------------------------------- Tests ------------------------------------ //
