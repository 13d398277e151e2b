//! Self-copy method detection.
//!
//! A type whose author already wrote a deep-copy method owns the correctness
//! of its own subtree: the engine calls that method and never looks inside.
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{MethodDecl, TypeDecl, TypeExpr, Universe};

/// How to call a type's own copy method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegate {
    pub method: String,
    /// Method returns `*T` rather than `T`.
    pub returns_pointer: bool,
    /// The type's zero value is `nil`, so value positions need a guard too.
    pub nilable: bool,
}

/// Looks for a method `method() T` or `method() *T` on `decl` itself.
/// Methods promoted from embedded fields are deliberately not considered.
pub fn self_copy_method(universe: &Universe, decl: &TypeDecl, method: &str) -> Result<Option<Delegate>> {
    let matches: Vec<(&MethodDecl, bool)> = decl
        .methods
        .iter()
        .filter(|m| m.name == method)
        .filter_map(|m| match returns_self(decl, m) {
            Some(returns_pointer) => Some((m, returns_pointer)),
            None => {
                tracing::debug!(
                    type_name = %decl.name,
                    method = %m.name,
                    "method name matches but signature does not; not delegating"
                );
                None
            }
        })
        .collect();

    match matches.as_slice() {
        [] => Ok(None),
        [(_, returns_pointer)] => Ok(Some(Delegate {
            method: method.to_string(),
            returns_pointer: *returns_pointer,
            nilable: is_nilable(universe, &decl.underlying),
        })),
        many => Err(Error::AmbiguousDelegate {
            type_name: decl.name.clone(),
            name: decl.name.clone(),
            path: "<self>".to_string(),
            method: method.to_string(),
            count: many.len(),
        }),
    }
}

/// `Some(returns_pointer)` when `m` has no params and returns `T` or `*T`.
fn returns_self(decl: &TypeDecl, m: &MethodDecl) -> Option<bool> {
    if !m.params.is_empty() {
        return None;
    }
    let [result] = m.results.as_slice() else {
        return None;
    };
    match result {
        TypeExpr::Pointer(inner) if names_decl(decl, inner) => Some(true),
        other if names_decl(decl, other) => Some(false),
        _ => None,
    }
}

fn names_decl(decl: &TypeDecl, ty: &TypeExpr) -> bool {
    match ty {
        TypeExpr::Named { pkg: None, name } => {
            // methods of `pkg.T` declared from inside `pkg` spell the result as `T`
            *name == decl.name || decl.name.rsplit_once('.').is_some_and(|(_, base)| base == name)
        }
        TypeExpr::Named { .. } => ty.qualified_name().as_deref() == Some(decl.name.as_str()),
        _ => false,
    }
}

pub fn is_nilable(universe: &Universe, ty: &TypeExpr) -> bool {
    let mut ty = ty;
    // named-to-named chains are finite in valid Go; the bound only guards bad input
    for _ in 0..64 {
        match ty {
            TypeExpr::Pointer(_)
            | TypeExpr::Slice(_)
            | TypeExpr::Map { .. }
            | TypeExpr::Chan { .. }
            | TypeExpr::Func(_)
            | TypeExpr::Interface(_) => return true,
            TypeExpr::Array { .. } | TypeExpr::Struct(_) => return false,
            TypeExpr::Named { .. } => {
                let Some(name) = ty.qualified_name() else { return false };
                match universe.get(&name) {
                    Some(decl) => ty = &decl.underlying,
                    None => return matches!(name.as_str(), "error" | "any" | "unsafe.Pointer"),
                }
            }
        }
    }
    false
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfCopy {
    Delegate(Delegate),
    /// More than one qualifying method; fatal once reached.
    Ambiguous(usize),
}

/// Immutable per-run snapshot of which named types copy themselves.
///
/// Requested types are registered too, with the signature about to be
/// generated for them, so references between requested types (including a
/// type referring to itself) become calls to the generated methods.
#[derive(Debug, Clone)]
pub struct SelfCopyRegistry {
    method: String,
    entries: HashMap<String, SelfCopy>,
}

impl Default for SelfCopyRegistry {
    fn default() -> Self {
        Self { method: crate::DEFAULT_METHOD.to_string(), entries: HashMap::new() }
    }
}

impl SelfCopyRegistry {
    pub fn build(universe: &Universe, method: &str, requested: &[String], pointer_receiver: bool) -> Self {
        let mut entries = HashMap::new();
        for (name, decl) in &universe.decls {
            match self_copy_method(universe, decl, method) {
                Ok(Some(delegate)) => {
                    entries.insert(name.clone(), SelfCopy::Delegate(delegate));
                }
                Ok(None) => {}
                Err(Error::AmbiguousDelegate { count, .. }) => {
                    entries.insert(name.clone(), SelfCopy::Ambiguous(count));
                }
                Err(_) => {}
            }
        }
        for name in requested {
            let Some(decl) = universe.get(name) else { continue };
            let delegate = Delegate {
                method: method.to_string(),
                returns_pointer: pointer_receiver,
                nilable: is_nilable(universe, &decl.underlying),
            };
            if let Some(SelfCopy::Delegate(existing)) = entries.get(name) {
                if *existing != delegate {
                    tracing::debug!(type_name = %name, "requested type replaces its existing copy method");
                }
            }
            entries.insert(name.clone(), SelfCopy::Delegate(delegate));
        }
        tracing::debug!(count = entries.len(), "self-copying types registered");
        Self { method: method.to_string(), entries }
    }

    /// Name of the self-copy contract this snapshot was built for.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn lookup(&self, name: &str) -> Option<&SelfCopy> {
        self.entries.get(name)
    }
}

// ------------------------------- Tests ------------------------------------ //
