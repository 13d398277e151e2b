//! Kind classifier: declared Go type → copy shape.
//!
//! Shapes are what the synthesis engine walks. They are already normalized:
//! a struct or array with nothing to correct collapses to `Scalar`, so the
//! engine never has to look ahead to avoid emitting dead code. Named types
//! are resolved through the universe with memoization and cycle detection;
//! any named type found in the self-copy registry stops resolution right
//! there.
use std::collections::{HashMap, HashSet};

use crate::delegate::{Delegate, SelfCopy, SelfCopyRegistry};
use crate::error::{Error, Result};
use crate::skip::SkipPath;
use crate::types::{TypeDecl, TypeExpr, Universe};

#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    /// Copied correctly by plain assignment.
    Scalar,
    Pointer { elem_ty: TypeExpr, to: Box<TypeShape> },
    Slice { ty: TypeExpr, elem: Box<TypeShape> },
    /// Fixed array whose elements need correcting (otherwise `Scalar`).
    Array { elem: Box<TypeShape> },
    Map { ty: TypeExpr, val_ty: TypeExpr, val: Box<TypeShape> },
    Struct { fields: Vec<FieldShape> },
    Channel { ty: TypeExpr },
    SelfCopying(Delegate),
    /// Left aliased.
    Opaque(OpaqueKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    Func,
    Interface,
    UnsafePointer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    pub name: String,
    pub shape: TypeShape,
    pub exported: bool,
}

impl TypeShape {
    /// Whether the baseline shallow copy leaves anything shared.
    pub fn needs_correction(&self) -> bool {
        match self {
            TypeShape::Scalar | TypeShape::Opaque(_) => false,
            TypeShape::Struct { fields } => fields.iter().any(|f| f.shape.needs_correction()),
            TypeShape::Array { elem } => elem.needs_correction(),
            TypeShape::Pointer { .. }
            | TypeShape::Slice { .. }
            | TypeShape::Map { .. }
            | TypeShape::Channel { .. }
            | TypeShape::SelfCopying(_) => true,
        }
    }

    /// Sets the type written in `make(...)` for containers.
    fn relabel(self, named: &TypeExpr) -> Self {
        match self {
            TypeShape::Slice { elem, .. } => TypeShape::Slice { ty: named.clone(), elem },
            TypeShape::Map { val_ty, val, .. } => TypeShape::Map { ty: named.clone(), val_ty, val },
            TypeShape::Channel { .. } => TypeShape::Channel { ty: named.clone() },
            other => other,
        }
    }
}

const SCALARS: &[&str] = &[
    "bool", "string", "byte", "rune", "uintptr",
    "int", "int8", "int16", "int32", "int64",
    "uint", "uint8", "uint16", "uint32", "uint64",
    "float32", "float64", "complex64", "complex128",
];

fn builtin(name: &str) -> Option<TypeShape> {
    match name {
        "error" | "any" => Some(TypeShape::Opaque(OpaqueKind::Interface)),
        "unsafe.Pointer" => Some(TypeShape::Opaque(OpaqueKind::UnsafePointer)),
        _ if SCALARS.contains(&name) => Some(TypeShape::Scalar),
        _ => None,
    }
}

/// Per-synthesis classifier. Owns its cache; shares only read-only inputs.
pub struct Classifier<'a> {
    universe: &'a Universe,
    registry: &'a SelfCopyRegistry,
    type_name: &'a str,
    cache: HashMap<String, TypeShape>,
    /// Named types currently being resolved, outermost first.
    resolving: Vec<String>,
}

impl<'a> Classifier<'a> {
    pub fn new(universe: &'a Universe, registry: &'a SelfCopyRegistry, type_name: &'a str) -> Self {
        Self {
            universe,
            registry,
            type_name,
            cache: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    /// Classifies a requested type by its own structure. Its registry entry
    /// (if any) is the method being generated, so it is not consulted here.
    pub fn classify_decl(&mut self, decl: &TypeDecl) -> Result<TypeShape> {
        let root = SkipPath::root();
        self.resolving.push(decl.name.clone());
        let shape = self.resolve_underlying(decl, &root);
        self.resolving.pop();
        // `make` must produce the receiver's own type (or an untyped literal
        // assignable to it), never an intermediate named type
        let shape = shape?.relabel(&self.literal_underlying(decl));

        let reason = match &shape {
            TypeShape::Pointer { .. } => "methods cannot be declared on named pointer types",
            TypeShape::Opaque(OpaqueKind::Func) => "function types cannot be copied",
            TypeShape::Opaque(_) => "interface types have no static structure to copy",
            _ => return Ok(shape),
        };
        Err(self.unsupported(&root, reason))
    }

    /// Follows `type A B` chains down to the first non-named type expression.
    fn literal_underlying(&self, decl: &TypeDecl) -> TypeExpr {
        let mut ty = &decl.underlying;
        // a named cycle has already failed classification by now
        for _ in 0..64 {
            let Some(next) = ty.qualified_name().and_then(|name| self.universe.get(&name)) else { break };
            ty = &next.underlying;
        }
        ty.clone()
    }

    pub fn classify(&mut self, ty: &TypeExpr, path: &SkipPath) -> Result<TypeShape> {
        match ty {
            TypeExpr::Named { .. } => self.classify_named(ty, path, true),
            TypeExpr::Pointer(inner) => Ok(TypeShape::Pointer {
                elem_ty: inner.as_ref().clone(),
                to: Box::new(self.classify(inner, path)?),
            }),
            TypeExpr::Slice(elem) => Ok(TypeShape::Slice {
                ty: ty.clone(),
                elem: Box::new(self.classify(elem, &path.elem())?),
            }),
            TypeExpr::Array { elem, .. } => {
                let elem = self.classify(elem, &path.elem())?;
                if elem.needs_correction() {
                    Ok(TypeShape::Array { elem: Box::new(elem) })
                } else {
                    Ok(TypeShape::Scalar)
                }
            }
            TypeExpr::Map { key, val } => {
                if !self.comparable(key, &mut HashSet::new()) {
                    return Err(self.unsupported(path, &format!("map key type `{key}` is not comparable")));
                }
                Ok(TypeShape::Map {
                    ty: ty.clone(),
                    val_ty: val.as_ref().clone(),
                    val: Box::new(self.classify(val, &path.value())?),
                })
            }
            TypeExpr::Chan { .. } => Ok(TypeShape::Channel { ty: ty.clone() }),
            TypeExpr::Struct(decls) => {
                let mut fields = Vec::with_capacity(decls.len());
                for field in decls {
                    // blank fields cannot be selected, so there is nothing to correct
                    let shape = if field.name == "_" {
                        TypeShape::Scalar
                    } else {
                        self.classify(&field.ty, &path.field(&field.name))?
                    };
                    fields.push(FieldShape {
                        exported: field.is_exported(),
                        name: field.name.clone(),
                        shape,
                    });
                }
                if fields.iter().any(|f| f.shape.needs_correction()) {
                    Ok(TypeShape::Struct { fields })
                } else {
                    Ok(TypeShape::Scalar)
                }
            }
            TypeExpr::Func(_) => Ok(TypeShape::Opaque(OpaqueKind::Func)),
            TypeExpr::Interface(_) => Ok(TypeShape::Opaque(OpaqueKind::Interface)),
        }
    }

    fn classify_named(&mut self, ty: &TypeExpr, path: &SkipPath, delegate_ok: bool) -> Result<TypeShape> {
        let Some(name) = ty.qualified_name() else {
            return self.classify(ty, path);
        };

        if delegate_ok {
            match self.registry.lookup(&name) {
                Some(SelfCopy::Delegate(delegate)) => return Ok(TypeShape::SelfCopying(delegate.clone())),
                Some(SelfCopy::Ambiguous(count)) => {
                    return Err(Error::AmbiguousDelegate {
                        type_name: self.type_name.to_string(),
                        name,
                        path: display_path(path),
                        method: self.registry.method().to_string(),
                        count: *count,
                    })
                }
                None => {}
            }
        }

        let Some(decl) = self.universe.get(&name) else {
            return builtin(&name).ok_or_else(|| Error::UnknownType {
                type_name: self.type_name.to_string(),
                name: name.clone(),
                path: display_path(path),
            });
        };

        if let Some(shape) = self.cache.get(&name) {
            return Ok(shape.clone());
        }
        if let Some(start) = self.resolving.iter().position(|n| *n == name) {
            let mut cycle = self.resolving[start..].to_vec();
            cycle.push(name);
            return Err(Error::CyclicType {
                type_name: self.type_name.to_string(),
                path: display_path(path),
                cycle: cycle.join(" -> "),
            });
        }

        self.resolving.push(name.clone());
        let shape = self.resolve_underlying(decl, path);
        self.resolving.pop();
        let shape = shape?.relabel(ty);

        self.check_foreign_fields(decl, &shape, path)?;
        self.cache.insert(name, shape.clone());
        Ok(shape)
    }

    /// `type A B` does not inherit B's methods, so B is taken structurally.
    fn resolve_underlying(&mut self, decl: &TypeDecl, path: &SkipPath) -> Result<TypeShape> {
        match &decl.underlying {
            named @ TypeExpr::Named { .. } => self.classify_named(named, path, false),
            other => self.classify(other, path),
        }
    }

    /// Corrections are written as field selectors in the generated package,
    /// which cannot reach unexported fields of another package's struct.
    fn check_foreign_fields(&self, decl: &TypeDecl, shape: &TypeShape, path: &SkipPath) -> Result<()> {
        if !decl.name.contains('.') {
            return Ok(());
        }
        let TypeShape::Struct { fields } = shape else {
            return Ok(());
        };
        match fields.iter().find(|f| !f.exported && f.shape.needs_correction()) {
            Some(field) => Err(self.unsupported(
                &path.field(&field.name),
                &format!(
                    "unexported field of `{}` needs a deep copy but is not visible from package `{}`",
                    decl.name, self.universe.package
                ),
            )),
            None => Ok(()),
        }
    }

    fn comparable(&self, ty: &TypeExpr, seen: &mut HashSet<String>) -> bool {
        match ty {
            TypeExpr::Slice(_) | TypeExpr::Map { .. } | TypeExpr::Func(_) => false,
            TypeExpr::Pointer(_) | TypeExpr::Chan { .. } | TypeExpr::Interface(_) => true,
            TypeExpr::Array { elem, .. } => self.comparable(elem, seen),
            TypeExpr::Struct(fields) => fields.iter().all(|f| self.comparable(&f.ty, seen)),
            TypeExpr::Named { .. } => {
                let Some(name) = ty.qualified_name() else { return true };
                if !seen.insert(name.clone()) {
                    return true;
                }
                match self.universe.get(&name) {
                    Some(decl) => self.comparable(&decl.underlying, seen),
                    None => true,
                }
            }
        }
    }

    fn unsupported(&self, path: &SkipPath, reason: &str) -> Error {
        Error::UnsupportedShape {
            type_name: self.type_name.to_string(),
            path: display_path(path),
            reason: reason.to_string(),
        }
    }
}

pub(crate) fn display_path(path: &SkipPath) -> String {
    if path.is_root() { "<self>".to_string() } else { path.to_string() }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_type_expr, MethodDecl};
    use pretty_assertions::assert_eq;

    fn universe() -> Universe {
        Universe::new("testdata")
            .declare("Bar", "struct{ Slice []string }").unwrap()
            .declare("Baz", "struct{ String string; StringPointer *string }").unwrap()
            .declare("Plain", "struct{ a int; b [3]string; c struct{ d float64 } }").unwrap()
            .declare("Callbacks", "struct{ f func(); e error }").unwrap()
            .declare("Node", "struct{ Next *Node; Val int }").unwrap()
            .declare("Ring", "struct{ Peer *Link }").unwrap()
            .declare("Link", "struct{ Back []Ring }").unwrap()
            .declare("Names", "[]string").unwrap()
            .declare("Alias", "Bar").unwrap()
            .declare("Gamma", "struct{ p *int }").unwrap()
            .declare("Keyed", "map[Bar]int").unwrap()
    }

    fn classify(u: &Universe, registry: &SelfCopyRegistry, ty: &str) -> Result<TypeShape> {
        Classifier::new(u, registry, "Test").classify(&parse_type_expr(ty).unwrap(), &SkipPath::root())
    }

    #[test]
    fn value_only_structs_collapse_to_scalar() {
        let u = universe();
        let registry = SelfCopyRegistry::default();
        assert_eq!(classify(&u, &registry, "Plain").unwrap(), TypeShape::Scalar);
        assert_eq!(classify(&u, &registry, "[4]Plain").unwrap(), TypeShape::Scalar);
        assert_eq!(classify(&u, &registry, "Callbacks").unwrap(), TypeShape::Scalar);
    }

    #[test]
    fn nested_pointer_keeps_struct_shape() {
        let u = universe();
        let shape = classify(&u, &SelfCopyRegistry::default(), "Baz").unwrap();
        let TypeShape::Struct { fields } = shape else { panic!("expected struct") };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].shape, TypeShape::Scalar);
        assert!(matches!(fields[1].shape, TypeShape::Pointer { .. }));
    }

    #[test]
    fn named_containers_keep_their_name() {
        let u = universe();
        let shape = classify(&u, &SelfCopyRegistry::default(), "Names").unwrap();
        assert_eq!(
            shape,
            TypeShape::Slice { ty: TypeExpr::named("Names"), elem: Box::new(TypeShape::Scalar) }
        );
    }

    #[test]
    fn delegation_wins_over_structure() {
        let u = universe().with_method(
            "Gamma",
            MethodDecl { name: "DeepCopy".into(), pointer_receiver: false, params: vec![], results: vec![TypeExpr::named("Gamma")] },
        );
        let registry = SelfCopyRegistry::build(&u, "DeepCopy", &[], false);
        let shape = classify(&u, &registry, "*Gamma").unwrap();
        let TypeShape::Pointer { to, .. } = shape else { panic!("expected pointer") };
        assert!(matches!(*to, TypeShape::SelfCopying(_)));
    }

    #[test]
    fn delegation_is_not_inherited_through_type_definitions() {
        let u = universe().with_method(
            "Bar",
            MethodDecl { name: "DeepCopy".into(), pointer_receiver: false, params: vec![], results: vec![TypeExpr::named("Bar")] },
        );
        let registry = SelfCopyRegistry::build(&u, "DeepCopy", &[], false);
        assert!(matches!(classify(&u, &registry, "Alias").unwrap(), TypeShape::Struct { .. }));
        assert!(matches!(classify(&u, &registry, "Bar").unwrap(), TypeShape::SelfCopying(_)));

        // requested directly, `Alias` gets a structural body of its own
        let shape = Classifier::new(&u, &registry, "Alias").classify_decl(u.get("Alias").unwrap()).unwrap();
        assert!(matches!(shape, TypeShape::Struct { .. }));
    }

    #[test]
    fn requested_definition_of_named_container_makes_the_literal_type() {
        let u = universe().declare("MoreNames", "Names").unwrap().declare("Lookup", "map[string]Names").unwrap()
            .declare("Lookup2", "Lookup").unwrap();
        let registry = SelfCopyRegistry::default();
        let shape = Classifier::new(&u, &registry, "MoreNames").classify_decl(u.get("MoreNames").unwrap()).unwrap();
        assert_eq!(shape, TypeShape::Slice { ty: parse_type_expr("[]string").unwrap(), elem: Box::new(TypeShape::Scalar) });

        let shape = Classifier::new(&u, &registry, "Lookup2").classify_decl(u.get("Lookup2").unwrap()).unwrap();
        let TypeShape::Map { ty, val, .. } = shape else { panic!("expected map") };
        assert_eq!(ty.to_string(), "map[string]Names");
        // nested named containers still keep their own name
        assert!(matches!(*val, TypeShape::Slice { ref ty, .. } if ty.to_string() == "Names"));
    }

    #[test]
    fn ambiguous_delegate_reports_where_it_was_reached() {
        let twice = |pointer_receiver: bool, result: &str| MethodDecl {
            name: "DeepCopy".into(),
            pointer_receiver,
            params: vec![],
            results: vec![parse_type_expr(result).unwrap()],
        };
        let u = universe()
            .declare("Twice", "struct{ p *int }").unwrap()
            .with_method("Twice", twice(false, "Twice"))
            .with_method("Twice", twice(true, "*Twice"));
        let registry = SelfCopyRegistry::build(&u, "DeepCopy", &[], false);
        let err = classify(&u, &registry, "struct{ Inner struct{ T *Twice } }").unwrap_err();
        match err {
            Error::AmbiguousDelegate { type_name, name, path, count, .. } => {
                assert_eq!(type_name, "Test");
                assert_eq!(name, "Twice");
                assert_eq!(path, "Inner.T");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_fields_need_no_correction() {
        let u = universe();
        let registry = SelfCopyRegistry::default();
        assert_eq!(classify(&u, &registry, "struct{ _ *int; _ []string }").unwrap(), TypeShape::Scalar);
        let TypeShape::Struct { fields } = classify(&u, &registry, "struct{ _ *int; P *int }").unwrap() else {
            panic!("expected struct");
        };
        assert_eq!(fields[0].shape, TypeShape::Scalar);
        assert!(matches!(fields[1].shape, TypeShape::Pointer { .. }));
    }

    #[test]
    fn unrequested_cycles_are_reported() {
        let u = universe();
        let err = classify(&u, &SelfCopyRegistry::default(), "Node").unwrap_err();
        match err {
            Error::CyclicType { cycle, path, .. } => {
                assert_eq!(cycle, "Node -> Node");
                assert_eq!(path, "Next");
            }
            other => panic!("unexpected {other:?}"),
        }
        let err = classify(&u, &SelfCopyRegistry::default(), "Ring").unwrap_err();
        assert!(matches!(err, Error::CyclicType { ref cycle, .. } if cycle == "Ring -> Link -> Ring"));
    }

    #[test]
    fn requested_cycles_resolve_to_delegation() {
        let u = universe();
        let registry = SelfCopyRegistry::build(&u, "DeepCopy", &["Node".to_string()], true);
        let shape = Classifier::new(&u, &registry, "Node").classify_decl(u.get("Node").unwrap()).unwrap();
        let TypeShape::Struct { fields } = shape else { panic!("expected struct") };
        let TypeShape::Pointer { to, .. } = &fields[0].shape else { panic!("expected pointer") };
        assert!(matches!(**to, TypeShape::SelfCopying(Delegate { returns_pointer: true, .. })));
    }

    #[test]
    fn unknown_and_uncomparable_types_fail() {
        let u = universe();
        let registry = SelfCopyRegistry::default();
        let err = classify(&u, &registry, "struct{ t time.Time }").unwrap_err();
        assert!(matches!(err, Error::UnknownType { ref name, ref path, .. } if name == "time.Time" && path == "t"));
        let err = classify(&u, &registry, "map[Names]int").unwrap_err();
        assert!(matches!(err, Error::UnsupportedShape { .. }));
        let err = classify(&u, &registry, "Keyed").unwrap_err();
        assert!(matches!(err, Error::UnsupportedShape { .. }), "struct key containing a slice");
    }

    #[test]
    fn top_level_pointer_and_func_types_are_unsupported() {
        let u = universe().declare("P", "*Bar").unwrap().declare("F", "func() int").unwrap();
        let registry = SelfCopyRegistry::default();
        for name in ["P", "F"] {
            let err = Classifier::new(&u, &registry, name).classify_decl(u.get(name).unwrap()).unwrap_err();
            assert!(matches!(err, Error::UnsupportedShape { ref path, .. } if path == "<self>"), "{name}");
        }
    }

    #[test]
    fn foreign_unexported_fields_needing_copies_are_rejected() {
        let u = universe()
            .declare("ext.Thing", "struct{ Public int; hidden []byte }").unwrap()
            .declare("ext.Open", "struct{ Public []byte; hidden int }").unwrap();
        let registry = SelfCopyRegistry::default();
        let err = classify(&u, &registry, "struct{ T ext.Thing }").unwrap_err();
        assert!(matches!(err, Error::UnsupportedShape { ref path, .. } if path == "T.hidden"));
        assert!(classify(&u, &registry, "struct{ T ext.Open }").is_ok());
    }
}
