//! Recursive synthesis: copy shape → corrective statements.
//!
//! The generated method starts from a shallow copy (`var cp T = o`), which
//! is already right for every value-semantics part of `T`. The walk below
//! only emits statements for positions where the shallow copy would still
//! share storage with the original: pointer targets, slice backing arrays,
//! maps, channels, and fields whose type copies itself.
//!
//! Every statement is written against a pair of expressions, the source
//! position in `o` and the matching position in `cp`, so a pointer three
//! struct levels down is corrected in place (`cp.a.b.p = new(T)`) without
//! needing a method of its own on the intermediate structs.
use std::collections::HashSet;

use crate::delegate::Delegate;
use crate::plan::{CopyPlan, Expr, Stmt};
use crate::shape::TypeShape;
use crate::skip::{SkipPath, SkipSet};
use crate::types::TypeExpr;

const RECEIVER: &str = "o";
const COPY: &str = "cp";
const RET: &str = "retV";

/// Builds the plan for one requested type.
#[tracing::instrument(level = "debug", skip(shape, skips), fields(skips = skips.iter().count()))]
pub fn synthesize(type_name: &str, shape: &TypeShape, skips: &SkipSet, pointer_receiver: bool, method: &str) -> CopyPlan {
    let receiver = Expr::ident(RECEIVER);
    let cp = Expr::ident(COPY);

    let baseline = Stmt::Var {
        name: COPY.to_string(),
        ty: TypeExpr::named(type_name),
        init: Some(if pointer_receiver { receiver.deref() } else { receiver.clone() }),
    };
    // struct fields are reachable through the pointer; anything else needs `*o`
    let src = if pointer_receiver && !matches!(shape, TypeShape::Struct { .. }) {
        receiver.deref()
    } else {
        receiver
    };

    let mut synth = Synthesizer { skips, used: HashSet::new() };
    let mut stmts = vec![baseline];
    stmts.extend(synth.correct(shape, &src, &cp, &SkipPath::root(), 0));

    for unused in skips.iter().filter(|p| !synth.used.contains(*p)) {
        tracing::warn!(
            type_name,
            path = %unused,
            "skip path matches no position the generator traverses"
        );
    }
    tracing::debug!(corrections = stmts.len() - 1, "plan synthesized");

    CopyPlan {
        type_name: type_name.to_string(),
        method: method.to_string(),
        pointer_receiver,
        stmts,
    }
}

struct Synthesizer<'a> {
    skips: &'a SkipSet,
    /// Skip paths that matched a visited position.
    used: HashSet<SkipPath>,
}

/// Loop-scoped identifiers get a depth suffix so nested loops never shadow.
fn local(base: &str, depth: usize) -> String {
    if depth == 0 { base.to_string() } else { format!("{base}{depth}") }
}

impl Synthesizer<'_> {
    fn skipped(&mut self, path: &SkipPath) -> bool {
        if self.skips.is_skipped(path) {
            tracing::debug!(%path, "skipped");
            self.used.insert(path.clone());
            true
        } else {
            false
        }
    }

    /// Statements that turn `dst` (a shallow copy of `src`) into a deep copy.
    fn correct(&mut self, shape: &TypeShape, src: &Expr, dst: &Expr, path: &SkipPath, depth: usize) -> Vec<Stmt> {
        match shape {
            TypeShape::Scalar | TypeShape::Opaque(_) => Vec::new(),
            TypeShape::SelfCopying(delegate) => vec![self.delegate_value(delegate, src, dst)],
            TypeShape::Pointer { elem_ty, to } => vec![self.pointer(elem_ty, to, src, dst, path, depth)],
            TypeShape::Slice { ty, elem } => {
                let mut body = vec![
                    Stmt::assign(dst.clone(), Expr::make(ty, src.len())),
                    Stmt::CopyInto { dst: dst.clone(), src: src.clone() },
                ];
                body.extend(self.elements(elem, src, dst, path, depth));
                vec![Stmt::IfNotNil { expr: src.clone(), body }]
            }
            TypeShape::Array { elem } => self.elements(elem, src, dst, path, depth),
            TypeShape::Map { ty, val_ty, val } => {
                let body = vec![
                    Stmt::assign(dst.clone(), Expr::make(ty, src.len())),
                    self.map_entries(val_ty, val, src, dst, path, depth),
                ];
                vec![Stmt::IfNotNil { expr: src.clone(), body }]
            }
            TypeShape::Channel { ty } => {
                // in-flight values are not state; only the buffer size is
                let body = vec![Stmt::assign(dst.clone(), Expr::make(ty, src.cap()))];
                vec![Stmt::IfNotNil { expr: src.clone(), body }]
            }
            TypeShape::Struct { fields } => {
                let mut out = Vec::new();
                for field in fields {
                    let field_path = path.field(&field.name);
                    if self.skipped(&field_path) {
                        continue;
                    }
                    out.extend(self.correct(
                        &field.shape,
                        &src.field(&field.name),
                        &dst.field(&field.name),
                        &field_path,
                        depth,
                    ));
                }
                out
            }
        }
    }

    /// `if src != nil { dst = new(E); *dst = *src; ... }`, or a delegated
    /// copy when `E` copies itself.
    fn pointer(&mut self, elem_ty: &TypeExpr, to: &TypeShape, src: &Expr, dst: &Expr, path: &SkipPath, depth: usize) -> Stmt {
        let body = match to {
            TypeShape::SelfCopying(delegate) => {
                let call = src.call(&delegate.method);
                if delegate.returns_pointer {
                    vec![Stmt::assign(dst.clone(), call)]
                } else {
                    // re-box the returned value into a fresh pointer
                    vec![
                        Stmt::Define { name: RET.to_string(), rhs: call },
                        Stmt::assign(dst.clone(), Expr::ident(RET).addr_of()),
                    ]
                }
            }
            _ => {
                let mut body = vec![
                    Stmt::assign(dst.clone(), Expr::New(elem_ty.clone())),
                    Stmt::assign(dst.deref(), src.deref()),
                ];
                if matches!(to, TypeShape::Struct { .. }) {
                    body.extend(self.correct(to, src, dst, path, depth));
                } else {
                    body.extend(self.correct(to, &src.deref(), &dst.deref(), path, depth));
                }
                body
            }
        };
        Stmt::IfNotNil { expr: src.clone(), body }
    }

    fn delegate_value(&self, delegate: &Delegate, src: &Expr, dst: &Expr) -> Stmt {
        let call = src.call(&delegate.method);
        if !delegate.returns_pointer {
            let assign = Stmt::assign(dst.clone(), call);
            return if delegate.nilable {
                Stmt::IfNotNil { expr: src.clone(), body: vec![assign] }
            } else {
                assign
            };
        }
        // `retV` needs a scope of its own
        let stmts = vec![
            Stmt::Define { name: RET.to_string(), rhs: call },
            Stmt::assign(dst.clone(), Expr::ident(RET).deref()),
        ];
        if delegate.nilable {
            Stmt::IfNotNil { expr: src.clone(), body: stmts }
        } else {
            Stmt::Block(stmts)
        }
    }

    /// Per-element corrections for slices and arrays; storage is handled by
    /// the caller.
    fn elements(&mut self, elem: &TypeShape, src: &Expr, dst: &Expr, path: &SkipPath, depth: usize) -> Vec<Stmt> {
        let elem_path = path.elem();
        if self.skipped(&elem_path) {
            return Vec::new();
        }
        let index = local("i", depth);
        let i = Expr::ident(&index);
        let body = self.correct(elem, &src.index(i.clone()), &dst.index(i), &elem_path, depth + 1);
        if body.is_empty() {
            return Vec::new();
        }
        vec![Stmt::RangeIndex { index, over: src.clone(), body }]
    }

    /// `for k, v := range src { ... }`. Keys are comparable and always
    /// assigned as-is; values go through a local so their own corrections
    /// have an addressable target.
    fn map_entries(&mut self, val_ty: &TypeExpr, val: &TypeShape, src: &Expr, dst: &Expr, path: &SkipPath, depth: usize) -> Stmt {
        let (key, value, copy) = (local("k", depth), local("v", depth), local("cpv", depth));
        let entry = dst.index(Expr::ident(&key));
        let value_path = path.value();

        let body = if self.skipped(&value_path) || !val.needs_correction() {
            vec![Stmt::assign(entry, Expr::ident(&value))]
        } else {
            let (v, cpv) = (Expr::ident(&value), Expr::ident(&copy));
            let mut body = Vec::new();
            match val {
                TypeShape::Pointer { elem_ty, to } => {
                    body.push(Stmt::Var { name: copy.clone(), ty: val_ty.clone(), init: None });
                    body.push(self.pointer(elem_ty, to, &v, &cpv, &value_path, depth + 1));
                }
                _ => {
                    body.push(Stmt::Var { name: copy.clone(), ty: val_ty.clone(), init: Some(v.clone()) });
                    body.extend(self.correct(val, &v, &cpv, &value_path, depth + 1));
                }
            }
            body.push(Stmt::assign(entry, cpv));
            body
        };
        Stmt::RangeMap { key, val: value, over: src.clone(), body }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::SelfCopyRegistry;
    use crate::shape::Classifier;
    use crate::types::Universe;
    use pretty_assertions::assert_eq;

    fn universe() -> Universe {
        Universe::new("testdata")
            .declare("Foo", "struct{ Map map[string]*Bar; ch chan float32; baz Baz; n int }").unwrap()
            .declare("Bar", "struct{ Slice []string }").unwrap()
            .declare("Baz", "struct{ String string; StringPointer *string }").unwrap()
            .declare("Flat", "struct{ a int; b [2]string; c struct{ d bool } }").unwrap()
            .declare("Grid", "[3][]int").unwrap()
    }

    fn plan(u: &Universe, name: &str, skips: &str, pointer_receiver: bool) -> CopyPlan {
        let registry = SelfCopyRegistry::build(u, "DeepCopy", &[name.to_string()], pointer_receiver);
        let shape = Classifier::new(u, &registry, name).classify_decl(u.get(name).unwrap()).unwrap();
        synthesize(name, &shape, &SkipSet::parse_list(skips).unwrap(), pointer_receiver, "DeepCopy")
    }

    #[test]
    fn scalar_types_need_only_the_baseline() {
        let u = universe();
        let p = plan(&u, "Flat", "", false);
        assert!(p.corrections().is_empty());
        assert_eq!(
            p.baseline(),
            &Stmt::Var { name: "cp".into(), ty: TypeExpr::named("Flat"), init: Some(Expr::ident("o")) }
        );
    }

    #[test]
    fn fields_are_corrected_in_declaration_order() {
        let u = universe();
        let p = plan(&u, "Foo", "", false);
        let guarded: Vec<String> = p
            .corrections()
            .iter()
            .map(|s| match s {
                Stmt::IfNotNil { expr, .. } => format!("{expr:?}"),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(guarded.len(), 3);
        assert!(guarded[0].contains("\"Map\""));
        assert!(guarded[1].contains("\"ch\""));
        assert!(guarded[2].contains("\"StringPointer\""));
    }

    #[test]
    fn skipping_map_values_keeps_the_fresh_map() {
        let u = universe();
        let p = plan(&u, "Foo", "Map[k]", false);
        let Stmt::IfNotNil { body, .. } = &p.corrections()[0] else { panic!("expected guard") };
        assert!(matches!(&body[0], Stmt::Assign { rhs: Expr::Make { .. }, .. }));
        let Stmt::RangeMap { body, .. } = &body[1] else { panic!("expected range") };
        assert_eq!(
            body,
            &vec![Stmt::assign(Expr::ident("cp").field("Map").index(Expr::ident("k")), Expr::ident("v"))]
        );
    }

    #[test]
    fn receiver_style_only_changes_the_baseline_for_structs() {
        let u = universe();
        let by_value = plan(&u, "Foo", "", false);
        let by_pointer = plan(&u, "Foo", "", true);
        assert_eq!(by_value.corrections(), by_pointer.corrections());
        assert_ne!(by_value.baseline(), by_pointer.baseline());
    }

    #[test]
    fn arrays_of_slices_loop_without_reallocating_the_array() {
        let u = universe();
        let p = plan(&u, "Grid", "", false);
        let [Stmt::RangeIndex { index, body, .. }] = p.corrections() else { panic!("{:?}", p.corrections()) };
        assert_eq!(index, "i");
        assert!(matches!(&body[0], Stmt::IfNotNil { .. }));
    }

    #[test]
    fn blank_fields_are_left_alone() {
        let u = universe().declare("Padded", "struct{ _ *int; P *int }").unwrap();
        let p = plan(&u, "Padded", "", false);
        let [Stmt::IfNotNil { expr, .. }] = p.corrections() else { panic!("{:?}", p.corrections()) };
        assert_eq!(expr, &Expr::ident("o").field("P"));
    }

    #[test]
    fn loop_names_are_unique_per_depth() {
        assert_eq!(local("k", 0), "k");
        assert_eq!(local("k", 2), "k2");
    }
}
