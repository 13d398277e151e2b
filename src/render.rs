//! Renderer: copy plans → one Go source file.
//!
//! Output is a pure function of the plans and the universe's package/import
//! context. No timestamps, no invocation details: regenerating an unchanged
//! schema must not produce a diff.
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::plan::{CopyPlan, Expr, Stmt};
use crate::types::Universe;

pub const HEADER: &str = "// Code generated by deep-copy; DO NOT EDIT.";

static GENERATED_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^// Code generated .* DO NOT EDIT\.$").expect("static header pattern")
});

/// Whether `source` carries a generated-file header ahead of its package
/// clause, i.e. whether it is safe to overwrite.
pub fn is_generated(source: &str) -> bool {
    source
        .lines()
        .map(str::trim_end)
        .take_while(|line| !line.starts_with("package "))
        .any(|line| GENERATED_HEADER.is_match(line))
}

pub fn render(plans: &[CopyPlan], universe: &Universe) -> String {
    let mut cg = Codegen::new();
    cg.preamble(&universe.package, &collect_imports(plans, universe));
    for plan in plans {
        cg.emit(plan);
    }
    cg.into_string()
}

/// import path → alias (when the qualifier differs from the path's last element)
fn collect_imports(plans: &[CopyPlan], universe: &Universe) -> BTreeMap<String, Option<String>> {
    let mut imports = BTreeMap::new();
    for plan in plans {
        plan.visit_types(|ty| {
            ty.visit_qualifiers(&mut |qualifier| {
                let path = universe.imports.get(qualifier).cloned().unwrap_or_else(|| qualifier.to_string());
                let base = path.rsplit('/').next().unwrap_or(&path);
                let alias = (base != qualifier).then(|| qualifier.to_string());
                imports.insert(path, alias);
            })
        });
    }
    imports
}

fn import_spec(path: &str, alias: &Option<String>) -> String {
    match alias {
        Some(alias) => format!("{alias} \"{path}\""),
        None => format!("\"{path}\""),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CODEGEN
// ————————————————————————————————————————————————————————————————————————————

pub struct Codegen {
    out: String,
    indent: usize,
}

impl Codegen {
    pub fn new() -> Self {
        Self { out: String::new(), indent: 0 }
    }

    fn line(&mut self, text: impl fmt::Display) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        let _ = writeln!(self.out, "{text}");
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    pub fn preamble(&mut self, package: &str, imports: &BTreeMap<String, Option<String>>) {
        self.line(HEADER);
        self.blank();
        self.line(format_args!("package {package}"));

        if imports.is_empty() {
            return;
        }
        self.blank();
        if let [(path, alias)] = imports.iter().collect::<Vec<_>>().as_slice() {
            self.line(format_args!("import {}", import_spec(path, alias)));
            return;
        }
        self.line("import (");
        self.indent += 1;
        for (path, alias) in imports {
            self.line(import_spec(path, alias));
        }
        self.indent -= 1;
        self.line(")");
    }

    /// Appends one method.
    pub fn emit(&mut self, plan: &CopyPlan) {
        let (recv, ret, result) = if plan.pointer_receiver {
            (format!("*{}", plan.type_name), format!("*{}", plan.type_name), "&cp")
        } else {
            (plan.type_name.clone(), plan.type_name.clone(), "cp")
        };

        self.blank();
        self.line(format_args!("// {} generates a deep copy of {recv}", plan.method));
        self.line(format_args!("func (o {recv}) {}() {ret} {{", plan.method));
        self.indent += 1;
        for stmt in &plan.stmts {
            self.stmt(stmt);
        }
        self.line(format_args!("return {result}"));
        self.indent -= 1;
        self.line("}");
    }

    fn body(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        for stmt in stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { lhs, rhs } => self.line(format_args!("{lhs} = {rhs}")),
            Stmt::Define { name, rhs } => self.line(format_args!("{name} := {rhs}")),
            Stmt::Var { name, ty, init: None } => self.line(format_args!("var {name} {ty}")),
            Stmt::Var { name, ty, init: Some(init) } => self.line(format_args!("var {name} {ty} = {init}")),
            Stmt::CopyInto { dst, src } => self.line(format_args!("copy({dst}, {src})")),
            Stmt::IfNotNil { expr, body } => {
                self.line(format_args!("if {expr} != nil {{"));
                self.body(body);
                self.line("}");
            }
            Stmt::Block(body) => {
                self.line("{");
                self.body(body);
                self.line("}");
            }
            Stmt::RangeIndex { index, over, body } => {
                self.line(format_args!("for {index} := range {over} {{"));
                self.body(body);
                self.line("}");
            }
            Stmt::RangeMap { key, val, over, body } => {
                self.line(format_args!("for {key}, {val} := range {over} {{"));
                self.body(body);
                self.line("}");
            }
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

/// Operand of a selector, index or call.
struct Operand<'a>(&'a Expr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_unary() { write!(f, "({})", self.0) } else { write!(f, "{}", self.0) }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => f.write_str(name),
            Expr::Field(base, name) => write!(f, "{}.{name}", Operand(base)),
            Expr::Index(base, index) => write!(f, "{}[{index}]", Operand(base)),
            Expr::MethodCall(base, method) => write!(f, "{}.{method}()", Operand(base)),
            Expr::Deref(inner) => write!(f, "*{inner}"),
            Expr::AddrOf(inner) => write!(f, "&{inner}"),
            Expr::New(ty) => write!(f, "new({ty})"),
            Expr::Make { ty, size } => write!(f, "make({ty}, {size})"),
            Expr::Len(inner) => write!(f, "len({inner})"),
            Expr::Cap(inner) => write!(f, "cap({inner})"),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeExpr;
    use pretty_assertions::assert_eq;

    #[test]
    fn unary_operands_are_parenthesized() {
        let o = Expr::ident("o");
        assert_eq!(o.deref().field("a").to_string(), "(*o).a");
        assert_eq!(o.deref().index(Expr::ident("i")).to_string(), "(*o)[i]");
        assert_eq!(o.field("p").deref().to_string(), "*o.p");
        assert_eq!(o.field("p").deref().deref().to_string(), "**o.p");
        assert_eq!(o.field("m").call("DeepCopy").to_string(), "o.m.DeepCopy()");
    }

    #[test]
    fn header_detection() {
        assert!(is_generated("// Code generated by deep-copy; DO NOT EDIT.\n\npackage x\n"));
        assert!(is_generated("// Code generated by some-other-tool -flags; DO NOT EDIT.\npackage x\n"));
        assert!(!is_generated("// Package x does things.\npackage x\n"));
        assert!(!is_generated("package x\n\n// Code generated by deep-copy; DO NOT EDIT.\n"));
    }

    #[test]
    fn rendered_header_is_detected() {
        let out = render(&[], &Universe::new("testdata"));
        assert_eq!(out, format!("{HEADER}\n\npackage testdata\n"));
        assert!(is_generated(&out));
    }

    #[test]
    fn imports_are_sorted_and_aliased_when_needed() {
        let mut universe = Universe::new("models");
        universe.imports.insert("uuid".into(), "github.com/google/uuid".into());
        universe.imports.insert("pb".into(), "example.com/api/v1/proto".into());
        let plan = CopyPlan {
            type_name: "T".into(),
            method: "DeepCopy".into(),
            pointer_receiver: false,
            stmts: vec![
                Stmt::Var { name: "cp".into(), ty: TypeExpr::named("T"), init: Some(Expr::ident("o")) },
                Stmt::assign(Expr::ident("cp").field("a"), Expr::New(TypeExpr::Named { pkg: Some("uuid".into()), name: "UUID".into() })),
                Stmt::assign(Expr::ident("cp").field("b"), Expr::New(TypeExpr::Named { pkg: Some("pb".into()), name: "Msg".into() })),
                Stmt::assign(Expr::ident("cp").field("c"), Expr::New(TypeExpr::Named { pkg: Some("time".into()), name: "Time".into() })),
            ],
        };
        let out = render(&[plan], &universe);
        assert!(out.contains(
            "import (\n\tpb \"example.com/api/v1/proto\"\n\t\"github.com/google/uuid\"\n\t\"time\"\n)\n"
        ), "{out}");
    }
}
