// Copy plans: the statement IR between synthesis and rendering.
//
// Only the handful of Go forms a deep-copy method needs. Building these as
// values (instead of writing text directly) is what lets the renderer
// collect imports and keeps the two receiver styles comparable.

use crate::types::TypeExpr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Deref(Box<Expr>),
    AddrOf(Box<Expr>),
    /// `recv.method()`
    MethodCall(Box<Expr>, String),
    New(TypeExpr),
    /// `make(ty, size)`
    Make { ty: TypeExpr, size: Box<Expr> },
    Len(Box<Expr>),
    Cap(Box<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn field(&self, name: &str) -> Self {
        Expr::Field(Box::new(self.clone()), name.to_string())
    }

    pub fn index(&self, index: Expr) -> Self {
        Expr::Index(Box::new(self.clone()), Box::new(index))
    }

    pub fn deref(&self) -> Self {
        Expr::Deref(Box::new(self.clone()))
    }

    pub fn addr_of(&self) -> Self {
        Expr::AddrOf(Box::new(self.clone()))
    }

    pub fn call(&self, method: &str) -> Self {
        Expr::MethodCall(Box::new(self.clone()), method.to_string())
    }

    pub fn len(&self) -> Self {
        Expr::Len(Box::new(self.clone()))
    }

    pub fn cap(&self) -> Self {
        Expr::Cap(Box::new(self.clone()))
    }

    pub fn make(ty: &TypeExpr, size: Expr) -> Self {
        Expr::Make { ty: ty.clone(), size: Box::new(size) }
    }

    /// Unary operands need parentheses under a selector or index.
    pub fn is_unary(&self) -> bool {
        matches!(self, Expr::Deref(_) | Expr::AddrOf(_))
    }

    fn visit_types(&self, f: &mut impl FnMut(&TypeExpr)) {
        match self {
            Expr::Ident(_) => {}
            Expr::New(ty) => f(ty),
            Expr::Make { ty, size } => {
                f(ty);
                size.visit_types(f);
            }
            Expr::Index(base, index) => {
                base.visit_types(f);
                index.visit_types(f);
            }
            Expr::Field(inner, _)
            | Expr::Deref(inner)
            | Expr::AddrOf(inner)
            | Expr::MethodCall(inner, _)
            | Expr::Len(inner)
            | Expr::Cap(inner) => inner.visit_types(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign { lhs: Expr, rhs: Expr },
    /// `name := rhs`
    Define { name: String, rhs: Expr },
    /// `var name ty` / `var name ty = init`
    Var { name: String, ty: TypeExpr, init: Option<Expr> },
    /// `copy(dst, src)`
    CopyInto { dst: Expr, src: Expr },
    IfNotNil { expr: Expr, body: Vec<Stmt> },
    Block(Vec<Stmt>),
    /// `for index := range over`
    RangeIndex { index: String, over: Expr, body: Vec<Stmt> },
    /// `for key, val := range over`
    RangeMap { key: String, val: String, over: Expr, body: Vec<Stmt> },
}

impl Stmt {
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Stmt::Assign { lhs, rhs }
    }

    fn visit_types(&self, f: &mut impl FnMut(&TypeExpr)) {
        match self {
            Stmt::Assign { lhs, rhs } => {
                lhs.visit_types(f);
                rhs.visit_types(f);
            }
            Stmt::Define { rhs, .. } => rhs.visit_types(f),
            Stmt::Var { ty, init, .. } => {
                f(ty);
                if let Some(init) = init {
                    init.visit_types(f);
                }
            }
            Stmt::CopyInto { dst, src } => {
                dst.visit_types(f);
                src.visit_types(f);
            }
            Stmt::IfNotNil { expr: over, body }
            | Stmt::RangeIndex { over, body, .. }
            | Stmt::RangeMap { over, body, .. } => {
                over.visit_types(f);
                body.iter().for_each(|s| s.visit_types(f));
            }
            Stmt::Block(body) => body.iter().for_each(|s| s.visit_types(f)),
        }
    }
}

/// Everything needed to render one generated method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    pub type_name: String,
    pub method: String,
    pub pointer_receiver: bool,
    /// Baseline assignment first, then the corrective statements.
    pub stmts: Vec<Stmt>,
}

impl CopyPlan {
    pub fn baseline(&self) -> &Stmt {
        &self.stmts[0]
    }

    /// Statements after the baseline shallow copy.
    pub fn corrections(&self) -> &[Stmt] {
        &self.stmts[1..]
    }

    pub fn visit_types(&self, mut f: impl FnMut(&TypeExpr)) {
        for stmt in &self.stmts {
            stmt.visit_types(&mut f);
        }
    }
}
