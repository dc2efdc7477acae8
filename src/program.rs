//! Program representation handed to the engine.
//!
//! The engine does not parse source text. A front end (or test code) builds a
//! [`Program`] out of [`Stmt`] nodes and hands it to the runtime. The node set
//! is deliberately closed: executors match exhaustively on [`StmtKind`], so a
//! new statement form is a compile error at every site that must handle it.
//!
//! Each statement keeps the raw source line it came from (when the front end
//! has one) so the timeline and error messages can show what the user wrote
//! rather than a debug dump of the tree.

use crate::value::Value;

/// A complete Aura program: an ordered list of top-level statements.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Program { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// A named function body, registered into the state manager when a
/// [`StmtKind::FunctionDef`] is loaded or executed.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub body: Vec<Stmt>,
}

/// One statement node plus its source provenance.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    /// 1-based source line, when known.
    pub line: Option<usize>,
    /// Raw source text, shown in the timeline and in error context.
    pub raw: String,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: Option<usize>, raw: impl Into<String>) -> Self {
        Stmt {
            kind,
            line,
            raw: raw.into(),
        }
    }

    /// Short kind tag used by the timeline and the execution recorder.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            StmtKind::Set { .. } => "set",
            StmtKind::Print(_) => "print",
            StmtKind::If { .. } => "if",
            StmtKind::Repeat { .. } => "repeat",
            StmtKind::FunctionDef { .. } => "define",
            StmtKind::Call { .. } => "call",
        }
    }
}

/// The closed set of statement forms.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `set NAME to EXPR`; writes the innermost scope.
    Set { name: String, expr: Expr },
    /// `print EXPR`
    Print(Expr),
    /// `if EXPR then ... [else ...] end`; an empty `else_body` means no
    /// `else` branch was written.
    If {
        condition: Expr,
        body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// `repeat N times ... end`
    Repeat { count: u64, body: Vec<Stmt> },
    /// `define NAME ... end`; registers the body, executes nothing.
    FunctionDef { name: String, body: Vec<Stmt> },
    /// `call NAME`
    Call { name: String },
}

/// Expression tree evaluated against the live scope chain.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Var(String),
    List(Vec<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn number(n: f64) -> Self {
        Expr::Literal(Value::Number(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Expr::Literal(Value::Str(s.into()))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Binary operators supported by the expression evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}
