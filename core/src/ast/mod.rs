//! Statement tree consumed by the compiler.
//!
//! The tree is the hand-off point from whatever front end parses source
//! text. It derives serde so a front end in another process can ship it as
//! JSON.

pub mod build;


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("decoding statement tree")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("encoding statement tree")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default)]
    pub line: u32,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { line: 0, kind }
    }

    pub fn at(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtKind {
    Expr(Expr),
    Return(Option<Expr>),
    Break,
    Continue,
    If {
        test: Expr,
        then_block: Vec<Stmt>,
        #[serde(default)]
        else_block: Vec<Stmt>,
    },
    /// `while`, `for` and `do`/`while`. A post-test loop runs its body once
    /// before the first test.
    Loop {
        #[serde(default)]
        init: Option<Expr>,
        test: Expr,
        #[serde(default)]
        step: Option<Expr>,
        body: Vec<Stmt>,
        #[serde(default)]
        post_test: bool,
    },
    Function(FunctionDecl),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Int(i32),
    Float(f64),
    Str(String),
    /// A bare word used as a value.
    Ident(String),
    /// `%local` or `$global`, optionally indexed `a[i, j]`.
    Var {
        name: String,
        #[serde(default)]
        index: Vec<Expr>,
    },
    Assign {
        name: String,
        #[serde(default)]
        index: Vec<Expr>,
        value: Box<Expr>,
    },
    AssignOp {
        name: String,
        #[serde(default)]
        index: Vec<Expr>,
        op: AssignOp,
        value: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `$=` and `!$=`.
    StrEq {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        #[serde(default)]
        negate: bool,
    },
    /// `@`, or `SPC`/`TAB`/`NL` when `glue` is set.
    Concat {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        #[serde(default)]
        glue: Option<char>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// For method calls the receiver is `args[0]`.
    Call {
        name: String,
        #[serde(default)]
        namespace: Option<String>,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        kind: CallKind,
    },
    Field {
        object: Box<Expr>,
        name: String,
        #[serde(default)]
        index: Vec<Expr>,
    },
    FieldAssign {
        object: Box<Expr>,
        name: String,
        #[serde(default)]
        index: Vec<Expr>,
        value: Box<Expr>,
    },
    FieldAssignOp {
        object: Box<Expr>,
        name: String,
        #[serde(default)]
        index: Vec<Expr>,
        op: AssignOp,
        value: Box<Expr>,
    },
    New(Box<ObjectDecl>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    Xor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    BitNot,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    #[default]
    Function,
    Method,
    Parent,
}

/// `new Class(name, args...) { field = value; child... };`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDecl {
    pub class_name: Expr,
    #[serde(default = "ObjectDecl::anonymous")]
    pub name: Expr,
    /// Prototype object whose fields are copied first (`new Foo(Bar : Proto)`).
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub args: Vec<Expr>,
    #[serde(default)]
    pub fields: Vec<FieldInit>,
    #[serde(default)]
    pub children: Vec<ObjectDecl>,
}

impl ObjectDecl {
    fn anonymous() -> Expr {
        Expr::Str(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    pub name: String,
    #[serde(default)]
    pub index: Vec<Expr>,
    pub value: Expr,
}
