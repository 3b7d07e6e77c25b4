//! Terse constructors for statement trees, for embedders that generate
//! code and for tests.

use super::{AssignOp, BinaryOp, CallKind, Expr, FieldInit, FunctionDecl, ObjectDecl, Stmt, StmtKind, UnaryOp};

pub fn int(value: i32) -> Expr {
    Expr::Int(value)
}

pub fn float(value: f64) -> Expr {
    Expr::Float(value)
}

pub fn text(value: &str) -> Expr {
    Expr::Str(value.to_owned())
}

pub fn ident(value: &str) -> Expr {
    Expr::Ident(value.to_owned())
}

pub fn var(name: &str) -> Expr {
    Expr::Var {
        name: name.to_owned(),
        index: Vec::new(),
    }
}

pub fn var_at(name: &str, index: Vec<Expr>) -> Expr {
    Expr::Var {
        name: name.to_owned(),
        index,
    }
}

pub fn assign(name: &str, value: Expr) -> Expr {
    Expr::Assign {
        name: name.to_owned(),
        index: Vec::new(),
        value: Box::new(value),
    }
}

pub fn assign_at(name: &str, index: Vec<Expr>, value: Expr) -> Expr {
    Expr::Assign {
        name: name.to_owned(),
        index,
        value: Box::new(value),
    }
}

pub fn assign_op(name: &str, op: AssignOp, value: Expr) -> Expr {
    Expr::AssignOp {
        name: name.to_owned(),
        index: Vec::new(),
        op,
        value: Box::new(value),
    }
}

pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    binary(BinaryOp::Add, lhs, rhs)
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}

pub fn concat(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Concat {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        glue: None,
    }
}

pub fn concat_with(glue: char, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Concat {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        glue: Some(glue),
    }
}

pub fn str_eq(lhs: Expr, rhs: Expr) -> Expr {
    Expr::StrEq {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        negate: false,
    }
}

pub fn conditional(test: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::Conditional {
        test: Box::new(test),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    }
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.to_owned(),
        namespace: None,
        args,
        kind: CallKind::Function,
    }
}

pub fn ns_call(namespace: &str, name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.to_owned(),
        namespace: Some(namespace.to_owned()),
        args,
        kind: CallKind::Function,
    }
}

pub fn method(receiver: Expr, name: &str, mut args: Vec<Expr>) -> Expr {
    args.insert(0, receiver);
    Expr::Call {
        name: name.to_owned(),
        namespace: None,
        args,
        kind: CallKind::Method,
    }
}

pub fn parent_call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.to_owned(),
        namespace: None,
        args,
        kind: CallKind::Parent,
    }
}

pub fn field(object: Expr, name: &str) -> Expr {
    Expr::Field {
        object: Box::new(object),
        name: name.to_owned(),
        index: Vec::new(),
    }
}

pub fn set_field(object: Expr, name: &str, value: Expr) -> Expr {
    Expr::FieldAssign {
        object: Box::new(object),
        name: name.to_owned(),
        index: Vec::new(),
        value: Box::new(value),
    }
}

pub fn new_object(class_name: &str, name: &str) -> ObjectDecl {
    ObjectDecl {
        class_name: ident(class_name),
        name: text(name),
        parent: None,
        args: Vec::new(),
        fields: Vec::new(),
        children: Vec::new(),
    }
}

impl ObjectDecl {
    pub fn with_field(mut self, name: &str, value: Expr) -> Self {
        self.fields.push(FieldInit {
            name: name.to_owned(),
            index: Vec::new(),
            value,
        });
        self
    }

    pub fn with_child(mut self, child: ObjectDecl) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_owned());
        self
    }

    pub fn into_expr(self) -> Expr {
        Expr::New(Box::new(self))
    }
}

pub fn expr(expr: Expr) -> Stmt {
    Stmt::new(StmtKind::Expr(expr))
}

pub fn ret(expr: Expr) -> Stmt {
    Stmt::new(StmtKind::Return(Some(expr)))
}

pub fn ret_void() -> Stmt {
    Stmt::new(StmtKind::Return(None))
}

pub fn brk() -> Stmt {
    Stmt::new(StmtKind::Break)
}

pub fn cont() -> Stmt {
    Stmt::new(StmtKind::Continue)
}

pub fn if_else(test: Expr, then_block: Vec<Stmt>, else_block: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::If {
        test,
        then_block,
        else_block,
    })
}

pub fn while_loop(test: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::Loop {
        init: None,
        test,
        step: None,
        body,
        post_test: false,
    })
}

pub fn for_loop(init: Expr, test: Expr, step: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::Loop {
        init: Some(init),
        test,
        step: Some(step),
        body,
        post_test: false,
    })
}

pub fn function(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::Function(FunctionDecl {
        name: name.to_owned(),
        namespace: None,
        package: None,
        params: params.iter().map(|p| (*p).to_owned()).collect(),
        body,
    }))
}

pub fn method_fn(namespace: &str, name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::Function(FunctionDecl {
        name: name.to_owned(),
        namespace: Some(namespace.to_owned()),
        package: None,
        params: params.iter().map(|p| (*p).to_owned()).collect(),
        body,
    }))
}

/// A function declared inside `package <package> { ... }`.
pub fn package_fn(package: &str, namespace: Option<&str>, name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::Function(FunctionDecl {
        name: name.to_owned(),
        namespace: namespace.map(str::to_owned),
        package: Some(package.to_owned()),
        params: params.iter().map(|p| (*p).to_owned()).collect(),
        body,
    }))
}
