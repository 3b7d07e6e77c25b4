use anyhow::Result;
use tracing::warn;

use crate::{
    ast::{AssignOp, BinaryOp, CallKind, Expr, FieldInit, ObjectDecl, UnaryOp},
    intern::Symbol,
    val,
    vm::bytecode::{CallType, Opcode},
};

use super::builder::{CodeBuilder, Pass, TypeReq};

fn assign_op_parts(op: AssignOp) -> (TypeReq, Opcode) {
    match op {
        AssignOp::Add => (TypeReq::Float, Opcode::Add),
        AssignOp::Sub => (TypeReq::Float, Opcode::Sub),
        AssignOp::Mul => (TypeReq::Float, Opcode::Mul),
        AssignOp::Div => (TypeReq::Float, Opcode::Div),
        AssignOp::Mod => (TypeReq::UInt, Opcode::Mod),
        AssignOp::BitAnd => (TypeReq::UInt, Opcode::BitAnd),
        AssignOp::BitOr => (TypeReq::UInt, Opcode::BitOr),
        AssignOp::Xor => (TypeReq::UInt, Opcode::Xor),
        AssignOp::Shl => (TypeReq::UInt, Opcode::Shl),
        AssignOp::Shr => (TypeReq::UInt, Opcode::Shr),
    }
}

fn load_var_op(ty: TypeReq, indexed: bool) -> Opcode {
    match (ty, indexed) {
        (TypeReq::UInt, false) => Opcode::LoadVarUint,
        (TypeReq::Float, false) => Opcode::LoadVarFlt,
        (_, false) => Opcode::LoadVarStr,
        (TypeReq::UInt, true) => Opcode::LoadVarArrayUint,
        (TypeReq::Float, true) => Opcode::LoadVarArrayFlt,
        (_, true) => Opcode::LoadVarArrayStr,
    }
}

fn save_var_op(ty: TypeReq, indexed: bool) -> Opcode {
    match (ty, indexed) {
        (TypeReq::UInt, false) => Opcode::SaveVarUint,
        (TypeReq::Float, false) => Opcode::SaveVarFlt,
        (_, false) => Opcode::SaveVarStr,
        (TypeReq::UInt, true) => Opcode::SaveVarArrayUint,
        (TypeReq::Float, true) => Opcode::SaveVarArrayFlt,
        (_, true) => Opcode::SaveVarArrayStr,
    }
}

fn load_field_op(ty: TypeReq) -> Opcode {
    match ty {
        TypeReq::UInt => Opcode::LoadFieldUint,
        TypeReq::Float => Opcode::LoadFieldFlt,
        _ => Opcode::LoadFieldStr,
    }
}

fn save_field_op(ty: TypeReq) -> Opcode {
    match ty {
        TypeReq::UInt => Opcode::SaveFieldUint,
        TypeReq::Float => Opcode::SaveFieldFlt,
        _ => Opcode::SaveFieldStr,
    }
}

/// Where a field store finds its object.
enum FieldTarget<'a> {
    Expr(&'a Expr),
    /// The object under construction.
    New,
}

impl CodeBuilder {
    /// Representation `expr` produces most cheaply.
    pub(crate) fn preferred_type(expr: &Expr) -> TypeReq {
        match expr {
            Expr::Int(_) => TypeReq::UInt,
            Expr::Float(_) => TypeReq::Float,
            Expr::Str(_) | Expr::Ident(_) | Expr::Concat { .. } | Expr::Call { .. } | Expr::FieldAssign { .. } => {
                TypeReq::String
            }
            Expr::Var { .. } | Expr::Field { .. } => TypeReq::None,
            Expr::Assign { value, .. } => Self::preferred_type(value),
            Expr::AssignOp { op, .. } | Expr::FieldAssignOp { op, .. } => assign_op_parts(*op).0,
            Expr::Binary { op, .. } => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => TypeReq::Float,
                _ => TypeReq::UInt,
            },
            Expr::Unary { op, .. } => match op {
                UnaryOp::Neg => TypeReq::Float,
                UnaryOp::Not | UnaryOp::BitNot => TypeReq::UInt,
            },
            Expr::StrEq { .. } | Expr::New(_) => TypeReq::UInt,
            Expr::Conditional { then, .. } => Self::preferred_type(then),
        }
    }

    /// Compile `expr`, leaving its result as `ty`.
    pub(crate) fn expr(&mut self, expr: &Expr, ty: TypeReq) -> Result<()> {
        match expr {
            Expr::Int(v) => self.int_constant(*v, ty),
            Expr::Float(v) => match ty {
                TypeReq::UInt => {
                    self.op(Opcode::LoadImmedUint);
                    self.word(*v as i32 as u32);
                }
                TypeReq::Float => {
                    self.op(Opcode::LoadImmedFlt);
                    let idx = self.float_literal(*v);
                    self.word(idx);
                }
                TypeReq::String => {
                    self.op(Opcode::LoadImmedStr);
                    let offset = self.string_literal(&val::format_float(*v));
                    self.word(offset);
                }
                TypeReq::None => {}
            },
            Expr::Str(text) => self.str_constant(text, ty),
            Expr::Ident(name) => match ty {
                TypeReq::String => {
                    self.op(Opcode::LoadImmedIdent);
                    self.ident(Symbol::intern(name));
                }
                TypeReq::UInt | TypeReq::Float => {
                    let value = match name.to_ascii_lowercase().as_str() {
                        "true" => 1,
                        "false" => 0,
                        _ => {
                            if self.pass() == Pass::Emit {
                                warn!("string '{name}' used as a number always evaluates to 0");
                            }
                            0
                        }
                    };
                    self.int_constant(value, ty);
                }
                TypeReq::None => {}
            },
            Expr::Var { name, index } => {
                if ty == TypeReq::None {
                    return Ok(());
                }
                let sym = Symbol::intern(name);
                if index.is_empty() {
                    self.op(load_var_op(ty, false));
                    self.ident(sym);
                } else {
                    self.array_name(sym, index)?;
                    self.op(load_var_op(ty, true));
                }
            }
            Expr::Assign { name, index, value } => {
                let sub = match Self::preferred_type(value) {
                    TypeReq::None if ty != TypeReq::None => ty,
                    TypeReq::None => TypeReq::String,
                    t => t,
                };
                let sym = Symbol::intern(name);
                self.expr(value, sub)?;
                if index.is_empty() {
                    self.op(save_var_op(sub, false));
                    self.ident(sym);
                } else {
                    if sub == TypeReq::String {
                        self.op(Opcode::AdvanceStr);
                    }
                    self.array_name(sym, index)?;
                    self.op(save_var_op(sub, true));
                }
                self.convert(sub, ty);
            }
            Expr::AssignOp { name, index, op, value } => {
                let (sub, opcode) = assign_op_parts(*op);
                let sym = Symbol::intern(name);
                self.expr(value, sub)?;
                if index.is_empty() {
                    self.op(load_var_op(sub, false));
                    self.ident(sym);
                    self.op(opcode);
                    self.op(save_var_op(sub, false));
                    self.ident(sym);
                } else {
                    self.array_name(sym, index)?;
                    self.op(load_var_op(sub, true));
                    self.op(opcode);
                    self.op(save_var_op(sub, true));
                }
                self.convert(sub, ty);
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, ty)?,
            Expr::Unary { op, operand } => {
                let result = match op {
                    UnaryOp::Not => {
                        if Self::preferred_type(operand) == TypeReq::Float {
                            self.expr(operand, TypeReq::Float)?;
                            self.op(Opcode::NotF);
                        } else {
                            self.expr(operand, TypeReq::UInt)?;
                            self.op(Opcode::Not);
                        }
                        TypeReq::UInt
                    }
                    UnaryOp::BitNot => {
                        self.expr(operand, TypeReq::UInt)?;
                        self.op(Opcode::OnesComplement);
                        TypeReq::UInt
                    }
                    UnaryOp::Neg => {
                        self.expr(operand, TypeReq::Float)?;
                        self.op(Opcode::Neg);
                        TypeReq::Float
                    }
                };
                self.convert(result, ty);
            }
            Expr::StrEq { lhs, rhs, negate } => {
                self.expr(lhs, TypeReq::String)?;
                self.op(Opcode::AdvanceStrNul);
                self.expr(rhs, TypeReq::String)?;
                self.op(Opcode::CompareStr);
                if *negate {
                    self.op(Opcode::Not);
                }
                self.convert(TypeReq::UInt, ty);
            }
            Expr::Concat { lhs, rhs, glue } => {
                self.expr(lhs, TypeReq::String)?;
                match glue {
                    Some(c) => {
                        self.op(Opcode::AdvanceStrAppendChar);
                        self.word(*c as u32);
                    }
                    None => self.op(Opcode::AdvanceStr),
                }
                self.expr(rhs, TypeReq::String)?;
                self.op(Opcode::RewindStr);
                self.convert(TypeReq::String, ty);
            }
            Expr::Conditional { test, then, otherwise } => {
                let to_else = self.test_jump(test, false)?;
                self.expr(then, ty)?;
                let to_end = self.jump_forward(Opcode::Jmp);
                self.resolve(to_else);
                self.expr(otherwise, ty)?;
                self.resolve(to_end);
            }
            Expr::Call {
                name,
                namespace,
                args,
                kind,
            } => {
                self.op(Opcode::PushFrame);
                for arg in args {
                    self.expr(arg, TypeReq::String)?;
                    self.op(Opcode::Push);
                }
                let call_type = match kind {
                    CallKind::Function => CallType::Function,
                    CallKind::Method => CallType::Method,
                    CallKind::Parent => CallType::Parent,
                };
                self.op(if call_type == CallType::Function {
                    Opcode::CallFuncResolve
                } else {
                    Opcode::CallFunc
                });
                self.ident(Symbol::intern(name));
                self.ident_str(namespace.as_deref());
                self.word(call_type as u32);
                self.convert(TypeReq::String, ty);
            }
            Expr::Field { object, name, index } => {
                if ty == TypeReq::None {
                    return Ok(());
                }
                if !index.is_empty() {
                    self.index_list(index)?;
                    self.op(Opcode::AdvanceStr);
                }
                self.expr(object, TypeReq::String)?;
                self.op(Opcode::SetCurObject);
                self.op(Opcode::SetCurField);
                self.ident(Symbol::intern(name));
                if !index.is_empty() {
                    self.op(Opcode::TerminateRewindStr);
                    self.op(Opcode::SetCurFieldArray);
                }
                self.op(load_field_op(ty));
            }
            Expr::FieldAssign {
                object,
                name,
                index,
                value,
            } => {
                self.field_assign(FieldTarget::Expr(object), name, index, value)?;
                self.convert(TypeReq::String, ty);
            }
            Expr::FieldAssignOp {
                object,
                name,
                index,
                op,
                value,
            } => {
                let (sub, opcode) = assign_op_parts(*op);
                self.expr(value, sub)?;
                if !index.is_empty() {
                    self.index_list(index)?;
                    self.op(Opcode::AdvanceStr);
                }
                self.expr(object, TypeReq::String)?;
                self.op(Opcode::SetCurObject);
                self.op(Opcode::SetCurField);
                self.ident(Symbol::intern(name));
                if !index.is_empty() {
                    self.op(Opcode::TerminateRewindStr);
                    self.op(Opcode::SetCurFieldArray);
                }
                self.op(load_field_op(sub));
                self.op(opcode);
                self.op(save_field_op(sub));
                self.convert(sub, ty);
            }
            Expr::New(decl) => {
                self.object_decl(decl, true)?;
                self.convert(TypeReq::UInt, ty);
            }
        }
        Ok(())
    }

    fn int_constant(&mut self, value: i32, ty: TypeReq) {
        match ty {
            TypeReq::UInt => {
                self.op(Opcode::LoadImmedUint);
                self.word(value as u32);
            }
            TypeReq::Float => {
                self.op(Opcode::LoadImmedFlt);
                let idx = self.float_literal(f64::from(value));
                self.word(idx);
            }
            TypeReq::String => {
                self.op(Opcode::LoadImmedStr);
                let offset = self.string_literal(&val::format_int(value));
                self.word(offset);
            }
            TypeReq::None => {}
        }
    }

    fn str_constant(&mut self, text: &str, ty: TypeReq) {
        match ty {
            TypeReq::UInt => {
                self.op(Opcode::LoadImmedUint);
                self.word(val::parse_int(text) as u32);
            }
            TypeReq::Float => {
                self.op(Opcode::LoadImmedFlt);
                let idx = self.float_literal(val::parse_float(text));
                self.word(idx);
            }
            TypeReq::String => {
                self.op(Opcode::LoadImmedStr);
                let offset = self.string_literal(text);
                self.word(offset);
            }
            TypeReq::None => {}
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, ty: TypeReq) -> Result<()> {
        let (operands, opcode, result) = match op {
            BinaryOp::And | BinaryOp::Or => {
                self.expr(lhs, TypeReq::UInt)?;
                let jump = if op == BinaryOp::And { Opcode::JmpIfNotNp } else { Opcode::JmpIfNp };
                let skip = self.jump_forward(jump);
                self.expr(rhs, TypeReq::UInt)?;
                self.resolve(skip);
                self.convert(TypeReq::UInt, ty);
                return Ok(());
            }
            BinaryOp::Add => (TypeReq::Float, Opcode::Add, TypeReq::Float),
            BinaryOp::Sub => (TypeReq::Float, Opcode::Sub, TypeReq::Float),
            BinaryOp::Mul => (TypeReq::Float, Opcode::Mul, TypeReq::Float),
            BinaryOp::Div => (TypeReq::Float, Opcode::Div, TypeReq::Float),
            BinaryOp::Mod => (TypeReq::UInt, Opcode::Mod, TypeReq::UInt),
            BinaryOp::BitAnd => (TypeReq::UInt, Opcode::BitAnd, TypeReq::UInt),
            BinaryOp::BitOr => (TypeReq::UInt, Opcode::BitOr, TypeReq::UInt),
            BinaryOp::Xor => (TypeReq::UInt, Opcode::Xor, TypeReq::UInt),
            BinaryOp::Shl => (TypeReq::UInt, Opcode::Shl, TypeReq::UInt),
            BinaryOp::Shr => (TypeReq::UInt, Opcode::Shr, TypeReq::UInt),
            BinaryOp::Eq => (TypeReq::Float, Opcode::CmpEq, TypeReq::UInt),
            BinaryOp::Ne => (TypeReq::Float, Opcode::CmpNe, TypeReq::UInt),
            BinaryOp::Lt => (TypeReq::Float, Opcode::CmpLt, TypeReq::UInt),
            BinaryOp::Le => (TypeReq::Float, Opcode::CmpLe, TypeReq::UInt),
            BinaryOp::Gt => (TypeReq::Float, Opcode::CmpGr, TypeReq::UInt),
            BinaryOp::Ge => (TypeReq::Float, Opcode::CmpGe, TypeReq::UInt),
        };
        // Right first: the left operand has to end up on top.
        self.expr(rhs, operands)?;
        self.expr(lhs, operands)?;
        self.op(opcode);
        self.convert(result, ty);
        Ok(())
    }

    /// `a[i, j]` as the string `ai_j` in the current value.
    fn array_name(&mut self, name: Symbol, index: &[Expr]) -> Result<()> {
        self.op(Opcode::LoadImmedIdent);
        self.ident(name);
        self.op(Opcode::AdvanceStr);
        self.index_list(index)?;
        self.op(Opcode::RewindStr);
        Ok(())
    }

    /// Index expressions joined with `_`.
    fn index_list(&mut self, index: &[Expr]) -> Result<()> {
        let mut parts = index.iter();
        if let Some(first) = parts.next() {
            self.expr(first, TypeReq::String)?;
        }
        for part in parts {
            self.op(Opcode::AdvanceStrComma);
            self.expr(part, TypeReq::String)?;
            self.op(Opcode::RewindStr);
        }
        Ok(())
    }

    /// Store a string into a field, leaving the stored value current.
    fn field_assign(&mut self, target: FieldTarget<'_>, name: &str, index: &[Expr], value: &Expr) -> Result<()> {
        self.expr(value, TypeReq::String)?;
        self.op(Opcode::AdvanceStr);
        if !index.is_empty() {
            self.index_list(index)?;
            self.op(Opcode::AdvanceStr);
        }
        match target {
            FieldTarget::Expr(object) => {
                self.expr(object, TypeReq::String)?;
                self.op(Opcode::SetCurObject);
            }
            FieldTarget::New => self.op(Opcode::SetCurObjectNew),
        }
        self.op(Opcode::SetCurField);
        self.ident(Symbol::intern(name));
        if !index.is_empty() {
            self.op(Opcode::TerminateRewindStr);
            self.op(Opcode::SetCurFieldArray);
        }
        self.op(Opcode::TerminateRewindStr);
        self.op(Opcode::SaveFieldStr);
        Ok(())
    }

    /// Leaves the new object's id, or 0, on the int stack.
    fn object_decl(&mut self, decl: &ObjectDecl, root: bool) -> Result<()> {
        self.op(Opcode::LoadImmedUint);
        self.word(0);
        self.op(Opcode::PushFrame);
        self.expr(&decl.class_name, TypeReq::String)?;
        self.op(Opcode::Push);
        self.expr(&decl.name, TypeReq::String)?;
        self.op(Opcode::Push);
        for arg in &decl.args {
            self.expr(arg, TypeReq::String)?;
            self.op(Opcode::Push);
        }
        self.op(Opcode::CreateObject);
        self.ident_str(decl.parent.as_deref());
        let failed = self.forward();
        for FieldInit { name, index, value } in &decl.fields {
            self.field_assign(FieldTarget::New, name, index, value)?;
            self.op(Opcode::StrToNone);
        }
        self.op(Opcode::AddObject);
        self.word(u32::from(root));
        for child in &decl.children {
            self.object_decl(child, false)?;
            self.op(Opcode::UintToNone);
        }
        self.op(Opcode::EndObject);
        self.resolve(failed);
        Ok(())
    }
}
