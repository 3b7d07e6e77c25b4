use anyhow::{Result, bail};

use crate::{
    ast::{Expr, FunctionDecl, Stmt, StmtKind},
    intern::Symbol,
    vm::bytecode::Opcode,
};

use super::builder::{CodeBuilder, FwdRef, LoopLabels, TypeReq};

impl CodeBuilder {
    pub(crate) fn block(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.break_line(stmt.line);
                self.expr(expr, TypeReq::None)?;
            }
            StmtKind::Return(value) => {
                self.break_line(stmt.line);
                match value {
                    Some(value) => {
                        self.expr(value, TypeReq::String)?;
                        self.op(Opcode::Return);
                    }
                    None => self.op(Opcode::ReturnVoid),
                }
            }
            StmtKind::Break => {
                self.break_line(stmt.line);
                let fwd = self.jump_forward(Opcode::Jmp);
                match self.loops.last_mut() {
                    Some(labels) => labels.breaks.push(fwd),
                    None => bail!("line {}: break outside of a loop", stmt.line),
                }
            }
            StmtKind::Continue => {
                self.break_line(stmt.line);
                let fwd = self.jump_forward(Opcode::Jmp);
                match self.loops.last_mut() {
                    Some(labels) => labels.continues.push(fwd),
                    None => bail!("line {}: continue outside of a loop", stmt.line),
                }
            }
            StmtKind::If {
                test,
                then_block,
                else_block,
            } => {
                self.break_line(stmt.line);
                let skip_then = self.test_jump(test, false)?;
                self.block(then_block)?;
                if else_block.is_empty() {
                    self.resolve(skip_then);
                } else {
                    let skip_else = self.jump_forward(Opcode::Jmp);
                    self.resolve(skip_then);
                    self.block(else_block)?;
                    self.resolve(skip_else);
                }
            }
            StmtKind::Loop {
                init,
                test,
                step,
                body,
                post_test,
            } => {
                self.break_line(stmt.line);
                if let Some(init) = init {
                    self.expr(init, TypeReq::None)?;
                }
                let exit = if *post_test { None } else { Some(self.test_jump(test, false)?) };
                let top = self.ip();
                self.loops.push(LoopLabels::default());
                let body_result = self.block(body);
                let labels = self.loops.pop().unwrap_or_default();
                body_result?;
                for fwd in labels.continues {
                    self.resolve(fwd);
                }
                if let Some(step) = step {
                    self.expr(step, TypeReq::None)?;
                }
                self.test_jump_back(test, top)?;
                if let Some(exit) = exit {
                    self.resolve(exit);
                }
                for fwd in labels.breaks {
                    self.resolve(fwd);
                }
            }
            StmtKind::Function(decl) => {
                self.break_line(stmt.line);
                self.function_decl(decl, stmt.line)?;
            }
        }
        Ok(())
    }

    /// `FUNC_DECL name ns pkg has_body end argc argv...` followed by the
    /// body, compiled against the function literal tables.
    fn function_decl(&mut self, decl: &FunctionDecl, line: u32) -> Result<()> {
        if self.in_function {
            bail!("line {line}: function {} declared inside another function", decl.name);
        }
        if decl.name.is_empty() {
            bail!("line {line}: function declaration without a name");
        }
        self.op(Opcode::FuncDecl);
        self.ident(Symbol::intern(&decl.name));
        self.ident_str(decl.namespace.as_deref());
        self.ident_str(decl.package.as_deref());
        self.word(u32::from(!decl.body.is_empty()));
        let end = self.forward();
        self.word(decl.params.len() as u32);
        for param in &decl.params {
            self.ident(Symbol::intern(param));
        }

        let outer_loops = std::mem::take(&mut self.loops);
        self.in_function = true;
        let body_result = self.block(&decl.body);
        if body_result.is_ok() {
            self.op(Opcode::ReturnVoid);
        }
        self.in_function = false;
        self.loops = outer_loops;
        body_result?;
        self.resolve(end);
        Ok(())
    }

    /// Type a condition is evaluated in.
    fn condition_type(test: &Expr) -> TypeReq {
        if Self::preferred_type(test) == TypeReq::UInt {
            TypeReq::UInt
        } else {
            TypeReq::Float
        }
    }

    /// Evaluate `test` and jump forward when it equals `when`.
    pub(crate) fn test_jump(&mut self, test: &Expr, when: bool) -> Result<FwdRef> {
        let ty = Self::condition_type(test);
        self.expr(test, ty)?;
        let op = match (ty, when) {
            (TypeReq::UInt, false) => Opcode::JmpIfNot,
            (TypeReq::UInt, true) => Opcode::JmpIf,
            (_, false) => Opcode::JmpIfFNot,
            (_, true) => Opcode::JmpIfF,
        };
        Ok(self.jump_forward(op))
    }

    /// Evaluate `test` and jump back to `target` while it holds.
    fn test_jump_back(&mut self, test: &Expr, target: u32) -> Result<()> {
        let ty = Self::condition_type(test);
        self.expr(test, ty)?;
        let op = if ty == TypeReq::UInt { Opcode::JmpIf } else { Opcode::JmpIfF };
        self.jump_to(op, target);
        Ok(())
    }
}
