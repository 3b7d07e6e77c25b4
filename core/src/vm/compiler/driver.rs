use anyhow::{Result, bail};
use tracing::{debug, error};

use crate::{ast::Stmt, vm::bytecode::Opcode, vm::unit::CompiledUnit};

use super::builder::CodeBuilder;

/// Two-pass compiler from statement trees to [`CompiledUnit`]s.
///
/// The first pass sizes the code stream and collects literals and jump
/// targets; the second writes the words. Any disagreement between the two
/// is a compiler bug and fails the compile.
#[derive(Debug, Default, Clone, Copy)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile top-level `statements`. `name` identifies the source in
    /// diagnostics and debugger listings.
    pub fn compile_program(&self, name: Option<&str>, statements: &[Stmt]) -> Result<CompiledUnit> {
        let mut builder = CodeBuilder::new();
        Self::walk(&mut builder, statements)?;
        let sized = builder.ip();
        let breaks = builder.break_count();

        let mut builder = builder.into_emit();
        Self::walk(&mut builder, statements)?;
        if builder.ip() != sized || builder.target_mismatch() {
            error!(
                sized,
                emitted = builder.ip(),
                unit = name.unwrap_or("<input>"),
                "code size mismatch between compile passes"
            );
            bail!(
                "internal compiler error in {}: sized {} words, emitted {}",
                name.unwrap_or("<input>"),
                sized,
                builder.ip()
            );
        }
        let parts = builder.finish();
        debug_assert_eq!(parts.line_breaks.len(), breaks);
        debug!(
            unit = name.unwrap_or("<input>"),
            words = parts.code.len(),
            lines = parts.line_breaks.len(),
            "compiled unit"
        );
        Ok(CompiledUnit::from_parts(name, parts))
    }

    fn walk(builder: &mut CodeBuilder, statements: &[Stmt]) -> Result<()> {
        builder.block(statements)?;
        builder.op(Opcode::ReturnVoid);
        Ok(())
    }
}
