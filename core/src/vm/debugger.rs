//! Hooks for a debugger attached to the interpreter.

use std::rc::Rc;

use tracing::debug;

use crate::{
    intern::Symbol,
    util::fast_map::{FastHashMap, fast_hash_map_new},
};

use super::{Console, unit::CompiledUnit};

/// Notifications the interpreter sends to an attached debugger.
pub trait Debugger {
    /// A breakpoint trap on `line` of `unit` was hit. The statement runs
    /// after this returns.
    fn execution_stopped(&mut self, console: &mut Console, unit: &Rc<CompiledUnit>, line: u32);

    /// `unit` was compiled or loaded; reapply any breakpoints set on it.
    fn unit_loaded(&mut self, _unit: &Rc<CompiledUnit>) {}
}

/// Breakpoints by file name that survive recompiles, plus a record of
/// every stop.
#[derive(Debug, Default)]
pub struct BreakpointList {
    lines: FastHashMap<Symbol, Vec<u32>>,
    hits: Vec<(String, u32)>,
}

impl BreakpointList {
    pub fn new() -> Self {
        Self {
            lines: fast_hash_map_new(),
            hits: Vec::new(),
        }
    }

    /// Remember a breakpoint on `line` of `file`, applying it to `unit`
    /// right away when the file is already loaded.
    pub fn add(&mut self, file: &str, line: u32, unit: Option<&CompiledUnit>) {
        self.lines.entry(Symbol::intern(file)).or_default().push(line);
        if let Some(unit) = unit {
            unit.set_breakpoint(line);
        }
    }

    pub fn remove(&mut self, file: &str, line: u32, unit: Option<&CompiledUnit>) {
        if let Some(lines) = self.lines.get_mut(&Symbol::intern(file)) {
            lines.retain(|&l| l != line);
        }
        if let Some(unit) = unit {
            unit.clear_breakpoint(line);
        }
    }

    /// `(file, line)` of every stop so far, oldest first.
    pub fn hits(&self) -> &[(String, u32)] {
        &self.hits
    }
}

impl Debugger for BreakpointList {
    fn execution_stopped(&mut self, _console: &mut Console, unit: &Rc<CompiledUnit>, line: u32) {
        let file = unit.name().unwrap_or("<input>").to_owned();
        debug!(file = %file, line, "stopped at breakpoint");
        self.hits.push((file, line));
    }

    fn unit_loaded(&mut self, unit: &Rc<CompiledUnit>) {
        let Some(name) = unit.name() else { return };
        if let Some(lines) = self.lines.get(&Symbol::intern(name)) {
            for &line in lines {
                unit.set_breakpoint(line);
            }
        }
    }
}
