//! The bytecode interpreter.
//!
//! `exec_unit` is the single entry point: it sets up the frame, runs the
//! dispatch loop in [`exec`] and restores every piece of console state it
//! touched before returning the unit's result string.

mod call;
mod exec;
mod object;

use std::rc::Rc;

use tracing::error;

use crate::intern::Symbol;

use super::{Console, namespace::NamespaceId, unit::CompiledUnit};

/// Stack that must remain before entering the dispatch loop again.
const RED_ZONE: usize = 256 * 1024;
/// Size of each segment allocated when the red zone is reached.
const STACK_PER_RECURSION: usize = 4 * 1024 * 1024;

/// Variable frame for a top-level run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSelect {
    /// Push a frame of its own.
    New,
    /// Share the locals of an existing frame, counted from the innermost
    /// (0). Out of range means the innermost; with no frames the run gets
    /// no frame at all.
    Alias(usize),
}

/// Per-run facts the dispatch loop needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunContext {
    pub in_function: bool,
    /// Namespace of the running function, for parent calls.
    pub namespace: Option<NamespaceId>,
    pub no_calls: bool,
}

impl Console {
    /// See [`CompiledUnit::exec`].
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn exec_unit(
        &mut self,
        unit: &Rc<CompiledUnit>,
        offset: u32,
        function_name: Option<Symbol>,
        namespace: Option<NamespaceId>,
        argv: &[String],
        no_calls: bool,
        package: Option<Symbol>,
        frame: FrameSelect,
    ) -> String {
        if self.exec_depth >= self.config.max_call_depth {
            let name = function_name.map(Symbol::as_str).unwrap_or("<top level>");
            self.warn(&format!(
                "{}: maximum call depth {} exceeded calling {name}",
                unit.file_line(offset),
                self.config.max_call_depth
            ));
            return String::new();
        }

        let function_call = !argv.is_empty();
        let mut pushed_frame = false;
        let ip;
        if function_call {
            let declared = unit.word(offset + 5);
            self.eval.push_frame(function_name, namespace, package);
            pushed_frame = true;
            let bound = (argv.len() as u32 - 1).min(declared);
            if let Some(scope) = self.eval.top_frame() {
                for i in 0..bound {
                    let param = Symbol::from_word(unit.word(offset + 6 + i));
                    scope.set_string(param, &argv[i as usize + 1]);
                }
            }
            ip = offset + 6 + declared;
            if self.config.trace {
                let line = format!(
                    "Entering {}({})",
                    self.call_label(function_name, namespace, package),
                    argv[1..].join(", ")
                );
                self.print(&line);
            }
        } else {
            ip = offset;
            match frame {
                FrameSelect::New => {
                    self.eval.push_frame(None, None, None);
                    pushed_frame = true;
                }
                FrameSelect::Alias(from_top) => {
                    let depth = self.eval.frame_depth();
                    if depth > 0 {
                        let index = depth - 1 - from_top.min(depth - 1);
                        self.eval.push_frame_ref(index);
                        pushed_frame = true;
                    }
                }
            }
        }

        let saved_unit = self.current_unit.replace(Rc::clone(unit));
        self.exec_depth += 1;
        let ctx = RunContext {
            in_function: function_call,
            namespace,
            no_calls,
        };
        let before = self.stack_depths();
        // Nested script calls re-enter here.
        let result = stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || self.run(unit, ip, ctx));
        let after = self.stack_depths();
        if after != before {
            error!(
                unit = unit.name().unwrap_or("<input>"),
                ?before,
                ?after,
                "stack imbalance after exec"
            );
            self.int_stack.truncate(before.int);
            self.float_stack.truncate(before.float);
        }
        self.exec_depth -= 1;
        self.current_unit = saved_unit;

        if function_call && self.config.trace {
            let line = format!(
                "Leaving {}() - return {result}",
                self.call_label(function_name, namespace, package)
            );
            self.print(&line);
        }
        if pushed_frame {
            self.eval.pop_frame();
        }
        result
    }

    /// `[pkg]ns::fn` for trace output.
    fn call_label(&self, name: Option<Symbol>, namespace: Option<NamespaceId>, package: Option<Symbol>) -> String {
        let mut label = String::new();
        if let Some(package) = package {
            label.push('[');
            label.push_str(package.as_str());
            label.push(']');
        }
        if let Some(ns_name) = namespace.and_then(|ns| self.namespaces.get(ns).name()) {
            label.push_str(ns_name.as_str());
            label.push_str("::");
        }
        label.push_str(name.map(Symbol::as_str).unwrap_or(""));
        label
    }

    // ----- variables -----

    fn undefined_variable(&mut self, name: Symbol) {
        if self.config.warn_undefined_variables {
            self.warn(&format!("Variable referenced before assignment: {name}"));
        }
    }

    fn no_frame_for(&mut self, name: Symbol) {
        self.warn(&format!("Accessing local variable {name} in global scope... failed"));
    }

    pub(crate) fn load_var_int(&mut self, name: Symbol) -> i32 {
        match self.eval.scope_for(name).and_then(|s| s.get_int(name)) {
            Some(v) => v,
            None => {
                self.undefined_variable(name);
                0
            }
        }
    }

    pub(crate) fn load_var_float(&mut self, name: Symbol) -> f64 {
        match self.eval.scope_for(name).and_then(|s| s.get_float(name)) {
            Some(v) => v,
            None => {
                self.undefined_variable(name);
                0.0
            }
        }
    }

    /// Load a variable into the current value.
    pub(crate) fn load_var_str(&mut self, name: Symbol) {
        let values = &mut self.values;
        let found = self
            .eval
            .scope_for(name)
            .and_then(|s| s.with_string(name, |text| values.set_str(text)));
        if found.is_none() {
            self.values.set_str("");
            self.undefined_variable(name);
        }
    }

    pub(crate) fn save_var_int(&mut self, name: Symbol, value: i32) {
        match self.eval.scope_for(name) {
            Some(scope) => scope.set_int(name, value),
            None => self.no_frame_for(name),
        }
    }

    pub(crate) fn save_var_float(&mut self, name: Symbol, value: f64) {
        match self.eval.scope_for(name) {
            Some(scope) => scope.set_float(name, value),
            None => self.no_frame_for(name),
        }
    }

    /// Store the current value into a variable.
    pub(crate) fn save_var_str(&mut self, name: Symbol) {
        match self.eval.scope_for(name) {
            Some(scope) => scope.set_string(name, self.values.get_str()),
            None => self.no_frame_for(name),
        }
    }
}
