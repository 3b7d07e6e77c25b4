//! Global variables plus the stack of call-frame scopes.

use crate::intern::Symbol;

use super::{namespace::NamespaceId, scope::ScopeDictionary};

#[derive(Debug, Default)]
pub struct EvalState {
    pub globals: ScopeDictionary,
    frames: Vec<ScopeDictionary>,
}

/// `$name` is global, anything else is local to the innermost frame.
#[inline]
pub fn is_global_name(name: Symbol) -> bool {
    name.as_str().starts_with('$')
}

impl EvalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, scope_name: Option<Symbol>, namespace: Option<NamespaceId>, package: Option<Symbol>) {
        self.frames.push(ScopeDictionary::for_call(scope_name, namespace, package));
    }

    /// Push a frame aliasing the one at `stack_index` (0 is the outermost).
    pub fn push_frame_ref(&mut self, stack_index: usize) {
        let Some(target) = self.frames.get(stack_index) else {
            return;
        };
        let alias = ScopeDictionary::alias_of(target);
        self.frames.push(alias);
    }

    pub fn pop_frame(&mut self) -> Option<ScopeDictionary> {
        self.frames.pop()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top_frame(&self) -> Option<&ScopeDictionary> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[ScopeDictionary] {
        &self.frames
    }

    /// Dictionary that `name` lives in, `None` for a local with no frame.
    #[inline]
    pub fn scope_for(&self, name: Symbol) -> Option<&ScopeDictionary> {
        if is_global_name(name) { Some(&self.globals) } else { self.frames.last() }
    }

    /// `->[pkg]ns::fn->...` from the outermost frame inwards.
    pub fn backtrace(&self, namespace_name: impl Fn(NamespaceId) -> Option<Symbol>) -> String {
        let mut out = String::new();
        for frame in self.frames.iter().filter(|f| !f.is_alias()) {
            out.push_str("->");
            if let Some(package) = frame.package {
                out.push('[');
                out.push_str(package.as_str());
                out.push(']');
            }
            if let Some(ns_name) = frame.namespace.and_then(&namespace_name) {
                out.push_str(ns_name.as_str());
                out.push_str("::");
            }
            out.push_str(frame.scope_name.map(Symbol::as_str).unwrap_or(""));
        }
        out
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.globals.clear();
    }
}
