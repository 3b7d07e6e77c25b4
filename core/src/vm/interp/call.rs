use std::rc::Rc;

use crate::{
    intern::Symbol,
    val,
    vm::{
        Console,
        bytecode::{CallType, Opcode},
        host::ObjectRef,
        namespace::{Callback, EntryKind, EntryRef, NamespaceId},
        unit::CompiledUnit,
    },
};

use super::{FrameSelect, RunContext};

/// What a call produced, before it is stored anywhere.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CallOutcome {
    Str(String),
    Int(i32),
    Float(f64),
    Void,
}

impl CallOutcome {
    pub(crate) fn into_string(self) -> String {
        match self {
            CallOutcome::Str(s) => s,
            CallOutcome::Int(v) => val::format_int(v),
            CallOutcome::Float(v) => val::format_float(v),
            CallOutcome::Void => String::new(),
        }
    }
}

impl Console {
    /// Run the entry at `at` with `argv` (`argv[0]` is the called name).
    /// A method call passes its receiver as `object`, which becomes `this`
    /// for the duration; with `None` the caller's `this` is kept.
    pub(crate) fn invoke(
        &mut self,
        at: EntryRef,
        fn_name: Symbol,
        argv: &[String],
        object: Option<ObjectRef>,
    ) -> CallOutcome {
        let Some(entry) = self.namespaces.entry(at) else {
            self.warn(&format!("{fn_name}: Unknown command."));
            return CallOutcome::Str(String::new());
        };
        let owner = entry.namespace;
        let package = entry.package;
        let (min_args, max_args) = (entry.min_args, entry.max_args);
        let usage = entry.usage.clone();
        let kind = entry.kind.clone();

        let saved_this = object.map(|obj| std::mem::replace(&mut self.this_object, Some(obj)));
        let outcome = match kind {
            EntryKind::Script { unit, offset } => {
                if offset == 0 {
                    CallOutcome::Str(String::new())
                } else {
                    let ret = unit.exec(self, offset, Some(fn_name), Some(owner), argv, false, package, FrameSelect::New);
                    CallOutcome::Str(ret)
                }
            }
            EntryKind::Native(callback) => {
                let argc = argv.len() as u32;
                if (min_args != 0 && argc < min_args) || (max_args != 0 && argc > max_args) {
                    let ns = self.namespaces.display_name(owner);
                    self.warn(&format!("{ns}::{fn_name} - wrong number of arguments."));
                    self.warn(&format!("usage: {}", usage.as_deref().unwrap_or("")));
                    CallOutcome::Str(String::new())
                } else {
                    let this = self.this_object.clone();
                    match callback {
                        Callback::String(f) => CallOutcome::Str(f(self, this.as_ref(), argv)),
                        Callback::Int(f) => CallOutcome::Int(f(self, this.as_ref(), argv)),
                        Callback::Float(f) => CallOutcome::Float(f(self, this.as_ref(), argv)),
                        Callback::Bool(f) => CallOutcome::Int(i32::from(f(self, this.as_ref(), argv))),
                        Callback::Void(f) => {
                            f(self, this.as_ref(), argv);
                            CallOutcome::Void
                        }
                    }
                }
            }
            EntryKind::Invalid | EntryKind::GroupMarker { .. } | EntryKind::OverloadMarker { .. } => {
                self.warn(&format!("{fn_name}: Unknown command."));
                CallOutcome::Str(String::new())
            }
        };
        if let Some(saved) = saved_this {
            self.this_object = saved;
        }
        outcome
    }

    /// `CALLFUNC`/`CALLFUNC_RESOLVE`. `ip` points at the operands on entry
    /// and past the instruction, plus any coercion consumed, on return.
    ///
    /// Int and float results feed a following `STR_TO_UINT`/`STR_TO_FLT`
    /// directly and skip it. A void result only skips `STR_TO_NONE`; the
    /// other coercions then convert the empty string.
    pub(super) fn dispatch_call(&mut self, unit: &Rc<CompiledUnit>, ip: &mut u32, ctx: RunContext) {
        let call_ip = *ip - 1;
        let fn_name = Symbol::from_word(unit.word(*ip));
        let ns_name = Symbol::from_word(unit.word(*ip + 1));
        let call_type = CallType::from_word(unit.word(*ip + 2));
        *ip += 3;

        let argv = self.values.get_argc_argv(fn_name);
        if ctx.no_calls {
            self.values.set_str("");
            return;
        }

        let mut object = None;
        let target = match call_type {
            CallType::Function => self.resolve_function(unit, call_ip, ns_name, fn_name),
            CallType::Method => {
                let reference = argv.get(1).map(String::as_str).unwrap_or("");
                let Some(found) = self.objects.find(reference) else {
                    self.warn(&format!(
                        "{}: Unable to find object: '{reference}' attempting to call function '{fn_name}'",
                        unit.file_line(call_ip)
                    ));
                    self.values.set_str("");
                    return;
                };
                let target = found.namespace().and_then(|ns| self.namespaces.resolve(ns, fn_name));
                object = Some(found);
                target
            }
            CallType::Parent => {
                let parent = ctx.namespace.and_then(|ns| self.namespaces.parent(ns));
                parent.and_then(|ns| self.namespaces.resolve(ns, fn_name))
            }
        };

        let Some(at) = target else {
            let message = match &object {
                Some(obj) => format!(
                    "{}: Unknown command {fn_name}.\n  Object {}({}) {}",
                    unit.file_line(call_ip),
                    obj.name().unwrap_or(""),
                    obj.id(),
                    obj.class_name()
                ),
                None if ns_name.is_empty() => format!("{}: Unknown command {fn_name}.", unit.file_line(call_ip)),
                None => format!("{}: Unknown command {ns_name}::{fn_name}.", unit.file_line(call_ip)),
            };
            self.warn(&message);
            self.values.set_str("");
            return;
        };

        match self.invoke(at, fn_name, &argv, object) {
            CallOutcome::Str(s) => self.values.set_str(&s),
            CallOutcome::Int(v) => match Opcode::from_word(unit.word(*ip)) {
                Some(Opcode::StrToUint) => {
                    self.int_stack.push(v);
                    *ip += 1;
                }
                Some(Opcode::StrToFlt) => {
                    self.float_stack.push(f64::from(v));
                    *ip += 1;
                }
                Some(Opcode::StrToNone) => *ip += 1,
                _ => self.values.set_int(v),
            },
            CallOutcome::Float(v) => match Opcode::from_word(unit.word(*ip)) {
                Some(Opcode::StrToUint) => {
                    self.int_stack.push(v as i32);
                    *ip += 1;
                }
                Some(Opcode::StrToFlt) => {
                    self.float_stack.push(v);
                    *ip += 1;
                }
                Some(Opcode::StrToNone) => *ip += 1,
                _ => self.values.set_float(v),
            },
            CallOutcome::Void => match Opcode::from_word(unit.word(*ip)) {
                Some(Opcode::StrToNone) => *ip += 1,
                _ => self.values.set_str(""),
            },
        }
    }

    /// Global or `ns::fn` lookup through the unit's call-site cache.
    fn resolve_function(
        &mut self,
        unit: &CompiledUnit,
        call_ip: u32,
        ns_name: Symbol,
        fn_name: Symbol,
    ) -> Option<EntryRef> {
        let generation = self.namespaces.generation();
        if let Some(hit) = unit.call_sites.get(call_ip, generation) {
            return Some(hit);
        }
        let ns = if ns_name.is_empty() {
            NamespaceId::GLOBAL
        } else {
            self.namespaces.find(Some(ns_name), None)
        };
        let found = self.namespaces.resolve(ns, fn_name)?;
        // Resolving may rebuild an index but never bumps the generation.
        unit.call_sites.store(call_ip, self.namespaces.generation(), found);
        Some(found)
    }
}
