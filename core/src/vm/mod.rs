//! Console bytecode subsystem
//!
//! Opcode definitions, the two-pass compiler, the persisted unit format,
//! the stack interpreter and the namespace/scope state it runs against.

mod bytecode;
mod caches;
mod compiler;
mod config;
mod console;
mod debugger;
pub mod dso;
mod eval_state;
mod host;
mod interp;
mod marshal;
mod namespace;
mod scope;
mod unit;
mod value_stack;

pub use bytecode::{CallType, Opcode, Operand, StackEffect, ValueEffect};
pub use compiler::Compiler;
pub use config::ConsoleConfig;
pub use console::{Console, LogLevel, StackDepths};
pub use debugger::{BreakpointList, Debugger};
pub use eval_state::{EvalState, is_global_name};
pub use host::{
    ClassFactory, ClassRegistry, ClassRep, DYNAMIC_OBJECT_ID_FIRST, FieldType, GroupObject, HostObject, ObjectRef,
    ObjectRegistry, PlainObject, SimObject,
};
pub use interp::FrameSelect;
pub use marshal::{ConsoleHandle, Mailbox};
pub use namespace::{
    BoolCallback, Callback, Entry, EntryKind, EntryRef, FloatCallback, IntCallback, MAX_ACTIVE_PACKAGES, Namespace,
    NamespaceId, NamespaceRegistry, StringCallback, VoidCallback,
};
pub use scope::ScopeDictionary;
pub use unit::{CompiledUnit, IdentFixup};
pub use value_stack::{RETURN_BUFFER_SPACE, ValueStack};

#[cfg(test)]
mod vm_test;
