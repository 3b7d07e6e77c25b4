//! The interpreter instance: every piece of state a running script can
//! touch, and the embedding API around it.

use std::{
    fmt,
    rc::{Rc, Weak},
};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::{ast::Program, intern::Symbol};

use super::{
    compiler::Compiler,
    config::ConsoleConfig,
    debugger::Debugger,
    dso::{self, LoadOutcome},
    eval_state::EvalState,
    host::{ClassFactory, ClassRegistry, FieldType, GroupObject, ObjectRef, ObjectRegistry, PlainObject, SimObject},
    interp::FrameSelect,
    namespace::{Callback, NamespaceId, NamespaceRegistry},
    unit::CompiledUnit,
    value_stack::ValueStack,
};

/// Severity of a line sent to console consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Normal,
    Warning,
    Error,
}

type Consumer = Box<dyn FnMut(LogLevel, &str)>;

/// Depths of every interpreter stack, for balance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackDepths {
    pub int: usize,
    pub float: usize,
    pub value: usize,
    pub value_frames: usize,
    pub eval_frames: usize,
}

pub struct Console {
    pub(crate) config: ConsoleConfig,
    pub(crate) namespaces: NamespaceRegistry,
    pub(crate) eval: EvalState,
    pub(crate) values: ValueStack,
    pub(crate) int_stack: Vec<i32>,
    pub(crate) float_stack: Vec<f64>,
    pub(crate) objects: ObjectRegistry,
    pub(crate) classes: ClassRegistry,
    pub(crate) debugger: Option<Box<dyn Debugger>>,
    consumers: Vec<Consumer>,
    /// Unit whose code is executing, held strongly for the duration.
    pub(crate) current_unit: Option<Rc<CompiledUnit>>,
    units: Vec<Weak<CompiledUnit>>,
    pub(crate) this_object: Option<ObjectRef>,
    pub(crate) exec_depth: usize,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("config", &self.config)
            .field("namespaces", &self.namespaces.len())
            .field("objects", &self.objects.len())
            .field("depths", &self.stack_depths())
            .finish()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self::with_config(ConsoleConfig::default())
    }

    pub fn with_config(config: ConsoleConfig) -> Self {
        let mut namespaces = NamespaceRegistry::new();
        namespaces.set_package_limit(config.package_limit);
        let mut console = Self {
            config,
            namespaces,
            eval: EvalState::new(),
            values: ValueStack::new(),
            int_stack: Vec::with_capacity(64),
            float_stack: Vec::with_capacity(64),
            objects: ObjectRegistry::new(),
            classes: ClassRegistry::new(),
            debugger: None,
            consumers: Vec::new(),
            current_unit: None,
            units: Vec::new(),
            this_object: None,
            exec_depth: 0,
        };
        console.register_class("SimObject", None, || Box::new(PlainObject));
        console.register_class("ScriptObject", Some("SimObject"), || Box::new(PlainObject));
        console.register_class("SimSet", Some("SimObject"), || Box::new(GroupObject));
        console.register_class("SimGroup", Some("SimSet"), || Box::new(GroupObject));
        console
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn set_trace(&mut self, on: bool) {
        self.config.trace = on;
    }

    // ----- output -----

    /// Receive every line printed, warned or errored from now on.
    pub fn add_consumer(&mut self, consumer: impl FnMut(LogLevel, &str) + 'static) {
        self.consumers.push(Box::new(consumer));
    }

    fn emit(&mut self, level: LogLevel, message: &str) {
        for consumer in &mut self.consumers {
            consumer(level, message);
        }
    }

    pub fn print(&mut self, message: &str) {
        info!(target: "conscript::console", "{message}");
        self.emit(LogLevel::Normal, message);
    }

    pub fn warn(&mut self, message: &str) {
        warn!(target: "conscript::console", "{message}");
        self.emit(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: &str) {
        error!(target: "conscript::console", "{message}");
        self.emit(LogLevel::Error, message);
    }

    // ----- units -----

    /// Compile a statement tree into a unit tracked by this console.
    pub fn compile(&mut self, name: Option<&str>, program: &Program) -> Result<Rc<CompiledUnit>> {
        let unit = Rc::new(Compiler::new().compile_program(name, &program.statements)?);
        self.track_unit(&unit);
        Ok(unit)
    }

    /// Read a persisted unit. `Ok(None)` means the image is stale and the
    /// source should be recompiled.
    pub fn load_unit(&mut self, bytes: &[u8], name: Option<&str>) -> Result<Option<Rc<CompiledUnit>>> {
        match dso::read_unit(bytes, name)? {
            LoadOutcome::Loaded(unit) => {
                let unit = Rc::new(unit);
                self.track_unit(&unit);
                Ok(Some(unit))
            }
            LoadOutcome::Stale { found, expected } => {
                debug!(found, expected, unit = name.unwrap_or("<input>"), "discarding stale persisted unit");
                Ok(None)
            }
        }
    }

    fn track_unit(&mut self, unit: &Rc<CompiledUnit>) {
        self.units.retain(|u| u.strong_count() > 0);
        self.units.push(Rc::downgrade(unit));
        debug!(unit = unit.name().unwrap_or("<input>"), words = unit.code_len(), "unit loaded");
        if let Some(mut debugger) = self.debugger.take() {
            debugger.unit_loaded(unit);
            if self.debugger.is_none() {
                self.debugger = Some(debugger);
            }
        }
    }

    /// Live units, oldest first.
    pub fn units(&self) -> Vec<Rc<CompiledUnit>> {
        self.units.iter().filter_map(Weak::upgrade).collect()
    }

    /// Most recently loaded live unit named `name`.
    pub fn find_unit(&self, name: &str) -> Option<Rc<CompiledUnit>> {
        let sym = Symbol::existing(name)?;
        self.units
            .iter()
            .rev()
            .filter_map(Weak::upgrade)
            .find(|u| u.name_symbol() == Some(sym))
    }

    /// Run the top-level statements of `unit` in a fresh frame.
    pub fn run_unit(&mut self, unit: &Rc<CompiledUnit>) -> String {
        unit.exec(self, 0, None, None, &[], false, None, FrameSelect::New)
    }

    /// Compile and run `program` in the innermost existing frame, so its
    /// locals are the caller's.
    pub fn eval_program(&mut self, name: Option<&str>, program: &Program) -> Result<String> {
        let unit = self.compile(name, program)?;
        Ok(unit.exec(self, 0, None, None, &[], false, None, FrameSelect::Alias(0)))
    }

    /// Compile and run `program` as a file: a frame of its own.
    pub fn exec_file_program(&mut self, name: Option<&str>, program: &Program) -> Result<String> {
        let unit = self.compile(name, program)?;
        Ok(self.run_unit(&unit))
    }

    /// [`eval_program`](Self::eval_program) on a JSON statement tree.
    pub fn evaluate_json(&mut self, json: &str) -> Result<String> {
        let program = Program::from_json(json)?;
        self.eval_program(None, &program)
    }

    // ----- calls -----

    /// Call the global function `argv[0]` with the remaining arguments.
    pub fn execute(&mut self, argv: &[&str]) -> String {
        let Some(&name) = argv.first() else { return String::new() };
        let fn_name = Symbol::intern(name);
        let argv: Vec<String> = argv.iter().map(|a| (*a).to_owned()).collect();
        match self.namespaces.resolve(NamespaceId::GLOBAL, fn_name) {
            Some(at) => self.invoke(at, fn_name, &argv, None).into_string(),
            None => {
                self.warn(&format!("{name}: Unknown command."));
                String::new()
            }
        }
    }

    /// Call method `argv[0]` on `object`; the object's id is passed as the
    /// first script argument.
    pub fn execute_on(&mut self, object: &ObjectRef, argv: &[&str]) -> String {
        let Some(&name) = argv.first() else { return String::new() };
        let fn_name = Symbol::intern(name);
        let mut full = Vec::with_capacity(argv.len() + 1);
        full.push(name.to_owned());
        full.push(object.id().to_string());
        full.extend(argv[1..].iter().map(|a| (*a).to_owned()));
        let found = object.namespace().and_then(|ns| self.namespaces.resolve(ns, fn_name));
        match found {
            Some(at) => self.invoke(at, fn_name, &full, Some(Rc::clone(object))).into_string(),
            None => {
                self.warn(&format!(
                    "{}: Unknown command {name}. (object {})",
                    object.class_name(),
                    object.id()
                ));
                String::new()
            }
        }
    }

    pub fn is_function(&mut self, namespace: Option<&str>, name: &str) -> bool {
        let ns = match namespace {
            Some(ns) => match Symbol::existing(ns).and_then(|sym| self.namespaces.find_existing(Some(sym), None)) {
                Some(id) => id,
                None => return false,
            },
            None => NamespaceId::GLOBAL,
        };
        let Some(sym) = Symbol::existing(name) else { return false };
        self.namespaces.lookup(ns, sym).is_some_and(|e| e.is_callable())
    }

    // ----- registration -----

    fn namespace_for(&mut self, namespace: Option<&str>) -> NamespaceId {
        match namespace {
            Some(ns) if !ns.is_empty() => self.namespaces.find(Some(Symbol::intern(ns)), None),
            _ => NamespaceId::GLOBAL,
        }
    }

    /// Register a native command. `min_args`/`max_args` count `argv[0]`;
    /// zero means unchecked.
    pub fn add_command(
        &mut self,
        namespace: Option<&str>,
        name: &str,
        callback: Callback,
        usage: &str,
        min_args: u32,
        max_args: u32,
    ) {
        let ns = self.namespace_for(namespace);
        self.namespaces
            .add_command(ns, Symbol::intern(name), callback, usage, min_args, max_args);
    }

    pub fn add_overload(&mut self, namespace: Option<&str>, name: &str, alt_usage: &str) {
        let ns = self.namespace_for(namespace);
        self.namespaces.add_overload(ns, Symbol::intern(name), alt_usage);
    }

    pub fn mark_group(&mut self, namespace: Option<&str>, group: &str, usage: Option<&str>) {
        let ns = self.namespace_for(namespace);
        self.namespaces.mark_group(ns, Symbol::intern(group), usage);
    }

    /// Make `parent` the class parent of `child`.
    pub fn link_namespaces(&mut self, parent: &str, child: &str) -> bool {
        let parent = self.namespaces.find(Some(Symbol::intern(parent)), None);
        let child = self.namespaces.find(Some(Symbol::intern(child)), None);
        self.namespaces.class_link_to(child, parent)
    }

    pub fn unlink_namespaces(&mut self, parent: &str, child: &str) -> bool {
        let parent = self.namespaces.find(Some(Symbol::intern(parent)), None);
        let child = self.namespaces.find(Some(Symbol::intern(child)), None);
        self.namespaces.unlink_class(child, parent)
    }

    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Commands visible from `namespace`, one per line.
    pub fn dump_commands(&self, namespace: Option<&str>) -> Vec<String> {
        let ns = match namespace {
            Some(name) => match Symbol::existing(name).and_then(|sym| self.namespaces.find_existing(Some(sym), None)) {
                Some(id) => id,
                None => return Vec::new(),
            },
            None => NamespaceId::GLOBAL,
        };
        self.namespaces.dump_entries(ns)
    }

    // ----- packages -----

    pub fn activate_package(&mut self, name: &str) -> Result<()> {
        self.namespaces.activate_package(Symbol::intern(name))
    }

    pub fn deactivate_package(&mut self, name: &str) -> bool {
        match Symbol::existing(name) {
            Some(sym) => self.namespaces.deactivate_package(sym),
            None => false,
        }
    }

    pub fn is_package(&self, name: &str) -> bool {
        Symbol::existing(name).is_some_and(|sym| self.namespaces.is_package(sym))
    }

    // ----- variables -----

    fn global_symbol(name: &str) -> Symbol {
        if name.starts_with('$') {
            Symbol::intern(name)
        } else {
            Symbol::intern(&format!("${name}"))
        }
    }

    /// Read a global; the `$` is optional.
    pub fn get_variable(&self, name: &str) -> String {
        let sym = Self::global_symbol(name);
        self.eval.globals.get_string(sym).unwrap_or_default()
    }

    pub fn set_variable(&mut self, name: &str, value: &str) {
        let sym = Self::global_symbol(name);
        self.eval.globals.set_string(sym, value);
    }

    /// Read a local of the innermost frame.
    pub fn get_local_variable(&self, name: &str) -> Option<String> {
        let sym = Symbol::existing(name)?;
        self.eval.top_frame()?.get_string(sym)
    }

    /// Bind a global to a typed field of `object`; reads and writes of the
    /// variable go to the field.
    pub fn bind_variable(&mut self, name: &str, object: &ObjectRef, field: &str, ty: FieldType) {
        let sym = Self::global_symbol(name);
        self.eval.globals.bind_field(sym, object, Symbol::intern(field), ty);
    }

    pub fn eval_state(&self) -> &EvalState {
        &self.eval
    }

    /// `->[pkg]ns::fn` for every function frame, outermost first.
    pub fn backtrace(&self) -> String {
        let namespaces = &self.namespaces;
        self.eval.backtrace(|ns| namespaces.get(ns).name())
    }

    // ----- objects -----

    pub fn register_class(&mut self, name: &str, parent: Option<&str>, factory: ClassFactory) {
        let class = Symbol::intern(name);
        let parent_class = parent.map(Symbol::intern);
        self.classes.register(class, parent_class, factory);
        if let Some(parent_class) = parent_class {
            let child_ns = self.namespaces.find(Some(class), None);
            let parent_ns = self.namespaces.find(Some(parent_class), None);
            self.namespaces.class_link_to(child_ns, parent_ns);
        }
    }

    pub fn find_object(&self, reference: &str) -> Option<ObjectRef> {
        self.objects.find(reference)
    }

    /// Create and register an object from the host side.
    pub fn create_object(&mut self, class_name: &str, name: &str) -> Option<ObjectRef> {
        let Some(object) = self.classes.create(Symbol::intern(class_name)) else {
            self.warn(&format!("Unable to instantiate non-conobject class {class_name}."));
            return None;
        };
        if !name.is_empty() {
            self.objects.assign_name(&object, name);
        }
        if self.register_object(&object) { Some(object) } else { None }
    }

    /// Give `object` an id and a dispatch namespace, then run its add hook.
    pub(crate) fn register_object(&mut self, object: &ObjectRef) -> bool {
        let id = self.objects.register(object);
        let class_ns = self.namespaces.find(Some(object.class_symbol()), None);
        let name = object.name_symbol();
        let mut linked = None;
        let ns = if name.is_empty() {
            class_ns
        } else {
            let own = self.namespaces.find(Some(name), None);
            if self.namespaces.class_link_to(own, class_ns) {
                linked = Some(own);
                own
            } else {
                class_ns
            }
        };
        object.set_namespace(ns);
        if object.on_add() {
            return true;
        }
        if let Some(own) = linked {
            self.namespaces.unlink_class(own, class_ns);
        }
        self.objects.unregister(id);
        false
    }

    /// Unregister `object` and its children.
    pub fn delete_object(&mut self, object: &SimObject) {
        for child in object.children() {
            self.delete_object(&child);
        }
        if let Some(ns) = object.namespace() {
            let class_ns = self.namespaces.find(Some(object.class_symbol()), None);
            if ns != class_ns {
                self.namespaces.unlink_class(ns, class_ns);
            }
        }
        self.objects.unregister(object.id());
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    /// Object a method call is running on, if any.
    pub fn this_object(&self) -> Option<&ObjectRef> {
        self.this_object.as_ref()
    }

    // ----- debugging -----

    /// Install a debugger, returning the previous one.
    pub fn set_debugger(&mut self, debugger: Option<Box<dyn Debugger>>) -> Option<Box<dyn Debugger>> {
        std::mem::replace(&mut self.debugger, debugger)
    }

    pub(crate) fn notify_breakpoint(&mut self, unit: &Rc<CompiledUnit>, line: u32) {
        let Some(mut debugger) = self.debugger.take() else { return };
        debugger.execution_stopped(self, unit, line);
        if self.debugger.is_none() {
            self.debugger = Some(debugger);
        }
    }

    pub fn stack_depths(&self) -> StackDepths {
        StackDepths {
            int: self.int_stack.len(),
            float: self.float_stack.len(),
            value: self.values.depth(),
            value_frames: self.values.frame_depth(),
            eval_frames: self.eval.frame_depth(),
        }
    }
}
