//! Host object model consumed by the interpreter.
//!
//! The engine side of an object ([`SimObject`]) carries identity, name,
//! dispatch namespace and free-form dynamic fields. Class-specific
//! behaviour comes from a boxed [`HostObject`] supplied by the class
//! factory found in the [`ClassRegistry`].

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use crate::{
    intern::Symbol,
    util::fast_map::{FastHashMap, fast_hash_map_new},
    val,
};

use super::namespace::NamespaceId;

/// First id handed out to script-created objects.
pub const DYNAMIC_OBJECT_ID_FIRST: u32 = 1027;

pub type ObjectRef = Rc<SimObject>;

/// Class-specific behaviour of a creatable object.
pub trait HostObject {
    /// Read a class-defined field. `None` falls back to dynamic fields.
    fn get_field(&self, _field: &str, _index: &str) -> Option<String> {
        None
    }

    /// Write a class-defined field. Returns false to store it as a dynamic
    /// field instead.
    fn set_field(&mut self, _field: &str, _index: &str, _value: &str) -> bool {
        false
    }

    /// Consume the extra constructor arguments after class and name.
    fn process_arguments(&mut self, args: &[String]) -> bool {
        args.is_empty()
    }

    /// Called when the object is registered. Returning false aborts creation.
    fn on_add(&mut self) -> bool {
        true
    }

    fn is_group(&self) -> bool {
        false
    }
}

/// Plain object with only dynamic fields.
#[derive(Debug, Default)]
pub struct PlainObject;

impl HostObject for PlainObject {}

/// Object that owns child objects.
#[derive(Debug, Default)]
pub struct GroupObject;

impl HostObject for GroupObject {
    fn is_group(&self) -> bool {
        true
    }
}

pub struct SimObject {
    id: Cell<u32>,
    name: Cell<Symbol>,
    class_name: Symbol,
    namespace: Cell<Option<NamespaceId>>,
    fields: RefCell<FastHashMap<Symbol, String>>,
    children: RefCell<Vec<ObjectRef>>,
    host: RefCell<Box<dyn HostObject>>,
}

impl fmt::Debug for SimObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimObject")
            .field("id", &self.id.get())
            .field("name", &self.name())
            .field("class", &self.class_name.as_str())
            .finish()
    }
}

fn field_key(field: Symbol, index: &str) -> Symbol {
    if index.is_empty() {
        field
    } else {
        Symbol::intern(&format!("{field}{index}"))
    }
}

impl SimObject {
    pub fn new(class_name: Symbol, host: Box<dyn HostObject>) -> ObjectRef {
        Rc::new(Self {
            id: Cell::new(0),
            name: Cell::new(Symbol::EMPTY),
            class_name,
            namespace: Cell::new(None),
            fields: RefCell::new(fast_hash_map_new()),
            children: RefCell::new(Vec::new()),
            host: RefCell::new(host),
        })
    }

    /// Registry id, 0 until registered.
    pub fn id(&self) -> u32 {
        self.id.get()
    }

    pub fn name(&self) -> Option<&'static str> {
        let name = self.name.get();
        (!name.is_empty()).then(|| name.as_str())
    }

    pub(crate) fn name_symbol(&self) -> Symbol {
        self.name.get()
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name.as_str()
    }

    pub(crate) fn class_symbol(&self) -> Symbol {
        self.class_name
    }

    pub fn namespace(&self) -> Option<NamespaceId> {
        self.namespace.get()
    }

    pub(crate) fn set_namespace(&self, ns: NamespaceId) {
        self.namespace.set(Some(ns));
    }

    pub fn get_field(&self, field: Symbol, index: &str) -> String {
        if let Some(value) = self.host.borrow().get_field(field.as_str(), index) {
            return value;
        }
        self.fields
            .borrow()
            .get(&field_key(field, index))
            .cloned()
            .unwrap_or_default()
    }

    /// Setting a dynamic field to the empty string removes it.
    pub fn set_field(&self, field: Symbol, index: &str, value: &str) {
        if self.host.borrow_mut().set_field(field.as_str(), index, value) {
            return;
        }
        let key = field_key(field, index);
        let mut fields = self.fields.borrow_mut();
        if value.is_empty() {
            fields.remove(&key);
        } else {
            fields.insert(key, value.to_owned());
        }
    }

    /// Copy every dynamic field of `other` onto this object.
    pub fn assign_fields_from(&self, other: &SimObject) {
        if std::ptr::eq(self, other) {
            return;
        }
        let source = other.fields.borrow();
        let mut fields = self.fields.borrow_mut();
        for (key, value) in source.iter() {
            fields.insert(*key, value.clone());
        }
    }

    /// Dynamic field names, sorted.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.fields.borrow().keys().map(|k| k.as_str()).collect();
        names.sort_unstable_by_key(|n| n.to_ascii_lowercase());
        names
    }

    pub(crate) fn process_arguments(&self, args: &[String]) -> bool {
        self.host.borrow_mut().process_arguments(args)
    }

    pub(crate) fn on_add(&self) -> bool {
        self.host.borrow_mut().on_add()
    }

    pub fn is_group(&self) -> bool {
        self.host.borrow().is_group()
    }

    /// Adopt `child`. Fails unless this object is a group.
    pub fn add_child(&self, child: ObjectRef) -> bool {
        if !self.is_group() {
            return false;
        }
        let mut children = self.children.borrow_mut();
        if !children.iter().any(|c| Rc::ptr_eq(c, &child)) {
            children.push(child);
        }
        true
    }

    pub fn children(&self) -> Vec<ObjectRef> {
        self.children.borrow().clone()
    }
}

pub type ClassFactory = fn() -> Box<dyn HostObject>;

#[derive(Clone, Copy)]
pub struct ClassRep {
    pub name: Symbol,
    pub parent: Option<Symbol>,
    pub factory: ClassFactory,
}

impl fmt::Debug for ClassRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRep")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: FastHashMap<Symbol, ClassRep>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: Symbol, parent: Option<Symbol>, factory: ClassFactory) {
        self.classes.insert(name, ClassRep { name, parent, factory });
    }

    pub fn find_creatable_class(&self, name: Symbol) -> Option<&ClassRep> {
        self.classes.get(&name)
    }

    /// Instantiate an unregistered object of class `name`.
    pub fn create(&self, name: Symbol) -> Option<ObjectRef> {
        let rep = self.find_creatable_class(name)?;
        Some(SimObject::new(rep.name, (rep.factory)()))
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassRep> {
        self.classes.values()
    }
}

/// Live objects by id and by name.
#[derive(Debug)]
pub struct ObjectRegistry {
    by_id: FastHashMap<u32, ObjectRef>,
    by_name: FastHashMap<Symbol, u32>,
    next_id: u32,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self {
            by_id: fast_hash_map_new(),
            by_name: fast_hash_map_new(),
            next_id: DYNAMIC_OBJECT_ID_FIRST,
        }
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next free id and make the object findable.
    pub fn register(&mut self, object: &ObjectRef) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        object.id.set(id);
        self.by_id.insert(id, Rc::clone(object));
        let name = object.name.get();
        if !name.is_empty() {
            self.by_name.insert(name, id);
        }
        id
    }

    /// Rename an object; an empty name clears it.
    pub fn assign_name(&mut self, object: &ObjectRef, name: &str) {
        let old = object.name.get();
        if !old.is_empty() && self.by_name.get(&old) == Some(&object.id()) {
            self.by_name.remove(&old);
        }
        let sym = Symbol::intern(name);
        object.name.set(sym);
        if !sym.is_empty() && object.id() != 0 {
            self.by_name.insert(sym, object.id());
        }
    }

    pub fn unregister(&mut self, id: u32) -> Option<ObjectRef> {
        let object = self.by_id.remove(&id)?;
        let name = object.name.get();
        if self.by_name.get(&name) == Some(&id) {
            self.by_name.remove(&name);
        }
        object.id.set(0);
        Some(object)
    }

    pub fn find_by_id(&self, id: u32) -> Option<ObjectRef> {
        self.by_id.get(&id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ObjectRef> {
        let id = self.by_name.get(&Symbol::existing(name)?)?;
        self.find_by_id(*id)
    }

    /// Resolve a script reference: a numeric id or an object name.
    pub fn find(&self, reference: &str) -> Option<ObjectRef> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if reference.as_bytes()[0].is_ascii_digit() {
            return self.find_by_id(val::parse_int(reference) as u32);
        }
        self.find_by_name(reference)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Value type of a host field bound to a global variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    String,
}

impl FieldType {
    /// Canonical text a value takes after being stored in a field of this type.
    pub fn normalize(self, value: &str) -> String {
        match self {
            FieldType::Int => val::format_int(val::parse_int(value)),
            FieldType::Float => val::format_float(val::parse_float(value)),
            FieldType::Bool => if val::parse_bool(value) { "1" } else { "0" }.to_owned(),
            FieldType::String => value.to_owned(),
        }
    }
}
