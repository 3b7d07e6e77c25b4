//! Variable tables.
//!
//! One [`ScopeDictionary`] holds the globals and one more is created per
//! script call frame. A dictionary may alias another's table so a nested
//! top-level block can write the enclosing frame's locals directly.

use std::{
    borrow::Cow,
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    intern::Symbol,
    util::{
        fast_map::{FastHashMap, fast_hash_map_new},
        wildcard_match,
    },
    val,
};

use super::{
    host::{FieldType, SimObject},
    namespace::NamespaceId,
};

/// Strings at least this long skip the eager numeric conversion.
const EAGER_NUMERIC_LIMIT: usize = 256;

#[derive(Debug, Clone)]
enum VarValue {
    Int(i32),
    Float(f64),
    Str { text: String, int: i32, float: f64 },
    /// Global bound to a typed field of a host object. The object owns the
    /// storage.
    Bound {
        object: Weak<SimObject>,
        field: Symbol,
        ty: FieldType,
    },
}

impl VarValue {
    fn from_str(text: &str) -> Self {
        let (int, float) = if text.len() < EAGER_NUMERIC_LIMIT {
            (val::parse_int(text), val::parse_float(text))
        } else {
            (0, 0.0)
        };
        VarValue::Str {
            text: text.to_owned(),
            int,
            float,
        }
    }

    fn read_bound(object: &Weak<SimObject>, field: Symbol) -> String {
        object.upgrade().map(|o| o.get_field(field, "")).unwrap_or_default()
    }

    fn int(&self) -> i32 {
        match self {
            VarValue::Int(v) => *v,
            VarValue::Float(v) => *v as i32,
            VarValue::Str { int, .. } => *int,
            VarValue::Bound { object, field, .. } => val::parse_int(&Self::read_bound(object, *field)),
        }
    }

    fn float(&self) -> f64 {
        match self {
            VarValue::Int(v) => *v as f64,
            VarValue::Float(v) => *v,
            VarValue::Str { float, .. } => *float,
            VarValue::Bound { object, field, .. } => val::parse_float(&Self::read_bound(object, *field)),
        }
    }

    fn string(&self) -> Cow<'_, str> {
        match self {
            VarValue::Int(v) => Cow::Owned(val::format_int(*v)),
            VarValue::Float(v) => Cow::Owned(val::format_float(*v)),
            VarValue::Str { text, .. } => Cow::Borrowed(text),
            VarValue::Bound { object, field, .. } => Cow::Owned(Self::read_bound(object, *field)),
        }
    }

    /// Store into a bound field, returning false for internal values.
    fn write_through(&self, text: &str) -> bool {
        match self {
            VarValue::Bound { object, field, ty } => {
                if let Some(object) = object.upgrade() {
                    object.set_field(*field, "", &ty.normalize(text));
                }
                true
            }
            _ => false,
        }
    }
}

type VarTable = FastHashMap<Symbol, VarValue>;

#[derive(Debug)]
pub struct ScopeDictionary {
    table: Rc<RefCell<VarTable>>,
    aliased: bool,
    /// Function this frame belongs to.
    pub scope_name: Option<Symbol>,
    pub namespace: Option<NamespaceId>,
    pub package: Option<Symbol>,
}

impl Default for ScopeDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeDictionary {
    pub fn new() -> Self {
        Self {
            table: Rc::new(RefCell::new(fast_hash_map_new())),
            aliased: false,
            scope_name: None,
            namespace: None,
            package: None,
        }
    }

    pub fn for_call(scope_name: Option<Symbol>, namespace: Option<NamespaceId>, package: Option<Symbol>) -> Self {
        Self {
            scope_name,
            namespace,
            package,
            ..Self::new()
        }
    }

    /// A dictionary sharing `other`'s variables.
    pub fn alias_of(other: &ScopeDictionary) -> Self {
        Self {
            table: Rc::clone(&other.table),
            aliased: true,
            scope_name: other.scope_name,
            namespace: other.namespace,
            package: other.package,
        }
    }

    pub fn is_alias(&self) -> bool {
        self.aliased
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.borrow().is_empty()
    }

    pub fn contains(&self, name: Symbol) -> bool {
        self.table.borrow().contains_key(&name)
    }

    pub fn get_int(&self, name: Symbol) -> Option<i32> {
        self.table.borrow().get(&name).map(VarValue::int)
    }

    pub fn get_float(&self, name: Symbol) -> Option<f64> {
        self.table.borrow().get(&name).map(VarValue::float)
    }

    pub fn get_string(&self, name: Symbol) -> Option<String> {
        self.table.borrow().get(&name).map(|v| v.string().into_owned())
    }

    /// Run `f` on the string form without cloning internal strings.
    pub fn with_string<R>(&self, name: Symbol, f: impl FnOnce(&str) -> R) -> Option<R> {
        let table = self.table.borrow();
        let value = table.get(&name)?;
        Some(f(&value.string()))
    }

    pub fn set_int(&self, name: Symbol, value: i32) {
        let mut table = self.table.borrow_mut();
        let bound = table.get(&name).is_some_and(|existing| existing.write_through(&val::format_int(value)));
        if !bound {
            table.insert(name, VarValue::Int(value));
        }
    }

    pub fn set_float(&self, name: Symbol, value: f64) {
        let mut table = self.table.borrow_mut();
        let bound = table.get(&name).is_some_and(|existing| existing.write_through(&val::format_float(value)));
        if !bound {
            table.insert(name, VarValue::Float(value));
        }
    }

    pub fn set_string(&self, name: Symbol, value: &str) {
        let mut table = self.table.borrow_mut();
        let bound = table.get(&name).is_some_and(|existing| existing.write_through(value));
        if !bound {
            table.insert(name, VarValue::from_str(value));
        }
    }

    /// Bind `name` to a field of `object`. Reads and writes go to the
    /// object; the binding lapses silently once the object is dropped.
    pub fn bind_field(&self, name: Symbol, object: &Rc<SimObject>, field: Symbol, ty: FieldType) {
        self.table.borrow_mut().insert(
            name,
            VarValue::Bound {
                object: Rc::downgrade(object),
                field,
                ty,
            },
        );
    }

    pub fn remove(&self, name: Symbol) -> bool {
        self.table.borrow_mut().remove(&name).is_some()
    }

    pub fn clear(&self) {
        self.table.borrow_mut().clear();
    }

    /// Variable names, sorted case-insensitively.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.table.borrow().keys().map(|k| k.as_str()).collect();
        names.sort_unstable_by_key(|n| n.to_ascii_lowercase());
        names
    }

    /// `(name, value)` pairs whose names match a `*`/`?` pattern.
    pub fn export_variables(&self, pattern: &str) -> Vec<(String, String)> {
        let table = self.table.borrow();
        let mut out: Vec<(String, String)> = table
            .iter()
            .filter(|(name, _)| wildcard_match(pattern, name.as_str()))
            .map(|(name, value)| (name.as_str().to_owned(), value.string().into_owned()))
            .collect();
        out.sort_by_key(|(name, _)| name.to_ascii_lowercase());
        out
    }

    /// Remove every variable matching `pattern`; returns how many went.
    pub fn delete_variables(&self, pattern: &str) -> usize {
        let mut table = self.table.borrow_mut();
        let before = table.len();
        table.retain(|name, _| !wildcard_match(pattern, name.as_str()));
        before - table.len()
    }

    pub fn variables_exist(&self, pattern: &str) -> bool {
        self.table.borrow().keys().any(|name| wildcard_match(pattern, name.as_str()))
    }

    /// Names starting with `prefix`, for console completion.
    pub fn tab_complete(&self, prefix: &str) -> Vec<&'static str> {
        let prefix = prefix.to_ascii_lowercase();
        self.names()
            .into_iter()
            .filter(|n| n.to_ascii_lowercase().starts_with(&prefix))
            .collect()
    }
}
