//! Name dispatch: parent-chained namespaces, package overrides and the
//! lazily rebuilt lookup index.
//!
//! Namespaces live in an arena owned by [`NamespaceRegistry`] and refer to
//! each other by [`NamespaceId`]. Two namespaces may share a name when their
//! package tags differ. Activating a package splices each of its tagged
//! namespaces in front of the untagged namespace of the same name and swaps
//! their entry lists, so anything holding the untagged id (objects, the
//! global scope) sees the override without being told.

use std::{fmt, rc::Rc};

use anyhow::{Result, bail};
use tracing::{debug, error};

use crate::{
    intern::Symbol,
    util::fast_map::{FastHashMap, FastHashSet, fast_hash_map_new, fast_hash_set_new, fx_hash_u32},
};

use super::{Console, host::ObjectRef, unit::CompiledUnit};

pub const MAX_ACTIVE_PACKAGES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(u32);

impl NamespaceId {
    pub const GLOBAL: NamespaceId = NamespaceId(0);

    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Position of an entry: owning namespace plus slot in its entry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    pub namespace: NamespaceId,
    pub index: u32,
}

pub type StringCallback = fn(&mut Console, Option<&ObjectRef>, &[String]) -> String;
pub type IntCallback = fn(&mut Console, Option<&ObjectRef>, &[String]) -> i32;
pub type FloatCallback = fn(&mut Console, Option<&ObjectRef>, &[String]) -> f64;
pub type VoidCallback = fn(&mut Console, Option<&ObjectRef>, &[String]);
pub type BoolCallback = fn(&mut Console, Option<&ObjectRef>, &[String]) -> bool;

/// A native command in one of the five return shapes. `argv[0]` is the
/// command name.
#[derive(Clone, Copy)]
pub enum Callback {
    String(StringCallback),
    Int(IntCallback),
    Float(FloatCallback),
    Void(VoidCallback),
    Bool(BoolCallback),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Callback::String(_) => "string",
            Callback::Int(_) => "int",
            Callback::Float(_) => "float",
            Callback::Void(_) => "void",
            Callback::Bool(_) => "bool",
        };
        write!(f, "Callback::{kind}")
    }
}

#[derive(Clone, Debug)]
pub enum EntryKind {
    /// Cleared slot left behind by an in-place replacement.
    Invalid,
    /// Script function. Offset 0 means the body is empty.
    Script { unit: Rc<CompiledUnit>, offset: u32 },
    Native(Callback),
    /// Documentation marker opening a group of related commands.
    GroupMarker { group: Symbol },
    /// Documentation marker carrying an alternate usage string.
    OverloadMarker { of: Symbol },
}

#[derive(Clone, Debug)]
pub struct Entry {
    /// Namespace whose list currently holds this entry.
    pub namespace: NamespaceId,
    pub name: Symbol,
    pub package: Option<Symbol>,
    pub kind: EntryKind,
    pub min_args: u32,
    pub max_args: u32,
    pub usage: Option<Rc<str>>,
}

impl Entry {
    fn blank(namespace: NamespaceId, name: Symbol) -> Self {
        Self {
            namespace,
            name,
            package: None,
            kind: EntryKind::Invalid,
            min_args: 0,
            max_args: 0,
            usage: None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, EntryKind::Script { .. } | EntryKind::Native(_))
    }

    fn is_live(&self) -> bool {
        !matches!(self.kind, EntryKind::Invalid)
    }
}

#[derive(Debug, Default)]
struct LookupIndex {
    slots: Box<[Option<EntryRef>]>,
}

#[derive(Debug)]
pub struct Namespace {
    name: Option<Symbol>,
    package: Option<Symbol>,
    parent: Option<NamespaceId>,
    entries: Vec<Entry>,
    class_link_refs: u32,
    index: Option<(u64, Rc<LookupIndex>)>,
}

impl Namespace {
    fn new(name: Option<Symbol>, package: Option<Symbol>) -> Self {
        Self {
            name,
            package,
            parent: None,
            entries: Vec::new(),
            class_link_refs: 0,
            index: None,
        }
    }

    pub fn name(&self) -> Option<Symbol> {
        self.name
    }

    pub fn package(&self) -> Option<Symbol> {
        self.package
    }

    pub fn parent(&self) -> Option<NamespaceId> {
        self.parent
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

#[derive(Debug)]
pub struct NamespaceRegistry {
    spaces: Vec<Namespace>,
    by_name: FastHashMap<(Option<Symbol>, Option<Symbol>), NamespaceId>,
    generation: u64,
    active_packages: Vec<Symbol>,
    saved_packages: Vec<Symbol>,
    package_limit: usize,
    marker_uid: u32,
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(name: Option<Symbol>) -> Option<Symbol> {
    name.filter(|n| !n.is_empty())
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        let mut by_name = fast_hash_map_new();
        by_name.insert((None, None), NamespaceId::GLOBAL);
        Self {
            spaces: vec![Namespace::new(None, None)],
            by_name,
            generation: 0,
            active_packages: Vec::new(),
            saved_packages: Vec::new(),
            package_limit: MAX_ACTIVE_PACKAGES,
            marker_uid: 0,
        }
    }

    pub fn set_package_limit(&mut self, limit: usize) {
        self.package_limit = limit.min(MAX_ACTIVE_PACKAGES);
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate every lookup index and call-site cache.
    #[inline]
    pub fn trash_cache(&mut self) {
        self.generation += 1;
    }

    #[inline]
    pub fn global(&self) -> NamespaceId {
        NamespaceId::GLOBAL
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn get(&self, id: NamespaceId) -> &Namespace {
        &self.spaces[id.idx()]
    }

    pub fn parent(&self, id: NamespaceId) -> Option<NamespaceId> {
        self.spaces[id.idx()].parent
    }

    /// Find or create the namespace `name` tagged with `package`.
    pub fn find(&mut self, name: Option<Symbol>, package: Option<Symbol>) -> NamespaceId {
        let key = (normalize(name), normalize(package));
        if let Some(id) = self.by_name.get(&key) {
            return *id;
        }
        let id = NamespaceId(self.spaces.len() as u32);
        self.spaces.push(Namespace::new(key.0, key.1));
        self.by_name.insert(key, id);
        id
    }

    pub fn find_existing(&self, name: Option<Symbol>, package: Option<Symbol>) -> Option<NamespaceId> {
        self.by_name.get(&(normalize(name), normalize(package))).copied()
    }

    pub fn entry(&self, at: EntryRef) -> Option<&Entry> {
        self.spaces.get(at.namespace.idx())?.entries.get(at.index as usize)
    }

    /// Walk the parent chain without consulting the index.
    pub fn lookup_recursive(&self, ns: NamespaceId, name: Symbol) -> Option<EntryRef> {
        let mut walk = Some(ns);
        while let Some(id) = walk {
            let space = &self.spaces[id.idx()];
            if let Some(pos) = space.entries.iter().position(|e| e.name == name && e.is_live()) {
                return Some(EntryRef {
                    namespace: id,
                    index: pos as u32,
                });
            }
            walk = space.parent;
        }
        None
    }

    /// Resolve `name` through the hashed index of `ns`, rebuilding it first
    /// if the cache generation moved.
    pub fn resolve(&mut self, ns: NamespaceId, name: Symbol) -> Option<EntryRef> {
        let index = self.ensure_index(ns);
        let size = index.slots.len();
        if size == 0 {
            return None;
        }
        let mut slot = (fx_hash_u32(name.index()) % size as u64) as usize;
        for _ in 0..size {
            let at = index.slots[slot]?;
            if self.entry(at).is_some_and(|e| e.name == name) {
                return Some(at);
            }
            slot = (slot + 1) % size;
        }
        None
    }

    pub fn lookup(&mut self, ns: NamespaceId, name: Symbol) -> Option<&Entry> {
        let at = self.resolve(ns, name)?;
        self.entry(at)
    }

    fn ensure_index(&mut self, ns: NamespaceId) -> Rc<LookupIndex> {
        if let Some((generation, index)) = &self.spaces[ns.idx()].index {
            if *generation == self.generation {
                return Rc::clone(index);
            }
        }
        let index = match self.spaces[ns.idx()].parent {
            Some(parent) if self.spaces[ns.idx()].entries.is_empty() => self.ensure_index(parent),
            _ => Rc::new(self.build_index(ns)),
        };
        self.spaces[ns.idx()].index = Some((self.generation, Rc::clone(&index)));
        index
    }

    fn build_index(&self, ns: NamespaceId) -> LookupIndex {
        let visible = self.visible_entries(ns);
        let mut size = visible.len() + visible.len() / 2 + 1;
        if size % 2 == 0 {
            size += 1;
        }
        let mut slots: Vec<Option<EntryRef>> = vec![None; size];
        for at in visible {
            let Some(entry) = self.entry(at) else { continue };
            let mut slot = (fx_hash_u32(entry.name.index()) % size as u64) as usize;
            while slots[slot].is_some() {
                slot = (slot + 1) % size;
            }
            slots[slot] = Some(at);
        }
        debug!(namespace = %self.display_name(ns), size, "rebuilt namespace lookup index");
        LookupIndex {
            slots: slots.into_boxed_slice(),
        }
    }

    /// Live entries reachable from `ns`, nearest first, with names shadowed
    /// by a nearer namespace left out.
    fn visible_entries(&self, ns: NamespaceId) -> Vec<EntryRef> {
        let mut seen: FastHashSet<Symbol> = fast_hash_set_new();
        let mut out = Vec::new();
        let mut walk = Some(ns);
        while let Some(id) = walk {
            let space = &self.spaces[id.idx()];
            for (pos, entry) in space.entries.iter().enumerate() {
                if entry.is_live() && seen.insert(entry.name) {
                    out.push(EntryRef {
                        namespace: id,
                        index: pos as u32,
                    });
                }
            }
            walk = space.parent;
        }
        out
    }

    /// Every visible entry of `ns`, sorted by name.
    pub fn entry_list(&self, ns: NamespaceId) -> Vec<&Entry> {
        let mut list: Vec<&Entry> = self
            .visible_entries(ns)
            .into_iter()
            .filter_map(|at| self.entry(at))
            .collect();
        list.sort_by(|a, b| a.name.as_str().to_ascii_lowercase().cmp(&b.name.as_str().to_ascii_lowercase()));
        list
    }

    /// Callable names visible from `ns` starting with `prefix`.
    pub fn tab_complete(&self, ns: NamespaceId, prefix: &str) -> Vec<&'static str> {
        let prefix = prefix.to_ascii_lowercase();
        self.entry_list(ns)
            .into_iter()
            .filter(|e| e.is_callable())
            .map(|e| e.name.as_str())
            .filter(|n| n.to_ascii_lowercase().starts_with(&prefix))
            .collect()
    }

    /// Clear an existing local entry in place or append a fresh one.
    fn create_local_entry(&mut self, ns: NamespaceId, name: Symbol) -> &mut Entry {
        self.trash_cache();
        let space = &mut self.spaces[ns.idx()];
        let pos = match space.entries.iter().position(|e| e.name == name) {
            Some(pos) => {
                space.entries[pos] = Entry::blank(ns, name);
                pos
            }
            None => {
                space.entries.push(Entry::blank(ns, name));
                space.entries.len() - 1
            }
        };
        &mut space.entries[pos]
    }

    pub fn add_function(&mut self, ns: NamespaceId, name: Symbol, unit: Rc<CompiledUnit>, offset: u32) {
        let package = self.spaces[ns.idx()].package;
        let entry = self.create_local_entry(ns, name);
        entry.package = package;
        entry.kind = EntryKind::Script { unit, offset };
    }

    pub fn add_command(
        &mut self,
        ns: NamespaceId,
        name: Symbol,
        callback: Callback,
        usage: &str,
        min_args: u32,
        max_args: u32,
    ) {
        let entry = self.create_local_entry(ns, name);
        entry.kind = EntryKind::Native(callback);
        entry.usage = Some(Rc::from(usage));
        entry.min_args = min_args;
        entry.max_args = max_args;
    }

    fn next_marker_name(&mut self, base: &str) -> Symbol {
        self.marker_uid += 1;
        Symbol::intern(&format!("{base}_{}", self.marker_uid))
    }

    /// Record an alternate usage line for `name`.
    pub fn add_overload(&mut self, ns: NamespaceId, name: Symbol, alt_usage: &str) {
        let marker = self.next_marker_name(name.as_str());
        let entry = self.create_local_entry(ns, marker);
        entry.kind = EntryKind::OverloadMarker { of: name };
        entry.usage = Some(Rc::from(alt_usage));
    }

    /// Open a documentation group; entries added after it belong to it.
    pub fn mark_group(&mut self, ns: NamespaceId, group: Symbol, usage: Option<&str>) {
        let marker = self.next_marker_name("group");
        let entry = self.create_local_entry(ns, marker);
        entry.kind = EntryKind::GroupMarker { group };
        entry.usage = usage.map(Rc::from);
    }

    /// Make `parent` the class parent of `child`, looking through package
    /// layers stacked on `child`. A conflicting existing link is refused.
    pub fn class_link_to(&mut self, child: NamespaceId, parent: NamespaceId) -> bool {
        let walk = self.class_link_anchor(child);
        match self.spaces[walk.idx()].parent {
            Some(existing) if existing == parent => {}
            Some(existing) => {
                error!(
                    "attempt to link namespace {} to {}, but it is already linked to {}",
                    self.display_name(child),
                    self.display_name(parent),
                    self.display_name(existing)
                );
                return false;
            }
            None => {}
        }
        self.spaces[child.idx()].class_link_refs += 1;
        self.spaces[walk.idx()].parent = Some(parent);
        self.trash_cache();
        true
    }

    pub fn unlink_class(&mut self, child: NamespaceId, parent: NamespaceId) -> bool {
        let walk = self.class_link_anchor(child);
        if self.spaces[walk.idx()].parent != Some(parent) {
            error!(
                "attempt to unlink namespace {} from {}, but it is not linked to it",
                self.display_name(child),
                self.display_name(parent)
            );
            return false;
        }
        let refs = &mut self.spaces[child.idx()].class_link_refs;
        *refs = refs.saturating_sub(1);
        if *refs == 0 {
            self.spaces[walk.idx()].parent = None;
            self.trash_cache();
        }
        true
    }

    fn class_link_anchor(&self, child: NamespaceId) -> NamespaceId {
        let name = self.spaces[child.idx()].name;
        let mut walk = child;
        while let Some(parent) = self.spaces[walk.idx()].parent {
            if self.spaces[parent.idx()].name != name {
                break;
            }
            walk = parent;
        }
        walk
    }

    pub fn is_package(&self, name: Symbol) -> bool {
        self.spaces.iter().any(|s| s.package == Some(name))
    }

    pub fn is_package_active(&self, name: Symbol) -> bool {
        self.active_packages.contains(&name)
    }

    pub fn active_packages(&self) -> &[Symbol] {
        &self.active_packages
    }

    pub fn activate_package(&mut self, name: Symbol) -> Result<()> {
        if self.active_packages.contains(&name) {
            return Ok(());
        }
        if self.active_packages.len() >= self.package_limit {
            bail!(
                "cannot activate package {name}: {} packages already active",
                self.active_packages.len()
            );
        }
        self.trash_cache();
        let tagged: Vec<NamespaceId> = self.tagged_with(name).collect();
        for walk in tagged {
            let base = self.find(self.spaces[walk.idx()].name, None);
            self.spaces[walk.idx()].parent = self.spaces[base.idx()].parent;
            self.spaces[base.idx()].parent = Some(walk);
            self.swap_entries(base, walk);
        }
        self.active_packages.push(name);
        debug!(package = %name, active = self.active_packages.len(), "activated package");
        Ok(())
    }

    /// Deactivate `name` together with every package activated after it,
    /// undoing the splices newest first.
    pub fn deactivate_package(&mut self, name: Symbol) -> bool {
        let Some(pos) = self.active_packages.iter().position(|p| *p == name) else {
            return false;
        };
        self.trash_cache();
        for j in (pos..self.active_packages.len()).rev() {
            let package = self.active_packages[j];
            let tagged: Vec<NamespaceId> = self.tagged_with(package).collect();
            for walk in tagged.into_iter().rev() {
                let Some(base) = self.find_existing(self.spaces[walk.idx()].name, None) else {
                    continue;
                };
                self.spaces[base.idx()].parent = self.spaces[walk.idx()].parent;
                self.spaces[walk.idx()].parent = None;
                self.swap_entries(base, walk);
            }
        }
        self.active_packages.truncate(pos);
        debug!(package = %name, active = self.active_packages.len(), "deactivated package");
        true
    }

    /// Peel off every active package, remembering the list for
    /// [`relink_packages`](Self::relink_packages).
    pub fn unlink_packages(&mut self) {
        self.saved_packages = self.active_packages.clone();
        if let Some(first) = self.active_packages.first().copied() {
            self.deactivate_package(first);
        }
    }

    pub fn relink_packages(&mut self) {
        for package in std::mem::take(&mut self.saved_packages) {
            if let Err(err) = self.activate_package(package) {
                error!("relinking packages: {err:#}");
            }
        }
    }

    fn tagged_with(&self, package: Symbol) -> impl Iterator<Item = NamespaceId> + '_ {
        self.spaces
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.package == Some(package))
            .map(|(i, _)| NamespaceId(i as u32))
    }

    fn swap_entries(&mut self, a: NamespaceId, b: NamespaceId) {
        let taken_a = std::mem::take(&mut self.spaces[a.idx()].entries);
        let taken_b = std::mem::replace(&mut self.spaces[b.idx()].entries, taken_a);
        self.spaces[a.idx()].entries = taken_b;
        for entry in &mut self.spaces[a.idx()].entries {
            entry.namespace = a;
        }
        for entry in &mut self.spaces[b.idx()].entries {
            entry.namespace = b;
        }
    }

    /// `[package]name` for diagnostics, `<global>` for the root.
    pub fn display_name(&self, id: NamespaceId) -> String {
        let space = &self.spaces[id.idx()];
        let name = space.name.map(Symbol::as_str).unwrap_or("<global>");
        match space.package {
            Some(package) => format!("[{package}]{name}"),
            None => name.to_owned(),
        }
    }

    /// Human-readable listing of the commands visible from `ns`.
    pub fn dump_entries(&self, ns: NamespaceId) -> Vec<String> {
        let mut lines = Vec::new();
        for entry in self.entry_list(ns) {
            let usage = entry.usage.as_deref().unwrap_or("");
            match &entry.kind {
                EntryKind::Script { unit, offset } => {
                    let args = if *offset == 0 { Vec::new() } else { unit.function_args(*offset) };
                    lines.push(format!("{}({})", entry.name, args.join(", ")));
                }
                EntryKind::Native(_) => lines.push(format!("{}() - {usage}", entry.name)),
                EntryKind::GroupMarker { group } => lines.push(format!("--- {group} --- {usage}")),
                EntryKind::OverloadMarker { of } => lines.push(format!("{of}() - {usage}")),
                EntryKind::Invalid => {}
            }
        }
        lines
    }
}
