//! Process-wide, case-insensitive identifier interning.
//!
//! Script identifiers (variables, functions, namespaces, packages, fields)
//! compare without regard to ASCII case. Interning folds that rule into a
//! `Symbol` id so the rest of the runtime compares integers. The first
//! spelling seen is the one reported back by [`Symbol::as_str`].

use std::{
    borrow::Cow,
    fmt,
    sync::{PoisonError, RwLock},
};

use dashmap::DashMap;
use once_cell::sync::Lazy;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Symbol(u32);

struct Interner {
    lookup: DashMap<Box<str>, Symbol>,
    names: RwLock<Vec<&'static str>>,
}

static INTERNER: Lazy<Interner> = Lazy::new(|| {
    let lookup = DashMap::new();
    lookup.insert(Box::<str>::from(""), Symbol::EMPTY);
    Interner {
        lookup,
        names: RwLock::new(vec![""]),
    }
});

fn fold_case(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

impl Symbol {
    pub const EMPTY: Symbol = Symbol(0);

    pub fn intern(name: &str) -> Symbol {
        let key = fold_case(name);
        if let Some(sym) = INTERNER.lookup.get(key.as_ref()) {
            return *sym;
        }
        *INTERNER
            .lookup
            .entry(key.into_owned().into_boxed_str())
            .or_insert_with(|| {
                let mut names = INTERNER.names.write().unwrap_or_else(PoisonError::into_inner);
                let sym = Symbol(names.len() as u32);
                names.push(Box::leak(name.to_owned().into_boxed_str()));
                sym
            })
    }

    /// Look a name up without interning it.
    pub fn existing(name: &str) -> Option<Symbol> {
        INTERNER.lookup.get(fold_case(name).as_ref()).map(|s| *s)
    }

    pub fn as_str(self) -> &'static str {
        let names = INTERNER.names.read().unwrap_or_else(PoisonError::into_inner);
        names.get(self.0 as usize).copied().unwrap_or("")
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Rebuild a symbol from a bytecode operand word.
    #[inline]
    pub(crate) const fn from_word(word: u32) -> Symbol {
        Symbol(word)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({}:{:?})", self.0, self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::intern(name)
    }
}
