//! Per-call-site resolution caches.
//!
//! A `CALLFUNC_RESOLVE` site remembers which entry it resolved to together
//! with the namespace cache generation at the time. Any dispatch-table
//! mutation bumps the generation, which silently invalidates every site.

use std::cell::RefCell;

use crate::util::fast_map::{FastHashMap, fast_hash_map_new};

use super::namespace::EntryRef;

#[derive(Clone, Copy, Debug)]
struct CallSite {
    generation: u64,
    target: EntryRef,
}

#[derive(Debug)]
pub(crate) struct CallSiteCaches {
    sites: RefCell<FastHashMap<u32, CallSite>>,
}

impl Default for CallSiteCaches {
    fn default() -> Self {
        Self {
            sites: RefCell::new(fast_hash_map_new()),
        }
    }
}

impl CallSiteCaches {
    #[inline]
    pub(crate) fn get(&self, ip: u32, generation: u64) -> Option<EntryRef> {
        let sites = self.sites.borrow();
        let site = sites.get(&ip)?;
        (site.generation == generation).then_some(site.target)
    }

    #[inline]
    pub(crate) fn store(&self, ip: u32, generation: u64, target: EntryRef) {
        self.sites.borrow_mut().insert(ip, CallSite { generation, target });
    }
}
