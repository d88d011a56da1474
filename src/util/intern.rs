use std::{fmt, num::NonZeroU32, rc::Rc};

use rustc_hash::FxHashMap;

/// A handle to an interned name. To retrieve the `&str`, use
/// [`Interner::get`].
///
/// Handles are small integers, which makes them cheap keys for the symbol
/// table.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interned {
    // Here we use a NonZeroU32 to leverage niche layout optimization.
    handle: NonZeroU32,
}

impl fmt::Debug for Interned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interned({})", self.handle)
    }
}

#[derive(Default)]
pub struct Interner {
    map: FxHashMap<Rc<str>, Interned>,
    vec: Vec<Rc<str>>,
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, name) in self.vec.iter().enumerate() {
            map.entry(&(i + 1), name);
        }
        map.finish()
    }
}

impl Interner {
    pub fn with_capacity(capacity: usize) -> Self {
        Interner {
            map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Interns the provided name, returning a handle which can be used to
    /// retrieve it later. Interning the same name twice yields the same
    /// handle.
    pub fn intern(&mut self, name: &str) -> Interned {
        if let Some(&interned) = self.map.get(name) {
            return interned;
        }
        let len = u32::try_from(self.vec.len()).unwrap_or(u32::MAX);
        let interned = Interned {
            handle: NonZeroU32::MIN.saturating_add(len),
        };
        let name: Rc<str> = Rc::from(name);
        self.vec.push(Rc::clone(&name));
        self.map.insert(name, interned);
        interned
    }

    /// Returns the handle of an already interned name.
    pub fn lookup(&self, name: &str) -> Option<Interned> {
        self.map.get(name).copied()
    }

    /// Returns the name behind the provided handle.
    ///
    /// Panics if the handle comes from another interner.
    pub fn get(&self, interned: Interned) -> &str {
        let index = interned.handle.get() - 1;
        &self.vec[index as usize]
    }
}
