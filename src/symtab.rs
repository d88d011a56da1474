//! A small bucketed hash table used to map names to stack slots.
//!
//! Besides the usual lookups, the table threads every bucket that currently
//! holds at least one entry into a singly linked "live list". Clearing and
//! traversal only touch those buckets, which keeps resetting a scope cheap
//! no matter how many buckets were allocated.

use std::{
    collections::TryReserveError,
    hash::{BuildHasher, Hash},
};

use rustc_hash::FxBuildHasher;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("key is already present")]
    DuplicateKey,
    #[error("requested capacity of {0} buckets is too large")]
    CapacityOverflow(usize),
    #[error("failed to grow symbol table storage")]
    Alloc(#[from] TryReserveError),
}

/// The payload of an entry: either borrowed from the caller or owned by the
/// table.
#[derive(Debug)]
pub enum Slot<'a, V> {
    Borrowed(&'a V),
    Owned(Box<V>),
}

impl<V> Slot<'_, V> {
    pub fn get(&self) -> &V {
        match self {
            Slot::Borrowed(value) => value,
            Slot::Owned(value) => value,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Slot::Owned(_))
    }
}

/// Outcome of an upsert.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Replaced,
}

struct Pair<'a, K, V> {
    key: K,
    /// `None` marks a removed pair whose storage may be reused.
    slot: Option<Slot<'a, V>>,
}

struct Bucket<'a, K, V> {
    pairs: Vec<Pair<'a, K, V>>,
    live: usize,
    /// Next bucket in the live list.
    next: Option<usize>,
}

pub struct SymbolTable<'a, K, V, S = FxBuildHasher> {
    buckets: Vec<Bucket<'a, K, V>>,
    /// Most recently linked live bucket.
    head: Option<usize>,
    len: usize,
    hasher: S,
}

impl<'a, K, V, S> SymbolTable<'a, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates a table with at least `capacity` buckets (rounded up to a power
    /// of two).
    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<'a, K, V, S> SymbolTable<'a, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Result<Self, Error> {
        let count = bucket_count_for(capacity)?;
        Ok(SymbolTable {
            buckets: alloc_buckets(count)?,
            head: None,
            len: 0,
            hasher,
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Index of the bucket `key` hashes into.
    pub fn bucket_of(&self, key: &K) -> usize {
        index_for(self.hasher.hash_one(key), self.buckets.len())
    }

    /// Inserts a borrowed payload. Fails if the key is already present, in
    /// which case the existing entry is left untouched.
    pub fn insert_new(&mut self, key: K, value: &'a V) -> Result<(), Error> {
        if self.contains_key(&key) {
            return Err(Error::DuplicateKey);
        }
        self.push(key, Slot::Borrowed(value))
    }

    /// Inserts a borrowed payload, replacing the payload of an existing entry.
    pub fn upsert(&mut self, key: K, value: &'a V) -> Result<Upserted, Error> {
        if let Some(slot) = self.slot_mut(&key) {
            *slot = Slot::Borrowed(value);
            return Ok(Upserted::Replaced);
        }
        self.push(key, Slot::Borrowed(value))?;
        Ok(Upserted::Inserted)
    }

    /// Inserts a copy of `value` owned by the table. Fails if the key is
    /// already present.
    pub fn insert_owned(&mut self, key: K, value: &V) -> Result<(), Error>
    where
        V: Clone,
    {
        if self.contains_key(&key) {
            return Err(Error::DuplicateKey);
        }
        self.push(key, Slot::Owned(Box::new(value.clone())))
    }

    /// Inserts or replaces with a copy of `value` owned by the table.
    ///
    /// Replacing an owned payload copies into the existing allocation.
    pub fn upsert_owned(&mut self, key: K, value: &V) -> Result<Upserted, Error>
    where
        V: Clone,
    {
        match self.slot_mut(&key) {
            Some(Slot::Owned(existing)) => {
                V::clone_from(existing, value);
                Ok(Upserted::Replaced)
            }
            Some(slot) => {
                *slot = Slot::Owned(Box::new(value.clone()));
                Ok(Upserted::Replaced)
            }
            None => {
                self.push(key, Slot::Owned(Box::new(value.clone())))?;
                Ok(Upserted::Inserted)
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_slot(key).map(Slot::get)
    }

    pub fn get_slot(&self, key: &K) -> Option<&Slot<'a, V>> {
        let bucket = &self.buckets[self.bucket_of(key)];
        bucket
            .pairs
            .iter()
            .find(|pair| pair.slot.is_some() && pair.key == *key)
            .and_then(|pair| pair.slot.as_ref())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get_slot(key).is_some()
    }

    /// Removes the entry for `key`, dropping an owned payload. Returns whether
    /// the key was present.
    pub fn remove(&mut self, key: &K) -> bool {
        let b = self.bucket_of(key);
        let bucket = &mut self.buckets[b];
        let Some(pair) = bucket
            .pairs
            .iter_mut()
            .find(|pair| pair.slot.is_some() && pair.key == *key)
        else {
            return false;
        };
        pair.slot = None;
        bucket.live -= 1;
        let emptied = bucket.live == 0;
        self.len -= 1;
        if emptied {
            self.unlink(b);
        }
        true
    }

    /// Removes every entry, dropping owned payloads. Only live buckets are
    /// visited and their pair storage is kept for reuse.
    pub fn clear(&mut self) {
        let mut cursor = self.head.take();
        while let Some(i) = cursor {
            let bucket = &mut self.buckets[i];
            bucket.pairs.clear();
            bucket.live = 0;
            cursor = bucket.next.take();
        }
        self.len = 0;
    }

    /// Grows the bucket array so that it holds at least `capacity` buckets,
    /// rehashing every entry. The table never shrinks.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), Error> {
        if capacity <= self.buckets.len() {
            return Ok(());
        }
        let count = bucket_count_for(capacity)?;
        let mut fresh = alloc_buckets(count)?;

        // Size every new bucket up front so that moving the pairs over can't
        // fail halfway through.
        for pair in self.live_pairs() {
            let i = index_for(self.hasher.hash_one(&pair.key), count);
            fresh[i].live += 1;
        }
        for bucket in &mut fresh {
            bucket.pairs.try_reserve_exact(bucket.live)?;
            bucket.live = 0;
        }

        let old = std::mem::replace(&mut self.buckets, fresh);
        self.head = None;
        self.len = 0;
        for pair in old.into_iter().flat_map(|bucket| bucket.pairs) {
            if let Some(slot) = pair.slot {
                self.push(pair.key, slot)?;
            }
        }
        tracing::trace!(buckets = count, len = self.len, "symbol table grown");
        Ok(())
    }

    /// Iterates over the indexes of the buckets in the live list, most
    /// recently linked first.
    pub fn live_buckets(&self) -> impl Iterator<Item = usize> + use<'_, 'a, K, V, S> {
        std::iter::successors(self.head, |&i| self.buckets[i].next)
    }

    /// Iterates over every entry, walking only live buckets.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + use<'_, 'a, K, V, S> {
        self.live_pairs().filter_map(|pair| {
            let slot = pair.slot.as_ref()?;
            Some((&pair.key, slot.get()))
        })
    }

    fn live_pairs(&self) -> impl Iterator<Item = &Pair<'a, K, V>> + use<'_, 'a, K, V, S> {
        self.live_buckets()
            .flat_map(|i| self.buckets[i].pairs.iter())
            .filter(|pair| pair.slot.is_some())
    }

    fn slot_mut(&mut self, key: &K) -> Option<&mut Slot<'a, V>> {
        let b = self.bucket_of(key);
        self.buckets[b]
            .pairs
            .iter_mut()
            .find(|pair| pair.slot.is_some() && pair.key == *key)
            .and_then(|pair| pair.slot.as_mut())
    }

    /// Stores a pair for a key known to be absent.
    fn push(&mut self, key: K, slot: Slot<'a, V>) -> Result<(), Error> {
        let b = self.bucket_of(&key);
        let bucket = &mut self.buckets[b];
        if let Some(pair) = bucket.pairs.iter_mut().find(|pair| pair.slot.is_none()) {
            pair.key = key;
            pair.slot = Some(slot);
        } else {
            if bucket.pairs.len() == bucket.pairs.capacity() {
                bucket.pairs.try_reserve_exact(1)?;
            }
            bucket.pairs.push(Pair {
                key,
                slot: Some(slot),
            });
        }
        bucket.live += 1;
        let became_live = bucket.live == 1;
        self.len += 1;
        if became_live {
            self.buckets[b].next = self.head;
            self.head = Some(b);
        }
        Ok(())
    }

    /// Splices bucket `b` out of the live list.
    fn unlink(&mut self, b: usize) {
        let next = self.buckets[b].next.take();
        if self.head == Some(b) {
            self.head = next;
            return;
        }
        let mut cursor = self.head;
        while let Some(i) = cursor {
            if self.buckets[i].next == Some(b) {
                self.buckets[i].next = next;
                return;
            }
            cursor = self.buckets[i].next;
        }
        debug_assert!(false, "bucket {b} was not in the live list");
    }
}

fn bucket_count_for(capacity: usize) -> Result<usize, Error> {
    capacity
        .max(1)
        .checked_next_power_of_two()
        .ok_or(Error::CapacityOverflow(capacity))
}

#[allow(clippy::cast_possible_truncation)]
fn index_for(hash: u64, bucket_count: usize) -> usize {
    debug_assert!(bucket_count.is_power_of_two());
    (hash as usize) & (bucket_count - 1)
}

fn alloc_buckets<'a, K, V>(count: usize) -> Result<Vec<Bucket<'a, K, V>>, Error> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(count)?;
    for _ in 0..count {
        let mut pairs = Vec::new();
        pairs.try_reserve_exact(1)?;
        buckets.push(Bucket {
            pairs,
            live: 0,
            next: None,
        });
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use std::{
        hash::{BuildHasherDefault, Hasher},
        rc::Rc,
    };

    use super::*;
    use pretty_assertions::assert_eq;

    /// Hashes a `u32` key to itself, so tests control bucket placement.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, _: &[u8]) {
            unreachable!("only u32 keys are hashed in tests");
        }

        fn write_u32(&mut self, n: u32) {
            self.0 = u64::from(n);
        }
    }

    type Table<'a, V> = SymbolTable<'a, u32, V, BuildHasherDefault<IdentityHasher>>;

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        assert_eq!(Table::<i32>::with_capacity(0).unwrap().bucket_count(), 1);
        assert_eq!(Table::<i32>::with_capacity(5).unwrap().bucket_count(), 8);
        assert_eq!(Table::<i32>::with_capacity(32).unwrap().bucket_count(), 32);
    }

    #[test]
    fn test_insert_new_rejects_duplicates() {
        let (a, b) = (1, 2);
        let mut t = Table::with_capacity(8).unwrap();
        t.insert_new(3, &a).unwrap();
        assert_eq!(t.insert_new(3, &b), Err(Error::DuplicateKey));
        assert_eq!(t.get(&3), Some(&1));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let (a, b) = (1, 2);
        let mut t = Table::with_capacity(8).unwrap();
        assert_eq!(t.upsert(5, &a), Ok(Upserted::Inserted));
        let live_before: Vec<_> = t.live_buckets().collect();
        assert_eq!(t.upsert(5, &b), Ok(Upserted::Replaced));
        assert_eq!(t.get(&5), Some(&2));
        assert_eq!(t.live_buckets().collect::<Vec<_>>(), live_before);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_colliding_keys_share_a_bucket() {
        let mut t = Table::with_capacity(4).unwrap();
        // 1, 5 and 9 all land in bucket 1.
        for key in [1, 5, 9] {
            t.insert_owned(key, &(key * 10)).unwrap();
        }
        assert_eq!(t.live_buckets().collect::<Vec<_>>(), [1]);
        assert_eq!(t.get(&5), Some(&50));
        assert_eq!(t.get(&13), None);

        assert!(t.remove(&5));
        assert!(!t.remove(&5));
        assert_eq!(t.get(&9), Some(&90));
        assert_eq!(t.live_buckets().collect::<Vec<_>>(), [1]);

        // The freed pair is reused.
        t.insert_owned(13, &130).unwrap();
        assert_eq!(t.get(&13), Some(&130));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_live_list_order_and_removal() {
        let mut t = Table::with_capacity(8).unwrap();
        for key in [2, 6, 4] {
            t.insert_owned(key, &()).unwrap();
        }
        assert_eq!(t.live_buckets().collect::<Vec<_>>(), [4, 6, 2]);

        // Removing the only key of a bucket unlinks it, wherever it sits.
        assert!(t.remove(&6));
        assert_eq!(t.live_buckets().collect::<Vec<_>>(), [4, 2]);
        assert!(t.remove(&4));
        assert_eq!(t.live_buckets().collect::<Vec<_>>(), [2]);
        assert!(t.remove(&2));
        assert_eq!(t.live_buckets().count(), 0);
        assert!(t.is_empty());

        t.insert_owned(6, &()).unwrap();
        assert_eq!(t.live_buckets().collect::<Vec<_>>(), [6]);
    }

    #[test]
    fn test_clear_drops_owned_payloads() {
        let payload = Rc::new(());
        let borrowed = Rc::new(());
        let mut t = Table::with_capacity(4).unwrap();
        t.insert_owned(1, &payload).unwrap();
        t.insert_owned(2, &payload).unwrap();
        t.insert_new(3, &borrowed).unwrap();
        assert_eq!(Rc::strong_count(&payload), 3);
        assert!(t.get_slot(&1).unwrap().is_owned());
        assert!(!t.get_slot(&3).unwrap().is_owned());

        t.clear();
        assert_eq!(Rc::strong_count(&payload), 1);
        assert_eq!(Rc::strong_count(&borrowed), 1);
        assert!(t.is_empty());
        assert_eq!(t.live_buckets().count(), 0);
        assert_eq!(t.get(&1), None);

        // Reusable after clear.
        t.insert_owned(1, &payload).unwrap();
        assert_eq!(t.iter().count(), 1);
    }

    #[test]
    fn test_remove_and_drop_release_owned_payloads() {
        let payload = Rc::new(());
        {
            let mut t = Table::with_capacity(4).unwrap();
            t.insert_owned(1, &payload).unwrap();
            t.insert_owned(2, &payload).unwrap();
            assert!(t.remove(&1));
            assert_eq!(Rc::strong_count(&payload), 2);
        }
        assert_eq!(Rc::strong_count(&payload), 1);
    }

    #[test]
    fn test_upsert_owned_reuses_allocation() {
        let borrowed = vec![7u8];
        let mut t = Table::with_capacity(4).unwrap();
        t.upsert_owned(1, &vec![1u8, 2, 3]).unwrap();
        let before: *const Vec<u8> = t.get(&1).unwrap();
        assert_eq!(t.upsert_owned(1, &vec![4, 5, 6]), Ok(Upserted::Replaced));
        let after: *const Vec<u8> = t.get(&1).unwrap();
        assert_eq!(before, after);
        assert_eq!(t.get(&1), Some(&vec![4, 5, 6]));

        // A borrowed payload is replaced by a fresh owned copy.
        t.upsert(2, &borrowed).unwrap();
        t.upsert_owned(2, &vec![8]).unwrap();
        assert!(t.get_slot(&2).unwrap().is_owned());
        assert_eq!(t.get(&2), Some(&vec![8]));
    }

    #[test]
    fn test_reserve_rehashes_and_never_shrinks() {
        let mut t = Table::with_capacity(2).unwrap();
        for key in 0..10 {
            t.insert_owned(key, &key).unwrap();
        }
        t.reserve(9).unwrap();
        assert_eq!(t.bucket_count(), 16);
        for key in 0..10 {
            assert_eq!(t.get(&key), Some(&key));
            assert_eq!(t.bucket_of(&key), key as usize);
        }
        assert_eq!(t.len(), 10);
        assert_eq!(t.live_buckets().count(), 10);

        t.reserve(4).unwrap();
        assert_eq!(t.bucket_count(), 16);
    }

    #[test]
    fn test_default_hasher_with_string_keys() {
        let mut t = SymbolTable::<&str, u32>::with_capacity(32).unwrap();
        t.insert_owned("x", &4).unwrap();
        t.insert_owned("y", &8).unwrap();
        assert_eq!(t.insert_owned("x", &12), Err(Error::DuplicateKey));
        assert_eq!(t.get(&"x"), Some(&4));
        assert_eq!(t.get(&"y"), Some(&8));
        let mut all: Vec<_> = t.iter().map(|(k, v)| (*k, *v)).collect();
        all.sort_unstable();
        assert_eq!(all, [("x", 4), ("y", 8)]);
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        assert!(matches!(
            Table::<i32>::with_capacity(1 << 60),
            Err(Error::Alloc(_))
        ));
        assert_eq!(
            Table::<i32>::with_capacity(usize::MAX).err(),
            Some(Error::CapacityOverflow(usize::MAX))
        );

        let mut t = Table::with_capacity(4).unwrap();
        t.insert_owned(1, &1).unwrap();
        assert!(matches!(t.reserve(1 << 60), Err(Error::Alloc(_))));
        assert_eq!(t.get(&1), Some(&1));
        assert_eq!(t.bucket_count(), 4);
        assert_eq!(t.len(), 1);
    }
}
