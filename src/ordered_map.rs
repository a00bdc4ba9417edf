//! A hash map that remembers insertion order, built on [`OrderedHash`].
//!
//! This module provides [`OrderedMap`], which stores `(K, V)` pairs in a
//! dense sequence ordered by first insertion and indexes them with a Robin
//! Hood hash table for average O(1) lookup.

use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ops::Range;

use crate::error::Error;
use crate::raw;
use crate::raw::OrderedHash;
use crate::raw::Position;
use crate::store::ContiguousStore;
use crate::store::OrderedStore;
use crate::store::SegmentedStore;
use crate::DefaultHashBuilder;

/// A hash map that iterates in the order keys were first inserted.
///
/// Lookups go through a Robin Hood hash index whose cells store positions
/// into a dense entry store, so the entries themselves stay contiguous and
/// ordered. Removal comes in two flavors: [`shift_remove`] keeps the order
/// by shifting later entries left, while [`swap_remove`] is O(1) and moves
/// the last entry into the freed position.
///
/// Three additional type parameters tune the map: the [`BuildHasher`] `S`
/// (defaulting to [`DefaultHashBuilder`]), the entry store `St` (a
/// [`SegmentedStore`] by default; a [`ContiguousStore`] adds
/// [`as_entry_slice`]), and the index position width `P` (see
/// [`Position`]).
///
/// Mutating methods that can hit the position-width capacity limit return
/// [`Error::CapacityExceeded`] instead of panicking; with the default
/// 32-bit width that takes about 4.3 billion entries.
///
/// # Examples
///
/// ```rust
/// use ordered_hash::OrderedMap;
///
/// let mut map: OrderedMap<&str, i32> = OrderedMap::new();
/// map.insert("b", 2).unwrap();
/// map.insert("a", 1).unwrap();
/// map.insert("c", 3).unwrap();
///
/// let keys: Vec<_> = map.keys().copied().collect();
/// assert_eq!(keys, ["b", "a", "c"]);
/// ```
///
/// [`shift_remove`]: OrderedMap::shift_remove
/// [`swap_remove`]: OrderedMap::swap_remove
/// [`as_entry_slice`]: OrderedMap::as_entry_slice
/// [`DefaultHashBuilder`]: crate::DefaultHashBuilder
#[derive(Clone)]
pub struct OrderedMap<K, V, S = DefaultHashBuilder, St = SegmentedStore<(K, V)>, P = u32> {
    inner: OrderedHash<(K, V), St, P>,
    hash_builder: S,
}

impl<K, V, S, St, P> OrderedMap<K, V, S, St, P>
where
    S: Default,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Creates an empty map with the default hasher.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let map: OrderedMap<i32, &str> = OrderedMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map able to hold `capacity` entries without
    /// rehashing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S, St, P> OrderedMap<K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Creates an empty map with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        OrderedMap {
            inner: OrderedHash::new(),
            hash_builder,
        }
    }

    /// Creates an empty map able to hold `capacity` entries without
    /// rehashing, with the given hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        OrderedMap {
            inner: OrderedHash::with_capacity(capacity),
            hash_builder,
        }
    }

    /// Creates an empty map with an explicit bucket count (rounded up to a
    /// power of two) and maximum load factor.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMaxLoadFactor`] for a load factor outside the
    /// supported range, [`Error::CapacityExceeded`] for a bucket count the
    /// position width cannot address.
    pub fn with_parameters(
        bucket_count: usize,
        max_load_factor: f32,
        hash_builder: S,
    ) -> Result<Self, Error> {
        Ok(OrderedMap {
            inner: OrderedHash::with_parameters(bucket_count, max_load_factor)?,
            hash_builder,
        })
    }

    /// Number of entries in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let mut map = OrderedMap::new();
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a").unwrap();
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Largest number of entries the position width can address.
    pub fn max_size(&self) -> usize {
        self.inner.max_size()
    }

    /// Current length of the bucket array. Always a power of two.
    pub fn bucket_count(&self) -> usize {
        self.inner.bucket_count()
    }

    /// Ratio of entries to buckets.
    pub fn load_factor(&self) -> f32 {
        self.inner.load_factor()
    }

    /// Maximum load factor before an insertion grows the bucket array.
    pub fn max_load_factor(&self) -> f32 {
        self.inner.max_load_factor()
    }

    /// Sets the maximum load factor.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMaxLoadFactor`] outside the supported range.
    pub fn set_max_load_factor(&mut self, value: f32) -> Result<(), Error> {
        self.inner.set_max_load_factor(value)
    }

    /// Borrows the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Prepares the map for `capacity` entries so no rehash happens below
    /// that size.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if `capacity` is not addressable.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), Error> {
        self.inner.reserve(capacity)
    }

    /// Resizes the bucket array to at least `bucket_count` buckets, never
    /// below what the current length requires. Iteration order is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the count is not addressable.
    pub fn rehash(&mut self, bucket_count: usize) -> Result<(), Error> {
        self.inner.rehash(bucket_count)
    }

    /// Releases unused entry-store capacity. Best effort.
    pub fn shrink_to_fit(&mut self) {
        self.inner.shrink_to_fit();
    }

    /// Removes every entry, keeping the bucket array's size.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Borrows the entry at `index` in insertion order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let mut map = OrderedMap::new();
    /// map.insert("a", 1).unwrap();
    /// map.insert("b", 2).unwrap();
    /// assert_eq!(map.get_index(1), Some((&"b", &2)));
    /// ```
    pub fn get_index(&self, index: usize) -> Option<(&K, &V)> {
        self.inner.get(index).map(|entry| (&entry.0, &entry.1))
    }

    /// Mutably borrows the value at `index` in insertion order.
    pub fn get_index_mut(&mut self, index: usize) -> Option<(&K, &mut V)> {
        self.inner.get_mut(index).map(|entry| {
            let (key, value) = entry;
            (&*key, value)
        })
    }

    /// First entry in insertion order.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.get_index(0)
    }

    /// Last entry in insertion order.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.len().checked_sub(1).and_then(|index| self.get_index(index))
    }

    /// Removes the entries at `range` in insertion order, shifting later
    /// entries left.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn shift_remove_range(&mut self, range: Range<usize>) {
        self.inner.erase_range(range.start, range.end);
    }

    /// Borrows the underlying entry store.
    pub fn values_container(&self) -> &St {
        self.inner.values_container()
    }

    /// Iterates over `(&K, &V)` pairs in insertion order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let mut map = OrderedMap::new();
    /// map.insert(1, "a").unwrap();
    /// map.insert(2, "b").unwrap();
    /// let pairs: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
    /// assert_eq!(pairs, [(1, "a"), (2, "b")]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V, St> {
        Iter {
            inner: self.inner.iter(),
        }
    }

    /// Iterates over `(&K, &mut V)` pairs in insertion order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, St> {
        IterMut {
            inner: self.inner.iter_mut(),
        }
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> Keys<'_, K, V, St> {
        Keys { inner: self.iter() }
    }

    /// Iterates over the values in insertion order.
    pub fn values(&self) -> Values<'_, K, V, St> {
        Values { inner: self.iter() }
    }

    /// Iterates mutably over the values in insertion order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V, St> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes every entry, yielding them in insertion order.
    pub fn drain(&mut self) -> Drain<K, V, St> {
        Drain {
            inner: OrderedStore::into_iter(self.inner.take_store()),
        }
    }

    pub(crate) fn raw(&self) -> &OrderedHash<(K, V), St, P> {
        &self.inner
    }

    pub(crate) fn raw_and_hasher_mut(&mut self) -> (&mut OrderedHash<(K, V), St, P>, &S) {
        (&mut self.inner, &self.hash_builder)
    }

    pub(crate) fn from_raw_parts(inner: OrderedHash<(K, V), St, P>, hash_builder: S) -> Self {
        OrderedMap { inner, hash_builder }
    }
}

impl<K, V, S, St, P> OrderedMap<K, V, S, St, P>
where
    K: Hash + Eq,
    S: BuildHasher,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Borrows the value for `key`.
    ///
    /// The key may be any borrowed form of the map's key type; `Hash` and
    /// `Eq` on the borrowed form must agree with the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let mut map = OrderedMap::new();
    /// map.insert(String::from("key"), 7).unwrap();
    /// assert_eq!(map.get("key"), Some(&7));
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_with_hash(self.hash_builder.hash_one(key), key)
    }

    /// Like [`get`](OrderedMap::get), with a caller-provided hash value.
    pub fn get_with_hash<Q>(&self, hash: u64, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let position = self.inner.find(hash, |entry| entry.0.borrow() == key)?;
        self.inner.get(position).map(|entry| &entry.1)
    }

    /// Mutably borrows the value for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_builder.hash_one(key);
        let position = self.inner.find(hash, |entry| entry.0.borrow() == key)?;
        self.inner.get_mut(position).map(|entry| &mut entry.1)
    }

    /// Position, key, and value for `key`.
    pub fn get_full<Q>(&self, key: &Q) -> Option<(usize, &K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let position = self.get_index_of(key)?;
        let entry = self.inner.get(position)?;
        Some((position, &entry.0, &entry.1))
    }

    /// Position of `key` in insertion order.
    pub fn get_index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_index_of_with_hash(self.hash_builder.hash_one(key), key)
    }

    /// Like [`get_index_of`](OrderedMap::get_index_of), with a
    /// caller-provided hash value.
    pub fn get_index_of_with_hash<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.inner.find(hash, |entry| entry.0.borrow() == key)
    }

    /// Whether the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_index_of(key).is_some()
    }

    /// Like [`contains_key`](OrderedMap::contains_key), with a
    /// caller-provided hash value.
    pub fn contains_key_with_hash<Q>(&self, hash: u64, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.get_index_of_with_hash(hash, key).is_some()
    }

    /// Borrows the value for `key`, failing on a missing key.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if the key is absent.
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Mutably borrows the value for `key`, failing on a missing key.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if the key is absent.
    pub fn try_get_mut<Q>(&mut self, key: &Q) -> Result<&mut V, Error>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Number of entries for `key`: `0` or `1`.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        usize::from(self.contains_key(key))
    }

    /// Position range of the entries equal to `key`: at most one element.
    pub fn equal_range<Q>(&self, key: &Q) -> Range<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.get_index_of(key) {
            Some(index) => index..index + 1,
            None => self.len()..self.len(),
        }
    }

    /// Inserts `key` and `value` unless the key is already present, in
    /// which case the existing entry is left untouched and `value` is
    /// dropped. Returns the entry's position and whether it was inserted.
    ///
    /// Use [`insert_or_assign`](OrderedMap::insert_or_assign) for
    /// overwriting semantics.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let mut map = OrderedMap::new();
    /// assert_eq!(map.insert(1, "a").unwrap(), (0, true));
    /// assert_eq!(map.insert(1, "z").unwrap(), (0, false));
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Result<(usize, bool), Error> {
        let hash = self.hash_builder.hash_one(&key);
        match self.inner.entry(hash, |entry| entry.0 == key) {
            raw::Entry::Occupied(occupied) => Ok((occupied.position(), false)),
            raw::Entry::Vacant(vacant) => {
                let (position, _) = vacant.insert((key, value))?;
                Ok((position, true))
            }
        }
    }

    /// Inserts `key` and `value`, overwriting and returning the previous
    /// value if the key is already present.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Result<Option<V>, Error> {
        self.insert_or_assign_full(key, value)
            .map(|(_, previous)| previous)
    }

    fn insert_or_assign_full(&mut self, key: K, value: V) -> Result<(usize, Option<V>), Error> {
        let hash = self.hash_builder.hash_one(&key);
        match self.inner.entry(hash, |entry| entry.0 == key) {
            raw::Entry::Occupied(mut occupied) => {
                let position = occupied.position();
                let previous = core::mem::replace(&mut occupied.get_mut().1, value);
                Ok((position, Some(previous)))
            }
            raw::Entry::Vacant(vacant) => {
                let (position, _) = vacant.insert((key, value))?;
                Ok((position, None))
            }
        }
    }

    /// Like [`insert`](OrderedMap::insert), first checking whether the
    /// entry at position `hint` already carries the key, which skips the
    /// probe entirely.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn insert_hint(&mut self, hint: usize, key: K, value: V) -> Result<(usize, bool), Error> {
        if let Some((existing, _)) = self.get_index(hint) {
            if *existing == key {
                return Ok((hint, false));
            }
        }
        self.insert(key, value)
    }

    /// Like [`insert_or_assign`](OrderedMap::insert_or_assign) with a
    /// position hint.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn insert_or_assign_hint(
        &mut self,
        hint: usize,
        key: K,
        value: V,
    ) -> Result<(usize, Option<V>), Error> {
        let hinted = matches!(self.get_index(hint), Some((existing, _)) if *existing == key);
        if hinted {
            if let Some((_, slot)) = self.get_index_mut(hint) {
                return Ok((hint, Some(core::mem::replace(slot, value))));
            }
        }
        self.insert_or_assign_full(key, value)
    }

    /// Probes for `key`, returning an [`Entry`] for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let mut counts = OrderedMap::new();
    /// for word in ["a", "b", "a"] {
    ///     *counts.entry(word).or_insert(0).unwrap() += 1;
    /// }
    /// assert_eq!(counts.get("a"), Some(&2));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, S, St, P> {
        let hash = self.hash_builder.hash_one(&key);
        let hash_builder = &self.hash_builder;
        match self.inner.entry(hash, |entry| entry.0 == key) {
            raw::Entry::Occupied(raw) => Entry::Occupied(OccupiedEntry { raw, hash_builder }),
            raw::Entry::Vacant(raw) => Entry::Vacant(VacantEntry {
                raw,
                key,
                marker: PhantomData,
            }),
        }
    }

    /// Removes `key`, preserving the order of the remaining entries.
    /// Positions after the removed entry decrease by one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let mut map = OrderedMap::new();
    /// for (k, v) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
    ///     map.insert(k, v).unwrap();
    /// }
    /// map.shift_remove(&2);
    /// let keys: Vec<_> = map.keys().copied().collect();
    /// assert_eq!(keys, [1, 3, 4]);
    /// ```
    pub fn shift_remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shift_remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key`, preserving order and returning the stored pair.
    pub fn shift_remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_builder.hash_one(key);
        let hash_builder = &self.hash_builder;
        self.inner.erase(
            hash,
            |entry| entry.0.borrow() == key,
            |entry| hash_builder.hash_one(&entry.0),
        )
    }

    /// Removes the entry at `index`, preserving order.
    pub fn shift_remove_index(&mut self, index: usize) -> Option<(K, V)> {
        let hash_builder = &self.hash_builder;
        self.inner
            .erase_index(index, |entry| hash_builder.hash_one(&entry.0))
    }

    /// Removes `key` in O(1) by swapping the last entry into its position.
    /// Changes insertion order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ordered_hash::OrderedMap;
    ///
    /// let mut map = OrderedMap::new();
    /// for (k, v) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
    ///     map.insert(k, v).unwrap();
    /// }
    /// map.swap_remove(&2);
    /// let keys: Vec<_> = map.keys().copied().collect();
    /// assert_eq!(keys, [1, 4, 3]);
    /// ```
    pub fn swap_remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.swap_remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key` in O(1), returning the stored pair. Changes insertion
    /// order.
    pub fn swap_remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_builder.hash_one(key);
        let hash_builder = &self.hash_builder;
        self.inner.unordered_erase(
            hash,
            |entry| entry.0.borrow() == key,
            |entry| hash_builder.hash_one(&entry.0),
        )
    }

    /// Removes the entry at `index` in O(1). Changes insertion order.
    pub fn swap_remove_index(&mut self, index: usize) -> Option<(K, V)> {
        let hash_builder = &self.hash_builder;
        self.inner
            .unordered_erase_index(index, |entry| hash_builder.hash_one(&entry.0))
    }

    /// Removes and returns the last entry in insertion order.
    pub fn pop(&mut self) -> Option<(K, V)> {
        let hash_builder = &self.hash_builder;
        self.inner
            .pop_back(|entry| hash_builder.hash_one(&entry.0))
    }
}

impl<K, V, S, P> OrderedMap<K, V, S, ContiguousStore<(K, V)>, P>
where
    P: Position,
{
    /// Borrows the entries as a contiguous slice, in insertion order.
    ///
    /// Only available with a [`ContiguousStore`] backing.
    pub fn as_entry_slice(&self) -> &[(K, V)] {
        self.inner.values_container().as_slice()
    }

    /// Number of entries the store can hold without reallocating.
    pub fn entry_capacity(&self) -> usize {
        self.inner.values_container().capacity()
    }
}

impl<K, V, S, St, P> Default for OrderedMap<K, V, S, St, P>
where
    S: Default,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, St, P> Debug for OrderedMap<K, V, S, St, P>
where
    K: Debug,
    V: Debug,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(key, value);
        }
        map.finish()
    }
}

/// Order-sensitive equality: two maps are equal when their entry sequences
/// are equal.
impl<K, V, S, S2, St, St2, P, P2> PartialEq<OrderedMap<K, V, S2, St2, P2>>
    for OrderedMap<K, V, S, St, P>
where
    K: PartialEq,
    V: PartialEq,
    St: OrderedStore<(K, V)>,
    St2: OrderedStore<(K, V)>,
    P: Position,
    P2: Position,
{
    fn eq(&self, other: &OrderedMap<K, V, S2, St2, P2>) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K, V, S, St, P> Eq for OrderedMap<K, V, S, St, P>
where
    K: Eq,
    V: Eq,
    St: OrderedStore<(K, V)>,
    P: Position,
{
}

impl<K, V, S, St, P, Q> core::ops::Index<&Q> for OrderedMap<K, V, S, St, P>
where
    K: Hash + Eq + Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    S: BuildHasher,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is absent.
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("no entry found for key"),
        }
    }
}

impl<K, V, S, St, P> Extend<(K, V)> for OrderedMap<K, V, S, St, P>
where
    K: Hash + Eq,
    S: BuildHasher,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Inserts every pair, keeping the first value seen for a key.
    ///
    /// # Panics
    ///
    /// Panics if the position width's capacity is exhausted; prefer
    /// [`OrderedMap::insert`] to handle that case.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        let free = ((self.bucket_count() as f32 * self.max_load_factor()) as usize)
            .saturating_sub(self.len());
        if lower > free {
            if let Err(error) = self.reserve(self.len().saturating_add(lower)) {
                panic!("ordered-hash: {error}");
            }
        }
        for (key, value) in iter {
            if let Err(error) = self.insert(key, value) {
                panic!("ordered-hash: {error}");
            }
        }
    }
}

impl<K, V, S, St, P> FromIterator<(K, V)> for OrderedMap<K, V, S, St, P>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

/// A probed slot of an [`OrderedMap`], occupied or vacant.
pub enum Entry<'a, K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// The key is present.
    Occupied(OccupiedEntry<'a, K, V, S, St, P>),
    /// The key is absent.
    Vacant(VacantEntry<'a, K, V, S, St, P>),
}

impl<'a, K, V, S, St, P> Entry<'a, K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Inserts `default` if the key is absent, then borrows the value.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn or_insert(self, default: V) -> Result<&'a mut V, Error> {
        match self {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => vacant.insert(default),
        }
    }

    /// Inserts the result of `default` if the key is absent, then borrows
    /// the value.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn or_insert_with<F>(self, default: F) -> Result<&'a mut V, Error>
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => vacant.insert(default()),
        }
    }

    /// Modifies the value in place if the key is present.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut occupied) => {
                f(occupied.get_mut());
                Entry::Occupied(occupied)
            }
            vacant => vacant,
        }
    }

    /// Borrows the entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(occupied) => occupied.key(),
            Entry::Vacant(vacant) => vacant.key(),
        }
    }
}

impl<'a, K, V, S, St, P> Entry<'a, K, V, S, St, P>
where
    V: Default,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Inserts the default value if the key is absent, then borrows the
    /// value.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn or_default(self) -> Result<&'a mut V, Error> {
        self.or_insert_with(V::default)
    }
}

/// An occupied [`Entry`].
pub struct OccupiedEntry<'a, K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    raw: raw::OccupiedEntry<'a, (K, V), St, P>,
    hash_builder: &'a S,
}

impl<'a, K, V, S, St, P> OccupiedEntry<'a, K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Borrows the entry's key.
    pub fn key(&self) -> &K {
        &self.raw.get().0
    }

    /// Position of the entry in insertion order.
    pub fn index(&self) -> usize {
        self.raw.position()
    }

    /// Borrows the value.
    pub fn get(&self) -> &V {
        &self.raw.get().1
    }

    /// Mutably borrows the value.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.raw.get_mut().1
    }

    /// Converts into a mutable borrow tied to the map's lifetime.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.raw.into_mut().1
    }

    /// Replaces the value, returning the previous one.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.get_mut(), value)
    }
}

impl<'a, K, V, S, St, P> OccupiedEntry<'a, K, V, S, St, P>
where
    K: Hash,
    S: BuildHasher,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Removes the entry, preserving order, and returns the value.
    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    /// Removes the entry, preserving order, and returns the stored pair.
    pub fn remove_entry(self) -> (K, V) {
        let hash_builder = self.hash_builder;
        self.raw.remove(|entry| hash_builder.hash_one(&entry.0))
    }

    /// Removes the entry in O(1), swapping the last entry into its
    /// position. Changes insertion order.
    pub fn swap_remove(self) -> V {
        self.swap_remove_entry().1
    }

    /// Removes the entry in O(1), returning the stored pair. Changes
    /// insertion order.
    pub fn swap_remove_entry(self) -> (K, V) {
        let hash_builder = self.hash_builder;
        self.raw
            .swap_remove(|entry| hash_builder.hash_one(&entry.0))
    }
}

/// A vacant [`Entry`].
pub struct VacantEntry<'a, K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    raw: raw::VacantEntry<'a, (K, V), St, P>,
    key: K,
    marker: PhantomData<&'a S>,
}

impl<'a, K, V, S, St, P> VacantEntry<'a, K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Borrows the key that would be inserted.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Recovers the key without inserting.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts `value` at the end of the insertion order and borrows it.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn insert(self, value: V) -> Result<&'a mut V, Error> {
        let (_, entry) = self.raw.insert((self.key, value))?;
        Ok(&mut entry.1)
    }
}

/// Iterator over `(&K, &V)` pairs in insertion order.
pub struct Iter<'a, K, V, St>
where
    K: 'a,
    V: 'a,
    St: OrderedStore<(K, V)> + 'a,
{
    inner: St::Iter<'a>,
}

impl<'a, K, V, St> Clone for Iter<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V, St> Iterator for Iter<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| (&entry.0, &entry.1))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, St> DoubleEndedIterator for Iter<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|entry| (&entry.0, &entry.1))
    }
}

impl<'a, K, V, St> ExactSizeIterator for Iter<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<'a, K, V, St> FusedIterator for Iter<'a, K, V, St> where St: OrderedStore<(K, V)> {}

/// Iterator over `(&K, &mut V)` pairs in insertion order.
pub struct IterMut<'a, K, V, St>
where
    K: 'a,
    V: 'a,
    St: OrderedStore<(K, V)> + 'a,
{
    inner: St::IterMut<'a>,
}

impl<'a, K, V, St> Iterator for IterMut<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| {
            let (key, value) = entry;
            (&*key, value)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, St> DoubleEndedIterator for IterMut<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|entry| {
            let (key, value) = entry;
            (&*key, value)
        })
    }
}

impl<'a, K, V, St> ExactSizeIterator for IterMut<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<'a, K, V, St> FusedIterator for IterMut<'a, K, V, St> where St: OrderedStore<(K, V)> {}

/// Iterator over keys in insertion order.
pub struct Keys<'a, K, V, St>
where
    K: 'a,
    V: 'a,
    St: OrderedStore<(K, V)> + 'a,
{
    inner: Iter<'a, K, V, St>,
}

impl<'a, K, V, St> Clone for Keys<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn clone(&self) -> Self {
        Keys {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V, St> Iterator for Keys<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, St> DoubleEndedIterator for Keys<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, _)| key)
    }
}

impl<'a, K, V, St> ExactSizeIterator for Keys<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<'a, K, V, St> FusedIterator for Keys<'a, K, V, St> where St: OrderedStore<(K, V)> {}

/// Iterator over values in insertion order.
pub struct Values<'a, K, V, St>
where
    K: 'a,
    V: 'a,
    St: OrderedStore<(K, V)> + 'a,
{
    inner: Iter<'a, K, V, St>,
}

impl<'a, K, V, St> Clone for Values<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn clone(&self) -> Self {
        Values {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V, St> Iterator for Values<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, St> DoubleEndedIterator for Values<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, value)| value)
    }
}

impl<'a, K, V, St> ExactSizeIterator for Values<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<'a, K, V, St> FusedIterator for Values<'a, K, V, St> where St: OrderedStore<(K, V)> {}

/// Mutable iterator over values in insertion order.
pub struct ValuesMut<'a, K, V, St>
where
    K: 'a,
    V: 'a,
    St: OrderedStore<(K, V)> + 'a,
{
    inner: IterMut<'a, K, V, St>,
}

impl<'a, K, V, St> Iterator for ValuesMut<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, St> ExactSizeIterator for ValuesMut<'a, K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<'a, K, V, St> FusedIterator for ValuesMut<'a, K, V, St> where St: OrderedStore<(K, V)> {}

/// Owning iterator over `(K, V)` pairs in insertion order.
pub struct IntoIter<K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    inner: St::IntoIter,
}

impl<K, V, St> Iterator for IntoIter<K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, St> DoubleEndedIterator for IntoIter<K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K, V, St> ExactSizeIterator for IntoIter<K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V, St> FusedIterator for IntoIter<K, V, St> where St: OrderedStore<(K, V)> {}

/// Draining iterator over `(K, V)` pairs in insertion order.
pub struct Drain<K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    inner: St::IntoIter,
}

impl<K, V, St> Iterator for Drain<K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, St> ExactSizeIterator for Drain<K, V, St>
where
    St: OrderedStore<(K, V)>,
{
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V, St> FusedIterator for Drain<K, V, St> where St: OrderedStore<(K, V)> {}

impl<'a, K, V, S, St, P> IntoIterator for &'a OrderedMap<K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, St>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, St, P> IntoIterator for &'a mut OrderedMap<K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V, St>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S, St, P> IntoIterator for OrderedMap<K, V, S, St, P>
where
    St: OrderedStore<(K, V)>,
    P: Position,
{
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, St>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.inner.into_values(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    use super::*;
    use crate::error::Error;

    fn sample() -> OrderedMap<i32, &'static str> {
        let mut map = OrderedMap::new();
        for (key, value) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
            map.insert(key, value).unwrap();
        }
        map
    }

    #[test]
    fn insertion_preserves_order() {
        let mut map: OrderedMap<i32, &str> = OrderedMap::new();
        map.insert(1, "a").unwrap();
        map.insert(2, "b").unwrap();
        map.insert(3, "c").unwrap();
        let pairs: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(pairs, [(1, "a"), (2, "b"), (3, "c")]);
    }

    #[test]
    fn shift_remove_keeps_order() {
        let mut map = sample();
        assert_eq!(map.shift_remove(&2), Some("b"));
        let pairs: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(pairs, [(1, "a"), (3, "c"), (4, "d")]);
        assert_eq!(map.get_index(1), Some((&3, &"c")));
    }

    #[test]
    fn swap_remove_swaps_in_last() {
        let mut map = sample();
        assert_eq!(map.swap_remove(&2), Some("b"));
        let pairs: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(pairs, [(1, "a"), (4, "d"), (3, "c")]);
    }

    #[test]
    fn rehash_keeps_iteration_order() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        for key in 0..10_000 {
            map.insert(key, key * 2).unwrap();
        }
        let before: Vec<_> = map.keys().copied().collect();
        let doubled = map.bucket_count() * 2;
        map.rehash(doubled).unwrap();
        let after: Vec<_> = map.keys().copied().collect();
        assert_eq!(before, after);
        for key in 0..10_000 {
            assert_eq!(map.get(&key), Some(&(key * 2)));
        }
    }

    #[test]
    fn load_factor_growth_trigger() {
        let mut map: OrderedMap<i32, i32> =
            OrderedMap::with_parameters(16, 0.5, DefaultHashBuilder::default()).unwrap();
        for key in 0..8 {
            map.insert(key, key).unwrap();
        }
        assert_eq!(map.bucket_count(), 16);
        map.insert(8, 8).unwrap();
        assert_eq!(map.bucket_count(), 32);
        assert!(map.load_factor() < 0.5);
    }

    #[test]
    fn insert_does_not_overwrite() {
        let mut map: OrderedMap<i32, &str> = OrderedMap::new();
        assert_eq!(map.insert(1, "a").unwrap(), (0, true));
        assert_eq!(map.insert(1, "z").unwrap(), (0, false));
        assert_eq!(map.get(&1), Some(&"a"));

        assert_eq!(map.insert_or_assign(1, "z").unwrap(), Some("a"));
        assert_eq!(map.get(&1), Some(&"z"));
        assert_eq!(map.insert_or_assign(2, "b").unwrap(), None);
    }

    #[test]
    fn remove_then_insert_moves_to_end() {
        let mut map = sample();
        map.shift_remove(&1);
        map.insert(1, "a").unwrap();
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, [2, 3, 4, 1]);
    }

    #[test]
    fn heterogeneous_lookup() {
        let mut map: OrderedMap<String, i32> = OrderedMap::new();
        map.insert("alpha".to_string(), 1).unwrap();
        map.insert("beta".to_string(), 2).unwrap();
        assert_eq!(map.get("alpha"), Some(&1));
        assert!(map.contains_key("beta"));
        assert_eq!(map.shift_remove("alpha"), Some(1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn try_get_reports_missing_keys() {
        let mut map = sample();
        assert_eq!(map.try_get(&1).unwrap(), &"a");
        assert!(matches!(map.try_get(&99), Err(Error::KeyNotFound)));
        assert!(matches!(map.try_get_mut(&99), Err(Error::KeyNotFound)));
        *map.try_get_mut(&1).unwrap() = "z";
        assert_eq!(map.get(&1), Some(&"z"));
    }

    #[test]
    fn entry_api() {
        let mut map: OrderedMap<&str, i32> = OrderedMap::new();
        *map.entry("a").or_insert(0).unwrap() += 1;
        *map.entry("a").or_insert(0).unwrap() += 1;
        assert_eq!(map.get("a"), Some(&2));

        map.entry("b").or_default().unwrap();
        assert_eq!(map.get("b"), Some(&0));

        let value = map
            .entry("a")
            .and_modify(|value| *value *= 10)
            .or_insert(0)
            .unwrap();
        assert_eq!(*value, 20);

        match map.entry("a") {
            Entry::Occupied(occupied) => {
                assert_eq!(occupied.key(), &"a");
                assert_eq!(occupied.index(), 0);
                assert_eq!(occupied.remove(), 20);
            }
            Entry::Vacant(_) => panic!("expected occupied"),
        }
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), ["b"]);

        match map.entry("missing") {
            Entry::Occupied(_) => panic!("expected vacant"),
            Entry::Vacant(vacant) => {
                assert_eq!(vacant.key(), &"missing");
                vacant.insert(5).unwrap();
            }
        }
        assert_eq!(map.get("missing"), Some(&5));
    }

    #[test]
    fn entry_swap_remove() {
        let mut map = sample();
        match map.entry(2) {
            Entry::Occupied(occupied) => {
                assert_eq!(occupied.swap_remove_entry(), (2, "b"));
            }
            Entry::Vacant(_) => panic!("expected occupied"),
        }
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, [1, 4, 3]);
    }

    #[test]
    fn hints_short_circuit() {
        let mut map = sample();
        assert_eq!(map.insert_hint(1, 2, "x").unwrap(), (1, false));
        assert_eq!(map.get(&2), Some(&"b"));

        // A wrong hint falls back to a regular insert.
        assert_eq!(map.insert_hint(0, 5, "e").unwrap(), (4, true));

        assert_eq!(map.insert_or_assign_hint(1, 2, "y").unwrap(), (1, Some("b")));
        assert_eq!(map.get(&2), Some(&"y"));
    }

    #[test]
    fn index_ranges() {
        let map = sample();
        assert_eq!(map.get_index_of(&3), Some(2));
        assert_eq!(map.equal_range(&3), 2..3);
        assert_eq!(map.equal_range(&9), 4..4);
        assert_eq!(map.count(&3), 1);
        assert_eq!(map.count(&9), 0);
        assert_eq!(map.first(), Some((&1, &"a")));
        assert_eq!(map.last(), Some((&4, &"d")));
    }

    #[test]
    fn shift_remove_range_drops_middle() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        for key in 0..10 {
            map.insert(key, key).unwrap();
        }
        map.shift_remove_range(2..5);
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, [0, 1, 5, 6, 7, 8, 9]);
        assert_eq!(map.get(&3), None);
        assert_eq!(map.get(&7), Some(&7));
    }

    #[test]
    fn index_operator_returns_value() {
        let map = sample();
        assert_eq!(map[&1], "a");
    }

    #[test]
    #[should_panic(expected = "no entry found for key")]
    fn index_operator_panics_on_missing() {
        let map = sample();
        let _ = map[&99];
    }

    #[test]
    fn pop_removes_last() {
        let mut map = sample();
        assert_eq!(map.pop(), Some((4, "d")));
        assert_eq!(map.pop(), Some((3, "c")));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn drain_yields_in_order_and_clears() {
        let mut map = sample();
        let drained: Vec<_> = map.drain().collect();
        assert_eq!(drained, [(1, "a"), (2, "b"), (3, "c"), (4, "d")]);
        assert!(map.is_empty());
        map.insert(9, "z").unwrap();
        assert_eq!(map.get(&9), Some(&"z"));
    }

    #[test]
    fn from_iterator_keeps_first_duplicate() {
        let map: OrderedMap<i32, &str> =
            [(1, "a"), (2, "b"), (1, "later")].into_iter().collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&"a"));
    }

    #[test]
    fn equality_is_order_sensitive() {
        let mut left: OrderedMap<i32, i32> = OrderedMap::new();
        let mut right: OrderedMap<i32, i32> = OrderedMap::new();
        left.insert(1, 10).unwrap();
        left.insert(2, 20).unwrap();
        right.insert(2, 20).unwrap();
        right.insert(1, 10).unwrap();
        assert_ne!(left, right);

        let mut same: OrderedMap<i32, i32> = OrderedMap::new();
        same.insert(1, 10).unwrap();
        same.insert(2, 20).unwrap();
        assert_eq!(left, same);
    }

    #[test]
    fn iter_mut_and_values_mut() {
        let mut map: OrderedMap<i32, i32> = (0..5).map(|key| (key, key)).collect();
        for (_, value) in map.iter_mut() {
            *value += 100;
        }
        for value in map.values_mut() {
            *value += 1;
        }
        let values: Vec<_> = map.values().copied().collect();
        assert_eq!(values, [101, 102, 103, 104, 105]);
    }

    #[test]
    fn contiguous_backing_exposes_slice() {
        let mut map: OrderedMap<i32, i32, DefaultHashBuilder, ContiguousStore<(i32, i32)>> =
            OrderedMap::new();
        for key in 0..5 {
            map.insert(key, key * key).unwrap();
        }
        assert_eq!(map.as_entry_slice()[3], (3, 9));
        assert!(map.entry_capacity() >= 5);
    }

    #[test]
    fn into_iterator_forms() {
        let map = sample();
        let by_ref: Vec<_> = (&map).into_iter().map(|(k, _)| *k).collect();
        assert_eq!(by_ref, [1, 2, 3, 4]);
        let owned: Vec<_> = map.into_iter().collect();
        assert_eq!(owned, [(1, "a"), (2, "b"), (3, "c"), (4, "d")]);
    }

    #[test]
    fn debug_output_is_ordered() {
        let mut map: OrderedMap<i32, &str> = OrderedMap::new();
        map.insert(2, "b").unwrap();
        map.insert(1, "a").unwrap();
        assert_eq!(alloc::format!("{map:?}"), r#"{2: "b", 1: "a"}"#);
    }

    #[test]
    fn string_keys_survive_churn() {
        let mut map: OrderedMap<String, usize> = OrderedMap::new();
        for i in 0..500usize {
            map.insert(alloc::format!("key_{i}"), i).unwrap();
        }
        for i in (0..500).step_by(2) {
            map.shift_remove(alloc::format!("key_{i}").as_str());
        }
        assert_eq!(map.len(), 250);
        for i in 0..500usize {
            let key = alloc::format!("key_{i}");
            if i % 2 == 0 {
                assert!(!map.contains_key(key.as_str()));
            } else {
                assert_eq!(map.get(key.as_str()), Some(&i));
            }
        }
    }
}
