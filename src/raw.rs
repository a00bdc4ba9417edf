//! The raw insertion-ordered hash engine shared by [`OrderedMap`] and
//! [`OrderedSet`].
//!
//! [`OrderedHash<V, St, P>`] couples two arrays:
//!
//! - a dense store of values in insertion order (any [`OrderedStore`]), and
//! - a power-of-two bucket array of index cells, each holding a *position*
//!   into the store plus the truncated hash of the entry's key.
//!
//! Collisions are resolved with Robin Hood linear probing: on insertion,
//! whichever of two colliding cells sits farther from its initial bucket
//! keeps the slot and the other moves on. Deletion uses backward shift
//! instead of tombstones, pulling subsequent cells one slot earlier until a
//! cell already sits in its initial bucket or an empty slot is reached.
//! Probe chains therefore stay short and lookups can stop as soon as the
//! probed distance exceeds the resident cell's own distance.
//!
//! Because the index stores positions rather than pointers, ordered removal
//! must slide every later position down by one. The engine walks the store
//! tail and relocates each affected cell by rehashing its value, which costs
//! O(tail) instead of a scan over the whole bucket array.
//!
//! This is a low-level structure: every operation takes the hash value and
//! an equality predicate, and operations that relocate store entries also
//! take a hash function for stored values. Prefer [`OrderedMap`] or
//! [`OrderedSet`] unless you are building your own keyed surface.
//!
//! Growth is two-phase. A normal grow doubles the bucket array once
//! `len() >= bucket_count * max_load_factor`. Additionally, when a single
//! insertion probes more than [`REHASH_ON_HIGH_NB_PROBES`] slots while the
//! load factor is moderate, a deferred-grow flag is set; the *next*
//! insertion performs the rehash, keeping the flag-setting path free of
//! allocation.
//!
//! [`OrderedMap`]: crate::OrderedMap
//! [`OrderedSet`]: crate::OrderedSet
//! [`OrderedStore`]: crate::store::OrderedStore

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::marker::PhantomData;

use crate::error::Error;
use crate::store::OrderedStore;
use crate::store::SegmentedStore;

/// Default number of buckets for a freshly created table.
pub const DEFAULT_INIT_BUCKETS: usize = 16;

/// Default maximum load factor.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.9;

/// Smallest accepted maximum load factor.
pub const MIN_MAX_LOAD_FACTOR: f32 = 0.1;

/// Largest accepted maximum load factor.
pub const MAX_MAX_LOAD_FACTOR: f32 = 0.95;

/// Probe-run length past which an insertion requests a deferred grow.
pub const REHASH_ON_HIGH_NB_PROBES: usize = 128;

/// Minimum load factor for the deferred grow to trigger; below it a long
/// probe run is attributed to a poor hash function rather than pressure.
pub const REHASH_MIN_LOAD_FACTOR: f32 = 0.15;

const NB_RESERVED_POSITIONS: usize = 1;

/// Unsigned width used by bucket cells for positions and truncated hashes.
///
/// The width bounds the table: one value is reserved as the empty marker, so
/// a table can hold at most `2^W - 2` entries, and the bucket array is capped
/// at `2^W` buckets so that the initial bucket computed from a truncated hash
/// agrees with the one computed from the full hash.
///
/// Implemented for `u8`, `u16`, `u32` (the default), and `u64`. Narrow
/// widths halve the index memory; `u8` is mostly useful for exercising the
/// capacity boundary in tests.
pub trait Position: Copy + Eq + Debug + 'static {
    /// Reserved value marking an empty bucket cell.
    const SENTINEL: Self;

    /// Converts a position. Debug-asserts that `value` is representable.
    fn from_usize(value: usize) -> Self;

    /// Widens back to `usize`.
    fn to_usize(self) -> usize;

    /// Keeps the low `W` bits of a full hash.
    fn truncate_hash(hash: u64) -> Self;

    /// Largest number of entries a table with this width can hold.
    fn max_size() -> usize;

    /// Largest supported bucket-array length.
    fn max_bucket_count() -> usize;
}

macro_rules! impl_position {
    ($($ty:ty),* $(,)?) => {$(
        impl Position for $ty {
            const SENTINEL: Self = <$ty>::MAX;

            #[inline(always)]
            fn from_usize(value: usize) -> Self {
                debug_assert!(value <= Self::max_size());
                value as $ty
            }

            #[inline(always)]
            fn to_usize(self) -> usize {
                self as usize
            }

            #[inline(always)]
            fn truncate_hash(hash: u64) -> Self {
                hash as $ty
            }

            #[inline(always)]
            fn max_size() -> usize {
                (<$ty>::MAX as usize) - NB_RESERVED_POSITIONS
            }

            #[inline(always)]
            fn max_bucket_count() -> usize {
                (<$ty>::MAX as usize).saturating_add(1)
            }
        }
    )*};
}

impl_position!(u8, u16, u32, u64);

/// One cell of the open-addressed index: a position into the store and the
/// truncated hash of the entry at that position, or the empty marker.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct BucketEntry<P> {
    index: P,
    hash: P,
}

impl<P: Position> BucketEntry<P> {
    pub(crate) const EMPTY: Self = BucketEntry {
        index: P::SENTINEL,
        hash: P::SENTINEL,
    };

    #[inline(always)]
    pub(crate) fn occupied(index: P, hash: P) -> Self {
        BucketEntry { index, hash }
    }

    #[inline(always)]
    pub(crate) fn empty(self) -> bool {
        self.index == P::SENTINEL
    }

    #[inline(always)]
    fn clear(&mut self) {
        self.index = P::SENTINEL;
    }

    /// Position of the referenced entry. Only meaningful when non-empty.
    #[inline(always)]
    pub(crate) fn index(self) -> P {
        debug_assert!(!self.empty());
        self.index
    }

    /// Position field without the occupancy assertion; `SENTINEL` if empty.
    #[inline(always)]
    fn raw_index(self) -> P {
        self.index
    }

    #[inline(always)]
    fn set_index(&mut self, index: usize) {
        debug_assert!(index <= P::max_size());
        self.index = P::from_usize(index);
    }

    /// Truncated hash. Only meaningful when non-empty.
    #[inline(always)]
    pub(crate) fn truncated_hash(self) -> P {
        debug_assert!(!self.empty());
        self.hash
    }
}

/// Bucket count needed to hold `len` entries at `max_load_factor`, before
/// rounding up to a power of two.
fn required_bucket_count(len: usize, max_load_factor: f32) -> usize {
    let exact = len as f32 / max_load_factor;
    let mut count = exact as usize;
    if (count as f32) < exact {
        count += 1;
    }
    count
}

/// An insertion-ordered hash table over values of type `V`.
///
/// The caller provides hash values and equality predicates for every
/// operation; see the [module documentation](self) for the design and the
/// typed [`OrderedMap`](crate::OrderedMap) / [`OrderedSet`](crate::OrderedSet)
/// facades for the convenient surface.
#[derive(Clone)]
pub struct OrderedHash<V, St = SegmentedStore<V>, P = u32> {
    buckets: Vec<BucketEntry<P>>,
    mask: usize,
    store: St,
    grow_on_next_insert: bool,
    max_load_factor: f32,
    load_threshold: usize,
    min_load_factor_rehash_threshold: usize,
    marker: PhantomData<V>,
}

impl<V, St, P> OrderedHash<V, St, P>
where
    St: OrderedStore<V>,
    P: Position,
{
    /// Creates an empty table with the default bucket count and maximum load
    /// factor.
    pub fn new() -> Self {
        Self::with_bucket_count_pow2(DEFAULT_INIT_BUCKETS, DEFAULT_MAX_LOAD_FACTOR)
    }

    /// Creates an empty table able to hold `capacity` entries without
    /// rehashing.
    pub fn with_capacity(capacity: usize) -> Self {
        let needed =
            required_bucket_count(capacity, DEFAULT_MAX_LOAD_FACTOR).max(DEFAULT_INIT_BUCKETS);
        let bucket_count = needed
            .checked_next_power_of_two()
            .unwrap_or(P::max_bucket_count())
            .min(P::max_bucket_count());
        let mut table = Self::with_bucket_count_pow2(bucket_count, DEFAULT_MAX_LOAD_FACTOR);
        table.store = St::with_capacity(capacity);
        table
    }

    /// Creates an empty table with at least `bucket_count` buckets (rounded
    /// up to a power of two; `0` rounds up to the minimum) and the given
    /// maximum load factor.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMaxLoadFactor`] if `max_load_factor` is outside
    /// `[MIN_MAX_LOAD_FACTOR, MAX_MAX_LOAD_FACTOR]`, and
    /// [`Error::CapacityExceeded`] if the rounded bucket count exceeds what
    /// the position width can address.
    pub fn with_parameters(bucket_count: usize, max_load_factor: f32) -> Result<Self, Error> {
        validate_max_load_factor(max_load_factor)?;
        let bucket_count = match bucket_count.max(1).checked_next_power_of_two() {
            Some(count) if count <= P::max_bucket_count() => count,
            _ => {
                return Err(Error::CapacityExceeded {
                    max_size: P::max_size(),
                })
            }
        };
        Ok(Self::with_bucket_count_pow2(bucket_count, max_load_factor))
    }

    fn with_bucket_count_pow2(bucket_count: usize, max_load_factor: f32) -> Self {
        debug_assert!(bucket_count.is_power_of_two());
        let mut table = OrderedHash {
            buckets: vec![BucketEntry::EMPTY; bucket_count],
            mask: bucket_count - 1,
            store: St::new(),
            grow_on_next_insert: false,
            max_load_factor,
            load_threshold: 0,
            min_load_factor_rehash_threshold: 0,
            marker: PhantomData,
        };
        table.recompute_thresholds();
        table
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Largest number of entries the position width can address.
    pub fn max_size(&self) -> usize {
        P::max_size()
    }

    /// Current length of the bucket array. Always a power of two.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Ratio of entries to buckets.
    pub fn load_factor(&self) -> f32 {
        self.store.len() as f32 / self.bucket_count() as f32
    }

    /// Maximum load factor before an insertion grows the bucket array.
    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Sets the maximum load factor and recomputes the growth threshold.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMaxLoadFactor`] if `value` is outside
    /// `[MIN_MAX_LOAD_FACTOR, MAX_MAX_LOAD_FACTOR]`.
    pub fn set_max_load_factor(&mut self, value: f32) -> Result<(), Error> {
        validate_max_load_factor(value)?;
        self.max_load_factor = value;
        self.recompute_thresholds();
        Ok(())
    }

    /// Borrows the entry at `position` in insertion order.
    pub fn get(&self, position: usize) -> Option<&V> {
        self.store.get(position)
    }

    /// Mutably borrows the entry at `position` in insertion order.
    ///
    /// The parts of the value that feed the hash function and equality
    /// predicate must not be modified through the returned reference.
    pub fn get_mut(&mut self, position: usize) -> Option<&mut V> {
        self.store.get_mut(position)
    }

    /// Borrows the underlying store.
    pub fn values_container(&self) -> &St {
        &self.store
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> St::Iter<'_> {
        self.store.iter()
    }

    /// Iterates mutably over the entries in insertion order.
    ///
    /// The parts of the values that feed the hash function and equality
    /// predicate must not be modified.
    pub fn iter_mut(&mut self) -> St::IterMut<'_> {
        self.store.iter_mut()
    }

    /// Consumes the table, iterating over the entries in insertion order.
    pub fn into_values(self) -> St::IntoIter {
        OrderedStore::into_iter(self.store)
    }

    /// Looks up the position of the entry matching `hash` and `eq`.
    pub fn find(&self, hash: u64, eq: impl FnMut(&V) -> bool) -> Option<usize> {
        let ibucket = self.find_bucket(hash, eq)?;
        Some(self.buckets[ibucket].index().to_usize())
    }

    /// Probes for the entry matching `hash` and `eq`, returning either its
    /// position or a handle that can complete the insertion.
    pub fn entry(&mut self, hash: u64, mut eq: impl FnMut(&V) -> bool) -> Entry<'_, V, St, P> {
        let mut ibucket = self.bucket_for_hash(hash);
        let mut dist = 0usize;
        while !self.buckets[ibucket].empty() && dist <= self.probe_distance(ibucket) {
            let bucket = self.buckets[ibucket];
            if bucket.truncated_hash() == P::truncate_hash(hash) {
                let position = bucket.index().to_usize();
                if eq(self.value_at(position)) {
                    return Entry::Occupied(OccupiedEntry {
                        table: self,
                        ibucket,
                        position,
                    });
                }
            }
            ibucket = self.next_bucket(ibucket);
            dist += 1;
        }
        Entry::Vacant(VacantEntry {
            table: self,
            hash,
            ibucket,
            dist,
        })
    }

    /// Inserts `value` unless an entry matching `hash` and `eq` already
    /// exists. Returns the entry's position and whether it was inserted; an
    /// already-present entry is left untouched and `value` is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn insert(
        &mut self,
        hash: u64,
        eq: impl FnMut(&V) -> bool,
        value: V,
    ) -> Result<(usize, bool), Error> {
        match self.entry(hash, eq) {
            Entry::Occupied(occupied) => Ok((occupied.position(), false)),
            Entry::Vacant(vacant) => {
                let (position, _) = vacant.insert(value)?;
                Ok((position, true))
            }
        }
    }

    /// Removes the entry matching `hash` and `eq`, preserving the order of
    /// the remaining entries. Positions after the removed entry decrease by
    /// one.
    pub fn erase(
        &mut self,
        hash: u64,
        eq: impl FnMut(&V) -> bool,
        rehash: impl Fn(&V) -> u64,
    ) -> Option<V> {
        let ibucket = self.find_bucket(hash, eq)?;
        Some(self.erase_value_from_bucket(ibucket, rehash))
    }

    /// Removes the entry at `position`, preserving order.
    pub fn erase_index(&mut self, position: usize, rehash: impl Fn(&V) -> u64) -> Option<V> {
        let hash = rehash(self.store.get(position)?);
        let ibucket = self.bucket_holding(hash, position);
        Some(self.erase_value_from_bucket(ibucket, rehash))
    }

    /// Removes the entries at positions `[first, last)`, preserving the
    /// order of the remaining entries.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn erase_range(&mut self, first: usize, last: usize) {
        assert!(
            first <= last && last <= self.store.len(),
            "range {first}..{last} out of bounds for length {}",
            self.store.len()
        );
        if first == last {
            return;
        }
        let width = last - first;
        self.store.erase_range(first, last);

        // One pass: drop the cells of erased entries, slide the positions of
        // everything past the range.
        for ibucket in 0..self.buckets.len() {
            let bucket = self.buckets[ibucket];
            if bucket.empty() {
                continue;
            }
            let index = bucket.index().to_usize();
            if index >= first && index < last {
                self.buckets[ibucket].clear();
            } else if index >= last {
                self.buckets[ibucket].set_index(index - width);
            }
        }

        // Repair every hole. A backward shift only moves cells toward their
        // initial bucket and stops at an in-place cell or another hole, so
        // one ascending pass reaches a valid state.
        for ibucket in 0..self.buckets.len() {
            if self.buckets[ibucket].empty() {
                self.backward_shift(ibucket);
            }
        }
    }

    /// Removes the entry matching `hash` and `eq` in O(1) by swapping the
    /// previously-last entry into its position. Changes insertion order.
    pub fn unordered_erase(
        &mut self,
        hash: u64,
        eq: impl FnMut(&V) -> bool,
        rehash: impl Fn(&V) -> u64,
    ) -> Option<V> {
        let ibucket = self.find_bucket(hash, eq)?;
        Some(self.unordered_erase_from_bucket(ibucket, rehash))
    }

    /// Removes the entry at `position` in O(1) by swapping the
    /// previously-last entry into its position. Changes insertion order.
    pub fn unordered_erase_index(
        &mut self,
        position: usize,
        rehash: impl Fn(&V) -> u64,
    ) -> Option<V> {
        let hash = rehash(self.store.get(position)?);
        let ibucket = self.bucket_holding(hash, position);
        Some(self.unordered_erase_from_bucket(ibucket, rehash))
    }

    /// Removes and returns the last entry in insertion order.
    pub fn pop_back(&mut self, rehash: impl Fn(&V) -> u64) -> Option<V> {
        if self.store.is_empty() {
            return None;
        }
        self.erase_index(self.store.len() - 1, rehash)
    }

    /// Removes every entry, keeping the bucket array's size.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.store.clear();
    }

    /// Resizes the bucket array to hold at least `bucket_count` buckets
    /// (rounded up to a power of two, and never below what the current
    /// length requires). Entry positions and iteration order are unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the requested count exceeds what the
    /// position width can address.
    pub fn rehash(&mut self, bucket_count: usize) -> Result<(), Error> {
        let min_count = required_bucket_count(self.store.len(), self.max_load_factor);
        self.rehash_impl(bucket_count.max(min_count))
    }

    /// Prepares the table for `capacity` entries: grows the bucket array so
    /// no rehash happens below that size and reserves store space.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if `capacity` is not addressable at the
    /// current maximum load factor.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), Error> {
        self.store
            .reserve(capacity.saturating_sub(self.store.len()));
        self.rehash(required_bucket_count(capacity, self.max_load_factor))
    }

    /// Releases unused store capacity. Best effort; the bucket array keeps
    /// its size.
    pub fn shrink_to_fit(&mut self) {
        self.store.shrink_to_fit();
    }

    #[inline(always)]
    fn bucket_for_hash(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    #[inline(always)]
    fn next_bucket(&self, ibucket: usize) -> usize {
        (ibucket + 1) & self.mask
    }

    /// Slots between the cell's initial bucket and where it actually sits.
    #[inline(always)]
    fn probe_distance(&self, ibucket: usize) -> usize {
        let initial = self.bucket_for_hash(self.buckets[ibucket].truncated_hash().to_usize() as u64);
        // Power-of-two length, so a masked wrapping subtraction is the
        // distance modulo the bucket count.
        ibucket.wrapping_sub(initial) & self.mask
    }

    #[inline]
    fn value_at(&self, position: usize) -> &V {
        match self.store.get(position) {
            Some(value) => value,
            None => unreachable!("bucket cell references a position outside the store"),
        }
    }

    #[inline]
    fn value_at_mut(&mut self, position: usize) -> &mut V {
        match self.store.get_mut(position) {
            Some(value) => value,
            None => unreachable!("bucket cell references a position outside the store"),
        }
    }

    fn recompute_thresholds(&mut self) {
        let bucket_count = self.mask + 1;
        self.load_threshold = (bucket_count as f32 * self.max_load_factor) as usize;
        self.min_load_factor_rehash_threshold =
            (bucket_count as f32 * REHASH_MIN_LOAD_FACTOR) as usize;
    }

    /// Bucket holding the entry matching `hash` and `eq`, if any.
    fn find_bucket(&self, hash: u64, mut eq: impl FnMut(&V) -> bool) -> Option<usize> {
        let mut ibucket = self.bucket_for_hash(hash);
        let mut dist = 0usize;
        loop {
            let bucket = self.buckets[ibucket];
            if bucket.empty() {
                return None;
            }
            if bucket.truncated_hash() == P::truncate_hash(hash)
                && eq(self.value_at(bucket.index().to_usize()))
            {
                return Some(ibucket);
            }
            // A matching entry would have displaced this shorter-probed
            // resident, so the chain cannot contain the key.
            if dist > self.probe_distance(ibucket) {
                return None;
            }
            ibucket = self.next_bucket(ibucket);
            dist += 1;
        }
    }

    /// Bucket holding `position`. The entry must be present; the walk from
    /// its initial bucket cannot cross an empty slot.
    fn bucket_holding(&self, hash: u64, position: usize) -> usize {
        let target = P::from_usize(position);
        let mut ibucket = self.bucket_for_hash(hash);
        while self.buckets[ibucket].raw_index() != target {
            ibucket = self.next_bucket(ibucket);
        }
        ibucket
    }

    /// Rehashes if the deferred-grow flag is set or the load threshold is
    /// reached. Returns whether a rehash happened.
    fn grow_on_high_load(&mut self) -> Result<bool, Error> {
        if self.grow_on_next_insert || self.store.len() >= self.load_threshold {
            self.rehash_impl(self.bucket_count() * 2)?;
            self.grow_on_next_insert = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Places a cell starting at `ibucket` with probe distance `dist`,
    /// displacing residents with shorter distances (Robin Hood swap).
    fn place_index(&mut self, mut ibucket: usize, mut dist: usize, index: P, hash: P) {
        let mut cell = BucketEntry::occupied(index, hash);
        while !self.buckets[ibucket].empty() {
            let distance = self.probe_distance(ibucket);
            if dist > distance {
                cell = core::mem::replace(&mut self.buckets[ibucket], cell);
                dist = distance;
            }
            ibucket = self.next_bucket(ibucket);
            dist += 1;

            if dist > REHASH_ON_HIGH_NB_PROBES
                && self.store.len() >= self.min_load_factor_rehash_threshold
            {
                // This path must stay allocation-free; grow on the next
                // insert instead.
                self.grow_on_next_insert = true;
            }
        }
        self.buckets[ibucket] = cell;
    }

    /// Pulls cells after an emptied slot one slot earlier until a cell in
    /// its initial bucket or another empty slot terminates the chain.
    fn backward_shift(&mut self, empty_ibucket: usize) {
        debug_assert!(self.buckets[empty_ibucket].empty());
        let mut previous = empty_ibucket;
        let mut current = self.next_bucket(previous);
        while !self.buckets[current].empty() && self.probe_distance(current) > 0 {
            self.buckets.swap(previous, current);
            previous = current;
            current = self.next_bucket(current);
        }
    }

    /// Removes the entry referenced by `ibucket`: erases it from the store,
    /// slides the positions of the store tail down by one, then empties the
    /// bucket and backward-shifts its chain.
    fn erase_value_from_bucket(&mut self, ibucket: usize, rehash: impl Fn(&V) -> u64) -> V {
        let position = self.buckets[ibucket].index().to_usize();
        let value = self.store.erase_at(position);
        if position != self.store.len() {
            self.shift_positions_left(position, 1, &rehash);
        }
        self.buckets[ibucket].clear();
        self.backward_shift(ibucket);
        value
    }

    /// For every store entry at `[from, len)`, finds the bucket still
    /// holding its pre-shift position (`position + delta`) and decrements
    /// it. The cell being erased still carries a smaller position and can
    /// never be matched by the walk.
    fn shift_positions_left(&mut self, from: usize, delta: usize, rehash: &impl Fn(&V) -> u64) {
        for position in from..self.store.len() {
            let hash = rehash(self.value_at(position));
            let ibucket = self.bucket_holding(hash, position + delta);
            self.buckets[ibucket].set_index(position);
        }
    }

    fn unordered_erase_from_bucket(&mut self, ibucket: usize, rehash: impl Fn(&V) -> u64) -> V {
        let position = self.buckets[ibucket].index().to_usize();
        let last = self.store.len() - 1;
        if position != last {
            // Swap the target with the last entry, in the store and in the
            // two bucket cells, then the removal degenerates to a pop.
            let last_hash = rehash(self.value_at(last));
            let last_ibucket = self.bucket_holding(last_hash, last);
            self.store.swap(position, last);
            self.buckets[ibucket].set_index(last);
            self.buckets[last_ibucket].set_index(position);
        }
        self.erase_value_from_bucket(ibucket, rehash)
    }

    fn rehash_impl(&mut self, count: usize) -> Result<(), Error> {
        let bucket_count = match count.max(1).checked_next_power_of_two() {
            Some(count) if count <= P::max_bucket_count() => count,
            _ => {
                return Err(Error::CapacityExceeded {
                    max_size: P::max_size(),
                })
            }
        };
        if bucket_count == self.bucket_count() {
            return Ok(());
        }

        let old_buckets = core::mem::replace(&mut self.buckets, vec![BucketEntry::EMPTY; bucket_count]);
        self.mask = bucket_count - 1;
        self.recompute_thresholds();
        self.grow_on_next_insert = false;

        // Keys are not rehashed: the stored truncated hash is enough to
        // recompute the initial bucket.
        for old in old_buckets {
            if old.empty() {
                continue;
            }
            let mut cell = old;
            let mut ibucket = self.bucket_for_hash(cell.truncated_hash().to_usize() as u64);
            let mut dist = 0usize;
            loop {
                if self.buckets[ibucket].empty() {
                    self.buckets[ibucket] = cell;
                    break;
                }
                let distance = self.probe_distance(ibucket);
                if dist > distance {
                    cell = core::mem::replace(&mut self.buckets[ibucket], cell);
                    dist = distance;
                }
                ibucket = self.next_bucket(ibucket);
                dist += 1;
            }
        }
        Ok(())
    }

    /// Empties the bucket array and hands the store to the caller.
    pub(crate) fn take_store(&mut self) -> St {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        core::mem::take(&mut self.store)
    }

    pub(crate) fn buckets_slice(&self) -> &[BucketEntry<P>] {
        &self.buckets
    }

    /// Switches the table into hash-compatible loading: an empty bucket
    /// array with `bucket_count` capacity whose cells arrive through
    /// [`push_loaded_bucket`](Self::push_loaded_bucket). The table is not
    /// queryable until [`finish_bucket_load`](Self::finish_bucket_load)
    /// succeeds.
    pub(crate) fn begin_bucket_load(
        &mut self,
        bucket_count: usize,
        max_load_factor: f32,
        value_capacity: usize,
    ) -> Result<(), Error> {
        debug_assert!(bucket_count.is_power_of_two());
        if bucket_count > P::max_bucket_count() {
            return Err(Error::CapacityExceeded {
                max_size: P::max_size(),
            });
        }
        self.buckets = Vec::with_capacity(bucket_count);
        self.mask = bucket_count - 1;
        self.max_load_factor = max_load_factor;
        self.recompute_thresholds();
        self.store = St::with_capacity(value_capacity);
        self.grow_on_next_insert = false;
        Ok(())
    }

    pub(crate) fn push_loaded_value(&mut self, value: V) {
        self.store.push_back(value);
    }

    pub(crate) fn push_loaded_bucket(&mut self, entry: BucketEntry<P>) {
        self.buckets.push(entry);
    }

    pub(crate) fn loaded_bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Validates a finished hash-compatible load: the bucket array must be
    /// complete, and its occupied cells must reference exactly the stored
    /// entries.
    pub(crate) fn finish_bucket_load(&mut self) -> Result<(), Error> {
        if self.buckets.len() != self.mask + 1 {
            return Err(Error::malformed("bucket record count does not match the header"));
        }
        let mut occupied = 0usize;
        for bucket in &self.buckets {
            if bucket.empty() {
                continue;
            }
            occupied += 1;
            if bucket.index().to_usize() >= self.store.len() {
                return Err(Error::malformed("bucket record position out of range"));
            }
        }
        if occupied != self.store.len() {
            return Err(Error::malformed(
                "occupied bucket count does not match the element count",
            ));
        }
        Ok(())
    }
}

fn validate_max_load_factor(value: f32) -> Result<(), Error> {
    if !(MIN_MAX_LOAD_FACTOR..=MAX_MAX_LOAD_FACTOR).contains(&value) {
        return Err(Error::InvalidMaxLoadFactor {
            value,
            min: MIN_MAX_LOAD_FACTOR,
            max: MAX_MAX_LOAD_FACTOR,
        });
    }
    Ok(())
}

impl<V, St, P> Default for OrderedHash<V, St, P>
where
    St: OrderedStore<V>,
    P: Position,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, St, P> Debug for OrderedHash<V, St, P>
where
    St: OrderedStore<V>,
    P: Position,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderedHash")
            .field("len", &self.len())
            .field("bucket_count", &self.bucket_count())
            .field("load_factor", &self.load_factor())
            .field("grow_on_next_insert", &self.grow_on_next_insert)
            .finish()
    }
}

/// A probed slot in an [`OrderedHash`], either occupied or free to insert
/// into.
pub enum Entry<'a, V, St, P>
where
    St: OrderedStore<V>,
    P: Position,
{
    /// The probed entry exists.
    Occupied(OccupiedEntry<'a, V, St, P>),
    /// No entry matched; the probe's end point is remembered for insertion.
    Vacant(VacantEntry<'a, V, St, P>),
}

/// An existing entry located by [`OrderedHash::entry`].
pub struct OccupiedEntry<'a, V, St, P>
where
    St: OrderedStore<V>,
    P: Position,
{
    table: &'a mut OrderedHash<V, St, P>,
    ibucket: usize,
    position: usize,
}

impl<'a, V, St, P> OccupiedEntry<'a, V, St, P>
where
    St: OrderedStore<V>,
    P: Position,
{
    /// Position of the entry in insertion order.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Borrows the entry.
    pub fn get(&self) -> &V {
        self.table.value_at(self.position)
    }

    /// Mutably borrows the entry. The hashed and compared parts must not be
    /// modified.
    pub fn get_mut(&mut self) -> &mut V {
        self.table.value_at_mut(self.position)
    }

    /// Converts into a mutable borrow tied to the table's lifetime.
    pub fn into_mut(self) -> &'a mut V {
        self.table.value_at_mut(self.position)
    }

    /// Removes the entry, preserving the order of the remaining entries.
    pub fn remove(self, rehash: impl Fn(&V) -> u64) -> V {
        self.table.erase_value_from_bucket(self.ibucket, rehash)
    }

    /// Removes the entry in O(1), swapping the previously-last entry into
    /// its position.
    pub fn swap_remove(self, rehash: impl Fn(&V) -> u64) -> V {
        self.table.unordered_erase_from_bucket(self.ibucket, rehash)
    }
}

/// A free slot located by [`OrderedHash::entry`].
pub struct VacantEntry<'a, V, St, P>
where
    St: OrderedStore<V>,
    P: Position,
{
    table: &'a mut OrderedHash<V, St, P>,
    hash: u64,
    ibucket: usize,
    dist: usize,
}

impl<'a, V, St, P> VacantEntry<'a, V, St, P>
where
    St: OrderedStore<V>,
    P: Position,
{
    /// Inserts `value` at the end of the insertion order, returning its
    /// position and a mutable borrow.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] once the position width is exhausted.
    pub fn insert(self, value: V) -> Result<(usize, &'a mut V), Error> {
        let table = self.table;
        if table.store.len() >= P::max_size() {
            return Err(Error::CapacityExceeded {
                max_size: P::max_size(),
            });
        }
        let (mut ibucket, mut dist) = (self.ibucket, self.dist);
        if table.grow_on_high_load()? {
            ibucket = table.bucket_for_hash(self.hash);
            dist = 0;
        }
        table.store.push_back(value);
        let position = table.store.len() - 1;
        table.place_index(
            ibucket,
            dist,
            P::from_usize(position),
            P::truncate_hash(self.hash),
        );
        Ok((position, table.value_at_mut(position)))
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "stats")] {
        /// Point-in-time statistics about a table's index.
        #[derive(Debug, Clone)]
        pub struct DebugStats {
            /// Number of entries.
            pub len: usize,
            /// Length of the bucket array.
            pub bucket_count: usize,
            /// Ratio of entries to buckets.
            pub load_factor: f32,
            /// Configured maximum load factor.
            pub max_load_factor: f32,
            /// Longest probe distance of any occupied cell.
            pub max_probe_distance: usize,
            /// Mean probe distance over occupied cells.
            pub mean_probe_distance: f64,
            /// Whether a deferred grow is pending.
            pub grow_deferred: bool,
        }

        /// Distribution of probe distances over occupied cells:
        /// `counts[d]` cells sit `d` slots past their initial bucket.
        #[derive(Debug, Clone)]
        pub struct ProbeHistogram {
            /// Cell counts indexed by probe distance.
            pub counts: Vec<usize>,
        }

        #[cfg(feature = "std")]
        impl ProbeHistogram {
            /// Pretty-prints the histogram to stdout.
            pub fn print(&self) {
                println!("probe distance histogram ({} occupied cells):",
                    self.counts.iter().sum::<usize>());
                for (distance, count) in self.counts.iter().enumerate() {
                    if *count > 0 {
                        println!("{distance:>4} | {count}");
                    }
                }
            }
        }

        impl<V, St, P> OrderedHash<V, St, P>
        where
            St: OrderedStore<V>,
            P: Position,
        {
            /// Collects summary statistics about the index.
            pub fn debug_stats(&self) -> DebugStats {
                let mut max = 0usize;
                let mut total = 0usize;
                let mut occupied = 0usize;
                for ibucket in 0..self.buckets.len() {
                    if self.buckets[ibucket].empty() {
                        continue;
                    }
                    let distance = self.probe_distance(ibucket);
                    max = max.max(distance);
                    total += distance;
                    occupied += 1;
                }
                DebugStats {
                    len: self.len(),
                    bucket_count: self.bucket_count(),
                    load_factor: self.load_factor(),
                    max_load_factor: self.max_load_factor,
                    max_probe_distance: max,
                    mean_probe_distance: if occupied == 0 {
                        0.0
                    } else {
                        total as f64 / occupied as f64
                    },
                    grow_deferred: self.grow_on_next_insert,
                }
            }

            /// Collects the probe-distance distribution of the index.
            pub fn probe_histogram(&self) -> ProbeHistogram {
                let mut counts = Vec::new();
                for ibucket in 0..self.buckets.len() {
                    if self.buckets[ibucket].empty() {
                        continue;
                    }
                    let distance = self.probe_distance(ibucket);
                    if counts.len() <= distance {
                        counts.resize(distance + 1, 0);
                    }
                    counts[distance] += 1;
                }
                ProbeHistogram { counts }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;
    use core::hash::Hasher;

    use rand::rngs::OsRng;
    use rand::TryRngCore;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::store::ContiguousStore;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn random() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn hash(&self, key: u64) -> u64 {
            let mut hasher = SipHasher::new_with_keys(self.k0, self.k1);
            hasher.write_u64(key);
            hasher.finish()
        }
    }

    type Item = (u64, i32);
    type Table = OrderedHash<Item>;

    impl<V, St, P> OrderedHash<V, St, P>
    where
        St: OrderedStore<V>,
        P: Position,
    {
        fn assert_invariants(&self, hash_of: impl Fn(&V) -> u64) {
            assert!(self.bucket_count().is_power_of_two());
            let mut seen = vec![false; self.store.len()];
            let mut occupied = 0usize;
            for ibucket in 0..self.buckets.len() {
                let bucket = self.buckets[ibucket];
                if bucket.empty() {
                    continue;
                }
                occupied += 1;
                let position = bucket.index().to_usize();
                assert!(position < self.store.len(), "position out of range");
                assert!(!seen[position], "duplicate position {position}");
                seen[position] = true;
                let hash = hash_of(self.value_at(position));
                assert_eq!(
                    bucket.truncated_hash(),
                    P::truncate_hash(hash),
                    "stored truncated hash mismatch"
                );
                assert_eq!(
                    self.bucket_for_hash(P::truncate_hash(hash).to_usize() as u64),
                    self.bucket_for_hash(hash),
                    "initial bucket diverges between full and truncated hash"
                );
            }
            assert_eq!(occupied, self.store.len(), "position permutation incomplete");
            // Probe distances grow by at most one along any chain.
            for ibucket in 0..self.buckets.len() {
                if self.buckets[ibucket].empty() {
                    continue;
                }
                let next = self.next_bucket(ibucket);
                if !self.buckets[next].empty() {
                    assert!(
                        self.probe_distance(next) <= self.probe_distance(ibucket) + 1,
                        "probe chain not monotone at bucket {ibucket}"
                    );
                }
            }
            if !self.grow_on_next_insert {
                assert!(self.store.len() <= self.load_threshold);
            }
        }
    }

    fn insert_key(state: &HashState, table: &mut Table, key: u64, value: i32) -> (usize, bool) {
        let hash = state.hash(key);
        table
            .insert(hash, |item| item.0 == key, (key, value))
            .unwrap()
    }

    fn keys_in_order(table: &Table) -> Vec<u64> {
        table.iter().map(|item| item.0).collect()
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..200u64 {
            let (position, inserted) = insert_key(&state, &mut table, key, key as i32);
            assert!(inserted);
            assert_eq!(position, key as usize);
        }
        table.assert_invariants(|item| state.hash(item.0));

        for key in 0..200u64 {
            let hash = state.hash(key);
            let position = table.find(hash, |item| item.0 == key).unwrap();
            assert_eq!(table.get(position), Some(&(key, key as i32)));
        }
        assert_eq!(table.find(state.hash(10_000), |item| item.0 == 10_000), None);
    }

    #[test]
    fn duplicate_insert_keeps_first() {
        let state = HashState::random();
        let mut table = Table::new();
        assert_eq!(insert_key(&state, &mut table, 7, 1), (0, true));
        assert_eq!(insert_key(&state, &mut table, 7, 2), (0, false));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0), Some(&(7, 1)));
    }

    #[test]
    fn ordered_erase_shifts_positions() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..50u64 {
            insert_key(&state, &mut table, key, 0);
        }
        let hash = state.hash(20);
        let removed = table.erase(hash, |item| item.0 == 20, |item| state.hash(item.0));
        assert_eq!(removed, Some((20, 0)));
        table.assert_invariants(|item| state.hash(item.0));

        let expected: Vec<u64> = (0..50).filter(|key| *key != 20).collect();
        assert_eq!(keys_in_order(&table), expected);
        // Every remaining key is still reachable through the index.
        for key in expected {
            assert!(table.find(state.hash(key), |item| item.0 == key).is_some());
        }
    }

    #[test]
    fn erase_range_shifts_by_width() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..64u64 {
            insert_key(&state, &mut table, key, 0);
        }
        table.erase_range(10, 30);
        table.assert_invariants(|item| state.hash(item.0));

        let expected: Vec<u64> = (0..10).chain(30..64).collect();
        assert_eq!(keys_in_order(&table), expected);
        for key in 10..30u64 {
            assert!(table.find(state.hash(key), |item| item.0 == key).is_none());
        }
    }

    #[test]
    fn unordered_erase_swaps_in_last() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..8u64 {
            insert_key(&state, &mut table, key, 0);
        }
        let removed = table.unordered_erase(
            state.hash(2),
            |item| item.0 == 2,
            |item| state.hash(item.0),
        );
        assert_eq!(removed, Some((2, 0)));
        table.assert_invariants(|item| state.hash(item.0));
        assert_eq!(keys_in_order(&table), [0, 1, 7, 3, 4, 5, 6]);
    }

    #[test]
    fn unordered_erase_of_last_is_pop() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..4u64 {
            insert_key(&state, &mut table, key, 0);
        }
        table.unordered_erase(state.hash(3), |item| item.0 == 3, |item| state.hash(item.0));
        table.assert_invariants(|item| state.hash(item.0));
        assert_eq!(keys_in_order(&table), [0, 1, 2]);
    }

    #[test]
    fn rehash_preserves_order() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..1000u64 {
            insert_key(&state, &mut table, key, 0);
        }
        let before = keys_in_order(&table);
        let doubled = table.bucket_count() * 2;
        table.rehash(doubled).unwrap();
        assert_eq!(table.bucket_count(), doubled);
        table.assert_invariants(|item| state.hash(item.0));
        assert_eq!(keys_in_order(&table), before);
    }

    #[test]
    fn load_threshold_triggers_growth() {
        let state = HashState::random();
        let mut table: Table = OrderedHash::with_parameters(16, 0.5).unwrap();
        for key in 0..8u64 {
            insert_key(&state, &mut table, key, 0);
        }
        assert_eq!(table.bucket_count(), 16);
        insert_key(&state, &mut table, 8, 0);
        assert_eq!(table.bucket_count(), 32);
        assert!(table.load_factor() < 0.5);
        table.assert_invariants(|item| state.hash(item.0));
    }

    #[test]
    fn deferred_grow_flag_rehashes_on_next_insert() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..10u64 {
            insert_key(&state, &mut table, key, 0);
        }
        let before = table.bucket_count();
        table.grow_on_next_insert = true;
        insert_key(&state, &mut table, 100, 0);
        assert_eq!(table.bucket_count(), before * 2);
        assert!(!table.grow_on_next_insert);
        table.assert_invariants(|item| state.hash(item.0));
    }

    #[test]
    fn narrow_position_width_fails_deterministically() {
        let state = HashState::random();
        let mut table: OrderedHash<Item, SegmentedStore<Item>, u8> = OrderedHash::new();
        let mut inserted = 0usize;
        let mut failed_at = None;
        for key in 0..300u64 {
            let hash = state.hash(key);
            match table.insert(hash, |item| item.0 == key, (key, 0)) {
                Ok((_, true)) => inserted += 1,
                Ok((_, false)) => unreachable!("keys are unique"),
                Err(Error::CapacityExceeded { .. }) => {
                    failed_at = Some(key);
                    break;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        // 256 buckets at the default load factor leave room for 230 entries
        // before growth would exceed the 8-bit bucket cap.
        assert_eq!(inserted, 230);
        assert_eq!(failed_at, Some(230));
        assert_eq!(table.len(), 230);
        table.assert_invariants(|item| state.hash(item.0));
        // The table stays usable after the failure.
        assert!(table
            .find(state.hash(3), |item| item.0 == 3)
            .is_some());
    }

    #[test]
    fn bucket_count_zero_rounds_up() {
        let table: Table = OrderedHash::with_parameters(0, 0.9).unwrap();
        assert_eq!(table.bucket_count(), 1);

        let state = HashState::random();
        let mut table: Table = OrderedHash::with_parameters(0, 0.9).unwrap();
        for key in 0..20u64 {
            insert_key(&state, &mut table, key, 0);
        }
        table.assert_invariants(|item| state.hash(item.0));
    }

    #[test]
    fn invalid_max_load_factor_is_rejected() {
        assert!(matches!(
            Table::with_parameters(16, 0.05),
            Err(Error::InvalidMaxLoadFactor { .. })
        ));
        assert!(matches!(
            Table::with_parameters(16, 0.99),
            Err(Error::InvalidMaxLoadFactor { .. })
        ));
        let mut table = Table::new();
        assert!(matches!(
            table.set_max_load_factor(f32::NAN),
            Err(Error::InvalidMaxLoadFactor { .. })
        ));
        assert!(table.set_max_load_factor(0.5).is_ok());
    }

    #[test]
    fn reserve_prevents_rehash() {
        let state = HashState::random();
        let mut table = Table::new();
        table.reserve(1000).unwrap();
        let bucket_count = table.bucket_count();
        for key in 0..1000u64 {
            insert_key(&state, &mut table, key, 0);
        }
        assert_eq!(table.bucket_count(), bucket_count);
        table.assert_invariants(|item| state.hash(item.0));
    }

    #[test]
    fn entry_api_occupied_and_vacant() {
        let state = HashState::random();
        let mut table = Table::new();
        insert_key(&state, &mut table, 1, 10);

        match table.entry(state.hash(1), |item| item.0 == 1) {
            Entry::Occupied(mut occupied) => {
                assert_eq!(occupied.get(), &(1, 10));
                occupied.get_mut().1 = 11;
            }
            Entry::Vacant(_) => panic!("expected occupied"),
        }
        assert_eq!(table.get(0), Some(&(1, 11)));

        match table.entry(state.hash(2), |item| item.0 == 2) {
            Entry::Occupied(_) => panic!("expected vacant"),
            Entry::Vacant(vacant) => {
                let (position, value) = vacant.insert((2, 20)).unwrap();
                assert_eq!(position, 1);
                assert_eq!(value, &mut (2, 20));
            }
        }
        table.assert_invariants(|item| state.hash(item.0));
    }

    #[test]
    fn erase_then_insert_appends_at_end() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..5u64 {
            insert_key(&state, &mut table, key, 0);
        }
        table.erase(state.hash(1), |item| item.0 == 1, |item| state.hash(item.0));
        insert_key(&state, &mut table, 1, 0);
        assert_eq!(keys_in_order(&table), [0, 2, 3, 4, 1]);
        table.assert_invariants(|item| state.hash(item.0));
    }

    #[test]
    fn contiguous_store_backing() {
        let state = HashState::random();
        let mut table: OrderedHash<Item, ContiguousStore<Item>> = OrderedHash::new();
        for key in 0..100u64 {
            let hash = state.hash(key);
            table.insert(hash, |item| item.0 == key, (key, 0)).unwrap();
        }
        table.erase(state.hash(40), |item| item.0 == 40, |item| state.hash(item.0));
        table.assert_invariants(|item| state.hash(item.0));
        let slice = table.values_container().as_slice();
        assert_eq!(slice.len(), 99);
        assert_eq!(slice[40].0, 41);
    }

    #[test]
    fn mixed_churn_keeps_invariants() {
        let state = HashState::random();
        let mut table = Table::new();
        for round in 0..10u64 {
            for key in 0..200u64 {
                insert_key(&state, &mut table, round * 1000 + key, 0);
            }
            for key in (0..200u64).step_by(3) {
                let key = round * 1000 + key;
                table.erase(state.hash(key), |item| item.0 == key, |item| state.hash(item.0));
            }
            for key in (1..200u64).step_by(7) {
                let key = round * 1000 + key;
                table.unordered_erase(
                    state.hash(key),
                    |item| item.0 == key,
                    |item| state.hash(item.0),
                );
            }
            table.assert_invariants(|item| state.hash(item.0));
        }
    }

    #[test]
    fn pop_back_removes_last() {
        let state = HashState::random();
        let mut table = Table::new();
        for key in 0..5u64 {
            insert_key(&state, &mut table, key, 0);
        }
        assert_eq!(table.pop_back(|item| state.hash(item.0)), Some((4, 0)));
        assert_eq!(keys_in_order(&table), [0, 1, 2, 3]);
        table.assert_invariants(|item| state.hash(item.0));
    }
}
