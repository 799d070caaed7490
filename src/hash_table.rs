use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;

/// Number of slots in a freshly created table.
pub const INITIAL_CAPACITY: usize = 64;

/// Home tag marking an empty slot.
///
/// Never a valid home index: homes are always `< capacity`, and a slot array
/// of `usize::MAX` entries cannot be allocated.
const EMPTY: usize = usize::MAX;

#[inline(always)]
fn home_index(hash: u64, capacity: usize) -> usize {
    (hash % capacity as u64) as usize
}

#[inline(always)]
fn next_index(index: usize, capacity: usize) -> usize {
    let next = index + 1;
    if next == capacity { 0 } else { next }
}

/// Circular distance walked forward from `home` to reach `index`.
#[inline(always)]
fn displacement(home: usize, index: usize, capacity: usize) -> usize {
    if index >= home {
        index - home
    } else {
        index + capacity - home
    }
}

/// Orders the home of the occupant at `index` against the home of the item
/// being scanned for, measured along the circular probe sequence.
///
/// `Less` means the occupant's home sorts first, so it stays ahead of the
/// scanned item. `Greater` means the scanned item belongs in front of it.
/// Comparing raw indices would be wrong once a run wraps past the end of the
/// array, so both homes are measured as distances back from `index`.
#[inline(always)]
fn order_homes(occupant: usize, scanned: usize, index: usize, capacity: usize) -> Ordering {
    displacement(scanned, index, capacity).cmp(&displacement(occupant, index, capacity))
}

#[cold]
#[inline(never)]
fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}

/// The error type for [`HashTable::try_reserve`] and
/// [`HashMap::try_reserve`](crate::HashMap::try_reserve).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TryReserveError {
    /// The requested number of slots does not fit in a `usize`.
    CapacityOverflow,
    /// The allocator could not provide the slot array.
    AllocError,
}

impl core::fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str("capacity overflow: table size exceeds usize::MAX")
            }
            TryReserveError::AllocError => f.write_str("memory allocation for the table failed"),
        }
    }
}

impl core::error::Error for TryReserveError {}

/// Number of slots needed to hold `items` without crossing the 50% load
/// ceiling.
fn slots_for(items: usize) -> Result<usize, TryReserveError> {
    items
        .checked_mul(2)
        .and_then(usize::checked_next_power_of_two)
        .map(|slots| slots.max(INITIAL_CAPACITY))
        .ok_or(TryReserveError::CapacityOverflow)
}

struct Slot<V> {
    home: usize,
    hash: u64,
    item: Option<V>,
}

impl<V> Slot<V> {
    #[inline(always)]
    const fn empty() -> Self {
        Slot {
            home: EMPTY,
            hash: 0,
            item: None,
        }
    }

    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.home == EMPTY
    }

    #[inline(always)]
    fn take(&mut self) -> Option<V> {
        self.home = EMPTY;
        self.hash = 0;
        self.item.take()
    }

    #[inline(always)]
    fn item(&self) -> &V {
        match &self.item {
            Some(item) => item,
            None => unreachable!("occupied slot holds no item"),
        }
    }

    #[inline(always)]
    fn item_mut(&mut self) -> &mut V {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("occupied slot holds no item"),
        }
    }
}

fn allocate<V>(capacity: usize) -> Box<[Slot<V>]> {
    (0..capacity).map(|_| Slot::empty()).collect()
}

fn try_allocate<V>(capacity: usize) -> Result<Box<[Slot<V>]>, TryReserveError> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| TryReserveError::AllocError)?;
    slots.resize_with(capacity, Slot::empty);
    Ok(slots.into_boxed_slice())
}

/// Outcome of a read-only scan for a hash and equality predicate.
enum Probe {
    /// The matching item lives at this index.
    Found(usize),
    /// No match; an item with this hash would be placed at this index.
    Vacant(usize),
}

/// Displacement histogram for a [`HashTable`].
///
/// `counts()[d]` is the number of items sitting `d` slots past their home
/// index.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    counts: Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// Item counts indexed by displacement.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// The largest displacement of any item, or zero for an empty table.
    pub fn max_displacement(&self) -> usize {
        self.counts.len().saturating_sub(1)
    }

    /// Pretty-prints the histogram as a horizontal bar chart on stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.counts.iter().copied().max().unwrap_or(0);
        if max == 0 {
            std::println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        std::println!(
            "probe histogram ({} entries):",
            self.counts.iter().sum::<usize>()
        );

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = match units % 8 {
                0 => None,
                1 => Some('▏'),
                2 => Some('▎'),
                3 => Some('▍'),
                4 => Some('▌'),
                5 => Some('▋'),
                6 => Some('▊'),
                _ => Some('▉'),
            };
            if let Some(ch) = partial {
                bar.push(ch);
            }
            bar
        };

        for (distance, &count) in self.counts.iter().enumerate() {
            std::println!("{:>3} | {} ({})", distance, make_bar(count), count);
        }
    }
}

/// Occupancy and displacement statistics for a [`HashTable`].
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of items currently in the table
    pub populated: usize,
    /// Total number of slots allocated
    pub capacity: usize,
    /// Items the table holds before it grows
    pub max_populated: usize,
    /// Load factor (populated / capacity)
    pub load_factor: f64,
    /// Largest distance of any item from its home index
    pub max_displacement: usize,
    /// Mean distance of items from their home index
    pub mean_displacement: f64,
    /// Bytes used by the slot array
    pub total_bytes: usize,
    /// Bytes held by empty slots
    pub wasted_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        std::println!("=== Hash Table Debug Statistics ===");
        std::println!(
            "Population: {}/{} slots ({:.2}% load factor, grows past {})",
            self.populated,
            self.capacity,
            self.load_factor * 100.0,
            self.max_populated
        );
        std::println!(
            "Displacement: max {}, mean {:.3}",
            self.max_displacement,
            self.mean_displacement
        );
        std::println!("Total Allocated: {} bytes", self.total_bytes);
        std::println!(
            "Memory: {} bytes in empty slots ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// A hash table using ordered open addressing.
///
/// `HashTable<V>` stores values of type `V` in a single slot array. Each
/// occupied slot remembers its item's hash and home index (`hash % capacity`),
/// and items are kept sorted by home index along the circular probe sequence:
/// an item is only ever pushed forward by an item whose home comes strictly
/// earlier. This ordering lets lookups for absent items stop as soon as they
/// pass the point where the item would have been, and lets removal close gaps
/// by shifting successors back instead of leaving tombstones.
///
/// Like other raw tables, this type does not hash anything itself: callers
/// supply the hash and an equality predicate for each operation. The table
/// keeps at most half of its slots occupied and doubles when an insertion
/// would cross that line.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use ordered_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = HashTable::new();
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123) {
///     ordered_hash::hash_table::Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     ordered_hash::hash_table::Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
///
/// assert_eq!(table.find(hash, |p| p.id == 123).map(|p| p.name.as_str()), Some("Alice"));
/// ```
pub struct HashTable<V> {
    slots: Box<[Slot<V>]>,
    populated: usize,
}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::string::ToString;

        if self.is_empty() {
            return f
                .debug_struct("HashTable")
                .field("homes", &"empty")
                .field("populated", &self.populated)
                .field("capacity", &self.capacity())
                .finish();
        }

        f.debug_struct("HashTable")
            .field(
                "homes",
                &self
                    .slots
                    .chunks(16)
                    .map(|row| {
                        row.iter()
                            .map(|slot| {
                                if slot.is_empty() {
                                    "...".to_string()
                                } else {
                                    format!("{:03}", slot.home)
                                }
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .collect::<Vec<String>>(),
            )
            .field("populated", &self.populated)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<V> Clone for HashTable<V>
where
    V: Clone,
{
    /// Re-places every item into a fresh table.
    ///
    /// The copy gets the smallest capacity that holds `self.len()` items
    /// under the load ceiling, so its layout is rebuilt for that capacity
    /// rather than copied slot by slot and no growth happens on the way.
    fn clone(&self) -> Self {
        let capacity = match slots_for(self.populated) {
            Ok(capacity) => capacity,
            Err(_) => capacity_overflow(),
        };
        let mut new_table = Self::with_slots(allocate(capacity));
        for slot in self.slots.iter().filter(|slot| !slot.is_empty()) {
            new_table.insert_unique(slot.hash, slot.item().clone());
        }

        debug_assert_eq!(new_table.populated, self.populated);
        new_table
    }

    /// Clears `self`, keeping its capacity, and re-places every item of
    /// `source`.
    fn clone_from(&mut self, source: &Self) {
        self.clear();
        for slot in source.slots.iter().filter(|slot| !slot.is_empty()) {
            self.insert_unique(slot.hash, slot.item().clone());
        }
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashTable<V> {
    /// Creates an empty table with [`INITIAL_CAPACITY`] slots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<u64> = HashTable::new();
    /// assert_eq!(table.capacity(), 64);
    /// assert!(table.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_slots(allocate(INITIAL_CAPACITY))
    }

    /// Creates an empty table that can hold at least `capacity` items before
    /// growing.
    ///
    /// The slot count is the next power of two at or above `2 * capacity`, and
    /// never less than [`INITIAL_CAPACITY`].
    ///
    /// # Panics
    ///
    /// Panics if the slot count overflows `usize`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert!(table.capacity() / 2 >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        match slots_for(capacity) {
            Ok(slots) => Self::with_slots(allocate(slots)),
            Err(_) => capacity_overflow(),
        }
    }

    fn with_slots(slots: Box<[Slot<V>]>) -> Self {
        debug_assert!(!slots.is_empty());
        Self {
            slots,
            populated: 0,
        }
    }

    /// Returns an iterator over all items in the table.
    ///
    /// Items are yielded in slot order, which depends on the hashes and the
    /// current capacity; callers should treat it as arbitrary.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(1, |&n: &u64| n == 10).or_insert(10);
    /// table.entry(2, |&n: &u64| n == 20).or_insert(20);
    ///
    /// let mut values: Vec<u64> = table.iter().copied().collect();
    /// values.sort();
    /// assert_eq!(values, vec![10, 20]);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.populated,
        }
    }

    /// Returns an iterator over mutable references to all items.
    ///
    /// Changing the part of an item its hash was computed from leaves it
    /// unreachable through lookups.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.populated,
        }
    }

    /// Returns an iterator that removes and yields all items from the table.
    ///
    /// The table is empty as soon as this returns, with the same capacity.
    /// Items the iterator does not yield are dropped with it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(7, |s: &String| s == "key1").or_insert("key1".to_string());
    ///
    /// let values: Vec<String> = table.drain().collect();
    /// assert!(table.is_empty());
    /// assert_eq!(values, vec!["key1".to_string()]);
    /// ```
    pub fn drain(&mut self) -> Drain<'_, V> {
        // The table is emptied before the iterator exists, so forgetting the
        // iterator only leaks the items it still holds.
        let capacity = self.slots.len();
        let remaining = core::mem::replace(&mut self.populated, 0);
        let slots = core::mem::replace(&mut self.slots, allocate(capacity));
        Drain {
            slots: slots.into_vec().into_iter(),
            remaining,
            marker: PhantomData,
        }
    }

    /// Returns `true` if the table contains no items.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of items in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns the number of slots in the table.
    ///
    /// The table grows once more than half of these slots would be occupied.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Removes all items from the table.
    ///
    /// Every slot is reset to empty and every item dropped. The slot array is
    /// reused, so capacity never shrinks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// for n in 0..100u64 {
    ///     table.entry(n, |&v: &u64| v == n).or_insert(n);
    /// }
    /// let capacity = table.capacity();
    ///
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        log::trace!(
            "clearing {} items from {} slots",
            self.populated,
            self.slots.len()
        );
        for slot in self.slots.iter_mut() {
            *slot = Slot::empty();
        }
        self.populated = 0;
    }

    /// Reserves room for at least `additional` more items without growing.
    ///
    /// # Panics
    ///
    /// Panics if the required slot count overflows `usize`.
    pub fn reserve(&mut self, additional: usize) {
        match self.try_reserve(additional) {
            Ok(()) => {}
            Err(TryReserveError::CapacityOverflow) => capacity_overflow(),
            Err(TryReserveError::AllocError) => panic!("memory allocation for the table failed"),
        }
    }

    /// Tries to reserve room for at least `additional` more items.
    ///
    /// Capacity doubles until `len() + additional` items fit within half of
    /// the slots. Nothing changes when that already holds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// # use ordered_hash::TryReserveError;
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// table.try_reserve(1000).unwrap();
    /// assert!(table.capacity() / 2 >= 1000);
    ///
    /// assert_eq!(table.try_reserve(usize::MAX), Err(TryReserveError::CapacityOverflow));
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let required = self
            .populated
            .checked_add(additional)
            .ok_or(TryReserveError::CapacityOverflow)?;

        let mut capacity = self.slots.len();
        while required > capacity / 2 {
            capacity = capacity
                .checked_mul(2)
                .ok_or(TryReserveError::CapacityOverflow)?;
        }

        if capacity != self.slots.len() {
            log::trace!(
                "reserving {} more items: {} -> {} slots",
                additional,
                self.slots.len(),
                capacity
            );
            self.rehash_into(try_allocate(capacity)?);
        }
        Ok(())
    }

    /// Returns a reference to the item matching `hash` and `eq`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(42, |&n: &u64| n == 42).or_insert(42);
    ///
    /// assert_eq!(table.find(42, |&n| n == 42), Some(&42));
    /// assert_eq!(table.find(43, |&n| n == 43), None);
    /// ```
    #[inline]
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        if self.populated == 0 {
            return None;
        }

        match self.probe(hash, eq) {
            Probe::Found(index) => Some(self.slots[index].item()),
            Probe::Vacant(_) => None,
        }
    }

    /// Returns a mutable reference to the item matching `hash` and `eq`.
    #[inline]
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        if self.populated == 0 {
            return None;
        }

        match self.probe(hash, eq) {
            Probe::Found(index) => Some(self.slots[index].item_mut()),
            Probe::Vacant(_) => None,
        }
    }

    /// Removes and returns the item matching `hash` and `eq`.
    ///
    /// The gap is closed by shifting displaced successors back one slot, so
    /// no tombstone is left behind.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(42, |&n: &u64| n == 42).or_insert(42);
    ///
    /// assert_eq!(table.remove(42, |&n| n == 42), Some(42));
    /// assert!(table.is_empty());
    /// assert_eq!(table.remove(99, |&n| n == 99), None);
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        if self.populated == 0 {
            return None;
        }

        match self.probe(hash, eq) {
            Probe::Found(index) => Some(self.remove_at(index)),
            Probe::Vacant(_) => None,
        }
    }

    /// Keeps only the items for which `f` returns `true`.
    ///
    /// Each item is visited exactly once.
    pub fn retain(&mut self, mut f: impl FnMut(&mut V) -> bool) {
        if self.populated == 0 {
            return;
        }

        // Backward shifts never cross an empty slot, so walking one full
        // circle from an empty slot visits every item once even while
        // removals pull successors back.
        let capacity = self.slots.len();
        let Some(start) = self.slots.iter().position(Slot::is_empty) else {
            unreachable!("load ceiling keeps at least one slot empty")
        };

        let mut offset = 1;
        while offset < capacity {
            let index = (start + offset) % capacity;
            let keep = match &mut self.slots[index].item {
                Some(item) => f(item),
                None => true,
            };

            if keep {
                offset += 1;
            } else {
                self.remove_at(index);
            }
        }
    }

    /// Gets the entry for the given hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use ordered_hash::hash_table::Entry;
    /// # use ordered_hash::hash_table::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = HashTable::new();
    /// let hash = hash_str("hello");
    ///
    /// match table.entry(hash, |s: &String| s == "hello") {
    ///     Entry::Vacant(entry) => {
    ///         entry.insert("hello".to_string());
    ///     }
    ///     Entry::Occupied(mut entry) => {
    ///         *entry.get_mut() = "updated".to_string();
    ///     }
    /// }
    ///
    /// assert_eq!(table.len(), 1);
    /// ```
    #[inline]
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Entry<'_, V> {
        match self.probe(hash, eq) {
            Probe::Found(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            Probe::Vacant(index) => Entry::Vacant(VacantEntry {
                table: self,
                hash,
                index,
            }),
        }
    }

    /// Scans from the home index of `hash`.
    ///
    /// Occupants whose home sorts before ours are skipped, occupants sharing
    /// our home are compared, and the first empty slot or occupant whose home
    /// sorts after ours ends the scan: the ordering guarantees no match can
    /// sit beyond it.
    #[inline]
    fn probe(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Probe {
        let capacity = self.slots.len();
        let home = home_index(hash, capacity);
        let mut index = home;
        loop {
            let slot = &self.slots[index];
            if slot.is_empty() {
                return Probe::Vacant(index);
            }

            match order_homes(slot.home, home, index, capacity) {
                Ordering::Less => {}
                Ordering::Equal => {
                    if slot.hash == hash && eq(slot.item()) {
                        return Probe::Found(index);
                    }
                }
                Ordering::Greater => return Probe::Vacant(index),
            }

            index = next_index(index, capacity);
        }
    }

    /// Index at which a new item with `hash` would be placed, assuming no
    /// equal item is present.
    fn insertion_point(&self, hash: u64) -> usize {
        let capacity = self.slots.len();
        let home = home_index(hash, capacity);
        let mut index = home;
        while !self.slots[index].is_empty()
            && order_homes(self.slots[index].home, home, index, capacity) != Ordering::Greater
        {
            index = next_index(index, capacity);
        }
        index
    }

    /// Places `item` at `index`, which must be its insertion point.
    ///
    /// An occupant whose home sorts after the carried item's home is swapped
    /// out and carried forward in turn; the chain ends at the first empty
    /// slot. Each displaced item is pushed by one whose home sorts strictly
    /// earlier, which keeps the slots sorted by home. No user code runs here.
    fn place(&mut self, mut index: usize, hash: u64, item: V) {
        let capacity = self.slots.len();
        let mut carried = Slot {
            home: home_index(hash, capacity),
            hash,
            item: Some(item),
        };

        loop {
            let slot = &mut self.slots[index];
            if slot.is_empty() {
                *slot = carried;
                self.populated += 1;
                return;
            }

            if order_homes(slot.home, carried.home, index, capacity) == Ordering::Greater {
                core::mem::swap(slot, &mut carried);
            }

            index = next_index(index, capacity);
        }
    }

    /// Doubles the slot array if one more item would push occupancy past half
    /// of the slots. Returns whether the table grew.
    fn grow_for_insert(&mut self) -> bool {
        if self.populated < self.slots.len() / 2 {
            return false;
        }

        let capacity = match self.slots.len().checked_mul(2) {
            Some(capacity) => capacity,
            None => capacity_overflow(),
        };
        self.rehash_into(allocate(capacity));
        true
    }

    /// Inserts an item known to be absent, growing first if needed. Returns
    /// the index it was placed at.
    fn insert_unique(&mut self, hash: u64, item: V) -> usize {
        self.grow_for_insert();
        let index = self.insertion_point(hash);
        self.place(index, hash, item);
        index
    }

    /// Moves every item into `slots`, re-placing each against the new
    /// capacity.
    fn rehash_into(&mut self, slots: Box<[Slot<V>]>) {
        let old_slots = core::mem::replace(&mut self.slots, slots);
        log::debug!(
            "rehashing {} items: {} -> {} slots",
            self.populated,
            old_slots.len(),
            self.slots.len()
        );

        let expected = self.populated;
        self.populated = 0;
        // Only occupied slots carry an item. Empty slots are never re-placed,
        // so growth cannot conjure an entry out of a placeholder.
        for slot in old_slots.into_vec() {
            if let Some(item) = slot.item {
                let index = self.insertion_point(slot.hash);
                self.place(index, slot.hash, item);
            }
        }

        debug_assert_eq!(self.populated, expected);
    }

    /// Takes the item at `index` out of the table and closes the gap.
    ///
    /// Successors that sit past their home index move back one slot each
    /// until the next slot is empty or holds an item already at home. Items
    /// at home never move: every item after them has a home at or past that
    /// point and stays reachable.
    fn remove_at(&mut self, mut index: usize) -> V {
        let capacity = self.slots.len();
        let item = match self.slots[index].take() {
            Some(item) => item,
            None => unreachable!("removing from an empty slot"),
        };

        loop {
            let next = next_index(index, capacity);
            let successor = &self.slots[next];
            if successor.is_empty() || successor.home == next {
                break;
            }

            // The hole travels forward as the successor moves back.
            self.slots.swap(index, next);
            index = next;
        }

        self.populated -= 1;
        item
    }

    /// Computes a histogram of item displacements for the current layout.
    ///
    /// Requires the `stats` feature outside of tests.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let capacity = self.slots.len();
        let mut counts = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.is_empty() {
                continue;
            }

            let distance = displacement(slot.home, index, capacity);
            if counts.len() <= distance {
                counts.resize(distance + 1, 0);
            }
            counts[distance] += 1;
        }

        ProbeHistogram { counts }
    }

    /// Returns occupancy and displacement statistics for debugging.
    ///
    /// Requires the `stats` feature outside of tests.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let capacity = self.slots.len();
        let histogram = self.probe_histogram();
        let total_displacement: usize = histogram
            .counts()
            .iter()
            .enumerate()
            .map(|(distance, count)| distance * count)
            .sum();
        let slot_size = core::mem::size_of::<Slot<V>>();

        DebugStats {
            populated: self.populated,
            capacity,
            max_populated: capacity / 2,
            load_factor: self.populated as f64 / capacity as f64,
            max_displacement: histogram.max_displacement(),
            mean_displacement: if self.populated == 0 {
                0.0
            } else {
                total_displacement as f64 / self.populated as f64
            },
            total_bytes: capacity * slot_size,
            wasted_bytes: (capacity - self.populated) * slot_size,
        }
    }

    /// Checks every structural invariant of the table, panicking on the first
    /// violation.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let capacity = self.slots.len();
        let mut occupied = 0;

        for (index, slot) in self.slots.iter().enumerate() {
            if slot.is_empty() {
                assert!(slot.item.is_none(), "empty slot {index} holds an item");
                continue;
            }
            occupied += 1;

            assert!(slot.item.is_some(), "occupied slot {index} holds no item");
            assert!(slot.home < capacity, "slot {index} home out of range");
            assert_eq!(
                slot.home,
                home_index(slot.hash, capacity),
                "slot {index} home does not match its hash"
            );

            let mut walk = slot.home;
            while walk != index {
                assert!(
                    !self.slots[walk].is_empty(),
                    "gap at {walk} between slot {index} and its home {}",
                    slot.home
                );
                walk = next_index(walk, capacity);
            }

            if slot.home != index {
                let prev_index = (index + capacity - 1) % capacity;
                let prev = &self.slots[prev_index];
                assert!(
                    displacement(slot.home, index, capacity)
                        <= displacement(prev.home, prev_index, capacity) + 1,
                    "slot {index} (home {}) sorts before its predecessor (home {})",
                    slot.home,
                    prev.home
                );
            }
        }

        assert_eq!(occupied, self.populated, "populated count drifted");
        assert!(
            self.populated <= capacity / 2,
            "load ceiling exceeded: {} of {capacity}",
            self.populated
        );
    }
}

/// A view into a single entry in the hash table, which may be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V> {
    /// A vacant entry - no matching item is present in the table
    Vacant(VacantEntry<'a, V>),
    /// An occupied entry - a matching item is present in the table
    Occupied(OccupiedEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the item.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant and returns a
    /// mutable reference to the item. The closure is not called for an
    /// occupied entry.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to an occupied entry's item and returns it. Returns `None`
    /// without inserting anything if the entry is vacant.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ordered_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// let result = table.entry(42, |&n: &u64| n == 42).and_modify(|v| *v += 1);
    /// assert_eq!(result, None);
    ///
    /// table.entry(42, |&n: &u64| n == 42).or_insert(42);
    /// let result = table.entry(42, |&n: &u64| n == 42).and_modify(|v| *v += 1);
    /// assert_eq!(result, Some(&mut 43));
    /// ```
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let item = entry.into_mut();
                f(item);
                Some(item)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the item.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the hash table.
///
/// Created by [`HashTable::entry`] when no matching item is present.
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    hash: u64,
    index: usize,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Inserts `item` and returns a mutable reference to it.
    ///
    /// If the insertion would leave more than half of the slots occupied the
    /// table doubles first, so the returned reference always points into the
    /// final slot array.
    pub fn insert(self, item: V) -> &'a mut V {
        let table = self.table;
        let index = if table.grow_for_insert() {
            table.insertion_point(self.hash)
        } else {
            self.index
        };

        table.place(index, self.hash, item);
        table.slots[index].item_mut()
    }
}

/// A view into an occupied entry in the hash table.
///
/// Created by [`HashTable::entry`] when a matching item is present.
pub struct OccupiedEntry<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the item in the entry.
    pub fn get(&self) -> &V {
        self.table.slots[self.index].item()
    }

    /// Gets a mutable reference to the item in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        self.table.slots[self.index].item_mut()
    }

    /// Converts the entry into a mutable reference tied to the table's
    /// lifetime.
    pub fn into_mut(self) -> &'a mut V {
        let table = self.table;
        table.slots[self.index].item_mut()
    }

    /// Removes the item from the table and returns it.
    pub fn remove(self) -> V {
        self.table.remove_at(self.index)
    }
}

/// An iterator over the items in a [`HashTable`].
///
/// Created by [`HashTable::iter`].
pub struct Iter<'a, V> {
    slots: core::slice::Iter<'a, Slot<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let item = self.slots.find_map(|slot| slot.item.as_ref())?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> FusedIterator for Iter<'_, V> {}

/// A mutable iterator over the items in a [`HashTable`].
///
/// Created by [`HashTable::iter_mut`].
pub struct IterMut<'a, V> {
    slots: core::slice::IterMut<'a, Slot<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let item = self.slots.find_map(|slot| slot.item.as_mut())?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}

impl<V> FusedIterator for IterMut<'_, V> {}

/// A draining iterator over the items in a [`HashTable`].
///
/// Created by [`HashTable::drain`].
pub struct Drain<'a, V> {
    slots: alloc::vec::IntoIter<Slot<V>>,
    remaining: usize,
    marker: PhantomData<&'a mut HashTable<V>>,
}

impl<V> Iterator for Drain<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let item = self.slots.find_map(|slot| slot.item)?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Drain<'_, V> {}

impl<V> FusedIterator for Drain<'_, V> {}

/// An owning iterator over the items of a [`HashTable`].
pub struct IntoIter<V> {
    slots: alloc::vec::IntoIter<Slot<V>>,
    remaining: usize,
}

impl<V> Iterator for IntoIter<V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let item = self.slots.find_map(|slot| slot.item)?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IntoIter<V> {}

impl<V> FusedIterator for IntoIter<V> {}

impl<V> IntoIterator for HashTable<V> {
    type Item = V;
    type IntoIter = IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            slots: self.slots.into_vec().into_iter(),
            remaining: self.populated,
        }
    }
}

impl<'a, V> IntoIterator for &'a HashTable<V> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, V> IntoIterator for &'a mut HashTable<V> {
    type Item = &'a mut V;
    type IntoIter = IterMut<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
