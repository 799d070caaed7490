#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// A HashMap built on the ordered hash table.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers.
pub mod hash_map;

pub mod hash_table;

#[cfg(test)]
mod hash_table_proptest;

pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_table::HashTable;
pub use hash_table::TryReserveError;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used by [`HashMap::new`] and friends.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used by [`HashMap::new`] and friends.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder used when no default hasher is available.
        ///
        /// It cannot be constructed, so maps must be created with
        /// [`HashMap::with_hasher`] or [`HashMap::with_capacity_and_hasher`].
        pub enum DefaultHashBuilder {}
    }
}
