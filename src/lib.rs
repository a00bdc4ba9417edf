#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod ordered_map;
pub mod ordered_set;
pub mod raw;
pub mod store;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        pub mod serialize;

        pub use serialize::Decode;
        pub use serialize::Encode;
    }
}

pub use error::Error;
pub use ordered_map::Entry;
pub use ordered_map::OrderedMap;
pub use ordered_set::OrderedSet;
pub use raw::OrderedHash;
pub use raw::Position;
pub use store::ContiguousStore;
pub use store::OrderedStore;
pub use store::SegmentedStore;

/// Hasher builder used by [`OrderedMap`] and [`OrderedSet`] unless another
/// one is supplied.
///
/// Without the `std` feature the builder falls back to fixed seeds, which
/// drops the protection against hash-flooding attacks; supply a seeded
/// [`ahash::RandomState`] (or any other `BuildHasher`) when that matters.
pub type DefaultHashBuilder = ahash::RandomState;
