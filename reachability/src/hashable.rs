//! Traits and types related to the hashing of data.
//!
//! Records are assigned to partitions by hashing a key. The hash must agree across all workers, so
//! that every record with the same key lands on the same partition, and must not depend on process
//! state; we use `fnv`, whose output is fixed.

use std::hash::Hasher;

/// Types with a `hashed` method, producing a stable hash value.
pub trait Hashable {
    /// A hash of the associated value.
    fn hashed(&self) -> u64;
}

impl<T: ::std::hash::Hash> Hashable for T {
    #[inline]
    fn hashed(&self) -> u64 {
        let mut h: ::fnv::FnvHasher = Default::default();
        self.hash(&mut h);
        h.finish()
    }
}
