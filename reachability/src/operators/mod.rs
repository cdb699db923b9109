//! Keyed timely operators over worker-local state.
//!
//! Each operator routes its input by key, so that the worker owning a key holds all of that key's
//! state. The state itself is a plain struct, usable outside a dataflow; the extension traits
//! wrap it in an operator.

pub mod blocking;
pub mod join;
pub mod streaming;

pub use self::blocking::{AggregateBlocking, BlockingAggregate};
pub use self::join::{GraphJoin, JoinGraph, JoinState};
pub use self::streaming::{AggregateStreaming, StreamingAggregate};

/// Combines two values by keeping the lesser.
///
/// When `new` is not strictly less than `old`, `old` is returned, so that equal values are
/// treated as no change.
#[inline]
pub fn least<V: Ord + Clone>(old: &V, new: &V) -> V {
    if new < old { new.clone() } else { old.clone() }
}
