//! Incremental, partitioned least-label propagation.
//!
//! This crate provides a small set of keyed dataflow operators, and a driver that composes them
//! into an iterative computation of least reachable labels (connected components, when the edges
//! are symmetric). The operators are timely dataflow operators: each routes its input by key to
//! the worker that owns the key, keeps its state local to that worker, and relies on timely's
//! progress tracking to learn when a logical time is complete.
//!
//! The operators are:
//!
//! * [`AggregateStreaming`](operators::AggregateStreaming): maintains a running aggregate per key,
//!   and reports each change at the time it happens.
//! * [`AggregateBlocking`](operators::AggregateBlocking): maintains the same aggregate, but holds
//!   back reports until the time closes, producing at most one record per key per time.
//! * [`JoinGraph`](operators::JoinGraph): joins a stream of `(vertex, label)` claims against an
//!   edge list, holding back claims until the edges for the time have all arrived.
//!
//! The [`algorithms::reachability`] module composes these into a bounded fixpoint loop.
//!
//! # Examples
//!
//! ```
//! use reachability::Config;
//! use reachability::algorithms::reachability::connected_components;
//!
//! let labels = connected_components(&Config::default(), vec![(0u32, 1), (2, 3)]).unwrap();
//!
//! assert!(labels.converged);
//! assert_eq!(labels.get(&1), Some(&0));
//! assert_eq!(labels.get(&3), Some(&2));
//! ```

#![forbid(missing_docs)]

use std::fmt::Debug;
use std::hash::Hash;

pub use config::Config;
pub use error::{Error, Result};
pub use hashable::Hashable;

/// Data type usable as keys and values in the operators.
///
/// Records are hashed to route them to their owning worker, exchanged between worker threads, and
/// compared to decide whether an aggregate has changed.
pub trait Data : timely::ExchangeData + Ord + Hash + Debug + Send + Sync { }
impl<T: timely::ExchangeData + Ord + Hash + Debug + Send + Sync> Data for T { }

/// The outer logical time: one batch of input to the whole computation.
pub type Epoch = u64;

/// The nested logical time used inside an iterative scope: an epoch and a round counter.
pub type Iteration = timely::order::Product<Epoch, u32>;

pub mod algorithms;
pub mod config;
pub mod error;
pub mod hashable;
pub mod logging;
pub mod operators;
