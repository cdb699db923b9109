//! Keyed aggregation that reports each key at most once per time.
//!
//! `BlockingAggregate` updates its per-key values exactly as [`StreamingAggregate`] does, but it
//! defers output. Keys whose values changed at a time are remembered along with the value they
//! reached at that time, and a notification for the time is requested when the first such key
//! appears. Once the time is complete, each remembered key is reported once.
//!
//! Values persist across times: a record at a later time is combined with the value left behind
//! by earlier times, and is only reported if it changes that value. A report for a time carries
//! the value as of the last change at that time, even if records at later times have since
//! lowered it.

use std::collections::BTreeMap;
use std::hash::Hash;

use fnv::FnvHashMap;
use timely::dataflow::{Scope, Stream};
use timely::dataflow::channels::pact::Exchange;
use timely::dataflow::operators::Operator;

use crate::Data;
use crate::hashable::Hashable;
use crate::logging::{self, ReleaseEvent};
use super::StreamingAggregate;

/// Maintains a running aggregate for each key, and reports changed keys when times close.
pub struct BlockingAggregate<K, V, F, T> {
    values: StreamingAggregate<K, V, F>,
    active: BTreeMap<T, FnvHashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq, F: Fn(&V, &V)->V, T: Ord + Clone> BlockingAggregate<K, V, F, T> {
    /// Allocates an empty aggregate, combining values with `aggregate(old, new)`.
    pub fn new(aggregate: F) -> Self {
        BlockingAggregate {
            values: StreamingAggregate::new(aggregate),
            active: BTreeMap::new(),
        }
    }

    /// Folds `val` into the value for `key`, noting the change if there is one.
    ///
    /// Returns `true` if this is the first change at `time`, which is when the caller should
    /// request a notification for `time`.
    pub fn push(&mut self, time: &T, key: K, val: V) -> bool {
        match self.values.update(key, val) {
            Some((key, val)) => {
                let first = !self.active.contains_key(time);
                self.active.entry(time.clone()).or_default().insert(key, val);
                first
            }
            None => false,
        }
    }

    /// Removes and returns every key that changed at `time`, with its value at that time.
    pub fn release(&mut self, time: &T) -> Vec<(K, V)> {
        self.active
            .remove(time)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default()
    }

    /// The current aggregate for `key`, whether or not it has been reported.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    /// Number of keys awaiting release at `time`.
    pub fn active(&self, time: &T) -> usize {
        self.active.get(time).map(|keys| keys.len()).unwrap_or(0)
    }
}

/// Extension trait for the `aggregate_blocking` method.
pub trait AggregateBlocking<G: Scope, K: Data, V: Data> {
    /// Maintains `aggregate` over the values of each key, and once a time is complete produces
    /// one `(key, val)` for each key whose value changed at that time.
    fn aggregate_blocking<F: Fn(&V, &V)->V+'static>(&self, aggregate: F) -> Stream<G, (K, V)>;
}

impl<G: Scope, K: Data, V: Data> AggregateBlocking<G, K, V> for Stream<G, (K, V)> {
    fn aggregate_blocking<F: Fn(&V, &V)->V+'static>(&self, aggregate: F) -> Stream<G, (K, V)> {

        let worker = self.scope().index();
        let exchange = Exchange::new(|(key, _): &(K, V)| key.hashed());
        let mut state = BlockingAggregate::new(aggregate);

        self.unary_notify(exchange, "BlockingAggregate", vec![], move |input, output, notificator| {

            input.for_each(|time, data| {
                let mut first = false;
                for (key, val) in data.drain(..) {
                    first |= state.push(time.time(), key, val);
                }
                if first {
                    notificator.notify_at(time.retain());
                }
            });

            notificator.for_each(|time, _count, _notificator| {
                let released = state.release(time.time());
                logging::log(ReleaseEvent { worker, time: format!("{:?}", time.time()), records: released.len() });
                output.session(&time).give_iterator(released.into_iter());
            });
        })
    }
}
