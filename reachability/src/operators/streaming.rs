//! Incremental keyed aggregation, reporting every change as it happens.
//!
//! `StreamingAggregate` maintains one value per key, and folds each arriving `(key, val)` record
//! into it using a supplied `aggregate` function. Whenever the value for a key is created or
//! changes, the new value is reported at the time of the record that caused the change. Records
//! that leave the value unchanged produce nothing.
//!
//! The [`AggregateStreaming`] trait wraps this state in a timely operator that routes records by
//! key, so that each worker holds the values for the keys it owns.
//!
//! # Examples
//!
//! ```
//! use reachability::operators::{least, StreamingAggregate};
//!
//! let mut minimum = StreamingAggregate::new(least);
//!
//! let changes = vec![("a", 5), ("a", 7), ("b", 2), ("a", 3)]
//!     .into_iter()
//!     .filter_map(|(key, val)| minimum.update(key, val))
//!     .collect::<Vec<_>>();
//!
//! assert_eq!(changes, vec![("a", 5), ("b", 2), ("a", 3)]);
//! ```

use std::collections::hash_map::Entry;
use std::hash::Hash;

use fnv::FnvHashMap;
use timely::dataflow::{Scope, Stream};
use timely::dataflow::channels::pact::Exchange;
use timely::dataflow::operators::Operator;

use crate::Data;
use crate::hashable::Hashable;

/// Maintains a running aggregate for each key, and reports changes.
pub struct StreamingAggregate<K, V, F> {
    table: FnvHashMap<K, V>,
    aggregate: F,
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq, F: Fn(&V, &V)->V> StreamingAggregate<K, V, F> {
    /// Allocates an empty aggregate, combining values with `aggregate(old, new)`.
    pub fn new(aggregate: F) -> Self {
        StreamingAggregate {
            table: FnvHashMap::default(),
            aggregate,
        }
    }

    /// Folds `val` into the aggregate for `key`.
    ///
    /// Returns the key and its new aggregate if the aggregate was created or changed. The table
    /// is updated before the change is returned.
    pub fn update(&mut self, key: K, val: V) -> Option<(K, V)> {
        match self.table.entry(key) {
            Entry::Vacant(entry) => {
                let key = entry.key().clone();
                entry.insert(val.clone());
                Some((key, val))
            }
            Entry::Occupied(mut entry) => {
                let combined = (self.aggregate)(entry.get(), &val);
                if &combined != entry.get() {
                    entry.insert(combined.clone());
                    Some((entry.key().clone(), combined))
                }
                else { None }
            }
        }
    }

    /// The current aggregate for `key`, if any record for it has been seen.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.table.get(key)
    }

    /// Iterates over all keys and their current aggregates, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item=(&K, &V)> {
        self.table.iter()
    }

    /// Number of keys with an aggregate.
    pub fn len(&self) -> usize { self.table.len() }

    /// Returns `true` if no record has been seen.
    pub fn is_empty(&self) -> bool { self.table.is_empty() }
}

/// Extension trait for the `aggregate_streaming` method.
pub trait AggregateStreaming<G: Scope, K: Data, V: Data> {
    /// Maintains `aggregate` over the values of each key, and produces `(key, val)` at the time
    /// of each record that creates or changes the value for `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use timely::dataflow::operators::{Capture, ToStream};
    /// use timely::dataflow::operators::capture::Extract;
    /// use reachability::operators::{least, AggregateStreaming};
    ///
    /// let captured = timely::example(|scope| {
    ///     vec![(1u32, 5u32), (1, 7), (2, 2), (1, 3)]
    ///         .to_stream(scope)
    ///         .aggregate_streaming(least)
    ///         .capture()
    /// });
    ///
    /// let changes = captured.extract().into_iter().flat_map(|(_, data)| data).collect::<Vec<_>>();
    /// assert_eq!(changes, vec![(1, 3), (1, 5), (2, 2)]);
    /// ```
    fn aggregate_streaming<F: Fn(&V, &V)->V+'static>(&self, aggregate: F) -> Stream<G, (K, V)>;
}

impl<G: Scope, K: Data, V: Data> AggregateStreaming<G, K, V> for Stream<G, (K, V)> {
    fn aggregate_streaming<F: Fn(&V, &V)->V+'static>(&self, aggregate: F) -> Stream<G, (K, V)> {

        let exchange = Exchange::new(|(key, _): &(K, V)| key.hashed());

        self.unary(exchange, "StreamingAggregate", move |_capability, _info| {

            let mut state = StreamingAggregate::new(aggregate);

            move |input, output| {
                input.for_each(|time, data| {
                    let mut session = output.session(&time);
                    for (key, val) in data.drain(..) {
                        if let Some(change) = state.update(key, val) {
                            session.give(change);
                        }
                    }
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {

    use std::collections::HashMap;

    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;
    use timely::dataflow::Stream;
    use timely::dataflow::operators::{Capture, Input};
    use timely::dataflow::operators::capture::Extract;

    use crate::operators::least;
    use super::{AggregateStreaming, StreamingAggregate};

    #[test]
    fn reports_new_keys_and_changes() {
        let mut sum = StreamingAggregate::new(|old: &u64, new: &u64| old + new);
        assert_eq!(sum.update("a", 1), Some(("a", 1)));
        assert_eq!(sum.update("a", 2), Some(("a", 3)));
        assert_eq!(sum.update("a", 0), None);
        assert_eq!(sum.update("b", 0), Some(("b", 0)));
        assert_eq!(sum.get(&"a"), Some(&3));
        assert_eq!(sum.len(), 2);
    }

    #[test]
    fn suppresses_repeated_values() {
        let mut minimum = StreamingAggregate::new(least);
        let changes = vec![(1u32, 4u32), (1, 4), (1, 6), (1, 4)]
            .into_iter()
            .filter_map(|(key, val)| minimum.update(key, val))
            .collect::<Vec<_>>();
        assert_eq!(changes, vec![(1, 4)]);
        assert_eq!(minimum.update(1, 4), None);
    }

    #[test]
    fn minimum_changes_are_decreasing() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut minimum = StreamingAggregate::new(least);
        let mut latest = HashMap::new();
        for _ in 0 .. 1000 {
            if let Some((key, val)) = minimum.update(rng.gen_range(0 .. 10u32), rng.gen_range(0 .. 1000u32)) {
                if let Some(prev) = latest.insert(key, val) {
                    assert!(val < prev, "key {} changed from {} to {}", key, prev, val);
                }
            }
        }
        for (key, val) in minimum.iter() {
            assert_eq!(latest.get(key), Some(val));
        }
    }

    #[test]
    fn changes_keep_their_input_time() {
        let captured = timely::execute_directly(|worker| {
            let (mut input, captured) = worker.dataflow::<u64, _, _>(|scope| {
                let (input, stream): (_, Stream<_, (u32, u32)>) = scope.new_input();
                (input, stream.aggregate_streaming(least).capture())
            });
            input.send((7, 9));
            input.advance_to(3);
            input.send((7, 2));
            input.send((8, 8));
            input.send((7, 5));
            captured
        });

        assert_eq!(captured.extract(), vec![(0, vec![(7, 9)]), (3, vec![(7, 2), (8, 8)])]);
    }
}
