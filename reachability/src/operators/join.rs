//! Joins a stream of vertex labels against a graph's edge list.
//!
//! `GraphJoin` receives edges `(src, dst)` on one input and labels `(vertex, label)` on the other,
//! and for each label produces `(dst, label)` for every edge leaving `vertex`. Labels cannot be
//! matched until the edge list is complete, so the join starts out `Building`: it collects edges
//! into an adjacency table and queues labels, each batch with a hold on the time it arrived at.
//! The first notification switches the join to `Streaming`: queued labels are matched at their
//! own times, and from then on labels are matched as soon as they arrive.
//!
//! Edges must be at times no later than the labels they are joined with. A notification at any
//! time then implies that every edge has been received. A label for a vertex without outgoing
//! edges produces no output.

use fnv::FnvHashMap;
use smallvec::SmallVec;
use timely::dataflow::{Scope, Stream};
use timely::dataflow::channels::pact::Exchange;
use timely::dataflow::operators::Operator;

use crate::Data;
use crate::hashable::Hashable;
use crate::logging::{self, TransitionEvent};

/// Lifecycle of a [`GraphJoin`].
#[derive(Debug)]
pub enum JoinState<C, V> {
    /// Edges may still arrive; label batches are queued, with a hold on their times, in arrival order.
    Building {
        /// Labels received before the edges were complete.
        pending: Vec<(C, Vec<(V, V)>)>,
    },
    /// The edge list is complete; labels are matched on arrival.
    Streaming,
}

/// Joins labels against an edge list, buffering labels until the edges are complete.
///
/// The type `C` is whatever the caller uses to hold on to the time of a queued batch; a timely
/// operator uses a `Capability`.
pub struct GraphJoin<V, C> {
    adjacency: FnvHashMap<V, SmallVec<[V; 4]>>,
    state: JoinState<C, V>,
}

impl<V: Data, C> Default for GraphJoin<V, C> {
    fn default() -> Self {
        GraphJoin {
            adjacency: FnvHashMap::default(),
            state: JoinState::Building { pending: Vec::new() },
        }
    }
}

impl<V: Data, C> GraphJoin<V, C> {
    /// Allocates a join with no edges, in the `Building` state.
    pub fn new() -> Self { Self::default() }

    /// Adds `edges` to the adjacency table.
    ///
    /// Edges added once the join is streaming only affect labels that arrive afterwards.
    pub fn push_edges<I: IntoIterator<Item=(V, V)>>(&mut self, edges: I) {
        for (src, dst) in edges {
            self.adjacency.entry(src).or_default().push(dst);
        }
    }

    /// Queues `labels` until the edges are complete.
    ///
    /// Returns the batch unchanged if the join is already streaming, in which case the caller
    /// should match it with [`GraphJoin::propose`].
    pub fn defer(&mut self, hold: C, labels: Vec<(V, V)>) -> Option<(C, Vec<(V, V)>)> {
        match &mut self.state {
            JoinState::Building { pending } => {
                pending.push((hold, labels));
                None
            }
            JoinState::Streaming => Some((hold, labels)),
        }
    }

    /// Switches the join to `Streaming`, returning the queued batches in arrival order.
    ///
    /// Returns nothing if the join was already streaming.
    pub fn transition(&mut self) -> Vec<(C, Vec<(V, V)>)> {
        match std::mem::replace(&mut self.state, JoinState::Streaming) {
            JoinState::Building { pending } => pending,
            JoinState::Streaming => Vec::new(),
        }
    }

    /// Produces `(dst, label)` for each destination of `vertex`.
    pub fn propose<'a>(&'a self, vertex: &V, label: V) -> impl Iterator<Item=(V, V)> + 'a {
        self.adjacency
            .get(vertex)
            .into_iter()
            .flat_map(move |destinations| { let label = label.clone(); destinations.iter().map(move |dst| (dst.clone(), label.clone())) })
    }

    /// Returns `true` once the edges have been declared complete.
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, JoinState::Streaming)
    }

    /// Number of labels waiting for the edges to complete.
    pub fn pending(&self) -> usize {
        match &self.state {
            JoinState::Building { pending } => pending.iter().map(|(_, labels)| labels.len()).sum(),
            JoinState::Streaming => 0,
        }
    }

    /// Number of distinct source vertices in the adjacency table.
    pub fn sources(&self) -> usize {
        self.adjacency.len()
    }

    /// Iterates over the distinct source vertices, in arbitrary order.
    pub fn source_vertices(&self) -> impl Iterator<Item=&V> {
        self.adjacency.keys()
    }
}

/// Extension trait for the `join_graph` method.
pub trait JoinGraph<G: Scope, V: Data> {
    /// Joins `labels` against the edges in `self`, producing `(dst, label)` for each edge
    /// `(src, dst)` and label `(src, label)`, at the time of the label.
    ///
    /// Edges must be at times no later than the labels.
    fn join_graph(&self, labels: &Stream<G, (V, V)>) -> Stream<G, (V, V)>;
}

impl<G: Scope, V: Data> JoinGraph<G, V> for Stream<G, (V, V)> {
    fn join_graph(&self, labels: &Stream<G, (V, V)>) -> Stream<G, (V, V)> {

        let worker = self.scope().index();
        let exchange1 = Exchange::new(|(src, _): &(V, V)| src.hashed());
        let exchange2 = Exchange::new(|(vertex, _): &(V, V)| vertex.hashed());
        let mut join = GraphJoin::new();

        self.binary_notify(labels, exchange1, exchange2, "GraphJoin", vec![], move |input1, input2, output, notificator| {

            input1.for_each(|time, data| {
                join.push_edges(data.drain(..));
                notificator.notify_at(time.retain());
            });

            input2.for_each(|time, data| {
                if join.is_streaming() {
                    let mut session = output.session(&time);
                    for (vertex, label) in data.drain(..) {
                        session.give_iterator(join.propose(&vertex, label));
                    }
                }
                else {
                    // A worker without edges still needs a notification to release its labels.
                    let hold = time.retain();
                    notificator.notify_at(hold.clone());
                    join.defer(hold, std::mem::take(data));
                }
            });

            notificator.for_each(|_time, _count, _notificator| {
                if !join.is_streaming() {
                    let pending = join.transition();
                    logging::log(TransitionEvent {
                        worker,
                        sources: join.sources(),
                        pending: pending.iter().map(|(_, labels)| labels.len()).sum(),
                    });
                    for (hold, labels) in pending {
                        let mut session = output.session(&hold);
                        for (vertex, label) in labels {
                            session.give_iterator(join.propose(&vertex, label));
                        }
                    }
                }
            });
        })
    }
}

#[cfg(test)]
mod tests {

    use itertools::Itertools;
    use timely::dataflow::Stream;
    use timely::dataflow::operators::{Capture, Input};
    use timely::dataflow::operators::capture::Extract;

    use super::{GraphJoin, JoinGraph};

    #[test]
    fn fans_out_to_every_destination() {
        let mut join = GraphJoin::<u32, u64>::new();
        join.push_edges(vec![(1, 10), (1, 11), (1, 12), (2, 20)]);

        let proposals = join.propose(&1, 7).sorted().collect::<Vec<_>>();
        assert_eq!(proposals, vec![(10, 7), (11, 7), (12, 7)]);
        assert_eq!(join.sources(), 2);
    }

    #[test]
    fn missing_vertices_produce_nothing() {
        let mut join = GraphJoin::<u32, u64>::new();
        join.push_edges(vec![(1, 2)]);
        assert_eq!(join.propose(&3, 3).count(), 0);
        assert_eq!(join.propose(&2, 2).count(), 0);
    }

    #[test]
    fn queued_labels_are_released_once() {
        let mut join = GraphJoin::<u32, u64>::new();

        // Labels interleaved with edges, all before the edges are declared complete.
        assert!(join.defer(0, vec![(1, 1)]).is_none());
        join.push_edges(vec![(1, 2), (2, 1)]);
        assert!(join.defer(0, vec![(2, 2), (3, 3)]).is_none());
        join.push_edges(vec![(2, 3), (3, 2)]);
        assert!(join.defer(4, vec![(3, 0)]).is_none());
        assert_eq!(join.pending(), 4);
        assert!(!join.is_streaming());

        let pending = join.transition();
        assert!(join.is_streaming());
        assert_eq!(join.pending(), 0);
        assert_eq!(pending.iter().map(|(time, _)| *time).collect::<Vec<_>>(), vec![0, 0, 4]);

        let mut records = Vec::new();
        for (time, labels) in pending {
            for (vertex, label) in labels {
                records.extend(join.propose(&vertex, label).map(|record| (time, record)));
            }
        }
        records.sort();
        assert_eq!(records, vec![(0, (1, 2)), (0, (2, 1)), (0, (2, 3)), (0, (3, 2)), (4, (2, 0))]);

        // Nothing is released twice, and later batches are handed back for matching.
        assert!(join.transition().is_empty());
        assert_eq!(join.defer(5, vec![(1, 9)]), Some((5, vec![(1, 9)])));
    }

    #[test]
    fn labels_are_joined_at_their_own_time() {
        let captured = timely::execute_directly(|worker| {
            let (mut edges, mut labels, captured) = worker.dataflow::<u64, _, _>(|scope| {
                let (edges, edge_stream): (_, Stream<_, (u32, u32)>) = scope.new_input();
                let (labels, label_stream): (_, Stream<_, (u32, u32)>) = scope.new_input();
                (edges, labels, edge_stream.join_graph(&label_stream).capture())
            });

            // Labels that arrive before the edges are complete are held back, not lost.
            labels.send((1, 1));
            edges.send((1, 2));
            edges.send((1, 3));
            edges.send((2, 3));
            edges.advance_to(1);
            labels.advance_to(2);
            labels.send((2, 0));
            labels.send((4, 4));
            captured
        });

        let records = captured
            .extract()
            .into_iter()
            .flat_map(|(time, data)| data.into_iter().map(move |record| (time, record)))
            .sorted()
            .collect::<Vec<_>>();
        assert_eq!(records, vec![(0, (2, 1)), (0, (3, 1)), (2, (3, 0))]);
    }

    #[test]
    fn labels_without_edges_are_released() {
        let captured = timely::execute_directly(|worker| {
            let (mut labels, captured) = worker.dataflow::<u64, _, _>(|scope| {
                let (_edges, edge_stream): (_, Stream<_, (u32, u32)>) = scope.new_input();
                let (labels, label_stream): (_, Stream<_, (u32, u32)>) = scope.new_input();
                (labels, edge_stream.join_graph(&label_stream).capture())
            });
            labels.send((1, 1));
            captured
        });

        assert!(captured.extract().is_empty());
    }
}
