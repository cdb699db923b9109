//! Least-label reachability, and connected components.
//!
//! Every source vertex starts out labelled with itself. Each round, the labels are joined with the
//! edges to propose labels for destination vertices, and each vertex keeps the least label it has
//! been offered; labels that changed are fed back into the next round. The loop ends when no
//! label changes, or when the configured number of rounds has been run. All changes that leave
//! the loop, including each source's own label, pass through a blocking aggregate, so that each
//! vertex is reported once per epoch.
//!
//! Each epoch is computed by its own timely dataflow, on `Config::workers` worker threads. The
//! edges are dealt out to the workers round-robin, and the operators route them on from there.
//!
//! With symmetric edges the least label of a vertex is the least vertex in its component, which is
//! what [`connected_components`] computes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::Arc;

use timely::dataflow::{Scope, Stream};
use timely::dataflow::channels::pact::Pipeline;
use timely::dataflow::operators::{Concat, ConnectLoop, Enter, Feedback, Input, Inspect, Leave, Map, Operator};
use timely::order::Product;

use crate::{Config, Data, Epoch, Error, Iteration, Result};
use crate::logging::{self, EpochEvent, RoundEvent};
use crate::operators::{least, AggregateBlocking, AggregateStreaming, JoinGraph};

/// Final labels for one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels<V: Ord> {
    /// The epoch the labels were computed for.
    pub epoch: Epoch,
    /// The least label reached for each labelled vertex.
    pub labels: BTreeMap<V, V>,
    /// Number of rounds of the fixpoint loop that were run.
    pub iterations: u32,
    /// Whether the loop reached its fixpoint before the round bound.
    pub converged: bool,
}

impl<V: Data> Labels<V> {
    /// The label of `vertex`, if it received one.
    pub fn get(&self, vertex: &V) -> Option<&V> {
        self.labels.get(vertex)
    }

    /// Number of labelled vertices.
    pub fn len(&self) -> usize { self.labels.len() }

    /// Returns `true` if no vertex was labelled.
    pub fn is_empty(&self) -> bool { self.labels.is_empty() }

    /// Number of distinct labels, which is the number of components for symmetric edges.
    pub fn components(&self) -> usize {
        self.labels.values().collect::<BTreeSet<_>>().len()
    }

    /// Returns the labels if the fixpoint was reached, and an error otherwise.
    pub fn into_converged(self) -> Result<Self> {
        if self.converged { Ok(self) }
        else { Err(Error::DidNotConverge { epoch: self.epoch, iterations: self.iterations }) }
    }
}

/// Computes least labels for a sequence of epochs.
///
/// Each call to [`run`](Reachability::run) computes one epoch from its own edges, with freshly
/// allocated operator state, and advances the epoch.
pub struct Reachability<V> {
    config: Config,
    epoch: Epoch,
    phantom: std::marker::PhantomData<V>,
}

impl<V: Data> Reachability<V> {
    /// Allocates a driver starting at epoch zero.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Reachability { config, epoch: 0, phantom: std::marker::PhantomData })
    }

    /// The epoch the next call to `run` will compute.
    pub fn epoch(&self) -> Epoch { self.epoch }

    /// Computes least labels for `edges`, as the next epoch.
    ///
    /// With `Config::strict` set, failing to converge is reported as an error.
    pub fn run<I: IntoIterator<Item=(V, V)>>(&mut self, edges: I) -> Result<Labels<V>> {
        let epoch = self.epoch;
        self.epoch += 1;
        let labels = compute(&self.config, epoch, edges.into_iter().collect())?;
        if self.config.strict { labels.into_converged() } else { Ok(labels) }
    }
}

/// Computes least labels reachable along the directed `edges`, as epoch zero.
///
/// Sources are labelled with themselves or a lesser label that reaches them, and destinations with
/// the least label that reaches them. Vertices that appear in no edge receive no label.
pub fn reachability<V: Data, I: IntoIterator<Item=(V, V)>>(config: &Config, edges: I) -> Result<Labels<V>> {
    Reachability::new(config.clone())?.run(edges)
}

/// Computes connected components of the undirected graph described by `edges`.
///
/// Each vertex is labelled with the least vertex in its component.
pub fn connected_components<V: Data, I: IntoIterator<Item=(V, V)>>(config: &Config, edges: I) -> Result<Labels<V>> {
    reachability(config, symmetrize(edges))
}

/// Produces each edge along with its reverse.
pub fn symmetrize<V: Clone + PartialEq, I: IntoIterator<Item=(V, V)>>(edges: I) -> Vec<(V, V)> {
    let mut result = Vec::new();
    for (src, dst) in edges {
        if src != dst {
            result.push((dst.clone(), src.clone()));
        }
        result.push((src, dst));
    }
    result
}

/// Rounds observed by one worker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Rounds {
    /// The last round in which some label changed.
    last_change: Option<u32>,
    /// Whether changes were produced that the round bound kept from being fed back.
    exhausted: bool,
}

impl Rounds {
    fn merge(&mut self, other: Rounds) {
        self.last_change = self.last_change.max(other.last_change);
        self.exhausted |= other.exhausted;
    }

    /// Number of rounds run under the bound `max_iterations`.
    ///
    /// A round that changed labels is followed by one more round that receives the changes; a
    /// run without changes still runs its first round.
    fn iterations(&self, max_iterations: u32) -> u32 {
        if self.exhausted { max_iterations }
        else { self.last_change.map(|round| round + 2).unwrap_or(1) }
    }
}

/// Runs one epoch to its fixpoint, or to the round bound.
fn compute<V: Data>(config: &Config, epoch: Epoch, edges: Vec<(V, V)>) -> Result<Labels<V>> {

    let edges = Arc::new(edges);
    let max_iterations = config.max_iterations;

    let guards = timely::execute(timely::Config::process(config.workers), move |worker| {

        let index = worker.index();
        let peers = worker.peers();
        let labels = Rc::new(RefCell::new(Vec::new()));
        let rounds = Rc::new(RefCell::new(Rounds::default()));

        let sink = labels.clone();
        let observed = rounds.clone();
        let mut input = worker.dataflow::<Epoch, _, _>(move |scope| {

            let (input, edges): (_, Stream<_, (V, V)>) = scope.new_input();

            // One seed per distinct source, at the worker that owns the source.
            let seeds = edges
                .map(|(src, _)| (src.clone(), src))
                .aggregate_streaming(least);

            let changes = scope.iterative::<u32, _, _>(|inner| {

                let (handle, cycle) = inner.feedback(Product::new(Default::default(), 1));
                let edges = edges.enter(inner);
                let seeds = seeds.enter(inner);

                // Sources enter the minimum too, so that they keep their own label.
                let proposals = edges.join_graph(&seeds.concat(&cycle));
                let changes = seeds.concat(&proposals).aggregate_streaming(least);

                bound_rounds(&changes, epoch, max_iterations, observed).connect_loop(handle);
                changes.leave()
            });

            changes
                .aggregate_blocking(least)
                .inspect_batch(move |_time, data| sink.borrow_mut().extend(data.iter().cloned()));

            input
        });

        input.advance_to(epoch);
        for edge in edges.iter().skip(index).step_by(peers) {
            input.send(edge.clone());
        }
        drop(input);
        while worker.step() { }

        let labels = std::mem::take(&mut *labels.borrow_mut());
        let rounds = *rounds.borrow();
        (labels, rounds)
    })
    .map_err(Error::Runtime)?;

    let mut labels = BTreeMap::new();
    let mut rounds = Rounds::default();
    for result in guards.join() {
        let (worker_labels, worker_rounds) = result.map_err(Error::Runtime)?;
        labels.extend(worker_labels);
        rounds.merge(worker_rounds);
    }

    let iterations = rounds.iterations(max_iterations);
    let converged = !rounds.exhausted;
    logging::log(EpochEvent { epoch, iterations, converged, labels: labels.len() });

    Ok(Labels { epoch, labels, iterations, converged })
}

/// Passes changes back into the loop, except those from the last round the bound allows.
///
/// Records the rounds it sees in `rounds`, and logs the number of changes in each round once the
/// round is complete.
fn bound_rounds<G, V>(changes: &Stream<G, (V, V)>, epoch: Epoch, max_iterations: u32, rounds: Rc<RefCell<Rounds>>) -> Stream<G, (V, V)>
where
    G: Scope<Timestamp=Iteration>,
    V: Data,
{
    let worker = changes.scope().index();
    let mut counts = BTreeMap::<u32, usize>::new();

    changes.unary_notify(Pipeline, "RoundBound", vec![], move |input, output, notificator| {

        input.for_each(|time, data| {
            let round = time.time().inner;
            let count = data.len();
            {
                let mut rounds = rounds.borrow_mut();
                rounds.last_change = rounds.last_change.max(Some(round));
                if round < max_iterations - 1 {
                    output.session(&time).give_iterator(data.drain(..));
                }
                else {
                    rounds.exhausted = true;
                    data.clear();
                }
            }
            let total = counts.entry(round).or_insert(0);
            if *total == 0 {
                notificator.notify_at(time.retain());
            }
            *total += count;
        });

        notificator.for_each(|time, _count, _notificator| {
            let iteration = time.time().inner;
            if let Some(changes) = counts.remove(&iteration) {
                logging::log(RoundEvent { worker, epoch, iteration, changes });
            }
        });
    })
}

#[cfg(test)]
mod tests {

    use crate::Config;
    use super::{connected_components, reachability, symmetrize, Reachability, Rounds};

    #[test]
    fn symmetrize_adds_reverse_edges() {
        let mut edges = symmetrize(vec![(0, 1), (2, 2)]);
        edges.sort();
        assert_eq!(edges, vec![(0, 1), (1, 0), (2, 2)]);
    }

    #[test]
    fn path_is_one_component() {
        let labels = connected_components(&Config::default(), vec![(0u32, 1), (1, 2)]).unwrap();
        assert!(labels.converged);
        assert_eq!(labels.labels.into_iter().collect::<Vec<_>>(), vec![(0, 0), (1, 0), (2, 0)]);
    }

    #[test]
    fn disjoint_edges_are_two_components() {
        let labels = connected_components(&Config::default(), vec![(0u32, 1), (2, 3)]).unwrap();
        assert_eq!(labels.labels.into_iter().collect::<Vec<_>>(), vec![(0, 0), (1, 0), (2, 2), (3, 2)]);
    }

    #[test]
    fn directed_edges_keep_source_labels() {
        let labels = reachability(&Config::default(), vec![(0u32, 1), (3, 2)]).unwrap();
        assert_eq!(labels.get(&0), Some(&0));
        assert_eq!(labels.get(&1), Some(&0));
        assert_eq!(labels.get(&3), Some(&3));
        assert_eq!(labels.get(&2), Some(&3));
        assert_eq!(labels.get(&4), None);
    }

    #[test]
    fn rounds_count_the_round_after_the_last_change() {
        let quiet = Rounds::default();
        assert_eq!(quiet.iterations(10), 1);

        let mut rounds = Rounds { last_change: Some(1), exhausted: false };
        rounds.merge(Rounds { last_change: Some(3), exhausted: false });
        assert_eq!(rounds.iterations(10), 5);

        rounds.merge(Rounds { last_change: None, exhausted: true });
        assert_eq!(rounds.last_change, Some(3));
        assert_eq!(rounds.iterations(4), 4);
    }

    #[test]
    fn epochs_advance_with_fresh_state() {
        let mut driver = Reachability::new(Config::default()).unwrap();
        let first = driver.run(symmetrize(vec![(5u32, 6)])).unwrap();
        let second = driver.run(symmetrize(vec![(6u32, 7)])).unwrap();
        assert_eq!((first.epoch, second.epoch), (0, 1));
        assert_eq!(second.get(&6), Some(&6));
        assert_eq!(second.get(&5), None);
        assert_eq!(driver.epoch(), 2);
    }

    #[test]
    fn empty_graph_converges_immediately() {
        let labels = connected_components::<u32, _>(&Config::process(3), Vec::new()).unwrap();
        assert!(labels.is_empty());
        assert!(labels.converged);
        assert_eq!(labels.iterations, 1);
    }
}
