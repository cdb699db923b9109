//! Logging events for reachability computations.
//!
//! Events are plain serializable records, published through the `log` facade under the
//! `reachability` target. Round and operator events are logged at `debug` and `trace` level;
//! the outcome of each epoch is logged at `info` level.

use serde::{Deserialize, Serialize};

use crate::Epoch;

/// The `log` target events are published under.
pub const TARGET: &str = "reachability";

/// Possible reachability events.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub enum ReachabilityEvent {
    /// A round of the fixpoint loop completed on one worker.
    Round(RoundEvent),
    /// A join switched from buffering labels to matching them.
    Transition(TransitionEvent),
    /// A blocking aggregate released its records for a time.
    Release(ReleaseEvent),
    /// An epoch finished.
    Epoch(EpochEvent),
}

/// Summary of one round of the fixpoint loop, as seen by one worker.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoundEvent {
    /// Worker that observed the round.
    pub worker: usize,
    /// The epoch being computed.
    pub epoch: Epoch,
    /// The round index within the epoch.
    pub iteration: u32,
    /// Number of labels that changed on this worker.
    pub changes: usize,
}

impl From<RoundEvent> for ReachabilityEvent { fn from(e: RoundEvent) -> Self { ReachabilityEvent::Round(e) } }

/// A join observed that its edges were complete.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Worker owning the join.
    pub worker: usize,
    /// Number of source vertices in the adjacency table.
    pub sources: usize,
    /// Number of buffered labels drained at the transition.
    pub pending: usize,
}

impl From<TransitionEvent> for ReachabilityEvent { fn from(e: TransitionEvent) -> Self { ReachabilityEvent::Transition(e) } }

/// A blocking aggregate emitted its active keys.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReleaseEvent {
    /// Worker owning the aggregate.
    pub worker: usize,
    /// The time that closed, as rendered by its `Debug` implementation.
    pub time: String,
    /// Number of records emitted.
    pub records: usize,
}

impl From<ReleaseEvent> for ReachabilityEvent { fn from(e: ReleaseEvent) -> Self { ReachabilityEvent::Release(e) } }

/// Outcome of an epoch.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct EpochEvent {
    /// The epoch that finished.
    pub epoch: Epoch,
    /// Number of rounds run.
    pub iterations: u32,
    /// Whether the fixpoint was reached.
    pub converged: bool,
    /// Number of labelled vertices.
    pub labels: usize,
}

impl From<EpochEvent> for ReachabilityEvent { fn from(e: EpochEvent) -> Self { ReachabilityEvent::Epoch(e) } }

/// Publishes an event.
pub fn log<E: Into<ReachabilityEvent>>(event: E) {
    match event.into() {
        ReachabilityEvent::Epoch(e) if !e.converged => log::warn!(target: TARGET, "{:?}", e),
        ReachabilityEvent::Epoch(e) => log::info!(target: TARGET, "{:?}", e),
        ReachabilityEvent::Round(e) => log::debug!(target: TARGET, "{:?}", e),
        event => log::trace!(target: TARGET, "{:?}", event),
    }
}
