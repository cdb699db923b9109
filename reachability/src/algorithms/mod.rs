//! Graph algorithms built from the keyed operators.

pub mod reachability;
