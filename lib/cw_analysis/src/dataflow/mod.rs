//! Dataflow analysis framework.

use cw_classfile::Addr;
use std::collections::BTreeMap;

mod forward;

pub use forward::{forward, is_stable, AbstractForwardState};

/// Dataflow analysis result object.
///
/// Contains entries and exits abstract states for every reachable basic
/// block of the analyzed method (keyed by block start address), after
/// reaching fixpoint.
#[derive(Debug, Clone)]
pub struct Dataflow<S> {
    pub entries: BTreeMap<Addr, S>,
    pub exits: BTreeMap<Addr, S>,
}
