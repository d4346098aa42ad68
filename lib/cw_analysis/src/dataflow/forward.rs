use crate::controlflow::{Block, Branch, Cfg};
use crate::dataflow::Dataflow;
use crate::errors::{AnalysisError, AnalysisResult};
use cw_classfile::instrs::LabeledInstr;
use cw_classfile::Addr;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// The abstract state that is carried along the control flow graph
/// during forward dataflow analysis.
pub trait AbstractForwardState<'a>: Sized {
    type Context<'c>;
    type Error;

    /// The state initialization function, giving the state at method entry.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if the context does not allow
    /// a proper state initialization.
    fn init(ctx: &Self::Context<'a>) -> Result<Self, Self::Error>;

    /// The state join operation function. `at` is the address of the block
    /// both states flow into. Returns `true` when `self` was modified.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given states
    /// cannot be joined properly with respect to the context.
    fn join(&mut self, other: &Self, at: Addr, ctx: &Self::Context<'a>)
        -> Result<bool, Self::Error>;

    /// The control flow branch transfer function.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given branch
    /// cannot be passed with the current state with respect to the
    /// context.
    fn transfer_branch(&mut self, branch: &Branch, ctx: &Self::Context<'a>)
        -> Result<(), Self::Error>;

    /// The instruction tranfer function.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given instruction
    /// cannot be passed with the current state with respect to the
    /// context.
    fn transfer_instr(
        &mut self,
        linstr: &LabeledInstr,
        ctx: &Self::Context<'a>,
    ) -> Result<(), Self::Error>;
}

fn log_state<S: fmt::Display>(title: &str, state: &S) {
    log::debug!("    -- {title}:");
    for line in format!("{state}").split('\n') {
        log::debug!("      {line}");
    }
}

fn transfer_block<'a, S>(block: &Block, entry: &S, context: &S::Context<'a>) -> AnalysisResult<S>
where
    S: AbstractForwardState<'a> + Clone + fmt::Display,
    S::Error: Into<AnalysisError>,
{
    let mut state = entry.clone();
    for linstr in block.instructions() {
        log::trace!("transfer_instr( {linstr} )");
        log::trace!("    before: {state}");
        state
            .transfer_instr(linstr, context)
            .map_err(S::Error::into)?;
        log::trace!("    after:  {state}");
    }
    Ok(state)
}

/// Performs a forward dataflow analysis over a control flow graph.
///
/// The analysis parameters are given by the `AbstractForwardState` trait
/// methods passed as a type parameter. Blocks are processed from a worklist
/// seeded with the entry block: the exit state of a block is propagated to
/// each successor, installed as is the first time the successor is reached,
/// joined with its current entry state otherwise. A successor is queued
/// again whenever its entry state changes.
///
/// # Errors
///
/// This function may generate errors resulting of an underlying
/// abstract state error (at initialization, join or transfer
/// operation). Also, the exact type of the error is parameterized
/// through an `AbstractState` trait associated type.
pub fn forward<'a, S>(cfg: &Cfg, context: &S::Context<'a>) -> AnalysisResult<Dataflow<S>>
where
    S: AbstractForwardState<'a> + Clone + fmt::Display,
    S::Error: Into<AnalysisError>,
{
    let cfgraph = &cfg.inner;

    let mut entries: BTreeMap<Addr, S> = BTreeMap::new();
    let mut exits: BTreeMap<Addr, S> = BTreeMap::new();

    let start = cfg.start_index();
    entries.insert(
        cfgraph[start].start_addr(),
        S::init(context).map_err(S::Error::into)?,
    );
    let mut worklist: VecDeque<NodeIndex> = VecDeque::new();
    worklist.push_back(start);

    while let Some(id) = worklist.pop_back() {
        let block = &cfgraph[id];
        let entry = entries.get(&block.start_addr()).ok_or_else(|| {
            AnalysisError::Internal(format!("no entry state for block@{}", block.start_addr()))
        })?;
        log::debug!("    ---- block@{}", block.start_addr());
        log_state("ENTRY STATE", entry);

        let exit = transfer_block(block, entry, context)?;
        log_state("EXIT STATE", &exit);
        log::debug!("");

        for edge in cfgraph.edges_directed(id, Direction::Outgoing) {
            let target = edge.target();
            let target_addr = cfgraph[target].start_addr();
            let mut propagated = exit.clone();
            propagated
                .transfer_branch(edge.weight(), context)
                .map_err(S::Error::into)?;
            let changed = match entries.get_mut(&target_addr) {
                None => {
                    entries.insert(target_addr, propagated);
                    true
                }
                Some(current) => current
                    .join(&propagated, target_addr, context)
                    .map_err(S::Error::into)?,
            };
            if changed && !worklist.contains(&target) {
                worklist.push_back(target);
            }
        }

        exits.insert(block.start_addr(), exit);
    }

    Ok(Dataflow { entries, exits })
}

/// Checks that a dataflow result is a fixpoint: propagating once more every
/// block entry state does not change any other block entry state.
///
/// # Errors
///
/// Same as [`forward`].
pub fn is_stable<'a, S>(
    cfg: &Cfg,
    dataflow: &Dataflow<S>,
    context: &S::Context<'a>,
) -> AnalysisResult<bool>
where
    S: AbstractForwardState<'a> + Clone + fmt::Display,
    S::Error: Into<AnalysisError>,
{
    let cfgraph = &cfg.inner;
    for id in cfgraph.node_indices() {
        let block = &cfgraph[id];
        let Some(entry) = dataflow.entries.get(&block.start_addr()) else {
            continue;
        };
        let exit = transfer_block(block, entry, context)?;
        for edge in cfgraph.edges_directed(id, Direction::Outgoing) {
            let target_addr = cfgraph[edge.target()].start_addr();
            let mut propagated = exit.clone();
            propagated
                .transfer_branch(edge.weight(), context)
                .map_err(S::Error::into)?;
            let Some(current) = dataflow.entries.get(&target_addr) else {
                return Ok(false);
            };
            let mut current = current.clone();
            if current
                .join(&propagated, target_addr, context)
                .map_err(S::Error::into)?
            {
                return Ok(false);
            }
        }
    }
    Ok(true)
}
