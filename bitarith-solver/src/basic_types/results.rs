use crate::engine::EmptyDomain;
use crate::engine::VarId;

/// The result of invoking the propagator of an arithmetic constraint. Propagation either
/// runs to completion, reporting the applied reductions, or identifies an inconsistency
/// which the caller turns into a node cutoff.
pub type PropagationStatus = Result<PropagationOutcome, Inconsistency>;

/// The reductions applied by a completed propagation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// The number of variables newly fixed during the pass.
    pub n_fixings: u32,
    /// True when the pass proved the constraint vacuous for the remainder of this subtree,
    /// so it has been deactivated.
    pub redundant: bool,
}

/// The result of a presolving round on a single constraint.
pub type PresolveStatus = Result<PresolveReductions, Inconsistency>;

/// The problem reductions found by one presolving round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresolveReductions {
    pub n_fixings: u32,
    pub n_aggregations: u32,
    pub n_deleted_constraints: u32,
}

/// An inconsistency discovered while reasoning about the current bounds. Recoverable at the
/// search-tree level: the caller prunes the current node.
#[derive(Debug, PartialEq, Eq)]
pub enum Inconsistency {
    /// A fixing emptied the domain of a variable.
    EmptyDomain,
    /// A deduced fixing contradicted an already-fixed value.
    Conflict(ConstraintConflict),
}

impl From<EmptyDomain> for Inconsistency {
    fn from(_: EmptyDomain) -> Self {
        Inconsistency::EmptyDomain
    }
}

impl From<ConstraintConflict> for Inconsistency {
    fn from(conflict: ConstraintConflict) -> Self {
        Inconsistency::Conflict(conflict)
    }
}

/// A conflict raised by a failed deduction. The scope is the full variable scope of the
/// conflicting constraint, which is what the conflict-analysis entry point starts from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintConflict {
    pub scope: Vec<VarId>,
}

/// The result of a separation round on a single constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeparationResult {
    /// No violated row was found.
    DidNotFind,
    /// At least one cut was added to the cut pool.
    Separated,
}

/// The feasibility verdict for a candidate solution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CheckResult {
    Feasible,
    /// The relation is violated; `violation` is the magnitude usable as a cut score.
    Infeasible { violation: f64 },
}

/// The verdict of enforcing a constraint against the current LP solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnforceResult {
    Feasible,
    /// Violated rows were added as cutting planes.
    Separated,
    /// The solution is violated and no cut could be produced.
    Infeasible,
}
