use log::trace;

use crate::containers::HashMap;
use crate::engine::Assignments;
use crate::engine::EmptyDomain;
use crate::engine::VarId;

/// The affine relation an aggregation establishes between two binary variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregationKind {
    /// `x == y` (coefficients +1/-1, right-hand side 0).
    Equal,
    /// `x == 1 - y` (coefficients +1/+1, right-hand side 1).
    Complement,
}

impl AggregationKind {
    /// Composition of two relations sharing a variable: complements cancel pairwise.
    fn compose(self, other: AggregationKind) -> AggregationKind {
        if self == other {
            AggregationKind::Equal
        } else {
            AggregationKind::Complement
        }
    }
}

/// The reductions produced by an aggregation request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregationOutcome {
    pub n_fixings: u32,
    pub n_aggregations: u32,
}

impl std::ops::AddAssign for AggregationOutcome {
    fn add_assign(&mut self, rhs: AggregationOutcome) {
        self.n_fixings += rhs.n_fixings;
        self.n_aggregations += rhs.n_aggregations;
    }
}

/// The presolve variable-aggregation table: a substitution of one binary variable by another
/// (equal or complemented), recorded when presolving proves the relation sound.
///
/// The table only grows during presolving. Fixings that happen after a substitution was
/// recorded are pushed through by the presolving driver, not by this table.
#[derive(Debug, Default)]
pub struct Aggregations {
    substitutions: HashMap<VarId, (VarId, AggregationKind)>,
}

impl Aggregations {
    /// Follows the substitution chain of `var` to its representative, composing the
    /// relations along the way.
    pub fn resolve(&self, var: VarId) -> (VarId, AggregationKind) {
        let mut current = var;
        let mut kind = AggregationKind::Equal;
        while let Some(&(next, step)) = self.substitutions.get(&current) {
            current = next;
            kind = kind.compose(step);
        }
        (current, kind)
    }

    /// Establishes `y == kind(x)`.
    ///
    /// If either representative is already fixed the other is fixed accordingly; if both are
    /// free the substitution is recorded. Requesting a variable to be its own complement is
    /// infeasible.
    pub fn aggregate(
        &mut self,
        assignments: &mut Assignments,
        x: VarId,
        y: VarId,
        kind: AggregationKind,
    ) -> Result<AggregationOutcome, EmptyDomain> {
        let (rep_x, kind_x) = self.resolve(x);
        let (rep_y, kind_y) = self.resolve(y);
        let combined = kind_x.compose(kind).compose(kind_y);

        let mut outcome = AggregationOutcome::default();

        if rep_x == rep_y {
            return match combined {
                // Already known to be equal; the request is redundant.
                AggregationKind::Equal => Ok(outcome),
                // A binary variable cannot be its own complement.
                AggregationKind::Complement => Err(EmptyDomain),
            };
        }

        let apply = |value: i32| match combined {
            AggregationKind::Equal => value,
            AggregationKind::Complement => 1 - value,
        };

        if let Some(value) = assignments.fixed_value(rep_x) {
            if assignments.fix(rep_y, apply(value))? {
                outcome.n_fixings += 1;
            }
        } else if let Some(value) = assignments.fixed_value(rep_y) {
            if assignments.fix(rep_x, apply(value))? {
                outcome.n_fixings += 1;
            }
        } else {
            trace!("aggregating {rep_y} := {combined:?}({rep_x})");
            let _ = self.substitutions.insert(rep_y, (rep_x, combined));
            outcome.n_aggregations += 1;
        }

        Ok(outcome)
    }

    /// The relation currently known between `x` and `y`, if they share a representative.
    pub fn relation_between(&self, x: VarId, y: VarId) -> Option<AggregationKind> {
        let (rep_x, kind_x) = self.resolve(x);
        let (rep_y, kind_y) = self.resolve(y);
        (rep_x == rep_y).then(|| kind_x.compose(kind_y))
    }

    pub fn num_aggregations(&self) -> usize {
        self.substitutions.len()
    }
}
