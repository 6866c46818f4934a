use crate::containers::KeyedVec;
use crate::engine::Assignments;
use crate::engine::VarId;

/// A candidate assignment of fractional values to the binary decision variables, together
/// with the feasibility tolerance below which numerical violations are treated as feasible.
///
/// During separation this holds the current LP solution; for pseudo-solution checks it is
/// built from the variable bounds via [`Solution::from_assignments`].
#[derive(Clone, Debug)]
pub struct Solution {
    values: KeyedVec<VarId, f64>,
    feasibility_tolerance: f64,
}

impl Solution {
    pub const DEFAULT_FEASIBILITY_TOLERANCE: f64 = 1e-6;

    /// A solution with all `num_variables` values at zero and the default tolerance.
    pub fn new(num_variables: usize) -> Solution {
        let mut values = KeyedVec::default();
        for _ in 0..num_variables {
            let _ = values.push(0.0);
        }
        Solution {
            values,
            feasibility_tolerance: Self::DEFAULT_FEASIBILITY_TOLERANCE,
        }
    }

    /// The pseudo solution: every variable at its current lower bound.
    pub fn from_assignments(assignments: &Assignments) -> Solution {
        let mut solution = Solution::new(assignments.num_variables());
        for var in assignments.variables() {
            solution.set_value(var, f64::from(assignments.lower_bound(var)));
        }
        solution
    }

    pub fn with_feasibility_tolerance(mut self, tolerance: f64) -> Solution {
        self.feasibility_tolerance = tolerance;
        self
    }

    pub fn set_value(&mut self, var: VarId, value: f64) {
        self.values[var] = value;
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values[var]
    }

    pub fn feasibility_tolerance(&self) -> f64 {
        self.feasibility_tolerance
    }

    /// Whether a violation magnitude is within the feasibility tolerance.
    pub fn is_within_tolerance(&self, violation: f64) -> bool {
        violation <= self.feasibility_tolerance
    }
}
