use log::debug;

use crate::engine::Assignments;
use crate::engine::VarId;

/// A clause over fixed binary variables, candidate reason for a failed deduction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictClause {
    /// (variable, fixed value) pairs whose conjunction is infeasible.
    literals: Vec<(VarId, bool)>,
}

impl ConflictClause {
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}

/// Entry point for conflict analysis when a deduced fixing contradicts an already-fixed
/// value.
///
/// Initializes the conflict clause from all fixed variables in the conflicting constraint's
/// scope, the coarsest sound starting point. Deriving a usable clause from it is not
/// implemented; the function always returns `None`, and callers must not rely on a clause
/// being produced.
pub fn analyze_conflict(assignments: &Assignments, scope: &[VarId]) -> Option<ConflictClause> {
    let clause = ConflictClause {
        literals: scope
            .iter()
            .filter_map(|&var| {
                assignments
                    .fixed_value(var)
                    .map(|value| (var, value == 1))
            })
            .collect(),
    };

    debug!(
        "conflicting deduction: {} fixed of {} scope variables",
        clause.len(),
        scope.len()
    );

    // Reducing the initial clause to a usable reason is not implemented.
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_is_a_stub_and_produces_no_clause() {
        let mut assignments = Assignments::default();
        let a = assignments.grow_binary();
        let b = assignments.grow_binary();
        let _ = assignments.fix(a, 1).expect("domain is not empty");

        assert_eq!(analyze_conflict(&assignments, &[a, b]), None);
    }
}
