use log::debug;

use crate::basic_types::CheckResult;
use crate::basic_types::EnforceResult;
use crate::basic_types::SeparationResult;
use crate::basic_types::Solution;
use crate::bitvector::BitVectorStore;
use crate::engine::Assignments;
use crate::engine::CutPool;
use crate::propagators::bitarith::ArithConstraint;
use crate::propagators::bitarith::ArithKind;

/// Equality rows carry the result variable with coefficient one; below this value of the
/// result variable no row can be violated by more than the feasibility tolerance, so the
/// scan is skipped outright.
const EQ_SEPARATION_CUTOFF: f64 = 0.2;

impl ArithConstraint {
    /// Seeds the initial linear system with all relaxation rows of the constraint.
    pub fn initlp(
        &mut self,
        assignments: &Assignments,
        bit_vectors: &BitVectorStore,
        cut_pool: &mut CutPool,
    ) {
        self.ensure_rows(assignments, bit_vectors);
        let Some(rows) = self.rows.as_mut() else {
            return;
        };
        for row in rows.iter_mut() {
            if !row.is_in_lp() {
                cut_pool.add_cut(row, 0.0);
            }
        }
    }

    /// Scans the relaxation rows for violations under `solution` and adds each violated row
    /// not yet in the linear system as a cutting plane.
    pub fn separate(
        &mut self,
        solution: &Solution,
        assignments: &Assignments,
        bit_vectors: &BitVectorStore,
        cut_pool: &mut CutPool,
    ) -> SeparationResult {
        self.ensure_rows(assignments, bit_vectors);
        let result = match self.kind {
            ArithKind::Add => self.separate_add(solution, bit_vectors, cut_pool),
            ArithKind::Eq => self.separate_eq(solution, bit_vectors, cut_pool),
        };
        if result == SeparationResult::Separated {
            debug!("{}: separation added cuts", self.name);
        }
        result
    }

    fn separate_add(
        &mut self,
        solution: &Solution,
        bit_vectors: &BitVectorStore,
        cut_pool: &mut CutPool,
    ) -> SeparationResult {
        // The per-word residuals double as cut scores; computed up front because the row
        // borrow below is exclusive.
        let violations: Vec<f64> = (0..bit_vectors.n_words(self.result))
            .map(|word| self.check_add_word(solution, bit_vectors, word).abs())
            .collect();

        let Some(rows) = self.rows.as_mut() else {
            return SeparationResult::DidNotFind;
        };
        let mut separated = false;
        for (row, violation) in rows.iter_mut().zip(violations) {
            if row.is_in_lp() || solution.is_within_tolerance(violation) {
                continue;
            }
            cut_pool.add_cut(row, violation);
            separated = true;
        }

        if separated {
            SeparationResult::Separated
        } else {
            SeparationResult::DidNotFind
        }
    }

    fn separate_eq(
        &mut self,
        solution: &Solution,
        bit_vectors: &BitVectorStore,
        cut_pool: &mut CutPool,
    ) -> SeparationResult {
        let result_value = solution.value(bit_vectors.bit(self.result, 0));
        if result_value < EQ_SEPARATION_CUTOFF {
            return SeparationResult::DidNotFind;
        }

        let Some(rows) = self.rows.as_mut() else {
            return SeparationResult::DidNotFind;
        };
        let mut separated = false;
        for row in rows.iter_mut() {
            if row.is_in_lp() {
                continue;
            }
            let violation = row.violation(solution);
            if solution.is_within_tolerance(violation) {
                continue;
            }
            cut_pool.add_cut(row, violation);
            separated = true;
        }

        if separated {
            SeparationResult::Separated
        } else {
            SeparationResult::DidNotFind
        }
    }

    /// Enforces the constraint against an LP-feasible solution: rows already in the linear
    /// system are known to hold, so only the remaining words can be violated. A violation is
    /// answered with cuts when separation finds any, and escalated otherwise.
    pub fn enforce_lp(
        &mut self,
        solution: &Solution,
        assignments: &Assignments,
        bit_vectors: &BitVectorStore,
        cut_pool: &mut CutPool,
    ) -> EnforceResult {
        let verdict = match self.kind {
            ArithKind::Add => self.check_add(solution, bit_vectors, true),
            ArithKind::Eq => self.check_eq(solution, bit_vectors),
        };
        match verdict {
            CheckResult::Feasible => EnforceResult::Feasible,
            CheckResult::Infeasible { .. } => {
                match self.separate(solution, assignments, bit_vectors, cut_pool) {
                    SeparationResult::Separated => EnforceResult::Separated,
                    SeparationResult::DidNotFind => EnforceResult::Infeasible,
                }
            }
        }
    }

    /// Enforces the constraint against the pseudo-solution, the point where every variable
    /// sits at its lower bound.
    pub fn enforce_pseudo(
        &self,
        assignments: &Assignments,
        bit_vectors: &BitVectorStore,
    ) -> CheckResult {
        let pseudo = Solution::from_assignments(assignments);
        self.check(&pseudo, bit_vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_solver::TestSolver;
    use crate::propagators::bitarith::ArithOp;

    #[test]
    fn a_fractional_word_residual_is_separated_once() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 3, 4);
        let y = solver.new_bit_vector("y", 3, 4);
        let z = solver.new_bit_vector("z", 4, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // A fractional point violating the single word row.
        let mut solution = solver.solution();
        solution.set_value(solver.bit(x, 0), 0.5);
        solver.write_bits(&mut solution, z, 3);

        assert_eq!(solver.separate(c, &solution), SeparationResult::Separated);
        assert_eq!(solver.num_cuts(), 1);
        // The row is in the linear system now; the same point yields nothing new.
        assert_eq!(solver.separate(c, &solution), SeparationResult::DidNotFind);
        assert_eq!(solver.num_cuts(), 1);
    }

    #[test]
    fn a_small_fractional_residual_still_exceeds_the_tolerance() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 1, 4);
        let y = solver.new_bit_vector("y", 1, 4);
        let z = solver.new_bit_vector("z", 1, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // Residual -0.4 + 0.3 + 0.3 = 0.2 on the single word row.
        let mut solution = solver.solution();
        solution.set_value(solver.bit(x, 0), 0.3);
        solution.set_value(solver.bit(y, 0), 0.3);
        solution.set_value(solver.bit(z, 0), 0.4);

        assert_eq!(solver.separate(c, &solution), SeparationResult::Separated);
        assert_eq!(solver.num_cuts(), 1);
        assert!((solver.cut_score(0) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn a_satisfied_addition_yields_no_cuts() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 3, 4);
        let y = solver.new_bit_vector("y", 3, 4);
        let z = solver.new_bit_vector("z", 4, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        let mut solution = solver.solution();
        solver.write_bits(&mut solution, x, 4);
        solver.write_bits(&mut solution, y, 5);
        solver.write_bits(&mut solution, z, 9);

        assert_eq!(solver.separate(c, &solution), SeparationResult::DidNotFind);
        assert_eq!(solver.num_cuts(), 0);
    }

    #[test]
    fn equality_separation_is_skipped_below_the_cutoff() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 2, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let r = solver.new_bit_vector("r", 1, 4);
        let c = solver.new_constraint(ArithOp::Eq, x, Some(y), r).expect("valid");

        // Bit pair wildly apart, but the result variable is far from one.
        let mut solution = solver.solution();
        solution.set_value(solver.bit(x, 0), 1.0);
        solution.set_value(solver.bit(r, 0), 0.1);

        assert_eq!(solver.separate(c, &solution), SeparationResult::DidNotFind);

        // Above the cutoff the violated bit rows are found.
        solution.set_value(solver.bit(r, 0), 0.9);
        assert_eq!(solver.separate(c, &solution), SeparationResult::Separated);
        assert!(solver.num_cuts() > 0);
    }

    #[test]
    fn lp_enforcement_answers_violations_with_cuts() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 3, 4);
        let y = solver.new_bit_vector("y", 3, 4);
        let z = solver.new_bit_vector("z", 4, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        let mut solution = solver.solution();
        solver.write_bits(&mut solution, x, 1);
        solver.write_bits(&mut solution, z, 4);

        assert_eq!(solver.enforce_lp(c, &solution), EnforceResult::Separated);

        // With the word row in the linear system, enforcement trusts LP feasibility.
        assert_eq!(solver.enforce_lp(c, &solution), EnforceResult::Feasible);
    }

    #[test]
    fn initlp_seeds_every_relaxation_row() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 8, 4);
        let y = solver.new_bit_vector("y", 8, 4);
        let z = solver.new_bit_vector("z", 8, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        solver.initlp(c);
        assert_eq!(solver.num_cuts(), 2);
        assert!(solver.rows(c).iter().all(|row| row.is_in_lp()));
    }

    #[test]
    fn the_pseudo_solution_check_uses_lower_bounds() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 2, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let z = solver.new_bit_vector("z", 2, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // All-zero lower bounds satisfy 0 + 0 = 0.
        assert_eq!(solver.enforce_pseudo(c), CheckResult::Feasible);

        // Fixing a single operand bit makes the pseudo-solution violate the sum.
        solver.fix_bit(x, 0, 1);
        assert!(matches!(
            solver.enforce_pseudo(c),
            CheckResult::Infeasible { .. }
        ));
    }
}
