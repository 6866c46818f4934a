use log::debug;

use crate::basic_types::BitState;
use crate::basic_types::PresolveReductions;
use crate::basic_types::PresolveStatus;
use crate::bitvector::BitVectorStore;
use crate::engine::AggregationKind;
use crate::engine::Aggregations;
use crate::engine::Assignments;
use crate::engine::ConstraintId;
use crate::engine::NotificationEngine;
use crate::propagators::bitarith::ArithConstraint;
use crate::propagators::bitarith::ArithKind;

impl ArithConstraint {
    /// One presolving round: re-binds the operands to their active representatives, runs the
    /// propagation fixpoint, and searches for variable aggregations and constraint-level
    /// rewrites that propagation alone cannot express.
    pub fn presolve(
        &mut self,
        id: ConstraintId,
        assignments: &mut Assignments,
        bit_vectors: &mut BitVectorStore,
        aggregations: &mut Aggregations,
        notifications: &mut NotificationEngine,
    ) -> PresolveStatus {
        if self.deleted || !self.active {
            return Ok(PresolveReductions::default());
        }
        self.bind_operands(id, assignments, bit_vectors, notifications);

        match self.kind {
            ArithKind::Add => self.presolve_add(assignments, bit_vectors, aggregations),
            ArithKind::Eq => self.presolve_eq(assignments, bit_vectors, aggregations),
        }
    }

    fn presolve_add(
        &mut self,
        assignments: &mut Assignments,
        bit_vectors: &mut BitVectorStore,
        aggregations: &mut Aggregations,
    ) -> PresolveStatus {
        let mut reductions = PresolveReductions::default();

        let mut state = self.load_ripple_state(assignments, bit_vectors);
        self.saturate_ripple(&mut state, assignments, bit_vectors)?;
        reductions.n_fixings += state.n_fixings;
        self.propagated = true;

        // An all-zero operand degenerates the addition into an equality between the result
        // and the other operand; the constraint itself becomes superfluous.
        let zero_operand = if state.operand1.iter().all(|&s| s == BitState::FixedZero) {
            Some(self.operand2)
        } else if state.operand2.iter().all(|&s| s == BitState::FixedZero) {
            Some(self.operand1)
        } else {
            None
        };
        if let Some(operand) = zero_operand {
            debug!("{}: addition of zero, equalizing result and operand", self.name);
            let outcome = bit_vectors.equalize(assignments, aggregations, self.result, operand)?;
            reductions.n_fixings += outcome.n_fixings;
            reductions.n_aggregations += outcome.n_aggregations;
            self.delete_in_presolve(&mut reductions);
            return Ok(reductions);
        }

        if bit_vectors.is_constant(assignments, self.operand1)
            && bit_vectors.is_constant(assignments, self.operand2)
        {
            // The fixpoint above forced the result and every carry; nothing remains.
            self.delete_in_presolve(&mut reductions);
            return Ok(reductions);
        }

        // Bit equations with exactly two free quantities tie those quantities together:
        // `s_i + s_j + s_k == r + 2 * carry_out` with all but two fixed leaves an equality
        // or a complement between the free pair, and often decides the outgoing carry along
        // the way.
        let n = state.result.len();
        let word_size = bit_vectors.word_size(self.result);
        for b in 0..n {
            let states = [
                state.operand1[b],
                state.operand2[b],
                state.carry[b],
                state.result[b],
            ];
            let vars = [
                bit_vectors.get_bit(self.operand1, b),
                bit_vectors.get_bit(self.operand2, b),
                self.carry_var_at(b, n, word_size),
                Some(bit_vectors.bit(self.result, b)),
            ];

            let free: Vec<usize> = (0..4).filter(|&q| !states[q].is_fixed()).collect();
            let [i, j] = free[..] else {
                continue;
            };
            // Interior carries have no variable to aggregate.
            let (Some(u), Some(v)) = (vars[i], vars[j]) else {
                continue;
            };

            let (kind, tied_to_carry_out) = if j < 3 {
                // Two free summands; the third summand and the result bit are fixed.
                let fixed_summand = 3 - i - j;
                let difference = states[3].lower_bound() - states[fixed_summand].lower_bound();
                if difference == 0 {
                    // s_i + s_j == 2 * carry_out, so both equal the outgoing carry.
                    (AggregationKind::Equal, true)
                } else {
                    // The pair must sum to one.
                    (AggregationKind::Complement, false)
                }
            } else {
                // One free summand against the free result bit.
                let fixed_sum: i32 = (0..3)
                    .filter(|&q| q != i)
                    .map(|q| states[q].lower_bound())
                    .sum();
                if fixed_sum == 1 {
                    // s_i + 1 == r + 2 * carry_out: the result complements the summand, and
                    // the outgoing carry equals the summand.
                    (AggregationKind::Complement, true)
                } else {
                    // Fixed summands at 0 or 2 settle the carry, leaving s_i == r.
                    (AggregationKind::Equal, false)
                }
            };

            let outcome = aggregations.aggregate(assignments, u, v, kind)?;
            reductions.n_fixings += outcome.n_fixings;
            reductions.n_aggregations += outcome.n_aggregations;

            if tied_to_carry_out {
                if let Some(carry_out) = self.carry_var_at(b + 1, n, word_size) {
                    let outcome =
                        aggregations.aggregate(assignments, u, carry_out, AggregationKind::Equal)?;
                    reductions.n_fixings += outcome.n_fixings;
                    reductions.n_aggregations += outcome.n_aggregations;
                }
            }
        }

        Ok(reductions)
    }

    fn presolve_eq(
        &mut self,
        assignments: &mut Assignments,
        bit_vectors: &mut BitVectorStore,
        aggregations: &mut Aggregations,
    ) -> PresolveStatus {
        let mut reductions = PresolveReductions::default();
        let result_var = bit_vectors.bit(self.result, 0);

        // Both operands resolve to the same entity: the comparison is a tautology.
        if self.operand1 == self.operand2 {
            debug!("{}: operands coincide, fixing the result", self.name);
            reductions.n_fixings += self.deduce_bin_var(assignments, bit_vectors, result_var, 1)?;
            self.delete_in_presolve(&mut reductions);
            return Ok(reductions);
        }

        if assignments.fixed_value(result_var) == Some(1) {
            // A true comparison is an unconditional equality of the operands.
            let outcome =
                bit_vectors.equalize(assignments, aggregations, self.operand1, self.operand2)?;
            reductions.n_fixings += outcome.n_fixings;
            reductions.n_aggregations += outcome.n_aggregations;
            self.delete_in_presolve(&mut reductions);
            return Ok(reductions);
        }

        let outcome = self.propagate_eq(assignments, bit_vectors)?;
        self.propagated = true;
        reductions.n_fixings += outcome.n_fixings;
        if outcome.redundant {
            self.delete_in_presolve(&mut reductions);
        }
        Ok(reductions)
    }

    fn delete_in_presolve(&mut self, reductions: &mut PresolveReductions) {
        self.deleted = true;
        self.active = false;
        reductions.n_deleted_constraints += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_solver::TestSolver;
    use crate::propagators::bitarith::ArithOp;

    #[test]
    fn two_free_summands_under_a_matching_result_aggregate_equal() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 1, 4);
        let y = solver.new_bit_vector("y", 1, 4);
        let z = solver.new_bit_vector("z", 1, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // x + y = 0 + 2*carry: the summands equal each other and the outgoing carry.
        solver.fix_bits(z, 0);
        let reductions = solver.presolve(c).expect("feasible");

        assert_eq!(reductions.n_aggregations, 2);
        assert_eq!(
            solver.relation_between(solver.bit(x, 0), solver.bit(y, 0)),
            Some(AggregationKind::Equal)
        );
        assert_eq!(
            solver.relation_between(solver.bit(x, 0), solver.carry_var(c, 0)),
            Some(AggregationKind::Equal)
        );
    }

    #[test]
    fn two_free_summands_under_a_differing_result_aggregate_complemented() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 1, 4);
        let y = solver.new_bit_vector("y", 1, 4);
        let z = solver.new_bit_vector("z", 1, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // x + y = 1 + 2*carry: exactly one summand is set.
        solver.fix_bits(z, 1);
        let _ = solver.presolve(c).expect("feasible");

        assert_eq!(
            solver.relation_between(solver.bit(x, 0), solver.bit(y, 0)),
            Some(AggregationKind::Complement)
        );
    }

    #[test]
    fn a_free_summand_against_the_result_aggregates_complemented_when_the_rest_sums_to_one() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 1, 4);
        let y = solver.new_bit_vector("y", 1, 4);
        let z = solver.new_bit_vector("z", 1, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // 1 + y = z + 2*carry: z complements y, and the carry equals y.
        solver.fix_bits(x, 1);
        let _ = solver.presolve(c).expect("feasible");

        assert_eq!(
            solver.relation_between(solver.bit(y, 0), solver.bit(z, 0)),
            Some(AggregationKind::Complement)
        );
        assert_eq!(
            solver.relation_between(solver.bit(y, 0), solver.carry_var(c, 0)),
            Some(AggregationKind::Equal)
        );
    }

    #[test]
    fn a_saturated_carry_ties_the_free_summand_to_the_result() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 2, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let z = solver.new_bit_vector("z", 2, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // Bit 0 overflows into bit 1, where x_1 = 1 and the carry sum to two: y_1 == z_1.
        solver.fix_bits(x, 3);
        solver.fix_bit(y, 0, 1);
        let _ = solver.presolve(c).expect("feasible");

        assert_eq!(
            solver.relation_between(solver.bit(y, 1), solver.bit(z, 1)),
            Some(AggregationKind::Equal)
        );
    }

    #[test]
    fn adding_zero_equalizes_the_result_with_the_other_operand() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 2, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let z = solver.new_bit_vector("z", 2, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        solver.fix_bits(y, 0);
        let reductions = solver.presolve(c).expect("feasible");

        assert_eq!(reductions.n_deleted_constraints, 1);
        assert!(solver.is_deleted(c));
        assert_eq!(
            solver.relation_between(solver.bit(z, 0), solver.bit(x, 0)),
            Some(AggregationKind::Equal)
        );
        assert_eq!(solver.active_representative(x), z);
    }

    #[test]
    fn comparing_a_bit_vector_with_itself_fixes_the_result() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 3, 4);
        let r = solver.new_bit_vector("r", 1, 4);
        let c = solver.new_constraint(ArithOp::Eq, x, Some(x), r).expect("valid");

        let reductions = solver.presolve(c).expect("feasible");

        assert_eq!(reductions.n_fixings, 1);
        assert_eq!(reductions.n_deleted_constraints, 1);
        assert_eq!(solver.bit_state(r, 0), BitState::FixedOne);
    }

    #[test]
    fn a_true_comparison_equalizes_the_operands() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 2, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let r = solver.new_bit_vector("r", 1, 4);
        let c = solver.new_constraint(ArithOp::Eq, x, Some(y), r).expect("valid");

        solver.fix_bits(r, 1);
        let reductions = solver.presolve(c).expect("feasible");

        assert_eq!(reductions.n_aggregations, 2);
        assert_eq!(reductions.n_deleted_constraints, 1);
        assert_eq!(solver.active_representative(y), x);
    }

    #[test]
    fn presolving_rebinds_operands_to_their_representatives() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 2, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let z = solver.new_bit_vector("z", 2, 4);
        let r = solver.new_bit_vector("r", 1, 4);
        let eq = solver.new_constraint(ArithOp::Eq, x, Some(y), r).expect("valid");
        let add = solver.new_constraint(ArithOp::Add, y, Some(z), z).expect("valid");

        // The true comparison redirects y onto x; the addition must follow on its next
        // presolving round.
        solver.fix_bits(r, 1);
        let _ = solver.presolve(eq).expect("feasible");
        let _ = solver.presolve(add).expect("feasible");

        assert_eq!(solver.operand1(add), x);
    }

    #[test]
    fn constant_operands_retire_the_addition() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 2, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let z = solver.new_bit_vector("z", 3, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        solver.fix_bits(x, 3);
        solver.fix_bits(y, 2);
        let reductions = solver.presolve(c).expect("feasible");

        assert_eq!(reductions.n_deleted_constraints, 1);
        assert_eq!(solver.bit_vector_value(z), Some(5));
    }
}
