use itertools::EitherOrBoth;
use itertools::Itertools;

use crate::basic_types::CheckResult;
use crate::basic_types::Solution;
use crate::bitvector::BitVectorStore;
use crate::engine::Row;
use crate::propagators::bitarith::ArithConstraint;
use crate::propagators::bitarith::ArithKind;

impl ArithConstraint {
    /// Checks a candidate solution against the relation, word by word for additions and bit
    /// by bit for equalities. Used as the mandatory feasibility check; nothing is skipped.
    pub fn check(&self, solution: &Solution, bit_vectors: &BitVectorStore) -> CheckResult {
        match self.kind {
            ArithKind::Add => self.check_add(solution, bit_vectors, false),
            ArithKind::Eq => self.check_eq(solution, bit_vectors),
        }
    }

    /// The residual of the addition relation at word `w` under `solution`:
    ///
    /// `-result_w - wordPower(w) * carry_w + operand1_w + operand2_w + carry_{w-1}`
    ///
    /// which is zero exactly when the word's relaxation row is satisfied.
    pub fn check_add_word(
        &self,
        solution: &Solution,
        bit_vectors: &BitVectorStore,
        word: usize,
    ) -> f64 {
        let start = word * bit_vectors.word_size(self.result);
        let width = bit_vectors.word_width(self.result, word);

        let result_value = bit_vectors.partial_value(solution, self.result, start, width);
        let operand1_value = bit_vectors.partial_value(solution, self.operand1, start, width);
        let operand2_value = bit_vectors.partial_value(solution, self.operand2, start, width);
        let carry_in = if word > 0 {
            solution.value(self.carry_vars[word - 1])
        } else {
            0.0
        };
        let carry_out = solution.value(self.carry_vars[word]);

        -result_value - bit_vectors.word_power(self.result, word) * carry_out
            + operand1_value
            + operand2_value
            + carry_in
    }

    /// Checks every word of the addition. With `skip_rows_in_lp` set, words whose relaxation
    /// row is part of the active linear system are taken as satisfied, which is sound for
    /// LP-feasible solutions.
    pub fn check_add(
        &self,
        solution: &Solution,
        bit_vectors: &BitVectorStore,
        skip_rows_in_lp: bool,
    ) -> CheckResult {
        for word in 0..bit_vectors.n_words(self.result) {
            if skip_rows_in_lp && self.row_in_lp(word) {
                continue;
            }
            let violation = self.check_add_word(solution, bit_vectors, word).abs();
            if !solution.is_within_tolerance(violation) {
                return CheckResult::Infeasible { violation };
            }
        }
        CheckResult::Feasible
    }

    fn row_in_lp(&self, index: usize) -> bool {
        self.rows
            .as_ref()
            .is_some_and(|rows| rows.get(index).is_some_and(Row::is_in_lp))
    }

    /// Checks the reified equality: the result variable must match whether every bit pair
    /// agrees within the feasibility tolerance. Bits beyond an operand's width count as
    /// zero.
    pub fn check_eq(&self, solution: &Solution, bit_vectors: &BitVectorStore) -> CheckResult {
        let equal = bit_vectors
            .bits(self.operand1)
            .iter()
            .zip_longest(bit_vectors.bits(self.operand2).iter())
            .all(|pair| {
                let (value1, value2) = match pair {
                    EitherOrBoth::Both(&a, &b) => (solution.value(a), solution.value(b)),
                    EitherOrBoth::Left(&a) => (solution.value(a), 0.0),
                    EitherOrBoth::Right(&b) => (0.0, solution.value(b)),
                };
                solution.is_within_tolerance((value1 - value2).abs())
            });

        let expected = if equal { 1.0 } else { 0.0 };
        let violation = (solution.value(bit_vectors.bit(self.result, 0)) - expected).abs();
        if solution.is_within_tolerance(violation) {
            CheckResult::Feasible
        } else {
            CheckResult::Infeasible { violation }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_solver::TestSolver;
    use crate::propagators::bitarith::ArithOp;

    #[test]
    fn an_integral_addition_checks_feasible() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 3, 4);
        let y = solver.new_bit_vector("y", 3, 4);
        let z = solver.new_bit_vector("z", 4, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // 6 + 7 = 13, no overflow out of the 4-bit result.
        let mut solution = solver.solution();
        solver.write_bits(&mut solution, x, 6);
        solver.write_bits(&mut solution, y, 7);
        solver.write_bits(&mut solution, z, 13);

        assert_eq!(solver.check(c, &solution), CheckResult::Feasible);
    }

    #[test]
    fn a_wrong_sum_checks_infeasible_with_the_residual_as_violation() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 3, 4);
        let y = solver.new_bit_vector("y", 3, 4);
        let z = solver.new_bit_vector("z", 4, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        let mut solution = solver.solution();
        solver.write_bits(&mut solution, x, 2);
        solver.write_bits(&mut solution, y, 3);
        solver.write_bits(&mut solution, z, 7);

        match solver.check(c, &solution) {
            CheckResult::Infeasible { violation } => assert!((violation - 2.0).abs() < 1e-9),
            CheckResult::Feasible => panic!("2 + 3 != 7"),
        }
    }

    #[test]
    fn a_carry_crossing_a_word_boundary_checks_feasible() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 8, 4);
        let y = solver.new_bit_vector("y", 8, 4);
        let z = solver.new_bit_vector("z", 8, 4);
        let c = solver.new_constraint(ArithOp::Add, x, Some(y), z).expect("valid");

        // 15 + 1 = 16 carries out of word 0 into word 1.
        let mut solution = solver.solution();
        solver.write_bits(&mut solution, x, 15);
        solver.write_bits(&mut solution, y, 1);
        solver.write_bits(&mut solution, z, 16);
        solution.set_value(solver.carry_var(c, 0), 1.0);

        assert_eq!(solver.check(c, &solution), CheckResult::Feasible);
    }

    #[test]
    fn the_equality_check_honors_implicit_zero_bits() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 4, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let r = solver.new_bit_vector("r", 1, 4);
        let c = solver.new_constraint(ArithOp::Eq, x, Some(y), r).expect("valid");

        // 3 == 3 even though the widths differ.
        let mut solution = solver.solution();
        solver.write_bits(&mut solution, x, 3);
        solver.write_bits(&mut solution, y, 3);
        solver.write_bits(&mut solution, r, 1);
        assert_eq!(solver.check(c, &solution), CheckResult::Feasible);

        // 8 has a one in a position y cannot represent.
        let mut solution = solver.solution();
        solver.write_bits(&mut solution, x, 8);
        solver.write_bits(&mut solution, y, 0);
        solver.write_bits(&mut solution, r, 1);
        assert!(matches!(
            solver.check(c, &solution),
            CheckResult::Infeasible { .. }
        ));
    }

    #[test]
    fn the_equality_result_must_match_the_comparison() {
        let mut solver = TestSolver::default();
        let x = solver.new_bit_vector("x", 2, 4);
        let y = solver.new_bit_vector("y", 2, 4);
        let r = solver.new_bit_vector("r", 1, 4);
        let c = solver.new_constraint(ArithOp::Eq, x, Some(y), r).expect("valid");

        let mut solution = solver.solution();
        solver.write_bits(&mut solution, x, 2);
        solver.write_bits(&mut solution, y, 1);
        solver.write_bits(&mut solution, r, 1);
        assert!(matches!(
            solver.check(c, &solution),
            CheckResult::Infeasible { .. }
        ));
    }
}
