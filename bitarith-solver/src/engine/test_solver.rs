#![cfg(any(test, doc))]
//! A miniature host solver for exercising the arithmetic constraints in unit tests. It wires
//! the engine components together and drives the constraint lifecycle the way the real
//! solving loop would, one call at a time.

use crate::basic_types::BitState;
use crate::basic_types::CheckResult;
use crate::basic_types::EnforceResult;
use crate::basic_types::PresolveStatus;
use crate::basic_types::PropagationStatus;
use crate::basic_types::SeparationResult;
use crate::basic_types::Solution;
use crate::bitvector::BitVectorId;
use crate::bitvector::BitVectorStore;
use crate::containers::KeyedVec;
use crate::engine::AggregationKind;
use crate::engine::Aggregations;
use crate::engine::Assignments;
use crate::engine::ConstraintId;
use crate::engine::CutPool;
use crate::engine::NotificationEngine;
use crate::engine::Row;
use crate::engine::VarId;
use crate::propagators::bitarith::ArithConstraint;
use crate::propagators::bitarith::ArithError;
use crate::propagators::bitarith::ArithOp;

#[derive(Debug, Default)]
pub(crate) struct TestSolver {
    pub(crate) assignments: Assignments,
    pub(crate) bit_vectors: BitVectorStore,
    pub(crate) notifications: NotificationEngine,
    pub(crate) aggregations: Aggregations,
    pub(crate) cut_pool: CutPool,
    pub(crate) constraints: KeyedVec<ConstraintId, ArithConstraint>,
}

impl TestSolver {
    pub(crate) fn new_bit_vector(
        &mut self,
        name: &str,
        n_bits: usize,
        word_size: usize,
    ) -> BitVectorId {
        self.bit_vectors
            .create(&mut self.assignments, name, n_bits, word_size)
    }

    /// Creates and transforms a constraint, mirroring creation followed by the transition
    /// into the solving stage.
    pub(crate) fn new_constraint(
        &mut self,
        op: ArithOp,
        operand1: BitVectorId,
        operand2: Option<BitVectorId>,
        result: BitVectorId,
    ) -> Result<ConstraintId, ArithError> {
        let name = format!("c{}", self.constraints.len());
        let constraint = ArithConstraint::new(
            name,
            op,
            operand1,
            operand2,
            result,
            &mut self.bit_vectors,
        )?;
        let id = self.constraints.push(constraint);
        self.constraints[id].transform(
            id,
            &mut self.assignments,
            &mut self.bit_vectors,
            &mut self.notifications,
        );
        Ok(id)
    }

    pub(crate) fn fix_bit(&mut self, bit_vector: BitVectorId, bit: usize, value: i32) {
        let var = self.bit_vectors.bit(bit_vector, bit);
        let _ = self
            .assignments
            .fix(var, value)
            .expect("test fixing must not empty a domain");
        self.process_notifications();
    }

    /// Fixes every bit of the vector to the binary expansion of `value`.
    pub(crate) fn fix_bits(&mut self, bit_vector: BitVectorId, value: u32) {
        for bit in 0..self.bit_vectors.n_bits(bit_vector) {
            self.fix_bit(bit_vector, bit, ((value >> bit) & 1) as i32);
        }
    }

    pub(crate) fn propagate(&mut self, id: ConstraintId) -> PropagationStatus {
        let status = self.constraints[id].propagate(&mut self.assignments, &self.bit_vectors);
        self.process_notifications();
        status
    }

    pub(crate) fn presolve(&mut self, id: ConstraintId) -> PresolveStatus {
        let status = self.constraints[id].presolve(
            id,
            &mut self.assignments,
            &mut self.bit_vectors,
            &mut self.aggregations,
            &mut self.notifications,
        );
        self.process_notifications();
        status
    }

    pub(crate) fn ensure_rows(&mut self, id: ConstraintId) {
        self.constraints[id].ensure_rows(&self.assignments, &self.bit_vectors);
    }

    pub(crate) fn initlp(&mut self, id: ConstraintId) {
        self.constraints[id].initlp(&self.assignments, &self.bit_vectors, &mut self.cut_pool);
    }

    pub(crate) fn separate(&mut self, id: ConstraintId, solution: &Solution) -> SeparationResult {
        self.constraints[id].separate(
            solution,
            &self.assignments,
            &self.bit_vectors,
            &mut self.cut_pool,
        )
    }

    pub(crate) fn enforce_lp(&mut self, id: ConstraintId, solution: &Solution) -> EnforceResult {
        self.constraints[id].enforce_lp(
            solution,
            &self.assignments,
            &self.bit_vectors,
            &mut self.cut_pool,
        )
    }

    pub(crate) fn enforce_pseudo(&self, id: ConstraintId) -> CheckResult {
        self.constraints[id].enforce_pseudo(&self.assignments, &self.bit_vectors)
    }

    pub(crate) fn check(&self, id: ConstraintId, solution: &Solution) -> CheckResult {
        self.constraints[id].check(solution, &self.bit_vectors)
    }

    /// Drains buffered bound changes and lets the notification engine mark the watching
    /// constraints dirty.
    pub(crate) fn process_notifications(&mut self) {
        let events = self.assignments.drain_events();
        let constraints = &mut self.constraints;
        self.notifications
            .dispatch(events, |id| constraints[id].clear_propagated());
    }

    pub(crate) fn bit(&self, bit_vector: BitVectorId, bit: usize) -> VarId {
        self.bit_vectors.bit(bit_vector, bit)
    }

    pub(crate) fn bit_state(&self, bit_vector: BitVectorId, bit: usize) -> BitState {
        self.bit_vectors
            .bit_state(&self.assignments, bit_vector, bit)
    }

    /// The value of a fully fixed bit-vector, or `None` while any bit is open.
    pub(crate) fn bit_vector_value(&self, bit_vector: BitVectorId) -> Option<u32> {
        self.bit_vectors
            .bits(bit_vector)
            .iter()
            .enumerate()
            .try_fold(0, |value, (bit, &var)| {
                let fixed = u32::try_from(self.assignments.fixed_value(var)?).ok()?;
                Some(value | (fixed << bit))
            })
    }

    pub(crate) fn carry_var(&self, id: ConstraintId, word: usize) -> VarId {
        self.constraints[id].carry_var(word)
    }

    pub(crate) fn carry_value(&self, id: ConstraintId, word: usize) -> Option<i32> {
        self.assignments.fixed_value(self.carry_var(id, word))
    }

    pub(crate) fn rows(&self, id: ConstraintId) -> &[Row] {
        self.constraints[id].rows()
    }

    pub(crate) fn num_cuts(&self) -> usize {
        self.cut_pool.num_cuts()
    }

    pub(crate) fn cut_score(&self, index: usize) -> f64 {
        self.cut_pool.cuts()[index].score
    }

    pub(crate) fn is_deleted(&self, id: ConstraintId) -> bool {
        self.constraints[id].is_deleted()
    }

    pub(crate) fn operand1(&self, id: ConstraintId) -> BitVectorId {
        self.constraints[id].operand1()
    }

    pub(crate) fn relation_between(&self, x: VarId, y: VarId) -> Option<AggregationKind> {
        self.aggregations.relation_between(x, y)
    }

    pub(crate) fn active_representative(&self, bit_vector: BitVectorId) -> BitVectorId {
        self.bit_vectors.active_representative(bit_vector)
    }

    /// A fresh all-zero solution sized to the current variable count.
    pub(crate) fn solution(&self) -> Solution {
        Solution::new(self.assignments.num_variables())
    }

    /// Writes the binary expansion of `value` into `solution` for every bit of the vector.
    pub(crate) fn write_bits(
        &self,
        solution: &mut Solution,
        bit_vector: BitVectorId,
        value: u32,
    ) {
        for (bit, &var) in self.bit_vectors.bits(bit_vector).iter().enumerate() {
            solution.set_value(var, f64::from((value >> bit) & 1));
        }
    }
}
