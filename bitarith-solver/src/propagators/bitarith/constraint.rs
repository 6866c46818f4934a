use log::debug;
use thiserror::Error;

use crate::bitarith_assert_simple;
use crate::bitvector::BitVectorId;
use crate::bitvector::BitVectorStore;
use crate::engine::Assignments;
use crate::engine::ConstraintId;
use crate::engine::DomainEvents;
use crate::engine::NotificationEngine;
use crate::engine::Row;
use crate::engine::VarId;

/// The arithmetic operations a constraint can be created over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    /// `result == operand1 + operand2` (modulo nothing; the result must be wide enough).
    Add,
    /// `result == operand1 - operand2`, normalized to an addition at construction.
    Sub,
    /// `result == 1` iff `operand1 == operand2`; the result is a single bit.
    Eq,
    /// Left shift. Declared but not handled by this constraint handler.
    Shl,
    /// Bitwise negation. Declared but not handled by this constraint handler.
    Not,
}

impl ArithOp {
    /// The number of operand bit-vectors the operation takes, result excluded.
    pub fn arity(self) -> usize {
        match self {
            ArithOp::Add | ArithOp::Sub | ArithOp::Eq | ArithOp::Shl => 2,
            ArithOp::Not => 1,
        }
    }
}

/// The internal shape of a constraint after normalization: subtractions are stored as
/// additions with the roles of `operand1` and `result` exchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithKind {
    Add,
    Eq,
}

/// A rejected constraint creation request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArithError {
    #[error("operation {op:?} takes {expected} operands, got {got}")]
    WrongArity {
        op: ArithOp,
        expected: usize,
        got: usize,
    },
    #[error("operation {0:?} is not handled by the bit-arithmetic constraint handler")]
    UnsupportedOperation(ArithOp),
    #[error("operand {operand} is wider than the result ({operand_bits} > {result_bits} bits)")]
    OperandWiderThanResult {
        operand: String,
        operand_bits: usize,
        result_bits: usize,
    },
    #[error("the result of an equality test must be a single bit, got {0} bits")]
    EqualityResultNotSingleBit(usize),
}

/// A bit-arithmetic constraint: `result == operand1 + operand2` over the word decomposition
/// of `result`, or the reified equality `result <-> (operand1 == operand2)`.
#[derive(Debug)]
pub struct ArithConstraint {
    pub(super) name: String,
    pub(super) kind: ArithKind,
    pub(super) operand1: BitVectorId,
    pub(super) operand2: BitVectorId,
    pub(super) result: BitVectorId,
    /// For additions: one carry variable per word of `result`, the carry out of that word.
    /// The carry into word 0 is identically zero and has no variable.
    pub(super) carry_vars: Vec<VarId>,
    /// The relaxation rows, built lazily on first demand.
    pub(super) rows: Option<Vec<Row>>,
    /// Fixpoint flag: set after a completed propagation pass, cleared when a watched
    /// variable changes.
    pub(super) propagated: bool,
    /// Cleared when propagation proves the constraint vacuous in the current subtree.
    pub(super) active: bool,
    pub(super) deleted: bool,
    /// Rounding locks this constraint holds on each scope variable.
    pub(super) n_locks: u32,
}

impl ArithConstraint {
    /// Validates and normalizes a creation request.
    ///
    /// Subtractions `result == operand1 - operand2` are stored as the equivalent addition
    /// `operand1 == result + operand2`. Operations outside {Add, Sub, Eq} are rejected, as
    /// are operands wider than the (normalized) result and multi-bit equality results.
    /// All three bit-vectors are captured on success.
    pub fn new(
        name: String,
        op: ArithOp,
        operand1: BitVectorId,
        operand2: Option<BitVectorId>,
        result: BitVectorId,
        bit_vectors: &mut BitVectorStore,
    ) -> Result<ArithConstraint, ArithError> {
        let got = 1 + usize::from(operand2.is_some());
        if got != op.arity() {
            return Err(ArithError::WrongArity {
                op,
                expected: op.arity(),
                got,
            });
        }

        let (kind, operand1, operand2, result) = match (op, operand2) {
            (ArithOp::Add, Some(operand2)) => (ArithKind::Add, operand1, operand2, result),
            // z == x - y is the same relation as x == z + y.
            (ArithOp::Sub, Some(operand2)) => (ArithKind::Add, result, operand2, operand1),
            (ArithOp::Eq, Some(operand2)) => (ArithKind::Eq, operand1, operand2, result),
            _ => return Err(ArithError::UnsupportedOperation(op)),
        };

        match kind {
            ArithKind::Add => {
                for operand in [operand1, operand2] {
                    if bit_vectors.n_bits(operand) > bit_vectors.n_bits(result) {
                        return Err(ArithError::OperandWiderThanResult {
                            operand: bit_vectors.name(operand).to_owned(),
                            operand_bits: bit_vectors.n_bits(operand),
                            result_bits: bit_vectors.n_bits(result),
                        });
                    }
                }
            }
            ArithKind::Eq => {
                if bit_vectors.n_bits(result) != 1 {
                    return Err(ArithError::EqualityResultNotSingleBit(
                        bit_vectors.n_bits(result),
                    ));
                }
            }
        }

        bit_vectors.capture(operand1);
        bit_vectors.capture(operand2);
        bit_vectors.capture(result);

        Ok(ArithConstraint {
            name,
            kind,
            operand1,
            operand2,
            result,
            carry_vars: Vec::new(),
            rows: None,
            propagated: false,
            active: true,
            deleted: false,
            n_locks: 0,
        })
    }

    /// Transforms the constraint into its solving form: binds the operands to their active
    /// representatives, creates the per-word carry variables for additions, subscribes to
    /// bound changes on the full scope and locks every scope variable in both directions.
    pub fn transform(
        &mut self,
        id: ConstraintId,
        assignments: &mut Assignments,
        bit_vectors: &mut BitVectorStore,
        notifications: &mut NotificationEngine,
    ) {
        self.bind_operands(id, assignments, bit_vectors, notifications);

        if self.kind == ArithKind::Add && self.carry_vars.is_empty() {
            self.carry_vars = (0..bit_vectors.n_words(self.result))
                .map(|_| assignments.grow_binary())
                .collect();
        }

        for var in self.scope_vars(bit_vectors) {
            notifications.subscribe(var, id, DomainEvents::ANY);
        }
        self.lock(assignments, bit_vectors, 1);

        debug!(
            "transformed {}: {:?} over {} result bits",
            self.name,
            self.kind,
            bit_vectors.n_bits(self.result)
        );
    }

    /// Re-resolves each operand bit-vector to its active representative, moving
    /// subscriptions, locks and captures from the old entity to the new one. New bindings
    /// are established before the old ones are dropped.
    pub fn bind_operands(
        &mut self,
        id: ConstraintId,
        assignments: &mut Assignments,
        bit_vectors: &mut BitVectorStore,
        notifications: &mut NotificationEngine,
    ) {
        let operand1 = self.rebind(self.operand1, id, assignments, bit_vectors, notifications);
        self.operand1 = operand1;
        let operand2 = self.rebind(self.operand2, id, assignments, bit_vectors, notifications);
        self.operand2 = operand2;
        let result = self.rebind(self.result, id, assignments, bit_vectors, notifications);
        self.result = result;
    }

    fn rebind(
        &mut self,
        old: BitVectorId,
        id: ConstraintId,
        assignments: &mut Assignments,
        bit_vectors: &mut BitVectorStore,
        notifications: &mut NotificationEngine,
    ) -> BitVectorId {
        let new = bit_vectors.active_representative(old);
        if new == old {
            return old;
        }

        bit_vectors.capture(new);
        for &var in bit_vectors.bits(new) {
            notifications.subscribe(var, id, DomainEvents::ANY);
            if self.n_locks > 0 {
                assignments.lock_both(var, self.n_locks);
            }
        }
        for &var in bit_vectors.bits(old) {
            if self.n_locks > 0 {
                assignments.unlock_both(var, self.n_locks);
            }
            notifications.unsubscribe(var, id);
        }
        bit_vectors.release(old);

        debug!(
            "{}: rebound {} to representative {}",
            self.name,
            bit_vectors.name(old),
            bit_vectors.name(new)
        );
        self.propagated = false;
        new
    }

    /// Releases everything the constraint holds: subscriptions, locks and bit-vector
    /// captures. The constraint is deleted afterwards.
    pub fn free(
        &mut self,
        id: ConstraintId,
        assignments: &mut Assignments,
        bit_vectors: &mut BitVectorStore,
        notifications: &mut NotificationEngine,
    ) {
        if self.n_locks > 0 {
            let n_locks = self.n_locks;
            self.unlock(assignments, bit_vectors, n_locks);
        }
        for var in self.scope_vars(bit_vectors) {
            notifications.unsubscribe(var, id);
        }
        bit_vectors.release(self.operand1);
        bit_vectors.release(self.operand2);
        bit_vectors.release(self.result);
        self.deleted = true;
        self.active = false;
    }

    /// Adds `n` rounding locks in both directions on every scope variable. The relations are
    /// equalities, so rounding any participant in either direction can destroy feasibility.
    pub fn lock(&mut self, assignments: &mut Assignments, bit_vectors: &BitVectorStore, n: u32) {
        for var in self.scope_vars(bit_vectors) {
            assignments.lock_both(var, n);
        }
        self.n_locks += n;
    }

    pub fn unlock(&mut self, assignments: &mut Assignments, bit_vectors: &BitVectorStore, n: u32) {
        bitarith_assert_simple!(self.n_locks >= n, "unlocking more locks than held");
        for var in self.scope_vars(bit_vectors) {
            assignments.unlock_both(var, n);
        }
        self.n_locks -= n;
    }

    /// Every binary variable the constraint reasons over: the bits of the three bit-vectors
    /// plus the carry variables.
    pub fn scope_vars(&self, bit_vectors: &BitVectorStore) -> Vec<VarId> {
        let mut scope = Vec::with_capacity(
            bit_vectors.n_bits(self.operand1)
                + bit_vectors.n_bits(self.operand2)
                + bit_vectors.n_bits(self.result)
                + self.carry_vars.len(),
        );
        scope.extend_from_slice(bit_vectors.bits(self.operand1));
        scope.extend_from_slice(bit_vectors.bits(self.operand2));
        scope.extend_from_slice(bit_vectors.bits(self.result));
        scope.extend_from_slice(&self.carry_vars);
        scope
    }

    /// The carry variable feeding bit position `position` of the ripple chain, if the
    /// position is a word boundary of `result`. Position 0 has no variable (the carry into
    /// the chain is identically zero), and interior positions carry no materialized
    /// variable either.
    pub(super) fn carry_var_at(
        &self,
        position: usize,
        n_bits: usize,
        word_size: usize,
    ) -> Option<VarId> {
        if position == 0 {
            return None;
        }
        if position == n_bits {
            return self.carry_vars.last().copied();
        }
        if position % word_size == 0 {
            return Some(self.carry_vars[position / word_size - 1]);
        }
        None
    }

    pub fn kind(&self) -> ArithKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operand1(&self) -> BitVectorId {
        self.operand1
    }

    pub fn operand2(&self) -> BitVectorId {
        self.operand2
    }

    pub fn result(&self) -> BitVectorId {
        self.result
    }

    pub fn carry_var(&self, word: usize) -> VarId {
        self.carry_vars[word]
    }

    pub fn num_carry_vars(&self) -> usize {
        self.carry_vars.len()
    }

    pub fn is_propagated(&self) -> bool {
        self.propagated
    }

    /// Marks the constraint dirty again; invoked by the notification engine when a watched
    /// variable changes.
    pub fn clear_propagated(&mut self) {
        self.propagated = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn has_rows(&self) -> bool {
        self.rows.is_some()
    }

    /// The relaxation rows, empty until [`ArithConstraint::ensure_rows`] has run.
    pub fn rows(&self) -> &[Row] {
        self.rows.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Assignments, BitVectorStore, NotificationEngine) {
        (
            Assignments::default(),
            BitVectorStore::default(),
            NotificationEngine::default(),
        )
    }

    #[test]
    fn subtraction_is_normalized_to_an_addition() {
        let (mut assignments, mut bit_vectors, _) = setup();
        let x = bit_vectors.create(&mut assignments, "x", 4, 4);
        let y = bit_vectors.create(&mut assignments, "y", 4, 4);
        let z = bit_vectors.create(&mut assignments, "z", 4, 4);

        // z == x - y becomes x == z + y.
        let constraint =
            ArithConstraint::new("sub".to_owned(), ArithOp::Sub, x, Some(y), z, &mut bit_vectors)
                .expect("valid request");
        assert_eq!(constraint.kind(), ArithKind::Add);
        assert_eq!(constraint.operand1(), z);
        assert_eq!(constraint.operand2(), y);
        assert_eq!(constraint.result(), x);
    }

    #[test]
    fn unsupported_operations_are_rejected() {
        let (mut assignments, mut bit_vectors, _) = setup();
        let x = bit_vectors.create(&mut assignments, "x", 4, 4);
        let y = bit_vectors.create(&mut assignments, "y", 4, 4);
        let z = bit_vectors.create(&mut assignments, "z", 4, 4);

        let shl =
            ArithConstraint::new("shl".to_owned(), ArithOp::Shl, x, Some(y), z, &mut bit_vectors);
        assert_eq!(shl.err(), Some(ArithError::UnsupportedOperation(ArithOp::Shl)));

        let not = ArithConstraint::new("not".to_owned(), ArithOp::Not, x, None, z, &mut bit_vectors);
        assert_eq!(not.err(), Some(ArithError::UnsupportedOperation(ArithOp::Not)));
    }

    #[test]
    fn arity_is_validated_before_the_operation() {
        let (mut assignments, mut bit_vectors, _) = setup();
        let x = bit_vectors.create(&mut assignments, "x", 4, 4);
        let z = bit_vectors.create(&mut assignments, "z", 4, 4);

        let unary =
            ArithConstraint::new("add".to_owned(), ArithOp::Add, x, None, z, &mut bit_vectors);
        assert_eq!(
            unary.err(),
            Some(ArithError::WrongArity {
                op: ArithOp::Add,
                expected: 2,
                got: 1,
            })
        );
    }

    #[test]
    fn an_operand_wider_than_the_result_is_rejected() {
        let (mut assignments, mut bit_vectors, _) = setup();
        let wide = bit_vectors.create(&mut assignments, "wide", 6, 4);
        let y = bit_vectors.create(&mut assignments, "y", 4, 4);
        let z = bit_vectors.create(&mut assignments, "z", 4, 4);

        let add = ArithConstraint::new(
            "add".to_owned(),
            ArithOp::Add,
            wide,
            Some(y),
            z,
            &mut bit_vectors,
        );
        assert_eq!(
            add.err(),
            Some(ArithError::OperandWiderThanResult {
                operand: "wide".to_owned(),
                operand_bits: 6,
                result_bits: 4,
            })
        );
    }

    #[test]
    fn equality_requires_a_single_result_bit() {
        let (mut assignments, mut bit_vectors, _) = setup();
        let x = bit_vectors.create(&mut assignments, "x", 4, 4);
        let y = bit_vectors.create(&mut assignments, "y", 4, 4);
        let r = bit_vectors.create(&mut assignments, "r", 2, 4);

        let eq = ArithConstraint::new("eq".to_owned(), ArithOp::Eq, x, Some(y), r, &mut bit_vectors);
        assert_eq!(eq.err(), Some(ArithError::EqualityResultNotSingleBit(2)));
    }

    #[test]
    fn transform_creates_one_carry_per_word_and_locks_the_scope() {
        let (mut assignments, mut bit_vectors, mut notifications) = setup();
        let x = bit_vectors.create(&mut assignments, "x", 10, 4);
        let y = bit_vectors.create(&mut assignments, "y", 10, 4);
        let z = bit_vectors.create(&mut assignments, "z", 10, 4);

        let mut constraint =
            ArithConstraint::new("add".to_owned(), ArithOp::Add, x, Some(y), z, &mut bit_vectors)
                .expect("valid request");
        constraint.transform(
            ConstraintId { id: 0 },
            &mut assignments,
            &mut bit_vectors,
            &mut notifications,
        );

        assert_eq!(constraint.num_carry_vars(), 3);
        assert_eq!(assignments.lock_count(bit_vectors.bit(x, 0)), (1, 1));
        assert_eq!(assignments.lock_count(constraint.carry_var(2)), (1, 1));
    }

    #[test]
    fn freeing_returns_locks_and_captures() {
        let (mut assignments, mut bit_vectors, mut notifications) = setup();
        let x = bit_vectors.create(&mut assignments, "x", 4, 4);
        let y = bit_vectors.create(&mut assignments, "y", 4, 4);
        let z = bit_vectors.create(&mut assignments, "z", 4, 4);

        let mut constraint =
            ArithConstraint::new("add".to_owned(), ArithOp::Add, x, Some(y), z, &mut bit_vectors)
                .expect("valid request");
        constraint.transform(
            ConstraintId { id: 0 },
            &mut assignments,
            &mut bit_vectors,
            &mut notifications,
        );
        assert_eq!(bit_vectors.use_count(x), 2);

        constraint.free(
            ConstraintId { id: 0 },
            &mut assignments,
            &mut bit_vectors,
            &mut notifications,
        );

        assert!(constraint.is_deleted());
        assert_eq!(bit_vectors.use_count(x), 1);
        assert_eq!(assignments.lock_count(bit_vectors.bit(x, 0)), (0, 0));
    }

    #[test]
    fn carry_variables_sit_at_word_boundaries_only() {
        let (mut assignments, mut bit_vectors, mut notifications) = setup();
        let x = bit_vectors.create(&mut assignments, "x", 10, 4);
        let y = bit_vectors.create(&mut assignments, "y", 10, 4);
        let z = bit_vectors.create(&mut assignments, "z", 10, 4);

        let mut constraint =
            ArithConstraint::new("add".to_owned(), ArithOp::Add, x, Some(y), z, &mut bit_vectors)
                .expect("valid request");
        constraint.transform(
            ConstraintId { id: 0 },
            &mut assignments,
            &mut bit_vectors,
            &mut notifications,
        );

        assert_eq!(constraint.carry_var_at(0, 10, 4), None);
        assert_eq!(constraint.carry_var_at(3, 10, 4), None);
        assert_eq!(
            constraint.carry_var_at(4, 10, 4),
            Some(constraint.carry_var(0))
        );
        assert_eq!(
            constraint.carry_var_at(8, 10, 4),
            Some(constraint.carry_var(1))
        );
        // The chain's top carry sits at the partial last word's end.
        assert_eq!(
            constraint.carry_var_at(10, 10, 4),
            Some(constraint.carry_var(2))
        );
    }
}
