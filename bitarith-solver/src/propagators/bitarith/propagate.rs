use log::trace;

use crate::basic_types::fix_bit_state;
use crate::basic_types::BitState;
use crate::basic_types::ConstraintConflict;
use crate::basic_types::Inconsistency;
use crate::basic_types::PropagationOutcome;
use crate::basic_types::PropagationStatus;
use crate::bitarith_assert_moderate;
use crate::bitvector::BitVectorStore;
use crate::engine::analyze_conflict;
use crate::engine::Assignments;
use crate::engine::EmptyDomain;
use crate::engine::VarId;
use crate::propagators::bitarith::ArithConstraint;
use crate::propagators::bitarith::ArithKind;

/// The three-valued states of an addition's ripple chain, indexed by bit position of the
/// result. Carries have one extra slot: `carry[b]` feeds bit `b`, and `carry[n]` is the
/// carry out of the whole chain.
///
/// The states mirror the variable domains for variable-backed quantities; interior carries
/// (not on a word boundary) and operand bits beyond the declared width live only here.
#[derive(Debug)]
pub(super) struct RippleState {
    pub(super) operand1: Vec<BitState>,
    pub(super) operand2: Vec<BitState>,
    pub(super) result: Vec<BitState>,
    pub(super) carry: Vec<BitState>,
    pub(super) n_fixings: u32,
}

/// One of the five quantities of the ripple equation at a bit position:
/// `operand1_b + operand2_b + carry_b == result_b + 2 * carry_{b+1}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Quantity {
    Operand1,
    Operand2,
    CarryIn,
    Result,
    CarryOut,
}

impl ArithConstraint {
    /// Runs domain propagation if the constraint is active and not already at a fixpoint.
    pub fn propagate(
        &mut self,
        assignments: &mut Assignments,
        bit_vectors: &BitVectorStore,
    ) -> PropagationStatus {
        if self.deleted || !self.active || self.propagated {
            return Ok(PropagationOutcome::default());
        }

        let outcome = match self.kind {
            ArithKind::Add => self.propagate_add(assignments, bit_vectors)?,
            ArithKind::Eq => self.propagate_eq(assignments, bit_vectors)?,
        };
        self.propagated = true;

        trace!("{}: propagation fixed {} bits", self.name, outcome.n_fixings);
        Ok(outcome)
    }

    fn propagate_add(
        &mut self,
        assignments: &mut Assignments,
        bit_vectors: &BitVectorStore,
    ) -> Result<PropagationOutcome, Inconsistency> {
        let mut state = self.load_ripple_state(assignments, bit_vectors);
        self.saturate_ripple(&mut state, assignments, bit_vectors)?;

        let mut redundant = false;
        if bit_vectors.is_constant(assignments, self.operand1)
            && bit_vectors.is_constant(assignments, self.operand2)
        {
            // Both operands reduced to constants, so the chain has forced the result and all
            // carries; nothing is left to enforce in this subtree.
            bitarith_assert_moderate!(
                bit_vectors.is_constant(assignments, self.result),
                "constant operands must force the result"
            );
            self.active = false;
            redundant = true;
        }

        Ok(PropagationOutcome {
            n_fixings: state.n_fixings,
            redundant,
        })
    }

    /// Loads the current domains into a ripple state. Operand bits beyond the declared width
    /// read as fixed zero, as does the carry into bit 0. Carries at interior positions start
    /// unfixed; carries on word boundaries mirror their variable.
    pub(super) fn load_ripple_state(
        &self,
        assignments: &Assignments,
        bit_vectors: &BitVectorStore,
    ) -> RippleState {
        let n = bit_vectors.n_bits(self.result);
        let word_size = bit_vectors.word_size(self.result);

        let carry = (0..=n)
            .map(|position| {
                if position == 0 {
                    BitState::FixedZero
                } else {
                    match self.carry_var_at(position, n, word_size) {
                        Some(var) => assignments.bit_state(var),
                        None => BitState::Unfixed,
                    }
                }
            })
            .collect();

        RippleState {
            operand1: (0..n)
                .map(|b| bit_vectors.bit_state(assignments, self.operand1, b))
                .collect(),
            operand2: (0..n)
                .map(|b| bit_vectors.bit_state(assignments, self.operand2, b))
                .collect(),
            result: (0..n)
                .map(|b| bit_vectors.bit_state(assignments, self.result, b))
                .collect(),
            carry,
            n_fixings: 0,
        }
    }

    /// Saturates the ripple chain: sweeps the bits from least to most significant, and
    /// whenever a deduction newly fixes the carry into a bit, re-examines the bit below it
    /// (whose carry out just became known). Every deduction is pushed onto the backing
    /// variable where one exists.
    pub(super) fn saturate_ripple(
        &self,
        state: &mut RippleState,
        assignments: &mut Assignments,
        bit_vectors: &BitVectorStore,
    ) -> Result<(), Inconsistency> {
        let n = state.result.len();
        let mut revisit = Vec::new();
        for bit in 0..n {
            revisit.push(bit);
            while let Some(b) = revisit.pop() {
                if self.apply_ripple_rules(b, state, assignments, bit_vectors)? && b > 0 {
                    revisit.push(b - 1);
                }
            }
        }
        Ok(())
    }

    /// Applies every deduction rule to bit `b` of the chain. Returns whether the carry into
    /// `b` was newly fixed, which obliges the caller to re-examine bit `b - 1`.
    fn apply_ripple_rules(
        &self,
        b: usize,
        state: &mut RippleState,
        assignments: &mut Assignments,
        bit_vectors: &BitVectorStore,
    ) -> Result<bool, Inconsistency> {
        let mut incoming_newly_fixed = false;

        let x = state.operand1[b];
        let y = state.operand2[b];
        let cin = state.carry[b];
        let r = state.result[b];
        let n_fixed = [x, y, cin, r].iter().filter(|s| s.is_fixed()).count();

        if n_fixed == 4 {
            let residual =
                x.lower_bound() + y.lower_bound() + cin.lower_bound() - r.lower_bound();
            if residual != 0 && residual != 2 {
                // The bit equation has no value of carry_{b+1} left to absorb the imbalance.
                return Err(self.conflict(assignments, bit_vectors));
            }
            let _ =
                self.force(state, b, Quantity::CarryOut, residual / 2, assignments, bit_vectors)?;
        } else if n_fixed == 3 {
            let summands = x.lower_bound() + y.lower_bound() + cin.lower_bound();
            if !r.is_fixed() {
                // All three summands are known: parity gives the result bit, the sum's
                // overflow gives the outgoing carry.
                let _ =
                    self.force(state, b, Quantity::Result, summands % 2, assignments, bit_vectors)?;
                let _ = self.force(
                    state,
                    b,
                    Quantity::CarryOut,
                    summands / 2,
                    assignments,
                    bit_vectors,
                )?;
            } else {
                // One summand is unknown; parity with the result bit determines it.
                let result_value = r.lower_bound();
                let unknown_value = (result_value - summands).rem_euclid(2);
                let unknown = if !x.is_fixed() {
                    Quantity::Operand1
                } else if !y.is_fixed() {
                    Quantity::Operand2
                } else {
                    Quantity::CarryIn
                };
                let newly = self.force(state, b, unknown, unknown_value, assignments, bit_vectors)?;
                if unknown == Quantity::CarryIn {
                    incoming_newly_fixed |= newly;
                }
                let carry_out = (summands + unknown_value - result_value) / 2;
                let _ =
                    self.force(state, b, Quantity::CarryOut, carry_out, assignments, bit_vectors)?;
            }
        } else {
            // Interval reasoning on the partial sum x + y + cin - r: when its maximum stays
            // at or below 1 the outgoing carry cannot be set, and when its minimum reaches 1
            // the outgoing carry must be set.
            let sum_max =
                x.upper_bound() + y.upper_bound() + cin.upper_bound() - r.lower_bound();
            let sum_min =
                x.lower_bound() + y.lower_bound() + cin.lower_bound() - r.upper_bound();
            if sum_max <= 1 {
                let _ = self.force(state, b, Quantity::CarryOut, 0, assignments, bit_vectors)?;
            } else if sum_min >= 1 {
                let _ = self.force(state, b, Quantity::CarryOut, 1, assignments, bit_vectors)?;
            }
        }

        // Overflow rules: once the outgoing carry is known, an extreme result bit or summand
        // pins down the rest of the bit equation. With carry out 0 the summands sum to the
        // result bit; with carry out 1 they sum to result + 2.
        if let Some(carry_out) = state.carry[b + 1].bit_value() {
            if state.result[b].bit_value() == Some(carry_out) {
                // x + y + cin equals carry_out (mod nothing): each summand equals carry_out.
                for quantity in [Quantity::Operand1, Quantity::Operand2, Quantity::CarryIn] {
                    let newly =
                        self.force(state, b, quantity, carry_out, assignments, bit_vectors)?;
                    if quantity == Quantity::CarryIn {
                        incoming_newly_fixed |= newly;
                    }
                }
            }

            let witness = 1 - carry_out;
            let summand_states = [
                (Quantity::Operand1, state.operand1[b]),
                (Quantity::Operand2, state.operand2[b]),
                (Quantity::CarryIn, state.carry[b]),
            ];
            if summand_states.iter().any(|&(_, s)| s.bit_value() == Some(witness)) {
                // One summand sits at the extreme opposite the carry: the other two summands
                // must equal the carry, and the result bit must match the extreme.
                for (quantity, current) in summand_states {
                    if current.bit_value() == Some(witness) {
                        continue;
                    }
                    let newly =
                        self.force(state, b, quantity, carry_out, assignments, bit_vectors)?;
                    if quantity == Quantity::CarryIn {
                        incoming_newly_fixed |= newly;
                    }
                }
                let _ = self.force(state, b, Quantity::Result, witness, assignments, bit_vectors)?;
            }
        }

        Ok(incoming_newly_fixed)
    }

    /// Fixes one quantity of the bit equation at `bit` in the ripple state, mirroring the
    /// fixing onto the backing variable where one exists. Returns whether the quantity was
    /// newly fixed.
    fn force(
        &self,
        state: &mut RippleState,
        bit: usize,
        quantity: Quantity,
        value: i32,
        assignments: &mut Assignments,
        bit_vectors: &BitVectorStore,
    ) -> Result<bool, Inconsistency> {
        let n = state.result.len();
        let word_size = bit_vectors.word_size(self.result);
        let var = match quantity {
            Quantity::Operand1 => bit_vectors.get_bit(self.operand1, bit),
            Quantity::Operand2 => bit_vectors.get_bit(self.operand2, bit),
            Quantity::Result => Some(bit_vectors.bit(self.result, bit)),
            Quantity::CarryIn => self.carry_var_at(bit, n, word_size),
            Quantity::CarryOut => self.carry_var_at(bit + 1, n, word_size),
        };
        let slot = match quantity {
            Quantity::Operand1 => &mut state.operand1[bit],
            Quantity::Operand2 => &mut state.operand2[bit],
            Quantity::Result => &mut state.result[bit],
            Quantity::CarryIn => &mut state.carry[bit],
            Quantity::CarryOut => &mut state.carry[bit + 1],
        };

        match fix_bit_state(slot, value) {
            Ok(newly_fixed) => {
                if newly_fixed {
                    if let Some(var) = var {
                        state.n_fixings +=
                            self.deduce_bin_var(assignments, bit_vectors, var, value)?;
                    }
                }
                Ok(newly_fixed)
            }
            Err(EmptyDomain) => {
                if let Some(var) = var {
                    // The backing variable holds the opposite value; this runs the conflict
                    // hook and reports the inconsistency.
                    let _ = self.deduce_bin_var(assignments, bit_vectors, var, value)?;
                }
                Err(Inconsistency::EmptyDomain)
            }
        }
    }

    /// Fixes a binary variable to a deduced value, counting new fixings. A variable already
    /// fixed to the opposite value triggers conflict analysis over the constraint's scope.
    pub(super) fn deduce_bin_var(
        &self,
        assignments: &mut Assignments,
        bit_vectors: &BitVectorStore,
        var: VarId,
        value: i32,
    ) -> Result<u32, Inconsistency> {
        match assignments.fix(var, value) {
            Ok(true) => Ok(1),
            Ok(false) => Ok(0),
            Err(EmptyDomain) => Err(self.conflict(assignments, bit_vectors)),
        }
    }

    /// Raises a conflict over the constraint's full variable scope, running the
    /// conflict-analysis entry point on the way out.
    pub(super) fn conflict(
        &self,
        assignments: &Assignments,
        bit_vectors: &BitVectorStore,
    ) -> Inconsistency {
        let scope = self.scope_vars(bit_vectors);
        let _ = analyze_conflict(assignments, &scope);
        ConstraintConflict { scope }.into()
    }

    /// Propagation of the reified equality.
    pub(super) fn propagate_eq(
        &mut self,
        assignments: &mut Assignments,
        bit_vectors: &BitVectorStore,
    ) -> Result<PropagationOutcome, Inconsistency> {
        let result_var = bit_vectors.bit(self.result, 0);
        let n = bit_vectors
            .n_bits(self.operand1)
            .max(bit_vectors.n_bits(self.operand2));
        let mut outcome = PropagationOutcome::default();

        if assignments.bit_state(result_var) == BitState::FixedOne {
            // The relation is an equality now: mirror every fixed bit onto its counterpart.
            for b in 0..n {
                let sx = bit_vectors.bit_state(assignments, self.operand1, b);
                let sy = bit_vectors.bit_state(assignments, self.operand2, b);
                match (sx.bit_value(), sy.bit_value()) {
                    (Some(vx), Some(vy)) if vx != vy => {
                        return Err(self.conflict(assignments, bit_vectors));
                    }
                    (Some(_), Some(_)) | (None, None) => {}
                    (Some(vx), None) => {
                        outcome.n_fixings += self.deduce_bin_var(
                            assignments,
                            bit_vectors,
                            bit_vectors.bit(self.operand2, b),
                            vx,
                        )?;
                    }
                    (None, Some(vy)) => {
                        outcome.n_fixings += self.deduce_bin_var(
                            assignments,
                            bit_vectors,
                            bit_vectors.bit(self.operand1, b),
                            vy,
                        )?;
                    }
                }
            }
            return Ok(outcome);
        }

        let mut open_pairs = 0;
        let mut last_open = None;
        for b in 0..n {
            let sx = bit_vectors.bit_state(assignments, self.operand1, b);
            let sy = bit_vectors.bit_state(assignments, self.operand2, b);
            match (sx.bit_value(), sy.bit_value()) {
                (Some(vx), Some(vy)) if vx != vy => {
                    // A fixed bit pair witnesses inequality: the result is decided and the
                    // constraint has nothing left to say.
                    outcome.n_fixings +=
                        self.deduce_bin_var(assignments, bit_vectors, result_var, 0)?;
                    self.active = false;
                    outcome.redundant = true;
                    return Ok(outcome);
                }
                (Some(_), Some(_)) => {}
                _ => {
                    open_pairs += 1;
                    last_open = Some(b);
                }
            }
        }

        if open_pairs == 0 {
            // Every bit pair is fixed and equal.
            outcome.n_fixings += self.deduce_bin_var(assignments, bit_vectors, result_var, 1)?;
            self.active = false;
            outcome.redundant = true;
        } else if open_pairs == 1 && assignments.bit_state(result_var) == BitState::FixedZero {
            // The vectors must differ, and only one bit pair can still provide the
            // difference: the unfixed side must complement the fixed side.
            if let Some(b) = last_open {
                let sx = bit_vectors.bit_state(assignments, self.operand1, b);
                let sy = bit_vectors.bit_state(assignments, self.operand2, b);
                match (sx.bit_value(), sy.bit_value()) {
                    (Some(vx), None) => {
                        outcome.n_fixings += self.deduce_bin_var(
                            assignments,
                            bit_vectors,
                            bit_vectors.bit(self.operand2, b),
                            1 - vx,
                        )?;
                        self.active = false;
                        outcome.redundant = true;
                    }
                    (None, Some(vy)) => {
                        outcome.n_fixings += self.deduce_bin_var(
                            assignments,
                            bit_vectors,
                            bit_vectors.bit(self.operand1, b),
                            1 - vy,
                        )?;
                        self.active = false;
                        outcome.redundant = true;
                    }
                    // Both sides are free; either assignment can still realize the
                    // difference.
                    _ => {}
                }
            }
        }

        Ok(outcome)
    }
}
