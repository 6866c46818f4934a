use itertools::EitherOrBoth;
use itertools::Itertools;

use crate::basic_types::BitState;
use crate::basic_types::Solution;
use crate::bitarith_assert_moderate;
use crate::bitarith_assert_simple;
use crate::containers::KeyedVec;
use crate::containers::StorageKey;
use crate::engine::AggregationKind;
use crate::engine::AggregationOutcome;
use crate::engine::Aggregations;
use crate::engine::Assignments;
use crate::engine::EmptyDomain;
use crate::engine::VarId;

/// Identifies a bit-vector entity in the [`BitVectorStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitVectorId {
    pub id: u32,
}

impl StorageKey for BitVectorId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        BitVectorId { id: index as u32 }
    }
}

/// A fixed-width unsigned integer decomposed into binary decision variables, grouped into
/// words of `word_size` bits (the last word may be narrower).
#[derive(Debug)]
struct BitVector {
    name: String,
    /// The per-bit binary variables, least-significant bit first.
    bits: Vec<VarId>,
    word_size: usize,
    /// Shared-ownership use count; the entity is owned jointly by its own constraint and by
    /// every arithmetic constraint referencing it.
    uses: u32,
    /// Set when presolving proved this bit-vector interchangeable with another; all new
    /// bindings must go to the representative instead.
    representative: Option<BitVectorId>,
}

/// Storage for the bit-vector entities of the problem.
#[derive(Debug, Default)]
pub struct BitVectorStore {
    bit_vectors: KeyedVec<BitVectorId, BitVector>,
}

impl BitVectorStore {
    /// Creates a bit-vector of `n_bits` fresh binary variables.
    pub fn create(
        &mut self,
        assignments: &mut Assignments,
        name: &str,
        n_bits: usize,
        word_size: usize,
    ) -> BitVectorId {
        bitarith_assert_simple!(n_bits >= 1, "a bit-vector has at least one bit");
        bitarith_assert_simple!(
            (1..=32).contains(&word_size),
            "word size must be between 1 and 32 bits"
        );

        let bits = (0..n_bits).map(|_| assignments.grow_binary()).collect();
        self.bit_vectors.push(BitVector {
            name: name.to_owned(),
            bits,
            word_size,
            uses: 1,
            representative: None,
        })
    }

    pub fn name(&self, id: BitVectorId) -> &str {
        &self.bit_vectors[id].name
    }

    pub fn n_bits(&self, id: BitVectorId) -> usize {
        self.bit_vectors[id].bits.len()
    }

    pub fn word_size(&self, id: BitVectorId) -> usize {
        self.bit_vectors[id].word_size
    }

    /// The number of words the bit-vector spans.
    pub fn n_words(&self, id: BitVectorId) -> usize {
        self.n_bits(id).div_ceil(self.word_size(id))
    }

    /// The width in bits of word `w`; only the last word can be narrower than `word_size`.
    pub fn word_width(&self, id: BitVectorId, word: usize) -> usize {
        let start = word * self.word_size(id);
        bitarith_assert_moderate!(start < self.n_bits(id), "word index out of range");
        self.word_size(id).min(self.n_bits(id) - start)
    }

    /// The numeric weight of the carry out of word `w` into the next word: 2^(width of `w`).
    pub fn word_power(&self, id: BitVectorId, word: usize) -> f64 {
        f64::from(2u32).powi(self.word_width(id, word) as i32)
    }

    pub fn bits(&self, id: BitVectorId) -> &[VarId] {
        &self.bit_vectors[id].bits
    }

    pub fn bit(&self, id: BitVectorId, bit: usize) -> VarId {
        self.bit_vectors[id].bits[bit]
    }

    /// The variable backing bit `bit`, or `None` beyond the declared width.
    pub fn get_bit(&self, id: BitVectorId, bit: usize) -> Option<VarId> {
        self.bit_vectors[id].bits.get(bit).copied()
    }

    /// The three-valued state of bit `bit`; bits beyond the declared width are fixed zero.
    pub fn bit_state(&self, assignments: &Assignments, id: BitVectorId, bit: usize) -> BitState {
        match self.get_bit(id, bit) {
            Some(var) => assignments.bit_state(var),
            None => BitState::FixedZero,
        }
    }

    /// Whether every bit is fixed, i.e. the bit-vector reduces to a known constant.
    pub fn is_constant(&self, assignments: &Assignments, id: BitVectorId) -> bool {
        self.bits(id).iter().all(|&var| assignments.is_fixed(var))
    }

    /// The value of the `width` bits starting at `start` under `solution`, weighted relative
    /// to `start`. Bits beyond the declared width contribute zero.
    pub fn partial_value(
        &self,
        solution: &Solution,
        id: BitVectorId,
        start: usize,
        width: usize,
    ) -> f64 {
        let bits = self.bits(id);
        (start..start + width)
            .filter_map(|bit| bits.get(bit))
            .enumerate()
            .map(|(offset, &var)| solution.value(var) * f64::from(2u32).powi(offset as i32))
            .sum()
    }

    /// Registers another use of the bit-vector.
    pub fn capture(&mut self, id: BitVectorId) {
        self.bit_vectors[id].uses += 1;
    }

    /// Releases one use of the bit-vector.
    pub fn release(&mut self, id: BitVectorId) {
        let uses = &mut self.bit_vectors[id].uses;
        bitarith_assert_simple!(*uses > 0, "releasing a bit-vector that is not in use");
        *uses -= 1;
    }

    pub fn use_count(&self, id: BitVectorId) -> u32 {
        self.bit_vectors[id].uses
    }

    /// Follows representative redirections to the currently active entity.
    pub fn active_representative(&self, id: BitVectorId) -> BitVectorId {
        let mut current = id;
        while let Some(next) = self.bit_vectors[current].representative {
            current = next;
        }
        current
    }

    pub fn is_active(&self, id: BitVectorId) -> bool {
        self.bit_vectors[id].representative.is_none()
    }

    /// Declares two bit-vectors interchangeable. Usable only during presolving.
    ///
    /// Every common bit pair is aggregated equal; bits beyond the narrower width are fixed
    /// to zero. When the widths match, `other` is redirected to `target` so subsequent
    /// operand binding resolves to a single representative.
    pub fn equalize(
        &mut self,
        assignments: &mut Assignments,
        aggregations: &mut Aggregations,
        target: BitVectorId,
        other: BitVectorId,
    ) -> Result<AggregationOutcome, EmptyDomain> {
        bitarith_assert_simple!(
            self.is_active(target) && self.is_active(other),
            "equalize requires active representatives"
        );

        let mut outcome = AggregationOutcome::default();

        if target == other {
            return Ok(outcome);
        }

        let pairs: Vec<_> = self.bits(target)
            .iter()
            .copied()
            .zip_longest(self.bits(other).iter().copied())
            .collect();
        for pair in pairs {
            match pair {
                EitherOrBoth::Both(target_bit, other_bit) => {
                    outcome += aggregations.aggregate(
                        assignments,
                        target_bit,
                        other_bit,
                        AggregationKind::Equal,
                    )?;
                }
                EitherOrBoth::Left(excess) | EitherOrBoth::Right(excess) => {
                    if assignments.fix(excess, 0)? {
                        outcome.n_fixings += 1;
                    }
                }
            }
        }

        if self.n_bits(target) == self.n_bits(other) {
            self.bit_vectors[other].representative = Some(target);
        }

        Ok(outcome)
    }
}
