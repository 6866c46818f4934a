use log::debug;

use crate::bitvector::BitVectorStore;
use crate::engine::Assignments;
use crate::engine::Row;
use crate::propagators::bitarith::ArithConstraint;
use crate::propagators::bitarith::ArithKind;

impl ArithConstraint {
    /// Builds the relaxation rows on first demand. Subsequent calls are no-ops.
    pub fn ensure_rows(&mut self, assignments: &Assignments, bit_vectors: &BitVectorStore) {
        if self.rows.is_some() {
            return;
        }
        let rows = match self.kind {
            ArithKind::Add => self.build_add_rows(bit_vectors),
            ArithKind::Eq => self.build_eq_rows(assignments, bit_vectors),
        };
        debug!("{}: built {} relaxation rows", self.name, rows.len());
        self.rows = Some(rows);
    }

    /// One equality row per word of the result:
    ///
    /// `-result_w - wordPower(w) * carry_w + operand1_w + operand2_w + carry_{w-1} == 0`
    ///
    /// where the `_w` terms are the bit expansions of word `w` weighted by `2^offset`.
    fn build_add_rows(&self, bit_vectors: &BitVectorStore) -> Vec<Row> {
        let word_size = bit_vectors.word_size(self.result);
        (0..bit_vectors.n_words(self.result))
            .map(|word| {
                let start = word * word_size;
                let width = bit_vectors.word_width(self.result, word);
                let mut row = Row::equality(format!("{}_word{}", self.name, word), 0.0);

                for offset in 0..width {
                    let bit = start + offset;
                    let weight = f64::from(2u32).powi(offset as i32);
                    row.add_term(bit_vectors.bit(self.result, bit), -weight);
                    if let Some(var) = bit_vectors.get_bit(self.operand1, bit) {
                        row.add_term(var, weight);
                    }
                    if let Some(var) = bit_vectors.get_bit(self.operand2, bit) {
                        row.add_term(var, weight);
                    }
                }
                if word > 0 {
                    row.add_term(self.carry_vars[word - 1], 1.0);
                }
                row.add_term(
                    self.carry_vars[word],
                    -bit_vectors.word_power(self.result, word),
                );
                row
            })
            .collect()
    }

    /// Two inequality rows per bit position, linking each operand bit pair to the result
    /// variable `r`:
    ///
    /// `operand1_b - operand2_b - r >= -1` and `operand1_b - operand2_b + r <= +1`.
    ///
    /// Both rows only bite as `r` approaches one. When the result is already fixed to zero
    /// the relaxation is vacuous and no rows are built; inequality is enforced by
    /// propagation alone.
    fn build_eq_rows(&self, assignments: &Assignments, bit_vectors: &BitVectorStore) -> Vec<Row> {
        let result_var = bit_vectors.bit(self.result, 0);
        if assignments.fixed_value(result_var) == Some(0) {
            return Vec::new();
        }

        let n = bit_vectors
            .n_bits(self.operand1)
            .max(bit_vectors.n_bits(self.operand2));
        let mut rows = Vec::with_capacity(2 * n);
        for b in 0..n {
            let mut lower = Row::greater_or_equal(format!("{}_bit{}_lb", self.name, b), -1.0);
            let mut upper = Row::less_or_equal(format!("{}_bit{}_ub", self.name, b), 1.0);
            if let Some(var) = bit_vectors.get_bit(self.operand1, b) {
                lower.add_term(var, 1.0);
                upper.add_term(var, 1.0);
            }
            if let Some(var) = bit_vectors.get_bit(self.operand2, b) {
                lower.add_term(var, -1.0);
                upper.add_term(var, -1.0);
            }
            lower.add_term(result_var, -1.0);
            upper.add_term(result_var, 1.0);
            rows.push(lower);
            rows.push(upper);
        }
        rows
    }
}
