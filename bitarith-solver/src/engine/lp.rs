use crate::basic_types::Solution;
use crate::bitarith_assert_moderate;
use crate::engine::VarId;

/// A linear (in)equality over binary variables, valid for all integer-feasible points of the
/// constraint that owns it. Used both in the LP relaxation and as a cutting plane.
#[derive(Clone, Debug)]
pub struct Row {
    name: String,
    /// Lower bound on the activity; `None` for a one-sided `<=` row.
    lhs: Option<f64>,
    /// Upper bound on the activity; `None` for a one-sided `>=` row.
    rhs: Option<f64>,
    terms: Vec<(VarId, f64)>,
    /// Whether the row is currently part of the active linear system.
    in_lp: bool,
}

impl Row {
    pub fn equality(name: String, value: f64) -> Row {
        Row {
            name,
            lhs: Some(value),
            rhs: Some(value),
            terms: Vec::new(),
            in_lp: false,
        }
    }

    pub fn greater_or_equal(name: String, lhs: f64) -> Row {
        Row {
            name,
            lhs: Some(lhs),
            rhs: None,
            terms: Vec::new(),
            in_lp: false,
        }
    }

    pub fn less_or_equal(name: String, rhs: f64) -> Row {
        Row {
            name,
            lhs: None,
            rhs: Some(rhs),
            terms: Vec::new(),
            in_lp: false,
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        bitarith_assert_moderate!(
            coefficient != 0.0,
            "zero coefficients do not belong in a row"
        );
        self.terms.push((var, coefficient));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn is_in_lp(&self) -> bool {
        self.in_lp
    }

    /// The value of the row's linear form under `solution`.
    pub fn activity(&self, solution: &Solution) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coefficient)| coefficient * solution.value(var))
            .sum()
    }

    /// How far the activity lies outside [lhs, rhs]; zero when the row is satisfied.
    pub fn violation(&self, solution: &Solution) -> f64 {
        let activity = self.activity(solution);
        let below = self.lhs.map_or(0.0, |lhs| lhs - activity);
        let above = self.rhs.map_or(0.0, |rhs| activity - rhs);
        below.max(above).max(0.0)
    }
}

/// A relaxation row inserted as a cutting plane, with the violation score it was added at.
#[derive(Clone, Debug)]
pub struct Cut {
    pub row: Row,
    pub score: f64,
}

/// The cuts emitted during the current separation round.
#[derive(Debug, Default)]
pub struct CutPool {
    cuts: Vec<Cut>,
}

impl CutPool {
    /// Inserts `row` into the active linear system as a cutting plane.
    pub fn add_cut(&mut self, row: &mut Row, score: f64) {
        row.in_lp = true;
        self.cuts.push(Cut {
            row: row.clone(),
            score,
        });
    }

    pub fn num_cuts(&self) -> usize {
        self.cuts.len()
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::StorageKey;

    fn var(index: usize) -> VarId {
        VarId::create_from_index(index)
    }

    #[test]
    fn equality_row_violation_is_the_absolute_residual() {
        let mut solution = Solution::new(2);
        solution.set_value(var(0), 0.4);
        solution.set_value(var(1), 0.3);

        let mut row = Row::equality("r".to_owned(), 0.0);
        row.add_term(var(0), -1.0);
        row.add_term(var(1), 2.0);

        // activity = -0.4 + 0.6 = 0.2, equality at 0 -> violation 0.2
        assert!((row.violation(&solution) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn one_sided_rows_are_only_violated_on_their_side() {
        let mut solution = Solution::new(1);
        solution.set_value(var(0), 0.75);

        let mut le = Row::less_or_equal("le".to_owned(), 0.5);
        le.add_term(var(0), 1.0);
        assert!((le.violation(&solution) - 0.25).abs() < 1e-9);

        let mut ge = Row::greater_or_equal("ge".to_owned(), 0.5);
        ge.add_term(var(0), 1.0);
        assert_eq!(ge.violation(&solution), 0.0);
    }

    #[test]
    fn adding_a_cut_marks_the_row_as_in_lp() {
        let mut pool = CutPool::default();
        let mut row = Row::equality("cut".to_owned(), 0.0);
        row.add_term(var(0), 1.0);

        assert!(!row.is_in_lp());
        pool.add_cut(&mut row, 0.2);
        assert!(row.is_in_lp());
        assert_eq!(pool.num_cuts(), 1);
        assert_eq!(pool.cuts()[0].row.name(), "cut");
    }
}
