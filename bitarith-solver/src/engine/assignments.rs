use crate::basic_types::BitState;
use crate::bitarith_assert_simple;
use crate::containers::KeyedVec;
use crate::containers::StorageKey;
use crate::engine::notifications::DomainEvent;

/// A binary decision variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId {
    pub id: u32,
}

impl StorageKey for VarId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        VarId { id: index as u32 }
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.id)
    }
}

/// A fixing emptied the domain of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmptyDomain;

/// The bounds and rounding locks of the binary decision variables, together with a buffer of
/// the bound-change events that have not been delivered to watchers yet.
#[derive(Clone, Debug, Default)]
pub struct Assignments {
    /// The current (lower, upper) bounds, each in {0, 1}.
    bounds: KeyedVec<VarId, (i32, i32)>,
    /// Rounding locks (down, up). The arithmetic relations are equalities, so constraints
    /// lock every participant in both directions.
    locks: KeyedVec<VarId, (u32, u32)>,
    /// Bound-change events not yet drained by the notification engine.
    events: Vec<(VarId, DomainEvent)>,
}

impl Assignments {
    /// Creates a new binary variable with the full {0, 1} domain.
    pub fn grow_binary(&mut self) -> VarId {
        let var = self.bounds.push((0, 1));
        let _ = self.locks.push((0, 0));
        var
    }

    pub fn num_variables(&self) -> usize {
        self.bounds.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = VarId> {
        self.bounds.keys()
    }

    pub fn lower_bound(&self, var: VarId) -> i32 {
        self.bounds[var].0
    }

    pub fn upper_bound(&self, var: VarId) -> i32 {
        self.bounds[var].1
    }

    pub fn is_fixed(&self, var: VarId) -> bool {
        let (lower, upper) = self.bounds[var];
        lower == upper
    }

    pub fn fixed_value(&self, var: VarId) -> Option<i32> {
        let (lower, upper) = self.bounds[var];
        (lower == upper).then_some(lower)
    }

    /// The three-valued view of the variable's domain.
    pub fn bit_state(&self, var: VarId) -> BitState {
        match self.bounds[var] {
            (0, 0) => BitState::FixedZero,
            (1, 1) => BitState::FixedOne,
            _ => BitState::Unfixed,
        }
    }

    /// Fixes the variable to `value`.
    ///
    /// Returns `Ok(true)` if the variable is newly fixed, `Ok(false)` if it was already fixed
    /// to `value`, and [`EmptyDomain`] if it was fixed to the opposite value. A new fixing
    /// raises [`DomainEvent::Fixed`] together with the tightened-bound event.
    pub fn fix(&mut self, var: VarId, value: i32) -> Result<bool, EmptyDomain> {
        bitarith_assert_simple!(
            value == 0 || value == 1,
            "a binary variable can only be fixed to 0 or 1, got {value}"
        );

        match self.fixed_value(var) {
            Some(existing) if existing == value => Ok(false),
            Some(_) => Err(EmptyDomain),
            None => {
                self.bounds[var] = (value, value);
                let bound_event = if value == 1 {
                    DomainEvent::LowerBound
                } else {
                    DomainEvent::UpperBound
                };
                self.events.push((var, bound_event));
                self.events.push((var, DomainEvent::Fixed));
                Ok(true)
            }
        }
    }

    /// Adds `n` rounding locks in both directions.
    pub fn lock_both(&mut self, var: VarId, n: u32) {
        let (down, up) = &mut self.locks[var];
        *down += n;
        *up += n;
    }

    /// Removes `n` rounding locks in both directions.
    pub fn unlock_both(&mut self, var: VarId, n: u32) {
        let (down, up) = &mut self.locks[var];
        bitarith_assert_simple!(*down >= n && *up >= n, "unlocking more locks than held");
        *down -= n;
        *up -= n;
    }

    pub fn lock_count(&self, var: VarId) -> (u32, u32) {
        self.locks[var]
    }

    /// Takes the buffered bound-change events for delivery.
    pub fn drain_events(&mut self) -> Vec<(VarId, DomainEvent)> {
        std::mem::take(&mut self.events)
    }
}
