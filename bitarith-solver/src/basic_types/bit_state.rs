use crate::bitarith_assert_simple;
use crate::engine::EmptyDomain;

/// The three-valued domain of a binary decision variable as seen by the bit-arithmetic
/// constraint handler.
///
/// The states carry a signed-integer encoding, exposed through [`BitState::signum`]:
/// `FixedZero = -1`, `Unfixed = 0`, `FixedOne = +1`. The encoding is chosen so that
/// `(signum + 1) / 2` recovers the 0/1 value of a fixed state and sums of states compose
/// directly with integer carry arithmetic. The conversion is deliberately localized to the
/// methods below; everything else manipulates the tagged enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitState {
    /// The bit is fixed to zero.
    FixedZero,
    /// The bit can still take either value.
    Unfixed,
    /// The bit is fixed to one.
    FixedOne,
}

impl BitState {
    /// The signed-integer encoding of the state: -1 / 0 / +1.
    pub fn signum(self) -> i32 {
        match self {
            BitState::FixedZero => -1,
            BitState::Unfixed => 0,
            BitState::FixedOne => 1,
        }
    }

    /// The state fixing a bit to `value`, which must be 0 or 1.
    pub fn from_bit(value: i32) -> BitState {
        bitarith_assert_simple!(
            value == 0 || value == 1,
            "a bit can only be fixed to 0 or 1, got {value}"
        );
        if value == 0 {
            BitState::FixedZero
        } else {
            BitState::FixedOne
        }
    }

    /// The 0/1 value of a fixed state, or `None` for [`BitState::Unfixed`].
    pub fn bit_value(self) -> Option<i32> {
        match self {
            BitState::Unfixed => None,
            // (signum + 1) / 2 maps the encoding back onto the bit value.
            fixed => Some((fixed.signum() + 1) / 2),
        }
    }

    pub fn is_fixed(self) -> bool {
        self != BitState::Unfixed
    }

    /// Tightest lower bound on the 0/1 value consistent with this state.
    pub fn lower_bound(self) -> i32 {
        self.signum().max(0)
    }

    /// Tightest upper bound on the 0/1 value consistent with this state.
    pub fn upper_bound(self) -> i32 {
        (self.signum() + 2) / 2
    }
}

/// Fixes `state` to `value` in place.
///
/// Returns `Ok(true)` if the state was [`BitState::Unfixed`] and is newly fixed, `Ok(false)`
/// if it was already fixed to `value`, and [`EmptyDomain`] if it was fixed to the opposite
/// value. Fixing to [`BitState::Unfixed`] is never requested.
pub fn fix_bit_state(state: &mut BitState, value: i32) -> Result<bool, EmptyDomain> {
    match state.bit_value() {
        None => {
            *state = BitState::from_bit(value);
            Ok(true)
        }
        Some(existing) if existing == value => Ok(false),
        Some(_) => Err(EmptyDomain),
    }
}
