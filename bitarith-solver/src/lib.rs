//! Bit-vector arithmetic constraints for branch-and-cut solving over binary variables.
//!
//! A bit-vector is a fixed-width unsigned integer decomposed into binary decision variables,
//! grouped into words of a configurable size. The [`propagators::bitarith`] constraint
//! handler supports addition (`result == operand1 + operand2`, with subtraction normalized
//! into it) and reified equality (`result <-> (operand1 == operand2)`), each backed by:
//!
//! - a linear relaxation with one equality row per result word, chained through explicit
//!   carry variables at the word boundaries;
//! - three-valued domain propagation along the ripple-carry equation
//!   `operand1_b + operand2_b + carry_b == result_b + 2 * carry_{b+1}`, saturated with
//!   backward revisits when a deduced carry reopens a lower bit;
//! - separation of violated relaxation rows as cutting planes; and
//! - presolving that aggregates binary variables pairwise whenever the fixed part of a bit
//!   equation forces the two free quantities to be equal or complementary.

pub mod asserts;
pub mod basic_types;
pub mod bitvector;
pub mod containers;
pub mod engine;
pub mod propagators;
