//! The bit-vector arithmetic constraint handler: fixed-width addition with explicit carry
//! variables at word boundaries, and reified bit-vector equality.
//!
//! Each constraint carries its own LP relaxation (built lazily), a three-valued ripple-carry
//! propagator, separation of the relaxation rows as cutting planes, and presolving rewrites
//! that aggregate binary variables whenever a bit equation pins two free quantities to each
//! other.
mod aggregate;
mod check;
mod constraint;
mod propagate;
mod relaxation;
mod separate;

pub use constraint::*;
