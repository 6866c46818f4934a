//! The host-solver substrate the constraint handler is written against: the binary-variable
//! store, bound-change notifications, linear rows and the cut pool, presolve variable
//! aggregation, and the conflict-analysis entry point.
mod aggregation;
mod assignments;
mod conflict;
mod lp;
mod notifications;
pub(crate) mod test_solver;

pub use aggregation::*;
pub use assignments::*;
pub use conflict::*;
pub use lp::*;
pub use notifications::*;
