mod bit_state;
mod results;
mod solution;

pub use bit_state::*;
pub use results::*;
pub use solution::*;
