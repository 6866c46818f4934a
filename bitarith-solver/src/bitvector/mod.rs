//! The bit-vector variable abstraction: ordered collections of binary decision variables
//! representing fixed-width unsigned integers, grouped into words.
mod bit_vector;

pub use bit_vector::*;
