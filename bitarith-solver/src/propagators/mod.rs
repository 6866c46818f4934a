pub mod bitarith;
