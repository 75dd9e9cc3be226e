pub mod cg;
pub mod common;

pub use cg::{ConjugateGradient, GridContext, IterationReport};
