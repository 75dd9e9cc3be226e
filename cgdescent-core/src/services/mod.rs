//! Collaborator interfaces the descent core consumes: the whole-domain inner
//! product and the gradient history store.

pub mod dot;
pub mod history;

pub use dot::{DotProduct, DotResult, LocalDotProduct};
pub use history::{DirHistory, GradientHistory, MemoryHistory};
