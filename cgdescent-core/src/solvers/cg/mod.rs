mod context;
mod orthogonalize;
mod solve;
mod types;

pub use context::{CostState, GridContext, Phase, ScalarIterationState};
pub use orthogonalize::{orthogonalize_against_history, OrthogonalizationReport, RecordProjection};
pub use types::{ConjugateGradient, IterationReport};
