//! cgdescent: conjugate-gradient descent core for incremental 4D-Var
//!
//! - `Grid` / `StateFields` / `StateVector`: masked ocean-state vectors and
//!   their role slots
//! - `DotProduct`: whole-domain inner product service
//! - `GradientHistory`: append-only store of accepted gradients
//! - `ConjugateGradient::advance`: one inner-loop iteration on a
//!   `GridContext`
//!
//! The caller runs the adjoint and tangent-linear models; this crate turns
//! their gradients into step sizes, a conjugate direction and the next trial
//! state.

pub mod error;
pub mod services;
pub mod solvers;
pub mod state;

pub use error::{Error, Result};
pub use services::{
    DirHistory, DotProduct, DotResult, GradientHistory, LocalDotProduct, MemoryHistory,
};
pub use solvers::cg::{
    orthogonalize_against_history, ConjugateGradient, CostState, GridContext, IterationReport,
    OrthogonalizationReport, Phase, RecordProjection, ScalarIterationState,
};
pub use solvers::common::trace::DescentTraceRecord;
pub use state::{Field, FieldGroup, Grid, GridId, MaskKind, Role, StateFields, StateVector};
