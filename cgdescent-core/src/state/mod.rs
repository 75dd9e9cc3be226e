//! Grid layout, state-shaped vectors and the masked kernels that update them.

mod fields;
mod grid;
mod ops;
mod slots;

pub use fields::{Field, FieldGroup, StateFields};
pub use grid::{Grid, GridId, MaskKind};
pub use slots::{Role, StateVector};
