pub mod step;
pub mod trace;
