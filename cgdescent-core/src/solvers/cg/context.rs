use crate::error::{Error, Result};
use crate::services::DotResult;
use crate::solvers::common::trace::DescentTraceRecord;
use crate::state::{Grid, Role, StateFields, StateVector};

/// Step lengths carried from one inner iteration to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScalarIterationState {
    /// Trial step `tau(k)`.
    pub tau: f64,
    /// Optimal step `alpha(k)`.
    pub alpha: f64,
    /// Conjugate-direction coefficient `beta(k)`.
    pub beta: f64,
}

impl ScalarIterationState {
    pub(crate) fn reset(&mut self, initial_step: f64) {
        self.tau = initial_step;
        self.alpha = initial_step;
        self.beta = 0.0;
    }
}

/// Cost-function bookkeeping for the first-order Taylor correction.
///
/// `cost` is written by the caller after each tangent-linear run (the cost at
/// the trial point); `cost_grad_dot` is `<d,G>` from the previous iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct CostState {
    pub cost: DotResult,
    pub cost_grad_dot: DotResult,
}

impl CostState {
    pub fn new(n_groups: usize) -> Self {
        Self {
            cost: DotResult::zeros(n_groups),
            cost_grad_dot: DotResult::zeros(n_groups),
        }
    }

    /// `J(v) = J(vhat) - tau * <d,grad>` per group; returns the adjustment.
    pub(crate) fn apply_taylor_correction(&mut self, tau: f64) -> DotResult {
        let mut adjust = DotResult::zeros(self.cost_grad_dot.n_groups());
        for ((adj, cost), dot) in adjust
            .as_mut_slice()
            .iter_mut()
            .zip(self.cost.as_mut_slice())
            .zip(self.cost_grad_dot.as_slice())
        {
            *adj = tau * dot;
            *cost -= *adj;
        }
        adjust
    }
}

/// Lifecycle of a grid's descent state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No iteration has completed since the context was created, the last
    /// restart, or the last failed iteration.
    Uninitialized,
    /// Iterations `0..=last` have completed.
    Running { last: usize },
}

/// Everything the descent core owns for one grid during one optimization
/// run.
///
/// Slot usage:
/// - `adjoint[Old]`: accepted gradient `G(k)`
/// - `adjoint[New]`: trial gradient `Ghat(k)` on entry, `G(k+1)` on exit
/// - `tangent[Input]`: accepted iterate `X(k)`
/// - `tangent[Output]`: next trial iterate `Xhat(k+1)`
/// - `tangent[Work]`: history record scratch
#[derive(Clone, Debug)]
pub struct GridContext {
    pub(crate) grid: Grid,
    pub(crate) outer: usize,
    pub(crate) phase: Phase,
    pub(crate) scalars: ScalarIterationState,
    pub(crate) cost: CostState,
    pub(crate) tangent: StateVector,
    pub(crate) adjoint: StateVector,
    pub(crate) direction: StateFields,
    pub(crate) trace: Vec<DescentTraceRecord>,
}

impl GridContext {
    pub fn new(grid: Grid) -> Self {
        Self {
            outer: 0,
            phase: Phase::Uninitialized,
            scalars: ScalarIterationState::default(),
            cost: CostState::new(grid.n_groups()),
            tangent: StateVector::new(&grid),
            adjoint: StateVector::new(&grid),
            direction: grid.zero_state(),
            trace: Vec::new(),
            grid,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outer(&self) -> usize {
        self.outer
    }

    /// Outer-loop index used in descent reports.
    pub fn set_outer(&mut self, outer: usize) {
        self.outer = outer;
    }

    pub fn scalars(&self) -> &ScalarIterationState {
        &self.scalars
    }

    pub fn cost(&self) -> &CostState {
        &self.cost
    }

    /// Record the cost-function value (per group) from the latest
    /// tangent-linear run.
    pub fn set_cost(&mut self, cost: DotResult) -> Result<()> {
        if cost.n_groups() != self.grid.n_groups() {
            return Err(Error::shape(
                "cost function",
                format!("{} groups", self.grid.n_groups()),
                format!("{} groups", cost.n_groups()),
            ));
        }
        self.cost.cost = cost;
        Ok(())
    }

    pub fn tangent(&self) -> &StateVector {
        &self.tangent
    }

    pub fn adjoint(&self) -> &StateVector {
        &self.adjoint
    }

    pub fn direction(&self) -> &StateFields {
        &self.direction
    }

    /// Accepted iterate `X(k)`.
    pub fn accepted_state(&self) -> &StateFields {
        self.tangent.slot(Role::Input)
    }

    /// Trial iterate `Xhat(k+1)` the tangent-linear model should be run from.
    pub fn trial_state(&self) -> &StateFields {
        self.tangent.slot(Role::Output)
    }

    /// Current gradient after the last iteration (orthogonalized when
    /// orthogonalization is on).
    pub fn gradient(&self) -> &StateFields {
        self.adjoint.slot(Role::New)
    }

    /// Set the starting iterate `X(0)`.
    pub fn set_initial_state(&mut self, x: &StateFields) -> Result<()> {
        self.grid
            .copy_masked(self.tangent.slot_mut(Role::Input), x)
    }

    /// Hand over the adjoint gradient at the current trial point: `G(0)`
    /// before iteration 0, `Ghat(k)` before iteration `k > 0`.
    pub fn set_trial_gradient(&mut self, gradient: &StateFields) -> Result<()> {
        self.grid
            .copy_masked(self.adjoint.slot_mut(Role::New), gradient)
    }

    pub fn trace(&self) -> &[DescentTraceRecord] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<DescentTraceRecord> {
        std::mem::take(&mut self.trace)
    }

    /// Validate the iteration index and reset per-run state at iteration 0.
    pub(crate) fn begin(&mut self, iteration: usize, initial_step: f64) -> Result<()> {
        if iteration == 0 {
            self.phase = Phase::Uninitialized;
            self.scalars.reset(initial_step);
            self.cost.cost_grad_dot = DotResult::zeros(self.grid.n_groups());
            return Ok(());
        }
        match self.phase {
            Phase::Running { last } if last + 1 == iteration => Ok(()),
            Phase::Running { last } => Err(Error::OutOfSequence {
                grid: self.grid.id(),
                iteration,
                last: Some(last),
            }),
            Phase::Uninitialized => Err(Error::OutOfSequence {
                grid: self.grid.id(),
                iteration,
                last: None,
            }),
        }
    }
}
