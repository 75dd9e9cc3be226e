use crate::error::Result;
use crate::services::{DotProduct, DotResult, GradientHistory};
use crate::solvers::common::step::{conjugate_beta, ensure_finite, optimal_step};
use crate::solvers::common::trace::{DescentTracer, TraceRow};
use crate::state::{Grid, Role, StateFields, StateVector};

use super::context::{GridContext, Phase};
use super::orthogonalize::{orthogonalize_against_history, OrthogonalizationReport};
use super::types::{ConjugateGradient, IterationReport};

impl ConjugateGradient {
    fn make_tracer(&self, ctx: &GridContext) -> DescentTracer {
        if self.collect_trace {
            DescentTracer::with_history(self.verbose, ctx.grid.id(), ctx.outer)
        } else {
            DescentTracer::new(self.verbose, ctx.grid.id(), ctx.outer)
        }
    }

    fn attach_trace(&self, ctx: &mut GridContext, tracer: DescentTracer) {
        if self.collect_trace {
            ctx.trace.extend(tracer.into_history());
        }
    }

    /// Run inner iteration `iteration` on one grid.
    ///
    /// On entry `ctx` must hold the adjoint gradient at the current trial
    /// point (see [`GridContext::set_trial_gradient`]) and, for `iteration >
    /// 0`, the cost at that point. On return it holds the accepted iterate,
    /// the new descent direction and the next trial iterate
    /// [`GridContext::trial_state`] to run the tangent-linear model from.
    ///
    /// Iteration 0 starts a new run and may be issued at any time; every
    /// other iteration must directly follow the last completed one. A call
    /// that fails after the context was touched aborts the run: the context
    /// goes back to [`Phase::Uninitialized`] and only iteration 0 is
    /// accepted next. Rejected iteration indices leave the context as is.
    pub fn advance<D, H>(
        &self,
        ctx: &mut GridContext,
        iteration: usize,
        dot: &D,
        history: &mut H,
    ) -> Result<IterationReport>
    where
        D: DotProduct + ?Sized,
        H: GradientHistory + ?Sized,
    {
        self.validate()?;
        ctx.begin(iteration, self.initial_step)?;
        let tracer = self.make_tracer(ctx);

        let result = if iteration == 0 {
            self.first_iteration(ctx, dot, history, &tracer)
        } else {
            self.next_iteration(ctx, iteration, dot, history, &tracer)
        };
        self.attach_trace(ctx, tracer);

        match result {
            Ok(report) => {
                ctx.phase = Phase::Running { last: iteration };
                Ok(report)
            }
            Err(err) => {
                tracing::warn!(
                    grid = %ctx.grid.id(),
                    iteration,
                    error = %err,
                    "descent run aborted"
                );
                ctx.phase = Phase::Uninitialized;
                Err(err)
            }
        }
    }

    fn first_iteration<D, H>(
        &self,
        ctx: &mut GridContext,
        dot: &D,
        history: &mut H,
        trace: &DescentTracer,
    ) -> Result<IterationReport>
    where
        D: DotProduct + ?Sized,
        H: GradientHistory + ?Sized,
    {
        let GridContext {
            grid,
            scalars,
            cost,
            tangent,
            adjoint,
            direction,
            ..
        } = ctx;

        // No blend: the accepted gradient is the incoming one.
        {
            let (old, new) = adjoint.pair_mut(Role::Old, Role::New);
            grid.mask_in_place(new);
            grid.copy_masked(old, new)?;
        }
        if self.record_gradients {
            history.store(grid, 1, adjoint.slot(Role::New))?;
        }

        let grad_dot = dot
            .dot(grid, adjoint.slot(Role::New), adjoint.slot(Role::New))?
            .total();
        let (tau, alpha, beta) = (scalars.tau, scalars.alpha, 0.0);
        scalars.beta = beta;

        grid.conjugate_direction(direction, adjoint.slot(Role::New), beta)?;
        cost.cost_grad_dot = dot.dot(grid, direction, adjoint.slot(Role::Old))?;
        next_trial(grid, tangent, direction, alpha)?;

        let report = IterationReport {
            iteration: 0,
            tau,
            alpha,
            beta,
            cost_adjust: DotResult::zeros(grid.n_groups()),
            dot_dir_grad: 0.0,
            dot_dir_trial: 0.0,
            grad_dot_old: grad_dot,
            grad_dot_new: grad_dot,
            cost_grad_dot: cost.cost_grad_dot.clone(),
            orthogonalization: None,
        };
        trace.emit(
            TraceRow::inner(0)
                .steps(tau, alpha, beta)
                .gradient_dots(grad_dot, grad_dot)
                .note("initialized"),
        );
        Ok(report)
    }

    fn next_iteration<D, H>(
        &self,
        ctx: &mut GridContext,
        iteration: usize,
        dot: &D,
        history: &mut H,
        trace: &DescentTracer,
    ) -> Result<IterationReport>
    where
        D: DotProduct + ?Sized,
        H: GradientHistory + ?Sized,
    {
        let GridContext {
            grid,
            scalars,
            cost,
            tangent,
            adjoint,
            direction,
            ..
        } = ctx;

        // Step size from the slopes along d at the accepted and trial points.
        let dot_dir_grad = dot.dot(grid, direction, adjoint.slot(Role::Old))?.total();
        let dot_dir_trial = dot.dot(grid, direction, adjoint.slot(Role::New))?.total();
        let tau = ensure_finite(iteration, "tau", scalars.alpha)?;
        let alpha = optimal_step(
            iteration,
            tau,
            dot_dir_grad,
            dot_dir_trial,
            self.step_denominator_tol,
        )?;
        scalars.tau = tau;
        scalars.alpha = alpha;

        let cost_adjust = cost.apply_taylor_correction(tau);

        let grad_dot_old = dot
            .dot(grid, adjoint.slot(Role::Old), adjoint.slot(Role::Old))?
            .total();

        // Gradient at the accepted point X(k) + alpha * d.
        {
            let (new, old) = adjoint.pair_mut(Role::New, Role::Old);
            grid.blend_into(new, old, alpha / tau)?;
            grid.copy_masked(old, new)?;
        }

        let orthogonalization = if self.orthogonalize {
            Some(self.orthogonalize_gradient(grid, adjoint, tangent, iteration, dot, history)?)
        } else {
            None
        };
        if self.record_gradients {
            history.store(grid, iteration + 1, adjoint.slot(Role::New))?;
        }

        grid.advance_in_place(tangent.slot_mut(Role::Input), direction, alpha)?;

        let grad_dot_new = dot
            .dot(grid, adjoint.slot(Role::New), adjoint.slot(Role::New))?
            .total();
        let beta = conjugate_beta(iteration, grad_dot_new, grad_dot_old)?;
        scalars.beta = beta;

        grid.conjugate_direction(direction, adjoint.slot(Role::New), beta)?;
        cost.cost_grad_dot = dot.dot(grid, direction, adjoint.slot(Role::Old))?;
        next_trial(grid, tangent, direction, alpha)?;

        trace.emit(
            TraceRow::inner(iteration)
                .steps(tau, alpha, beta)
                .cost_adjust(cost_adjust.total())
                .direction_dots(dot_dir_grad, dot_dir_trial)
                .gradient_dots(grad_dot_new, grad_dot_old),
        );

        Ok(IterationReport {
            iteration,
            tau,
            alpha,
            beta,
            cost_adjust,
            dot_dir_grad,
            dot_dir_trial,
            grad_dot_old,
            grad_dot_new,
            cost_grad_dot: cost.cost_grad_dot.clone(),
            orthogonalization,
        })
    }

    fn orthogonalize_gradient<D, H>(
        &self,
        grid: &Grid,
        adjoint: &mut StateVector,
        tangent: &mut StateVector,
        iteration: usize,
        dot: &D,
        history: &H,
    ) -> Result<OrthogonalizationReport>
    where
        D: DotProduct + ?Sized,
        H: GradientHistory + ?Sized,
    {
        orthogonalize_against_history(
            grid,
            adjoint.slot_mut(Role::New),
            tangent.slot_mut(Role::Work),
            iteration,
            dot,
            history,
            self.normalize,
            self.verify_orthogonality,
        )
    }
}

/// Xhat(k+1) = X(k+1) + alpha * d(k+1)
fn next_trial(
    grid: &Grid,
    tangent: &mut StateVector,
    direction: &StateFields,
    step: f64,
) -> Result<()> {
    let (trial, accepted) = tangent.split_mut(Role::Output, Role::Input);
    grid.advance_into(trial, accepted, direction, step)
}
