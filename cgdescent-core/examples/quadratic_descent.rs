use cgdescent::{
    ConjugateGradient, DotResult, Grid, GridContext, GridId, LocalDotProduct, MemoryHistory,
    StateFields,
};
use tracing_subscriber::EnvFilter;

// J(x) = 0.5 * sum(a_i x_i^2) - sum(x_i), minimized at x_i = 1 / a_i
fn curvature(i: usize) -> f64 {
    1.0 + (i % 11) as f64
}

fn gradient(grid: &Grid, x: &StateFields) -> cgdescent::Result<StateFields> {
    let flat: Vec<f64> = x
        .to_flat_vec()
        .iter()
        .enumerate()
        .map(|(i, xi)| curvature(i) * xi - 1.0)
        .collect();
    grid.state_from_flat(&flat)
}

fn cost(x: &StateFields) -> DotResult {
    let mut offset = 0;
    let partials = x
        .fields()
        .into_iter()
        .map(|(_, field)| {
            let sum = field
                .values()
                .iter()
                .enumerate()
                .map(|(j, xi)| 0.5 * curvature(offset + j) * xi * xi - xi)
                .sum::<f64>();
            offset += field.len();
            sum
        })
        .collect();
    DotResult::from_partials(partials)
}

fn main() -> cgdescent::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let solver = match std::env::args().nth(1) {
        Some(path) => ConjugateGradient::from_toml_file(path)?,
        None => ConjugateGradient::from_toml_str("initial_step = 0.1\nverbose = true")?,
    };

    let grid = Grid::new(GridId(1), 6, 5, 2, &[1, 2]);
    let mut ctx = GridContext::new(grid.clone());
    let mut history = MemoryHistory::new();

    let x0 = grid.zero_state();
    ctx.set_initial_state(&x0)?;
    ctx.set_trial_gradient(&gradient(&grid, &x0)?)?;
    ctx.set_cost(cost(&x0))?;
    solver.advance(&mut ctx, 0, &LocalDotProduct, &mut history)?;

    for k in 1..=8 {
        let trial = ctx.trial_state().clone();
        ctx.set_trial_gradient(&gradient(&grid, &trial)?)?;
        ctx.set_cost(cost(&trial))?;
        let report = solver.advance(&mut ctx, k, &LocalDotProduct, &mut history)?;
        tracing::info!(
            iteration = k,
            alpha = report.alpha,
            beta = report.beta,
            grad_norm_sq = report.grad_dot_new,
            cost_estimate = ctx.cost().cost.total(),
            "inner iteration done"
        );
    }

    tracing::info!(
        cost = cost(ctx.accepted_state()).total(),
        records = cgdescent::GradientHistory::len(&history, grid.id()),
        "descent finished"
    );
    Ok(())
}
