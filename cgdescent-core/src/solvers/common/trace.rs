use std::cell::RefCell;
use std::fmt::Write;

use crate::state::GridId;

/// One descent report: step sizes and the four inner products of an inner
/// iteration, `(outer, inner)`.
#[derive(Clone, Debug, PartialEq)]
pub struct DescentTraceRecord {
    pub grid: GridId,
    pub outer: usize,
    pub inner: usize,
    pub tau: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub cost_adjust: Option<f64>,
    /// `<d(k),G(k)>`
    pub dot_dir_grad: Option<f64>,
    /// `<d(k),g(k)>` against the trial gradient
    pub dot_dir_trial: Option<f64>,
    /// `<G(k+1),G(k+1)>`
    pub grad_dot_new: Option<f64>,
    /// `<G(k),G(k)>`
    pub grad_dot_old: Option<f64>,
    pub note: Option<&'static str>,
}

impl DescentTraceRecord {
    pub fn format_line(&self) -> String {
        let (o, k) = (self.outer, self.inner);
        let mut line = format!("[cg:{}] ({:03},{:03}):", self.grid, o, k);
        if let Some(v) = self.tau {
            let _ = write!(line, " tau = {:>14.7e}", v);
        }
        if let Some(v) = self.alpha {
            let _ = write!(line, ", alpha = {:>14.7e}", v);
        }
        if let Some(v) = self.beta {
            let _ = write!(line, ", Beta = {:>14.7e}", v);
        }
        if let Some(v) = self.cost_adjust {
            let _ = write!(line, " | COST adjustment = {:>19.12e}", v);
        }
        if let Some(v) = self.dot_dir_grad {
            let _ = write!(line, " | <d({k:03}),G({k:03})> = {:>19.12e}", v);
        }
        if let Some(v) = self.dot_dir_trial {
            let _ = write!(line, " | <d({k:03}),g({k:03})> = {:>19.12e}", v);
        }
        if let Some(v) = self.grad_dot_new {
            let _ = write!(line, " | <G({:03}),G({:03})> = {:>19.12e}", k + 1, k + 1, v);
        }
        if let Some(v) = self.grad_dot_old {
            let _ = write!(line, " | <G({k:03}),G({k:03})> = {:>19.12e}", v);
        }
        if let Some(note) = self.note {
            let _ = write!(line, " | note {note}");
        }
        line
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct TraceRow {
    inner: usize,
    tau: Option<f64>,
    alpha: Option<f64>,
    beta: Option<f64>,
    cost_adjust: Option<f64>,
    dot_dir_grad: Option<f64>,
    dot_dir_trial: Option<f64>,
    grad_dot_new: Option<f64>,
    grad_dot_old: Option<f64>,
    note: Option<&'static str>,
}

impl TraceRow {
    pub(crate) fn inner(inner: usize) -> Self {
        Self {
            inner,
            tau: None,
            alpha: None,
            beta: None,
            cost_adjust: None,
            dot_dir_grad: None,
            dot_dir_trial: None,
            grad_dot_new: None,
            grad_dot_old: None,
            note: None,
        }
    }

    pub(crate) fn steps(mut self, tau: f64, alpha: f64, beta: f64) -> Self {
        self.tau = Some(tau);
        self.alpha = Some(alpha);
        self.beta = Some(beta);
        self
    }

    pub(crate) fn cost_adjust(mut self, cost_adjust: f64) -> Self {
        self.cost_adjust = Some(cost_adjust);
        self
    }

    pub(crate) fn direction_dots(mut self, dot_dir_grad: f64, dot_dir_trial: f64) -> Self {
        self.dot_dir_grad = Some(dot_dir_grad);
        self.dot_dir_trial = Some(dot_dir_trial);
        self
    }

    pub(crate) fn gradient_dots(mut self, grad_dot_new: f64, grad_dot_old: f64) -> Self {
        self.grad_dot_new = Some(grad_dot_new);
        self.grad_dot_old = Some(grad_dot_old);
        self
    }

    pub(crate) fn note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }
}

#[derive(Clone, Debug)]
pub(crate) struct DescentTracer {
    verbose: bool,
    grid: GridId,
    outer: usize,
    history: Option<RefCell<Vec<DescentTraceRecord>>>,
}

impl DescentTracer {
    pub(crate) fn new(verbose: bool, grid: GridId, outer: usize) -> Self {
        Self {
            verbose,
            grid,
            outer,
            history: None,
        }
    }

    pub(crate) fn with_history(verbose: bool, grid: GridId, outer: usize) -> Self {
        Self {
            verbose,
            grid,
            outer,
            history: Some(RefCell::new(Vec::new())),
        }
    }

    pub(crate) fn emit(&self, row: TraceRow) {
        let record = DescentTraceRecord {
            grid: self.grid,
            outer: self.outer,
            inner: row.inner,
            tau: row.tau,
            alpha: row.alpha,
            beta: row.beta,
            cost_adjust: row.cost_adjust,
            dot_dir_grad: row.dot_dir_grad,
            dot_dir_trial: row.dot_dir_trial,
            grad_dot_new: row.grad_dot_new,
            grad_dot_old: row.grad_dot_old,
            note: row.note,
        };

        if self.verbose {
            tracing::info!(target: "cgdescent::descent", "{}", record.format_line());
        }

        if let Some(history) = &self.history {
            history.borrow_mut().push(record);
        }
    }

    pub(crate) fn into_history(self) -> Vec<DescentTraceRecord> {
        self.history
            .map(|history| history.into_inner())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_line_uses_iteration_labels() {
        let tracer = DescentTracer::with_history(false, GridId(1), 2);
        tracer.emit(
            TraceRow::inner(3)
                .steps(1.0, 0.5, 0.25)
                .direction_dots(-2.0, -1.0)
                .gradient_dots(0.5, 2.0),
        );
        let history = tracer.into_history();
        assert_eq!(history.len(), 1);

        let line = history[0].format_line();
        assert!(line.starts_with("[cg:1] (002,003): tau ="));
        assert!(line.contains("<d(003),G(003)>"));
        assert!(line.contains("<d(003),g(003)>"));
        assert!(line.contains("<G(004),G(004)>"));
        assert!(!line.contains("COST"));
    }

    #[test]
    fn history_is_empty_without_collection() {
        let tracer = DescentTracer::new(false, GridId(0), 0);
        tracer.emit(TraceRow::inner(0).note("initialized"));
        assert!(tracer.into_history().is_empty());
    }
}
