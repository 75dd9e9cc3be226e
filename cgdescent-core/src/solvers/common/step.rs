use crate::error::{Error, Result};

/// Reject NaN/inf scalars of the iteration state.
pub fn ensure_finite(iteration: usize, quantity: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::NonFinite {
            iteration,
            quantity,
            value,
        })
    }
}

/// Optimal step along `d` from one trial evaluation:
///
///   alpha = tau * <d,G> / (<d,G> - <d,Ghat>)
///
/// The ratio is formed first so `dot_new == 0` yields `alpha == tau`
/// exactly. A denominator within `rel_tol * max(|<d,G>|, |<d,Ghat>|)` of
/// zero is rejected.
pub fn optimal_step(
    iteration: usize,
    tau: f64,
    dot_old: f64,
    dot_new: f64,
    rel_tol: f64,
) -> Result<f64> {
    let denom = dot_old - dot_new;
    let scale = dot_old.abs().max(dot_new.abs());
    if !denom.is_finite() || denom == 0.0 || denom.abs() <= rel_tol * scale {
        return Err(Error::DegenerateStep {
            iteration,
            dot_old,
            dot_new,
        });
    }
    ensure_finite(iteration, "alpha", tau * (dot_old / denom))
}

/// Conjugate-direction coefficient `beta = <G(k+1),G(k+1)> / <G(k),G(k)>`.
pub fn conjugate_beta(iteration: usize, new_dot: f64, old_dot: f64) -> Result<f64> {
    if old_dot == 0.0 {
        return Err(Error::ZeroNorm {
            iteration,
            quantity: "<G(k),G(k)>",
        });
    }
    ensure_finite(iteration, "beta", new_dot / old_dot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_trial_slope_keeps_trial_step() {
        for tau in [1.0, 0.3, 7.25e-3] {
            for dot_old in [-3.0, -1.0e-7, 2.5] {
                let alpha = optimal_step(1, tau, dot_old, 0.0, 1e-12).unwrap();
                assert_eq!(alpha, tau);
            }
        }
    }

    #[test]
    fn quadratic_line_minimum() {
        // f(s) = (s - 2)^2 along d, slope at 0 is -4, slope at tau = 1 is -2
        let alpha = optimal_step(3, 1.0, -4.0, -2.0, 1e-12).unwrap();
        assert_eq!(alpha, 2.0);
    }

    #[test]
    fn equal_slopes_are_degenerate() {
        let err = optimal_step(4, 1.0, -1.0, -1.0, 1e-12).unwrap_err();
        assert!(matches!(err, Error::DegenerateStep { iteration: 4, .. }));

        let err = optimal_step(4, 1.0, 1.0, 1.0 - 1e-15, 1e-12).unwrap_err();
        assert!(matches!(err, Error::DegenerateStep { .. }));
    }

    #[test]
    fn beta_requires_nonzero_previous_norm() {
        assert_eq!(conjugate_beta(2, 1.0, 4.0).unwrap(), 0.25);
        assert!(matches!(
            conjugate_beta(2, 1.0, 0.0).unwrap_err(),
            Error::ZeroNorm { iteration: 2, .. }
        ));
    }

    #[test]
    fn non_finite_is_rejected() {
        assert!(matches!(
            ensure_finite(5, "tau", f64::NAN).unwrap_err(),
            Error::NonFinite { quantity: "tau", .. }
        ));
    }
}
