//! Masked elementwise kernels on state-shaped vectors.
//!
//! Every kernel writes exactly zero at inactive points of the field group
//! being updated, whatever the operands hold there.

use crate::error::Result;

use super::fields::StateFields;
use super::grid::Grid;

impl Grid {
    /// out[p] = op(out[p], rhs[p]) at active points, 0 elsewhere.
    fn zip_apply<F>(&self, out: &mut StateFields, rhs: &StateFields, op: F) -> Result<()>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.check_shape(out, "target")?;
        self.check_shape(rhs, "operand")?;
        let n = self.horizontal_len();
        for ((group, out_field), (_, rhs_field)) in out.fields_mut().into_iter().zip(rhs.fields()) {
            let mask = self.mask_for(group);
            for (idx, (o, &r)) in out_field
                .values_mut()
                .iter_mut()
                .zip(rhs_field.values())
                .enumerate()
            {
                *o = if mask[idx % n] { op(*o, r) } else { 0.0 };
            }
        }
        Ok(())
    }

    fn map_in_place<F>(&self, x: &mut StateFields, op: F) -> Result<()>
    where
        F: Fn(f64) -> f64,
    {
        self.check_shape(x, "target")?;
        let n = self.horizontal_len();
        for (group, field) in x.fields_mut() {
            let mask = self.mask_for(group);
            for (idx, v) in field.values_mut().iter_mut().enumerate() {
                *v = if mask[idx % n] { op(*v) } else { 0.0 };
            }
        }
        Ok(())
    }

    /// Zero every inactive point of `x`.
    pub fn mask_in_place(&self, x: &mut StateFields) {
        let n = self.horizontal_len();
        for (group, field) in x.fields_mut() {
            let mask = self.mask_for(group);
            for (idx, v) in field.values_mut().iter_mut().enumerate() {
                if !mask[idx % n] {
                    *v = 0.0;
                }
            }
        }
    }

    /// out = x + mask * step * direction
    pub fn advance_into(
        &self,
        out: &mut StateFields,
        x: &StateFields,
        direction: &StateFields,
        step: f64,
    ) -> Result<()> {
        self.check_shape(x, "iterate")?;
        out.clone_from(x);
        self.advance_in_place(out, direction, step)
    }

    /// x <- x + mask * step * direction
    pub fn advance_in_place(
        &self,
        x: &mut StateFields,
        direction: &StateFields,
        step: f64,
    ) -> Result<()> {
        self.zip_apply(x, direction, |xi, di| xi + step * di)
    }

    /// gradient <- accepted + mask * fac * (gradient - accepted)
    ///
    /// `gradient` holds the trial gradient on entry and the blended estimate
    /// on exit.
    pub fn blend_into(
        &self,
        gradient: &mut StateFields,
        accepted: &StateFields,
        fac: f64,
    ) -> Result<()> {
        self.zip_apply(gradient, accepted, |g, a| a + fac * (g - a))
    }

    /// direction <- mask * (-gradient + beta * direction)
    ///
    /// With `beta == 0` the previous direction is not read, so the result is
    /// exactly `-gradient`.
    pub fn conjugate_direction(
        &self,
        direction: &mut StateFields,
        gradient: &StateFields,
        beta: f64,
    ) -> Result<()> {
        if beta == 0.0 {
            self.zip_apply(direction, gradient, |_, g| -g)
        } else {
            self.zip_apply(direction, gradient, |d, g| -g + beta * d)
        }
    }

    /// x <- x - mask * coeff * reference
    pub fn project_out(
        &self,
        x: &mut StateFields,
        reference: &StateFields,
        coeff: f64,
    ) -> Result<()> {
        self.zip_apply(x, reference, |xi, ri| xi - coeff * ri)
    }

    /// x <- mask * factor * x
    pub fn scale_in_place(&self, x: &mut StateFields, factor: f64) -> Result<()> {
        self.map_in_place(x, |v| factor * v)
    }

    /// dst <- mask * src
    pub fn copy_masked(&self, dst: &mut StateFields, src: &StateFields) -> Result<()> {
        self.zip_apply(dst, src, |_, s| s)
    }
}

#[cfg(test)]
mod tests {
    use crate::state::{FieldGroup, Grid, GridId};

    fn masked_grid() -> Grid {
        // 2x2 domain, one dry rho point, one closed u face, one closed v face
        Grid::new(GridId(0), 2, 2, 2, &[1])
            .with_masks(
                vec![true, true, false, true],
                vec![false, true, true, true],
                vec![true, true, true, false],
            )
            .unwrap()
    }

    fn filled(grid: &Grid, value: f64) -> crate::state::StateFields {
        let mut state = grid.zero_state();
        for (_, field) in state.fields_mut() {
            field.values_mut().fill(value);
        }
        state
    }

    fn assert_inactive_zero(grid: &Grid, state: &crate::state::StateFields) {
        let n = grid.horizontal_len();
        for (group, field) in state.fields() {
            let mask = grid.mask_for(group);
            for (idx, v) in field.values().iter().enumerate() {
                if !mask[idx % n] {
                    assert_eq!(*v, 0.0, "{} at {}", group.name(), idx);
                }
            }
        }
    }

    #[test]
    fn advance_into_moves_active_points_only() {
        let grid = masked_grid();
        let x = filled(&grid, 1.0);
        let d = filled(&grid, 2.0);
        let mut out = grid.zero_state();
        grid.advance_into(&mut out, &x, &d, 0.5).unwrap();

        assert_eq!(out.zeta.values(), &[2.0, 2.0, 0.0, 2.0]);
        assert_eq!(out.ubar.values(), &[0.0, 2.0, 2.0, 2.0]);
        assert_eq!(out.tracers[&1].values(), &[2.0, 2.0, 0.0, 2.0, 2.0, 2.0, 0.0, 2.0]);
        assert_inactive_zero(&grid, &out);
    }

    #[test]
    fn blend_with_unit_factor_takes_trial_gradient() {
        let grid = masked_grid();
        let accepted = filled(&grid, 3.0);
        let mut gradient = filled(&grid, -1.0);
        grid.blend_into(&mut gradient, &accepted, 1.0).unwrap();
        assert_eq!(gradient.v.values(), &[-1.0, -1.0, -1.0, 0.0, -1.0, -1.0, -1.0, 0.0]);

        let mut gradient = filled(&grid, -1.0);
        grid.blend_into(&mut gradient, &accepted, 0.25).unwrap();
        // 3 + 0.25 * (-1 - 3) = 2
        assert_eq!(gradient.zeta.values(), &[2.0, 2.0, 0.0, 2.0]);
        assert_inactive_zero(&grid, &gradient);
    }

    #[test]
    fn zero_beta_direction_is_negative_gradient() {
        let grid = masked_grid();
        let gradient = grid.state_from_fn(|_, level, point| 0.1 * (level * 4 + point) as f64 + 0.3);
        let mut direction = filled(&grid, f64::NAN);
        grid.conjugate_direction(&mut direction, &gradient, 0.0).unwrap();

        let n = grid.horizontal_len();
        for ((group, d), (_, g)) in direction.fields().into_iter().zip(gradient.fields()) {
            let mask = grid.mask_for(group);
            for (idx, (dv, gv)) in d.values().iter().zip(g.values()).enumerate() {
                if mask[idx % n] {
                    assert_eq!(dv.to_bits(), (-gv).to_bits());
                }
            }
        }
        assert_inactive_zero(&grid, &direction);
    }

    #[test]
    fn conjugate_direction_mixes_previous_direction() {
        let grid = Grid::new(GridId(0), 1, 2, 0, &[]);
        let gradient = grid.state_from_fn(|_, _, point| point as f64 + 1.0);
        let mut direction = grid.state_from_fn(|_, _, _| 4.0);
        grid.conjugate_direction(&mut direction, &gradient, 0.5).unwrap();
        assert_eq!(direction.zeta.values(), &[1.0, 0.0]);
    }

    #[test]
    fn project_out_and_scale() {
        let grid = masked_grid();
        let mut x = filled(&grid, 5.0);
        let r = filled(&grid, 2.0);
        grid.project_out(&mut x, &r, 1.5).unwrap();
        assert_eq!(x.field(FieldGroup::Zeta).unwrap().values(), &[2.0, 2.0, 0.0, 2.0]);
        grid.scale_in_place(&mut x, 0.5).unwrap();
        assert_eq!(x.ubar.values(), &[0.0, 1.0, 1.0, 1.0]);
        assert_inactive_zero(&grid, &x);
    }

    #[test]
    fn kernels_reject_foreign_layouts() {
        let grid = masked_grid();
        let other = Grid::new(GridId(0), 3, 1, 2, &[1]);
        let mut x = grid.zero_state();
        assert!(grid.advance_in_place(&mut x, &other.zero_state(), 1.0).is_err());
        assert!(grid.copy_masked(&mut x, &other.zero_state()).is_err());
    }
}
