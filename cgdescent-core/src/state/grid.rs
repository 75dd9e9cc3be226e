use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::fields::{Field, FieldGroup, StateFields};

/// Identifier of a nested/refined grid. Each grid carries fully independent
/// descent state.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GridId(pub usize);

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Horizontal mask a field group is staggered on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskKind {
    /// Cell centres: free surface and tracers.
    Rho,
    /// East/west faces: u-momentum.
    U,
    /// North/south faces: v-momentum.
    V,
}

/// Computational domain of one grid: horizontal extent, vertical levels,
/// active tracers and the three land/sea masks.
///
/// Masks are resolved once here; every masked kernel asks the grid for the
/// mask of the field group it is touching.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    id: GridId,
    nx: usize,
    ny: usize,
    levels: usize,
    tracers: Vec<usize>,
    rho_mask: Vec<bool>,
    u_mask: Vec<bool>,
    v_mask: Vec<bool>,
}

impl Grid {
    /// Grid with every point active.
    ///
    /// `levels` is the number of vertical levels of the 3-D groups (0 for a
    /// depth-averaged configuration). Tracer ids are deduplicated and kept in
    /// ascending order.
    pub fn new(id: GridId, nx: usize, ny: usize, levels: usize, tracers: &[usize]) -> Self {
        let n = nx * ny;
        let mut tracers = tracers.to_vec();
        tracers.sort_unstable();
        tracers.dedup();
        Self {
            id,
            nx,
            ny,
            levels,
            tracers,
            rho_mask: vec![true; n],
            u_mask: vec![true; n],
            v_mask: vec![true; n],
        }
    }

    /// Replace the three horizontal masks (`true` = active/water point).
    pub fn with_masks(mut self, rho: Vec<bool>, u: Vec<bool>, v: Vec<bool>) -> Result<Self> {
        let n = self.horizontal_len();
        for (name, mask) in [("rho mask", &rho), ("u mask", &u), ("v mask", &v)] {
            if mask.len() != n {
                return Err(Error::shape(
                    name,
                    format!("{n} points"),
                    format!("{} points", mask.len()),
                ));
            }
        }
        self.rho_mask = rho;
        self.u_mask = u;
        self.v_mask = v;
        Ok(self)
    }

    pub fn id(&self) -> GridId {
        self.id
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn tracers(&self) -> &[usize] {
        &self.tracers
    }

    pub fn horizontal_len(&self) -> usize {
        self.nx * self.ny
    }

    /// Number of field groups, i.e. the length of a dot-product partials list.
    pub fn n_groups(&self) -> usize {
        5 + self.tracers.len()
    }

    /// Field groups in canonical order.
    pub fn groups(&self) -> Vec<FieldGroup> {
        let mut groups = vec![
            FieldGroup::Zeta,
            FieldGroup::Ubar,
            FieldGroup::Vbar,
            FieldGroup::U,
            FieldGroup::V,
        ];
        groups.extend(self.tracers.iter().map(|&id| FieldGroup::Tracer(id)));
        groups
    }

    pub fn mask(&self, kind: MaskKind) -> &[bool] {
        match kind {
            MaskKind::Rho => &self.rho_mask,
            MaskKind::U => &self.u_mask,
            MaskKind::V => &self.v_mask,
        }
    }

    pub fn mask_for(&self, group: FieldGroup) -> &[bool] {
        self.mask(group.mask_kind())
    }

    /// Number of vertical levels stored for a field group.
    pub fn levels_of(&self, group: FieldGroup) -> usize {
        if group.is_3d() {
            self.levels
        } else {
            1
        }
    }

    /// All-zero state shaped for this grid.
    pub fn zero_state(&self) -> StateFields {
        self.state_from_fn(|_, _, _| 0.0)
    }

    /// Build a state by evaluating `f(group, level, point)` at every active
    /// point. Inactive points are zero.
    pub fn state_from_fn<F>(&self, mut f: F) -> StateFields
    where
        F: FnMut(FieldGroup, usize, usize) -> f64,
    {
        let n = self.horizontal_len();
        self.build_state(|group| {
            let levels = self.levels_of(group);
            let mask = self.mask_for(group);
            let mut values = Vec::with_capacity(levels * n);
            for level in 0..levels {
                for point in 0..n {
                    values.push(if mask[point] { f(group, level, point) } else { 0.0 });
                }
            }
            Field::from_values(levels, values)
        })
    }

    /// Build a state from values laid out as [`StateFields::to_flat_vec`]
    /// produces them. Inactive points are zeroed.
    pub fn state_from_flat(&self, flat: &[f64]) -> Result<StateFields> {
        let expected = self.flat_len();
        if flat.len() != expected {
            return Err(Error::shape(
                "flat state",
                format!("{expected} values"),
                format!("{} values", flat.len()),
            ));
        }
        let n = self.horizontal_len();
        let mut offset = 0;
        let mut state = self.build_state(|group| {
            let levels = self.levels_of(group);
            let len = levels * n;
            let field = Field::from_values(levels, flat[offset..offset + len].to_vec());
            offset += len;
            field
        });
        self.mask_in_place(&mut state);
        Ok(state)
    }

    // `make` is called once per group in canonical order
    fn build_state<F>(&self, mut make: F) -> StateFields
    where
        F: FnMut(FieldGroup) -> Field,
    {
        let zeta = make(FieldGroup::Zeta);
        let ubar = make(FieldGroup::Ubar);
        let vbar = make(FieldGroup::Vbar);
        let u = make(FieldGroup::U);
        let v = make(FieldGroup::V);
        let tracers = self
            .tracers
            .iter()
            .map(|&id| (id, make(FieldGroup::Tracer(id))))
            .collect();
        StateFields {
            zeta,
            ubar,
            vbar,
            u,
            v,
            tracers,
        }
    }

    /// Total number of scalar values in one state.
    pub fn flat_len(&self) -> usize {
        let n = self.horizontal_len();
        self.groups().iter().map(|&g| self.levels_of(g) * n).sum()
    }

    /// Validate that `state` has the layout of this grid.
    pub fn check_shape(&self, state: &StateFields, what: &str) -> Result<()> {
        let ids: Vec<usize> = state.tracers.keys().copied().collect();
        if ids != self.tracers {
            return Err(Error::shape(
                format!("{what} tracers"),
                format!("{:?}", self.tracers),
                format!("{ids:?}"),
            ));
        }
        let n = self.horizontal_len();
        for (group, field) in state.fields() {
            let levels = self.levels_of(group);
            if field.levels() != levels || field.len() != levels * n {
                return Err(Error::shape(
                    format!("{what} field {}", group.name()),
                    format!("{levels} level(s) x {n} points"),
                    format!("{} level(s), {} values", field.levels(), field.len()),
                ));
            }
        }
        Ok(())
    }
}
