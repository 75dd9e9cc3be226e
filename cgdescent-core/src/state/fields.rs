use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::grid::MaskKind;

/// One block of a state vector sharing a mask and a vertical extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldGroup {
    /// Free-surface elevation.
    Zeta,
    /// Depth-averaged u-momentum.
    Ubar,
    /// Depth-averaged v-momentum.
    Vbar,
    /// 3-D u-momentum.
    U,
    /// 3-D v-momentum.
    V,
    /// 3-D tracer with the given id.
    Tracer(usize),
}

impl FieldGroup {
    pub fn mask_kind(self) -> MaskKind {
        match self {
            FieldGroup::Zeta | FieldGroup::Tracer(_) => MaskKind::Rho,
            FieldGroup::Ubar | FieldGroup::U => MaskKind::U,
            FieldGroup::Vbar | FieldGroup::V => MaskKind::V,
        }
    }

    pub fn is_3d(self) -> bool {
        matches!(self, FieldGroup::U | FieldGroup::V | FieldGroup::Tracer(_))
    }

    pub fn name(self) -> String {
        match self {
            FieldGroup::Zeta => "zeta".to_string(),
            FieldGroup::Ubar => "ubar".to_string(),
            FieldGroup::Vbar => "vbar".to_string(),
            FieldGroup::U => "u".to_string(),
            FieldGroup::V => "v".to_string(),
            FieldGroup::Tracer(id) => format!("tracer{id}"),
        }
    }
}

/// Values of one field group, level-major: `values[level * n + point]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    levels: usize,
    values: Vec<f64>,
}

impl Field {
    pub fn from_values(levels: usize, values: Vec<f64>) -> Self {
        Self { levels, values }
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

/// Full state-shaped vector: an iterate, a gradient or a descent direction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFields {
    pub zeta: Field,
    pub ubar: Field,
    pub vbar: Field,
    pub u: Field,
    pub v: Field,
    pub tracers: BTreeMap<usize, Field>,
}

impl StateFields {
    /// Field groups in canonical order.
    pub fn fields(&self) -> Vec<(FieldGroup, &Field)> {
        let mut out = vec![
            (FieldGroup::Zeta, &self.zeta),
            (FieldGroup::Ubar, &self.ubar),
            (FieldGroup::Vbar, &self.vbar),
            (FieldGroup::U, &self.u),
            (FieldGroup::V, &self.v),
        ];
        out.extend(
            self.tracers
                .iter()
                .map(|(&id, field)| (FieldGroup::Tracer(id), field)),
        );
        out
    }

    /// Mutable field groups in canonical order.
    pub fn fields_mut(&mut self) -> Vec<(FieldGroup, &mut Field)> {
        let mut out = vec![
            (FieldGroup::Zeta, &mut self.zeta),
            (FieldGroup::Ubar, &mut self.ubar),
            (FieldGroup::Vbar, &mut self.vbar),
            (FieldGroup::U, &mut self.u),
            (FieldGroup::V, &mut self.v),
        ];
        out.extend(
            self.tracers
                .iter_mut()
                .map(|(&id, field)| (FieldGroup::Tracer(id), field)),
        );
        out
    }

    pub fn field(&self, group: FieldGroup) -> Option<&Field> {
        match group {
            FieldGroup::Zeta => Some(&self.zeta),
            FieldGroup::Ubar => Some(&self.ubar),
            FieldGroup::Vbar => Some(&self.vbar),
            FieldGroup::U => Some(&self.u),
            FieldGroup::V => Some(&self.v),
            FieldGroup::Tracer(id) => self.tracers.get(&id),
        }
    }

    /// Concatenate all groups in canonical order.
    pub fn to_flat_vec(&self) -> Vec<f64> {
        self.fields()
            .into_iter()
            .flat_map(|(_, field)| field.values().iter().copied())
            .collect()
    }

    pub fn is_finite(&self) -> bool {
        self.fields()
            .iter()
            .all(|(_, field)| field.values().iter().all(|v| v.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracers_use_rho_mask_and_are_3d() {
        assert_eq!(FieldGroup::Tracer(2).mask_kind(), MaskKind::Rho);
        assert_eq!(FieldGroup::Ubar.mask_kind(), MaskKind::U);
        assert_eq!(FieldGroup::V.mask_kind(), MaskKind::V);
        assert!(FieldGroup::Tracer(2).is_3d());
        assert!(!FieldGroup::Zeta.is_3d());
        assert_eq!(FieldGroup::Tracer(2).name(), "tracer2");
    }

    #[test]
    fn fields_mut_visits_every_group() {
        let mut state = StateFields {
            zeta: Field::from_values(1, vec![1.0]),
            ubar: Field::from_values(1, vec![2.0]),
            vbar: Field::from_values(1, vec![3.0]),
            u: Field::from_values(1, vec![4.0]),
            v: Field::from_values(1, vec![5.0]),
            tracers: BTreeMap::from([(1, Field::from_values(1, vec![6.0]))]),
        };
        for (_, field) in state.fields_mut() {
            field.values_mut()[0] *= 10.0;
        }
        assert_eq!(state.to_flat_vec(), vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        assert!(state.is_finite());

        state.tracers.get_mut(&1).unwrap().values_mut()[0] = f64::NAN;
        assert!(!state.is_finite());
    }
}
