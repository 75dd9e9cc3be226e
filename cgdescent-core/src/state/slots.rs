use super::fields::StateFields;
use super::grid::Grid;

/// Named scratch slot of a [`StateVector`].
///
/// Slots are roles within one algorithm phase, not physical time levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepted gradient `G(k)`; after the blend, the unorthogonalized `G(k+1)`.
    Old,
    /// Trial gradient `Ghat(k)`; after the blend, the orthogonalized `G(k+1)`.
    New,
    /// Accepted iterate `X(k)`.
    Input,
    /// Next trial iterate `Xhat(k+1)`.
    Output,
    /// Scratch buffer for gradient-history records.
    Work,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Old, Role::New, Role::Input, Role::Output, Role::Work];

    fn index(self) -> usize {
        match self {
            Role::Old => 0,
            Role::New => 1,
            Role::Input => 2,
            Role::Output => 3,
            Role::Work => 4,
        }
    }
}

/// A state-shaped vector with one buffer per [`Role`].
#[derive(Clone, Debug, PartialEq)]
pub struct StateVector {
    slots: [StateFields; 5],
}

impl StateVector {
    /// All slots zeroed with the layout of `grid`.
    pub fn new(grid: &Grid) -> Self {
        Self {
            slots: std::array::from_fn(|_| grid.zero_state()),
        }
    }

    pub fn slot(&self, role: Role) -> &StateFields {
        &self.slots[role.index()]
    }

    pub fn slot_mut(&mut self, role: Role) -> &mut StateFields {
        &mut self.slots[role.index()]
    }

    /// Borrow `target` mutably and `source` shared at the same time.
    ///
    /// # Panics
    /// If `target == source`.
    pub fn split_mut(&mut self, target: Role, source: Role) -> (&mut StateFields, &StateFields) {
        let (t, s) = self.pair_mut(target, source);
        (t, &*s)
    }

    /// Borrow two distinct slots mutably.
    ///
    /// # Panics
    /// If `a == b`.
    pub fn pair_mut(&mut self, a: Role, b: Role) -> (&mut StateFields, &mut StateFields) {
        let (ia, ib) = (a.index(), b.index());
        assert_ne!(ia, ib, "slot {a:?} borrowed twice");
        if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        }
    }
}
