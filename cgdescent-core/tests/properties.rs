use cgdescent::{
    orthogonalize_against_history, DotProduct, GradientHistory, Grid, GridId, LocalDotProduct,
    MemoryHistory, StateFields,
};
use proptest::prelude::*;

// 2x2 domain, one dry rho point, one tracer, one level: 24 values
fn grid() -> Grid {
    Grid::new(GridId(0), 2, 2, 1, &[3])
        .with_masks(
            vec![true, false, true, true],
            vec![true, true, true, true],
            vec![true, true, false, true],
        )
        .unwrap()
}

const LEN: usize = 24;

fn state(grid: &Grid, flat: &[f64]) -> StateFields {
    grid.state_from_flat(flat).unwrap()
}

fn dot(grid: &Grid, a: &StateFields, b: &StateFields) -> f64 {
    LocalDotProduct.dot(grid, a, b).unwrap().total()
}

proptest! {
    #[test]
    fn prop_dot_is_bilinear(
        a in -5.0f64..5.0,
        x in proptest::collection::vec(-10.0f64..10.0, LEN),
        y in proptest::collection::vec(-10.0f64..10.0, LEN),
        z in proptest::collection::vec(-10.0f64..10.0, LEN),
    ) {
        let grid = grid();
        let combo: Vec<f64> = x.iter().zip(&y).map(|(xi, yi)| a * xi + yi).collect();
        let (x, y, z, combo) = (state(&grid, &x), state(&grid, &y), state(&grid, &z), state(&grid, &combo));

        let lhs = dot(&grid, &combo, &z);
        let rhs = a * dot(&grid, &x, &z) + dot(&grid, &y, &z);
        prop_assert!((lhs - rhs).abs() < 1e-9 * (1.0 + lhs.abs() + rhs.abs()) + 1e-9);
    }

    #[test]
    fn prop_dot_is_symmetric(
        x in proptest::collection::vec(-1e3f64..1e3, LEN),
        y in proptest::collection::vec(-1e3f64..1e3, LEN),
    ) {
        let grid = grid();
        let (x, y) = (state(&grid, &x), state(&grid, &y));
        let xy = LocalDotProduct.dot(&grid, &x, &y).unwrap();
        let yx = LocalDotProduct.dot(&grid, &y, &x).unwrap();
        prop_assert_eq!(xy.as_slice(), yx.as_slice());
    }

    #[test]
    fn prop_gradient_is_orthogonal_to_history(
        k in 1usize..=4,
        records in proptest::collection::vec(proptest::collection::vec(-10.0f64..10.0, LEN), 4),
        g in proptest::collection::vec(-10.0f64..10.0, LEN),
    ) {
        let grid = grid();
        let mut history = MemoryHistory::new();
        let mut scratch = grid.zero_state();

        // build a mutually orthogonal history the way the driver does
        for (i, raw) in records[..k].iter().enumerate() {
            let mut r = state(&grid, raw);
            let raw_norm_sq = dot(&grid, &r, &r);
            prop_assume!(raw_norm_sq > 0.0);
            orthogonalize_against_history(
                &grid, &mut r, &mut scratch, i, &LocalDotProduct, &history, false, false,
            ).unwrap();
            prop_assume!(dot(&grid, &r, &r) > 1e-4 * raw_norm_sq);
            history.store(&grid, i + 1, &r).unwrap();
        }

        let mut g = state(&grid, &g);
        let before = dot(&grid, &g, &g).sqrt();
        let report = orthogonalize_against_history(
            &grid, &mut g, &mut scratch, k, &LocalDotProduct, &history, false, true,
        ).unwrap();
        prop_assert_eq!(report.projections.len(), k);

        for record in 1..=k {
            let gr = history.load(&grid, record).unwrap();
            let bound = 1e-9 * before * dot(&grid, &gr, &gr).sqrt();
            prop_assert!(dot(&grid, &g, &gr).abs() <= bound);
        }
    }
}
