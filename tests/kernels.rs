use std::collections::HashSet;

use rand::{Rng, SeedableRng, rngs::StdRng};
use sdf_compute::{
    BlockDim1D, LaunchError, PackedCell, accumulate, compact, compact_cells, index3, scan_groups,
};

#[test]
fn compaction_is_dense_and_duplicate_free() {
    let mut rng = StdRng::seed_from_u64(11);
    for block in [1, 7, 64, 1024] {
        let items: Vec<Option<u64>> = (0..2500u64)
            .map(|i| rng.random_bool(0.5).then_some(i * 3))
            .collect();
        let mut out = vec![0u64; 2500];
        let count = compact(BlockDim1D::new(block), &items, &mut out).unwrap();

        let kept: HashSet<u64> = items.iter().flatten().copied().collect();
        let written: HashSet<u64> = out[..count].iter().copied().collect();
        assert_eq!(count, kept.len(), "block {block}");
        assert_eq!(written, kept, "block {block}");
    }
}

#[test]
fn cells_near_a_plane() {
    let size = [16, 16, 16];
    // Cells whose centre lies within one cell of the plane x + y = z + 8.
    let near = |at: [usize; 3]| {
        let d = at[0] as f32 + at[1] as f32 - at[2] as f32 - 8.0;
        d.abs() / 3f32.sqrt() <= 1.0
    };
    let cells: Vec<PackedCell> = compact_cells(size, BlockDim1D::new(256), near).unwrap();

    let flat: HashSet<usize> = cells
        .iter()
        .map(|c| index3!(16, 16, 16, c[0] as usize, c[1] as usize, c[2] as usize))
        .collect();
    assert_eq!(flat.len(), cells.len());
    assert!(cells.iter().all(|c| c[3] == 0));

    let expected = (0..16 * 16 * 16)
        .filter(|&i| near(compute_std::indexing::unindex3(size, i)))
        .count();
    assert_eq!(cells.len(), expected);
}

#[test]
fn accumulated_totals() {
    let values: Vec<(f32, u32)> = (0..5000).map(|i| ((i % 4) as f32, i as u32)).collect();
    let (weight, samples) = accumulate(BlockDim1D::new(100), &values).unwrap();
    assert_eq!(weight, 1250.0 * 6.0);
    assert_eq!(samples, 4999 * 5000 / 2);
}

fn too_large<T>() -> Result<T, LaunchError> {
    Err(LaunchError::BlockTooLarge {
        lanes: i32::MAX as usize,
        max: 1024,
    })
}

#[test]
fn oversized_blocks_fail_before_allocating() {
    let huge = BlockDim1D::new(i32::MAX);
    let mut out = [0u32; 1];
    assert_eq!(scan_groups(huge, &[1u32]), too_large());
    assert_eq!(compact(huge, &[Some(1u32)], &mut out), too_large());
    assert_eq!(accumulate(huge, &[(1.0, 1)]), too_large());
    assert_eq!(compact_cells([4, 4, 4], huge, |_| true), too_large());
}
