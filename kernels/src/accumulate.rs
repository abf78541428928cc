use core::sync::atomic::Ordering;

use compute_macro::{device, host};
use compute_std::{
    atomic::{AtomicF32, SplitCounter64},
    gpu_safety::Workgroup,
    scan::workgroup_reduce,
    slices::LocalSlice,
};

#[device]
use compute_std::{
    slices::DeviceSlice,
    thread_layout::{Block1D, FlatLayout1D, ThreadLayout},
};

#[host]
use compute_std::{
    host::{Result, check_block, launch},
    thread_layout::{BlockDim1D, GridDim1D},
};
#[host]
use tracing::debug;

/// Adds the group's `weight`s to `total_weight` and its `samples` to
/// `total_samples`, with one atomic add per group for each. Sample counts are
/// summed in 64 bits within the group, so only the global total needs the
/// split counter.
///
/// Same calling contract as [`workgroup_reduce`], once per scratch buffer.
pub fn accumulate_group<W>(
    group: &W,
    weight: f32,
    samples: u32,
    weights: LocalSlice<'_, f32>,
    counts: LocalSlice<'_, u64>,
    total_weight: &AtomicF32,
    total_samples: &SplitCounter64,
) where
    W: Workgroup + ?Sized,
{
    let weight = workgroup_reduce(group, weight, weights);
    let samples = workgroup_reduce(group, samples as u64, counts);
    if group.local_id() == 0 {
        total_weight.fetch_add(weight, Ordering::Relaxed);
        total_samples.add(samples, Ordering::Relaxed);
    }
}

/// One lane per entry of `values`; lanes past the end add nothing.
#[device]
pub fn accumulate_block(
    values: DeviceSlice<'_, (f32, u32)>,
    weights: LocalSlice<'_, f32>,
    counts: LocalSlice<'_, u64>,
    total_weight: &AtomicF32,
    total_samples: &SplitCounter64,
) {
    let (weight, samples) = values.get(FlatLayout1D.uid().idx()).copied().unwrap_or((0.0, 0));
    accumulate_group(&Block1D, weight, samples, weights, counts, total_weight, total_samples)
}

/// Sums `(weight, samples)` pairs, one lane each. Returns
/// `(total_weight, total_samples)`.
///
/// Weights are summed in a tree per group and the group sums in dispatch
/// order, so the float total can differ from a sequential sum by rounding.
#[host]
pub fn accumulate(block: BlockDim1D, values: &[(f32, u32)]) -> Result<(f32, u64)> {
    let lanes = check_block(block)?;
    let groups = values.len().div_ceil(lanes).max(1);
    let mut weights = vec![0.0f32; lanes];
    let mut counts = vec![0u64; lanes];

    let total_weight = AtomicF32::new(0.0);
    let total_samples = SplitCounter64::new(0);
    let counts = LocalSlice::from(counts.as_mut_slice());
    launch(GridDim1D::new(groups as i32), block, &mut weights, |lane, weights| {
        let (weight, samples) = values.get(lane.global_id()).copied().unwrap_or((0.0, 0));
        accumulate_group(&lane, weight, samples, weights, counts, &total_weight, &total_samples);
    })?;

    let totals = (total_weight.into_inner(), total_samples.into_inner());
    debug!(values = values.len(), weight = totals.0, samples = totals.1, "accumulated");
    Ok(totals)
}

#[cfg(test)]
mod test {
    use super::*;
    use compute_std::host::LaunchError;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn totals_match_sequential_sums() {
        let mut rng = StdRng::seed_from_u64(7);
        let values: Vec<(f32, u32)> = (0..3000)
            .map(|_| (rng.random_range(0..64) as f32 * 0.25, rng.random_range(0..1000)))
            .collect();
        let (weight, samples) = accumulate(BlockDim1D::new(256), &values).unwrap();

        // Quarter steps stay exact in f32 at this size.
        assert_eq!(weight, values.iter().map(|v| v.0).sum::<f32>());
        assert_eq!(samples, values.iter().map(|v| v.1 as u64).sum::<u64>());
    }

    #[test]
    fn sample_count_carries_past_32_bits() {
        let values = vec![(1.0f32, u32::MAX); 6];
        let (weight, samples) = accumulate(BlockDim1D::new(2), &values).unwrap();
        assert_eq!(weight, 6.0);
        assert_eq!(samples, 6 * u32::MAX as u64);
    }

    #[test]
    fn empty_input_sums_to_zero() {
        assert_eq!(accumulate(BlockDim1D::new(32), &[]), Ok((0.0, 0)));
    }

    #[test]
    fn block_limit_applies() {
        assert_eq!(
            accumulate(BlockDim1D::new(4096), &[(1.0, 1)]),
            Err(LaunchError::BlockTooLarge {
                lanes: 4096,
                max: 1024
            })
        );
    }
}
