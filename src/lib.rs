//! Workgroup primitives for evaluating signed distance fields on the GPU:
//! a permuted prefix sum for local stream compaction, and the assertion,
//! indexing and atomic helpers its kernels share.
//!
//! Device code lives in [`compute_std`] and [`kernels`]; on host targets every
//! kernel also runs under [`compute_std::host::launch`], one thread per lane.

pub use compute_macro::{device, host};
pub use compute_std::{
    assert::{AssertBuffer, AssertDetails},
    atomic::{AtomicF32, AtomicF64, AtomicU32, SplitCounter64},
    gpu_assert, index2, index3,
    gpu_safety::{UniqueId, Workgroup},
    scan::{ScanElement, scan_position, workgroup_prefix_sum, workgroup_reduce},
    slices::{DeviceSlice, DeviceSliceMut, LocalSlice},
    thread_layout::{BlockDim1D, GridDim1D, MAX_BLOCK_LANES},
    when_assert,
};
pub use kernels::compaction::PackedCell;

#[host]
pub use compute_std::host::{LaunchError, Result};
#[host]
pub use kernels::{accumulate::accumulate, compaction::{compact, compact_cells}};

/// Runs [`workgroup_prefix_sum`] over `values`, one lane per value, and
/// returns what each lane received. The last group is padded with identity
/// lanes when `values` does not fill it.
#[host]
pub fn scan_groups<T>(block: BlockDim1D, values: &[T]) -> Result<Vec<T>>
where
    T: ScanElement + Send + Sync,
{
    use std::sync::Mutex;

    let lanes = compute_std::host::check_block(block)?;
    let groups = values.len().div_ceil(lanes).max(1);
    let mut scratch = vec![T::identity(); lanes];

    let results = Mutex::new(vec![T::identity(); values.len()]);
    compute_std::host::launch(GridDim1D::new(groups as i32), block, &mut scratch, |lane, scratch| {
        let at = lane.global_id();
        let value = values.get(at).copied().unwrap_or_else(T::identity);
        let received = workgroup_prefix_sum(&lane, value, scratch);
        if at < values.len() {
            if let Ok(mut results) = results.lock() {
                results[at] = received;
            }
        }
    })?;

    // A poisoned lock means a lane panicked, which `launch` already reported.
    Ok(results.into_inner().unwrap_or_else(|e| e.into_inner()))
}
