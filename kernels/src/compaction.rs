use core::sync::atomic::Ordering;

use compute_macro::{device, host};
use compute_std::{
    assert::AssertBuffer,
    atomic::AtomicU32,
    gpu_assert,
    gpu_safety::{UniqueId, Workgroup},
    scan::workgroup_prefix_sum,
    slices::{DeviceSliceMut, LocalSlice},
};

#[device]
use compute_std::thread_layout::Block1D;

#[host]
use compute_std::{
    host::{LaunchError, Result, check_block, check_output, launch},
    indexing::unindex3,
    thread_layout::{BlockDim1D, GridDim1D},
};
#[host]
use tracing::{debug, warn};

/// Cell coordinate of a sampling grid, `[x, y, z, 0]`.
pub type PackedCell = [u8; 4];

/// Largest grid extent a [`PackedCell`] can address.
pub const MAX_CELL_GRID: usize = u8::MAX as usize + 1;

/// Writes every lane's `item` (if any) to a distinct slot of `out`, with no
/// gaps between the slots used by the whole dispatch.
///
/// `cursor` counts the slots taken so far and must start at zero. A group
/// takes its slots in one atomic add from lane 0; within the group, slots
/// follow the permuted scan order, not lane order. Items that would land past
/// the end of `out` are dropped and reported through `asserts`.
///
/// Returns the slot the item went to. Same calling contract as
/// [`workgroup_prefix_sum`]: every lane of the group, shared `scratch`.
pub fn compact_group<T, W>(
    group: &W,
    item: Option<T>,
    scratch: LocalSlice<'_, u32>,
    cursor: &AtomicU32,
    out: DeviceSliceMut<'_, T>,
    asserts: &AssertBuffer,
) -> Option<u32>
where
    W: Workgroup + ?Sized,
{
    let keep = item.is_some() as u32;
    let inclusive = workgroup_prefix_sum(group, keep, scratch);

    // The scan leaves its scratch free, so lane 0 broadcasts through slot 0.
    if group.local_id() == 0 {
        let base = cursor.fetch_add(inclusive, Ordering::Relaxed);
        unsafe { scratch.write(0, base) };
    }
    group.barrier();
    let base = unsafe { scratch.read(0) };
    group.barrier();

    let value = item?;
    let slot = base.wrapping_add(inclusive - keep);
    let fits = (slot as usize) < out.len();
    gpu_assert!(asserts, group, fits);
    if !fits {
        return None;
    }
    // SAFETY: `base` ranges of different groups come from one atomic counter
    // and exclusive prefixes are distinct within a group.
    out.write(unsafe { UniqueId::new(slot as usize) }, value);
    Some(slot)
}

/// [`compact_group`] for the CUDA block of the calling thread. `scratch` must
/// be the block's shared array.
#[device]
pub fn compact_block<T>(
    item: Option<T>,
    scratch: LocalSlice<'_, u32>,
    cursor: &AtomicU32,
    out: DeviceSliceMut<'_, T>,
    asserts: &AssertBuffer,
) -> Option<u32> {
    compact_group(&Block1D, item, scratch, cursor, out, asserts)
}

#[host]
fn run_compaction<T, F>(
    block: BlockDim1D,
    len: usize,
    out: &mut [T],
    item_at: F,
) -> Result<usize>
where
    T: Send,
    F: Fn(usize) -> Option<T> + Sync,
{
    let lanes = check_block(block)?;
    let groups = len.div_ceil(lanes).max(1);
    let mut scratch = vec![0u32; lanes];

    let cursor = AtomicU32::new(0);
    let mut asserts = AssertBuffer::new();
    let out = DeviceSliceMut::from(out);
    launch(GridDim1D::new(groups as i32), block, &mut scratch, |lane, scratch| {
        let at = lane.global_id();
        let item = if at < len { item_at(at) } else { None };
        compact_group(&lane, item, scratch, &cursor, out, &asserts);
    })?;

    if let Some(failure) = asserts.first_failure() {
        warn!(count = failure.count, lane = failure.global_id[0], "compaction dropped items");
    }
    let written = (cursor.into_inner() as usize).min(out.len());
    debug!(len, written, "compaction finished");
    Ok(written)
}

/// Moves the `Some` entries of `items` to the front of `out`, in no
/// particular order, and returns how many there were.
#[host]
pub fn compact<T>(block: BlockDim1D, items: &[Option<T>], out: &mut [T]) -> Result<usize>
where
    T: Copy + Send + Sync,
{
    check_output(items.iter().flatten().count(), out)?;
    run_compaction(block, items.len(), out, |i| items[i])
}

/// Lists the cells of a `size` grid for which `intersects` holds, one lane
/// per cell. Cells are visited in [`index3`](compute_std::indexing::index3)
/// order; the list comes back in no particular order.
#[host]
pub fn compact_cells<F>(size: [usize; 3], block: BlockDim1D, intersects: F) -> Result<Vec<PackedCell>>
where
    F: Fn([usize; 3]) -> bool + Sync,
{
    if size.iter().any(|&s| s > MAX_CELL_GRID) {
        return Err(LaunchError::GridTooLarge {
            size,
            max: MAX_CELL_GRID,
        });
    }
    check_block(block)?;
    let cells = size.iter().product();
    let mut list = vec![[0u8; 4]; cells];
    let count = run_compaction(block, cells, &mut list, |i| {
        let at = unindex3(size, i);
        intersects(at).then(|| [at[0] as u8, at[1] as u8, at[2] as u8, 0])
    })?;
    list.truncate(count);
    Ok(list)
}
