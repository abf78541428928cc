use std::sync::Barrier;
use std::thread;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    gpu_safety::Workgroup,
    slices::LocalSlice,
    thread_layout::{BlockDim1D, GridDim1D, MAX_BLOCK_LANES},
};

pub type Result<T> = core::result::Result<T, LaunchError>;

/// Errors raised while setting up or running an emulated dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Empty launch: grid {grid:?}, block {block:?}")]
    EmptyLaunch { grid: GridDim1D, block: BlockDim1D },

    #[error("Block of {lanes} lanes exceeds the limit of {max}")]
    BlockTooLarge { lanes: usize, max: usize },

    #[error("Scratch holds {available} slots, group needs {needed}")]
    ScratchTooSmall { needed: usize, available: usize },

    #[error("Output holds {available} elements, dispatch may write {needed}")]
    OutputTooSmall { needed: usize, available: usize },

    #[error("Grid of {size:?} cells exceeds {max} per axis")]
    GridTooLarge { size: [usize; 3], max: usize },

    /// Only seen when the host build unwinds; device builds abort instead.
    #[error("Lane {lane} of group {group} panicked")]
    LanePanicked { group: usize, lane: usize },
}

/// A lane of an emulated workgroup, running on its own OS thread.
#[derive(Clone, Copy, Debug)]
pub struct HostLane<'g> {
    local_id: usize,
    local_size: usize,
    group_id: usize,
    barrier: &'g Barrier,
}

// SAFETY: `launch` hands out each local id once per group and the barrier
// is sized to the group, so it releases nobody until every lane waits.
unsafe impl Workgroup for HostLane<'_> {
    #[inline]
    fn local_id(&self) -> usize {
        self.local_id
    }
    #[inline]
    fn local_size(&self) -> usize {
        self.local_size
    }
    #[inline]
    fn group_id(&self) -> usize {
        self.group_id
    }
    #[inline]
    fn barrier(&self) {
        self.barrier.wait();
    }
}

/// Lanes per group of `block`, once it is known to be launchable. Call this
/// before sizing anything from `block.x`.
pub fn check_block(block: BlockDim1D) -> Result<usize> {
    if block.x <= 0 {
        return Err(LaunchError::EmptyLaunch {
            grid: GridDim1D::new(1),
            block,
        });
    }
    let lanes = block.x as usize;
    if lanes > MAX_BLOCK_LANES as usize {
        return Err(LaunchError::BlockTooLarge {
            lanes,
            max: MAX_BLOCK_LANES as usize,
        });
    }
    Ok(lanes)
}

fn validate(grid: GridDim1D, block: BlockDim1D) -> Result<(usize, usize)> {
    if grid.x <= 0 || block.x <= 0 {
        return Err(LaunchError::EmptyLaunch { grid, block });
    }
    Ok((grid.x as usize, check_block(block)?))
}

/// Checks that `output` can take `needed` elements.
pub fn check_output<T>(needed: usize, output: &[T]) -> Result<()> {
    if output.len() < needed {
        return Err(LaunchError::OutputTooSmall {
            needed,
            available: output.len(),
        });
    }
    Ok(())
}

/// Checks that `scratch` has a slot for every lane of `block`.
pub fn check_scratch<T>(block: BlockDim1D, scratch: &[T]) -> Result<()> {
    let needed = block.x.max(0) as usize;
    if scratch.len() < needed {
        return Err(LaunchError::ScratchTooSmall {
            needed,
            available: scratch.len(),
        });
    }
    Ok(())
}

/// Runs `kernel` once per lane of a `grid` x `block` dispatch.
///
/// Each group gets `block.x` threads and its own barrier; groups run one after
/// another. `shared` plays the role of group-local memory and is handed to
/// every group as is, so later groups start on whatever the previous one left.
///
/// A lane that panics while others wait at a barrier deadlocks the group,
/// exactly as a trapped lane hangs a real block. A panic that lets the group
/// finish is reported as [`LaunchError::LanePanicked`].
pub fn launch<T, F>(grid: GridDim1D, block: BlockDim1D, shared: &mut [T], kernel: F) -> Result<()>
where
    T: Send,
    F: Fn(HostLane<'_>, LocalSlice<'_, T>) + Sync,
{
    let (groups, lanes) = validate(grid, block)?;
    debug!(groups, lanes, scratch = shared.len(), "launching host dispatch");

    let scratch = LocalSlice::from(shared);
    let kernel = &kernel;
    for group_id in 0..groups {
        trace!(group_id, "running group");
        let barrier = Barrier::new(lanes);
        let panicked = thread::scope(|s| {
            let handles: Vec<_> = (0..lanes)
                .map(|local_id| {
                    let lane = HostLane {
                        local_id,
                        local_size: lanes,
                        group_id,
                        barrier: &barrier,
                    };
                    s.spawn(move || kernel(lane, scratch))
                })
                .collect();

            let mut first = None;
            for (local_id, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() && first.is_none() {
                    first = Some(local_id);
                }
            }
            first
        });

        if let Some(lane) = panicked {
            warn!(group = group_id, lane, "lane panicked, aborting dispatch");
            return Err(LaunchError::LanePanicked {
                group: group_id,
                lane,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn every_lane_runs_once_with_its_own_ids() {
        let seen = Mutex::new(Vec::new());
        let mut shared = [0u32; 0];
        launch(GridDim1D::new(3), BlockDim1D::new(5), &mut shared, |lane, _| {
            assert_eq!(lane.local_size(), 5);
            seen.lock().unwrap().push((lane.group_id(), lane.local_id(), lane.global_id()));
        })
        .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        let expected: Vec<_> = (0..3)
            .flat_map(|g| (0..5).map(move |l| (g, l, g * 5 + l)))
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn barrier_publishes_scratch_writes() {
        let results = Mutex::new(vec![0u32; 8]);
        let mut shared = [0u32; 8];
        launch(GridDim1D::new(1), BlockDim1D::new(8), &mut shared, |lane, scratch| {
            let me = lane.local_id();
            unsafe { scratch.write(me, me as u32 * 3) };
            lane.barrier();
            let neighbour = unsafe { scratch.read((me + 1) % 8) };
            results.lock().unwrap()[me] = neighbour;
        })
        .unwrap();

        let expected: Vec<u32> = (0..8).map(|i| ((i + 1) % 8) * 3).collect();
        assert_eq!(results.into_inner().unwrap(), expected);
    }

    #[test]
    fn later_groups_inherit_scratch_contents() {
        let mut shared = [0u64; 4];
        launch(GridDim1D::new(3), BlockDim1D::new(4), &mut shared, |lane, scratch| {
            let me = lane.local_id();
            let prev = unsafe { scratch.read(me) };
            lane.barrier();
            unsafe { scratch.write(me, prev + 1) };
        })
        .unwrap();
        assert_eq!(shared, [3; 4]);
    }

    #[test]
    fn rejects_bad_dimensions() {
        let mut shared = [0u8; 1];
        let err = launch(GridDim1D::new(0), BlockDim1D::new(4), &mut shared, |_, _| {});
        assert_eq!(
            err,
            Err(LaunchError::EmptyLaunch {
                grid: GridDim1D::new(0),
                block: BlockDim1D::new(4)
            })
        );
        let err = launch(GridDim1D::new(1), BlockDim1D::new(2048), &mut shared, |_, _| {});
        assert_eq!(
            err,
            Err(LaunchError::BlockTooLarge {
                lanes: 2048,
                max: 1024
            })
        );
    }

    #[test]
    fn reports_the_panicking_lane() {
        let mut shared = [0u8; 0];
        let err = launch(GridDim1D::new(2), BlockDim1D::new(4), &mut shared, |lane, _| {
            if lane.global_id() == 6 {
                panic!("lane 6 gives up");
            }
        });
        assert_eq!(err, Err(LaunchError::LanePanicked { group: 1, lane: 2 }));
    }

    #[test]
    fn block_check_runs_before_any_allocation() {
        assert_eq!(check_block(BlockDim1D::new(256)), Ok(256));
        assert_eq!(
            check_block(BlockDim1D::new(i32::MAX)),
            Err(LaunchError::BlockTooLarge {
                lanes: i32::MAX as usize,
                max: 1024
            })
        );
        assert!(matches!(
            check_block(BlockDim1D::new(-3)),
            Err(LaunchError::EmptyLaunch { .. })
        ));
    }

    #[test]
    fn scratch_check_counts_lanes() {
        assert!(check_scratch(BlockDim1D::new(4), &[0u32; 4]).is_ok());
        assert_eq!(
            check_scratch(BlockDim1D::new(4), &[0u32; 3]),
            Err(LaunchError::ScratchTooSmall {
                needed: 4,
                available: 3
            })
        );
        assert!(check_output(2, &[0u8; 2]).is_ok());
        assert_eq!(
            check_output(5, &[0u8; 2]),
            Err(LaunchError::OutputTooSmall {
                needed: 5,
                available: 2
            })
        );
    }
}
