pub use crate::gpu_safety::{ThreadLayout, Workgroup};

/// Hardware ceiling on lanes per block (CUDA `maxThreadsPerBlock`).
pub const MAX_BLOCK_LANES: u32 = 1024;

// Out-of-the-box working thread layouts which guarantee index uniqueness per-thread.

#[allow(unused)]
pub struct FlatLayout1D;

unsafe impl ThreadLayout for FlatLayout1D {
    #[cfg(target_arch = "nvptx64")]
    #[inline(always)] // Actually very important! Cross-crate inlining required.
    fn uid(&self) -> crate::gpu_safety::UniqueId {
        let uid = (Thread1D::thread_idx().x as usize)
            + (Thread1D::block_idx().x as usize) * (Thread1D::block_dim().x as usize);
        unsafe { crate::gpu_safety::UniqueId::new(uid) }
    }
}

/// The CUDA thread block of the calling thread, seen as a 1D workgroup.
#[allow(unused)]
#[derive(Clone, Copy)]
pub struct Block1D;

#[cfg(target_arch = "nvptx64")]
unsafe impl Workgroup for Block1D {
    #[inline(always)]
    fn local_id(&self) -> usize {
        Thread1D::thread_idx().x as usize
    }
    #[inline(always)]
    fn local_size(&self) -> usize {
        Thread1D::block_dim().x as usize
    }
    #[inline(always)]
    fn group_id(&self) -> usize {
        Thread1D::block_idx().x as usize
    }
    #[inline(always)]
    fn barrier(&self) {
        unsafe { crate::cuda::intrinsics::__syncthreads() }
    }
}

#[cfg(not(any(target_arch = "nvptx64")))]
unsafe impl Workgroup for Block1D {
    fn local_id(&self) -> usize {
        panic!("Attempting to read a CUDA thread index from host code!");
    }
    fn local_size(&self) -> usize {
        panic!("Attempting to read a CUDA block size from host code!");
    }
    fn group_id(&self) -> usize {
        panic!("Attempting to read a CUDA block index from host code!");
    }
    fn barrier(&self) {
        panic!("Attempting to synchronize a CUDA block from host code!");
    }
}

// threadIdx, blockIdx, blockDim and gridDim of a 1D launch.

macro_rules! dim_types {
    ($($name: ident),+ $(,)?) => {
        $(
            #[derive(Clone, Copy, Debug, PartialEq, Eq)]
            pub struct $name {
                pub x: i32,
            }

            impl $name {
                pub fn new(x: i32) -> Self {
                    Self { x }
                }
            }
        )+
    };
}

dim_types!(ThreadIdx1D, BlockIdx1D, BlockDim1D, GridDim1D);

/// Special-register readers of a 1D launch.
pub struct Thread1D;

#[cfg(target_arch = "nvptx64")]
impl Thread1D {
    #[inline(always)]
    pub fn thread_idx() -> ThreadIdx1D {
        ThreadIdx1D::new(unsafe { crate::cuda::intrinsics::__thread_idx_x() })
    }
    #[inline(always)]
    pub fn block_idx() -> BlockIdx1D {
        BlockIdx1D::new(unsafe { crate::cuda::intrinsics::__block_idx_x() })
    }
    #[inline(always)]
    pub fn block_dim() -> BlockDim1D {
        BlockDim1D::new(unsafe { crate::cuda::intrinsics::__block_dim_x() })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[should_panic(expected = "host code")]
    fn cuda_block_is_device_only() {
        Block1D.barrier();
    }
}
