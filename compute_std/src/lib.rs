#![cfg_attr(target_arch = "nvptx64", no_std)]
// Necessary because PTX + kernels are not really stable
#![cfg_attr(target_arch = "nvptx64", feature(abi_ptx))]
#![cfg_attr(target_arch = "nvptx64", feature(asm_experimental_arch))]
// LLVM intrinsics are used for e.g. getting blockDim.x from a special register.
#![cfg_attr(target_arch = "nvptx64", allow(internal_features))]
#![cfg_attr(target_arch = "nvptx64", feature(link_llvm_intrinsics))]

/// Debug-assertion channel recording the first failed check of a dispatch.
pub mod assert;
/// Atomic primitives, particularly because some core::sync::atomic types
/// do not link well, and atomic floats are not supported.
pub mod atomic;
/// Wrappers around PTX assembly + special registers.
pub mod cuda;
/// Core primitive types and traits for safety in the GPU compute regime.
pub mod gpu_safety;
/// Host emulation of workgroups: one thread per lane, a real barrier per group.
#[cfg(not(target_arch = "nvptx64"))]
pub mod host;
/// Flat 2D/3D index conventions.
pub mod indexing;
/// Declarative macros, especially `assert_universal!` and `gpu_assert!`
pub mod macros;
/// Workgroup-local permuted prefix sum and reduction.
pub mod scan;
/// Slice handles for global buffers and group-local scratch.
pub mod slices;
/// Launch dimensions, the CUDA block as a `Workgroup`, and the known-safe
/// `FlatLayout1D` access pattern
pub mod thread_layout;
