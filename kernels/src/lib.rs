#![cfg_attr(target_arch = "nvptx64", no_std)]

/// Group-level reductions feeding global float and 64-bit totals.
pub mod accumulate;
/// Local stream compaction: scatter the kept items of a dispatch densely.
pub mod compaction;
