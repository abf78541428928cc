/// PTX assembly wrappers + special register reads
#[cfg(target_arch = "nvptx64")]
pub mod intrinsics;
