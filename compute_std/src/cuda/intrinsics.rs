/// Declares one reader per PTX special register.
macro_rules! sreg_readers {
    ($($name: ident => $reg: literal),+ $(,)?) => {
        #[allow(improper_ctypes)]
        unsafe extern "C" {
            $(
                #[link_name = $reg]
                pub fn $name() -> i32;
            )+
        }
    };
}

sreg_readers!(
    __thread_idx_x => "llvm.nvvm.read.ptx.sreg.tid.x",
    __block_idx_x => "llvm.nvvm.read.ptx.sreg.ctaid.x",
    __block_dim_x => "llvm.nvvm.read.ptx.sreg.ntid.x",
);

unsafe extern "C" {
    /// `bar.sync 0`: returns once every thread of the block has arrived, with
    /// the shared and global writes made before it visible block-wide.
    #[link_name = "llvm.nvvm.barrier0"]
    pub fn __syncthreads();

    fn __assertfail(
        message: *const u8,
        file: *const u8,
        line: u32,
        function: *const u8,
        char_size: usize,
    );

    pub fn vprintf(format: *const u8, valist: *const core::ffi::c_void) -> i32;
}

/// Prints the failed assertion and traps, like CUDA C's `assert`.
#[inline]
pub unsafe fn __assert_fail(message: *const u8, file: *const u8, line: u32, function: *const u8) {
    unsafe { __assertfail(message, file, line, function, 1) };
}

pub unsafe fn __trap() -> ! {
    unsafe { core::arch::asm!("trap;") }
    loop {}
}
