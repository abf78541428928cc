//! Non-fatal assertions for kernels.
//!
//! A failed [`gpu_assert!`](crate::gpu_assert) does not stop the lane. It bumps
//! the failure count of an [`AssertBuffer`] living in global memory, and the
//! first failure of the dispatch also leaves its lane id, line, file and
//! expression there for the host to pick up afterwards.

use core::{cell::UnsafeCell, sync::atomic::Ordering};

use crate::{atomic::AtomicU32, gpu_safety::Workgroup};

pub const ASSERT_BUFFER_SIZE: usize = 1024;
const HEADER_SIZE: usize = 4 + 4 * 4 + 4;
const TEXT_SIZE: usize = ASSERT_BUFFER_SIZE - HEADER_SIZE;

/// Shared record of failed assertions. Zeroing the count re-arms it.
#[repr(C)]
pub struct AssertBuffer {
    count: AtomicU32,
    global_id: UnsafeCell<[u32; 4]>,
    line: UnsafeCell<u32>,
    /// `file\0expression\0`, truncated to fit.
    text: UnsafeCell<[u8; TEXT_SIZE]>,
}

const _: () = assert!(core::mem::size_of::<AssertBuffer>() == ASSERT_BUFFER_SIZE);

// SAFETY: only the lane that moved the count off zero writes the details, and
// the host reads them through `&mut self` once the dispatch is over.
unsafe impl Sync for AssertBuffer {}

/// The first failure recorded in an [`AssertBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertDetails<'a> {
    /// Failures seen since the last reset, this one included.
    pub count: u32,
    pub global_id: [u32; 4],
    pub line: u32,
    /// Raw `file\0expression\0` bytes; the tail is NUL padding or whatever an
    /// earlier failure left behind.
    pub text: &'a [u8],
}

impl Default for AssertBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AssertBuffer {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            global_id: UnsafeCell::new([0; 4]),
            line: UnsafeCell::new(0),
            text: UnsafeCell::new([0; TEXT_SIZE]),
        }
    }

    /// Records one failure. Returns `true` if it was the first since the last
    /// reset, in which case its details were stored.
    #[cold]
    pub fn report(&self, global_id: [u32; 4], file: &str, line: u32, expr: &str) -> bool {
        if self.count.fetch_add(1, Ordering::Relaxed) != 0 {
            return false;
        }
        // SAFETY: we are the only lane that saw a zero count.
        unsafe {
            self.global_id.get().write(global_id);
            self.line.get().write(line);
            let text = &mut *self.text.get();
            let written = copy_terminated(&mut text[..], file.as_bytes());
            copy_terminated(&mut text[written..], expr.as_bytes());
        }
        true
    }

    pub fn failure_count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Details of the first failure, if any failure happened.
    pub fn first_failure(&mut self) -> Option<AssertDetails<'_>> {
        let count = *self.count.get_mut();
        if count == 0 {
            return None;
        }
        Some(AssertDetails {
            count,
            global_id: *self.global_id.get_mut(),
            line: *self.line.get_mut(),
            text: &self.text.get_mut()[..],
        })
    }

    /// Clears the count. The stale details are simply overwritten by the
    /// next first failure.
    pub fn reset(&mut self) {
        *self.count.get_mut() = 0;
    }
}

/// Copies `src` and a NUL into `dst`, cutting `src` short when it does not
/// fit. Returns the number of bytes written.
fn copy_terminated(dst: &mut [u8], src: &[u8]) -> usize {
    if dst.is_empty() {
        return 0;
    }
    let len = src.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&src[..len]);
    dst[len] = 0;
    len + 1
}

/// Backend of [`gpu_assert!`](crate::gpu_assert): `true` when `ok` is false.
#[inline(always)]
pub fn check<W: Workgroup + ?Sized>(
    buffer: &AssertBuffer,
    lane: &W,
    ok: bool,
    file: &str,
    line: u32,
    expr: &str,
) -> bool {
    if ok {
        return false;
    }
    buffer.report([lane.global_id() as u32, 0, 0, 0], file, line, expr);
    true
}
