use core::{
    marker::PhantomData,
    ops::Index,
};

use crate::{
    assert_universal,
    atomic::{AtomicF32, AtomicF64, AtomicU32},
    gpu_safety::UniqueId,
};

/// Read-only global buffer, shared by every lane of a dispatch.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DeviceSlice<'a, T>(&'a [T]);

/// Writable global buffer, shared by every lane of a dispatch.
///
/// Lanes may only write through a [`UniqueId`], so no two lanes ever write
/// the same element.
#[repr(C)]
pub struct DeviceSliceMut<'a, T> {
    ptr: *mut T,
    len: usize,
    _borrow: PhantomData<&'a mut [T]>,
}

/// Group-local scratch memory (CUDA `__shared__`, OpenCL `__local`).
///
/// Every lane of a workgroup holds a copy of the same handle. Accesses are
/// unchecked in release builds; callers separate conflicting accesses with
/// [`Workgroup::barrier`](crate::gpu_safety::Workgroup::barrier).
#[repr(C)]
pub struct LocalSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _borrow: PhantomData<&'a mut [T]>,
}

// SAFETY: the handles only hand out element access under the per-element
// exclusivity rules documented on each accessor.
unsafe impl<T: Send> Send for DeviceSliceMut<'_, T> {}
unsafe impl<T: Send> Sync for DeviceSliceMut<'_, T> {}
unsafe impl<T: Send> Send for LocalSlice<'_, T> {}
unsafe impl<T: Send> Sync for LocalSlice<'_, T> {}

impl<T> Clone for DeviceSliceMut<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for DeviceSliceMut<'_, T> {}

impl<T> Clone for LocalSlice<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for LocalSlice<'_, T> {}

impl<'a, T> DeviceSlice<'a, T> {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    #[inline(always)]
    pub fn as_ptr(&self) -> *const T {
        self.0.as_ptr()
    }
    #[inline(always)]
    pub fn get(&self, idx: usize) -> Option<&'a T> {
        self.0.get(idx)
    }

    /// # Safety
    ///
    /// `ptr` must be valid for `len` reads for the whole lifetime `'a`.
    #[inline(always)]
    pub unsafe fn from_raw_parts(ptr: *const T, len: usize) -> Self {
        Self(unsafe { core::slice::from_raw_parts(ptr, len) })
    }
}

impl<'a, T> DeviceSliceMut<'a, T> {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    #[inline(always)]
    pub fn as_mut_ptr(&self) -> *mut T {
        self.ptr
    }

    /// # Safety
    ///
    /// `ptr` must be valid for `len` reads and writes for the whole lifetime
    /// `'a`, and nothing outside the dispatch may access it meanwhile.
    #[inline(always)]
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> Self {
        Self {
            ptr,
            len,
            _borrow: PhantomData,
        }
    }

    /// Stores `value` at `idx`. Panics (or traps) when out of bounds.
    #[inline(always)]
    pub fn write(&self, idx: UniqueId, value: T) {
        assert_universal!(idx.idx() < self.len, "Out of bounds for device write!");
        // SAFETY: in bounds, and `UniqueId` guarantees no other lane writes
        // this element during the dispatch.
        unsafe { self.ptr.add(idx.idx()).write(value) }
    }
}

impl<'a, T> From<&'a mut [T]> for DeviceSliceMut<'a, T> {
    #[inline(always)]
    fn from(value: &'a mut [T]) -> Self {
        Self {
            ptr: value.as_mut_ptr(),
            len: value.len(),
            _borrow: PhantomData,
        }
    }
}

impl<'a, T> LocalSlice<'a, T> {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Safety
    ///
    /// `ptr` must point to `len` elements of group-local memory valid for the
    /// lifetime `'a`.
    #[inline(always)]
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> Self {
        Self {
            ptr,
            len,
            _borrow: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `idx < self.len()`, and no lane writes this slot between the last
    /// barrier and the next one.
    #[inline(always)]
    pub unsafe fn read(&self, idx: usize) -> T
    where
        T: Copy,
    {
        debug_assert!(idx < self.len, "scratch read {idx} past {}", self.len);
        unsafe { self.ptr.add(idx).read() }
    }

    /// # Safety
    ///
    /// `idx < self.len()`, and no other lane reads or writes this slot between
    /// the last barrier and the next one.
    #[inline(always)]
    pub unsafe fn write(&self, idx: usize, value: T) {
        debug_assert!(idx < self.len, "scratch write {idx} past {}", self.len);
        unsafe { self.ptr.add(idx).write(value) }
    }
}

impl<'a, T> From<&'a mut [T]> for LocalSlice<'a, T> {
    #[inline(always)]
    fn from(value: &'a mut [T]) -> Self {
        Self {
            ptr: value.as_mut_ptr(),
            len: value.len(),
            _borrow: PhantomData,
        }
    }
}

pub trait IntoAtomic {
    type Atomic;
    unsafe fn into_atomic<'a>(ptr: *mut Self) -> &'a Self::Atomic;
}

impl IntoAtomic for f32 {
    type Atomic = AtomicF32;
    unsafe fn into_atomic<'a>(ptr: *mut Self) -> &'a Self::Atomic {
        unsafe { AtomicF32::from_ptr(ptr) }
    }
}

impl IntoAtomic for f64 {
    type Atomic = AtomicF64;
    unsafe fn into_atomic<'a>(ptr: *mut Self) -> &'a Self::Atomic {
        unsafe { AtomicF64::from_ptr(ptr) }
    }
}

impl IntoAtomic for u32 {
    type Atomic = AtomicU32;
    unsafe fn into_atomic<'a>(ptr: *mut Self) -> &'a Self::Atomic {
        unsafe { AtomicU32::from_ptr(ptr) }
    }
}

impl<'a, T: IntoAtomic> DeviceSliceMut<'a, T> {
    /// Atomic view of one element. Any lane may take one for any index; all
    /// accesses to that element during the dispatch must then be atomic.
    #[inline(always)]
    pub fn atomic_ref(&self, idx: impl Into<usize>) -> &'a T::Atomic {
        let idx: usize = idx.into();
        assert_universal!(idx < self.len, "Out of bounds for atomic ref!");
        unsafe { T::into_atomic(self.ptr.add(idx)) }
    }
}

impl<'a, T> From<&'a [T]> for DeviceSlice<'a, T> {
    #[inline(always)]
    fn from(value: &'a [T]) -> Self {
        Self(value)
    }
}

impl<'a, T> From<&'a mut [T]> for DeviceSlice<'a, T> {
    #[inline(always)]
    fn from(value: &'a mut [T]) -> Self {
        Self(value)
    }
}

impl<'a, T> Index<usize> for DeviceSlice<'a, T> {
    type Output = T;
    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        assert_universal!(index < self.0.len());
        &self.0[index]
    }
}

impl<'a, T> Index<UniqueId> for DeviceSlice<'a, T> {
    type Output = T;
    #[inline(always)]
    fn index(&self, index: UniqueId) -> &Self::Output {
        assert_universal!(index.idx() < self.0.len());
        &self.0[index.idx()]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::sync::atomic::Ordering;

    #[test]
    fn unique_writes_land_in_place() {
        let mut out = [0u32; 4];
        {
            let dev = DeviceSliceMut::from(out.as_mut_slice());
            for i in 0..4 {
                dev.write(unsafe { UniqueId::new(i) }, (i * 10) as u32);
            }
        }
        assert_eq!(out, [0, 10, 20, 30]);
    }

    #[test]
    #[should_panic(expected = "Out of bounds")]
    fn device_write_is_bounds_checked() {
        let mut out = [0u32; 2];
        let dev = DeviceSliceMut::from(out.as_mut_slice());
        dev.write(unsafe { UniqueId::new(2) }, 1);
    }

    #[test]
    fn atomic_refs_alias_the_element() {
        let mut acc = [0.0f32, 1.5];
        {
            let dev = DeviceSliceMut::from(acc.as_mut_slice());
            dev.atomic_ref(1usize).fetch_add(2.0, Ordering::Relaxed);
            dev.atomic_ref(1usize).fetch_add(0.5, Ordering::Relaxed);
        }
        assert_eq!(acc, [0.0, 4.0]);
    }

    #[test]
    fn local_slots_round_trip() {
        let mut scratch = [7u64; 3];
        let local = LocalSlice::from(scratch.as_mut_slice());
        assert_eq!(local.len(), 3);
        unsafe {
            local.write(1, 42);
            assert_eq!(local.read(1), 42);
            assert_eq!(local.read(0), 7);
        }
    }

    #[test]
    fn read_only_views_index() {
        let data = [3, 1, 4];
        let dev = DeviceSlice::from(data.as_slice());
        assert_eq!(dev[2], 4);
        assert_eq!(dev[unsafe { UniqueId::new(0) }], 3);
        assert!(dev.get(3).is_none());
    }
}
