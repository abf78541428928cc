use core::{cell::UnsafeCell, sync::atomic::Ordering};

/// Emits `atom.<sem>.global.<op>.<type>` for one memory ordering.
#[cfg(target_arch = "nvptx64")]
macro_rules! ptx_atom {
    ($sem: literal, $op: ident, $type: ty, $reg_ty: ident, $ptr: expr, $val: expr) => {{
        let old_val: $type;
        unsafe {
            core::arch::asm!(
                concat!("atom.", $sem, ".global.", stringify!($op), ".", stringify!($type), " {0}, [{1}], {2};"),
                out($reg_ty) old_val,
                in(reg64) $ptr,
                in($reg_ty) $val,
            )
        };
        old_val
    }};
}

macro_rules! impl_atomic_op {
    ($name:ident, $op:ident, $type:ty, $reg_ty: ident) => {
        #[cfg(target_arch = "nvptx64")]
        #[inline(always)]
        #[allow(unused)]
        pub unsafe fn $name(ptr: *mut $type, val: $type, order: Ordering) -> $type {
            match order {
                Ordering::Relaxed => ptx_atom!("relaxed", $op, $type, $reg_ty, ptr, val),
                Ordering::Acquire => ptx_atom!("acquire", $op, $type, $reg_ty, ptr, val),
                Ordering::Release => ptx_atom!("release", $op, $type, $reg_ty, ptr, val),
                Ordering::AcqRel => ptx_atom!("acq_rel", $op, $type, $reg_ty, ptr, val),
                Ordering::SeqCst => {
                    crate::cu_panic!("SeqCst is not supported on CUDA devices.");
                }
                _ => {
                    crate::cu_panic!("Unsupported ordering!");
                }
            }
        }
    };
}

impl_atomic_op!(atomic_add_f64, add, f64, reg64);
impl_atomic_op!(atomic_add_f32, add, f32, reg32);
impl_atomic_op!(atomic_add_u32, add, u32, reg32);

#[repr(C, align(8))]
pub struct AtomicF64 {
    v: UnsafeCell<f64>,
}

#[repr(C, align(4))]
pub struct AtomicF32 {
    v: UnsafeCell<f32>,
}

/// `u32` atomic that lowers to a single PTX `atom` on device.
#[repr(C, align(4))]
pub struct AtomicU32 {
    v: UnsafeCell<u32>,
}

// SAFETY: every access to `v` after construction goes through an atomic
// instruction (device) or a `core::sync::atomic` view (host).
unsafe impl Sync for AtomicF64 {}
unsafe impl Sync for AtomicF32 {}
unsafe impl Sync for AtomicU32 {}

trait UnsignedFloatStorage: Copy {
    type StorageT: Copy;
    type AtomicStorageT;
    fn shim_to_bits(&self) -> Self::StorageT;
    fn shim_from_bits(bit_rep: Self::StorageT) -> Self;
    unsafe fn shim_from_ptr<'a>(ptr: *mut Self::StorageT) -> &'a Self::AtomicStorageT;
    fn shim_load(param: &Self::AtomicStorageT, order: Ordering) -> Self::StorageT;
    fn shim_compare_exchange_weak(
        param: &Self::AtomicStorageT,
        current: Self::StorageT,
        new: Self::StorageT,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self::StorageT, Self::StorageT>;
}

macro_rules! float_storage {
    ($float: ty, $bits: ty, $atomic_bits: ty) => {
        #[cfg(not(any(target_arch = "nvptx64")))]
        impl UnsignedFloatStorage for $float {
            type StorageT = $bits;
            type AtomicStorageT = $atomic_bits;
            fn shim_from_bits(bit_rep: Self::StorageT) -> Self {
                Self::from_bits(bit_rep)
            }
            fn shim_to_bits(&self) -> Self::StorageT {
                self.to_bits()
            }
            unsafe fn shim_from_ptr<'a>(ptr: *mut Self::StorageT) -> &'a Self::AtomicStorageT {
                unsafe { Self::AtomicStorageT::from_ptr(ptr) }
            }
            fn shim_load(param: &Self::AtomicStorageT, order: Ordering) -> Self::StorageT {
                param.load(order)
            }
            fn shim_compare_exchange_weak(
                param: &Self::AtomicStorageT,
                current: Self::StorageT,
                new: Self::StorageT,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Self::StorageT, Self::StorageT> {
                param.compare_exchange_weak(current, new, success, failure)
            }
        }
    };
}

float_storage!(f32, u32, core::sync::atomic::AtomicU32);
float_storage!(f64, u64, core::sync::atomic::AtomicU64);

/// Generic backing implementation for an AtomicT(UnsafeCell<T>)
/// with a binary `op` taking `(orig, other)` and returning the value
/// we would like to be stored to the address should things work out.
///
/// We expect this to be substantially slower than hardware-supported
/// operations should they exist.
#[allow(unused)]
fn backing_float_impl<T: UnsignedFloatStorage>(
    cell_rep: &UnsafeCell<T>,
    val: T,
    op: impl Fn(T, T) -> T,
    order: Ordering,
) -> T {
    let failure = match order {
        Ordering::AcqRel | Ordering::Acquire => Ordering::Acquire,
        Ordering::Release | Ordering::Relaxed => Ordering::Relaxed,
        Ordering::SeqCst => Ordering::SeqCst,
        _ => {
            super::panic_universal!("Unsupported atomic ordering!");
        }
    };
    let v = unsafe { <T as UnsignedFloatStorage>::shim_from_ptr(cell_rep.get() as *mut _) };
    let mut f_bits: T::StorageT = T::shim_load(v, Ordering::Relaxed);
    loop {
        let f_old = T::shim_from_bits(f_bits);
        let f_new = op(f_old, val).shim_to_bits();
        match T::shim_compare_exchange_weak(v, f_bits, f_new, order, failure) {
            Ok(_) => break f_old,
            Err(new_old) => f_bits = new_old,
        }
    }
}

macro_rules! atomic_float {
    ($atomic: ident, $float: ty, $device_add: ident) => {
        impl $atomic {
            #[inline(always)]
            #[allow(unused)]
            pub const fn new(v: $float) -> Self {
                Self {
                    v: UnsafeCell::new(v),
                }
            }

            /// # Safety
            ///
            /// * `ptr` must be aligned to align_of::<Self>
            /// * `ptr` must be [valid] for both reads and writes for the whole lifetime `'a`.
            /// * You must adhere to the [Memory model for atomic accesses]. In particular, it is not
            ///   allowed to mix atomic and non-atomic accesses, or atomic accesses of different sizes,
            ///   without synchronization.
            ///
            /// [Memory model for atomic accesses]: https://doc.rust-lang.org/std/sync/atomic/#memory-model-for-atomic-accesses
            #[inline(always)]
            #[allow(unused)]
            pub const unsafe fn from_ptr<'a>(ptr: *mut $float) -> &'a Self {
                // SAFETY: guaranteed by the caller
                unsafe { &*ptr.cast() }
            }

            #[inline(always)]
            #[allow(unused)]
            pub fn get_mut(&mut self) -> &mut $float {
                self.v.get_mut()
            }

            #[inline(always)]
            #[allow(unused)]
            pub fn into_inner(self) -> $float {
                self.v.into_inner()
            }

            #[inline(always)]
            #[allow(unused)]
            pub fn fetch_add(&self, val: $float, order: Ordering) -> $float {
                #[cfg(target_arch = "nvptx64")]
                unsafe {
                    return $device_add(self.v.get(), val, order);
                }
                #[cfg(not(any(target_arch = "nvptx64")))]
                backing_float_impl(&self.v, val, |x, y| x + y, order)
            }
        }
    };
}

atomic_float!(AtomicF32, f32, atomic_add_f32);
atomic_float!(AtomicF64, f64, atomic_add_f64);

impl AtomicU32 {
    #[inline(always)]
    pub const fn new(v: u32) -> Self {
        Self {
            v: UnsafeCell::new(v),
        }
    }

    /// # Safety
    ///
    /// Same contract as [`AtomicF32::from_ptr`].
    #[inline(always)]
    pub const unsafe fn from_ptr<'a>(ptr: *mut u32) -> &'a Self {
        unsafe { &*ptr.cast() }
    }

    #[inline(always)]
    pub fn get_mut(&mut self) -> &mut u32 {
        self.v.get_mut()
    }

    #[inline(always)]
    pub fn into_inner(self) -> u32 {
        self.v.into_inner()
    }

    /// Wrapping add; returns the previous value.
    #[inline(always)]
    pub fn fetch_add(&self, val: u32, order: Ordering) -> u32 {
        #[cfg(target_arch = "nvptx64")]
        unsafe {
            return atomic_add_u32(self.v.get(), val, order);
        }
        #[cfg(not(any(target_arch = "nvptx64")))]
        unsafe { core::sync::atomic::AtomicU32::from_ptr(self.v.get()) }.fetch_add(val, order)
    }

    /// Only `Relaxed` is meaningful on device, where this is a volatile load.
    #[inline(always)]
    pub fn load(&self, order: Ordering) -> u32 {
        #[cfg(target_arch = "nvptx64")]
        {
            let _ = order;
            return unsafe { self.v.get().read_volatile() };
        }
        #[cfg(not(any(target_arch = "nvptx64")))]
        unsafe { core::sync::atomic::AtomicU32::from_ptr(self.v.get()) }.load(order)
    }
}

/// A 64-bit counter built from two 32-bit atomics, for devices (and
/// OpenCL 1.x targets) without 64-bit atomic add.
///
/// Each [`add`](Self::add) is two atomics: the low word first, then the
/// high word plus the carry out of the low word. Concurrent adders never lose
/// a carry, so the value is exact once every add has completed; a read while
/// adds are in flight may see a torn value.
#[repr(C, align(8))]
pub struct SplitCounter64 {
    lo: AtomicU32,
    hi: AtomicU32,
}

impl SplitCounter64 {
    pub const fn new(v: u64) -> Self {
        Self {
            lo: AtomicU32::new(v as u32),
            hi: AtomicU32::new((v >> 32) as u32),
        }
    }

    #[inline(always)]
    pub fn add(&self, val: u64, order: Ordering) {
        let (val_lo, val_hi) = (val as u32, (val >> 32) as u32);
        let old_lo = self.lo.fetch_add(val_lo, order);
        let (_, carry) = old_lo.overflowing_add(val_lo);
        let hi_delta = val_hi.wrapping_add(carry as u32);
        if hi_delta != 0 {
            self.hi.fetch_add(hi_delta, order);
        }
    }

    /// Not a consistent snapshot while adds are in flight.
    #[inline(always)]
    pub fn load(&self, order: Ordering) -> u64 {
        let hi = self.hi.load(order) as u64;
        let lo = self.lo.load(order) as u64;
        (hi << 32) | lo
    }

    pub fn into_inner(self) -> u64 {
        ((self.hi.into_inner() as u64) << 32) | self.lo.into_inner() as u64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn float_add_returns_previous() {
        let a = AtomicF32::new(1.0);
        assert_eq!(a.fetch_add(2.5, Ordering::Relaxed), 1.0);
        assert_eq!(a.into_inner(), 3.5);

        let mut b = AtomicF64::new(-1.0);
        b.fetch_add(0.25, Ordering::AcqRel);
        assert_eq!(*b.get_mut(), -0.75);
    }

    #[test]
    fn u32_add_wraps() {
        let a = AtomicU32::new(u32::MAX);
        assert_eq!(a.fetch_add(2, Ordering::Relaxed), u32::MAX);
        assert_eq!(a.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn split_counter_carries_into_high_word() {
        let c = SplitCounter64::new(u32::MAX as u64 - 1);
        c.add(3, Ordering::Relaxed);
        assert_eq!(c.load(Ordering::Relaxed), u32::MAX as u64 + 2);
        c.add(5 << 32, Ordering::Relaxed);
        assert_eq!(c.into_inner(), (6 << 32) + 1);
    }

    #[test]
    fn split_counter_is_exact_under_contention() {
        let c = SplitCounter64::new(0);
        let per_thread: u64 = 0x1_0000_0003;
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        c.add(per_thread, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(c.into_inner(), per_thread * 8000);
    }

    #[test]
    fn float_add_is_exact_for_integral_values_under_contention() {
        let a = AtomicF64::new(0.0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..500 {
                        a.fetch_add(2.0, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(a.into_inner(), 4000.0);
    }
}
