//! Workgroup-wide scans over group-local scratch.
//!
//! [`workgroup_prefix_sum`] is a work-efficient inclusive scan whose output is
//! *permuted*: lane `i` does not receive the prefix ending at lane `i`, but the
//! prefix ending at position [`scan_position(i, n)`](scan_position) of a fixed
//! logical ordering of the lanes. The ordering sorts lanes by their index with
//! the `log2(n.next_power_of_two())` low bits reversed, largest first. Lane 0
//! therefore always comes last and receives the reduction of the whole group,
//! and for `n = 4` the lanes appear in the order `[3, 1, 2, 0]`.
//!
//! The permutation costs nothing and is harmless when the scan feeds stream
//! compaction: each lane still learns a unique slot (`result - value`, the
//! exclusive prefix) and lane 0 learns how many slots were used.

use num_traits::{WrappingAdd, Zero};

use crate::{gpu_safety::Workgroup, slices::LocalSlice};

/// A value with an identity and an associative combine, scanned in logical
/// order (earlier positions on the left).
pub trait ScanElement: Copy {
    fn identity() -> Self;
    fn combine(self, rhs: Self) -> Self;
}

macro_rules! wrapping_scan_element {
    ($($int: ty),+) => {
        $(
            impl ScanElement for $int {
                #[inline(always)]
                fn identity() -> Self {
                    <$int as Zero>::zero()
                }
                /// Wraps around on overflow, like the native unsigned add.
                #[inline(always)]
                fn combine(self, rhs: Self) -> Self {
                    WrappingAdd::wrapping_add(&self, &rhs)
                }
            }
        )+
    };
}

macro_rules! float_scan_element {
    ($($float: ty),+) => {
        $(
            impl ScanElement for $float {
                #[inline(always)]
                fn identity() -> Self {
                    <$float as Zero>::zero()
                }
                #[inline(always)]
                fn combine(self, rhs: Self) -> Self {
                    self + rhs
                }
            }
        )+
    };
}

wrapping_scan_element!(u32, u64);
float_scan_element!(f32, f64);

/// Position in the logical scan order of the prefix that `lane` receives from
/// [`workgroup_prefix_sum`] in a group of `group_size` lanes.
///
/// This is the number of lanes whose bit-reversed index is larger than the
/// bit-reversed `lane`. For a power-of-two group it equals
/// `group_size - 1 - reverse(lane)`.
pub fn scan_position(lane: usize, group_size: usize) -> usize {
    let bits = group_size.next_power_of_two().trailing_zeros();
    let reversed = |i: usize| match bits {
        0 => 0,
        _ => i.reverse_bits() >> (usize::BITS - bits),
    };
    let key = reversed(lane);
    (0..group_size).filter(|&j| reversed(j) > key).count()
}

/// Permuted inclusive prefix sum across the lanes of `group`.
///
/// Every lane of the group must call this exactly once, with the same
/// `scratch` holding at least `local_size` slots. Lane 0 receives the
/// reduction of every lane's `value`; see the module docs for what the other
/// lanes receive. `scratch` is garbage before and after the call, and may be
/// reused by the caller as soon as it returns.
///
/// Nothing is bounds checked in release builds. Calling from a subset of the
/// group, or with a short scratch, is undefined behaviour.
#[inline]
pub fn workgroup_prefix_sum<T, W>(group: &W, value: T, scratch: LocalSlice<'_, T>) -> T
where
    T: ScanElement,
    W: Workgroup + ?Sized,
{
    let n = group.local_size();
    let lane = group.local_id();
    debug_assert!(scratch.len() >= n, "scan of {n} lanes given {} slots", scratch.len());
    if n <= 1 {
        return value;
    }
    let span = n.next_power_of_two();

    let subtotal = up_sweep(group, lane, n, span, value, scratch);

    // Lane 0 covers the whole group and sits last in the order.
    let mut result = subtotal;
    let mut carry = T::identity();
    let mut half = 1;
    while half < span {
        if lane < half && lane + half < n {
            // The partner's block precedes ours: hand it our carry and
            // skip past it.
            unsafe {
                let partner_total = scratch.read(lane + half);
                scratch.write(lane + half, carry);
                carry = carry.combine(partner_total);
            }
        }
        group.barrier();
        if (half..2 * half).contains(&lane) {
            carry = unsafe { scratch.read(lane) };
            result = carry.combine(subtotal);
        }
        half *= 2;
    }

    group.barrier();
    result
}

/// Reduction of every lane's `value`, delivered to lane 0 only.
///
/// Same calling contract as [`workgroup_prefix_sum`] at roughly half the
/// cost. Other lanes receive a partial sum of no particular use.
#[inline]
pub fn workgroup_reduce<T, W>(group: &W, value: T, scratch: LocalSlice<'_, T>) -> T
where
    T: ScanElement,
    W: Workgroup + ?Sized,
{
    let n = group.local_size();
    debug_assert!(scratch.len() >= n, "reduce of {n} lanes given {} slots", scratch.len());
    if n <= 1 {
        return value;
    }
    let total = up_sweep(group, group.local_id(), n, n.next_power_of_two(), value, scratch);
    group.barrier();
    total
}

/// Folds the group into lane 0. On return, lane `l` in `[h, 2h)` holds the
/// total of lanes `l, l + 2h, l + 4h, ...` and has published it in
/// `scratch[l]`.
#[inline(always)]
fn up_sweep<T, W>(group: &W, lane: usize, n: usize, span: usize, value: T, scratch: LocalSlice<'_, T>) -> T
where
    T: ScanElement,
    W: Workgroup + ?Sized,
{
    let mut acc = value;
    let mut half = span / 2;
    while half > 0 {
        if (half..2 * half).contains(&lane) {
            unsafe { scratch.write(lane, acc) };
        }
        group.barrier();
        if lane < half && lane + half < n {
            acc = unsafe { scratch.read(lane + half) }.combine(acc);
        }
        half /= 2;
    }
    acc
}
