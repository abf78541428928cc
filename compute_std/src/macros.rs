#[inline]
#[cold]
pub fn __cold() {}

/// `assert!` on host, `__assertfail` on device; either way the condition
/// is also handed to the optimizer as a hint afterwards.
#[macro_export]
macro_rules! assert_universal {
    ($expr: expr) => {
        #[cfg(target_arch = "nvptx64")]
        $crate::cu_assert!($expr);
        #[cfg(not(target_arch = "nvptx64"))]
        assert!($expr);

        unsafe { core::hint::assert_unchecked($expr)};
    };
    ($expr: expr, $($arg:tt)+) => {
        #[cfg(target_arch = "nvptx64")]
        $crate::cu_assert!($expr, $($arg)+);
        #[cfg(not(target_arch = "nvptx64"))]
        assert!($expr, $($arg)+);

        unsafe { core::hint::assert_unchecked($expr)};
    };
}

#[macro_export]
macro_rules! panic_universal {
    ($($arg:tt)*) => {
        #[cfg(target_arch = "nvptx64")]
        {
            $crate::cu_panic!($($arg)*);
        }

        #[cfg(not(target_arch = "nvptx64"))]
        {
            panic!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! cu_assert {
    ($expr: expr) => {
        #[cfg(target_arch = "nvptx64")]
        if !($expr) {
            $crate::macros::__cold();
            unsafe {
                $crate::cuda::intrinsics::__assert_fail(
                    concat!(stringify!($expr), "\0").as_ptr(),
                    concat!(file!(), "\0").as_ptr(),
                    line!(),
                    "[fn cannot be captured]\0".as_ptr(),
                )
            };
        }
        #[cfg(not(target_arch = "nvptx64"))]
        compile_error!("Cannot call cu_assert outside PTX!");
    };
    ($expr: expr, $($arg:tt)+) => {
        #[cfg(target_arch = "nvptx64")]
        if !($expr) {
            $crate::macros::__cold();
            unsafe {
                $crate::cuda::intrinsics::__assert_fail(
                    format_args!($($arg)+).as_str().unwrap_or("[no msg]\0").as_ptr(),
                    concat!(file!(), "\0").as_ptr(),
                    line!(),
                    "[fn cannot be captured]\0".as_ptr(),
                )
            };
        }
        #[cfg(not(target_arch = "nvptx64"))]
        compile_error!("Cannot call cu_assert outside PTX!");
    };
}

#[macro_export]
macro_rules! cu_panic {
    ($($arg:tt)*) => {
        #[cfg(target_arch = "nvptx64")]
        unsafe {
            $crate::cuda::intrinsics::vprintf(format_args!($($arg)*).as_str().unwrap_or("[no msg]\0").as_ptr(), core::ptr::null_mut());
            $crate::cuda::intrinsics::__trap();
        }
        #[cfg(not(target_arch = "nvptx64"))]
        {
            compile_error!("Cannot call cu_panic outside PTX!");
        }
    };
}

/// `gpu_assert!(buffer, lane, condition)` records a failed `condition` in
/// the [`AssertBuffer`](crate::assert::AssertBuffer) and evaluates to `true`
/// when it failed. Execution always continues.
///
/// Without the `assert` feature the arguments are type-checked but never
/// evaluated, and the macro evaluates to `false`.
#[cfg(feature = "assert")]
#[macro_export]
macro_rules! gpu_assert {
    ($buffer: expr, $lane: expr, $cond: expr $(,)?) => {
        $crate::assert::check(
            $buffer,
            $lane,
            $cond,
            file!(),
            line!(),
            stringify!($cond),
        )
    };
}

#[cfg(not(feature = "assert"))]
#[macro_export]
macro_rules! gpu_assert {
    ($buffer: expr, $lane: expr, $cond: expr $(,)?) => {{
        let _ = || {
            let _: &$crate::assert::AssertBuffer = $buffer;
            let _ = $lane;
            let _: bool = $cond;
        };
        false
    }};
}

/// Emits its body only when the `assert` feature is on.
#[cfg(feature = "assert")]
#[macro_export]
macro_rules! when_assert {
    ($($body: tt)*) => {
        $($body)*
    };
}

#[cfg(not(feature = "assert"))]
#[macro_export]
macro_rules! when_assert {
    ($($body: tt)*) => {};
}
