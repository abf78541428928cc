//! Flat offsets of 2D/3D grid coordinates.
//!
//! Two conventions coexist and the consumer picks one:
//!
//! * fastest-varying-last (`index2`, `index3`): the last coordinate moves
//!   fastest, `z + sz * (y + sy * x)`. Sampling grids use this one.
//! * fastest-varying-first (`index2_fastest_first`, `index3_fastest_first`):
//!   `x + sx * (y + sy * z)`, matching CUDA's `threadIdx.x`-major order.
//!
//! No bounds checks are made; out-of-range coordinates alias other cells.

#[inline(always)]
pub const fn index2(size: [usize; 2], at: [usize; 2]) -> usize {
    at[1] + size[1] * at[0]
}

#[inline(always)]
pub const fn index3(size: [usize; 3], at: [usize; 3]) -> usize {
    at[2] + size[2] * (at[1] + size[1] * at[0])
}

#[inline(always)]
pub const fn index2_fastest_first(size: [usize; 2], at: [usize; 2]) -> usize {
    at[0] + size[0] * at[1]
}

#[inline(always)]
pub const fn index3_fastest_first(size: [usize; 3], at: [usize; 3]) -> usize {
    at[0] + size[0] * (at[1] + size[1] * at[2])
}

/// Inverse of [`index3`].
#[inline(always)]
pub const fn unindex3(size: [usize; 3], flat: usize) -> [usize; 3] {
    let z = flat % size[2];
    let rest = flat / size[2];
    [rest / size[1], rest % size[1], z]
}

/// Inverse of [`index3_fastest_first`].
#[inline(always)]
pub const fn unindex3_fastest_first(size: [usize; 3], flat: usize) -> [usize; 3] {
    let x = flat % size[0];
    let rest = flat / size[0];
    [x, rest % size[1], rest / size[1]]
}

/// `index2!(sx, sy, x, y)`, fastest-varying-last.
#[macro_export]
macro_rules! index2 {
    ($sx: expr, $sy: expr, $x: expr, $y: expr) => {
        $crate::indexing::index2([$sx, $sy], [$x, $y])
    };
}

/// `index3!(sx, sy, sz, x, y, z)`, fastest-varying-last.
#[macro_export]
macro_rules! index3 {
    ($sx: expr, $sy: expr, $sz: expr, $x: expr, $y: expr, $z: expr) => {
        $crate::indexing::index3([$sx, $sy, $sz], [$x, $y, $z])
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fastest_last_walks_z_first() {
        let size = [2, 3, 4];
        assert_eq!(index3(size, [0, 0, 0]), 0);
        assert_eq!(index3(size, [0, 0, 1]), 1);
        assert_eq!(index3(size, [0, 1, 0]), 4);
        assert_eq!(index3(size, [1, 0, 0]), 12);
        assert_eq!(index3!(2, 3, 4, 1, 2, 3), 23);
        assert_eq!(index2!(5, 7, 2, 3), 17);
    }

    #[test]
    fn fastest_first_walks_x_first() {
        let size = [2, 3, 4];
        assert_eq!(index3_fastest_first(size, [1, 0, 0]), 1);
        assert_eq!(index3_fastest_first(size, [0, 1, 0]), 2);
        assert_eq!(index3_fastest_first(size, [0, 0, 1]), 6);
        assert_eq!(index2_fastest_first([5, 7], [2, 3]), 17);
    }

    #[test]
    fn every_cell_has_its_own_offset() {
        let size = [3, 4, 5];
        let cells = size[0] * size[1] * size[2];
        let mut seen_last = vec![false; cells];
        let mut seen_first = vec![false; cells];
        for x in 0..size[0] {
            for y in 0..size[1] {
                for z in 0..size[2] {
                    let last = index3(size, [x, y, z]);
                    let first = index3_fastest_first(size, [x, y, z]);
                    assert!(!seen_last[last] && !seen_first[first]);
                    seen_last[last] = true;
                    seen_first[first] = true;
                    assert_eq!(unindex3(size, last), [x, y, z]);
                    assert_eq!(unindex3_fastest_first(size, first), [x, y, z]);
                }
            }
        }
        assert!(seen_last.iter().chain(seen_first.iter()).all(|&s| s));
    }
}
