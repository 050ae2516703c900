//! Storage orders: which axis varies fastest in memory.
//!
//! Orders are zero-sized marker types so that "same order" is a constant of a
//! type pairing, not a run-time comparison.

use crate::{fatal, LoopError, Result};

/// Discriminant of a [`StorageOrder`], comparable in `const` context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKind {
    /// Last axis fastest.
    RowMajor,
    /// First axis fastest.
    ColMajor,
}

impl OrderKind {
    #[inline]
    pub const fn same(self, other: OrderKind) -> bool {
        matches!(
            (self, other),
            (OrderKind::RowMajor, OrderKind::RowMajor) | (OrderKind::ColMajor, OrderKind::ColMajor)
        )
    }
}

/// A storage order known at compile time.
pub trait StorageOrder: Copy + Default + std::fmt::Debug + 'static {
    const KIND: OrderKind;

    /// Axis visited at nesting `level` (0 is outermost) of an `ndim`-rank nest.
    fn axis_at(level: usize, ndim: usize) -> usize;

    /// All axes, outermost first.
    #[inline]
    fn traversal<const N: usize>() -> [usize; N] {
        std::array::from_fn(|level| Self::axis_at(level, N))
    }

    /// Element strides of a dense buffer with these extents.
    fn strides<const N: usize>(extents: &[usize; N]) -> [usize; N] {
        let mut strides = [0usize; N];
        let mut step = 1usize;
        for level in (0..N).rev() {
            let axis = Self::axis_at(level, N);
            strides[axis] = step;
            step *= extents[axis];
        }
        strides
    }
}

/// C order: the last axis varies fastest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RowMajor;

/// Fortran order: the first axis varies fastest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ColMajor;

impl StorageOrder for RowMajor {
    const KIND: OrderKind = OrderKind::RowMajor;

    #[inline(always)]
    fn axis_at(level: usize, _ndim: usize) -> usize {
        level
    }
}

impl StorageOrder for ColMajor {
    const KIND: OrderKind = OrderKind::ColMajor;

    #[inline(always)]
    fn axis_at(level: usize, ndim: usize) -> usize {
        ndim - 1 - level
    }
}

/// Whether two storage orders coincide.
#[inline(always)]
pub(crate) const fn same_order<A: StorageOrder, B: StorageOrder>() -> bool {
    A::KIND.same(B::KIND)
}

/// Linear offset of `index` under `strides`, with a bounds check.
#[inline]
pub(crate) fn offset<const N: usize>(
    index: &[usize; N],
    extents: &[usize; N],
    strides: &[usize; N],
) -> usize {
    let mut offset = 0usize;
    for axis in 0..N {
        if index[axis] >= extents[axis] {
            fatal(LoopError::IndexOutOfBounds {
                index: index.to_vec(),
                extents: extents.to_vec(),
            });
        }
        offset += index[axis] * strides[axis];
    }
    offset
}

/// Check that `dims` lists each of `0..dims.len()` exactly once.
pub(crate) fn check_permutation(dims: &[usize]) -> Result<()> {
    let mut seen = smallvec::SmallVec::<[bool; 8]>::from_elem(false, dims.len());
    for &d in dims {
        if d >= dims.len() || seen[d] {
            return Err(LoopError::InvalidPermutation(dims.to_vec()));
        }
        seen[d] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_and_col_major_strides() {
        assert_eq!(RowMajor::strides(&[2, 3, 4]), [12, 4, 1]);
        assert_eq!(ColMajor::strides(&[2, 3, 4]), [1, 2, 6]);
        assert_eq!(RowMajor::strides::<0>(&[]), []);
    }

    #[test]
    fn traversal_is_outermost_first() {
        assert_eq!(RowMajor::traversal::<3>(), [0, 1, 2]);
        assert_eq!(ColMajor::traversal::<3>(), [2, 1, 0]);
    }

    #[test]
    fn same_order_is_const() {
        const SAME: bool = same_order::<RowMajor, RowMajor>();
        const DIFF: bool = same_order::<RowMajor, ColMajor>();
        assert!(SAME);
        assert!(!DIFF);
    }

    #[test]
    fn offsets_follow_strides() {
        let strides = RowMajor::strides(&[2, 3]);
        assert_eq!(offset(&[1, 2], &[2, 3], &strides), 5);
        let strides = ColMajor::strides(&[2, 3]);
        assert_eq!(offset(&[1, 2], &[2, 3], &strides), 5);
        assert_eq!(offset(&[1, 0], &[2, 3], &strides), 1);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn offset_outside_extents_is_fatal() {
        offset(&[2, 0], &[2, 3], &[3, 1]);
    }

    #[test]
    fn permutations() {
        assert!(check_permutation(&[2, 0, 1]).is_ok());
        assert_eq!(
            check_permutation(&[0, 0]),
            Err(LoopError::InvalidPermutation(vec![0, 0]))
        );
        assert!(check_permutation(&[0, 2]).is_err());
    }
}
