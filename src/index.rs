//! N-dimensional positions.
//!
//! [`Index`] owns its coordinates and carries its rank in the type, so
//! comparing or adding indices of different rank does not compile.
//! [`SubIndex`] and [`Fused`] borrow the indices they are built from instead
//! of copying them; their rank is only known at run time and mismatches are
//! fatal.

use crate::coord::Coord;
use crate::{fatal, LoopError};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::ops;

/// Read access to an ordered list of axis coordinates.
pub trait IndexLike {
    /// Number of axes.
    fn ndim(&self) -> usize;

    /// Coordinate along `axis`. Panics if `axis >= ndim()`.
    fn coord(&self, axis: usize) -> usize;

    /// Copy the coordinates out.
    fn to_smallvec(&self) -> SmallVec<[usize; 8]> {
        (0..self.ndim()).map(|axis| self.coord(axis)).collect()
    }

    /// Borrow the axes in `axes` as an index of their own.
    fn slice(&self, axes: ops::Range<usize>) -> SubIndex<'_, Self>
    where
        Self: Sized,
    {
        if axes.start > axes.end || axes.end > self.ndim() {
            fatal(LoopError::IndexOutOfBounds {
                index: vec![axes.start, axes.end],
                extents: vec![self.ndim()],
            });
        }
        SubIndex {
            parent: self,
            start: axes.start,
            len: axes.end - axes.start,
        }
    }

    /// Concatenate with `other`, without copying either side.
    fn fuse<'b, R: IndexLike>(&self, other: &'b R) -> Fused<'_, 'b, Self, R>
    where
        Self: Sized,
    {
        Fused {
            left: self,
            right: other,
        }
    }

    /// Materialize as an [`Index`] of rank `K`. A rank mismatch is fatal.
    fn to_index<const K: usize>(&self) -> Index<K> {
        if self.ndim() != K {
            fatal(LoopError::RankMismatch(self.ndim(), K));
        }
        Index(std::array::from_fn(|axis| self.coord(axis)))
    }
}

/// Axis-wise equality of two indices of equal rank.
///
/// Stops at the first differing axis. Different ranks are fatal.
pub fn index_eq<A: IndexLike + ?Sized, B: IndexLike + ?Sized>(a: &A, b: &B) -> bool {
    index_cmp(a, b) == Ordering::Equal
}

/// Lexicographic comparison of two indices of equal rank.
///
/// Stops at the first differing axis. Different ranks are fatal.
pub fn index_cmp<A: IndexLike + ?Sized, B: IndexLike + ?Sized>(a: &A, b: &B) -> Ordering {
    if a.ndim() != b.ndim() {
        fatal(LoopError::RankMismatch(a.ndim(), b.ndim()));
    }
    for axis in 0..a.ndim() {
        match a.coord(axis).cmp(&b.coord(axis)) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

// ============================================================================
// Index
// ============================================================================

/// A position in an `N`-dimensional index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Index<const N: usize>(pub [usize; N]);

impl<const N: usize> Index<N> {
    #[inline]
    pub const fn new(coords: [usize; N]) -> Self {
        Self(coords)
    }

    #[inline]
    pub const fn zeros() -> Self {
        Self([0; N])
    }

    /// Evaluate one coordinate per axis against the matching extent.
    pub fn eval<C: Coord>(coords: &[C; N], extents: &[usize; N]) -> Self {
        Self(std::array::from_fn(|axis| coords[axis].eval(extents[axis])))
    }

    #[inline]
    pub const fn ndim(&self) -> usize {
        N
    }

    #[inline]
    pub fn as_array(&self) -> &[usize; N] {
        &self.0
    }

    /// Whether every coordinate lies below the matching extent.
    #[inline]
    pub fn within(&self, extents: &[usize; N]) -> bool {
        self.0.iter().zip(extents).all(|(&i, &e)| i < e)
    }
}

impl<const N: usize> Default for Index<N> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<const N: usize> From<[usize; N]> for Index<N> {
    fn from(coords: [usize; N]) -> Self {
        Self(coords)
    }
}

impl<const N: usize> IndexLike for Index<N> {
    #[inline(always)]
    fn ndim(&self) -> usize {
        N
    }

    #[inline(always)]
    fn coord(&self, axis: usize) -> usize {
        self.0[axis]
    }
}

impl<const N: usize> ops::Index<usize> for Index<N> {
    type Output = usize;

    #[inline(always)]
    fn index(&self, axis: usize) -> &usize {
        &self.0[axis]
    }
}

impl<const N: usize> ops::IndexMut<usize> for Index<N> {
    #[inline(always)]
    fn index_mut(&mut self, axis: usize) -> &mut usize {
        &mut self.0[axis]
    }
}

impl<const N: usize> ops::Add for Index<N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|axis| self.0[axis] + rhs.0[axis]))
    }
}

impl<const N: usize> ops::Sub for Index<N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|axis| {
            match self.0[axis].checked_sub(rhs.0[axis]) {
                Some(v) => v,
                None => fatal(LoopError::IndexOutOfBounds {
                    index: rhs.0.to_vec(),
                    extents: self.0.to_vec(),
                }),
            }
        }))
    }
}

// ============================================================================
// SubIndex
// ============================================================================

/// A contiguous run of axes borrowed from a parent index.
#[derive(Debug, Clone, Copy)]
pub struct SubIndex<'a, P: IndexLike> {
    parent: &'a P,
    start: usize,
    len: usize,
}

impl<P: IndexLike> IndexLike for SubIndex<'_, P> {
    #[inline]
    fn ndim(&self) -> usize {
        self.len
    }

    #[inline]
    fn coord(&self, axis: usize) -> usize {
        assert!(axis < self.len, "axis {axis} out of range for sub-index of rank {}", self.len);
        self.parent.coord(self.start + axis)
    }
}

impl<P: IndexLike, R: IndexLike> PartialEq<R> for SubIndex<'_, P> {
    fn eq(&self, other: &R) -> bool {
        index_eq(self, other)
    }
}

impl<P: IndexLike, R: IndexLike> PartialOrd<R> for SubIndex<'_, P> {
    fn partial_cmp(&self, other: &R) -> Option<Ordering> {
        Some(index_cmp(self, other))
    }
}

// ============================================================================
// Fused
// ============================================================================

/// Two indices read back to back as one.
#[derive(Debug, Clone, Copy)]
pub struct Fused<'a, 'b, L: IndexLike, R: IndexLike> {
    left: &'a L,
    right: &'b R,
}

impl<L: IndexLike, R: IndexLike> IndexLike for Fused<'_, '_, L, R> {
    #[inline]
    fn ndim(&self) -> usize {
        self.left.ndim() + self.right.ndim()
    }

    #[inline]
    fn coord(&self, axis: usize) -> usize {
        let split = self.left.ndim();
        if axis < split {
            self.left.coord(axis)
        } else {
            self.right.coord(axis - split)
        }
    }
}

impl<const N: usize, const M: usize> Fused<'_, '_, Index<N>, Index<M>> {
    /// Materialize the concatenation; `K` must equal `N + M`.
    pub fn concat<const K: usize>(&self) -> Index<K> {
        const { assert!(K == N + M, "fused rank must be the sum of both ranks") };
        Index(std::array::from_fn(|axis| self.coord(axis)))
    }
}

impl<L: IndexLike, R: IndexLike, X: IndexLike> PartialEq<X> for Fused<'_, '_, L, R> {
    fn eq(&self, other: &X) -> bool {
        index_eq(self, other)
    }
}

impl<L: IndexLike, R: IndexLike, X: IndexLike> PartialOrd<X> for Fused<'_, '_, L, R> {
    fn partial_cmp(&self, other: &X) -> Option<Ordering> {
        Some(index_cmp(self, other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{End, Fixed};

    #[test]
    fn sub_index_borrows_parent() {
        let idx = Index([4, 5, 6, 7]);
        let mid = idx.slice(1..3);
        assert_eq!(mid.ndim(), 2);
        assert_eq!(mid.coord(0), 5);
        assert!(mid == Index([5, 6]));
        assert!(mid < Index([5, 7]));
        assert_eq!(mid.to_index::<2>(), Index([5, 6]));
    }

    #[test]
    fn fuse_concatenates_without_copy() {
        let a = Index([1, 2]);
        let b = Index([3]);
        let f = a.fuse(&b);
        assert_eq!(f.ndim(), 3);
        assert_eq!(f.concat::<3>(), Index([1, 2, 3]));
        assert!(f == Index([1, 2, 3]));
        assert!(f > Index([1, 2, 2]));

        let nested = f.fuse(&a);
        assert_eq!(nested.to_smallvec().as_slice(), &[1, 2, 3, 1, 2]);
    }

    #[test]
    fn comparison_short_circuits_lexicographically() {
        assert_eq!(index_cmp(&Index([0, 9, 9]), &Index([1, 0, 0])), Ordering::Less);
        assert_eq!(index_cmp(&Index([2, 0]), &Index([2, 0])), Ordering::Equal);
    }

    #[test]
    #[should_panic(expected = "rank mismatch")]
    fn runtime_rank_mismatch_is_fatal() {
        let idx = Index([1, 2, 3]);
        let _ = idx.slice(0..2) == Index([1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn sub_outside_rank_is_fatal() {
        let idx = Index([1, 2]);
        let _ = idx.slice(1..3);
    }

    #[test]
    fn eval_and_arithmetic() {
        let last = Index::eval(&[End - Fixed::<1>; 2], &[3, 5]);
        assert_eq!(last, Index([2, 4]));
        assert_eq!(last - Index([1, 1]), Index([1, 3]));
        assert_eq!(Index([1, 1]) + Index([2, 3]), Index([3, 4]));
        assert!(Index([1, 2]).within(&[2, 3]));
        assert!(!Index([2, 2]).within(&[2, 3]));
    }
}
