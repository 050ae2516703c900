//! Coordinate-derived flat views.
//!
//! [`IndexWalker`] enumerates the positions of an index space in a storage
//! order with an odometer; [`CoordFlat`] reads an array at each of them. Lazy
//! views use it to read an operand whose storage order differs from the
//! view's, and construction uses it to fill a destination of another order.

use crate::caps::ArrayLike;
use crate::index::Index;
use crate::order::StorageOrder;
use std::iter::FusedIterator;

/// Positions of `extents` in storage order, last level fastest.
#[derive(Debug, Clone)]
pub struct IndexWalker<const N: usize> {
    extents: [usize; N],
    traversal: [usize; N],
    next: Option<[usize; N]>,
    remaining: usize,
}

impl<const N: usize> IndexWalker<N> {
    pub fn new<O: StorageOrder>(extents: [usize; N]) -> Self {
        let remaining: usize = extents.iter().product();
        IndexWalker {
            extents,
            traversal: O::traversal::<N>(),
            next: (remaining > 0).then_some([0; N]),
            remaining,
        }
    }
}

impl<const N: usize> Iterator for IndexWalker<N> {
    type Item = Index<N>;

    #[inline]
    fn next(&mut self) -> Option<Index<N>> {
        let current = self.next?;
        let mut cursor = current;
        self.next = None;
        for &axis in self.traversal.iter().rev() {
            cursor[axis] += 1;
            if cursor[axis] < self.extents[axis] {
                self.next = Some(cursor);
                break;
            }
            cursor[axis] = 0;
        }
        self.remaining -= 1;
        Some(Index(current))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<const N: usize> ExactSizeIterator for IndexWalker<N> {}

impl<const N: usize> FusedIterator for IndexWalker<N> {}

/// Flat view that reads through [`ArrayLike::get`] at every position.
pub struct CoordFlat<'a, A: ?Sized, const N: usize> {
    array: &'a A,
    walker: IndexWalker<N>,
}

impl<'a, A: ArrayLike<N> + ?Sized, const N: usize> CoordFlat<'a, A, N> {
    /// Elements in the array's own storage order.
    pub fn new(array: &'a A) -> Self {
        Self::in_order::<A::Order>(array)
    }

    /// Elements in the storage order `O`, which may differ from the array's.
    pub fn in_order<O: StorageOrder>(array: &'a A) -> Self {
        CoordFlat {
            array,
            walker: IndexWalker::new::<O>(array.extents()),
        }
    }
}

impl<A: ArrayLike<N> + ?Sized, const N: usize> Iterator for CoordFlat<'_, A, N> {
    type Item = A::Elem;

    #[inline]
    fn next(&mut self) -> Option<A::Elem> {
        let idx = self.walker.next()?;
        Some(self.array.get(&idx))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.walker.size_hint()
    }
}

impl<A: ArrayLike<N> + ?Sized, const N: usize> ExactSizeIterator for CoordFlat<'_, A, N> {}

impl<A: ArrayLike<N> + ?Sized, const N: usize> FusedIterator for CoordFlat<'_, A, N> {}
