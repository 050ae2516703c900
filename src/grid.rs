//! Inline two-dimensional arrays with compile-time extents.

use crate::caps::{fill_slots, ArrayLike, ArrayLikeMut, Capabilities, Construct};
use crate::index::Index;
use crate::order::RowMajor;
use crate::{fatal, LoopError};
use std::any::{Any, TypeId};

/// An `R x C` row-major array stored inline.
///
/// Its extents are part of the type, so lazy views over a grid report them as
/// [`ArrayLike::STATIC_EXTENTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grid<T, const R: usize, const C: usize> {
    rows: [[T; C]; R],
}

impl<T, const R: usize, const C: usize> Grid<T, R, C> {
    pub const EXTENTS: [usize; 2] = [R, C];

    #[inline]
    pub const fn new(rows: [[T; C]; R]) -> Self {
        Grid { rows }
    }

    pub fn from_fn<F: FnMut(&Index<2>) -> T>(mut f: F) -> Self {
        Grid {
            rows: std::array::from_fn(|r| std::array::from_fn(|c| f(&Index([r, c])))),
        }
    }

    #[inline]
    pub fn rows(&self) -> &[[T; C]; R] {
        &self.rows
    }

    #[inline]
    pub fn into_rows(self) -> [[T; C]; R] {
        self.rows
    }

    /// Elements in storage order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.rows.as_flattened()
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.rows.as_flattened_mut()
    }

    #[inline]
    #[track_caller]
    fn check(index: &[usize; 2]) {
        if index[0] >= R || index[1] >= C {
            fatal(LoopError::IndexOutOfBounds {
                index: index.to_vec(),
                extents: vec![R, C],
            });
        }
    }
}

impl<T: Default, const R: usize, const C: usize> Default for Grid<T, R, C> {
    fn default() -> Self {
        Grid::from_fn(|_| T::default())
    }
}

impl<T, const R: usize, const C: usize> From<[[T; C]; R]> for Grid<T, R, C> {
    fn from(rows: [[T; C]; R]) -> Self {
        Grid { rows }
    }
}

impl<T, const R: usize, const C: usize> std::ops::Index<[usize; 2]> for Grid<T, R, C> {
    type Output = T;

    #[inline]
    #[track_caller]
    fn index(&self, index: [usize; 2]) -> &T {
        Self::check(&index);
        &self.rows[index[0]][index[1]]
    }
}

impl<T, const R: usize, const C: usize> std::ops::IndexMut<[usize; 2]> for Grid<T, R, C> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, index: [usize; 2]) -> &mut T {
        Self::check(&index);
        &mut self.rows[index[0]][index[1]]
    }
}

impl<T: Clone + Default + 'static, const R: usize, const C: usize> ArrayLike<2>
    for Grid<T, R, C>
{
    type Elem = T;
    type Unit = T;
    type Order = RowMajor;
    type Ref<'a> = &'a T where Self: 'a;
    type Flat<'a> = std::iter::Cloned<std::slice::Iter<'a, T>> where Self: 'a;
    type Direct<'a> = std::iter::Cloned<std::slice::Iter<'a, T>> where Self: 'a;

    // No uninitialized construction: a grid is always fully built.
    const CAPS: Capabilities = Capabilities {
        placement: false,
        ..Capabilities::DENSE
    };

    const STATIC_EXTENTS: Option<[usize; 2]> = Some([R, C]);

    #[inline]
    fn extents(&self) -> [usize; 2] {
        [R, C]
    }

    #[inline]
    fn at(&self, index: &Index<2>) -> &T {
        &self[index.0]
    }

    #[inline]
    fn get(&self, index: &Index<2>) -> T {
        self[index.0].clone()
    }

    #[inline]
    fn flat(&self) -> Self::Flat<'_> {
        self.as_slice().iter().cloned()
    }

    #[inline]
    fn direct(&self) -> Option<Self::Direct<'_>> {
        Some(self.as_slice().iter().cloned())
    }

    fn memory_size(&self) -> Option<usize> {
        Some(std::mem::size_of::<[[T; C]; R]>())
    }

    fn native_id() -> Option<TypeId> {
        Some(TypeId::of::<Self>())
    }

    fn as_native(&self) -> Option<&dyn Any> {
        Some(self)
    }

    #[inline]
    fn len(&self) -> usize {
        R * C
    }
}

impl<T: Clone + Default + 'static, const R: usize, const C: usize> ArrayLikeMut<2>
    for Grid<T, R, C>
{
    type RefMut<'a> = &'a mut T where Self: 'a;

    #[inline]
    fn at_mut(&mut self, index: &Index<2>) -> &mut T {
        &mut self[index.0]
    }

    #[inline]
    fn set(&mut self, index: &Index<2>, value: T) {
        self[index.0] = value;
    }

    #[track_caller]
    fn fill_flat<I: IntoIterator<Item = T>>(&mut self, items: I) {
        let written = fill_slots(self.as_mut_slice(), items);
        if written != R * C {
            fatal(LoopError::ElementCount {
                len: written,
                extents: vec![R, C],
            });
        }
    }

    #[inline]
    fn direct_mut(&mut self) -> Option<&mut [T]> {
        Some(self.as_mut_slice())
    }

    fn native_assign(&mut self, src: &dyn Any) -> bool {
        match src.downcast_ref::<Self>() {
            Some(src) => {
                self.clone_from(src);
                true
            }
            None => false,
        }
    }

    fn native_take(&mut self, src: &mut dyn Any) -> bool {
        match src.downcast_mut::<Self>() {
            Some(src) => {
                *self = std::mem::take(src);
                true
            }
            None => false,
        }
    }

    fn as_native_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }

    /// Resets every element; the extents cannot shrink.
    fn release(&mut self) {
        *self = Self::default();
    }
}

impl<T: Clone + Default + 'static, const R: usize, const C: usize> Construct<2>
    for Grid<T, R, C>
{
    #[track_caller]
    fn with_extents(extents: [usize; 2]) -> Self {
        if extents != [R, C] {
            fatal(LoopError::ShapeMismatch(extents.to_vec(), vec![R, C]));
        }
        Self::default()
    }

    fn from_native(src: &dyn Any) -> Option<Self> {
        src.downcast_ref::<Self>().cloned()
    }
}
