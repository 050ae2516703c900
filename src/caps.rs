//! Capability descriptors and the array-like interfaces.
//!
//! Every array-like type states what it can do in an associated
//! [`Capabilities`] constant. The dispatcher reads only these constants (and
//! type identities, which fold away after monomorphization), so a strategy
//! is fixed per type pairing and never re-evaluated per call.

use crate::index::Index;
use crate::order::StorageOrder;
use crate::{fatal, LoopError, Result};
use std::any::{Any, TypeId};

/// Whether and how a storage can change its extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeKind {
    /// Extents are fixed at construction.
    Fixed,
    /// Growing keeps the leading elements in storage order; shrinking drops
    /// the trailing ones.
    Preserving,
    /// Resizing leaves unspecified (but initialized) contents, so callers
    /// about to overwrite every element release the old ones first.
    Discarding,
}

impl ResizeKind {
    #[inline]
    pub const fn is_resizable(self) -> bool {
        !matches!(self, ResizeKind::Fixed)
    }
}

/// How logical elements map onto storage units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    /// One unit per element.
    Unpacked,
    /// `per_unit` single-bit elements per storage word.
    Bits { per_unit: u32 },
}

impl Packing {
    #[inline]
    pub const fn same(self, other: Packing) -> bool {
        match (self, other) {
            (Packing::Unpacked, Packing::Unpacked) => true,
            (Packing::Bits { per_unit: a }, Packing::Bits { per_unit: b }) => a == b,
            _ => false,
        }
    }

    #[inline]
    pub const fn is_packed(self) -> bool {
        matches!(self, Packing::Bits { .. })
    }
}

/// What an array-like type supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whole-value assignment between two values of this exact type.
    pub native: bool,
    /// [`ArrayLike::direct`] yields the storage units.
    pub direct_view: bool,
    /// [`ArrayLike::flat`] streams elements without per-coordinate work.
    pub fast_flat_view: bool,
    pub resize: ResizeKind,
    /// [`ArrayLike::memory_size`] reports a size.
    pub memory_size: bool,
    /// [`Construct::place`] builds from elements without default-constructing.
    pub placement: bool,
    pub packing: Packing,
}

impl Capabilities {
    /// A view with no storage of its own and only coordinate access.
    pub const LAZY: Capabilities = Capabilities {
        native: false,
        direct_view: false,
        fast_flat_view: false,
        resize: ResizeKind::Fixed,
        memory_size: false,
        placement: false,
        packing: Packing::Unpacked,
    };

    /// Owning storage of one unit per element.
    pub const DENSE: Capabilities = Capabilities {
        native: true,
        direct_view: true,
        fast_flat_view: true,
        resize: ResizeKind::Fixed,
        memory_size: true,
        placement: true,
        packing: Packing::Unpacked,
    };
}

/// Read access to an `N`-dimensional array-like value.
pub trait ArrayLike<const N: usize> {
    /// Element value type.
    type Elem;
    /// Storage unit seen through the direct view.
    type Unit: 'static;
    type Order: StorageOrder;
    /// Read-only element reference; a proxy for packed storage.
    type Ref<'a>
    where
        Self: 'a;
    /// Elements in storage order.
    type Flat<'a>: Iterator<Item = Self::Elem>
    where
        Self: 'a;
    /// Storage units in storage order.
    type Direct<'a>: Iterator<Item = Self::Unit>
    where
        Self: 'a;

    const CAPS: Capabilities;

    /// Extents known at compile time.
    const STATIC_EXTENTS: Option<[usize; N]> = None;

    fn extents(&self) -> [usize; N];

    fn at(&self, index: &Index<N>) -> Self::Ref<'_>;

    fn get(&self, index: &Index<N>) -> Self::Elem;

    fn flat(&self) -> Self::Flat<'_>;

    /// `Some` exactly when [`ArrayLike::direct_available`] holds.
    fn direct(&self) -> Option<Self::Direct<'_>>;

    /// Whether [`ArrayLike::direct`] yields units for this type.
    ///
    /// [`Capabilities::direct_view`] is necessary; lazy views may further
    /// depend on their operands' unit types.
    fn direct_available() -> bool
    where
        Self: Sized,
    {
        Self::CAPS.direct_view
    }

    /// Bytes of owned storage.
    fn memory_size(&self) -> Option<usize> {
        None
    }

    /// Identity used to match [`Capabilities::native`] pairs.
    fn native_id() -> Option<TypeId>
    where
        Self: Sized,
    {
        None
    }

    fn as_native(&self) -> Option<&dyn Any> {
        None
    }

    fn len(&self) -> usize {
        self.extents().iter().product()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write access to an owning array-like value.
pub trait ArrayLikeMut<const N: usize>: ArrayLike<N> {
    /// Mutable element reference; a proxy for packed storage.
    type RefMut<'a>
    where
        Self: 'a;

    fn at_mut(&mut self, index: &Index<N>) -> Self::RefMut<'_>;

    fn set(&mut self, index: &Index<N>, value: Self::Elem);

    /// Overwrite every element from `items`, given in storage order.
    ///
    /// A count other than [`ArrayLike::len`] is fatal.
    fn fill_flat<I: IntoIterator<Item = Self::Elem>>(&mut self, items: I);

    fn direct_mut(&mut self) -> Option<&mut [Self::Unit]> {
        None
    }

    /// Restore storage invariants after units were written directly.
    fn fixup_direct(&mut self) {}

    /// Clone `src` into `self` if it has the same type.
    fn native_assign(&mut self, _src: &dyn Any) -> bool {
        false
    }

    /// Take the storage of `src`, leaving it empty, if it has the same type.
    fn native_take(&mut self, _src: &mut dyn Any) -> bool {
        false
    }

    fn as_native_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }

    fn resize(&mut self, extents: [usize; N]) -> Result<()> {
        Err(LoopError::NotResizable {
            from: self.extents().to_vec(),
            to: extents.to_vec(),
        })
    }

    /// Drop the storage, leaving an empty value.
    fn release(&mut self);
}

/// Construction of owning array-like values.
pub trait Construct<const N: usize>: ArrayLikeMut<N> + Sized {
    /// Storage of `extents` with default-constructed elements.
    fn with_extents(extents: [usize; N]) -> Self;

    /// Storage built from `items`, given in storage order.
    fn place<I: IntoIterator<Item = Self::Elem>>(extents: [usize; N], items: I) -> Self {
        let mut out = Self::with_extents(extents);
        out.fill_flat(items);
        out
    }

    /// Clone of `src` if it has the same type.
    fn from_native(_src: &dyn Any) -> Option<Self> {
        None
    }
}

/// Write `items` into `slots` in order.
///
/// Returns the number of items consumed, counting at most one past
/// `slots.len()`, so any overflow shows up as a count mismatch.
pub(crate) fn fill_slots<T, I: IntoIterator<Item = T>>(slots: &mut [T], items: I) -> usize {
    let mut items = items.into_iter();
    let mut written = 0;
    for slot in slots.iter_mut() {
        match items.next() {
            Some(value) => *slot = value,
            None => return written,
        }
        written += 1;
    }
    written + usize::from(items.next().is_some())
}

/// Move a unit across two type parameters that name the same type.
///
/// Callers check the [`TypeId`]s first; a mismatch is fatal.
#[inline(always)]
pub(crate) fn cast_unit<A: 'static, B: 'static>(unit: A) -> B {
    let mut slot = Some(unit);
    match (&mut slot as &mut dyn Any)
        .downcast_mut::<Option<B>>()
        .and_then(Option::take)
    {
        Some(unit) => unit,
        None => fatal(LoopError::MissingView("direct")),
    }
}

/// Whether `A` and `B` are the same type.
#[inline(always)]
pub(crate) fn same_type<A: ?Sized + 'static, B: ?Sized + 'static>() -> bool {
    TypeId::of::<A>() == TypeId::of::<B>()
}

/// Fatal unless two operands have identical extents.
#[track_caller]
pub(crate) fn assert_same_extents<const N: usize>(a: &[usize; N], b: &[usize; N]) {
    if a != b {
        fatal(LoopError::ShapeMismatch(a.to_vec(), b.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_between_identical_types() {
        let v: u64 = cast_unit::<u64, u64>(7);
        assert_eq!(v, 7);
        assert!(same_type::<u64, u64>());
        assert!(!same_type::<u64, u32>());
    }

    #[test]
    #[should_panic(expected = "direct view")]
    fn cast_between_distinct_types_is_fatal() {
        let _: u32 = cast_unit::<u64, u32>(7);
    }

    #[test]
    fn packing_comparisons() {
        const A: Packing = Packing::Bits { per_unit: 64 };
        assert!(A.same(Packing::Bits { per_unit: 64 }));
        assert!(!A.same(Packing::Bits { per_unit: 8 }));
        assert!(!A.same(Packing::Unpacked));
        assert!(A.is_packed());
        assert!(ResizeKind::Preserving.is_resizable());
        assert!(!ResizeKind::Fixed.is_resizable());
    }

    #[test]
    fn fill_slots_counts_overflow_once() {
        let mut slots = [0; 3];
        assert_eq!(fill_slots(&mut slots, [1, 2]), 2);
        assert_eq!(fill_slots(&mut slots, [4, 5, 6]), 3);
        assert_eq!(slots, [4, 5, 6]);
        assert_eq!(fill_slots(&mut slots, 7..), 4);
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn mismatched_extents_are_fatal() {
        assert_same_extents(&[2, 3], &[3, 2]);
    }
}
