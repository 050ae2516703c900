//! Capability-driven assignment, construction and comparison.
//!
//! The `plan_*` functions read only capability constants and type identities,
//! so after monomorphization each call site keeps the body of a single tier.
//!
//! Assignment tiers, first legal wins:
//!
//! 1. [`Strategy::Native`]: both sides are the same owning type.
//! 2. [`Strategy::Direct`]: same storage order, both sides expose storage
//!    units of one type with the same packing; whole words move at once.
//! 3. [`Strategy::Flat`]: same storage order and the *source* streams its
//!    elements cheaply.
//! 4. [`Strategy::Loop`]: coordinate loop over the source extents.

use crate::caps::{
    assert_same_extents, cast_unit, same_type, ArrayLike, ArrayLikeMut, Construct, ResizeKind,
};
use crate::flat::CoordFlat;
use crate::kernel::{do_while, for_each};
use crate::order::same_order;
use crate::range::DynRange;
use crate::{fatal, LoopError, Result};
use log::{debug, trace};

/// How an assignment executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Native,
    Direct,
    Flat,
    Loop,
}

/// How a construction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructStrategy {
    /// Build the storage straight from the source elements.
    Placement,
    Native,
    /// Default-construct, then assign with the given tier.
    Assign(Strategy),
}

/// How an elementwise comparison executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareStrategy {
    Direct,
    Flat,
    Loop,
}

#[inline]
fn native_pair<A: ArrayLike<N>, B: ArrayLike<N>, const N: usize>() -> bool {
    A::CAPS.native
        && B::CAPS.native
        && A::native_id().is_some()
        && A::native_id() == B::native_id()
}

#[inline]
fn direct_pair<A: ArrayLike<N>, B: ArrayLike<N>, const N: usize>() -> bool {
    same_order::<A::Order, B::Order>()
        && A::direct_available()
        && B::direct_available()
        && A::CAPS.packing.same(B::CAPS.packing)
        && same_type::<A::Unit, B::Unit>()
}

/// Tier used by [`copy_assign`] and [`move_assign`] from `S` into `D`.
#[inline]
pub fn plan_assign<D, S, const N: usize>() -> Strategy
where
    D: ArrayLikeMut<N>,
    S: ArrayLike<N>,
{
    if native_pair::<D, S, N>() {
        Strategy::Native
    } else if direct_pair::<D, S, N>() {
        Strategy::Direct
    } else if same_order::<D::Order, S::Order>() && S::CAPS.fast_flat_view {
        Strategy::Flat
    } else {
        Strategy::Loop
    }
}

/// Tier used by [`construct`] to build `D` from `S`.
#[inline]
pub fn plan_construct<D, S, const N: usize>() -> ConstructStrategy
where
    D: Construct<N>,
    S: ArrayLike<N>,
{
    if D::CAPS.placement {
        ConstructStrategy::Placement
    } else if native_pair::<D, S, N>() {
        ConstructStrategy::Native
    } else {
        ConstructStrategy::Assign(plan_assign::<D, S, N>())
    }
}

/// Tier used by [`all_eq`] and [`any_ne`].
#[inline]
pub fn plan_compare<A, B, const N: usize>() -> CompareStrategy
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
{
    if direct_pair::<A, B, N>() {
        CompareStrategy::Direct
    } else if same_order::<A::Order, B::Order>()
        && (A::CAPS.fast_flat_view || B::CAPS.fast_flat_view)
    {
        CompareStrategy::Flat
    } else {
        CompareStrategy::Loop
    }
}

// ============================================================================
// Assignment
// ============================================================================

/// Give `dst` the extents of `src`, resizing when allowed.
fn match_extents<D, const N: usize>(dst: &mut D, extents: [usize; N]) -> Result<()>
where
    D: ArrayLikeMut<N>,
{
    let current = dst.extents();
    if current == extents {
        return Ok(());
    }
    debug!("resizing destination {current:?} -> {extents:?} ({:?})", D::CAPS.resize);
    match D::CAPS.resize {
        ResizeKind::Fixed => Err(LoopError::NotResizable {
            from: current.to_vec(),
            to: extents.to_vec(),
        }),
        ResizeKind::Preserving => dst.resize(extents),
        // Every element is overwritten next, so none needs to survive.
        ResizeKind::Discarding => {
            dst.release();
            dst.resize(extents)
        }
    }
}

fn copy_direct<D, S, const N: usize>(dst: &mut D, src: &S) -> Result<()>
where
    D: ArrayLikeMut<N>,
    S: ArrayLike<N>,
{
    let units = src.direct().ok_or(LoopError::MissingView("source direct"))?;
    let slots = dst
        .direct_mut()
        .ok_or(LoopError::MissingView("destination direct"))?;
    let mut written = 0usize;
    for (slot, unit) in slots.iter_mut().zip(units) {
        *slot = cast_unit::<S::Unit, D::Unit>(unit);
        written += 1;
    }
    if written != slots.len() {
        return Err(LoopError::MissingView("complete source direct"));
    }
    dst.fixup_direct();
    Ok(())
}

fn copy_loop<D, S, const N: usize>(dst: &mut D, src: &S)
where
    D: ArrayLikeMut<N>,
    S: ArrayLike<N>,
    S::Elem: Into<D::Elem>,
{
    let domain = DynRange::over::<S::Order>(src.extents());
    for_each(&domain, |idx| dst.set(idx, src.get(idx).into()));
}

fn copy_with<D, S, const N: usize>(dst: &mut D, src: &S, strategy: Strategy) -> Result<()>
where
    D: ArrayLikeMut<N>,
    S: ArrayLike<N>,
    S::Elem: Into<D::Elem>,
{
    match strategy {
        Strategy::Native => {
            let native = src.as_native().ok_or(LoopError::MissingView("native"))?;
            if !dst.native_assign(native) {
                return Err(LoopError::MissingView("native"));
            }
        }
        Strategy::Direct => copy_direct(dst, src)?,
        Strategy::Flat => dst.fill_flat(src.flat().map(Into::into)),
        Strategy::Loop => copy_loop(dst, src),
    }
    Ok(())
}

/// Copy every element of `src` into `dst`.
///
/// A destination with other extents is resized first when it is resizable.
///
/// # Panics
///
/// Panics when the extents differ and `dst` cannot be resized.
#[track_caller]
pub fn copy_assign<D, S, const N: usize>(dst: &mut D, src: &S)
where
    D: ArrayLikeMut<N>,
    S: ArrayLike<N>,
    S::Elem: Into<D::Elem>,
{
    if let Err(err) = try_copy_assign(dst, src) {
        fatal(err);
    }
}

/// Fallible form of [`copy_assign`].
pub fn try_copy_assign<D, S, const N: usize>(dst: &mut D, src: &S) -> Result<()>
where
    D: ArrayLikeMut<N>,
    S: ArrayLike<N>,
    S::Elem: Into<D::Elem>,
{
    match_extents(dst, src.extents())?;
    let strategy = plan_assign::<D, S, N>();
    trace!("copy_assign {:?} via {strategy:?}", src.extents());
    copy_with(dst, src, strategy)
}

/// Move every element of `src` into `dst`, leaving `src` empty.
///
/// Values of the same owning type hand over their storage; otherwise the
/// elements are copied and the source storage released.
#[track_caller]
pub fn move_assign<D, S, const N: usize>(dst: &mut D, src: &mut S)
where
    D: ArrayLikeMut<N>,
    S: ArrayLikeMut<N>,
    S::Elem: Into<D::Elem>,
{
    if let Err(err) = try_move_assign(dst, src) {
        fatal(err);
    }
}

/// Fallible form of [`move_assign`]. On error `src` is left untouched.
pub fn try_move_assign<D, S, const N: usize>(dst: &mut D, src: &mut S) -> Result<()>
where
    D: ArrayLikeMut<N>,
    S: ArrayLikeMut<N>,
    S::Elem: Into<D::Elem>,
{
    match_extents(dst, src.extents())?;
    let strategy = plan_assign::<D, S, N>();
    trace!("move_assign {:?} via {strategy:?}", src.extents());
    if strategy == Strategy::Native {
        let native = src
            .as_native_mut()
            .ok_or(LoopError::MissingView("native"))?;
        if !dst.native_take(native) {
            return Err(LoopError::MissingView("native"));
        }
        return Ok(());
    }
    copy_with(dst, src, strategy)?;
    src.release();
    Ok(())
}

// ============================================================================
// Construction
// ============================================================================

/// Build a new `D` holding the elements of `src`.
#[track_caller]
pub fn construct<D, S, const N: usize>(src: &S) -> D
where
    D: Construct<N>,
    S: ArrayLike<N>,
    S::Elem: Into<D::Elem>,
{
    match try_construct(src) {
        Ok(out) => out,
        Err(err) => fatal(err),
    }
}

/// Fallible form of [`construct`].
pub fn try_construct<D, S, const N: usize>(src: &S) -> Result<D>
where
    D: Construct<N>,
    S: ArrayLike<N>,
    S::Elem: Into<D::Elem>,
{
    let extents = src.extents();
    let strategy = plan_construct::<D, S, N>();
    trace!("construct {extents:?} via {strategy:?}");
    match strategy {
        ConstructStrategy::Placement => {
            if same_order::<D::Order, S::Order>() {
                Ok(D::place(extents, src.flat().map(Into::into)))
            } else {
                let flat = CoordFlat::in_order::<D::Order>(src);
                Ok(D::place(extents, flat.map(Into::into)))
            }
        }
        ConstructStrategy::Native => {
            let native = src.as_native().ok_or(LoopError::MissingView("native"))?;
            D::from_native(native).ok_or(LoopError::MissingView("native"))
        }
        ConstructStrategy::Assign(strategy) => {
            let mut out = D::with_extents(extents);
            copy_with(&mut out, src, strategy)?;
            Ok(out)
        }
    }
}

// ============================================================================
// Comparison
// ============================================================================

/// Whether `a` and `b` have the same extents and equal elements.
///
/// The coordinate tier stops at the first mismatch.
pub fn all_eq<A, B, const N: usize>(a: &A, b: &B) -> bool
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    A::Elem: PartialEq<B::Elem>,
    A::Unit: PartialEq,
{
    let extents = a.extents();
    if extents != b.extents() {
        return false;
    }
    let strategy = plan_compare::<A, B, N>();
    trace!("all_eq {extents:?} via {strategy:?}");
    match strategy {
        CompareStrategy::Direct => match (a.direct(), b.direct()) {
            (Some(mut x), Some(y)) => {
                let mut y = y.map(cast_unit::<B::Unit, A::Unit>);
                loop {
                    match (x.next(), y.next()) {
                        (Some(u), Some(v)) if u == v => {}
                        (None, None) => return true,
                        _ => return false,
                    }
                }
            }
            _ => fatal(LoopError::MissingView("direct")),
        },
        CompareStrategy::Flat => a.flat().zip(b.flat()).all(|(x, y)| x == y),
        CompareStrategy::Loop => {
            let domain = DynRange::over::<A::Order>(extents);
            do_while(&domain, |idx| a.get(idx) == b.get(idx))
        }
    }
}

/// Whether any element differs, or the extents do.
#[inline]
pub fn any_ne<A, B, const N: usize>(a: &A, b: &B) -> bool
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    A::Elem: PartialEq<B::Elem>,
    A::Unit: PartialEq,
{
    !all_eq(a, b)
}

/// Whether `pred` holds for every pair of corresponding elements.
///
/// Operands must have identical extents. Evaluation stops at the first pair
/// for which `pred` fails.
#[track_caller]
pub fn all_by<A, B, F, const N: usize>(a: &A, b: &B, mut pred: F) -> bool
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    F: FnMut(A::Elem, B::Elem) -> bool,
{
    let extents = a.extents();
    assert_same_extents(&extents, &b.extents());
    if same_order::<A::Order, B::Order>() && (A::CAPS.fast_flat_view || B::CAPS.fast_flat_view) {
        a.flat().zip(b.flat()).all(|(x, y)| pred(x, y))
    } else {
        let domain = DynRange::over::<A::Order>(extents);
        do_while(&domain, |idx| pred(a.get(idx), b.get(idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Array, VecArray};
    use crate::caps::Capabilities;
    use crate::bits::BitArray;
    use crate::grid::Grid;
    use crate::order::{ColMajor, RowMajor};

    type RowI = Array<i32, 2, RowMajor>;
    type ColI = Array<i32, 2, ColMajor>;

    #[test]
    fn assignment_tiers() {
        assert_eq!(plan_assign::<RowI, RowI, 2>(), Strategy::Native);
        assert_eq!(plan_assign::<VecArray<i32, 2>, RowI, 2>(), Strategy::Direct);
        assert_eq!(plan_assign::<Array<i64, 2>, RowI, 2>(), Strategy::Flat);
        assert_eq!(plan_assign::<ColI, RowI, 2>(), Strategy::Loop);
        assert_eq!(plan_assign::<BitArray<2>, BitArray<2>, 2>(), Strategy::Native);
        assert_eq!(plan_assign::<Array<bool, 2>, BitArray<2>, 2>(), Strategy::Flat);
        assert_eq!(
            plan_assign::<BitArray<2, ColMajor>, BitArray<2>, 2>(),
            Strategy::Loop
        );
    }

    #[test]
    fn construction_tiers() {
        assert_eq!(
            plan_construct::<RowI, ColI, 2>(),
            ConstructStrategy::Placement
        );
        assert_eq!(
            plan_construct::<Grid<i32, 2, 2>, Grid<i32, 2, 2>, 2>(),
            ConstructStrategy::Native
        );
        assert_eq!(
            plan_construct::<Grid<i32, 2, 2>, RowI, 2>(),
            ConstructStrategy::Assign(Strategy::Direct)
        );
    }

    #[test]
    fn comparison_tiers() {
        assert_eq!(plan_compare::<RowI, VecArray<i32, 2>, 2>(), CompareStrategy::Direct);
        assert_eq!(plan_compare::<RowI, Array<i64, 2>, 2>(), CompareStrategy::Flat);
        assert_eq!(plan_compare::<RowI, ColI, 2>(), CompareStrategy::Loop);
    }

    #[test]
    fn copy_across_orders() {
        let src: RowI = Array::from_parts(vec![1, 2, 3, 4, 5, 6], [2, 3]);
        let mut dst: ColI = Array::zeros([2, 3]);
        copy_assign(&mut dst, &src);
        assert_eq!(dst.as_slice(), &[1, 4, 2, 5, 3, 6]);
        assert!(all_eq(&dst, &src));
    }

    #[test]
    fn copy_widens_elements() {
        let src: RowI = Array::from_parts(vec![1, -2], [1, 2]);
        let mut dst: Array<i64, 2> = Array::zeros([1, 2]);
        copy_assign(&mut dst, &src);
        assert_eq!(dst.as_slice(), &[1i64, -2]);
    }

    #[test]
    fn fixed_destination_rejects_other_extents() {
        let src: RowI = Array::zeros([2, 3]);
        let mut dst: RowI = Array::zeros([3, 2]);
        assert_eq!(
            try_copy_assign(&mut dst, &src),
            Err(LoopError::NotResizable {
                from: vec![3, 2],
                to: vec![2, 3]
            })
        );
    }

    #[test]
    fn resizable_destination_follows_source() {
        let src: RowI = Array::from_parts(vec![1, 2, 3, 4, 5, 6], [2, 3]);
        let mut dst: VecArray<i32, 2> = VecArray::zeros([1, 1]);
        copy_assign(&mut dst, &src);
        assert_eq!(dst.extents(), [2, 3]);
        assert!(all_eq(&dst, &src));
    }

    #[test]
    fn move_empties_source() {
        let mut src: RowI = Array::from_parts(vec![1, 2, 3, 4], [2, 2]);
        let mut dst: RowI = Array::zeros([2, 2]);
        move_assign(&mut dst, &mut src);
        assert!(src.direct().map_or(true, |mut d| d.next().is_none()));
        assert_eq!(dst.as_slice(), &[1, 2, 3, 4]);

        let mut src: ColI = Array::from_parts(vec![1, 3, 2, 4], [2, 2]);
        move_assign(&mut dst, &mut src);
        assert!(src.is_empty());
        assert_eq!(dst.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn construct_each_tier() {
        let src: ColI = Array::from_parts(vec![1, 3, 2, 4], [2, 2]);
        let row: RowI = construct(&src);
        assert_eq!(row.as_slice(), &[1, 2, 3, 4]);

        let grid: Grid<i32, 2, 2> = construct(&row);
        assert_eq!(grid.into_rows(), [[1, 2], [3, 4]]);
        let again: Grid<i32, 2, 2> = construct(&grid);
        assert_eq!(again, grid);

        let bits: BitArray<1> = construct(&Array::<bool, 1>::from_parts(vec![true, false], [2]));
        assert_eq!(bits.as_words(), &[1]);
    }

    #[test]
    fn comparisons() {
        let a: RowI = Array::from_parts(vec![1, 2, 3, 4], [2, 2]);
        let b: ColI = Array::from_parts(vec![1, 3, 2, 4], [2, 2]);
        assert!(all_eq(&a, &b));
        let c: RowI = Array::from_parts(vec![1, 2, 3, 5], [2, 2]);
        assert!(any_ne(&a, &c));
        let d: RowI = Array::zeros([1, 4]);
        assert!(!all_eq(&a, &d));
        assert!(all_by(&a, &c, |x, y| x <= y));
    }

    #[test]
    fn bit_arrays_compare_by_word() {
        let a: BitArray<1> = BitArray::from_bools((0..100).map(|i| i % 3 == 0), [100]);
        let mut b: BitArray<1> = BitArray::zeros([100]);
        copy_assign(&mut b, &a);
        assert_eq!(plan_compare::<BitArray<1>, BitArray<1>, 1>(), CompareStrategy::Direct);
        assert!(all_eq(&a, &b));
        b.set(&crate::Index([99]), true);
        assert!(any_ne(&a, &b));
    }

    /// Resizable storage whose contents do not survive a resize.
    #[derive(Default)]
    struct Scratch {
        inner: VecArray<i32, 1>,
        releases: usize,
    }

    impl ArrayLike<1> for Scratch {
        type Elem = i32;
        type Unit = i32;
        type Order = RowMajor;
        type Ref<'a> = &'a i32 where Self: 'a;
        type Flat<'a> = <VecArray<i32, 1> as ArrayLike<1>>::Flat<'a> where Self: 'a;
        type Direct<'a> = <VecArray<i32, 1> as ArrayLike<1>>::Direct<'a> where Self: 'a;

        const CAPS: Capabilities = Capabilities {
            native: false,
            resize: ResizeKind::Discarding,
            ..Capabilities::DENSE
        };

        fn extents(&self) -> [usize; 1] {
            self.inner.extents()
        }

        fn at(&self, index: &crate::Index<1>) -> &i32 {
            self.inner.at(index)
        }

        fn get(&self, index: &crate::Index<1>) -> i32 {
            self.inner.get(index)
        }

        fn flat(&self) -> Self::Flat<'_> {
            self.inner.flat()
        }

        fn direct(&self) -> Option<Self::Direct<'_>> {
            self.inner.direct()
        }
    }

    impl ArrayLikeMut<1> for Scratch {
        type RefMut<'a> = &'a mut i32 where Self: 'a;

        fn at_mut(&mut self, index: &crate::Index<1>) -> &mut i32 {
            self.inner.at_mut(index)
        }

        fn set(&mut self, index: &crate::Index<1>, value: i32) {
            self.inner.set(index, value);
        }

        fn fill_flat<I: IntoIterator<Item = i32>>(&mut self, items: I) {
            self.inner.fill_flat(items);
        }

        fn direct_mut(&mut self) -> Option<&mut [i32]> {
            self.inner.direct_mut()
        }

        fn resize(&mut self, extents: [usize; 1]) -> Result<()> {
            assert!(self.inner.is_empty(), "old contents kept across a discarding resize");
            self.inner.resize(extents)
        }

        fn release(&mut self) {
            self.releases += 1;
            self.inner.release();
        }
    }

    #[test]
    fn discarding_destination_is_released_before_resize() {
        let src: VecArray<i32, 1> = VecArray::from_parts(vec![1, 2, 3, 4, 5], [5]);
        let mut dst = Scratch {
            inner: VecArray::from_parts(vec![9, 9], [2]),
            releases: 0,
        };
        assert_eq!(plan_assign::<Scratch, VecArray<i32, 1>, 1>(), Strategy::Direct);

        copy_assign(&mut dst, &src);
        assert_eq!(dst.releases, 1);
        assert_eq!(dst.inner.as_slice(), &[1, 2, 3, 4, 5]);

        // Same extents: nothing to resize, nothing released.
        copy_assign(&mut dst, &src);
        assert_eq!(dst.releases, 1);
    }
}
