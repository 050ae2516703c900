//! Lazy elementwise views.
//!
//! A view borrows its operands and evaluates its function at every access;
//! nothing is cached. All operands must have identical extents when the view
//! is built. The view's extents are the first statically known operand
//! extents, else those of the first operand.
//!
//! Views are array-like values themselves, so the dispatcher can stream
//! them into storage. When all operands share a storage order, the flat view
//! walks the operands' own flat views in lockstep; otherwise the first operand
//! streams and the others are read in its order through a
//! [`CoordFlat`](crate::CoordFlat). A [`Zip`] of two packed
//! operands under a wordwise operator (e.g. [`And`](crate::traits::And) of two
//! [`BitArray`](crate::BitArray)s) also exposes a direct view that combines
//! whole storage words.

use crate::array::{Array, VecArray};
use crate::bits::BitArray;
use crate::caps::{
    assert_same_extents, cast_unit, same_type, ArrayLike, ArrayLikeMut, Capabilities, Packing,
};
use crate::dispatch::copy_assign;
use crate::flat::CoordFlat;
use crate::grid::Grid;
use crate::index::Index;
use crate::order::{same_order, StorageOrder};
use allocator_api2::alloc::Allocator;
use loopnest_traits::{BinaryOp, UnaryOp};
use num_traits::Zero;
use std::marker::PhantomData;

const fn first_static<const N: usize>(
    a: Option<[usize; N]>,
    b: Option<[usize; N]>,
) -> Option<[usize; N]> {
    match a {
        Some(extents) => Some(extents),
        None => b,
    }
}

/// Whether two operands can be combined unit by unit.
const fn fusable(a: Capabilities, b: Capabilities, same_order: bool, wordwise: bool) -> bool {
    a.direct_view
        && b.direct_view
        && a.packing.is_packed()
        && a.packing.same(b.packing)
        && same_order
        && wordwise
}

// ============================================================================
// Flat iterators
// ============================================================================

/// Flat view of a two-operand view.
pub enum ZipFlat<'s, A, B, C, const N: usize>
where
    A: ArrayLike<N> + 's,
    B: ArrayLike<N> + 's,
{
    /// Operands share a storage order: walk their flat views together.
    Streams {
        a: A::Flat<'s>,
        b: B::Flat<'s>,
        combine: C,
    },
    /// Stream the first operand; read the second at each of its coordinates.
    Coords {
        a: A::Flat<'s>,
        b: CoordFlat<'s, B, N>,
        combine: C,
    },
}

impl<'s, A, B, C, const N: usize> ZipFlat<'s, A, B, C, N>
where
    A: ArrayLike<N> + 's,
    B: ArrayLike<N> + 's,
{
    fn new(a: &'s A, b: &'s B, combine: C) -> Self {
        if same_order::<A::Order, B::Order>() {
            ZipFlat::Streams {
                a: a.flat(),
                b: b.flat(),
                combine,
            }
        } else {
            ZipFlat::Coords {
                a: a.flat(),
                b: CoordFlat::in_order::<A::Order>(b),
                combine,
            }
        }
    }
}

impl<'s, A, B, C, T, const N: usize> Iterator for ZipFlat<'s, A, B, C, N>
where
    A: ArrayLike<N> + 's,
    B: ArrayLike<N> + 's,
    C: FnMut(A::Elem, B::Elem) -> T,
{
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        match self {
            ZipFlat::Streams { a, b, combine } => {
                let x = a.next()?;
                let y = b.next()?;
                Some(combine(x, y))
            }
            ZipFlat::Coords { a, b, combine } => {
                let x = a.next()?;
                let y = b.next()?;
                Some(combine(x, y))
            }
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            ZipFlat::Streams { a, .. } | ZipFlat::Coords { a, .. } => a.size_hint(),
        }
    }
}

/// Flat view of a three-operand view.
pub enum Zip3Flat<'s, A, B, C, F, const N: usize>
where
    A: ArrayLike<N> + 's,
    B: ArrayLike<N> + 's,
    C: ArrayLike<N> + 's,
{
    Streams {
        a: A::Flat<'s>,
        b: B::Flat<'s>,
        c: C::Flat<'s>,
        f: F,
    },
    Coords {
        a: A::Flat<'s>,
        b: CoordFlat<'s, B, N>,
        c: CoordFlat<'s, C, N>,
        f: F,
    },
}

impl<'s, A, B, C, F, T, const N: usize> Iterator for Zip3Flat<'s, A, B, C, F, N>
where
    A: ArrayLike<N> + 's,
    B: ArrayLike<N> + 's,
    C: ArrayLike<N> + 's,
    F: FnMut(A::Elem, B::Elem, C::Elem) -> T,
{
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        match self {
            Zip3Flat::Streams { a, b, c, f } => {
                let x = a.next()?;
                let y = b.next()?;
                let z = c.next()?;
                Some(f(x, y, z))
            }
            Zip3Flat::Coords { a, b, c, f } => {
                let x = a.next()?;
                let y = b.next()?;
                let z = c.next()?;
                Some(f(x, y, z))
            }
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Zip3Flat::Streams { a, .. } | Zip3Flat::Coords { a, .. } => a.size_hint(),
        }
    }
}

/// Direct view of a fused [`Zip`]: one combined unit per pair of units.
pub struct ZipUnits<DA, DB, U> {
    a: DA,
    b: DB,
    f: fn(U, U) -> U,
}

impl<DA, DB, U> Iterator for ZipUnits<DA, DB, U>
where
    DA: Iterator<Item = U>,
    DB: Iterator,
    DB::Item: 'static,
    U: 'static,
{
    type Item = U;

    #[inline]
    fn next(&mut self) -> Option<U> {
        let x = self.a.next()?;
        let y = cast_unit::<DB::Item, U>(self.b.next()?);
        Some((self.f)(x, y))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.a.size_hint()
    }
}

// ============================================================================
// Map
// ============================================================================

/// `f(a[i])` at every position.
pub struct Map<'a, A, F> {
    array: &'a A,
    f: F,
}

impl<'a, A, F> Map<'a, A, F> {
    pub fn new(array: &'a A, f: F) -> Self {
        Map { array, f }
    }
}

impl<'a, A, F, T, const N: usize> ArrayLike<N> for Map<'a, A, F>
where
    A: ArrayLike<N>,
    F: Fn(A::Elem) -> T,
{
    type Elem = T;
    type Unit = ();
    type Order = A::Order;
    type Ref<'s> = T where Self: 's;
    type Flat<'s> = std::iter::Map<A::Flat<'s>, &'s F> where Self: 's;
    type Direct<'s> = std::iter::Empty<()> where Self: 's;

    const CAPS: Capabilities = Capabilities {
        fast_flat_view: A::CAPS.fast_flat_view,
        ..Capabilities::LAZY
    };

    const STATIC_EXTENTS: Option<[usize; N]> = A::STATIC_EXTENTS;

    #[inline]
    fn extents(&self) -> [usize; N] {
        self.array.extents()
    }

    #[inline]
    fn at(&self, index: &Index<N>) -> T {
        self.get(index)
    }

    #[inline]
    fn get(&self, index: &Index<N>) -> T {
        (self.f)(self.array.get(index))
    }

    #[inline]
    fn flat(&self) -> Self::Flat<'_> {
        self.array.flat().map(&self.f)
    }

    fn direct(&self) -> Option<Self::Direct<'_>> {
        None
    }
}

// ============================================================================
// Zip
// ============================================================================

/// `Op(a[i], b[i])` at every position.
pub struct Zip<'a, 'b, A, B, Op> {
    a: &'a A,
    b: &'b B,
    _op: PhantomData<Op>,
}

impl<'a, 'b, A, B, Op> Zip<'a, 'b, A, B, Op> {
    /// # Panics
    ///
    /// Panics when the operand extents differ.
    #[track_caller]
    pub fn new<const N: usize>(a: &'a A, b: &'b B) -> Self
    where
        A: ArrayLike<N>,
        B: ArrayLike<N>,
    {
        assert_same_extents(&a.extents(), &b.extents());
        Zip {
            a,
            b,
            _op: PhantomData,
        }
    }
}

impl<'a, 'b, A, B, Op, const N: usize> ArrayLike<N> for Zip<'a, 'b, A, B, Op>
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    Op: BinaryOp<A::Elem, B::Elem>,
{
    type Elem = Op::Output;
    type Unit = A::Unit;
    type Order = A::Order;
    type Ref<'s> = Op::Output where Self: 's;
    type Flat<'s> = ZipFlat<'s, A, B, fn(A::Elem, B::Elem) -> Op::Output, N> where Self: 's;
    type Direct<'s> = ZipUnits<A::Direct<'s>, B::Direct<'s>, A::Unit> where Self: 's;

    const CAPS: Capabilities = {
        let fused = fusable(
            A::CAPS,
            B::CAPS,
            same_order::<A::Order, B::Order>(),
            <Op as BinaryOp<A::Elem, B::Elem>>::WORDWISE,
        );
        Capabilities {
            direct_view: fused,
            fast_flat_view: same_order::<A::Order, B::Order>()
                && A::CAPS.fast_flat_view
                && B::CAPS.fast_flat_view,
            packing: if fused {
                A::CAPS.packing
            } else {
                Packing::Unpacked
            },
            ..Capabilities::LAZY
        }
    };

    const STATIC_EXTENTS: Option<[usize; N]> = first_static(A::STATIC_EXTENTS, B::STATIC_EXTENTS);

    #[inline]
    fn extents(&self) -> [usize; N] {
        match Self::STATIC_EXTENTS {
            Some(extents) => extents,
            None => self.a.extents(),
        }
    }

    #[inline]
    fn at(&self, index: &Index<N>) -> Op::Output {
        self.get(index)
    }

    #[inline]
    fn get(&self, index: &Index<N>) -> Op::Output {
        Op::call(self.a.get(index), self.b.get(index))
    }

    #[inline]
    fn flat(&self) -> Self::Flat<'_> {
        let combine: fn(A::Elem, B::Elem) -> Op::Output = Op::call;
        ZipFlat::new(self.a, self.b, combine)
    }

    fn direct(&self) -> Option<Self::Direct<'_>> {
        if !Self::direct_available() {
            return None;
        }
        Some(ZipUnits {
            a: self.a.direct()?,
            b: self.b.direct()?,
            f: <Op as BinaryOp<A::Elem, B::Elem>>::word_fn::<A::Unit>()?,
        })
    }

    fn direct_available() -> bool {
        Self::CAPS.direct_view
            && A::direct_available()
            && B::direct_available()
            && same_type::<A::Unit, B::Unit>()
            && <Op as BinaryOp<A::Elem, B::Elem>>::word_fn::<A::Unit>().is_some()
    }
}

// ============================================================================
// ZipWith / Zip3With
// ============================================================================

/// `f(a[i], b[i])` at every position.
pub struct ZipWith<'a, 'b, A, B, F> {
    a: &'a A,
    b: &'b B,
    f: F,
}

impl<'a, 'b, A, B, F> ZipWith<'a, 'b, A, B, F> {
    #[track_caller]
    pub fn new<const N: usize>(a: &'a A, b: &'b B, f: F) -> Self
    where
        A: ArrayLike<N>,
        B: ArrayLike<N>,
    {
        assert_same_extents(&a.extents(), &b.extents());
        ZipWith { a, b, f }
    }
}

impl<'a, 'b, A, B, F, T, const N: usize> ArrayLike<N> for ZipWith<'a, 'b, A, B, F>
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    F: Fn(A::Elem, B::Elem) -> T,
{
    type Elem = T;
    type Unit = ();
    type Order = A::Order;
    type Ref<'s> = T where Self: 's;
    type Flat<'s> = ZipFlat<'s, A, B, &'s F, N> where Self: 's;
    type Direct<'s> = std::iter::Empty<()> where Self: 's;

    const CAPS: Capabilities = Capabilities {
        fast_flat_view: same_order::<A::Order, B::Order>()
            && A::CAPS.fast_flat_view
            && B::CAPS.fast_flat_view,
        ..Capabilities::LAZY
    };

    const STATIC_EXTENTS: Option<[usize; N]> = first_static(A::STATIC_EXTENTS, B::STATIC_EXTENTS);

    #[inline]
    fn extents(&self) -> [usize; N] {
        match Self::STATIC_EXTENTS {
            Some(extents) => extents,
            None => self.a.extents(),
        }
    }

    #[inline]
    fn at(&self, index: &Index<N>) -> T {
        self.get(index)
    }

    #[inline]
    fn get(&self, index: &Index<N>) -> T {
        (self.f)(self.a.get(index), self.b.get(index))
    }

    #[inline]
    fn flat(&self) -> Self::Flat<'_> {
        ZipFlat::new(self.a, self.b, &self.f)
    }

    fn direct(&self) -> Option<Self::Direct<'_>> {
        None
    }
}

/// `f(a[i], b[i], c[i])` at every position.
pub struct Zip3With<'a, 'b, 'c, A, B, C, F> {
    a: &'a A,
    b: &'b B,
    c: &'c C,
    f: F,
}

impl<'a, 'b, 'c, A, B, C, F> Zip3With<'a, 'b, 'c, A, B, C, F> {
    #[track_caller]
    pub fn new<const N: usize>(a: &'a A, b: &'b B, c: &'c C, f: F) -> Self
    where
        A: ArrayLike<N>,
        B: ArrayLike<N>,
        C: ArrayLike<N>,
    {
        let extents = a.extents();
        assert_same_extents(&extents, &b.extents());
        assert_same_extents(&extents, &c.extents());
        Zip3With { a, b, c, f }
    }
}

impl<'a, 'b, 'c, A, B, C, F, T, const N: usize> ArrayLike<N> for Zip3With<'a, 'b, 'c, A, B, C, F>
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    C: ArrayLike<N>,
    F: Fn(A::Elem, B::Elem, C::Elem) -> T,
{
    type Elem = T;
    type Unit = ();
    type Order = A::Order;
    type Ref<'s> = T where Self: 's;
    type Flat<'s> = Zip3Flat<'s, A, B, C, &'s F, N> where Self: 's;
    type Direct<'s> = std::iter::Empty<()> where Self: 's;

    const CAPS: Capabilities = Capabilities {
        fast_flat_view: same_order::<A::Order, B::Order>()
            && same_order::<A::Order, C::Order>()
            && A::CAPS.fast_flat_view
            && B::CAPS.fast_flat_view
            && C::CAPS.fast_flat_view,
        ..Capabilities::LAZY
    };

    const STATIC_EXTENTS: Option<[usize; N]> = first_static(
        A::STATIC_EXTENTS,
        first_static(B::STATIC_EXTENTS, C::STATIC_EXTENTS),
    );

    #[inline]
    fn extents(&self) -> [usize; N] {
        match Self::STATIC_EXTENTS {
            Some(extents) => extents,
            None => self.a.extents(),
        }
    }

    #[inline]
    fn at(&self, index: &Index<N>) -> T {
        self.get(index)
    }

    #[inline]
    fn get(&self, index: &Index<N>) -> T {
        (self.f)(self.a.get(index), self.b.get(index), self.c.get(index))
    }

    fn flat(&self) -> Self::Flat<'_> {
        if same_order::<A::Order, B::Order>() && same_order::<A::Order, C::Order>() {
            Zip3Flat::Streams {
                a: self.a.flat(),
                b: self.b.flat(),
                c: self.c.flat(),
                f: &self.f,
            }
        } else {
            Zip3Flat::Coords {
                a: self.a.flat(),
                b: CoordFlat::in_order::<A::Order>(self.b),
                c: CoordFlat::in_order::<A::Order>(self.c),
                f: &self.f,
            }
        }
    }

    fn direct(&self) -> Option<Self::Direct<'_>> {
        None
    }
}

// ============================================================================
// Unary
// ============================================================================

/// `Op(a[i])` at every position.
pub struct Unary<'a, A, Op> {
    a: &'a A,
    _op: PhantomData<Op>,
}

impl<'a, A, Op> Unary<'a, A, Op> {
    pub fn new(a: &'a A) -> Self {
        Unary {
            a,
            _op: PhantomData,
        }
    }
}

impl<'a, A, Op, const N: usize> ArrayLike<N> for Unary<'a, A, Op>
where
    A: ArrayLike<N>,
    Op: UnaryOp<A::Elem>,
{
    type Elem = Op::Output;
    type Unit = A::Unit;
    type Order = A::Order;
    type Ref<'s> = Op::Output where Self: 's;
    type Flat<'s> = std::iter::Map<A::Flat<'s>, fn(A::Elem) -> Op::Output> where Self: 's;
    type Direct<'s> = std::iter::Map<A::Direct<'s>, fn(A::Unit) -> A::Unit> where Self: 's;

    const CAPS: Capabilities = {
        let fused = A::CAPS.direct_view
            && A::CAPS.packing.is_packed()
            && <Op as UnaryOp<A::Elem>>::WORDWISE;
        Capabilities {
            direct_view: fused,
            fast_flat_view: A::CAPS.fast_flat_view,
            packing: if fused {
                A::CAPS.packing
            } else {
                Packing::Unpacked
            },
            ..Capabilities::LAZY
        }
    };

    const STATIC_EXTENTS: Option<[usize; N]> = A::STATIC_EXTENTS;

    #[inline]
    fn extents(&self) -> [usize; N] {
        self.a.extents()
    }

    #[inline]
    fn at(&self, index: &Index<N>) -> Op::Output {
        self.get(index)
    }

    #[inline]
    fn get(&self, index: &Index<N>) -> Op::Output {
        Op::call(self.a.get(index))
    }

    #[inline]
    fn flat(&self) -> Self::Flat<'_> {
        let f: fn(A::Elem) -> Op::Output = Op::call;
        self.a.flat().map(f)
    }

    fn direct(&self) -> Option<Self::Direct<'_>> {
        if !Self::direct_available() {
            return None;
        }
        let f = <Op as UnaryOp<A::Elem>>::word_fn::<A::Unit>()?;
        Some(self.a.direct()?.map(f))
    }

    fn direct_available() -> bool {
        Self::CAPS.direct_view
            && A::direct_available()
            && <Op as UnaryOp<A::Elem>>::word_fn::<A::Unit>().is_some()
    }
}

// ============================================================================
// Constructors and evaluation
// ============================================================================

pub fn map<'a, A, F>(a: &'a A, f: F) -> Map<'a, A, F> {
    Map::new(a, f)
}

/// Lazy `op(a[i], b[i])`, e.g. `zip(&a, &b, And)`.
#[track_caller]
pub fn zip<'a, 'b, A, B, Op, const N: usize>(a: &'a A, b: &'b B, _op: Op) -> Zip<'a, 'b, A, B, Op>
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    Op: BinaryOp<A::Elem, B::Elem>,
{
    Zip::new(a, b)
}

#[track_caller]
pub fn zip_with<'a, 'b, A, B, F, T, const N: usize>(
    a: &'a A,
    b: &'b B,
    f: F,
) -> ZipWith<'a, 'b, A, B, F>
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    F: Fn(A::Elem, B::Elem) -> T,
{
    ZipWith::new(a, b, f)
}

#[track_caller]
pub fn zip3_with<'a, 'b, 'c, A, B, C, F, T, const N: usize>(
    a: &'a A,
    b: &'b B,
    c: &'c C,
    f: F,
) -> Zip3With<'a, 'b, 'c, A, B, C, F>
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    C: ArrayLike<N>,
    F: Fn(A::Elem, B::Elem, C::Elem) -> T,
{
    Zip3With::new(a, b, c, f)
}

/// Lazy `op(a[i])`, e.g. `unary(&bits, Not)`.
pub fn unary<'a, A, Op, const N: usize>(a: &'a A, _op: Op) -> Unary<'a, A, Op>
where
    A: ArrayLike<N>,
    Op: UnaryOp<A::Elem>,
{
    Unary::new(a)
}

/// Lazy `a[i] == b[i]`.
#[track_caller]
pub fn eq_view<'a, 'b, A, B, const N: usize>(
    a: &'a A,
    b: &'b B,
) -> Zip<'a, 'b, A, B, loopnest_traits::Eq>
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    A::Elem: PartialEq<B::Elem>,
{
    Zip::new(a, b)
}

/// Lazy `a[i] < b[i]`.
#[track_caller]
pub fn lt_view<'a, 'b, A, B, const N: usize>(
    a: &'a A,
    b: &'b B,
) -> Zip<'a, 'b, A, B, loopnest_traits::Lt>
where
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    A::Elem: PartialOrd<B::Elem>,
{
    Zip::new(a, b)
}

/// `dest[i] = f(src[i])`.
#[track_caller]
pub fn map_into<D, A, F, const N: usize>(dest: &mut D, src: &A, f: F)
where
    D: ArrayLikeMut<N>,
    A: ArrayLike<N>,
    F: Fn(A::Elem) -> D::Elem,
{
    copy_assign(dest, &Map::new(src, f));
}

/// `dest[i] = f(a[i], b[i])`.
#[track_caller]
pub fn zip_map2_into<D, A, B, F, const N: usize>(dest: &mut D, a: &A, b: &B, f: F)
where
    D: ArrayLikeMut<N>,
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    F: Fn(A::Elem, B::Elem) -> D::Elem,
{
    copy_assign(dest, &ZipWith::new(a, b, f));
}

/// `dest[i] = f(a[i], b[i], c[i])`.
#[track_caller]
pub fn zip_map3_into<D, A, B, C, F, const N: usize>(dest: &mut D, a: &A, b: &B, c: &C, f: F)
where
    D: ArrayLikeMut<N>,
    A: ArrayLike<N>,
    B: ArrayLike<N>,
    C: ArrayLike<N>,
    F: Fn(A::Elem, B::Elem, C::Elem) -> D::Elem,
{
    copy_assign(dest, &Zip3With::new(a, b, c, f));
}

/// Fold `map_fn` of every element with `reduce_fn`, in storage order.
pub fn reduce<A, M, R, U, const N: usize>(src: &A, map_fn: M, reduce_fn: R, init: U) -> U
where
    A: ArrayLike<N>,
    M: Fn(A::Elem) -> U,
    R: Fn(U, U) -> U,
{
    src.flat().fold(init, |acc, x| reduce_fn(acc, map_fn(x)))
}

pub fn sum<A, const N: usize>(src: &A) -> A::Elem
where
    A: ArrayLike<N>,
    A::Elem: Zero + std::ops::Add<Output = A::Elem>,
{
    reduce(src, |x| x, |a, b| a + b, A::Elem::zero())
}

// ============================================================================
// Operators on owning arrays
// ============================================================================

macro_rules! lazy_operators {
    ($([$($gen:tt)*] $ty:ty, $n:tt;)*) => {
        $( lazy_operators!(@each [$($gen)*] $ty, $n); )*
    };
    (@each [$($gen:tt)*] $ty:ty, $n:tt) => {
        lazy_operators!(@binary [$($gen)*] $ty, $n, BitAnd, bitand, And);
        lazy_operators!(@binary [$($gen)*] $ty, $n, BitOr, bitor, Or);
        lazy_operators!(@binary [$($gen)*] $ty, $n, BitXor, bitxor, Xor);
        lazy_operators!(@binary [$($gen)*] $ty, $n, Add, add, Add);
        lazy_operators!(@binary [$($gen)*] $ty, $n, Sub, sub, Sub);
        lazy_operators!(@binary [$($gen)*] $ty, $n, Mul, mul, Mul);
        lazy_operators!(@binary [$($gen)*] $ty, $n, Div, div, Div);
        lazy_operators!(@binary [$($gen)*] $ty, $n, Rem, rem, Rem);
        lazy_operators!(@unary [$($gen)*] $ty, $n, Not, not, Not);
        lazy_operators!(@unary [$($gen)*] $ty, $n, Neg, neg, Neg);
    };
    (@binary [$($gen:tt)*] $ty:ty, $n:tt, $tr:ident, $method:ident, $op:ident) => {
        impl<'z, 'r, $($gen)* Rhs> std::ops::$tr<&'r Rhs> for &'z $ty
        where
            $ty: ArrayLike<$n>,
            Rhs: ArrayLike<$n>,
        {
            type Output = Zip<'z, 'r, $ty, Rhs, loopnest_traits::$op>;

            #[track_caller]
            fn $method(self, rhs: &'r Rhs) -> Self::Output {
                Zip::new(self, rhs)
            }
        }
    };
    (@unary [$($gen:tt)*] $ty:ty, $n:tt, $tr:ident, $method:ident, $op:ident) => {
        impl<'z, $($gen)*> std::ops::$tr for &'z $ty
        where
            $ty: ArrayLike<$n>,
        {
            type Output = Unary<'z, $ty, loopnest_traits::$op>;

            fn $method(self) -> Self::Output {
                Unary::new(self)
            }
        }
    };
}

lazy_operators! {
    [T, const N: usize, O: StorageOrder, A: Allocator,] Array<T, N, O, A>, N;
    [T, const N: usize, O: StorageOrder, A: Allocator,] VecArray<T, N, O, A>, N;
    [const N: usize, O: StorageOrder, A: Allocator,] BitArray<N, O, A>, N;
    [T, const ROWS: usize, const COLS: usize,] Grid<T, ROWS, COLS>, 2;
}
