//! Iteration domains: per-axis bounds plus a loop attribute.
//!
//! [`Range`] fixes every policy in the type, so a statically sized axis can be
//! fully unrolled and a missing remainder loop on it is a compile error.
//! [`DynRange`] chooses direction and tiling at run time and is what the
//! dispatcher uses for its coordinate loops.
//!
//! Axes are listed outermost first; each one names the index dimension it
//! drives, so the list is also the axis traversal order.

use crate::coord::{Coord, End, Fixed};
use crate::index::Index;
use crate::kernel::{drive, AxisPlan, Domain};
use crate::order::{check_permutation, StorageOrder};
use crate::{fatal, LoopError, Result};
use log::trace;
use smallvec::SmallVec;

// ============================================================================
// Policies
// ============================================================================

/// Direction in which an axis is walked.
pub trait Direction: Copy + Default + std::fmt::Debug + 'static {
    const DESCENDING: bool;
}

/// From the base upward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ascending;

/// From the last stride multiple below the extent down to the base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Descending;

impl Direction for Ascending {
    const DESCENDING: bool = false;
}

impl Direction for Descending {
    const DESCENDING: bool = true;
}

/// How many copies of the loop body one iteration runs.
pub trait UnrollPolicy: Copy + Default + std::fmt::Debug + 'static {
    /// Body copies per iteration; ignored when [`UnrollPolicy::FULL`].
    const FACTOR: usize;
    /// The whole axis is one group.
    const FULL: bool = false;

    /// Visit `len` consecutive steps from `start`.
    fn run_group<V: FnMut(usize) -> bool>(start: usize, len: usize, visit: &mut V) -> bool;
}

/// One body per iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoUnroll;

/// `F` bodies per iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unroll<const F: usize>;

/// Every step of a statically sized axis in one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullUnroll;

impl UnrollPolicy for NoUnroll {
    const FACTOR: usize = 1;

    #[inline(always)]
    fn run_group<V: FnMut(usize) -> bool>(start: usize, _len: usize, visit: &mut V) -> bool {
        visit(start)
    }
}

impl<const F: usize> UnrollPolicy for Unroll<F> {
    const FACTOR: usize = {
        assert!(F > 0, "unroll factor must be positive");
        F
    };

    #[inline(always)]
    fn run_group<V: FnMut(usize) -> bool>(start: usize, _len: usize, visit: &mut V) -> bool {
        // Constant trip count: the body is replicated F times.
        for k in 0..F {
            if !visit(start + k) {
                return false;
            }
        }
        true
    }
}

impl UnrollPolicy for FullUnroll {
    const FACTOR: usize = 1;
    const FULL: bool = true;

    #[inline(always)]
    fn run_group<V: FnMut(usize) -> bool>(start: usize, len: usize, visit: &mut V) -> bool {
        for k in 0..len {
            if !visit(start + k) {
                return false;
            }
        }
        true
    }
}

/// Group length read from the plan at run time, for [`DynRange`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DynUnroll;

impl UnrollPolicy for DynUnroll {
    const FACTOR: usize = 1;

    #[inline]
    fn run_group<V: FnMut(usize) -> bool>(start: usize, len: usize, visit: &mut V) -> bool {
        (start..start + len).all(visit)
    }
}

/// Tiling of an axis and whether a remainder loop is emitted.
pub trait TilePolicy: Copy + std::fmt::Debug + 'static {
    /// Groups per tile when known at compile time (1 for untiled axes).
    const STATIC_SIZE: Option<usize>;
    /// Remainder flag when known at compile time.
    const STATIC_REMAINDER: Option<bool>;

    fn size(&self) -> Option<usize>;
    fn remainder(&self) -> bool;
}

/// Untiled. `REMAINDER = false` asserts that the unroll factor divides the
/// axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoTile<const REMAINDER: bool = true>;

/// `T` groups per tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile<const T: usize, const REMAINDER: bool = true>;

/// Tile size chosen at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynTile {
    pub size: usize,
    pub remainder: bool,
}

impl<const REMAINDER: bool> TilePolicy for NoTile<REMAINDER> {
    const STATIC_SIZE: Option<usize> = Some(1);
    const STATIC_REMAINDER: Option<bool> = Some(REMAINDER);

    #[inline]
    fn size(&self) -> Option<usize> {
        None
    }

    #[inline]
    fn remainder(&self) -> bool {
        REMAINDER
    }
}

impl<const T: usize, const REMAINDER: bool> TilePolicy for Tile<T, REMAINDER> {
    const STATIC_SIZE: Option<usize> = {
        assert!(T > 0, "tile size must be positive");
        Some(T)
    };
    const STATIC_REMAINDER: Option<bool> = Some(REMAINDER);

    #[inline]
    fn size(&self) -> Option<usize> {
        Some(T)
    }

    #[inline]
    fn remainder(&self) -> bool {
        REMAINDER
    }
}

impl TilePolicy for DynTile {
    const STATIC_SIZE: Option<usize> = None;
    const STATIC_REMAINDER: Option<bool> = None;

    #[inline]
    fn size(&self) -> Option<usize> {
        Some(self.size)
    }

    #[inline]
    fn remainder(&self) -> bool {
        self.remainder
    }
}

/// Loop attribute of one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attr<D = Ascending, U = NoUnroll, T = NoTile> {
    pub direction: D,
    pub unroll: U,
    pub tile: T,
}

impl Attr {
    /// Ascending, not unrolled, untiled.
    pub const fn new() -> Self {
        Attr {
            direction: Ascending,
            unroll: NoUnroll,
            tile: NoTile,
        }
    }
}

impl<D, U, T> Attr<D, U, T> {
    pub fn descending(self) -> Attr<Descending, U, T> {
        Attr {
            direction: Descending,
            unroll: self.unroll,
            tile: self.tile,
        }
    }

    pub fn ascending(self) -> Attr<Ascending, U, T> {
        Attr {
            direction: Ascending,
            unroll: self.unroll,
            tile: self.tile,
        }
    }

    pub fn unroll<const F: usize>(self) -> Attr<D, Unroll<F>, T> {
        Attr {
            direction: self.direction,
            unroll: Unroll,
            tile: self.tile,
        }
    }

    pub fn full_unroll(self) -> Attr<D, FullUnroll, T> {
        Attr {
            direction: self.direction,
            unroll: FullUnroll,
            tile: self.tile,
        }
    }

    /// Tile with a remainder loop.
    pub fn tile<const S: usize>(self) -> Attr<D, U, Tile<S, true>> {
        Attr {
            direction: self.direction,
            unroll: self.unroll,
            tile: Tile,
        }
    }

    /// Tile without a remainder loop; the chunk must divide the axis.
    pub fn tile_exact<const S: usize>(self) -> Attr<D, U, Tile<S, false>> {
        Attr {
            direction: self.direction,
            unroll: self.unroll,
            tile: Tile,
        }
    }

    pub fn dyn_tile(self, size: usize, remainder: bool) -> Attr<D, U, DynTile> {
        Attr {
            direction: self.direction,
            unroll: self.unroll,
            tile: DynTile { size, remainder },
        }
    }

    /// Untiled without a remainder loop; the unroll factor must divide the
    /// axis.
    pub fn exact(self) -> Attr<D, U, NoTile<false>> {
        Attr {
            direction: self.direction,
            unroll: self.unroll,
            tile: NoTile,
        }
    }
}

// ============================================================================
// Axes
// ============================================================================

/// One axis of a [`Range`]: `base, base + stride, ..` below `extent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axis<B, E, S, A = Attr> {
    /// Index dimension driven by this axis.
    pub dim: usize,
    pub base: B,
    /// Exclusive end; `extent - base` must be a multiple of `stride`.
    pub extent: E,
    pub stride: S,
    pub attr: A,
}

impl Axis<Fixed<0>, End, Fixed<1>, Attr> {
    /// The whole dimension `dim`, ascending with unit stride.
    pub const fn full(dim: usize) -> Self {
        Axis {
            dim,
            base: Fixed,
            extent: End,
            stride: Fixed,
            attr: Attr::new(),
        }
    }
}

impl<B, E, S, A> Axis<B, E, S, A> {
    pub const fn new(dim: usize, base: B, extent: E, stride: S, attr: A) -> Self {
        Axis {
            dim,
            base,
            extent,
            stride,
            attr,
        }
    }

    pub fn with_attr<A2>(self, attr: A2) -> Axis<B, E, S, A2> {
        Axis {
            dim: self.dim,
            base: self.base,
            extent: self.extent,
            stride: self.stride,
            attr,
        }
    }
}

impl<B, E, S, D, U, T> Axis<B, E, S, Attr<D, U, T>>
where
    B: Coord,
    E: Coord,
    S: Coord,
    D: Direction,
    U: UnrollPolicy,
    T: TilePolicy,
{
    const STATIC_STEPS: Option<usize> = match (B::STATIC, E::STATIC, S::STATIC) {
        (Some(b), Some(e), Some(s)) => {
            assert!(s > 0, "static stride must be positive");
            assert!(
                e >= b && (e - b) % s == 0,
                "static axis bounds must span a whole number of strides"
            );
            Some((e - b) / s)
        }
        _ => None,
    };

    const STATIC_CHECK: () = {
        if U::FULL {
            assert!(
                Self::STATIC_STEPS.is_some(),
                "full unrolling requires static base, extent and stride"
            );
        } else if let (Some(steps), Some(tile), Some(false)) =
            (Self::STATIC_STEPS, T::STATIC_SIZE, T::STATIC_REMAINDER)
        {
            assert!(
                steps % (U::FACTOR * tile) == 0,
                "tile and unroll factors must divide a static axis without a remainder loop"
            );
        }
    };
}

/// An axis that can resolve itself into an [`AxisPlan`] and drive it.
pub trait AxisSpec {
    fn dim(&self) -> usize;

    /// Resolve against the extent of the addressed dimension.
    fn plan(&self, extent: usize) -> Result<AxisPlan>;

    /// Run the plan with this axis' unroll policy.
    fn drive<V: FnMut(usize) -> bool>(&self, plan: &AxisPlan, visit: V) -> bool;
}

impl<B, E, S, D, U, T> AxisSpec for Axis<B, E, S, Attr<D, U, T>>
where
    B: Coord,
    E: Coord,
    S: Coord,
    D: Direction,
    U: UnrollPolicy,
    T: TilePolicy,
{
    #[inline]
    fn dim(&self) -> usize {
        self.dim
    }

    fn plan(&self, extent: usize) -> Result<AxisPlan> {
        #[allow(clippy::let_unit_value)]
        let () = Self::STATIC_CHECK;
        let factor = if U::FULL { None } else { Some(U::FACTOR) };
        AxisPlan::new(
            self.dim,
            extent,
            self.base.eval(extent),
            self.extent.eval(extent),
            self.stride.eval(extent),
            D::DESCENDING,
            factor,
            self.attr.tile.size(),
            self.attr.tile.remainder(),
        )
    }

    #[inline]
    fn drive<V: FnMut(usize) -> bool>(&self, plan: &AxisPlan, visit: V) -> bool {
        drive::<U, V>(plan, visit)
    }
}

/// A compile-time list of axes, nested as `(A, (B, (C, ())))`.
///
/// Build one with [`axes!`](crate::axes).
pub trait AxisList {
    const LEN: usize;

    /// Index dimensions of the axes, outermost first.
    fn dims(&self, out: &mut SmallVec<[usize; 8]>);

    /// Resolved plans, outermost first.
    fn plans(&self, shape: &[usize], out: &mut SmallVec<[AxisPlan; 8]>) -> Result<()>;

    /// Run the nest with `plans` resolved by [`AxisList::plans`], one per
    /// axis in the same order.
    fn walk<const N: usize, F: FnMut(&Index<N>) -> bool>(
        &self,
        plans: &[AxisPlan],
        idx: &mut Index<N>,
        f: &mut F,
    ) -> bool;
}

impl AxisList for () {
    const LEN: usize = 0;

    fn dims(&self, _out: &mut SmallVec<[usize; 8]>) {}

    fn plans(&self, _shape: &[usize], _out: &mut SmallVec<[AxisPlan; 8]>) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn walk<const N: usize, F: FnMut(&Index<N>) -> bool>(
        &self,
        _plans: &[AxisPlan],
        idx: &mut Index<N>,
        f: &mut F,
    ) -> bool {
        f(idx)
    }
}

impl<H: AxisSpec, T: AxisList> AxisList for (H, T) {
    const LEN: usize = 1 + T::LEN;

    fn dims(&self, out: &mut SmallVec<[usize; 8]>) {
        out.push(self.0.dim());
        self.1.dims(out);
    }

    fn plans(&self, shape: &[usize], out: &mut SmallVec<[AxisPlan; 8]>) -> Result<()> {
        let dim = self.0.dim();
        let extent = shape
            .get(dim)
            .copied()
            .ok_or(LoopError::RankMismatch(dim + 1, shape.len()))?;
        out.push(self.0.plan(extent)?);
        self.1.plans(shape, out)
    }

    #[inline]
    fn walk<const N: usize, F: FnMut(&Index<N>) -> bool>(
        &self,
        plans: &[AxisPlan],
        idx: &mut Index<N>,
        f: &mut F,
    ) -> bool {
        let Some((plan, rest)) = plans.split_first() else {
            fatal(LoopError::RankMismatch(Self::LEN, 0));
        };
        let dim = plan.dim();
        let inner = &self.1;
        self.0.drive(plan, |c| {
            idx.0[dim] = c;
            inner.walk(rest, idx, f)
        })
    }
}

/// Build an [`AxisList`] from axes given outermost first.
#[macro_export]
macro_rules! axes {
    () => { () };
    ($head:expr $(, $rest:expr)* $(,)?) => {
        ($head, $crate::axes!($($rest),*))
    };
}

// ============================================================================
// Range
// ============================================================================

/// A loop nest whose per-axis policies are part of its type.
///
/// Bounds are evaluated and validated once, at construction; walking only
/// replays the resolved plans.
#[derive(Debug, Clone)]
pub struct Range<const N: usize, L: AxisList> {
    shape: [usize; N],
    axes: L,
    plans: SmallVec<[AxisPlan; 8]>,
}

impl<const N: usize, L: AxisList> Range<N, L> {
    /// A nest over the index space `shape`. Invalid bounds are fatal.
    #[track_caller]
    pub fn new(shape: [usize; N], axes: L) -> Self {
        match Self::try_new(shape, axes) {
            Ok(range) => range,
            Err(err) => fatal(err),
        }
    }

    pub fn try_new(shape: [usize; N], axes: L) -> Result<Self> {
        const { assert!(L::LEN == N, "a range needs exactly one axis per dimension") };
        let mut dims = SmallVec::new();
        axes.dims(&mut dims);
        check_permutation(&dims)?;
        let mut plans = SmallVec::<[AxisPlan; 8]>::new();
        axes.plans(&shape, &mut plans)?;
        trace!("range over {shape:?}: {plans:?}");
        Ok(Range { shape, axes, plans })
    }

    pub fn axes(&self) -> &L {
        &self.axes
    }

    /// Resolved plans, outermost first.
    pub fn plans(&self) -> &[AxisPlan] {
        &self.plans
    }

    fn bounds(&self) -> ([usize; N], [usize; N], [usize; N]) {
        let mut bases = [0; N];
        let mut ends = [0; N];
        let mut strides = [0; N];
        for plan in &self.plans {
            let d = plan.dim();
            bases[d] = plan.base();
            ends[d] = plan.end();
            strides[d] = plan.stride();
        }
        (bases, ends, strides)
    }

    /// Evaluated base of every dimension.
    pub fn bases(&self) -> Index<N> {
        Index(self.bounds().0)
    }

    /// Evaluated exclusive end of every dimension.
    pub fn extents(&self) -> Index<N> {
        Index(self.bounds().1)
    }

    pub fn strides(&self) -> Index<N> {
        Index(self.bounds().2)
    }
}

impl<const N: usize, L: AxisList> Domain<N> for Range<N, L> {
    fn shape(&self) -> [usize; N] {
        self.shape
    }

    fn walk<F: FnMut(&Index<N>) -> bool>(&self, mut f: F) -> bool {
        let mut idx = Index::zeros();
        self.axes.walk(&self.plans, &mut idx, &mut f)
    }

    fn len(&self) -> usize {
        self.plans.iter().map(AxisPlan::steps).product()
    }
}

// ============================================================================
// DynRange
// ============================================================================

/// One axis of a [`DynRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynAxis {
    pub dim: usize,
    pub base: usize,
    pub end: usize,
    pub stride: usize,
    pub descending: bool,
    /// Steps per group; the remainder rule applies to `unroll * tile`.
    pub unroll: usize,
    pub tile: Option<usize>,
    pub remainder: bool,
}

impl DynAxis {
    /// `0..end` along `dim`, ascending, untiled.
    pub const fn new(dim: usize, end: usize) -> Self {
        DynAxis {
            dim,
            base: 0,
            end,
            stride: 1,
            descending: false,
            unroll: 1,
            tile: None,
            remainder: true,
        }
    }

    pub const fn base(mut self, base: usize) -> Self {
        self.base = base;
        self
    }

    pub const fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub const fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Visit `factor` steps per group. A factor of zero is rejected when the
    /// range is built.
    pub const fn unroll(mut self, factor: usize) -> Self {
        self.unroll = factor;
        self
    }

    pub const fn tile(mut self, size: usize) -> Self {
        self.tile = Some(size);
        self
    }

    /// Drop the remainder loop; the tile size must divide the axis.
    pub const fn exact(mut self) -> Self {
        self.remainder = false;
        self
    }

    fn plan(&self, extent: usize) -> Result<AxisPlan> {
        AxisPlan::new(
            self.dim,
            extent,
            self.base,
            self.end,
            self.stride,
            self.descending,
            Some(self.unroll),
            self.tile,
            self.remainder,
        )
    }
}

/// A loop nest whose policies are chosen at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynRange<const N: usize> {
    shape: [usize; N],
    axes: [DynAxis; N],
}

impl<const N: usize> DynRange<N> {
    /// Every coordinate of `shape`, in the storage order `O`.
    pub fn over<O: StorageOrder>(shape: [usize; N]) -> Self {
        let axes = std::array::from_fn(|level| {
            let dim = O::axis_at(level, N);
            DynAxis::new(dim, shape[dim])
        });
        DynRange { shape, axes }
    }

    pub fn try_from_axes(shape: [usize; N], axes: [DynAxis; N]) -> Result<Self> {
        let dims: SmallVec<[usize; 8]> = axes.iter().map(|a| a.dim).collect();
        check_permutation(&dims)?;
        for axis in &axes {
            let plan = axis.plan(shape[axis.dim])?;
            trace!("dyn range axis {}: {plan:?}", axis.dim);
        }
        Ok(DynRange { shape, axes })
    }

    /// Axes given outermost first. Invalid bounds are fatal.
    pub fn from_axes(shape: [usize; N], axes: [DynAxis; N]) -> Self {
        match Self::try_from_axes(shape, axes) {
            Ok(range) => range,
            Err(err) => fatal(err),
        }
    }

    pub fn axes(&self) -> &[DynAxis; N] {
        &self.axes
    }

    /// Replace the axis at nesting `level`. Invalid bounds are fatal.
    pub fn with_axis(self, level: usize, f: impl FnOnce(DynAxis) -> DynAxis) -> Self {
        let mut axes = self.axes;
        axes[level] = f(axes[level]);
        Self::from_axes(self.shape, axes)
    }

    fn plans(&self) -> [AxisPlan; N] {
        std::array::from_fn(|level| {
            let axis = &self.axes[level];
            match axis.plan(self.shape[axis.dim]) {
                Ok(plan) => plan,
                Err(err) => fatal(err),
            }
        })
    }
}

fn walk_level<const N: usize, F: FnMut(&Index<N>) -> bool>(
    plans: &[AxisPlan; N],
    level: usize,
    idx: &mut Index<N>,
    f: &mut F,
) -> bool {
    if level == N {
        return f(idx);
    }
    let plan = &plans[level];
    let dim = plan.dim();
    drive::<DynUnroll, _>(plan, |c| {
        idx.0[dim] = c;
        walk_level(plans, level + 1, idx, f)
    })
}

impl<const N: usize> Domain<N> for DynRange<N> {
    fn shape(&self) -> [usize; N] {
        self.shape
    }

    fn walk<F: FnMut(&Index<N>) -> bool>(&self, mut f: F) -> bool {
        let plans = self.plans();
        let mut idx = Index::zeros();
        walk_level(&plans, 0, &mut idx, &mut f)
    }

    fn len(&self) -> usize {
        self.plans().iter().map(AxisPlan::steps).product()
    }
}
