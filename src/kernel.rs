//! Loop-nest evaluation engine.
//!
//! Each axis of a domain resolves to an [`AxisPlan`]: where it starts, how
//! many strides it takes, in which direction, and how the steps are grouped.
//! [`drive`] runs one axis as
//!
//! ```text
//! for tile in 0..steps / chunk
//!     for group in 0..tile_size
//!         body x factor        (replicated by the unroll policy)
//! for step in remainder        (only when the remainder loop is enabled)
//!     body
//! ```
//!
//! and domains nest one `drive` per axis, outermost axis first. Grouping never
//! changes the visiting order inside an axis, and axes are never interchanged,
//! so `do_while` stops at the same coordinate whatever the policies are.

use crate::index::Index;
use crate::range::UnrollPolicy;
use crate::{LoopError, Result};

/// The resolved traversal of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPlan {
    dim: usize,
    base: usize,
    stride: usize,
    steps: usize,
    descending: bool,
    factor: usize,
    tile: Option<usize>,
}

impl AxisPlan {
    /// Validate the bounds and grouping of axis `dim`.
    ///
    /// `factor` of `None` requests full unrolling: the whole axis becomes one
    /// group and tiling is ignored. `extent` is the size of the addressed
    /// dimension; every visited coordinate must lie below it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        dim: usize,
        extent: usize,
        base: usize,
        end: usize,
        stride: usize,
        descending: bool,
        factor: Option<usize>,
        tile: Option<usize>,
        remainder: bool,
    ) -> Result<Self> {
        if stride == 0 {
            return Err(LoopError::ZeroStride { axis: dim });
        }
        if end < base || (end - base) % stride != 0 {
            return Err(LoopError::StrideMismatch {
                axis: dim,
                base,
                end,
                stride,
            });
        }
        let steps = (end - base) / stride;
        if steps > 0 && base + (steps - 1) * stride >= extent {
            return Err(LoopError::IndexOutOfBounds {
                index: vec![base + (steps - 1) * stride],
                extents: vec![extent],
            });
        }
        if factor == Some(0) || tile == Some(0) {
            return Err(LoopError::ZeroFactor { axis: dim });
        }
        let (factor, tile) = match factor {
            None => (steps.max(1), None),
            Some(f) => (f, tile.filter(|&t| t > 1)),
        };
        let plan = Self {
            dim,
            base,
            stride,
            steps,
            descending,
            factor,
            tile,
        };
        let chunk = plan.chunk();
        if !remainder && steps % chunk != 0 {
            return Err(LoopError::RemainderRequired {
                axis: dim,
                steps,
                chunk,
            });
        }
        Ok(plan)
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Exclusive end: `base + steps * stride`.
    #[inline]
    pub fn end(&self) -> usize {
        self.base + self.steps * self.stride
    }

    /// Number of coordinates the axis visits.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Steps covered by one tile: tile size times unroll factor.
    #[inline]
    pub fn chunk(&self) -> usize {
        self.factor * self.tile.unwrap_or(1)
    }

    /// Coordinate of step `p`.
    #[inline(always)]
    pub fn coord(&self, p: usize) -> usize {
        if self.descending {
            self.base + (self.steps - 1 - p) * self.stride
        } else {
            self.base + p * self.stride
        }
    }
}

/// Run one axis; stops and returns `false` as soon as `visit` does.
#[inline]
pub(crate) fn drive<U, V>(plan: &AxisPlan, mut visit: V) -> bool
where
    U: UnrollPolicy,
    V: FnMut(usize) -> bool,
{
    if plan.steps == 0 {
        return true;
    }
    let mut body = |p: usize| visit(plan.coord(p));
    let tiles = plan.steps / plan.chunk();
    let groups = plan.tile.unwrap_or(1);

    let mut p = 0;
    for _ in 0..tiles {
        for _ in 0..groups {
            if !U::run_group(p, plan.factor, &mut body) {
                return false;
            }
            p += plan.factor;
        }
    }
    // Remainder loop; empty unless the plan allowed one.
    while p < plan.steps {
        if !body(p) {
            return false;
        }
        p += 1;
    }
    true
}

// ============================================================================
// Domains
// ============================================================================

/// An `N`-dimensional iteration domain.
pub trait Domain<const N: usize> {
    /// Extents of the index space the coordinates address.
    fn shape(&self) -> [usize; N];

    /// Visit coordinates until `f` returns `false`; returns whether the whole
    /// domain was visited.
    fn walk<F: FnMut(&Index<N>) -> bool>(&self, f: F) -> bool;

    /// Number of coordinates visited by a full walk.
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Apply `f` at every coordinate of `domain`.
#[inline]
pub fn for_each<const N: usize, D, F>(domain: &D, mut f: F)
where
    D: Domain<N>,
    F: FnMut(&Index<N>),
{
    domain.walk(|idx| {
        f(idx);
        true
    });
}

/// Apply `f` until it returns `false`; no later coordinate is visited.
///
/// Returns `true` when the full domain was visited.
#[inline]
pub fn do_while<const N: usize, D, F>(domain: &D, f: F) -> bool
where
    D: Domain<N>,
    F: FnMut(&Index<N>) -> bool,
{
    domain.walk(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{FullUnroll, NoUnroll, Unroll};

    fn visits<U: UnrollPolicy>(plan: &AxisPlan) -> Vec<usize> {
        let mut seen = Vec::new();
        drive::<U, _>(plan, |c| {
            seen.push(c);
            true
        });
        seen
    }

    #[test]
    fn ascending_and_descending() {
        let up = AxisPlan::new(0, 10, 1, 9, 2, false, Some(1), None, true).unwrap();
        assert_eq!(visits::<NoUnroll>(&up), vec![1, 3, 5, 7]);
        let down = AxisPlan::new(0, 10, 1, 9, 2, true, Some(1), None, true).unwrap();
        assert_eq!(visits::<NoUnroll>(&down), vec![7, 5, 3, 1]);
    }

    #[test]
    fn unroll_with_remainder() {
        let plan = AxisPlan::new(0, 7, 0, 7, 1, false, Some(3), None, true).unwrap();
        assert_eq!(plan.chunk(), 3);
        assert_eq!(visits::<Unroll<3>>(&plan), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn tiles_and_unroll() {
        let plan = AxisPlan::new(0, 24, 0, 24, 2, false, Some(2), Some(3), false).unwrap();
        assert_eq!(plan.steps(), 12);
        assert_eq!(plan.chunk(), 6);
        assert_eq!(visits::<Unroll<2>>(&plan), (0..24).step_by(2).collect::<Vec<_>>());
    }

    #[test]
    fn full_unroll_ignores_tiles() {
        let plan = AxisPlan::new(0, 5, 0, 5, 1, false, None, Some(4), false).unwrap();
        assert_eq!(plan.chunk(), 5);
        assert_eq!(visits::<FullUnroll>(&plan), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn rejected_plans() {
        assert_eq!(
            AxisPlan::new(1, 8, 0, 8, 0, false, Some(1), None, true),
            Err(LoopError::ZeroStride { axis: 1 })
        );
        assert!(matches!(
            AxisPlan::new(0, 8, 0, 7, 2, false, Some(1), None, true),
            Err(LoopError::StrideMismatch { .. })
        ));
        assert_eq!(
            AxisPlan::new(0, 7, 0, 7, 1, false, Some(2), None, false),
            Err(LoopError::RemainderRequired {
                axis: 0,
                steps: 7,
                chunk: 2
            })
        );
        assert!(matches!(
            AxisPlan::new(0, 4, 0, 6, 1, false, Some(1), None, true),
            Err(LoopError::IndexOutOfBounds { .. })
        ));
        assert_eq!(
            AxisPlan::new(2, 4, 0, 4, 1, false, Some(0), None, true),
            Err(LoopError::ZeroFactor { axis: 2 })
        );
        assert_eq!(
            AxisPlan::new(0, 4, 0, 4, 1, false, Some(2), Some(0), true),
            Err(LoopError::ZeroFactor { axis: 0 })
        );
    }

    #[test]
    fn early_exit_inside_unrolled_group() {
        let plan = AxisPlan::new(0, 8, 0, 8, 1, false, Some(4), None, false).unwrap();
        let mut seen = Vec::new();
        let finished = drive::<Unroll<4>, _>(&plan, |c| {
            seen.push(c);
            c != 5
        });
        assert!(!finished);
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn empty_axis_visits_nothing() {
        let plan = AxisPlan::new(0, 0, 0, 0, 1, false, Some(1), None, false).unwrap();
        assert!(visits::<NoUnroll>(&plan).is_empty());
    }
}
