//! Axis coordinates: static, dynamic, and lazy arithmetic over both.
//!
//! A coordinate is evaluated against the extent of the axis it ends up
//! addressing, so [`End`] means "one past the last element" of whatever axis
//! it is applied to. Arithmetic builds expression nodes and evaluates nothing
//! until [`Coord::eval`] is called.
//!
//! Staticness is contagious: an expression has a [`Coord::STATIC`] value
//! exactly when every operand does, and a static expression that overflows
//! or divides by zero fails to compile once its value is used.

use crate::fatal;
use crate::LoopError;
use std::ops::{Add, Div, Mul, Sub};

/// A scalar axis position.
pub trait Coord: Copy {
    /// The compile-time value, when known.
    const STATIC: Option<usize>;

    /// Evaluate against the extent of the addressed axis.
    fn eval(&self, extent: usize) -> usize;

    #[inline]
    fn is_static(&self) -> bool {
        Self::STATIC.is_some()
    }
}

/// A coordinate fixed at compile time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Fixed<const V: usize>;

impl<const V: usize> Coord for Fixed<V> {
    const STATIC: Option<usize> = Some(V);

    #[inline(always)]
    fn eval(&self, _extent: usize) -> usize {
        V
    }
}

/// A coordinate held at run time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Dyn(pub usize);

impl Coord for Dyn {
    const STATIC: Option<usize> = None;

    #[inline(always)]
    fn eval(&self, _extent: usize) -> usize {
        self.0
    }
}

impl Coord for usize {
    const STATIC: Option<usize> = None;

    #[inline(always)]
    fn eval(&self, _extent: usize) -> usize {
        *self
    }
}

/// The extent of the axis the coordinate is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct End;

impl Coord for End {
    const STATIC: Option<usize> = None;

    #[inline(always)]
    fn eval(&self, extent: usize) -> usize {
        extent
    }
}

impl<C: Coord> Coord for &C {
    const STATIC: Option<usize> = C::STATIC;

    #[inline(always)]
    fn eval(&self, extent: usize) -> usize {
        (**self).eval(extent)
    }
}

// ============================================================================
// Expression nodes
// ============================================================================

macro_rules! coord_nodes {
    ($($(#[$doc:meta])* $node:ident => $checked:ident, $sym:literal;)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $node<A, B>(pub A, pub B);

            impl<A: Coord, B: Coord> Coord for $node<A, B> {
                const STATIC: Option<usize> = match (A::STATIC, B::STATIC) {
                    (Some(a), Some(b)) => match a.$checked(b) {
                        Some(v) => Some(v),
                        None => panic!(concat!("static coordinate `", $sym, "` out of range")),
                    },
                    _ => None,
                };

                #[inline]
                fn eval(&self, extent: usize) -> usize {
                    if let Some(v) = Self::STATIC {
                        return v;
                    }
                    let (a, b) = (self.0.eval(extent), self.1.eval(extent));
                    match a.$checked(b) {
                        Some(v) => v,
                        None => fatal(LoopError::IndexOutOfBounds {
                            index: vec![a, b],
                            extents: vec![extent],
                        }),
                    }
                }
            }
        )*
    };
}

coord_nodes! {
    /// Lazy `a + b`.
    Sum => checked_add, "+";
    /// Lazy `a - b`; negative results are fatal.
    Diff => checked_sub, "-";
    /// Lazy `a * b`.
    Prod => checked_mul, "*";
    /// Lazy `a / b`; division by zero is fatal.
    Quot => checked_div, "/";
}

macro_rules! impl_coord_arith {
    ($([$($g:tt)*] $ty:ty),* $(,)?) => {
        $(
            impl<$($g)* Rhs: Coord> Add<Rhs> for $ty {
                type Output = Sum<Self, Rhs>;
                #[inline(always)]
                fn add(self, rhs: Rhs) -> Self::Output {
                    Sum(self, rhs)
                }
            }

            impl<$($g)* Rhs: Coord> Sub<Rhs> for $ty {
                type Output = Diff<Self, Rhs>;
                #[inline(always)]
                fn sub(self, rhs: Rhs) -> Self::Output {
                    Diff(self, rhs)
                }
            }

            impl<$($g)* Rhs: Coord> Mul<Rhs> for $ty {
                type Output = Prod<Self, Rhs>;
                #[inline(always)]
                fn mul(self, rhs: Rhs) -> Self::Output {
                    Prod(self, rhs)
                }
            }

            impl<$($g)* Rhs: Coord> Div<Rhs> for $ty {
                type Output = Quot<Self, Rhs>;
                #[inline(always)]
                fn div(self, rhs: Rhs) -> Self::Output {
                    Quot(self, rhs)
                }
            }
        )*
    };
}

impl_coord_arith!(
    [const V: usize,] Fixed<V>,
    [] Dyn,
    [] End,
    [A, B,] Sum<A, B>,
    [A, B,] Diff<A, B>,
    [A, B,] Prod<A, B>,
    [A, B,] Quot<A, B>,
);
