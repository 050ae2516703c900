//! Generic programming over elementwise operators.
//!
//! Every operator is a unit struct implementing [`BinaryOp`] or [`UnaryOp`].
//! Lazy views take it as a type parameter, e.g. `Zip<'_, '_, A, B, And>`;
//! constructor functions take the value, e.g. `zip(&a, &b, And)`.
//!
//! Operators flagged [`BinaryOp::WORDWISE`] can also be applied to whole
//! storage words of packed boolean arrays. Such an operator must map a pair of
//! zero words to a zero word, so that padding bits stay clear.

use crate::word::{lift_binary, lift_unary};

/// A function that combines `L` with `R`.
pub trait BinaryOp<L, R = L> {
    type Output;

    /// Whether [`BinaryOp::word_fn`] is available for packed storage words.
    const WORDWISE: bool = false;

    fn call(l: L, r: R) -> Self::Output;

    /// The operator applied to whole storage words of type `W`, if any.
    #[inline]
    fn word_fn<W: 'static>() -> Option<fn(W, W) -> W> {
        None
    }
}

/// A function of one operand.
pub trait UnaryOp<T> {
    type Output;

    /// Whether [`UnaryOp::word_fn`] is available for packed storage words.
    const WORDWISE: bool = false;

    fn call(t: T) -> Self::Output;

    #[inline]
    fn word_fn<W: 'static>() -> Option<fn(W) -> W> {
        None
    }
}

macro_rules! for_each_word {
    ($lift:ident, $w:ty, $f:expr) => {
        $lift::<$w, u8>($f)
            .or_else(|| $lift::<$w, u16>($f))
            .or_else(|| $lift::<$w, u32>($f))
            .or_else(|| $lift::<$w, u64>($f))
            .or_else(|| $lift::<$w, u128>($f))
            .or_else(|| $lift::<$w, usize>($f))
    };
}

// ----------------------------------------------------------------------------
// Arithmetic

macro_rules! arithmetic_ops {
    ($($name:ident: $tr:ident::$method:ident;)*) => {
        $(
            #[doc = concat!("Lifts [`std::ops::", stringify!($tr), "`].")]
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $name;

            impl<L, R> BinaryOp<L, R> for $name
            where
                L: std::ops::$tr<R>,
            {
                type Output = L::Output;

                #[inline(always)]
                fn call(l: L, r: R) -> Self::Output {
                    std::ops::$tr::$method(l, r)
                }
            }
        )*
    };
}

arithmetic_ops! {
    Add: Add::add;
    Sub: Sub::sub;
    Mul: Mul::mul;
    Div: Div::div;
    Rem: Rem::rem;
}

// ----------------------------------------------------------------------------
// Bitwise

macro_rules! bitwise_ops {
    ($($name:ident: $tr:ident::$method:ident, $sym:tt;)*) => {
        $(
            #[doc = concat!("Lifts [`std::ops::", stringify!($tr), "`]; applies to packed words.")]
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $name;

            impl<L, R> BinaryOp<L, R> for $name
            where
                L: std::ops::$tr<R>,
            {
                type Output = L::Output;
                const WORDWISE: bool = true;

                #[inline(always)]
                fn call(l: L, r: R) -> Self::Output {
                    std::ops::$tr::$method(l, r)
                }

                #[inline]
                fn word_fn<W: 'static>() -> Option<fn(W, W) -> W> {
                    for_each_word!(lift_binary, W, |a, b| a $sym b)
                }
            }
        )*
    };
}

bitwise_ops! {
    And: BitAnd::bitand, &;
    Or: BitOr::bitor, |;
    Xor: BitXor::bitxor, ^;
}

// ----------------------------------------------------------------------------
// Relational

macro_rules! relational_ops {
    ($($name:ident: $bound:ident, $sym:tt;)*) => {
        $(
            #[doc = concat!("Elementwise `", stringify!($sym), "`, yielding `bool`.")]
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $name;

            impl<L, R> BinaryOp<L, R> for $name
            where
                L: $bound<R>,
            {
                type Output = bool;

                #[inline(always)]
                fn call(l: L, r: R) -> bool {
                    l $sym r
                }
            }
        )*
    };
}

relational_ops! {
    Eq: PartialEq, ==;
    Ne: PartialEq, !=;
    Lt: PartialOrd, <;
    Le: PartialOrd, <=;
    Gt: PartialOrd, >;
    Ge: PartialOrd, >=;
}

// ----------------------------------------------------------------------------
// Unary

/// Passes the operand through; applies to packed words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Identity;

impl<T> UnaryOp<T> for Identity {
    type Output = T;
    const WORDWISE: bool = true;

    #[inline(always)]
    fn call(t: T) -> T {
        t
    }

    #[inline]
    fn word_fn<W: 'static>() -> Option<fn(W) -> W> {
        for_each_word!(lift_unary, W, |a| a)
    }
}

/// Lifts [`std::ops::Not`]. Flipping a packed word would set its padding
/// bits, so this operator is not wordwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Not;

impl<T: std::ops::Not> UnaryOp<T> for Not {
    type Output = T::Output;

    #[inline(always)]
    fn call(t: T) -> Self::Output {
        !t
    }
}

/// Lifts [`std::ops::Neg`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Neg;

impl<T: std::ops::Neg> UnaryOp<T> for Neg {
    type Output = T::Output;

    #[inline(always)]
    fn call(t: T) -> Self::Output {
        -t
    }
}
