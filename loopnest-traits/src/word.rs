//! Storage words for bit-packed arrays.

use num_traits::PrimInt;
use std::any::Any;

/// An unsigned machine word usable as the storage unit of packed booleans.
pub trait Word: PrimInt + 'static {
    /// Number of logical elements one word holds.
    const BITS: u32;
}

macro_rules! impl_word {
    ($($t:ty),*) => {
        $(
            impl Word for $t {
                const BITS: u32 = <$t>::BITS;
            }
        )*
    };
}

impl_word!(u8, u16, u32, u64, u128, usize);

/// Reinterpret a word function written for `X` as one over `W`.
///
/// Returns `None` unless `W` and `X` are the same type.
#[inline]
pub fn lift_binary<W: 'static, X: Word>(f: fn(X, X) -> X) -> Option<fn(W, W) -> W> {
    (&f as &dyn Any).downcast_ref::<fn(W, W) -> W>().copied()
}

/// Unary counterpart of [`lift_binary`].
#[inline]
pub fn lift_unary<W: 'static, X: Word>(f: fn(X) -> X) -> Option<fn(W) -> W> {
    (&f as &dyn Any).downcast_ref::<fn(W) -> W>().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lift_matches_only_same_word() {
        let and = lift_binary::<u64, u64>(|a, b| a & b);
        assert_eq!(and.map(|f| f(0b1100, 0b1010)), Some(0b1000));
        assert!(lift_binary::<u32, u64>(|a, b| a & b).is_none());
        assert!(lift_unary::<bool, u8>(|a| !a).is_none());
    }

    #[test]
    fn word_bits() {
        assert_eq!(<u64 as Word>::BITS, 64);
        assert_eq!(<u8 as Word>::BITS, 8);
    }
}
