//! Shared traits for the loopnest ecosystem.
//!
//! This crate holds the operator table consumed by the lazy elementwise views
//! of `loopnest`, and the [`Word`] bound for packed storage units. External
//! crates can depend on `loopnest-traits` to add operators of their own
//! without orphan rule violations.

pub mod ops;
pub mod word;

pub use ops::{
    Add, And, BinaryOp, Div, Eq, Ge, Gt, Identity, Le, Lt, Mul, Ne, Neg, Not, Or, Rem, Sub,
    UnaryOp, Xor,
};
pub use word::{lift_binary, lift_unary, Word};
