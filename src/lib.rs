//! Capability-dispatched N-dimensional arrays with a loop-nest evaluator.
//!
//! An array operation (copy, move, construction, comparison, elementwise
//! map) is written once against the [`ArrayLike`] interface. The dispatcher
//! picks the cheapest legal execution strategy from the capability constants
//! the concrete types declare, so the selection costs nothing at run time.
//!
//! # Core Types
//!
//! - [`Coord`] implementations ([`Fixed`], [`Dyn`], [`End`]) and their lazy
//!   arithmetic ([`Sum`], [`Diff`], [`Prod`], [`Quot`])
//! - [`Index`], [`SubIndex`], [`Fused`]: positions, back-referencing slices and
//!   concatenation of positions
//! - [`Range`] (per-axis policies fixed in the type) and [`DynRange`]
//!   (policies chosen at run time)
//! - [`Array`], [`VecArray`], [`Grid`], [`BitArray`]: owning storage; all but
//!   `Grid` allocate through an [`Allocator`], [`Global`] by default
//! - [`Map`], [`Zip`], [`ZipWith`], [`Zip3With`], [`Unary`]: lazy views
//!
//! # Loop nests
//!
//! - [`for_each`]: visit every coordinate of a domain
//! - [`do_while`]: visit until the callback returns `false`
//!
//! # Dispatch
//!
//! - [`copy_assign`], [`move_assign`], [`construct`]
//! - [`all_eq`], [`any_ne`], [`all_by`]
//! - [`plan_assign`], [`plan_construct`], [`plan_compare`] report the tier
//!   the operations above pick for a pair of types
//!
//! # Example
//!
//! ```rust
//! use loopnest::{all_eq, copy_assign, Array};
//!
//! let src: Array<i32, 2> = Array::from_parts(vec![1, 2, 3, 4], [2, 2]);
//! let mut dst: Array<i32, 2> = Array::zeros([2, 2]);
//! copy_assign(&mut dst, &src);
//! assert!(all_eq(&dst, &src));
//! ```
//!
//! # Failure model
//!
//! Contract violations known at compile time (rank mismatch, full unrolling of
//! an axis with run-time bounds, a statically known missing remainder loop) do
//! not build. Violations found at run time panic with a [`LoopError`]
//! diagnostic; the `try_*` entry points return the same error instead.

mod array;
mod bits;
mod caps;
mod coord;
mod dispatch;
mod elementwise;
mod flat;
mod grid;
mod index;
mod kernel;
mod order;
mod range;

pub use loopnest_traits as traits;
pub use loopnest_traits::{BinaryOp, UnaryOp, Word};

// ============================================================================
// Coordinates, indices and ranges
// ============================================================================
pub use coord::{Coord, Diff, Dyn, End, Fixed, Prod, Quot, Sum};
pub use index::{index_cmp, index_eq, Fused, Index, IndexLike, SubIndex};
pub use range::{
    Ascending, Attr, Axis, AxisList, AxisSpec, Descending, Direction, DynAxis, DynRange, DynTile,
    FullUnroll, NoTile, NoUnroll, Range, Tile, TilePolicy, Unroll, UnrollPolicy,
};

// ============================================================================
// Loop-nest evaluation
// ============================================================================
pub use kernel::{do_while, for_each, AxisPlan, Domain};

// ============================================================================
// Storage and views
// ============================================================================
pub use allocator_api2::alloc::{Allocator, Global};
pub use array::{Array, VecArray};
pub use bits::{BitArray, BitMut, BitRef, Bits};
pub use flat::{CoordFlat, IndexWalker};
pub use grid::Grid;
pub use order::{ColMajor, OrderKind, RowMajor, StorageOrder};

// ============================================================================
// Capabilities and dispatch
// ============================================================================
pub use caps::{ArrayLike, ArrayLikeMut, Capabilities, Construct, Packing, ResizeKind};
pub use dispatch::{
    all_by, all_eq, any_ne, construct, copy_assign, move_assign, plan_assign, plan_compare,
    plan_construct, try_construct, try_copy_assign, try_move_assign, CompareStrategy,
    ConstructStrategy, Strategy,
};

// ============================================================================
// Elementwise lazy views
// ============================================================================
pub use elementwise::{
    eq_view, lt_view, map, map_into, reduce, sum, unary, zip, zip3_with, zip_map2_into,
    zip_map3_into, zip_with, Map, Unary, Zip, Zip3Flat, Zip3With, ZipFlat, ZipUnits, ZipWith,
};

// ============================================================================
// Constants
// ============================================================================

/// Number of booleans packed into one storage word of a [`BitArray`].
pub const WORD_BITS: usize = u64::BITS as usize;

// ============================================================================
// Error types
// ============================================================================

/// Contract violations detected at run time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoopError {
    /// Index ranks do not match.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Extents are incompatible for the operation.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// A fixed-extent destination received a source of other extents.
    #[error("destination with extents {from:?} is not resizable to {to:?}")]
    NotResizable { from: Vec<usize>, to: Vec<usize> },

    /// Element access outside the extents.
    #[error("index {index:?} out of bounds for extents {extents:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        extents: Vec<usize>,
    },

    /// An axis was given a zero stride.
    #[error("invalid stride 0 for axis {axis}")]
    ZeroStride { axis: usize },

    /// An unroll factor or tile size of zero.
    #[error("axis {axis}: unroll factor and tile size must be positive")]
    ZeroFactor { axis: usize },

    /// `end - base` is negative or not a multiple of the stride.
    #[error("axis {axis}: bounds {base}..{end} are not a whole number of strides {stride}")]
    StrideMismatch {
        axis: usize,
        base: usize,
        end: usize,
        stride: usize,
    },

    /// A tile/unroll chunk does not divide the step count and no remainder
    /// loop was requested.
    #[error("axis {axis}: {steps} steps are not divisible by chunk {chunk} and the remainder loop is disabled")]
    RemainderRequired {
        axis: usize,
        steps: usize,
        chunk: usize,
    },

    /// Axis dimensions do not form a permutation of `0..rank`.
    #[error("invalid axis permutation {0:?}")]
    InvalidPermutation(Vec<usize>),

    /// Element list length differs from the product of the extents.
    #[error("{len} elements do not fill extents {extents:?}")]
    ElementCount { len: usize, extents: Vec<usize> },

    /// A capability was declared but the view could not be produced.
    #[error("{0} view advertised but unavailable")]
    MissingView(&'static str),
}

/// Result alias for fallible loopnest operations.
pub type Result<T> = std::result::Result<T, LoopError>;

/// Abort on a contract violation.
#[cold]
#[track_caller]
pub(crate) fn fatal(err: LoopError) -> ! {
    panic!("loopnest: {err}")
}
