//! Error types for container operations.
//!
//! Every failure mode is a distinct, matchable variant of [`Error`].
//! Operations validate before mutating (or work on a temporary and swap), so
//! a returned error never leaves partial mutation behind.

use thiserror::Error;

use crate::dims::{Dim, Dimensions, MAX_DIMS};
use crate::tag::Tag;
use crate::unit::Unit;
use crate::values::ElementKind;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the container engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Dimensions
    // =========================================================================
    #[error("dimensions {actual:?} do not match {expected:?}")]
    DimensionMismatch {
        expected: Dimensions,
        actual: Dimensions,
    },

    #[error("dimension {dim:?} not found in {dims:?}")]
    DimensionNotFound { dim: Dim, dims: Dimensions },

    #[error("duplicate dimension {0:?}")]
    DuplicateDimension(Dim),

    #[error("at most {MAX_DIMS} dimensions are supported, got {0}")]
    TooManyDimensions(usize),

    #[error("index {index} out of range for extent {extent} of {dim:?}")]
    IndexOutOfRange {
        dim: Dim,
        index: usize,
        extent: usize,
    },

    // =========================================================================
    // Units
    // =========================================================================
    #[error("units do not match: {left:?} vs {right:?}")]
    UnitMismatch { left: Unit, right: Unit },

    #[error("no unit defined for {left:?} {op} {right:?}")]
    UnitArithmetic {
        left: Unit,
        right: Unit,
        op: &'static str,
    },

    #[error("a partial view of a variable cannot be used to change its unit")]
    PartialUnitChange,

    // =========================================================================
    // Tags and lookup
    // =========================================================================
    #[error("element types do not match: expected {expected:?}, got {actual:?}")]
    TagMismatch {
        expected: ElementKind,
        actual: ElementKind,
    },

    #[error("dataset does not contain {tag:?} with name {name:?}")]
    NotFound { tag: Tag, name: String },

    #[error("dataset does not contain a unique variable with tag {0:?}")]
    NotUnique(Tag),

    #[error("dataset already contains {tag:?} with name {name:?}")]
    DuplicateTag { tag: Tag, name: String },

    #[error("{0:?} is computed on demand and cannot be stored")]
    ComputedTagNotStorable(Tag),

    // =========================================================================
    // Shapes and bin edges
    // =========================================================================
    #[error("data of length {len} does not match volume {volume} given by dimension extents")]
    ShapeMismatch { volume: usize, len: usize },

    #[error("bin edges must be monotonically non-decreasing")]
    NonMonotonicEdges,

    #[error("expected {expected} bin edges along {dim:?}, got {actual}")]
    EdgeCountMismatch {
        dim: Dim,
        expected: usize,
        actual: usize,
    },

    // =========================================================================
    // Arithmetic
    // =========================================================================
    #[error("{0:?} is not an arithmetic element type")]
    NonArithmeticType(ElementKind),

    #[error("{op} of event lists is not supported")]
    EventsArithmeticUnsupported { op: &'static str },

    #[error("cannot add strings, use append instead")]
    StringsNotAddable,

    // =========================================================================
    // Structured iteration
    // =========================================================================
    #[error("cannot write through broadcast or transposed selector {0:?}")]
    BroadcastWrite(Tag),

    #[error(
        "variables requested for iteration do not span a joint space; \
         wrap bin-edge coordinates in Bin<_> to iterate over bins"
    )]
    NoJointIterationSpace,

    #[error("linear view misconfigured: {0}")]
    LinearViewMisconfigured(&'static str),

    // =========================================================================
    // Dataset composition
    // =========================================================================
    #[error("coordinate {0:?} differs between operands")]
    CoordinateMismatch(Tag),

    #[error("no partner for {tag:?} with name {name:?} in the other operand")]
    MissingPartner { tag: Tag, name: String },
}
