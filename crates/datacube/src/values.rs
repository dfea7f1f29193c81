//! Type-erased element storage.
//!
//! [`Values`] is a closed sum over typed element buffers. Matching on the
//! enum replaces dynamic casts: every cross-type operation (arithmetic,
//! equality, copying) is an exhaustive `match`, so unsupported combinations
//! are ordinary error returns instead of stubbed-out overloads.
//!
//! Typed access goes through the sealed [`Element`] trait, which maps each
//! element type to its variant, in the spirit of per-type accessors like
//! `as_u8_slice` on a storage enum.

use std::sync::Arc;

use rayon::prelude::*;

use crate::dataset::Dataset;
use crate::dims::Dimensions;
use crate::error::{Error, Result};
use crate::strides::Region;
use crate::value::ValueWithDelta;

/// Chunk size for parallel element-wise kernels.
const PAR_CHUNK: usize = 16 * 1024;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Identifier for the element type held by a [`Values`] buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    F64,
    I32,
    I64,
    U8,
    Str,
    I64Pair,
    Fuzzy,
    Vec3,
    Vec4,
    Shape,
    IndexList,
    StrList,
    DatasetList,
}

/// Element-wise binary operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
}

/// Type-erased element buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    Str(Vec<String>),
    I64Pair(Vec<(i64, i64)>),
    Fuzzy(Vec<ValueWithDelta<f64>>),
    Vec3(Vec<[f64; 3]>),
    Vec4(Vec<[f64; 4]>),
    Shape(Vec<Arc<[f64; 100]>>),
    IndexList(Vec<Vec<usize>>),
    StrList(Vec<Vec<String>>),
    DatasetList(Vec<Dataset>),
}

macro_rules! for_each_variant {
    ($values:expr, $data:ident => $body:expr) => {
        match $values {
            Values::F64($data) => $body,
            Values::I32($data) => $body,
            Values::I64($data) => $body,
            Values::U8($data) => $body,
            Values::Str($data) => $body,
            Values::I64Pair($data) => $body,
            Values::Fuzzy($data) => $body,
            Values::Vec3($data) => $body,
            Values::Vec4($data) => $body,
            Values::Shape($data) => $body,
            Values::IndexList($data) => $body,
            Values::StrList($data) => $body,
            Values::DatasetList($data) => $body,
        }
    };
}

macro_rules! for_each_variant_pair {
    ($a:expr, $b:expr, $da:ident, $db:ident => $body:expr, $mismatch:expr) => {
        match ($a, $b) {
            (Values::F64($da), Values::F64($db)) => $body,
            (Values::I32($da), Values::I32($db)) => $body,
            (Values::I64($da), Values::I64($db)) => $body,
            (Values::U8($da), Values::U8($db)) => $body,
            (Values::Str($da), Values::Str($db)) => $body,
            (Values::I64Pair($da), Values::I64Pair($db)) => $body,
            (Values::Fuzzy($da), Values::Fuzzy($db)) => $body,
            (Values::Vec3($da), Values::Vec3($db)) => $body,
            (Values::Vec4($da), Values::Vec4($db)) => $body,
            (Values::Shape($da), Values::Shape($db)) => $body,
            (Values::IndexList($da), Values::IndexList($db)) => $body,
            (Values::StrList($da), Values::StrList($db)) => $body,
            (Values::DatasetList($da), Values::DatasetList($db)) => $body,
            _ => $mismatch,
        }
    };
}

macro_rules! numeric_apply {
    ($a:ident, $b:ident, $dst:expr, $src:expr, $iter:expr, $op:expr) => {{
        // Contiguous same-layout operands take the data-parallel fast path.
        if $dst.is_full_contiguous($iter) && $src.is_full_contiguous($iter) && $a.len() >= PAR_CHUNK
        {
            let op = $op;
            $a.par_chunks_mut(PAR_CHUNK)
                .zip($b.par_chunks(PAR_CHUNK))
                .for_each(|(ca, cb)| {
                    for (x, y) in ca.iter_mut().zip(cb) {
                        match op {
                            BinOp::Add => *x += *y,
                            BinOp::Sub => *x -= *y,
                            BinOp::Mul => *x *= *y,
                        }
                    }
                });
        } else {
            let pairs = $dst.offsets_in($iter).zip($src.offsets_in($iter));
            match $op {
                BinOp::Add => pairs.for_each(|(i, j)| $a[i] += $b[j]),
                BinOp::Sub => pairs.for_each(|(i, j)| $a[i] -= $b[j]),
                BinOp::Mul => pairs.for_each(|(i, j)| $a[i] *= $b[j]),
            }
        }
        Ok(())
    }};
}

impl Values {
    /// Element type held by this buffer.
    pub fn kind(&self) -> ElementKind {
        match self {
            Values::F64(_) => ElementKind::F64,
            Values::I32(_) => ElementKind::I32,
            Values::I64(_) => ElementKind::I64,
            Values::U8(_) => ElementKind::U8,
            Values::Str(_) => ElementKind::Str,
            Values::I64Pair(_) => ElementKind::I64Pair,
            Values::Fuzzy(_) => ElementKind::Fuzzy,
            Values::Vec3(_) => ElementKind::Vec3,
            Values::Vec4(_) => ElementKind::Vec4,
            Values::Shape(_) => ElementKind::Shape,
            Values::IndexList(_) => ElementKind::IndexList,
            Values::StrList(_) => ElementKind::StrList,
            Values::DatasetList(_) => ElementKind::DatasetList,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        for_each_variant!(self, data => data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A buffer of `len` default-valued elements of the given kind.
    pub fn new_default(kind: ElementKind, len: usize) -> Values {
        match kind {
            ElementKind::F64 => Values::F64(vec![0.0; len]),
            ElementKind::I32 => Values::I32(vec![0; len]),
            ElementKind::I64 => Values::I64(vec![0; len]),
            ElementKind::U8 => Values::U8(vec![0; len]),
            ElementKind::Str => Values::Str(vec![String::new(); len]),
            ElementKind::I64Pair => Values::I64Pair(vec![(0, 0); len]),
            ElementKind::Fuzzy => Values::Fuzzy(vec![ValueWithDelta::default(); len]),
            ElementKind::Vec3 => Values::Vec3(vec![[0.0; 3]; len]),
            ElementKind::Vec4 => Values::Vec4(vec![[0.0; 4]; len]),
            ElementKind::Shape => Values::Shape(vec![Arc::new([0.0; 100]); len]),
            ElementKind::IndexList => Values::IndexList(vec![Vec::new(); len]),
            ElementKind::StrList => Values::StrList(vec![Vec::new(); len]),
            ElementKind::DatasetList => Values::DatasetList(vec![Dataset::new(); len]),
        }
    }

    /// Grow or shrink to `len`, filling new slots with default elements.
    pub fn resize(&mut self, len: usize) {
        match self {
            Values::F64(data) => data.resize(len, 0.0),
            Values::I32(data) => data.resize(len, 0),
            Values::I64(data) => data.resize(len, 0),
            Values::U8(data) => data.resize(len, 0),
            Values::Str(data) => data.resize(len, String::new()),
            Values::I64Pair(data) => data.resize(len, (0, 0)),
            Values::Fuzzy(data) => data.resize(len, ValueWithDelta::default()),
            Values::Vec3(data) => data.resize(len, [0.0; 3]),
            Values::Vec4(data) => data.resize(len, [0.0; 4]),
            Values::Shape(data) => data.resize(len, Arc::new([0.0; 100])),
            Values::IndexList(data) => data.resize(len, Vec::new()),
            Values::StrList(data) => data.resize(len, Vec::new()),
            Values::DatasetList(data) => data.resize(len, Dataset::new()),
        }
    }

    /// Element-wise compound assignment of `src` onto `dst`, both iterated
    /// in `iter` order (so `src` may broadcast or transpose).
    pub(crate) fn apply_region(
        &mut self,
        dst: &Region,
        iter: &Dimensions,
        other: &Values,
        src: &Region,
        op: BinOp,
    ) -> Result<()> {
        match (self, other) {
            (Values::F64(a), Values::F64(b)) => numeric_apply!(a, b, dst, src, iter, op),
            (Values::I32(a), Values::I32(b)) => numeric_apply!(a, b, dst, src, iter, op),
            (Values::I64(a), Values::I64(b)) => numeric_apply!(a, b, dst, src, iter, op),
            (Values::U8(a), Values::U8(b)) => numeric_apply!(a, b, dst, src, iter, op),
            (Values::Str(_), Values::Str(_)) => Err(Error::StringsNotAddable),
            (a, b) if a.kind() == b.kind() => Err(Error::NonArithmeticType(a.kind())),
            (a, b) => Err(Error::TagMismatch {
                expected: a.kind(),
                actual: b.kind(),
            }),
        }
    }

    /// Element-wise copy of `src` onto `dst`, both iterated in `iter` order.
    pub(crate) fn copy_region(
        &mut self,
        dst: &Region,
        iter: &Dimensions,
        other: &Values,
        src: &Region,
    ) -> Result<()> {
        let (expected, actual) = (self.kind(), other.kind());
        for_each_variant_pair!(self, other, a, b => {
            for (i, j) in dst.offsets_in(iter).zip(src.offsets_in(iter)) {
                a[i] = b[j].clone();
            }
            Ok(())
        }, Err(Error::TagMismatch { expected, actual }))
    }

    /// Clone the elements of a region into a new contiguous buffer, in the
    /// region's own dimension order.
    pub(crate) fn gather(&self, region: &Region) -> Values {
        macro_rules! gather_arm {
            ($variant:ident, $data:expr) => {
                Values::$variant(region.offsets().map(|i| $data[i].clone()).collect())
            };
        }
        match self {
            Values::F64(d) => gather_arm!(F64, d),
            Values::I32(d) => gather_arm!(I32, d),
            Values::I64(d) => gather_arm!(I64, d),
            Values::U8(d) => gather_arm!(U8, d),
            Values::Str(d) => gather_arm!(Str, d),
            Values::I64Pair(d) => gather_arm!(I64Pair, d),
            Values::Fuzzy(d) => gather_arm!(Fuzzy, d),
            Values::Vec3(d) => gather_arm!(Vec3, d),
            Values::Vec4(d) => gather_arm!(Vec4, d),
            Values::Shape(d) => gather_arm!(Shape, d),
            Values::IndexList(d) => gather_arm!(IndexList, d),
            Values::StrList(d) => gather_arm!(StrList, d),
            Values::DatasetList(d) => gather_arm!(DatasetList, d),
        }
    }

    /// Element-wise equality of two regions iterated in `iter` order.
    pub(crate) fn eq_region(
        &self,
        dst: &Region,
        iter: &Dimensions,
        other: &Values,
        src: &Region,
    ) -> bool {
        for_each_variant_pair!(self, other, a, b => {
            dst.offsets_in(iter)
                .zip(src.offsets_in(iter))
                .all(|(i, j)| a[i] == b[j])
        }, false)
    }
}

/// Sealed mapping from an element type to its [`Values`] variant.
pub trait Element: sealed::Sealed + Clone + PartialEq + Sized + 'static {
    const KIND: ElementKind;

    fn slice(values: &Values) -> Option<&[Self]>;
    fn slice_mut(values: &mut Values) -> Option<&mut [Self]>;
    fn into_values(data: Vec<Self>) -> Values;
    fn default_value() -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $default:expr) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const KIND: ElementKind = ElementKind::$variant;

            fn slice(values: &Values) -> Option<&[Self]> {
                match values {
                    Values::$variant(data) => Some(data),
                    _ => None,
                }
            }

            fn slice_mut(values: &mut Values) -> Option<&mut [Self]> {
                match values {
                    Values::$variant(data) => Some(data),
                    _ => None,
                }
            }

            fn into_values(data: Vec<Self>) -> Values {
                Values::$variant(data)
            }

            fn default_value() -> Self {
                $default
            }
        }
    };
}

impl_element!(f64, F64, 0.0);
impl_element!(i32, I32, 0);
impl_element!(i64, I64, 0);
impl_element!(u8, U8, 0);
impl_element!(String, Str, String::new());
impl_element!((i64, i64), I64Pair, (0, 0));
impl_element!(ValueWithDelta<f64>, Fuzzy, ValueWithDelta::default());
impl_element!([f64; 3], Vec3, [0.0; 3]);
impl_element!([f64; 4], Vec4, [0.0; 4]);
impl_element!(Arc<[f64; 100]>, Shape, Arc::new([0.0; 100]));
impl_element!(Vec<usize>, IndexList, Vec::new());
impl_element!(Vec<String>, StrList, Vec::new());
impl_element!(Dataset, DatasetList, Dataset::new());
