//! Dimension labels and ordered dimension lists.
//!
//! A [`Dimensions`] value is an ordered sequence of `(Dim, extent)` pairs.
//! The first entry is the outermost dimension, the last the innermost; the
//! implied memory layout is row-major over that order. At most [`MAX_DIMS`]
//! entries are supported, so the whole structure fits in a couple of cache
//! lines and is cheap to copy.

use std::fmt;

use crate::error::{Error, Result};

/// Maximum number of dimensions a variable can span.
pub const MAX_DIMS: usize = 6;

/// Dimension label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    X,
    Y,
    Z,
    Tof,
    Q,
    Spectrum,
    Detector,
    Event,
    Row,
    Component,
}

/// Ordered list of `(Dim, extent)` pairs with distinct labels.
///
/// # Example
///
/// ```
/// use datacube::{Dim, Dimensions};
///
/// let dims = Dimensions::new(&[(Dim::Y, 2), (Dim::X, 3)]).unwrap();
/// assert_eq!(dims.ndim(), 2);
/// assert_eq!(dims.volume(), 6);
/// assert_eq!(dims.size(Dim::X).unwrap(), 3);
/// // X is innermost, so it has stride 1; Y strides over a whole row.
/// assert_eq!(dims.offset(Dim::Y).unwrap(), 3);
/// ```
#[derive(Clone, Copy)]
pub struct Dimensions {
    labels: [Dim; MAX_DIMS],
    shape: [usize; MAX_DIMS],
    ndim: usize,
}

impl Dimensions {
    /// The empty (rank-0) dimension list.
    pub fn empty() -> Self {
        Self {
            labels: [Dim::X; MAX_DIMS],
            shape: [0; MAX_DIMS],
            ndim: 0,
        }
    }

    /// A single-dimension list.
    pub fn one(dim: Dim, extent: usize) -> Self {
        let mut dims = Self::empty();
        dims.labels[0] = dim;
        dims.shape[0] = extent;
        dims.ndim = 1;
        dims
    }

    /// Build from ordered `(Dim, extent)` pairs, outermost first.
    pub fn new(pairs: &[(Dim, usize)]) -> Result<Self> {
        if pairs.len() > MAX_DIMS {
            return Err(Error::TooManyDimensions(pairs.len()));
        }
        let mut dims = Self::empty();
        for &(dim, extent) in pairs {
            dims.add(dim, extent)?;
        }
        Ok(dims)
    }

    /// Number of dimensions.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// True for the rank-0 list.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ndim == 0
    }

    /// Product of all extents; 1 for the rank-0 list.
    #[inline]
    pub fn volume(&self) -> usize {
        self.shape[..self.ndim].iter().product()
    }

    /// Extents, outermost first.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape[..self.ndim]
    }

    /// Labels, outermost first.
    #[inline]
    pub fn labels(&self) -> &[Dim] {
        &self.labels[..self.ndim]
    }

    /// Label at position `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    #[inline]
    pub fn label(&self, i: usize) -> Dim {
        assert!(i < self.ndim, "dimension index {} out of bounds", i);
        self.labels[i]
    }

    /// Extent at position `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    #[inline]
    pub fn extent_at(&self, i: usize) -> usize {
        assert!(i < self.ndim, "dimension index {} out of bounds", i);
        self.shape[i]
    }

    /// Position of `dim`, if present.
    #[inline]
    pub fn index_of(&self, dim: Dim) -> Option<usize> {
        self.labels[..self.ndim].iter().position(|&d| d == dim)
    }

    /// Whether `dim` is present.
    #[inline]
    pub fn contains_dim(&self, dim: Dim) -> bool {
        self.index_of(dim).is_some()
    }

    /// Extent of `dim`.
    pub fn size(&self, dim: Dim) -> Result<usize> {
        self.index_of(dim)
            .map(|i| self.shape[i])
            .ok_or(Error::DimensionNotFound { dim, dims: *self })
    }

    /// Extent of `dim`, treating absence as extent 1.
    #[inline]
    pub fn size_or_1(&self, dim: Dim) -> usize {
        self.index_of(dim).map_or(1, |i| self.shape[i])
    }

    /// Row-major stride of `dim`: the product of all extents after it.
    pub fn offset(&self, dim: Dim) -> Result<usize> {
        let i = self
            .index_of(dim)
            .ok_or(Error::DimensionNotFound { dim, dims: *self })?;
        Ok(self.shape[i + 1..self.ndim].iter().product())
    }

    /// Row-major strides for all dimensions, outermost first.
    pub fn strides(&self) -> [usize; MAX_DIMS] {
        let mut strides = [0; MAX_DIMS];
        let mut factor = 1;
        for i in (0..self.ndim).rev() {
            strides[i] = factor;
            factor *= self.shape[i];
        }
        strides
    }

    /// Whether every `(Dim, extent)` pair of `other` appears in `self` with
    /// an identical extent.
    pub fn contains(&self, other: &Dimensions) -> bool {
        other
            .labels()
            .iter()
            .zip(other.shape())
            .all(|(&dim, &extent)| self.index_of(dim).map(|i| self.shape[i]) == Some(extent))
    }

    /// Whether `self` describes a contiguous block of `parent`'s memory:
    /// its dimensions are a suffix of `parent`'s with matching extents, or
    /// `self` is empty.
    pub fn is_contiguous_in(&self, parent: &Dimensions) -> bool {
        if self.ndim > parent.ndim {
            return false;
        }
        let skip = parent.ndim - self.ndim;
        (0..self.ndim).all(|i| {
            self.labels[i] == parent.labels[skip + i] && self.shape[i] == parent.shape[skip + i]
        })
    }

    /// Append `dim` as the new innermost dimension.
    pub fn add(&mut self, dim: Dim, extent: usize) -> Result<()> {
        if self.contains_dim(dim) {
            return Err(Error::DuplicateDimension(dim));
        }
        if self.ndim == MAX_DIMS {
            return Err(Error::TooManyDimensions(self.ndim + 1));
        }
        self.labels[self.ndim] = dim;
        self.shape[self.ndim] = extent;
        self.ndim += 1;
        Ok(())
    }

    /// Prepend `dim` as the new outermost dimension.
    pub fn prepend(&mut self, dim: Dim, extent: usize) -> Result<()> {
        if self.contains_dim(dim) {
            return Err(Error::DuplicateDimension(dim));
        }
        if self.ndim == MAX_DIMS {
            return Err(Error::TooManyDimensions(self.ndim + 1));
        }
        for i in (0..self.ndim).rev() {
            self.labels[i + 1] = self.labels[i];
            self.shape[i + 1] = self.shape[i];
        }
        self.labels[0] = dim;
        self.shape[0] = extent;
        self.ndim += 1;
        Ok(())
    }

    /// Remove `dim`, shifting later dimensions outward.
    pub fn erase(&mut self, dim: Dim) -> Result<()> {
        let i = self
            .index_of(dim)
            .ok_or(Error::DimensionNotFound { dim, dims: *self })?;
        for j in i..self.ndim - 1 {
            self.labels[j] = self.labels[j + 1];
            self.shape[j] = self.shape[j + 1];
        }
        self.ndim -= 1;
        Ok(())
    }

    /// Change the extent of `dim`, keeping its position.
    pub fn resize(&mut self, dim: Dim, extent: usize) -> Result<()> {
        let i = self
            .index_of(dim)
            .ok_or(Error::DimensionNotFound { dim, dims: *self })?;
        self.shape[i] = extent;
        Ok(())
    }

    /// Replace the label at position `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    pub fn relabel(&mut self, i: usize, dim: Dim) -> Result<()> {
        assert!(i < self.ndim, "dimension index {} out of bounds", i);
        if self.labels[..self.ndim]
            .iter()
            .enumerate()
            .any(|(j, &d)| j != i && d == dim)
        {
            return Err(Error::DuplicateDimension(dim));
        }
        self.labels[i] = dim;
        Ok(())
    }

    /// Iterate over `(Dim, extent)` pairs, outermost first.
    pub fn iter(&self) -> impl Iterator<Item = (Dim, usize)> + '_ {
        self.labels()
            .iter()
            .copied()
            .zip(self.shape().iter().copied())
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Dimensions {
    fn eq(&self, other: &Self) -> bool {
        self.labels() == other.labels() && self.shape() == other.shape()
    }
}

impl Eq for Dimensions {}

impl fmt::Debug for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (dim, extent) in self.iter() {
            map.entry(&dim, &extent);
        }
        map.finish()
    }
}

/// Dimensions of the concatenation of `a` and `b` along `dim`: the extent
/// along `dim` is the sum of both operands' extents, where absence counts as
/// extent 1. A dimension absent from `a` is added as the new outermost.
pub fn concatenate_dims(a: &Dimensions, b: &Dimensions, dim: Dim) -> Result<Dimensions> {
    let extent = a.size_or_1(dim) + b.size_or_1(dim);
    let mut out = *a;
    if out.contains_dim(dim) {
        out.resize(dim, extent)?;
    } else {
        out.prepend(dim, extent)?;
    }
    Ok(out)
}
