//! The type-erased, unit-carrying, dimension-labelled array.
//!
//! A [`Variable`] couples a [`Tag`], an optional name, a [`Unit`] and
//! [`Dimensions`] with a shared element buffer. Variables are value types:
//! cloning is O(1) (the buffer is reference-counted) and any mutating access
//! clones the buffer first if it is shared, so readers holding an earlier
//! copy never observe the write.

use std::sync::Arc;

use crate::dims::{Dim, Dimensions};
use crate::error::{Error, Result};
use crate::slice::VariableSlice;
use crate::strides::Region;
use crate::tag::{CoordKey, DataKey, Tag, TagKey};
use crate::unit::Unit;
use crate::values::{BinOp, Element, ElementKind, Values};

/// A named (or anonymous, for coordinates) array of a single element type.
///
/// # Example
///
/// ```
/// use datacube::{coord, data, Dim, Dimensions, Variable};
///
/// let dims = Dimensions::new(&[(Dim::X, 3)]).unwrap();
/// let x = Variable::coord::<coord::X>(dims, vec![0.1, 0.2, 0.3]).unwrap();
/// let mut counts =
///     Variable::data::<data::Value>("sample", dims, vec![1.0, 2.0, 3.0]).unwrap();
///
/// counts.add_assign(&counts.clone()).unwrap();
/// assert_eq!(counts.values::<data::Value>().unwrap(), &[2.0, 4.0, 6.0]);
/// assert_eq!(x.name(), "");
/// ```
#[derive(Clone, Debug)]
pub struct Variable {
    tag: Tag,
    name: Option<String>,
    unit: Unit,
    dims: Dimensions,
    data: Arc<Values>,
}

impl Variable {
    /// Create an anonymous coordinate variable from raw element data.
    pub fn coord<T: CoordKey>(dims: Dimensions, data: Vec<T::Elem>) -> Result<Variable> {
        Self::from_parts(T::TAG, None, T::TAG.default_unit(), dims, T::Elem::into_values(data))
    }

    /// Create a default-initialised coordinate variable.
    pub fn coord_default<T: CoordKey>(dims: Dimensions) -> Result<Variable> {
        let data = vec![T::Elem::default_value(); dims.volume()];
        Self::coord::<T>(dims, data)
    }

    /// Create a named data or attribute variable from raw element data.
    pub fn data<T: DataKey>(
        name: impl Into<String>,
        dims: Dimensions,
        data: Vec<T::Elem>,
    ) -> Result<Variable> {
        Self::from_parts(
            T::TAG,
            Some(name.into()),
            T::TAG.default_unit(),
            dims,
            T::Elem::into_values(data),
        )
    }

    /// Create a default-initialised data or attribute variable.
    pub fn data_default<T: DataKey>(name: impl Into<String>, dims: Dimensions) -> Result<Variable> {
        let data = vec![T::Elem::default_value(); dims.volume()];
        Self::data::<T>(name, dims, data)
    }

    /// Create a named variable filled with copies of one element.
    pub fn data_filled<T: DataKey>(
        name: impl Into<String>,
        dims: Dimensions,
        value: T::Elem,
    ) -> Result<Variable> {
        let data = vec![value; dims.volume()];
        Self::data::<T>(name, dims, data)
    }

    fn from_parts(
        tag: Tag,
        name: Option<String>,
        unit: Unit,
        dims: Dimensions,
        values: Values,
    ) -> Result<Variable> {
        if values.kind() != tag.element_kind() {
            return Err(Error::TagMismatch {
                expected: tag.element_kind(),
                actual: values.kind(),
            });
        }
        if values.len() != dims.volume() {
            return Err(Error::ShapeMismatch {
                volume: dims.volume(),
                len: values.len(),
            });
        }
        Ok(Variable {
            tag,
            name,
            unit,
            dims,
            data: Arc::new(values),
        })
    }

    /// Internal constructor for values that are correct by construction.
    pub(crate) fn assemble(
        tag: Tag,
        name: Option<String>,
        unit: Unit,
        dims: Dimensions,
        values: Values,
    ) -> Variable {
        debug_assert_eq!(values.len(), dims.volume());
        debug_assert_eq!(values.kind(), tag.element_kind());
        Variable {
            tag,
            name,
            unit,
            dims,
            data: Arc::new(values),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Variable name; the empty string for coordinates.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    #[inline]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    #[inline]
    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element type of the underlying buffer.
    #[inline]
    pub fn element_kind(&self) -> ElementKind {
        self.data.kind()
    }

    /// Typed read access to the elements.
    ///
    /// Only the element type is checked: tags that share an element type may
    /// read each other's data (`Value` and `Variance` both hold `f64`).
    pub fn values<T: TagKey>(&self) -> Result<&[T::Elem]> {
        T::Elem::slice(&self.data).ok_or(Error::TagMismatch {
            expected: T::Elem::KIND,
            actual: self.data.kind(),
        })
    }

    /// Typed mutable access; clones the buffer first if it is shared.
    pub fn values_mut<T: TagKey>(&mut self) -> Result<&mut [T::Elem]> {
        let actual = self.data.kind();
        if actual != T::Elem::KIND {
            return Err(Error::TagMismatch {
                expected: T::Elem::KIND,
                actual,
            });
        }
        T::Elem::slice_mut(Arc::make_mut(&mut self.data)).ok_or(Error::TagMismatch {
            expected: T::Elem::KIND,
            actual,
        })
    }

    pub(crate) fn storage(&self) -> &Values {
        &self.data
    }

    pub(crate) fn storage_mut(&mut self) -> &mut Values {
        Arc::make_mut(&mut self.data)
    }

    /// Whether two variables share one underlying buffer.
    pub fn shares_storage(&self, other: &Variable) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Append one element along the single dimension of a 1-D variable.
    pub(crate) fn push_element<E: Element>(&mut self, value: E) -> Result<()> {
        let actual = self.data.kind();
        if actual != E::KIND {
            return Err(Error::TagMismatch {
                expected: E::KIND,
                actual,
            });
        }
        let dim = self.dims.label(0);
        let extent = self.dims.extent_at(0);
        let storage = Arc::make_mut(&mut self.data);
        storage.resize(extent + 1);
        if let Some(slice) = E::slice_mut(storage) {
            slice[extent] = value;
        }
        self.dims.resize(dim, extent + 1)
    }

    // =========================================================================
    // Slicing
    // =========================================================================

    /// Non-owning range slice along `dim`.
    pub fn slice(&self, dim: Dim, begin: usize, end: usize) -> Result<VariableSlice<'_>> {
        VariableSlice::from(self).slice(dim, begin, end)
    }

    /// Non-owning point slice along `dim`; the dimension is dropped.
    pub fn at(&self, dim: Dim, index: usize) -> Result<VariableSlice<'_>> {
        VariableSlice::from(self).at(dim, index)
    }

    /// Mutable view of the whole variable, to be restricted further.
    pub fn slice_mut(&mut self) -> crate::slice::VariableSliceMut<'_> {
        crate::slice::VariableSliceMut::new(self)
    }

    /// Write `sub` into the hyper-slab at `index` along `dim`.
    ///
    /// Assigning a variable a slab of itself (identical storage) is a no-op.
    pub fn set_slice<'a>(
        &mut self,
        sub: impl Into<VariableSlice<'a>>,
        dim: Dim,
        index: usize,
    ) -> Result<()> {
        let sub = sub.into();
        if self.unit != sub.unit() {
            return Err(Error::UnitMismatch {
                left: self.unit,
                right: sub.unit(),
            });
        }
        if sub.shares_storage_with(self) {
            return Ok(());
        }
        if !self.dims.contains_dim(dim) {
            return Err(Error::DimensionNotFound {
                dim,
                dims: self.dims,
            });
        }
        if !self.dims.contains(sub.dims()) {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: *sub.dims(),
            });
        }
        let delta = sub.dims().size_or_1(dim);
        let dst = Region::full(&self.dims).range(dim, index, index + delta)?;
        let iter = *dst.dims();
        let (src_values, src_region) = (sub.storage(), sub.region());
        self.storage_mut()
            .copy_region(&dst, &iter, src_values, &src_region)
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// Element-wise `self += rhs`, broadcasting or transposing `rhs` as
    /// needed. For event-list variables this concatenates the nested
    /// datasets instead.
    pub fn add_assign<'a>(&mut self, rhs: impl Into<VariableSlice<'a>>) -> Result<()> {
        self.apply(rhs.into(), BinOp::Add)
    }

    /// Element-wise `self -= rhs`.
    pub fn sub_assign<'a>(&mut self, rhs: impl Into<VariableSlice<'a>>) -> Result<()> {
        self.apply(rhs.into(), BinOp::Sub)
    }

    /// Element-wise `self *= rhs`; the unit becomes the product of units.
    pub fn mul_assign<'a>(&mut self, rhs: impl Into<VariableSlice<'a>>) -> Result<()> {
        self.apply(rhs.into(), BinOp::Mul)
    }

    fn apply(&mut self, rhs: VariableSlice<'_>, op: BinOp) -> Result<()> {
        if self.data.kind() == ElementKind::DatasetList {
            return self.apply_dataset_list(rhs, op);
        }
        match op {
            BinOp::Add | BinOp::Sub => {
                if self.unit != rhs.unit() {
                    return Err(Error::UnitMismatch {
                        left: self.unit,
                        right: rhs.unit(),
                    });
                }
            }
            BinOp::Mul => {}
        }
        if !self.dims.contains(rhs.dims()) {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: *rhs.dims(),
            });
        }
        let new_unit = match op {
            BinOp::Mul => self.unit.multiply(rhs.unit())?,
            _ => self.unit,
        };
        let iter = self.dims;
        let dst = Region::full(&iter);
        let (src_values, src_region) = (rhs.storage(), rhs.region());
        self.storage_mut()
            .apply_region(&dst, &iter, src_values, &src_region, op)?;
        self.unit = new_unit;
        Ok(())
    }

    /// Event and table semantics: `+=` concatenates the nested datasets
    /// element by element along their single dimension.
    fn apply_dataset_list(&mut self, rhs: VariableSlice<'_>, op: BinOp) -> Result<()> {
        match op {
            BinOp::Sub => {
                return Err(Error::EventsArithmeticUnsupported { op: "subtraction" });
            }
            BinOp::Mul => {
                return Err(Error::EventsArithmeticUnsupported { op: "multiplication" });
            }
            BinOp::Add => {}
        }
        if self.dims != *rhs.dims() {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: *rhs.dims(),
            });
        }
        let lists = match &*self.data {
            Values::DatasetList(lists) => lists,
            other => {
                return Err(Error::TagMismatch {
                    expected: ElementKind::DatasetList,
                    actual: other.kind(),
                });
            }
        };
        let mut out = Vec::with_capacity(lists.len());
        for (list, other) in lists.iter().zip(rhs.elements::<crate::dataset::Dataset>()?) {
            if list.dims().ndim() != 1 {
                return Err(Error::DimensionMismatch {
                    expected: Dimensions::one(Dim::Event, list.dims().volume()),
                    actual: *list.dims(),
                });
            }
            let dim = list.dims().label(0);
            out.push(crate::dataset::concatenate(list, other, dim)?);
        }
        *Arc::make_mut(&mut self.data) = Values::DatasetList(out);
        Ok(())
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.unit == other.unit
            && self.tag == other.tag
            && self.dims == other.dims
            && (Arc::ptr_eq(&self.data, &other.data) || self.data == other.data)
    }
}
