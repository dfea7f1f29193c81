//! Non-owning, possibly mutable, rectangular views of a [`Variable`].
//!
//! A slice records `(dim, range)` restrictions against its parent variable
//! and resolves them lazily; further restrictions compose. Point slices drop
//! the dimension. Mutable slices write through to the parent (after the
//! copy-on-write barrier has un-shared its buffer), which is what makes
//! sub-rectangle assignment and compound arithmetic on windows work.

use std::iter::FusedIterator;

use crate::dims::{Dim, Dimensions};
use crate::error::{Error, Result};
use crate::strides::{Offsets, Region};
use crate::tag::{Tag, TagKey};
use crate::unit::Unit;
use crate::values::{BinOp, Element, ElementKind, Values};
use crate::variable::Variable;

/// Read-only strided view of a variable.
#[derive(Clone, Copy, Debug)]
pub struct VariableSlice<'a> {
    var: &'a Variable,
    region: Region,
}

impl<'a> From<&'a Variable> for VariableSlice<'a> {
    fn from(var: &'a Variable) -> Self {
        Self {
            var,
            region: Region::full(var.dims()),
        }
    }
}

impl<'a> VariableSlice<'a> {
    #[inline]
    pub fn tag(&self) -> Tag {
        self.var.tag()
    }

    #[inline]
    pub fn name(&self) -> &'a str {
        self.var.name()
    }

    #[inline]
    pub fn unit(&self) -> Unit {
        self.var.unit()
    }

    /// Effective dimensions after all restrictions.
    #[inline]
    pub fn dims(&self) -> &Dimensions {
        self.region.dims()
    }

    /// Number of elements in the restricted region.
    #[inline]
    pub fn len(&self) -> usize {
        self.region.dims().volume()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restrict to `begin..end` along `dim`.
    pub fn slice(mut self, dim: Dim, begin: usize, end: usize) -> Result<Self> {
        self.region = self.region.range(dim, begin, end)?;
        Ok(self)
    }

    /// Restrict to a point along `dim`, dropping the dimension.
    pub fn at(mut self, dim: Dim, index: usize) -> Result<Self> {
        self.region = self.region.at(dim, index)?;
        Ok(self)
    }

    /// Typed iteration over the restricted elements, in this slice's own
    /// dimension order.
    pub fn values<T: TagKey>(&self) -> Result<Strided<'a, T::Elem>> {
        self.elements::<T::Elem>()
    }

    pub(crate) fn elements<E: Element>(&self) -> Result<Strided<'a, E>> {
        let data = E::slice(self.var.storage()).ok_or(Error::TagMismatch {
            expected: E::KIND,
            actual: self.var.storage().kind(),
        })?;
        Ok(Strided {
            data,
            offsets: self.region.offsets(),
        })
    }

    /// Materialise into an owning variable with the effective dimensions.
    pub fn to_variable(&self) -> Variable {
        let dims = *self.region.dims();
        let values = self.var.storage().gather(&self.region);
        Variable::assemble(
            self.tag(),
            if self.tag().is_coord() {
                None
            } else {
                Some(self.name().to_string())
            },
            self.unit(),
            dims,
            values,
        )
    }

    pub(crate) fn region(&self) -> Region {
        self.region
    }

    pub(crate) fn storage(&self) -> &'a Values {
        self.var.storage()
    }

    pub(crate) fn shares_storage_with(&self, other: &Variable) -> bool {
        self.var.shares_storage(other)
    }
}

impl PartialEq for VariableSlice<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.unit() == other.unit()
            && self.tag() == other.tag()
            && self.dims() == other.dims()
            && self.var.storage().eq_region(
                &self.region,
                self.dims(),
                other.var.storage(),
                &other.region,
            )
    }
}

impl PartialEq<Variable> for VariableSlice<'_> {
    fn eq(&self, other: &Variable) -> bool {
        *self == VariableSlice::from(other)
    }
}

impl PartialEq<VariableSlice<'_>> for Variable {
    fn eq(&self, other: &VariableSlice<'_>) -> bool {
        VariableSlice::from(self) == *other
    }
}

/// Mutable strided view of a variable.
pub struct VariableSliceMut<'a> {
    var: &'a mut Variable,
    region: Region,
}

impl<'a> VariableSliceMut<'a> {
    pub(crate) fn new(var: &'a mut Variable) -> Self {
        let region = Region::full(var.dims());
        Self { var, region }
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        self.var.tag()
    }

    #[inline]
    pub fn unit(&self) -> Unit {
        self.var.unit()
    }

    /// Effective dimensions after all restrictions.
    #[inline]
    pub fn dims(&self) -> &Dimensions {
        self.region.dims()
    }

    /// Restrict to `begin..end` along `dim`.
    pub fn slice(mut self, dim: Dim, begin: usize, end: usize) -> Result<Self> {
        self.region = self.region.range(dim, begin, end)?;
        Ok(self)
    }

    /// Restrict to a point along `dim`, dropping the dimension.
    pub fn at(mut self, dim: Dim, index: usize) -> Result<Self> {
        self.region = self.region.at(dim, index)?;
        Ok(self)
    }

    /// Whether this view covers only part of its variable.
    fn is_partial(&self) -> bool {
        self.region.dims() != self.var.dims()
    }

    /// Copy `src` into the viewed region. Requires matching tag, unit and
    /// effective dimensions.
    pub fn copy_from<'b>(&mut self, src: impl Into<VariableSlice<'b>>) -> Result<()> {
        let src = src.into();
        if self.var.tag() != src.tag() {
            return Err(Error::TagMismatch {
                expected: self.var.element_kind(),
                actual: src.storage().kind(),
            });
        }
        if self.var.unit() != src.unit() {
            return Err(Error::UnitMismatch {
                left: self.var.unit(),
                right: src.unit(),
            });
        }
        if self.region.dims() != src.dims() {
            return Err(Error::DimensionMismatch {
                expected: *self.region.dims(),
                actual: *src.dims(),
            });
        }
        let iter = *self.region.dims();
        let (src_values, src_region) = (src.storage(), src.region());
        self.var
            .storage_mut()
            .copy_region(&self.region, &iter, src_values, &src_region)
    }

    /// Element-wise `view += rhs`, writing through to the parent.
    pub fn add_assign<'b>(&mut self, rhs: impl Into<VariableSlice<'b>>) -> Result<()> {
        self.apply(rhs.into(), BinOp::Add)
    }

    /// Element-wise `view -= rhs`.
    pub fn sub_assign<'b>(&mut self, rhs: impl Into<VariableSlice<'b>>) -> Result<()> {
        self.apply(rhs.into(), BinOp::Sub)
    }

    /// Element-wise `view *= rhs`.
    ///
    /// Changing the unit through a partial view is rejected, since the unit
    /// belongs to the whole variable.
    pub fn mul_assign<'b>(&mut self, rhs: impl Into<VariableSlice<'b>>) -> Result<()> {
        self.apply(rhs.into(), BinOp::Mul)
    }

    fn apply(&mut self, rhs: VariableSlice<'_>, op: BinOp) -> Result<()> {
        if self.var.element_kind() == ElementKind::DatasetList {
            return Err(Error::EventsArithmeticUnsupported {
                op: "view arithmetic",
            });
        }
        match op {
            BinOp::Add | BinOp::Sub => {
                if self.var.unit() != rhs.unit() {
                    return Err(Error::UnitMismatch {
                        left: self.var.unit(),
                        right: rhs.unit(),
                    });
                }
            }
            BinOp::Mul => {}
        }
        if !self.region.dims().contains(rhs.dims()) {
            return Err(Error::DimensionMismatch {
                expected: *self.region.dims(),
                actual: *rhs.dims(),
            });
        }
        let new_unit = match op {
            BinOp::Mul => {
                let unit = self.var.unit().multiply(rhs.unit())?;
                if unit != self.var.unit() && self.is_partial() {
                    return Err(Error::PartialUnitChange);
                }
                unit
            }
            _ => self.var.unit(),
        };
        let iter = *self.region.dims();
        let (src_values, src_region) = (rhs.storage(), rhs.region());
        self.var
            .storage_mut()
            .apply_region(&self.region, &iter, src_values, &src_region, op)?;
        self.var.set_unit(new_unit);
        Ok(())
    }
}

/// Iterator over the elements of a strided region.
#[derive(Clone, Debug)]
pub struct Strided<'a, T> {
    data: &'a [T],
    offsets: Offsets,
}

impl<'a, T> Iterator for Strided<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        self.offsets.next().map(|i| &self.data[i])
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.offsets.size_hint()
    }
}

impl<T> ExactSizeIterator for Strided<'_, T> {}
impl<T> FusedIterator for Strided<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;
    use crate::tag::data;

    fn dims(pairs: &[(Dim, usize)]) -> Dimensions {
        Dimensions::new(pairs).unwrap()
    }

    fn value_var(d: &[(Dim, usize)], data: Vec<f64>) -> Variable {
        Variable::data::<data::Value>("", dims(d), data).unwrap()
    }

    #[test]
    fn get_through_slice() {
        let var = value_var(&[(Dim::X, 3)], vec![1.0, 2.0, 3.0]);
        let slice = var.slice(Dim::X, 1, 2).unwrap();
        let values: Vec<f64> = slice.values::<data::Value>().unwrap().copied().collect();
        assert_eq!(values, vec![2.0]);
    }

    #[test]
    fn slicing_does_not_transpose() {
        let var = value_var(&[(Dim::X, 3), (Dim::Y, 3)], vec![0.0; 9]);
        let expected = dims(&[(Dim::X, 1), (Dim::Y, 1)]);
        let a = var.slice(Dim::X, 1, 2).unwrap().slice(Dim::Y, 1, 2).unwrap();
        let b = var.slice(Dim::Y, 1, 2).unwrap().slice(Dim::X, 1, 2).unwrap();
        assert_eq!(a.dims(), &expected);
        assert_eq!(b.dims(), &expected);
    }

    #[test]
    fn sub_assign_requires_contained_dims() {
        let mut var = value_var(&[(Dim::X, 2), (Dim::Y, 2)], vec![1.0, 2.0, 3.0, 4.0]);
        // A range slice keeps Dim::X with extent 1, which the target extent 2
        // does not contain.
        let rhs = var.clone();
        let err = var
            .sub_assign(rhs.slice(Dim::X, 0, 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn sub_assign_slice_outer() {
        let mut var = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![1.0, 2.0, 3.0, 4.0]);
        let copy = var.clone();

        var.sub_assign(copy.at(Dim::Y, 0).unwrap()).unwrap();
        assert_eq!(var.values::<data::Value>().unwrap(), &[0.0, 0.0, 2.0, 2.0]);
        var.sub_assign(copy.at(Dim::Y, 1).unwrap()).unwrap();
        assert_eq!(
            var.values::<data::Value>().unwrap(),
            &[-3.0, -4.0, -1.0, -2.0]
        );
    }

    #[test]
    fn sub_assign_slice_inner() {
        let mut var = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![1.0, 2.0, 3.0, 4.0]);
        let copy = var.clone();

        var.sub_assign(copy.at(Dim::X, 0).unwrap()).unwrap();
        assert_eq!(var.values::<data::Value>().unwrap(), &[0.0, 1.0, 0.0, 1.0]);
        var.sub_assign(copy.at(Dim::X, 1).unwrap()).unwrap();
        assert_eq!(
            var.values::<data::Value>().unwrap(),
            &[-2.0, -1.0, -4.0, -3.0]
        );
    }

    #[test]
    fn sub_assign_slice_of_slice() {
        let mut var = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![1.0, 2.0, 3.0, 4.0]);
        let copy = var.clone();

        var.sub_assign(copy.at(Dim::X, 1).unwrap().at(Dim::Y, 1).unwrap())
            .unwrap();
        assert_eq!(
            var.values::<data::Value>().unwrap(),
            &[-3.0, -2.0, -1.0, 0.0]
        );
    }

    #[test]
    fn shared_storage_rhs_reads_pre_operation_values() {
        // The copy-on-write barrier un-shares the target first, so a slice of
        // a sharing copy keeps reading the original values.
        let mut var = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![1.0, 2.0, 3.0, 4.0]);
        let copy = var.clone();
        assert!(var.shares_storage(&copy));

        var.sub_assign(copy.at(Dim::Y, 0).unwrap()).unwrap();
        var.sub_assign(copy.at(Dim::Y, 1).unwrap()).unwrap();
        assert_eq!(
            var.values::<data::Value>().unwrap(),
            &[-3.0, -4.0, -1.0, -2.0]
        );
    }

    #[test]
    fn sub_assign_nontrivial_windows() {
        let source = value_var(
            &[(Dim::Y, 3), (Dim::X, 3)],
            vec![11.0, 12.0, 13.0, 21.0, 22.0, 23.0, 31.0, 32.0, 33.0],
        );
        let mut target = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![0.0; 4]);
        target
            .sub_assign(
                source
                    .slice(Dim::X, 1, 3)
                    .unwrap()
                    .slice(Dim::Y, 0, 2)
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(
            target.values::<data::Value>().unwrap(),
            &[-12.0, -13.0, -22.0, -23.0]
        );
    }

    #[test]
    fn window_sub_assign_writes_through() {
        let source = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![11.0, 12.0, 21.0, 22.0]);
        let mut target = value_var(&[(Dim::Y, 3), (Dim::X, 3)], vec![0.0; 9]);
        target
            .slice_mut()
            .slice(Dim::X, 1, 3)
            .unwrap()
            .slice(Dim::Y, 1, 3)
            .unwrap()
            .sub_assign(&source)
            .unwrap();
        assert_eq!(
            target.values::<data::Value>().unwrap(),
            &[0.0, 0.0, 0.0, 0.0, -11.0, -12.0, 0.0, -21.0, -22.0]
        );
    }

    #[test]
    fn window_sub_assign_lower_dimensional_rhs() {
        let mut target = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![0.0; 4]);
        let source = value_var(&[(Dim::X, 2)], vec![1.0, 2.0]);
        target
            .slice_mut()
            .slice(Dim::Y, 1, 2)
            .unwrap()
            .sub_assign(&source)
            .unwrap();
        assert_eq!(
            target.values::<data::Value>().unwrap(),
            &[0.0, 0.0, -1.0, -2.0]
        );
    }

    #[test]
    fn copy_from_writes_window() {
        let source = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![11.0, 12.0, 21.0, 22.0]);
        let mut target = value_var(&[(Dim::Y, 3), (Dim::X, 3)], vec![0.0; 9]);
        target
            .slice_mut()
            .slice(Dim::X, 0, 2)
            .unwrap()
            .slice(Dim::Y, 1, 3)
            .unwrap()
            .copy_from(&source)
            .unwrap();
        assert_eq!(
            target.values::<data::Value>().unwrap(),
            &[0.0, 0.0, 0.0, 11.0, 12.0, 0.0, 21.0, 22.0, 0.0]
        );
    }

    #[test]
    fn copy_from_shape_mismatch_fails() {
        let source = value_var(&[(Dim::X, 2)], vec![1.0, 2.0]);
        let mut target = value_var(&[(Dim::X, 3)], vec![0.0; 3]);
        let err = target.slice_mut().copy_from(&source).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn materialise_window() {
        let source = value_var(
            &[(Dim::Y, 3), (Dim::X, 3)],
            vec![11.0, 12.0, 13.0, 21.0, 22.0, 23.0, 31.0, 32.0, 33.0],
        );
        let window = source
            .slice(Dim::X, 1, 3)
            .unwrap()
            .slice(Dim::Y, 1, 3)
            .unwrap()
            .to_variable();
        assert_eq!(window.dims(), &dims(&[(Dim::Y, 2), (Dim::X, 2)]));
        assert_eq!(
            window.values::<data::Value>().unwrap(),
            &[22.0, 23.0, 32.0, 33.0]
        );
    }

    #[test]
    fn partial_unit_change_rejected() {
        let mut var = value_var(&[(Dim::X, 4)], vec![1.0, 2.0, 3.0, 4.0]);
        let mut scale = value_var(&[(Dim::X, 2)], vec![2.0, 2.0]);
        scale.set_unit(crate::unit::Unit::Length);
        let err = var
            .slice_mut()
            .slice(Dim::X, 0, 2)
            .unwrap()
            .mul_assign(&scale)
            .unwrap_err();
        assert!(matches!(err, Error::PartialUnitChange));

        // A dimensionless scale is fine on a partial view.
        let plain = value_var(&[(Dim::X, 2)], vec![2.0, 2.0]);
        var.slice_mut()
            .slice(Dim::X, 0, 2)
            .unwrap()
            .mul_assign(&plain)
            .unwrap();
        assert_eq!(
            var.values::<data::Value>().unwrap(),
            &[2.0, 4.0, 3.0, 4.0]
        );
    }

    #[test]
    fn slice_equality_across_layouts() {
        let a = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![1.0, 2.0, 3.0, 4.0]);
        let wide = value_var(
            &[(Dim::Y, 2), (Dim::X, 3)],
            vec![1.0, 2.0, 9.0, 3.0, 4.0, 9.0],
        );
        assert_eq!(VariableSlice::from(&a), wide.slice(Dim::X, 0, 2).unwrap());
        assert_eq!(a, wide.slice(Dim::X, 0, 2).unwrap());
    }

    #[test]
    fn point_slab_materialises_via_ops() {
        let var = value_var(&[(Dim::Y, 2), (Dim::X, 2)], vec![1.0, 2.0, 3.0, 4.0]);
        let row = ops::slice(&var, Dim::Y, 1).unwrap();
        assert_eq!(row.dims(), &dims(&[(Dim::X, 2)]));
        assert_eq!(row.values::<data::Value>().unwrap(), &[3.0, 4.0]);
    }
}
