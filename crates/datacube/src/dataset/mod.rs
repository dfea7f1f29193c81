//! The dataset composition layer.
//!
//! A [`Dataset`] is an ordered collection of [`Variable`]s sharing one
//! dimension registry: every dimension mentioned by any contained variable
//! has exactly one extent across the dataset. The single exception is a
//! bin-edge axis, where a dimension-coordinate may be one element longer
//! than the data it annotates.
//!
//! Identity inside a dataset is the `(tag, name)` pair for data and
//! attributes and the tag alone for coordinates.

mod ops;
mod slice;

pub use ops::{
    concatenate, filter, rebin, slice, slice_range, sort, spectrum_position, split, std_dev,
};
pub use slice::DatasetSlice;

use std::collections::HashSet;

use crate::dims::{Dim, Dimensions};
use crate::error::{Error, Result};
use crate::tag::{CoordKey, DataKey, DataTag, Tag, TagKey};
use crate::values::BinOp;
use crate::variable::Variable;

/// Ordered collection of variables with a shared dimension registry.
///
/// # Example
///
/// ```
/// use datacube::{coord, data, Dataset, Dim, Dimensions};
///
/// let mut d = Dataset::new();
/// d.insert_coord::<coord::X>(Dimensions::new(&[(Dim::X, 3)]).unwrap(), vec![0.1, 0.2, 0.3])
///     .unwrap();
/// d.insert_data::<data::Value>("sample", Dimensions::new(&[(Dim::X, 3)]).unwrap(), vec![
///     10.0, 20.0, 30.0,
/// ])
/// .unwrap();
///
/// assert_eq!(d.len(), 2);
/// assert_eq!(d.dims().size(Dim::X).unwrap(), 3);
/// assert_eq!(d.values_named::<data::Value>("sample").unwrap(), &[10.0, 20.0, 30.0]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    dims: Dimensions,
    vars: Vec<Variable>,
}

impl Dataset {
    pub fn new() -> Self {
        Self {
            dims: Dimensions::empty(),
            vars: Vec::new(),
        }
    }

    /// Number of contained variables.
    #[inline]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The shared dimension registry: data extents for every dimension
    /// spanned by any contained variable.
    #[inline]
    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.vars.iter()
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Insert a variable, merging its dimensions into the registry.
    pub fn insert(&mut self, var: Variable) -> Result<()> {
        if var.tag().is_computed() {
            return Err(Error::ComputedTagNotStorable(var.tag()));
        }
        let duplicate = if var.tag().is_coord() {
            self.vars.iter().any(|v| v.tag() == var.tag())
        } else {
            self.position(var.tag(), var.name()).is_some()
        };
        if duplicate {
            return Err(Error::DuplicateTag {
                tag: var.tag(),
                name: var.name().to_string(),
            });
        }
        let mut merged = self.dims;
        merge_into(&mut merged, &self.vars, &var)?;
        self.dims = merged;
        self.vars.push(var);
        Ok(())
    }

    /// Build and insert a coordinate variable.
    pub fn insert_coord<T: CoordKey>(
        &mut self,
        dims: Dimensions,
        data: Vec<<T as TagKey>::Elem>,
    ) -> Result<()> {
        self.insert(Variable::coord::<T>(dims, data)?)
    }

    /// Build and insert a default-initialised coordinate variable.
    pub fn insert_coord_default<T: CoordKey>(&mut self, dims: Dimensions) -> Result<()> {
        self.insert(Variable::coord_default::<T>(dims)?)
    }

    /// Build and insert a named data or attribute variable.
    pub fn insert_data<T: DataKey>(
        &mut self,
        name: impl Into<String>,
        dims: Dimensions,
        data: Vec<<T as TagKey>::Elem>,
    ) -> Result<()> {
        self.insert(Variable::data::<T>(name, dims, data)?)
    }

    /// Build and insert a default-initialised named variable.
    pub fn insert_data_default<T: DataKey>(
        &mut self,
        name: impl Into<String>,
        dims: Dimensions,
    ) -> Result<()> {
        self.insert(Variable::data_default::<T>(name, dims)?)
    }

    /// Insert every variable of `other`.
    pub fn merge(&mut self, other: &Dataset) -> Result<()> {
        for var in other.iter() {
            self.insert(var.clone())?;
        }
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub(crate) fn position(&self, tag: Tag, name: &str) -> Option<usize> {
        self.vars
            .iter()
            .position(|v| v.tag() == tag && v.name() == name)
    }

    pub fn contains(&self, tag: Tag, name: &str) -> bool {
        self.position(tag, name).is_some()
    }

    /// Index of the variable with the given identity.
    pub fn find(&self, tag: Tag, name: &str) -> Result<usize> {
        self.position(tag, name).ok_or_else(|| Error::NotFound {
            tag,
            name: name.to_string(),
        })
    }

    /// Index of the unique variable with the given tag, regardless of name.
    pub fn find_unique(&self, tag: Tag) -> Result<usize> {
        let mut matches = self.vars.iter().enumerate().filter(|(_, v)| v.tag() == tag);
        let first = matches.next().map(|(i, _)| i).ok_or(Error::NotFound {
            tag,
            name: String::new(),
        })?;
        if matches.next().is_some() {
            return Err(Error::NotUnique(tag));
        }
        Ok(first)
    }

    pub fn variable(&self, tag: Tag, name: &str) -> Result<&Variable> {
        Ok(&self.vars[self.find(tag, name)?])
    }

    /// Typed access to the unique variable with marker tag `T`.
    pub fn values<T: TagKey>(&self) -> Result<&[T::Elem]> {
        self.vars[self.find_unique(T::TAG)?].values::<T>()
    }

    /// Typed access to the variable `(T, name)`.
    pub fn values_named<T: TagKey>(&self, name: &str) -> Result<&[T::Elem]> {
        self.vars[self.find(T::TAG, name)?].values::<T>()
    }

    /// Typed mutable access to the unique variable with marker tag `T`.
    pub fn values_mut<T: TagKey>(&mut self) -> Result<&mut [T::Elem]> {
        let i = self.find_unique(T::TAG)?;
        self.vars[i].values_mut::<T>()
    }

    /// Typed mutable access to the variable `(T, name)`.
    pub fn values_mut_named<T: TagKey>(&mut self, name: &str) -> Result<&mut [T::Elem]> {
        let i = self.find(T::TAG, name)?;
        self.vars[i].values_mut::<T>()
    }

    /// Whether `var` is a bin-edge coordinate within this dataset.
    pub fn is_edge(&self, var: &Variable) -> bool {
        let Some(dim) = var.tag().coordinate_dimension() else {
            return false;
        };
        match (self.dims.size(dim), var.dims().size(dim)) {
            (Ok(registry), Ok(extent)) => extent == registry + 1,
            _ => false,
        }
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove the variable with the given identity. Dimensions no longer
    /// referenced by any variable leave the registry.
    pub fn erase(&mut self, tag: Tag, name: &str) -> Result<()> {
        let i = self.find(tag, name)?;
        self.vars.remove(i);
        self.rebuild_registry()
    }

    /// Remove the unique variable with the given tag.
    pub fn erase_unique(&mut self, tag: Tag) -> Result<()> {
        let i = self.find_unique(tag)?;
        self.vars.remove(i);
        self.rebuild_registry()
    }

    /// Remove all data and attribute variables with the given name and
    /// return them as a new dataset together with all coordinates.
    pub fn extract(&mut self, name: &str) -> Result<Dataset> {
        if !self
            .vars
            .iter()
            .any(|v| !v.tag().is_coord() && v.name() == name)
        {
            return Err(Error::NotFound {
                tag: Tag::Data(DataTag::Value),
                name: name.to_string(),
            });
        }
        let mut out = Dataset::new();
        for var in &self.vars {
            if var.tag().is_coord() {
                out.insert(var.clone())?;
            }
        }
        let mut kept = Vec::with_capacity(self.vars.len());
        for var in self.vars.drain(..) {
            if !var.tag().is_coord() && var.name() == name {
                out.insert(var)?;
            } else {
                kept.push(var);
            }
        }
        self.vars = kept;
        self.rebuild_registry()?;
        Ok(out)
    }

    fn rebuild_registry(&mut self) -> Result<()> {
        let mut dims = Dimensions::empty();
        for (i, var) in self.vars.iter().enumerate() {
            merge_into(&mut dims, &self.vars[..i], var)?;
        }
        self.dims = dims;
        Ok(())
    }

    // =========================================================================
    // Slicing
    // =========================================================================

    /// View selecting all coordinates plus the variables named `name`.
    pub fn select<'a>(&'a self, name: &str) -> DatasetSlice<'a> {
        DatasetSlice::select(self, name)
    }

    /// View restricted to `begin..end` along `dim`.
    pub fn slice(&self, dim: Dim, begin: usize, end: usize) -> Result<DatasetSlice<'_>> {
        DatasetSlice::from(self).slice(dim, begin, end)
    }

    /// View restricted to a point along `dim`. The dimension is dropped and
    /// its dimension-coordinates leave the selection.
    pub fn at(&self, dim: Dim, index: usize) -> Result<DatasetSlice<'_>> {
        DatasetSlice::from(self).at(dim, index)
    }

    /// Write a slab of `source` into this dataset at `index` along `dim`,
    /// variable by variable.
    pub fn set_slice(&mut self, source: &Dataset, dim: Dim, index: usize) -> Result<()> {
        let spanning: Vec<usize> = (0..self.vars.len())
            .filter(|&i| self.vars[i].dims().contains_dim(dim))
            .collect();
        for i in spanning {
            let (tag, name) = (self.vars[i].tag(), self.vars[i].name().to_string());
            let j = source.position(tag, &name).ok_or(Error::MissingPartner {
                tag,
                name: name.clone(),
            })?;
            self.vars[i].set_slice(&source.vars[j], dim, index)?;
        }
        Ok(())
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// `self += rhs`.
    ///
    /// Coordinates present in both operands must be equal; coordinates only
    /// in `rhs` are inserted. Data variables pair by `(tag, name)`; unpaired
    /// `rhs` data is inserted. `Value`/`Variance` companions follow the
    /// error-propagation rules, and event lists concatenate.
    pub fn add_assign<'a>(&mut self, rhs: impl Into<DatasetSlice<'a>>) -> Result<()> {
        let mut out = self.clone();
        out.apply(rhs.into(), BinOp::Add)?;
        *self = out;
        Ok(())
    }

    /// `self -= rhs`. Variances of paired `Value`/`Variance` companions add.
    pub fn sub_assign<'a>(&mut self, rhs: impl Into<DatasetSlice<'a>>) -> Result<()> {
        let mut out = self.clone();
        out.apply(rhs.into(), BinOp::Sub)?;
        *self = out;
        Ok(())
    }

    /// `self *= rhs`. Data present only in `rhs` has no partner to scale and
    /// fails; paired variances follow `Var(xy) = Vx·y² + Vy·x²`.
    pub fn mul_assign<'a>(&mut self, rhs: impl Into<DatasetSlice<'a>>) -> Result<()> {
        let mut out = self.clone();
        out.apply(rhs.into(), BinOp::Mul)?;
        *self = out;
        Ok(())
    }

    fn apply(&mut self, rhs: DatasetSlice<'_>, op: BinOp) -> Result<()> {
        // Coordinates first: compare or adopt.
        for entry in rhs.iter() {
            let vs = entry?;
            if !vs.tag().is_coord() {
                continue;
            }
            match self.position(vs.tag(), vs.name()) {
                Some(i) => {
                    if self.vars[i] != vs {
                        return Err(Error::CoordinateMismatch(vs.tag()));
                    }
                }
                None => self.insert(vs.to_variable())?,
            }
        }

        let pairs = self.variance_pairs(&rhs)?;

        for entry in rhs.iter() {
            let vs = entry?;
            let tag = vs.tag();
            if tag.is_coord() {
                continue;
            }
            let name = vs.name().to_string();
            let paired = pairs.contains(&name);
            match self.position(tag, &name) {
                None => {
                    if op == BinOp::Mul {
                        return Err(Error::MissingPartner { tag, name });
                    }
                    self.insert(vs.to_variable())?;
                }
                Some(i) => {
                    if paired && tag == Tag::Data(DataTag::Variance) {
                        match op {
                            // Uncertainties accumulate under both addition
                            // and subtraction.
                            BinOp::Add | BinOp::Sub => self.vars[i].add_assign(vs)?,
                            BinOp::Mul => {}
                        }
                    } else if paired && tag == Tag::Data(DataTag::Value) && op == BinOp::Mul {
                        self.mul_with_variance(i, &rhs, &name)?;
                    } else {
                        match op {
                            BinOp::Add => self.vars[i].add_assign(vs)?,
                            BinOp::Sub => self.vars[i].sub_assign(vs)?,
                            BinOp::Mul => self.vars[i].mul_assign(vs)?,
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Names for which both operands carry a `Value`/`Variance` companion
    /// pair.
    fn variance_pairs(&self, rhs: &DatasetSlice<'_>) -> Result<HashSet<String>> {
        let value = Tag::Data(DataTag::Value);
        let variance = Tag::Data(DataTag::Variance);
        let mut names = HashSet::new();
        for entry in rhs.iter() {
            let vs = entry?;
            if vs.tag() != value {
                continue;
            }
            let name = vs.name();
            if rhs.contains(variance, name)
                && self.contains(value, name)
                && self.contains(variance, name)
            {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    /// `Value * Value` with error propagation: the variance is updated from
    /// the pre-multiplication values, then the value itself is scaled.
    fn mul_with_variance(
        &mut self,
        value_idx: usize,
        rhs: &DatasetSlice<'_>,
        name: &str,
    ) -> Result<()> {
        let variance = Tag::Data(DataTag::Variance);
        let variance_idx = self.position(variance, name).ok_or(Error::MissingPartner {
            tag: variance,
            name: name.to_string(),
        })?;
        let rhs_value = rhs.find(Tag::Data(DataTag::Value), name)?;
        let rhs_variance = rhs.find(variance, name)?;

        let mut y_squared = rhs_value.to_variable();
        let y = y_squared.clone();
        y_squared.mul_assign(&y)?;

        let mut x_squared = self.vars[value_idx].clone();
        let x = x_squared.clone();
        x_squared.mul_assign(&x)?;

        // Var(xy) = Vx·y² + Vy·x²
        self.vars[variance_idx].mul_assign(&y_squared)?;
        x_squared.mul_assign(rhs_variance)?;
        self.vars[variance_idx].add_assign(&x_squared)?;

        self.vars[value_idx].mul_assign(rhs_value)
    }

    // =========================================================================
    // Internal access for views
    // =========================================================================

    pub(crate) fn vars(&self) -> &[Variable] {
        &self.vars
    }

    pub(crate) fn var_at_mut(&mut self, i: usize) -> &mut Variable {
        &mut self.vars[i]
    }

    pub(crate) fn resize_registry(&mut self, dim: Dim, extent: usize) -> Result<()> {
        self.dims.resize(dim, extent)
    }
}

/// Merge `var`'s dimensions into the registry.
///
/// A dimension-coordinate may exceed the registered extent by one (bin
/// edges). Conversely, if the registered extent came only from such
/// coordinates, data one element shorter shrinks the registry to the data
/// extent.
fn merge_into(registry: &mut Dimensions, existing: &[Variable], var: &Variable) -> Result<()> {
    let coord_dim = var.tag().coordinate_dimension();
    for (dim, extent) in var.dims().iter() {
        match registry.size(dim) {
            Err(_) => registry.add(dim, extent)?,
            Ok(registered) if extent == registered => {}
            Ok(registered) if coord_dim == Some(dim) && extent == registered + 1 => {}
            Ok(registered)
                if extent + 1 == registered && only_edge_coords_span(existing, dim, registered) =>
            {
                registry.resize(dim, extent)?;
            }
            Ok(_) => {
                return Err(Error::DimensionMismatch {
                    expected: *registry,
                    actual: *var.dims(),
                });
            }
        }
    }
    Ok(())
}

fn only_edge_coords_span(existing: &[Variable], dim: Dim, extent: usize) -> bool {
    let mut spanning = existing.iter().filter(|v| v.dims().contains_dim(dim));
    spanning.clone().count() > 0
        && spanning.all(|v| {
            v.tag().coordinate_dimension() == Some(dim) && v.dims().size_or_1(dim) == extent
        })
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        // The registry is derived state; the variables carry the identity.
        self.vars == other.vars
    }
}

impl std::ops::Index<usize> for Dataset {
    type Output = Variable;

    fn index(&self, i: usize) -> &Variable {
        &self.vars[i]
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}
