//! Borrowed sub-dataset views.
//!
//! A [`DatasetSlice`] records a selection of variables plus a list of
//! per-dimension restrictions, resolved lazily against each variable. Point
//! slices drop the dimension and remove its dimension-coordinates from the
//! selection (a single row has no use for the axis that indexed it).

use super::Dataset;
use crate::dims::Dim;
use crate::error::{Error, Result};
use crate::slice::VariableSlice;
use crate::tag::Tag;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Restriction {
    Range(Dim, usize, usize),
    Point(Dim, usize),
}

impl Restriction {
    fn dim(&self) -> Dim {
        match *self {
            Restriction::Range(dim, ..) | Restriction::Point(dim, _) => dim,
        }
    }
}

/// Non-owning view of a subset of a dataset.
#[derive(Clone, Debug)]
pub struct DatasetSlice<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
    restrictions: Vec<Restriction>,
}

impl<'a> From<&'a Dataset> for DatasetSlice<'a> {
    fn from(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            indices: (0..dataset.len()).collect(),
            restrictions: Vec::new(),
        }
    }
}

impl<'a> DatasetSlice<'a> {
    /// Select all coordinates plus the data and attribute variables whose
    /// name equals `select`.
    pub(super) fn select(dataset: &'a Dataset, select: &str) -> Self {
        let indices = dataset
            .iter()
            .enumerate()
            .filter(|(_, v)| v.tag().is_coord() || v.name() == select)
            .map(|(i, _)| i)
            .collect();
        Self {
            dataset,
            indices,
            restrictions: Vec::new(),
        }
    }

    /// The underlying dataset.
    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Number of selected variables.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Restrict to `begin..end` along `dim`. A later restriction on the same
    /// dimension replaces an earlier one.
    pub fn slice(mut self, dim: Dim, begin: usize, end: usize) -> Result<Self> {
        let extent = self.dataset.dims().size(dim)?;
        if begin > end || end > extent {
            return Err(Error::IndexOutOfRange {
                dim,
                index: end,
                extent,
            });
        }
        self.restrictions.retain(|r| r.dim() != dim);
        self.restrictions.push(Restriction::Range(dim, begin, end));
        Ok(self)
    }

    /// Restrict to a point along `dim`, dropping the dimension and removing
    /// its dimension-coordinates from the selection.
    pub fn at(mut self, dim: Dim, index: usize) -> Result<Self> {
        let extent = self.dataset.dims().size(dim)?;
        if index >= extent {
            return Err(Error::IndexOutOfRange {
                dim,
                index,
                extent,
            });
        }
        self.restrictions.retain(|r| r.dim() != dim);
        self.restrictions.push(Restriction::Point(dim, index));
        let dataset = self.dataset;
        self.indices
            .retain(|&i| dataset[i].tag().coordinate_dimension() != Some(dim));
        Ok(self)
    }

    /// The `i`-th selected variable, with all restrictions applied.
    pub fn get(&self, i: usize) -> Result<VariableSlice<'a>> {
        let var = &self.dataset[self.indices[i]];
        let mut vs = VariableSlice::from(var);
        for r in &self.restrictions {
            if !var.dims().contains_dim(r.dim()) {
                continue;
            }
            vs = match *r {
                Restriction::Range(dim, begin, end) => vs.slice(dim, begin, end)?,
                Restriction::Point(dim, index) => vs.at(dim, index)?,
            };
        }
        Ok(vs)
    }

    /// Iterate over the selected variables as slices.
    pub fn iter(&self) -> impl Iterator<Item = Result<VariableSlice<'a>>> + '_ {
        (0..self.indices.len()).map(|i| self.get(i))
    }

    /// Whether the selection contains the given identity.
    pub fn contains(&self, tag: Tag, name: &str) -> bool {
        self.indices
            .iter()
            .any(|&i| self.dataset[i].tag() == tag && self.dataset[i].name() == name)
    }

    /// The selected variable with the given identity.
    pub fn find(&self, tag: Tag, name: &str) -> Result<VariableSlice<'a>> {
        let i = self
            .indices
            .iter()
            .position(|&i| self.dataset[i].tag() == tag && self.dataset[i].name() == name)
            .ok_or_else(|| Error::NotFound {
                tag,
                name: name.to_string(),
            })?;
        self.get(i)
    }

    /// Materialise into an owning dataset.
    pub fn to_dataset(&self) -> Result<Dataset> {
        let mut out = Dataset::new();
        for entry in self.iter() {
            out.insert(entry?.to_variable())?;
        }
        Ok(out)
    }
}
