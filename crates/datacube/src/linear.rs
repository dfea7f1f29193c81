//! Row-tuple access to strictly one-dimensional datasets.
//!
//! A [`LinearView`] treats a dataset whose variables all share one
//! dimension as a growable table of rows. It must select *every* variable,
//! so that [`LinearView::push_back`] can grow the whole dataset one row at a
//! time while the shared dimension registry stays consistent.

use std::marker::PhantomData;

use crate::dataset::Dataset;
use crate::dims::Dim;
use crate::error::{Error, Result};
use crate::ops::permute;
use crate::tag::{Tag, TagKey};
use crate::values::Element;

mod sealed {
    pub trait Sealed {}
}

/// A tuple of tag markers describing one row of a 1-D dataset.
pub trait RowSpec: sealed::Sealed {
    /// Owned row values, in selector order.
    type Row;
    /// Mutable references into one row.
    type ItemsMut<'a>;
    #[doc(hidden)]
    type Ptrs;

    #[doc(hidden)]
    fn tags(acc: &mut Vec<Tag>);

    #[doc(hidden)]
    fn check_kinds(d: &Dataset, indices: &[usize]) -> Result<()>;

    #[doc(hidden)]
    fn push(d: &mut Dataset, indices: &[usize], row: Self::Row) -> Result<()>;

    #[doc(hidden)]
    fn clone_row(d: &Dataset, indices: &[usize], at: usize) -> Self::Row;

    #[doc(hidden)]
    fn bind(d: &mut Dataset, indices: &[usize]) -> Self::Ptrs;

    /// # Safety
    /// `at` must be within the column length, the pointers must still be
    /// valid, and each row index must be handed out at most once while its
    /// items are alive.
    #[doc(hidden)]
    unsafe fn items<'a>(ptrs: &Self::Ptrs, at: usize) -> Self::ItemsMut<'a>;
}

macro_rules! impl_row_spec {
    ($($name:ident . $pos:tt)+) => {
        impl<$($name: TagKey),+> sealed::Sealed for ($($name,)+) {}

        impl<$($name: TagKey),+> RowSpec for ($($name,)+) {
            type Row = ($($name::Elem,)+);
            type ItemsMut<'a> = ($(&'a mut $name::Elem,)+);
            type Ptrs = ($(*mut $name::Elem,)+);

            fn tags(acc: &mut Vec<Tag>) {
                $(acc.push($name::TAG);)+
            }

            fn check_kinds(d: &Dataset, indices: &[usize]) -> Result<()> {
                $(
                    let var = &d.vars()[indices[$pos]];
                    if var.element_kind() != <$name::Elem as Element>::KIND {
                        return Err(Error::TagMismatch {
                            expected: <$name::Elem as Element>::KIND,
                            actual: var.element_kind(),
                        });
                    }
                )+
                Ok(())
            }

            fn push(d: &mut Dataset, indices: &[usize], row: Self::Row) -> Result<()> {
                $(d.var_at_mut(indices[$pos]).push_element(row.$pos)?;)+
                Ok(())
            }

            fn clone_row(d: &Dataset, indices: &[usize], at: usize) -> Self::Row {
                ($(
                    <$name::Elem as Element>::slice(d.vars()[indices[$pos]].storage())
                        .expect("element kinds checked at construction")[at]
                        .clone(),
                )+)
            }

            fn bind(d: &mut Dataset, indices: &[usize]) -> Self::Ptrs {
                ($(
                    <$name::Elem as Element>::slice_mut(
                        d.var_at_mut(indices[$pos]).storage_mut(),
                    )
                    .expect("element kinds checked at construction")
                    .as_mut_ptr(),
                )+)
            }

            unsafe fn items<'a>(ptrs: &Self::Ptrs, at: usize) -> Self::ItemsMut<'a> {
                // Safety: the columns are distinct variables and each row is
                // visited once per traversal.
                unsafe { ($(&mut *ptrs.$pos.add(at),)+) }
            }
        }
    };
}

impl_row_spec!(A.0);
impl_row_spec!(A.0 B.1);
impl_row_spec!(A.0 B.1 C.2);
impl_row_spec!(A.0 B.1 C.2 D.3);

/// Tuple cursor over a strictly 1-D dataset.
///
/// # Example
///
/// ```
/// use datacube::{coord, data, Dataset, Dim, Dimensions, LinearView};
///
/// let mut d = Dataset::new();
/// d.insert_coord_default::<coord::X>(Dimensions::new(&[(Dim::X, 0)]).unwrap()).unwrap();
/// d.insert_data_default::<data::Value>("", Dimensions::new(&[(Dim::X, 0)]).unwrap())
///     .unwrap();
///
/// let mut view = LinearView::<(coord::X, data::Value)>::new(&mut d).unwrap();
/// view.push_back((1.1, 1.2)).unwrap();
/// view.push_back((2.2, 2.3)).unwrap();
/// assert_eq!(d.values::<coord::X>().unwrap(), &[1.1, 2.2]);
/// assert_eq!(d.values::<data::Value>().unwrap(), &[1.2, 2.3]);
/// ```
#[derive(Debug)]
pub struct LinearView<'d, S: RowSpec> {
    dataset: &'d mut Dataset,
    indices: Vec<usize>,
    dim: Dim,
    _marker: PhantomData<S>,
}

impl<'d, S: RowSpec> LinearView<'d, S> {
    /// Build a view over all variables of a 1-D dataset.
    pub fn new(dataset: &'d mut Dataset) -> Result<Self> {
        let mut tags = Vec::new();
        S::tags(&mut tags);
        for (i, tag) in tags.iter().enumerate() {
            if tags[..i].contains(tag) {
                return Err(Error::LinearViewMisconfigured(
                    "selectors must be distinct",
                ));
            }
        }
        if tags.len() != dataset.len() {
            return Err(Error::LinearViewMisconfigured(
                "the view must select all variables in the dataset",
            ));
        }
        let mut indices = Vec::with_capacity(tags.len());
        for tag in &tags {
            indices.push(dataset.find_unique(*tag).map_err(|_| {
                Error::LinearViewMisconfigured(
                    "the view must select all variables in the dataset",
                )
            })?);
        }
        if indices
            .iter()
            .any(|&i| dataset.vars()[i].dims().ndim() != 1)
        {
            return Err(Error::LinearViewMisconfigured(
                "all variables must be one-dimensional",
            ));
        }
        let dim = dataset.vars()[indices[0]].dims().label(0);
        if indices
            .iter()
            .any(|&i| dataset.vars()[i].dims().label(0) != dim)
        {
            return Err(Error::LinearViewMisconfigured(
                "all variables must share a single dimension",
            ));
        }
        S::check_kinds(dataset, &indices)?;
        Ok(Self {
            dataset,
            indices,
            dim,
            _marker: PhantomData,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dataset.vars()[self.indices[0]].dims().extent_at(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one row, growing every variable and the dimension registry.
    pub fn push_back(&mut self, row: S::Row) -> Result<()> {
        S::push(self.dataset, &self.indices, row)?;
        let extent = self.len();
        self.dataset.resize_registry(self.dim, extent)
    }

    /// Append every row of an iterator.
    pub fn extend_rows(&mut self, rows: impl IntoIterator<Item = S::Row>) -> Result<()> {
        for row in rows {
            self.push_back(row)?;
        }
        Ok(())
    }

    /// Iterate owned copies of the rows.
    pub fn rows(&self) -> impl Iterator<Item = S::Row> + '_ {
        (0..self.len()).map(move |i| S::clone_row(self.dataset, &self.indices, i))
    }

    /// Visit every row with mutable access to each component.
    pub fn for_each<F>(&mut self, mut f: F)
    where
        F: for<'a> FnMut(S::ItemsMut<'a>),
    {
        let len = self.len();
        let ptrs = S::bind(self.dataset, &self.indices);
        for i in 0..len {
            // Safety: rows are visited once each, over distinct columns.
            unsafe { f(S::items(&ptrs, i)) };
        }
    }

    /// Stable sort of all rows by the column with marker tag `K`.
    pub fn sort_by_key<K: TagKey>(&mut self) -> Result<()>
    where
        K::Elem: PartialOrd,
    {
        let key_idx = self.dataset.find_unique(K::TAG)?;
        let perm = {
            let key = <K::Elem as Element>::slice(self.dataset.vars()[key_idx].storage()).ok_or(
                Error::TagMismatch {
                    expected: <K::Elem as Element>::KIND,
                    actual: self.dataset.vars()[key_idx].element_kind(),
                },
            )?;
            let mut perm: Vec<usize> = (0..key.len()).collect();
            perm.sort_by(|&a, &b| {
                key[a]
                    .partial_cmp(&key[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            perm
        };
        for &i in &self.indices {
            let permuted = permute(&self.dataset.vars()[i], self.dim, &perm)?;
            *self.dataset.var_at_mut(i) = permuted;
        }
        Ok(())
    }
}
