//! Structured joint iteration over several variables of a dataset.
//!
//! A [`DatasetView`] iterates a tuple of selectors over the joint dimension
//! space of the selected variables. Smaller operands broadcast (stride 0)
//! and differently-ordered operands transpose transparently; writable
//! selectors must span the joint space exactly so every element is visited
//! once, which is also what makes handing out `&mut` items sound.
//!
//! Selector kinds:
//!
//! - a bare tag marker `T` iterates mutably, element by element;
//! - [`Read<T>`] iterates read-only and may broadcast or transpose;
//! - [`Bin<T>`] turns a bin-edge coordinate into per-bin [`DataBin`]s;
//! - [`Slab<T>`] yields a sub-view keeping the fixed dimensions inside;
//! - [`SubView<S>`] yields a nested view iterating the fixed dimensions.

use std::marker::PhantomData;

use crate::dataset::Dataset;
use crate::dims::{Dim, Dimensions, MAX_DIMS};
use crate::error::{Error, Result};
use crate::slice::VariableSlice;
use crate::tag::{Tag, TagKey};
use crate::values::Element;
use crate::variable::Variable;

mod sealed {
    pub trait Sealed {}
}

/// Maximum index positions: an outer joint space plus one nested space.
const MAX_IDX: usize = 2 * MAX_DIMS;

#[doc(hidden)]
pub type Index = [usize; MAX_IDX];

/// One bin of a histogram axis: the pair of adjacent bin edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataBin {
    left: f64,
    right: f64,
}

impl DataBin {
    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn center(&self) -> f64 {
        0.5 * (self.left + self.right)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }
}

/// Read-only element selector.
#[derive(Debug)]
pub struct Read<T>(PhantomData<T>);

/// Bin-edge selector: iterates adjacent edge pairs of a dimension-coordinate.
#[derive(Debug)]
pub struct Bin<T>(PhantomData<T>);

/// Slab selector: yields sub-views spanning the fixed dimensions.
#[derive(Debug)]
pub struct Slab<T>(PhantomData<T>);

/// Nested view selector: yields a sub-view iterating the fixed dimensions.
pub struct SubView<S>(PhantomData<S>);

// =============================================================================
// Index layout and column maps
// =============================================================================

/// Assignment of dimensions to index positions: the outer joint dimensions
/// first, optionally extended by the inner dimensions of a nested view.
#[doc(hidden)]
#[derive(Clone, Copy, Debug)]
pub struct Layout {
    dims: [Dim; MAX_IDX],
    extents: [usize; MAX_IDX],
    len: usize,
}

impl Layout {
    fn from_dims(dims: &Dimensions) -> Layout {
        let mut layout = Layout {
            dims: [Dim::X; MAX_IDX],
            extents: [0; MAX_IDX],
            len: 0,
        };
        for (dim, extent) in dims.iter() {
            layout.push(dim, extent);
        }
        layout
    }

    fn push(&mut self, dim: Dim, extent: usize) {
        self.dims[self.len] = dim;
        self.extents[self.len] = extent;
        self.len += 1;
    }
}

/// Per-column strides aligned to a [`Layout`]; positions for dimensions the
/// variable does not span carry stride 0 (broadcast).
#[derive(Clone, Copy, Debug)]
struct ColumnMap {
    strides: [usize; MAX_IDX],
    len: usize,
}

impl ColumnMap {
    fn new(var_dims: &Dimensions, layout: &Layout) -> ColumnMap {
        let var_strides = var_dims.strides();
        let mut strides = [0; MAX_IDX];
        for p in 0..layout.len {
            if let Some(i) = var_dims.index_of(layout.dims[p]) {
                strides[p] = var_strides[i];
            }
        }
        ColumnMap {
            strides,
            len: layout.len,
        }
    }

    #[inline]
    fn offset(&self, idx: &Index) -> usize {
        let mut offset = 0;
        for p in 0..self.len {
            offset += self.strides[p] * idx[p];
        }
        offset
    }
}

// =============================================================================
// Selectors
// =============================================================================

/// One selector of a [`DatasetView`] tuple.
pub trait Selector: sealed::Sealed {
    /// What one iteration step yields for this selector.
    type Item<'a>
    where
        Self: 'a;

    #[doc(hidden)]
    type Column;

    #[doc(hidden)]
    const WRITABLE: bool;

    #[doc(hidden)]
    fn rep_tag() -> Tag;

    #[doc(hidden)]
    fn collect_tags(acc: &mut Vec<Tag>);

    #[doc(hidden)]
    fn adjusted(d: &Dataset, fixed: &[Dim]) -> Result<Dimensions>;

    #[doc(hidden)]
    fn bind(d: &mut Dataset, layout: &Layout, fixed: &[Dim]) -> Result<Self::Column>;

    /// # Safety
    /// `idx` must lie within the extents the column was bound with, and for
    /// writable selectors each index combination must be visited at most
    /// once while items may be alive.
    #[doc(hidden)]
    unsafe fn item<'a>(col: &Self::Column, idx: &Index) -> Self::Item<'a>;
}

#[doc(hidden)]
#[derive(Debug)]
pub struct WriteColumn<E> {
    ptr: *mut E,
    map: ColumnMap,
}

#[doc(hidden)]
#[derive(Debug)]
pub struct ReadColumn<E> {
    ptr: *const E,
    map: ColumnMap,
}

#[doc(hidden)]
pub struct BinColumn {
    ptr: *const f64,
    map: ColumnMap,
    edge_stride: usize,
}

#[doc(hidden)]
pub struct SlabColumn {
    var: *const Variable,
    fix: Vec<(Dim, usize)>,
}

#[doc(hidden)]
pub struct SubColumn<S: SelectorList> {
    cols: S::Columns,
    extents: [usize; MAX_IDX],
    inner_start: usize,
    inner_len: usize,
}

impl<T: TagKey> sealed::Sealed for T {}

impl<T: TagKey> Selector for T {
    type Item<'a> = &'a mut T::Elem;
    type Column = WriteColumn<T::Elem>;
    const WRITABLE: bool = true;

    fn rep_tag() -> Tag {
        T::TAG
    }

    fn collect_tags(acc: &mut Vec<Tag>) {
        acc.push(T::TAG);
    }

    fn adjusted(d: &Dataset, _fixed: &[Dim]) -> Result<Dimensions> {
        Ok(*d.vars()[d.find_unique(T::TAG)?].dims())
    }

    fn bind(d: &mut Dataset, layout: &Layout, _fixed: &[Dim]) -> Result<Self::Column> {
        let i = d.find_unique(T::TAG)?;
        let var = d.var_at_mut(i);
        let map = ColumnMap::new(var.dims(), layout);
        let actual = var.element_kind();
        let slice = <T::Elem as Element>::slice_mut(var.storage_mut()).ok_or(
            Error::TagMismatch {
                expected: <T::Elem as Element>::KIND,
                actual,
            },
        )?;
        Ok(WriteColumn {
            ptr: slice.as_mut_ptr(),
            map,
        })
    }

    unsafe fn item<'a>(col: &Self::Column, idx: &Index) -> &'a mut T::Elem {
        // Safety: the joint-space rules guarantee each offset is produced at
        // most once per traversal, and the buffer was un-shared at bind time.
        unsafe { &mut *col.ptr.add(col.map.offset(idx)) }
    }
}

impl<T: TagKey> sealed::Sealed for Read<T> {}

impl<T: TagKey> Selector for Read<T> {
    type Item<'a> = &'a T::Elem;
    type Column = ReadColumn<T::Elem>;
    const WRITABLE: bool = false;

    fn rep_tag() -> Tag {
        T::TAG
    }

    fn collect_tags(acc: &mut Vec<Tag>) {
        acc.push(T::TAG);
    }

    fn adjusted(d: &Dataset, _fixed: &[Dim]) -> Result<Dimensions> {
        Ok(*d.vars()[d.find_unique(T::TAG)?].dims())
    }

    fn bind(d: &mut Dataset, layout: &Layout, _fixed: &[Dim]) -> Result<Self::Column> {
        let var = &d.vars()[d.find_unique(T::TAG)?];
        let slice = <T::Elem as Element>::slice(var.storage()).ok_or(Error::TagMismatch {
            expected: <T::Elem as Element>::KIND,
            actual: var.element_kind(),
        })?;
        Ok(ReadColumn {
            ptr: slice.as_ptr(),
            map: ColumnMap::new(var.dims(), layout),
        })
    }

    unsafe fn item<'a>(col: &Self::Column, idx: &Index) -> &'a T::Elem {
        // Safety: read-only access; the buffer outlives the view borrow.
        unsafe { &*col.ptr.add(col.map.offset(idx)) }
    }
}

impl<T: TagKey<Elem = f64>> sealed::Sealed for Bin<T> {}

impl<T: TagKey<Elem = f64>> Selector for Bin<T> {
    type Item<'a> = DataBin;
    type Column = BinColumn;
    const WRITABLE: bool = false;

    fn rep_tag() -> Tag {
        T::TAG
    }

    fn collect_tags(acc: &mut Vec<Tag>) {
        acc.push(T::TAG);
    }

    fn adjusted(d: &Dataset, _fixed: &[Dim]) -> Result<Dimensions> {
        let dim = T::TAG
            .coordinate_dimension()
            .ok_or(Error::CoordinateMismatch(T::TAG))?;
        let var = &d.vars()[d.find_unique(T::TAG)?];
        let mut dims = *var.dims();
        let extent = dims.size(dim)?;
        if extent == 0 {
            return Err(Error::EdgeCountMismatch {
                dim,
                expected: 2,
                actual: 0,
            });
        }
        dims.resize(dim, extent - 1)?;
        Ok(dims)
    }

    fn bind(d: &mut Dataset, layout: &Layout, _fixed: &[Dim]) -> Result<Self::Column> {
        let dim = T::TAG
            .coordinate_dimension()
            .ok_or(Error::CoordinateMismatch(T::TAG))?;
        let var = &d.vars()[d.find_unique(T::TAG)?];
        let slice = <f64 as Element>::slice(var.storage()).ok_or(Error::TagMismatch {
            expected: <f64 as Element>::KIND,
            actual: var.element_kind(),
        })?;
        Ok(BinColumn {
            ptr: slice.as_ptr(),
            map: ColumnMap::new(var.dims(), layout),
            edge_stride: var.dims().offset(dim)?,
        })
    }

    unsafe fn item<'a>(col: &Self::Column, idx: &Index) -> Self::Item<'a> {
        let offset = col.map.offset(idx);
        // Safety: the adjusted dimensions shrank the edge axis by one, so
        // `offset + edge_stride` stays within the edge buffer.
        unsafe {
            DataBin {
                left: *col.ptr.add(offset),
                right: *col.ptr.add(offset + col.edge_stride),
            }
        }
    }
}

impl<T: TagKey> sealed::Sealed for Slab<T> {}

impl<T: TagKey> Selector for Slab<T> {
    type Item<'a> = VariableSlice<'a>;
    type Column = SlabColumn;
    const WRITABLE: bool = false;

    fn rep_tag() -> Tag {
        T::TAG
    }

    fn collect_tags(acc: &mut Vec<Tag>) {
        acc.push(T::TAG);
    }

    fn adjusted(d: &Dataset, fixed: &[Dim]) -> Result<Dimensions> {
        let mut dims = *d.vars()[d.find_unique(T::TAG)?].dims();
        for &dim in fixed {
            if dims.contains_dim(dim) {
                dims.erase(dim)?;
            }
        }
        Ok(dims)
    }

    fn bind(d: &mut Dataset, layout: &Layout, _fixed: &[Dim]) -> Result<Self::Column> {
        let var = &d.vars()[d.find_unique(T::TAG)?];
        let fix = (0..layout.len)
            .filter(|&p| var.dims().contains_dim(layout.dims[p]))
            .map(|p| (layout.dims[p], p))
            .collect();
        Ok(SlabColumn {
            var: var as *const Variable,
            fix,
        })
    }

    unsafe fn item<'a>(col: &Self::Column, idx: &Index) -> VariableSlice<'a> {
        // Safety: the variable sits in the dataset the view borrows; nothing
        // moves it while the view is alive.
        let var: &'a Variable = unsafe { &*col.var };
        let mut vs = VariableSlice::from(var);
        for &(dim, pos) in &col.fix {
            vs = vs
                .at(dim, idx[pos])
                .expect("iteration index within variable extents");
        }
        vs
    }
}

impl<S: SelectorList> sealed::Sealed for SubView<S> {}

impl<S: SelectorList> Selector for SubView<S> {
    type Item<'a> = SubViewItem<'a, S> where Self: 'a;
    type Column = SubColumn<S>;
    const WRITABLE: bool = S::ANY_WRITABLE;

    fn rep_tag() -> Tag {
        let mut tags = Vec::new();
        S::collect_tags(&mut tags);
        tags[0]
    }

    fn collect_tags(acc: &mut Vec<Tag>) {
        S::collect_tags(acc);
    }

    fn adjusted(d: &Dataset, fixed: &[Dim]) -> Result<Dimensions> {
        let joint = S::joint_dims(d)?;
        let mut outer = joint;
        for &dim in fixed {
            if outer.contains_dim(dim) {
                outer.erase(dim)?;
            }
        }
        Ok(outer)
    }

    fn bind(d: &mut Dataset, layout: &Layout, fixed: &[Dim]) -> Result<Self::Column> {
        let joint = S::joint_dims(d)?;
        let mut entries = Vec::new();
        S::adjusted_all(d, &[], &mut entries)?;
        for (tag, writable, dims) in &entries {
            if !joint.contains(dims) {
                return Err(Error::NoJointIterationSpace);
            }
            if *writable && !dims.contains(&joint) {
                return Err(Error::BroadcastWrite(*tag));
            }
        }

        let mut extended = *layout;
        let inner_start = extended.len;
        for (dim, extent) in joint.iter() {
            if fixed.contains(&dim) {
                extended.push(dim, extent);
            }
        }
        let inner_len = extended.len - inner_start;
        let cols = S::bind_all(d, &extended, &[])?;
        Ok(SubColumn {
            cols,
            extents: extended.extents,
            inner_start,
            inner_len,
        })
    }

    unsafe fn item<'a>(col: &Self::Column, idx: &Index) -> SubViewItem<'a, S> {
        SubViewItem {
            col: unsafe { &*(col as *const SubColumn<S>) },
            base: *idx,
        }
    }
}

/// One step of a nested view: iterates the fixed dimensions at the current
/// outer position.
pub struct SubViewItem<'a, S: SelectorList> {
    col: &'a SubColumn<S>,
    base: Index,
}

impl<S: SelectorList> SubViewItem<'_, S> {
    /// Visit every inner element tuple.
    pub fn for_each<F>(&mut self, mut f: F)
    where
        F: for<'b> FnMut(S::Items<'b>),
    {
        let start = self.col.inner_start;
        let len = self.col.inner_len;
        let mut idx = self.base;
        idx[start..start + len].fill(0);
        let total: usize = self.col.extents[start..start + len].iter().product();
        for _ in 0..total {
            // Safety: each (outer, inner) index combination is unique, so
            // writable members hand out each element at most once.
            unsafe { f(S::items(&self.col.cols, &idx)) };
            for k in (start..start + len).rev() {
                idx[k] += 1;
                if idx[k] < self.col.extents[k] {
                    break;
                }
                idx[k] = 0;
            }
        }
    }
}

// =============================================================================
// Selector tuples
// =============================================================================

/// A tuple of selectors.
pub trait SelectorList: sealed::Sealed {
    #[doc(hidden)]
    type Columns;
    /// The tuple of items yielded per iteration step.
    type Items<'a>
    where
        Self: 'a;
    #[doc(hidden)]
    const ANY_WRITABLE: bool;

    #[doc(hidden)]
    fn collect_tags(acc: &mut Vec<Tag>);

    #[doc(hidden)]
    fn adjusted_all(
        d: &Dataset,
        fixed: &[Dim],
        acc: &mut Vec<(Tag, bool, Dimensions)>,
    ) -> Result<()>;

    #[doc(hidden)]
    fn bind_all(d: &mut Dataset, layout: &Layout, fixed: &[Dim]) -> Result<Self::Columns>;

    /// # Safety
    /// See [`Selector::item`].
    #[doc(hidden)]
    unsafe fn items<'a>(cols: &Self::Columns, idx: &Index) -> Self::Items<'a>;

    #[doc(hidden)]
    fn joint_dims(d: &Dataset) -> Result<Dimensions> {
        let mut entries = Vec::new();
        Self::adjusted_all(d, &[], &mut entries)?;
        Ok(largest(&entries))
    }
}

/// The first entry with the highest rank, mirroring joint-space resolution.
fn largest(entries: &[(Tag, bool, Dimensions)]) -> Dimensions {
    let mut best = Dimensions::empty();
    for (_, _, dims) in entries {
        if dims.ndim() > best.ndim() {
            best = *dims;
        }
    }
    best
}

macro_rules! impl_selector_list {
    ($($name:ident)+) => {
        impl<$($name: Selector),+> sealed::Sealed for ($($name,)+) {}

        impl<$($name: Selector),+> SelectorList for ($($name,)+) {
            type Columns = ($($name::Column,)+);
            type Items<'a> = ($($name::Item<'a>,)+) where Self: 'a;
            const ANY_WRITABLE: bool = $($name::WRITABLE)||+;

            fn collect_tags(acc: &mut Vec<Tag>) {
                $($name::collect_tags(acc);)+
            }

            fn adjusted_all(
                d: &Dataset,
                fixed: &[Dim],
                acc: &mut Vec<(Tag, bool, Dimensions)>,
            ) -> Result<()> {
                $(acc.push(($name::rep_tag(), $name::WRITABLE, $name::adjusted(d, fixed)?));)+
                Ok(())
            }

            fn bind_all(d: &mut Dataset, layout: &Layout, fixed: &[Dim]) -> Result<Self::Columns> {
                Ok(($($name::bind(d, layout, fixed)?,)+))
            }

            unsafe fn items<'a>(cols: &Self::Columns, idx: &Index) -> Self::Items<'a> {
                #[allow(non_snake_case)]
                let ($($name,)+) = cols;
                unsafe { ($($name::item($name, idx),)+) }
            }
        }
    };
}

impl_selector_list!(A);
impl_selector_list!(A B);
impl_selector_list!(A B C);
impl_selector_list!(A B C D);

// =============================================================================
// DatasetView
// =============================================================================

/// Joint iterator over a tuple of selected variables.
///
/// # Example
///
/// ```
/// use datacube::{coord, data, Bin, Dataset, DatasetView, Dim, Dimensions};
///
/// let mut d = Dataset::new();
/// d.insert_coord::<coord::X>(Dimensions::new(&[(Dim::X, 3)]).unwrap(), vec![0.0, 1.0, 2.0])
///     .unwrap();
/// d.insert_data::<data::Value>("counts", Dimensions::new(&[(Dim::X, 2)]).unwrap(), vec![
///     10.0, 20.0,
/// ])
/// .unwrap();
///
/// // The coordinate holds bin edges, so it is iterated as bins.
/// let mut view = DatasetView::<(Bin<coord::X>, data::Value)>::new(&mut d).unwrap();
/// view.for_each(|(bin, value)| {
///     *value *= bin.width();
/// });
/// assert_eq!(d.values_named::<data::Value>("counts").unwrap(), &[10.0, 20.0]);
/// ```
#[derive(Debug)]
pub struct DatasetView<'d, S: SelectorList> {
    joint: Dimensions,
    cols: S::Columns,
    _marker: PhantomData<&'d mut Dataset>,
}

impl<'d, S: SelectorList> DatasetView<'d, S> {
    /// Build a view iterating the joint dimensions of all selectors.
    pub fn new(dataset: &'d mut Dataset) -> Result<Self> {
        Self::with_fixed(dataset, &[])
    }

    /// Build a view with the given dimensions excluded from iteration;
    /// `Slab` selectors keep them inside each slab and `SubView` selectors
    /// iterate them in the nested view.
    pub fn with_fixed(dataset: &'d mut Dataset, fixed: &[Dim]) -> Result<Self> {
        let mut tags = Vec::new();
        S::collect_tags(&mut tags);
        for (i, tag) in tags.iter().enumerate() {
            if tags[..i].contains(tag) {
                return Err(Error::DuplicateTag {
                    tag: *tag,
                    name: String::new(),
                });
            }
        }

        let mut entries = Vec::new();
        S::adjusted_all(dataset, fixed, &mut entries)?;
        let mut joint = largest(&entries);
        for &dim in fixed {
            if joint.contains_dim(dim) {
                joint.erase(dim)?;
            }
        }
        for (tag, writable, dims) in &entries {
            if !joint.contains(dims) {
                return Err(Error::NoJointIterationSpace);
            }
            if *writable && *dims != joint {
                return Err(Error::BroadcastWrite(*tag));
            }
        }

        let layout = Layout::from_dims(&joint);
        let cols = S::bind_all(dataset, &layout, fixed)?;
        Ok(Self {
            joint,
            cols,
            _marker: PhantomData,
        })
    }

    /// The joint iteration dimensions.
    pub fn dims(&self) -> &Dimensions {
        &self.joint
    }

    /// Visit every element tuple in row-major joint order. Items of writable
    /// selectors write through to the dataset.
    pub fn for_each<F>(&mut self, mut f: F)
    where
        F: for<'a> FnMut(S::Items<'a>),
    {
        let n = self.joint.ndim();
        let extents = self.joint.shape();
        let total = self.joint.volume();
        let mut idx: Index = [0; MAX_IDX];
        for _ in 0..total {
            // Safety: the odometer below visits every joint index exactly
            // once, and writable columns span the joint space exactly.
            unsafe { f(S::items(&self.cols, &idx)) };
            for k in (0..n).rev() {
                idx[k] += 1;
                if idx[k] < extents[k] {
                    break;
                }
                idx[k] = 0;
            }
        }
    }
}
