//! datacube: multi-dimensional, labelled, heterogeneously-typed data
//! containers for scattering workflows.
//!
//! The engine represents a workspace as a [`Dataset`]: an ordered collection
//! of named, typed, unit-carrying, dimension-labelled [`Variable`]s sharing
//! one dimension registry. Variables hold numerical arrays, coordinates,
//! scalar metadata, or nested datasets (event lists, tables).
//!
//! # Key Types
//!
//! - [`Variable`] - type-erased array with unit, dimensions and
//!   copy-on-write storage
//! - [`Dataset`] - variable collection with a shared dimension registry
//! - [`VariableSlice`] / [`DatasetSlice`] - non-owning restricted views
//! - [`DatasetView`] - joint iteration with broadcasting and bin-edge
//!   adaptation
//! - [`LinearView`] - row-tuple access to 1-D datasets
//!
//! # Shape operations
//!
//! Free functions [`slice`], [`concatenate`], [`split`], [`rebin`],
//! [`permute`] and [`filter`] operate on variables; their dataset-level
//! counterparts live in the [`dataset`] module (e.g. `dataset::sort`).
//!
//! # Example
//!
//! ```
//! use datacube::{coord, data, Dataset, Dim, Dimensions};
//!
//! let mut d = Dataset::new();
//! d.insert_coord::<coord::Tof>(Dimensions::new(&[(Dim::Tof, 4)]).unwrap(), vec![
//!     0.0, 1.0, 2.0, 3.0,
//! ])
//! .unwrap();
//! d.insert_data::<data::Value>("counts", Dimensions::new(&[(Dim::Tof, 3)]).unwrap(), vec![
//!     10.0, 20.0, 30.0,
//! ])
//! .unwrap();
//!
//! // The time-of-flight axis carries bin edges: one more than the data.
//! assert_eq!(d.dims().size(Dim::Tof).unwrap(), 3);
//! ```

// Re-export approx traits for users who want to compare results
pub use approx;

pub mod dataset;
pub mod dims;
pub mod error;
pub mod linear;
pub mod ops;
pub mod slice;
mod strides;
pub mod tag;
pub mod unit;
pub mod value;
pub mod values;
pub mod variable;
pub mod view;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use dataset::{Dataset, DatasetSlice};
pub use dims::{Dim, Dimensions, MAX_DIMS};
pub use error::{Error, Result};
pub use linear::{LinearView, RowSpec};
pub use ops::{concatenate, filter, permute, rebin, slice, slice_range, split};
pub use slice::{Strided, VariableSlice, VariableSliceMut};
pub use tag::{attr, coord, data, AttrTag, CoordTag, DataTag, Tag, TagCategory, TagKey};
pub use unit::Unit;
pub use value::ValueWithDelta;
pub use values::{Element, ElementKind, Values};
pub use variable::Variable;
pub use view::{Bin, DataBin, DatasetView, Read, Selector, SelectorList, Slab, SubView};
