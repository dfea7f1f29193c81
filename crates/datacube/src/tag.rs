//! Static catalogue of variable kinds.
//!
//! A [`Tag`] identifies what a variable *is*: its category (coordinate, data
//! or attribute), its element type, its default unit, and — for
//! dimension-coordinates — the dimension it parametrises. The catalogue is
//! closed; all metadata lives in `const fn` match tables for cheap dispatch.
//!
//! Each tag also has a compile-time marker type (in [`coord`], [`data`] and
//! [`attr`]) used for typed element access, e.g.
//! `variable.values::<data::Value>()`.

use crate::dims::Dim;
use crate::unit::Unit;
use crate::values::{Element, ElementKind};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Variable category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagCategory {
    /// Axis metadata; carries no name.
    Coord,
    /// Measured or derived data; carries a name.
    Data,
    /// Auxiliary named blobs.
    Attr,
}

/// Coordinate tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoordTag {
    X,
    Y,
    Z,
    Tof,
    SpectrumNumber,
    RowLabel,
    DetectorId,
    Mask,
    DetectorPosition,
    DetectorGrouping,
    DetectorRotation,
    ComponentPosition,
    ComponentShape,
    Temperature,
    FuzzyTemperature,
    Time,
    TimeInterval,
    /// Computed from detector positions and grouping; not storable.
    SpectrumPosition,
}

/// Data tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataTag {
    Value,
    Variance,
    /// Computed from `Variance`; not storable.
    StdDev,
    Tof,
    PulseTime,
    Int,
    Str,
    History,
    Events,
    Table,
}

/// Attribute tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttrTag {
    ExperimentLog,
}

/// Variable kind identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    Coord(CoordTag),
    Data(DataTag),
    Attr(AttrTag),
}

impl Tag {
    /// Category of this tag.
    #[inline]
    pub const fn category(self) -> TagCategory {
        match self {
            Tag::Coord(_) => TagCategory::Coord,
            Tag::Data(_) => TagCategory::Data,
            Tag::Attr(_) => TagCategory::Attr,
        }
    }

    /// Whether this is a coordinate tag.
    #[inline]
    pub const fn is_coord(self) -> bool {
        matches!(self, Tag::Coord(_))
    }

    /// Element type stored by variables with this tag.
    pub const fn element_kind(self) -> ElementKind {
        use ElementKind::*;
        match self {
            Tag::Coord(tag) => match tag {
                CoordTag::X
                | CoordTag::Y
                | CoordTag::Z
                | CoordTag::Tof
                | CoordTag::DetectorPosition
                | CoordTag::Temperature
                | CoordTag::SpectrumPosition => F64,
                CoordTag::SpectrumNumber | CoordTag::DetectorId => I32,
                CoordTag::RowLabel => Str,
                CoordTag::Mask => U8,
                CoordTag::DetectorGrouping => IndexList,
                CoordTag::DetectorRotation => Vec4,
                CoordTag::ComponentPosition => Vec3,
                CoordTag::ComponentShape => Shape,
                CoordTag::FuzzyTemperature => Fuzzy,
                CoordTag::Time => I64,
                CoordTag::TimeInterval => I64Pair,
            },
            Tag::Data(tag) => match tag {
                DataTag::Value
                | DataTag::Variance
                | DataTag::StdDev
                | DataTag::Tof
                | DataTag::PulseTime => F64,
                DataTag::Int => I64,
                DataTag::Str => Str,
                DataTag::History => StrList,
                DataTag::Events | DataTag::Table => DatasetList,
            },
            Tag::Attr(AttrTag::ExperimentLog) => DatasetList,
        }
    }

    /// Unit assigned at variable creation.
    pub const fn default_unit(self) -> Unit {
        match self {
            Tag::Coord(
                CoordTag::X
                | CoordTag::Y
                | CoordTag::Z
                | CoordTag::DetectorPosition
                | CoordTag::ComponentPosition
                | CoordTag::SpectrumPosition,
            ) => Unit::Length,
            Tag::Coord(CoordTag::Time | CoordTag::TimeInterval) => Unit::Time,
            _ => Unit::Dimensionless,
        }
    }

    /// Whether variables with this tag define the axis of a dimension.
    #[inline]
    pub const fn is_dimension_coordinate(self) -> bool {
        self.coordinate_dimension().is_some()
    }

    /// The dimension this tag parametrises, for dimension-coordinates.
    pub const fn coordinate_dimension(self) -> Option<Dim> {
        match self {
            Tag::Coord(CoordTag::X) => Some(Dim::X),
            Tag::Coord(CoordTag::Y) => Some(Dim::Y),
            Tag::Coord(CoordTag::Z) => Some(Dim::Z),
            Tag::Coord(CoordTag::Tof) => Some(Dim::Tof),
            Tag::Coord(CoordTag::SpectrumNumber) => Some(Dim::Spectrum),
            Tag::Coord(CoordTag::RowLabel) => Some(Dim::Row),
            _ => None,
        }
    }

    /// Whether this tag is derived on demand rather than stored.
    #[inline]
    pub const fn is_computed(self) -> bool {
        matches!(
            self,
            Tag::Coord(CoordTag::SpectrumPosition) | Tag::Data(DataTag::StdDev)
        )
    }
}

/// Compile-time tag marker, linking a tag to its element type.
pub trait TagKey: sealed::Sealed + Copy + Default + 'static {
    type Elem: Element;
    const TAG: Tag;
}

/// Marker trait for coordinate tags (anonymous variables).
pub trait CoordKey: TagKey {}

/// Marker trait for data and attribute tags (named variables).
pub trait DataKey: TagKey {}

macro_rules! declare_tags {
    ($module:ident, $variant:ident, $sub:ident, $key:ident:
     $($(#[$meta:meta])* $name:ident => $elem:ty,)+) => {
        pub mod $module {
            #[allow(unused_imports)]
            use super::*;

            $(
                $(#[$meta])*
                #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
                pub struct $name;

                impl sealed::Sealed for $name {}

                impl TagKey for $name {
                    type Elem = $elem;
                    const TAG: Tag = Tag::$variant($sub::$name);
                }

                impl $key for $name {}
            )+
        }
    };
}

declare_tags!(coord, Coord, CoordTag, CoordKey:
    /// Position along [`Dim::X`]; may be bin edges.
    X => f64,
    /// Position along [`Dim::Y`]; may be bin edges.
    Y => f64,
    /// Position along [`Dim::Z`]; may be bin edges.
    Z => f64,
    /// Time-of-flight axis; may be bin edges.
    Tof => f64,
    SpectrumNumber => i32,
    RowLabel => String,
    DetectorId => i32,
    /// Row filter; zero drops the row.
    Mask => u8,
    DetectorPosition => f64,
    /// Detector indices contributing to each spectrum.
    DetectorGrouping => Vec<usize>,
    DetectorRotation => [f64; 4],
    ComponentPosition => [f64; 3],
    ComponentShape => std::sync::Arc<[f64; 100]>,
    Temperature => f64,
    FuzzyTemperature => crate::value::ValueWithDelta<f64>,
    Time => i64,
    TimeInterval => (i64, i64),
    /// Computed tag; see [`crate::dataset::spectrum_position`].
    SpectrumPosition => f64,
);

declare_tags!(data, Data, DataTag, DataKey:
    Value => f64,
    Variance => f64,
    /// Computed tag; see [`crate::dataset::std_dev`].
    StdDev => f64,
    /// Per-event time-of-flight inside event lists.
    Tof => f64,
    PulseTime => f64,
    Int => i64,
    Str => String,
    History => Vec<String>,
    /// Event lists: one nested dataset per outer element.
    Events => crate::dataset::Dataset,
    Table => crate::dataset::Dataset,
);

declare_tags!(attr, Attr, AttrTag, DataKey:
    ExperimentLog => crate::dataset::Dataset,
);
