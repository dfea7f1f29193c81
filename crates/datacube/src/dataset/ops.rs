//! Shape operations on whole datasets, plus derived quantities for the
//! computed tags.

use super::Dataset;
use crate::dims::{Dim, Dimensions};
use crate::error::{Error, Result};
use crate::ops as var_ops;
use crate::tag::{coord, data, CoordTag, DataTag, Tag, TagKey};
use crate::values::Values;
use crate::variable::Variable;

/// Owning point slice: every variable spanning `dim` is reduced to its slab
/// at `index` (coordinates become scalars), other variables are copied.
pub fn slice(d: &Dataset, dim: Dim, index: usize) -> Result<Dataset> {
    let mut out = Dataset::new();
    for var in d.iter() {
        let v = if var.dims().contains_dim(dim) {
            var_ops::slice(var, dim, index)?
        } else {
            var.clone()
        };
        out.insert(v)?;
    }
    Ok(out)
}

/// Owning range slice along `dim`.
pub fn slice_range(d: &Dataset, dim: Dim, begin: usize, end: usize) -> Result<Dataset> {
    let mut out = Dataset::new();
    for var in d.iter() {
        let v = if var.dims().contains_dim(dim) {
            var_ops::slice_range(var, dim, begin, end)?
        } else {
            var.clone()
        };
        out.insert(v)?;
    }
    Ok(out)
}

/// Split a dataset along `dim` at the given positions.
pub fn split(d: &Dataset, dim: Dim, positions: &[usize]) -> Result<Vec<Dataset>> {
    let extent = d.dims().size(dim)?;
    let mut bounds = Vec::with_capacity(positions.len() + 2);
    bounds.push(0);
    bounds.extend_from_slice(positions);
    bounds.push(extent);
    let mut parts = Vec::with_capacity(bounds.len() - 1);
    for pair in bounds.windows(2) {
        parts.push(slice_range(d, dim, pair[0], pair[1])?);
    }
    Ok(parts)
}

/// Concatenate two datasets along `dim`.
///
/// Variables pair by identity. Pairs spanning `dim` concatenate; coordinates
/// not spanning it must compare equal; data not spanning it is lifted into
/// an extent-2 `dim`. A bin-edge coordinate along `dim` drops the partner's
/// leading edge so the result stays a valid edge axis.
pub fn concatenate(d1: &Dataset, d2: &Dataset, dim: Dim) -> Result<Dataset> {
    for var2 in d2.iter() {
        if d1.position(var2.tag(), var2.name()).is_none() {
            return Err(Error::MissingPartner {
                tag: var2.tag(),
                name: var2.name().to_string(),
            });
        }
    }
    let mut out = Dataset::new();
    for var1 in d1.iter() {
        let j = d2
            .position(var1.tag(), var1.name())
            .ok_or(Error::MissingPartner {
                tag: var1.tag(),
                name: var1.name().to_string(),
            })?;
        let var2 = &d2[j];
        let spans = var1.dims().contains_dim(dim) || var2.dims().contains_dim(dim);
        let joined = if var1.tag().is_coord() && !spans {
            if var1 != var2 {
                return Err(Error::CoordinateMismatch(var1.tag()));
            }
            var1.clone()
        } else if d1.is_edge(var1) && var1.tag().coordinate_dimension() == Some(dim) {
            let trimmed = var_ops::slice_range(var2, dim, 1, var2.dims().size(dim)?)?;
            var_ops::concatenate(var1, &trimmed, dim)?
        } else {
            var_ops::concatenate(var1, var2, dim)?
        };
        out.insert(joined)?;
    }
    Ok(out)
}

/// Rebin every data variable spanning the coordinate's dimension onto
/// `new_coord`, replacing the old coordinate.
pub fn rebin(d: &Dataset, new_coord: &Variable) -> Result<Dataset> {
    let tag = new_coord.tag();
    let dim = tag
        .coordinate_dimension()
        .ok_or(Error::CoordinateMismatch(tag))?;
    let old_idx = d.find_unique(tag)?;
    let old_coord = &d[old_idx];

    let mut out = Dataset::new();
    for (i, var) in d.iter().enumerate() {
        let v = if i == old_idx {
            new_coord.clone()
        } else if var.dims().contains_dim(dim) {
            if var.tag().is_coord() {
                return Err(Error::CoordinateMismatch(var.tag()));
            }
            var_ops::rebin(var, old_coord, new_coord)?
        } else {
            var.clone()
        };
        out.insert(v)?;
    }
    Ok(out)
}

fn sort_permutation(key: &Variable) -> Result<Vec<usize>> {
    let mut perm: Vec<usize> = (0..key.len()).collect();
    match key.storage() {
        Values::F64(data) => perm.sort_by(|&a, &b| data[a].total_cmp(&data[b])),
        Values::I32(data) => perm.sort_by(|&a, &b| data[a].cmp(&data[b])),
        Values::I64(data) => perm.sort_by(|&a, &b| data[a].cmp(&data[b])),
        Values::U8(data) => perm.sort_by(|&a, &b| data[a].cmp(&data[b])),
        Values::Str(data) => perm.sort_by(|&a, &b| data[a].cmp(&data[b])),
        other => return Err(Error::NonArithmeticType(other.kind())),
    }
    Ok(perm)
}

/// Sort a dataset by the variable with the given identity (stable).
///
/// The key must be 1-D; every variable spanning the key's dimension is
/// permuted accordingly.
pub fn sort(d: &Dataset, tag: Tag, name: &str) -> Result<Dataset> {
    let key = &d[d.find(tag, name)?];
    if key.dims().ndim() != 1 {
        return Err(Error::DimensionMismatch {
            expected: Dimensions::one(Dim::Row, key.len()),
            actual: *key.dims(),
        });
    }
    let dim = key.dims().label(0);
    let perm = sort_permutation(key)?;

    let mut out = Dataset::new();
    for var in d.iter() {
        let v = if var.dims().contains_dim(dim) {
            var_ops::permute(var, dim, &perm)?
        } else {
            var.clone()
        };
        out.insert(v)?;
    }
    Ok(out)
}

/// Remove the rows where the 1-D mask is zero from every variable spanning
/// the mask's dimension.
pub fn filter(d: &Dataset, select: &Variable) -> Result<Dataset> {
    if select.dims().ndim() != 1 {
        return Err(Error::DimensionMismatch {
            expected: Dimensions::one(Dim::Row, select.len()),
            actual: *select.dims(),
        });
    }
    let dim = select.dims().label(0);
    let mut out = Dataset::new();
    for var in d.iter() {
        let v = if var.dims().contains_dim(dim) {
            var_ops::filter(var, select)?
        } else {
            var.clone()
        };
        out.insert(v)?;
    }
    Ok(out)
}

/// Standard deviations for the `(Variance, name)` variable, as a computed
/// `Data::StdDev` variable. Not storable in a dataset.
pub fn std_dev(d: &Dataset, name: &str) -> Result<Variable> {
    let variance = &d[d.find(Tag::Data(DataTag::Variance), name)?];
    let values: Vec<f64> = variance
        .values::<data::Variance>()?
        .iter()
        .map(|v| v.sqrt())
        .collect();
    Variable::data::<data::StdDev>(name, *variance.dims(), values)
}

/// Mean detector position per spectrum, as a computed
/// `Coord::SpectrumPosition` variable. Not storable in a dataset.
pub fn spectrum_position(d: &Dataset) -> Result<Variable> {
    let positions_var = &d[d.find_unique(Tag::Coord(CoordTag::DetectorPosition))?];
    let grouping_var = &d[d.find_unique(Tag::Coord(CoordTag::DetectorGrouping))?];
    let positions = positions_var.values::<coord::DetectorPosition>()?;
    let groups = grouping_var.values::<coord::DetectorGrouping>()?;

    let mut means = Vec::with_capacity(groups.len());
    for group in groups {
        if group.is_empty() {
            means.push(f64::NAN);
            continue;
        }
        let mut sum = 0.0;
        for &detector in group {
            sum += positions.get(detector).ok_or(Error::IndexOutOfRange {
                dim: Dim::Detector,
                index: detector,
                extent: positions.len(),
            })?;
        }
        means.push(sum / group.len() as f64);
    }
    Ok(Variable::assemble(
        <coord::SpectrumPosition as TagKey>::TAG,
        None,
        <coord::SpectrumPosition as TagKey>::TAG.default_unit(),
        *grouping_var.dims(),
        Values::F64(means),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::coord;

    fn dims(pairs: &[(Dim, usize)]) -> Dimensions {
        Dimensions::new(pairs).unwrap()
    }

    fn table() -> Dataset {
        let mut t = Dataset::new();
        t.insert_coord::<coord::RowLabel>(
            dims(&[(Dim::Row, 3)]),
            vec!["a".into(), "b".into(), "c".into()],
        )
        .unwrap();
        t.insert_data::<data::Value>("data", dims(&[(Dim::Row, 3)]), vec![1.0, -2.0, 3.0])
            .unwrap();
        t.insert_data::<data::Str>(
            "comment",
            dims(&[(Dim::Row, 3)]),
            vec![String::new(), "why is this negative?".into(), String::new()],
        )
        .unwrap();
        t
    }

    #[test]
    fn sort_by_column_reorders_all_columns() {
        let sorted = sort(&table(), Tag::Data(DataTag::Value), "data").unwrap();
        assert_eq!(
            sorted.values::<coord::RowLabel>().unwrap(),
            &["b".to_string(), "a".to_string(), "c".to_string()]
        );
        assert_eq!(
            sorted.values_named::<data::Value>("data").unwrap(),
            &[-2.0, 1.0, 3.0]
        );
        assert_eq!(
            sorted.values_named::<data::Str>("comment").unwrap(),
            &[
                "why is this negative?".to_string(),
                String::new(),
                String::new()
            ]
        );
    }

    #[test]
    fn sort_is_stable() {
        let mut t = Dataset::new();
        t.insert_data::<data::Value>("key", dims(&[(Dim::Row, 4)]), vec![1.0, 0.0, 1.0, 0.0])
            .unwrap();
        t.insert_data::<data::Int>("payload", dims(&[(Dim::Row, 4)]), vec![0, 1, 2, 3])
            .unwrap();
        let sorted = sort(&t, Tag::Data(DataTag::Value), "key").unwrap();
        assert_eq!(
            sorted.values_named::<data::Int>("payload").unwrap(),
            &[1, 3, 0, 2]
        );
    }

    #[test]
    fn slice_point_keeps_scalar_coords() {
        let row = slice(&table(), Dim::Row, 1).unwrap();
        assert_eq!(row.values::<coord::RowLabel>().unwrap(), &["b".to_string()]);
        assert_eq!(row.values_named::<data::Value>("data").unwrap(), &[-2.0]);
    }

    #[test]
    fn concat_slice_and_split_roundtrip() {
        let t = table();
        let merged = concatenate(&t, &t, Dim::Row).unwrap();
        assert_eq!(merged.dims().size(Dim::Row).unwrap(), 6);

        let rows = slice_range(&merged, Dim::Row, 1, 4).unwrap();
        assert_eq!(
            rows.values::<coord::RowLabel>().unwrap(),
            &["b".to_string(), "c".to_string(), "a".to_string()]
        );

        let parts = split(&merged, Dim::Row, &[3]).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], t);
        assert_eq!(parts[1], t);
    }

    #[test]
    fn concat_windows_removes_middle_rows() {
        let t = table();
        let merged = concatenate(&t, &t, Dim::Row).unwrap();
        let head = slice_range(&merged, Dim::Row, 0, 2).unwrap();
        let tail = slice_range(&merged, Dim::Row, 4, 6).unwrap();
        let recombined = concatenate(&head, &tail, Dim::Row).unwrap();
        assert_eq!(
            recombined.values::<coord::RowLabel>().unwrap(),
            &[
                "a".to_string(),
                "b".to_string(),
                "b".to_string(),
                "c".to_string()
            ]
        );
    }

    #[test]
    fn concat_requires_equal_off_axis_coords() {
        let mut a = Dataset::new();
        a.insert_coord::<coord::X>(dims(&[(Dim::X, 2)]), vec![0.0, 1.0])
            .unwrap();
        a.insert_data::<data::Value>("v", dims(&[(Dim::Y, 1), (Dim::X, 2)]), vec![1.0, 2.0])
            .unwrap();
        let mut b = a.clone();
        let joined = concatenate(&a, &b, Dim::Y).unwrap();
        assert_eq!(joined.dims().size(Dim::Y).unwrap(), 2);
        assert_eq!(joined.values::<coord::X>().unwrap(), &[0.0, 1.0]);

        b.values_mut::<coord::X>().unwrap()[0] = 9.0;
        assert!(matches!(
            concatenate(&a, &b, Dim::Y).unwrap_err(),
            Error::CoordinateMismatch(Tag::Coord(CoordTag::X))
        ));
    }

    #[test]
    fn concat_edge_coordinate_drops_duplicate_edge() {
        let mut a = Dataset::new();
        a.insert_coord::<coord::Tof>(dims(&[(Dim::Tof, 3)]), vec![0.0, 1.0, 2.0])
            .unwrap();
        a.insert_data::<data::Value>("counts", dims(&[(Dim::Tof, 2)]), vec![10.0, 20.0])
            .unwrap();
        let mut b = Dataset::new();
        b.insert_coord::<coord::Tof>(dims(&[(Dim::Tof, 3)]), vec![2.0, 3.0, 4.0])
            .unwrap();
        b.insert_data::<data::Value>("counts", dims(&[(Dim::Tof, 2)]), vec![30.0, 40.0])
            .unwrap();

        let joined = concatenate(&a, &b, Dim::Tof).unwrap();
        assert_eq!(joined.dims().size(Dim::Tof).unwrap(), 4);
        assert_eq!(
            joined.values::<coord::Tof>().unwrap(),
            &[0.0, 1.0, 2.0, 3.0, 4.0]
        );
        assert_eq!(
            joined.values_named::<data::Value>("counts").unwrap(),
            &[10.0, 20.0, 30.0, 40.0]
        );
    }

    #[test]
    fn rebin_replaces_coordinate_and_data() {
        let mut d = Dataset::new();
        d.insert_coord::<coord::X>(dims(&[(Dim::X, 3)]), vec![1.0, 2.0, 3.0])
            .unwrap();
        d.insert_data::<data::Value>("counts", dims(&[(Dim::X, 2)]), vec![1.0, 2.0])
            .unwrap();
        let new_coord = Variable::coord::<coord::X>(dims(&[(Dim::X, 2)]), vec![1.0, 3.0]).unwrap();
        let rebinned = rebin(&d, &new_coord).unwrap();
        assert_eq!(rebinned.dims().size(Dim::X).unwrap(), 1);
        assert_eq!(
            rebinned.values_named::<data::Value>("counts").unwrap(),
            &[3.0]
        );
        assert_eq!(rebinned.values::<coord::X>().unwrap(), &[1.0, 3.0]);
    }

    #[test]
    fn filter_drops_rows_everywhere() {
        let t = table();
        let mask = Variable::coord::<coord::Mask>(dims(&[(Dim::Row, 3)]), vec![1, 0, 1]).unwrap();
        let filtered = filter(&t, &mask).unwrap();
        assert_eq!(filtered.dims().size(Dim::Row).unwrap(), 2);
        assert_eq!(
            filtered.values::<coord::RowLabel>().unwrap(),
            &["a".to_string(), "c".to_string()]
        );
        assert_eq!(
            filtered.values_named::<data::Value>("data").unwrap(),
            &[1.0, 3.0]
        );
    }

    #[test]
    fn std_dev_is_sqrt_of_variance() {
        let mut d = Dataset::new();
        d.insert_data::<data::Value>("s", dims(&[(Dim::X, 2)]), vec![1.0, 2.0])
            .unwrap();
        d.insert_data::<data::Variance>("s", dims(&[(Dim::X, 2)]), vec![4.0, 9.0])
            .unwrap();
        let sd = std_dev(&d, "s").unwrap();
        assert_eq!(sd.values::<data::StdDev>().unwrap(), &[2.0, 3.0]);
        // Computed variables cannot be stored.
        assert!(matches!(
            d.insert(sd).unwrap_err(),
            Error::ComputedTagNotStorable(Tag::Data(DataTag::StdDev))
        ));
    }

    #[test]
    fn spectrum_position_averages_groups() {
        let mut d = Dataset::new();
        d.insert_coord::<coord::DetectorPosition>(
            dims(&[(Dim::Detector, 4)]),
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        d.insert_coord::<coord::DetectorGrouping>(
            dims(&[(Dim::Spectrum, 2)]),
            vec![vec![0, 1], vec![2, 3]],
        )
        .unwrap();
        let pos = spectrum_position(&d).unwrap();
        assert_eq!(pos.values::<coord::SpectrumPosition>().unwrap(), &[1.5, 3.5]);
        assert!(matches!(
            d.insert(pos).unwrap_err(),
            Error::ComputedTagNotStorable(_)
        ));
    }
}
