//! Shape operations on variables: slicing, concatenation, rebinning,
//! permutation, filtering and splitting.

use rayon::prelude::*;

use crate::dims::{concatenate_dims, Dim, Dimensions};
use crate::error::{Error, Result};
use crate::strides::Region;
use crate::tag::coord;
use crate::values::{ElementKind, Values};
use crate::variable::Variable;

/// Owning point slice: the hyper-slab of `var` at `index` along `dim`, with
/// `dim` removed from the result's dimensions.
pub fn slice(var: &Variable, dim: Dim, index: usize) -> Result<Variable> {
    Ok(var.at(dim, index)?.to_variable())
}

/// Owning range slice along `dim`; other dimensions are unchanged.
pub fn slice_range(var: &Variable, dim: Dim, begin: usize, end: usize) -> Result<Variable> {
    Ok(var.slice(dim, begin, end)?.to_variable())
}

/// Concatenate two variables along `dim`.
///
/// The operands must agree in tag, unit, name, and in the extent of every
/// dimension other than `dim`. An operand that does not span `dim` counts as
/// extent 1; if neither spans it, `dim` is added as the new outermost
/// dimension with extent 2.
pub fn concatenate(a: &Variable, b: &Variable, dim: Dim) -> Result<Variable> {
    if a.tag() != b.tag() {
        return Err(Error::TagMismatch {
            expected: a.element_kind(),
            actual: b.element_kind(),
        });
    }
    if a.unit() != b.unit() {
        return Err(Error::UnitMismatch {
            left: a.unit(),
            right: b.unit(),
        });
    }
    if a.name() != b.name() {
        return Err(Error::MissingPartner {
            tag: b.tag(),
            name: a.name().to_string(),
        });
    }
    let (dims_a, dims_b) = (a.dims(), b.dims());
    for (d, extent) in dims_a.iter() {
        if d == dim {
            continue;
        }
        if dims_b.size(d)? != extent {
            return Err(Error::DimensionMismatch {
                expected: *dims_a,
                actual: *dims_b,
            });
        }
    }
    let rank_a = dims_a.ndim() - usize::from(dims_a.contains_dim(dim));
    let rank_b = dims_b.ndim() - usize::from(dims_b.contains_dim(dim));
    if rank_a != rank_b {
        return Err(Error::DimensionMismatch {
            expected: *dims_a,
            actual: *dims_b,
        });
    }

    let out_dims = concatenate_dims(dims_a, dims_b, dim)?;
    let extent_a = dims_a.size_or_1(dim);
    let extent_b = dims_b.size_or_1(dim);
    let mut values = Values::new_default(a.element_kind(), out_dims.volume());

    let dst_a = Region::full(&out_dims).range(dim, 0, extent_a)?;
    values.copy_region(
        &dst_a,
        dst_a.dims(),
        a.storage(),
        &Region::full(dims_a),
    )?;
    let dst_b = Region::full(&out_dims).range(dim, extent_a, extent_a + extent_b)?;
    values.copy_region(
        &dst_b,
        dst_b.dims(),
        b.storage(),
        &Region::full(dims_b),
    )?;

    Ok(Variable::assemble(
        a.tag(),
        if a.tag().is_coord() {
            None
        } else {
            Some(a.name().to_string())
        },
        a.unit(),
        out_dims,
        values,
    ))
}

/// Split a variable along `dim` at the given positions.
///
/// `positions` must be strictly increasing and bounded by the extent of
/// `dim`; the result holds `positions.len() + 1` variables.
pub fn split(var: &Variable, dim: Dim, positions: &[usize]) -> Result<Vec<Variable>> {
    let extent = var.dims().size(dim)?;
    let mut previous: Option<usize> = None;
    for &p in positions {
        if p > extent || previous.is_some_and(|q| p <= q) {
            return Err(Error::IndexOutOfRange {
                dim,
                index: p,
                extent,
            });
        }
        previous = Some(p);
    }
    if positions.is_empty() {
        return Ok(vec![var.clone()]);
    }
    let mut parts = Vec::with_capacity(positions.len() + 1);
    parts.push(slice_range(var, dim, 0, positions[0])?);
    for pair in positions.windows(2) {
        parts.push(slice_range(var, dim, pair[0], pair[1])?);
    }
    parts.push(slice_range(var, dim, positions[positions.len() - 1], extent)?);
    Ok(parts)
}

/// Rearrange the hyper-slabs of `var` along `dim` so that output slab `i`
/// holds input slab `indices[i]`. `indices` must be a permutation of
/// `0..extent`.
pub fn permute(var: &Variable, dim: Dim, indices: &[usize]) -> Result<Variable> {
    let extent = var.dims().size(dim)?;
    if indices.len() != extent {
        return Err(Error::ShapeMismatch {
            volume: extent,
            len: indices.len(),
        });
    }
    let mut seen = vec![false; extent];
    for &i in indices {
        if i >= extent || seen[i] {
            return Err(Error::IndexOutOfRange {
                dim,
                index: i,
                extent,
            });
        }
        seen[i] = true;
    }

    let dims = *var.dims();
    let mut values = Values::new_default(var.element_kind(), dims.volume());
    for (out_index, &src_index) in indices.iter().enumerate() {
        let dst = Region::full(&dims).range(dim, out_index, out_index + 1)?;
        let src = Region::full(&dims).range(dim, src_index, src_index + 1)?;
        values.copy_region(&dst, dst.dims(), var.storage(), &src)?;
    }
    Ok(Variable::assemble(
        var.tag(),
        if var.tag().is_coord() {
            None
        } else {
            Some(var.name().to_string())
        },
        var.unit(),
        dims,
        values,
    ))
}

/// Drop the hyper-slabs of `var` where the 1-D mask is zero.
pub fn filter(var: &Variable, mask: &Variable) -> Result<Variable> {
    if mask.dims().ndim() != 1 {
        return Err(Error::DimensionMismatch {
            expected: Dimensions::one(Dim::X, mask.len()),
            actual: *mask.dims(),
        });
    }
    let dim = mask.dims().label(0);
    let keep = mask.values::<coord::Mask>()?;

    let removed = keep.iter().filter(|&&flag| flag == 0).count();
    if removed == 0 {
        return Ok(var.clone());
    }

    let mut dims = *var.dims();
    dims.resize(dim, dims.size(dim)? - removed)?;
    let mut values = Values::new_default(var.element_kind(), dims.volume());
    let mut out_index = 0;
    for (in_index, &flag) in keep.iter().enumerate() {
        if flag == 0 {
            continue;
        }
        let dst = Region::full(&dims).range(dim, out_index, out_index + 1)?;
        let src = Region::full(var.dims()).range(dim, in_index, in_index + 1)?;
        values.copy_region(&dst, dst.dims(), var.storage(), &src)?;
        out_index += 1;
    }
    Ok(Variable::assemble(
        var.tag(),
        if var.tag().is_coord() {
            None
        } else {
            Some(var.name().to_string())
        },
        var.unit(),
        dims,
        values,
    ))
}

fn edges_1d<'a>(edges: &'a Variable, dim: Dim) -> Result<&'a [f64]> {
    if edges.dims().ndim() != 1 || edges.dims().label(0) != dim {
        return Err(Error::DimensionMismatch {
            expected: Dimensions::one(dim, edges.len()),
            actual: *edges.dims(),
        });
    }
    let data = edges.values::<coord::X>()?;
    if !data.windows(2).all(|w| w[0] <= w[1]) {
        return Err(Error::NonMonotonicEdges);
    }
    Ok(data)
}

/// Redistribute histogram counts from `old_edges` onto `new_edges`.
///
/// Both edge variables must be 1-D dimension-coordinates of the same tag.
/// Each output bin receives the input counts weighted by the fractional
/// overlap of the bins, so the total is conserved where the edge ranges
/// coincide. Columns along the other dimensions are processed in parallel.
pub fn rebin(var: &Variable, old_edges: &Variable, new_edges: &Variable) -> Result<Variable> {
    if old_edges.tag() != new_edges.tag() {
        return Err(Error::CoordinateMismatch(new_edges.tag()));
    }
    let dim = new_edges
        .tag()
        .coordinate_dimension()
        .ok_or(Error::CoordinateMismatch(new_edges.tag()))?;
    let xold = edges_1d(old_edges, dim)?;
    let xnew = edges_1d(new_edges, dim)?;

    let data_extent = var.dims().size(dim)?;
    if xold.len() != data_extent + 1 {
        return Err(Error::EdgeCountMismatch {
            dim,
            expected: data_extent + 1,
            actual: xold.len(),
        });
    }
    if var.element_kind() != ElementKind::F64 {
        return Err(Error::NonArithmeticType(var.element_kind()));
    }

    let old_n = data_extent;
    let new_n = xnew.len() - 1;
    let mut dims = *var.dims();
    dims.resize(dim, new_n)?;

    // Stride of the rebinned dimension; 1 when it is innermost.
    let stride = var.dims().offset(dim)?;
    let col_in = old_n * stride;
    let col_out = new_n * stride;

    let input = match var.storage() {
        Values::F64(data) => data.as_slice(),
        other => return Err(Error::NonArithmeticType(other.kind())),
    };
    let mut output = vec![0.0; dims.volume()];

    output
        .par_chunks_mut(col_out.max(1))
        .zip(input.par_chunks(col_in.max(1)))
        .for_each(|(out_col, in_col)| {
            for s in 0..stride {
                let mut iold = 0;
                let mut inew = 0;
                while iold < old_n && inew < new_n {
                    let xo_low = xold[iold];
                    let xo_high = xold[iold + 1];
                    let xn_low = xnew[inew];
                    let xn_high = xnew[inew + 1];

                    if xn_high <= xo_low {
                        inew += 1;
                    } else if xo_high <= xn_low {
                        iold += 1;
                    } else {
                        // Fractional overlap of the two bins.
                        let delta = xo_high.min(xn_high) - xo_low.max(xn_low);
                        let owidth = xo_high - xo_low;
                        out_col[inew * stride + s] += in_col[iold * stride + s] * delta / owidth;

                        if xn_high > xo_high {
                            iold += 1;
                        } else {
                            inew += 1;
                        }
                    }
                }
            }
        });

    Ok(Variable::assemble(
        var.tag(),
        if var.tag().is_coord() {
            None
        } else {
            Some(var.name().to_string())
        },
        var.unit(),
        dims,
        Values::F64(output),
    ))
}
