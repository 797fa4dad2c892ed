//! Array primitives shared by the geometric and field-of-view transforms.
//!
//! All helpers take channel-first tensors and act on the spatial axes only.

use crate::fov::Boundary;
use cornucopia_core::{CoreError, Interpolation, Result, Tensor};
use ndarray::{ArrayD, Axis, IxDyn, Slice};

/// Expand a per-axis parameter: one value broadcasts to every axis,
/// otherwise there must be exactly one value per spatial axis.
pub(crate) fn per_axis<T: Clone>(
    values: &[T],
    ndim: usize,
    transform: &str,
    name: &str,
) -> Result<Vec<T>> {
    match values.len() {
        1 => Ok(vec![values[0].clone(); ndim]),
        n if n == ndim => Ok(values.to_vec()),
        n => Err(CoreError::shape_mismatch(
            transform,
            name,
            format!("{n} values given for {ndim} spatial axes"),
        )),
    }
}

/// Reverse the given spatial axes.
pub(crate) fn flip(data: &Tensor, axes: &[usize]) -> Tensor {
    let mut view = data.view();
    for &axis in axes {
        view.invert_axis(Axis(axis + 1));
    }
    view.as_standard_layout().into_owned().into_shared()
}

/// Value at integer spatial coordinates, clamped to the edge.
fn at_clamped(data: &Tensor, channel: usize, coords: &[i64], index: &mut Vec<usize>) -> f32 {
    index.clear();
    index.push(channel);
    for (d, &c) in coords.iter().enumerate() {
        let size = data.shape()[d + 1] as i64;
        index.push(c.clamp(0, size - 1) as usize);
    }
    data[IxDyn(index.as_slice())]
}

/// Shift every spatial axis by `shift` voxels (output(x) = input(x - shift)).
///
/// Out-of-volume samples replicate the edge, so nearest-neighbour
/// resampling only ever produces values already present in the input.
pub(crate) fn translate(data: &Tensor, shift: &[f64], interpolation: Interpolation) -> Tensor {
    let ndim = shift.len();
    let mut out = ArrayD::<f32>::zeros(IxDyn(data.shape()));
    let mut index = Vec::with_capacity(ndim + 1);
    let mut base = vec![0_i64; ndim];
    let mut frac = vec![0.0_f64; ndim];
    let mut corner = vec![0_i64; ndim];

    for (idx, value) in out.indexed_iter_mut() {
        let channel = idx[0];
        for d in 0..ndim {
            let src = idx[d + 1] as f64 - shift[d];
            match interpolation {
                Interpolation::Nearest => base[d] = src.round() as i64,
                Interpolation::Linear => {
                    let floor = src.floor();
                    base[d] = floor as i64;
                    frac[d] = src - floor;
                }
            }
        }

        *value = match interpolation {
            Interpolation::Nearest => at_clamped(data, channel, &base, &mut index),
            Interpolation::Linear => {
                let mut acc = 0.0_f64;
                for mask in 0..(1_usize << ndim) {
                    let mut weight = 1.0_f64;
                    for d in 0..ndim {
                        let upper = (mask >> d) & 1 == 1;
                        corner[d] = base[d] + i64::from(upper);
                        weight *= if upper { frac[d] } else { 1.0 - frac[d] };
                    }
                    if weight != 0.0 {
                        acc += weight * f64::from(at_clamped(data, channel, &corner, &mut index));
                    }
                }
                acc as f32
            }
        };
    }
    out.into_shared()
}

/// Remove `before[d]` and `after[d]` voxels from the ends of every spatial
/// axis. The caller guarantees something is left.
pub(crate) fn crop(data: &Tensor, before: &[usize], after: &[usize]) -> Tensor {
    let mut view = data.view();
    for (d, (&b, &a)) in before.iter().zip(after).enumerate() {
        let size = view.len_of(Axis(d + 1));
        view.slice_axis_inplace(Axis(d + 1), Slice::from(b..size - a));
    }
    view.as_standard_layout().into_owned().into_shared()
}

/// Source index for output coordinate `i` of an axis of `extent` voxels, or
/// `None` where the constant fill applies.
fn source_index(i: i64, extent: i64, boundary: Boundary) -> Option<usize> {
    if extent <= 0 {
        return None;
    }
    let j = match boundary {
        Boundary::Constant => return (0..extent).contains(&i).then_some(i as usize),
        Boundary::Replicate => i.clamp(0, extent - 1),
        Boundary::Dct2 => {
            let m = i.rem_euclid(2 * extent);
            if m < extent {
                m
            } else {
                2 * extent - 1 - m
            }
        }
        Boundary::Dct1 => {
            if extent == 1 {
                return Some(0);
            }
            let period = 2 * (extent - 1);
            let m = i.rem_euclid(period);
            if m < extent {
                m
            } else {
                period - m
            }
        }
        Boundary::Dft => i.rem_euclid(extent),
    };
    Some(j as usize)
}

/// Extract a box of `size` voxels starting at `first`, which may lie
/// outside the volume. Outside voxels follow `boundary`; `fill` is used by
/// [`Boundary::Constant`] only.
pub(crate) fn extract(
    data: &Tensor,
    first: &[i64],
    size: &[usize],
    boundary: Boundary,
    fill: f32,
) -> Tensor {
    let mut current = data.to_owned();
    for (d, (&start, &len)) in first.iter().zip(size).enumerate() {
        let axis = Axis(d + 1);
        let extent = current.len_of(axis) as i64;
        let mut shape = current.shape().to_vec();
        shape[d + 1] = len;
        let mut next = ArrayD::from_elem(IxDyn(&shape), fill);
        for j in 0..len {
            if let Some(src) = source_index(start + j as i64, extent, boundary) {
                next.index_axis_mut(axis, j).assign(&current.index_axis(axis, src));
            }
        }
        current = next;
    }
    current.into_shared()
}

/// Grow every spatial axis by `before[d]` and `after[d]` voxels.
pub(crate) fn pad(
    data: &Tensor,
    before: &[usize],
    after: &[usize],
    boundary: Boundary,
    fill: f32,
) -> Tensor {
    let first: Vec<i64> = before.iter().map(|&b| -(b as i64)).collect();
    let size: Vec<usize> = data.shape()[1..]
        .iter()
        .zip(before.iter().zip(after))
        .map(|(&s, (&b, &a))| s + b + a)
        .collect();
    extract(data, &first, &size, boundary, fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn flat(t: &Tensor) -> Vec<f32> {
        t.iter().copied().collect()
    }

    fn ramp() -> Tensor {
        // (C=1, X=4)
        array![[0.0_f32, 1.0, 2.0, 3.0]].into_dyn().into_shared()
    }

    #[test]
    fn test_per_axis() {
        assert_eq!(per_axis(&[2], 3, "T", "x").unwrap(), vec![2, 2, 2]);
        assert_eq!(per_axis(&[1, 2], 2, "T", "x").unwrap(), vec![1, 2]);
        assert!(matches!(
            per_axis(&[1, 2], 3, "T", "x"),
            Err(CoreError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_flip() {
        let out = flip(&ramp(), &[0]);
        assert_eq!(flat(&out), [3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_translate_integer_shift_is_exact() {
        let lin = translate(&ramp(), &[1.0], Interpolation::Linear);
        let near = translate(&ramp(), &[1.0], Interpolation::Nearest);
        assert_eq!(flat(&lin), [0.0, 0.0, 1.0, 2.0]);
        assert_eq!(near, lin);
    }

    #[test]
    fn test_translate_fractional() {
        let lin = translate(&ramp(), &[0.5], Interpolation::Linear);
        assert_eq!(flat(&lin), [0.0, 0.5, 1.5, 2.5]);
        let near = translate(&ramp(), &[0.4], Interpolation::Nearest);
        assert_eq!(flat(&near), [0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_translate_2d_nearest_keeps_values() {
        let labels = Array2::from_shape_fn((4, 4), |(i, j)| ((i + j) % 3) as f32)
            .insert_axis(Axis(0))
            .into_dyn()
            .into_shared();
        let out = translate(&labels, &[0.7, -1.3], Interpolation::Nearest);
        assert!(out.iter().all(|v| [0.0, 1.0, 2.0].contains(v)));
    }

    #[test]
    fn test_crop_and_pad() {
        let cropped = crop(&ramp(), &[1], &[1]);
        assert_eq!(flat(&cropped), [1.0, 2.0]);
        let cropped = crop(&ramp(), &[0], &[3]);
        assert_eq!(flat(&cropped), [0.0]);

        let padded = pad(&ramp(), &[1], &[2], Boundary::Constant, -1.0);
        assert_eq!(
            flat(&padded),
            [-1.0, 0.0, 1.0, 2.0, 3.0, -1.0, -1.0]
        );
    }

    #[test]
    fn test_extract_partially_outside() {
        let out = extract(&ramp(), &[2], &[4], Boundary::Constant, 9.0);
        assert_eq!(flat(&out), [2.0, 3.0, 9.0, 9.0]);
        let outside = extract(&ramp(), &[10], &[2], Boundary::Constant, 9.0);
        assert_eq!(flat(&outside), [9.0, 9.0]);
    }

    #[test]
    fn test_boundaries() {
        let around = |boundary| flat(&extract(&ramp(), &[-2], &[8], boundary, 9.0));
        assert_eq!(around(Boundary::Constant), [9.0, 9.0, 0.0, 1.0, 2.0, 3.0, 9.0, 9.0]);
        assert_eq!(around(Boundary::Replicate), [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
        assert_eq!(around(Boundary::Dct2), [1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 2.0]);
        assert_eq!(around(Boundary::Dct1), [2.0, 1.0, 0.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
        assert_eq!(around(Boundary::Dft), [2.0, 3.0, 0.0, 1.0, 2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn test_boundaries_far_outside() {
        let far = flat(&extract(&ramp(), &[-9], &[2], Boundary::Dct2, 0.0));
        // period 8: -9 -> 7 -> 0, -8 -> 0
        assert_eq!(far, [0.0, 0.0]);
        let single = array![[5.0_f32]].into_dyn().into_shared();
        assert_eq!(flat(&extract(&single, &[-3], &[3], Boundary::Dct1, 0.0)), [5.0; 3]);
    }

    #[test]
    fn test_extract_2d_mirrors_each_axis() {
        let data = Array2::from_shape_fn((2, 3), |(i, j)| (i * 3 + j) as f32)
            .insert_axis(Axis(0))
            .into_dyn()
            .into_shared();
        let out = extract(&data, &[-1, -1], &[4, 5], Boundary::Replicate, 0.0);
        assert_eq!(out.shape(), &[1, 4, 5]);
        assert_eq!(out[[0, 0, 0]], 0.0);
        assert_eq!(out[[0, 3, 4]], 5.0);
        assert_eq!(out[[0, 2, 2]], 4.0);
    }
}
