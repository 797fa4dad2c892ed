//! Field-of-view transforms: crop, pad, patch extraction and power-of-two
//! padding.
//!
//! Per-axis settings take either one value for every axis or one value per
//! spatial axis. These transforms change the spatial shape, so they always
//! act on every member of a bundle: a bundle never leaves them with members
//! of different shapes.

use crate::geometric::ALL_KINDS;
use crate::resample;
use cornucopia_core::{
    Bundle, CoreError, Distribution, ParameterSpec, Params, Result, Sampler, Targets, Transform,
};
use serde::{Deserialize, Serialize};

/// How voxels outside the volume are filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// A constant fill value.
    Constant,
    /// Repeat the edge voxel.
    Replicate,
    /// Mirror including the edge voxel: `c b a | a b c | c b a`.
    #[default]
    Dct2,
    /// Mirror about the edge voxel: `c b | a b c | b a`.
    Dct1,
    /// Periodic: `a b c | a b c | a b c`.
    Dft,
}

/// Unit of crop and pad amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Voxels.
    #[default]
    Vox,
    /// Fraction of the axis length, rounded up to whole voxels.
    Pct,
}

/// Which ends of an axis an amount applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Both ends, by the same amount.
    #[default]
    Both,
    /// The start of the axis only.
    Pre,
    /// The end of the axis only.
    Post,
    /// Amounts are `(before, after)` pairs: one pair for every axis, or one
    /// pair per axis.
    Explicit,
}

/// Per-axis `(before, after)` voxel counts.
fn resolve_amounts(
    transform: &str,
    amount: &[f64],
    unit: Unit,
    side: Side,
    shape: &[usize],
) -> Result<Vec<(usize, usize)>> {
    let pairs: Vec<(f64, f64)> = if side == Side::Explicit {
        if amount.len() % 2 != 0 {
            return Err(CoreError::shape_mismatch(
                transform,
                "amount",
                format!("explicit amounts come in (before, after) pairs, got {} values", amount.len()),
            ));
        }
        let pairs: Vec<(f64, f64)> = amount.chunks_exact(2).map(|c| (c[0], c[1])).collect();
        resample::per_axis(&pairs, shape.len(), transform, "amount")?
    } else {
        resample::per_axis(amount, shape.len(), transform, "amount")?
            .into_iter()
            .map(|a| match side {
                Side::Pre => (a, 0.0),
                Side::Post => (0.0, a),
                Side::Both | Side::Explicit => (a, a),
            })
            .collect()
    };
    pairs
        .iter()
        .zip(shape)
        .map(|(&(before, after), &extent)| {
            Ok((
                voxels(transform, before, unit, extent)?,
                voxels(transform, after, unit, extent)?,
            ))
        })
        .collect()
}

fn voxels(transform: &str, amount: f64, unit: Unit, extent: usize) -> Result<usize> {
    let count = match unit {
        Unit::Vox => amount,
        Unit::Pct => (amount * extent as f64).ceil(),
    };
    if !(count.is_finite() && count >= 0.0 && count.fract() == 0.0) {
        return Err(CoreError::configuration(
            transform,
            format!("amount {amount} is not a whole, non-negative number of voxels"),
        ));
    }
    Ok(count as usize)
}

/// Origin of a patch of `size` voxels in an axis of `extent` voxels, for a
/// relative centre in `[-1, 1]`. `-1` aligns the patch with the start of the
/// axis and `1` with its end; a patch larger than the axis overhangs.
fn patch_origin(extent: usize, size: usize, centre: f64) -> i64 {
    let slack = extent as f64 - size as f64;
    (slack * (centre + 1.0) / 2.0).round() as i64
}

fn extract_patch(
    transform: &str,
    bundle: &Bundle,
    size: &[usize],
    centre: &[f64],
    boundary: Boundary,
    fill: f32,
) -> Result<Bundle> {
    let Some(shape) = bundle.spatial_shape(transform)? else {
        return Ok(bundle.clone());
    };
    let size = resample::per_axis(size, shape.len(), transform, "size")?;
    let centre = resample::per_axis(centre, shape.len(), transform, "centre")?;
    if let Some(c) = centre.iter().find(|c| !(-1.0..=1.0).contains(*c)) {
        return Err(CoreError::configuration(
            transform,
            format!("relative centre {c} outside [-1, 1]"),
        ));
    }
    let first: Vec<i64> = shape
        .iter()
        .zip(&size)
        .zip(&centre)
        .map(|((&extent, &s), &c)| patch_origin(extent, s, c))
        .collect();
    tracing::trace!(transform, ?first, ?size, ?boundary, "extracting patch");
    bundle.map_members(transform, &Targets::All, ALL_KINDS, |_, member| {
        Ok(resample::extract(member.data(), &first, &size, boundary, fill))
    })
}

/// Configuration for a crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Amount removed (one value, one per axis, or pairs for
    /// [`Side::Explicit`]).
    pub amount: Vec<f64>,
    /// Unit of `amount`.
    pub unit: Unit,
    /// Ends of each axis to crop.
    pub side: Side,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            amount: vec![1.0],
            unit: Unit::Vox,
            side: Side::Both,
        }
    }
}

/// Remove a fixed amount from the ends of each spatial axis.
#[derive(Debug, Clone)]
pub struct Crop {
    config: CropConfig,
}

impl Crop {
    /// Crop `amount` voxels per side (one value, or one per axis).
    #[must_use]
    pub fn new(amount: Vec<usize>) -> Self {
        Self::from_config(CropConfig {
            amount: amount.into_iter().map(|a| a as f64).collect(),
            ..Default::default()
        })
    }

    /// Crop a fraction of each axis per side.
    #[must_use]
    pub fn pct(fraction: Vec<f64>) -> Self {
        Self::from_config(CropConfig {
            amount: fraction,
            unit: Unit::Pct,
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: CropConfig) -> Self {
        Self { config }
    }

    /// Set the cropped ends.
    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.config.side = side;
        self
    }
}

impl Transform for Crop {
    fn sample(&self, _sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::empty())
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        params.expect_leaf(self.name())?;
        let Some(shape) = bundle.spatial_shape(self.name())? else {
            return Ok(bundle.clone());
        };
        let config = &self.config;
        let amounts = resolve_amounts(self.name(), &config.amount, config.unit, config.side, &shape)?;
        if let Some((extent, (b, a))) = shape.iter().zip(&amounts).find(|&(&extent, &(b, a))| b + a >= extent) {
            return Err(CoreError::shape_mismatch(
                self.name(),
                "amount",
                format!("cropping {b} + {a} voxels leaves nothing of an axis of {extent}"),
            ));
        }
        let (before, after): (Vec<usize>, Vec<usize>) = amounts.into_iter().unzip();
        bundle.map_members(self.name(), &Targets::All, ALL_KINDS, |_, member| {
            Ok(resample::crop(member.data(), &before, &after))
        })
    }

    fn name(&self) -> &str {
        "Crop"
    }
}

/// Configuration for padding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadConfig {
    /// Amount added (one value, one per axis, or pairs for
    /// [`Side::Explicit`]).
    pub amount: Vec<f64>,
    /// Unit of `amount`.
    pub unit: Unit,
    /// Ends of each axis to pad.
    pub side: Side,
    /// How new voxels are filled.
    pub boundary: Boundary,
    /// Fill value for [`Boundary::Constant`].
    pub fill: f32,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            amount: vec![1.0],
            unit: Unit::Vox,
            side: Side::Both,
            boundary: Boundary::Dct2,
            fill: 0.0,
        }
    }
}

/// Grow each spatial axis by a fixed amount.
#[derive(Debug, Clone)]
pub struct Pad {
    config: PadConfig,
}

impl Pad {
    /// Pad `amount` voxels per side (one value, or one per axis), mirroring
    /// the volume.
    #[must_use]
    pub fn new(amount: Vec<usize>) -> Self {
        Self::from_config(PadConfig {
            amount: amount.into_iter().map(|a| a as f64).collect(),
            ..Default::default()
        })
    }

    /// Pad a fraction of each axis per side.
    #[must_use]
    pub fn pct(fraction: Vec<f64>) -> Self {
        Self::from_config(PadConfig {
            amount: fraction,
            unit: Unit::Pct,
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: PadConfig) -> Self {
        Self { config }
    }

    /// Set the padded ends.
    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.config.side = side;
        self
    }

    /// Set the boundary mode.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.config.boundary = boundary;
        self
    }

    /// Pad with a constant value.
    #[must_use]
    pub fn with_fill(mut self, fill: f32) -> Self {
        self.config.boundary = Boundary::Constant;
        self.config.fill = fill;
        self
    }
}

impl Transform for Pad {
    fn sample(&self, _sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::empty())
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        params.expect_leaf(self.name())?;
        let Some(shape) = bundle.spatial_shape(self.name())? else {
            return Ok(bundle.clone());
        };
        let config = &self.config;
        let amounts = resolve_amounts(self.name(), &config.amount, config.unit, config.side, &shape)?;
        let (before, after): (Vec<usize>, Vec<usize>) = amounts.into_iter().unzip();
        bundle.map_members(self.name(), &Targets::All, ALL_KINDS, |_, member| {
            Ok(resample::pad(member.data(), &before, &after, config.boundary, config.fill))
        })
    }

    fn name(&self) -> &str {
        "Pad"
    }
}

/// Configuration for fixed patch extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Patch size (one value, or one per axis).
    pub size: Vec<usize>,
    /// Relative patch centre in `[-1, 1]` (one value, or one per axis).
    pub centre: Vec<f64>,
    /// How voxels outside the volume are filled.
    pub boundary: Boundary,
    /// Fill value for [`Boundary::Constant`].
    pub fill: f32,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            size: vec![64],
            centre: vec![0.0],
            boundary: Boundary::Dct2,
            fill: 0.0,
        }
    }
}

/// Extract a fixed-size patch at a fixed relative position.
#[derive(Debug, Clone)]
pub struct Patch {
    config: PatchConfig,
}

impl Patch {
    /// Centred patch of the given size.
    #[must_use]
    pub fn new(size: Vec<usize>) -> Self {
        Self::from_config(PatchConfig {
            size,
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: PatchConfig) -> Self {
        Self { config }
    }

    /// Set the relative centre.
    #[must_use]
    pub fn with_centre(mut self, centre: Vec<f64>) -> Self {
        self.config.centre = centre;
        self
    }

    /// Set the boundary mode.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.config.boundary = boundary;
        self
    }

    /// Fill with a constant value where the patch leaves the volume.
    #[must_use]
    pub fn with_fill(mut self, fill: f32) -> Self {
        self.config.boundary = Boundary::Constant;
        self.config.fill = fill;
        self
    }
}

impl Transform for Patch {
    fn sample(&self, _sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::empty())
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        params.expect_leaf(self.name())?;
        extract_patch(
            self.name(),
            bundle,
            &self.config.size,
            &self.config.centre,
            self.config.boundary,
            self.config.fill,
        )
    }

    fn name(&self) -> &str {
        "Patch"
    }
}

/// Configuration for random patch extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomPatchConfig {
    /// Patch size (one value, or one per axis).
    pub size: Vec<usize>,
    /// Number of spatial axes of the data.
    pub ndim: usize,
    /// How voxels outside the volume are filled when the patch is larger.
    pub boundary: Boundary,
    /// Fill value for [`Boundary::Constant`].
    pub fill: f32,
}

impl Default for RandomPatchConfig {
    fn default() -> Self {
        Self {
            size: vec![64],
            ndim: 3,
            boundary: Boundary::Dct2,
            fill: 0.0,
        }
    }
}

/// Extract a fixed-size patch at a random position.
///
/// The relative centre is drawn uniformly in `[-1, 1]` per axis, so a patch
/// that fits always lies inside the volume.
#[derive(Debug, Clone)]
pub struct RandomPatch {
    config: RandomPatchConfig,
}

impl RandomPatch {
    /// Random patches of `size` over `ndim` spatial axes.
    #[must_use]
    pub fn new(size: Vec<usize>, ndim: usize) -> Self {
        Self::from_config(RandomPatchConfig {
            size,
            ndim,
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: RandomPatchConfig) -> Self {
        Self { config }
    }

    /// Set the boundary mode.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.config.boundary = boundary;
        self
    }

    /// Parameters this transform samples.
    #[must_use]
    pub fn parameter_spec(&self) -> ParameterSpec {
        ParameterSpec::new().with_shape(
            "centre",
            Distribution::symmetric(1.0),
            vec![self.config.ndim],
        )
    }
}

impl Transform for RandomPatch {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::leaf(self.parameter_spec().sample(self.name(), sampler)?))
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let centre = params.expect_leaf(self.name())?.floats("centre")?;
        crate::geometric::check_rank(bundle, self.name(), "centre", centre.len())?;
        extract_patch(
            self.name(),
            bundle,
            &self.config.size,
            &centre,
            self.config.boundary,
            self.config.fill,
        )
    }

    fn name(&self) -> &str {
        "RandomPatch"
    }
}

/// Configuration for power-of-two padding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerTwoConfig {
    /// Each axis is padded to a multiple of `2^exponent` (one value, or one
    /// per axis).
    pub exponent: Vec<u32>,
    /// How new voxels are filled.
    pub boundary: Boundary,
    /// Fill value for [`Boundary::Constant`].
    pub fill: f32,
}

impl Default for PowerTwoConfig {
    fn default() -> Self {
        Self {
            exponent: vec![1],
            boundary: Boundary::Dct2,
            fill: 0.0,
        }
    }
}

/// Pad each spatial axis, around its centre, up to the next multiple of
/// `2^exponent`, so the volume survives that many halvings.
#[derive(Debug, Clone)]
pub struct PowerTwo {
    config: PowerTwoConfig,
}

impl PowerTwo {
    /// Pad to multiples of `2^exponent` (one value, or one per axis).
    #[must_use]
    pub fn new(exponent: Vec<u32>) -> Self {
        Self::from_config(PowerTwoConfig {
            exponent,
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: PowerTwoConfig) -> Self {
        Self { config }
    }

    /// Set the boundary mode.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.config.boundary = boundary;
        self
    }

    /// Target shape for a volume of `shape`.
    fn target_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let exponent = resample::per_axis(&self.config.exponent, shape.len(), self.name(), "exponent")?;
        shape
            .iter()
            .zip(&exponent)
            .map(|(&extent, &e)| {
                let step = 1_usize.checked_shl(e).ok_or_else(|| {
                    CoreError::configuration(self.name(), format!("exponent {e} is too large"))
                })?;
                Ok(extent.div_ceil(step) * step)
            })
            .collect()
    }
}

impl Transform for PowerTwo {
    fn sample(&self, _sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::empty())
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        params.expect_leaf(self.name())?;
        let Some(shape) = bundle.spatial_shape(self.name())? else {
            return Ok(bundle.clone());
        };
        let target = self.target_shape(&shape)?;
        if target == shape {
            return Ok(bundle.clone());
        }
        extract_patch(
            self.name(),
            bundle,
            &target,
            &[0.0],
            self.config.boundary,
            self.config.fill,
        )
    }

    fn name(&self) -> &str {
        "PowerTwo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometric::Flip;
    use cornucopia_core::{Member, Seed, Sequence};
    use ndarray::Array3;

    fn bundle() -> Bundle {
        let image = Array3::from_shape_fn((1, 4, 6), |(_, i, j)| (i * 6 + j) as f32);
        let label = image.mapv(|v| (v as u32 % 2) as f32);
        Bundle::new()
            .with("image", Member::intensity(image))
            .with("label", Member::label(label))
    }

    fn flat(bundle: &Bundle, role: &str) -> Vec<f32> {
        bundle.get(role).unwrap().data().iter().copied().collect()
    }

    #[test]
    fn test_patch_origin() {
        assert_eq!(patch_origin(10, 4, -1.0), 0);
        assert_eq!(patch_origin(10, 4, 1.0), 6);
        assert_eq!(patch_origin(10, 4, 0.0), 3);
        assert_eq!(patch_origin(4, 6, 0.0), -1);
    }

    #[test]
    fn test_crop() {
        let out = Crop::new(vec![1]).apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[2, 4]);
        assert_eq!(flat(&out, "image"), vec![7.0, 8.0, 9.0, 10.0, 13.0, 14.0, 15.0, 16.0]);
        assert_eq!(out.get("label").unwrap().spatial_shape(), &[2, 4]);
    }

    #[test]
    fn test_crop_sides() {
        let out = Crop::new(vec![1]).with_side(Side::Pre).apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[3, 5]);
        assert_eq!(flat(&out, "image")[0], 7.0);

        let explicit = Crop::from_config(CropConfig {
            amount: vec![0.0, 1.0, 2.0, 0.0],
            side: Side::Explicit,
            ..Default::default()
        });
        let out = explicit.apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[3, 4]);
        assert_eq!(flat(&out, "image")[..4], [2.0, 3.0, 4.0, 5.0]);

        let odd = Crop::from_config(CropConfig {
            amount: vec![0.0, 1.0, 2.0],
            side: Side::Explicit,
            ..Default::default()
        });
        let err = odd.apply(&Params::empty(), &bundle()).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { ref role, .. } if role == "amount"));
    }

    #[test]
    fn test_crop_pct() {
        // ceil(0.25 * 4) = 1, ceil(0.25 * 6) = 2
        let out = Crop::pct(vec![0.25]).apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[2, 2]);
        assert_eq!(flat(&out, "image"), vec![8.0, 9.0, 14.0, 15.0]);
    }

    #[test]
    fn test_crop_fractional_voxels() {
        let crop = Crop::from_config(CropConfig {
            amount: vec![1.5],
            ..Default::default()
        });
        let err = crop.apply(&Params::empty(), &bundle()).unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn test_crop_too_large() {
        let err = Crop::new(vec![2, 1]).apply(&Params::empty(), &bundle()).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_crop_axis_count_mismatch() {
        let err = Crop::new(vec![1, 1, 1]).apply(&Params::empty(), &bundle()).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { ref role, .. } if role == "amount"));
    }

    #[test]
    fn test_pad() {
        let out = Pad::new(vec![1, 0]).with_fill(-1.0).apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[6, 6]);
        let image = flat(&out, "image");
        assert!(image[..6].iter().all(|&v| v == -1.0));
        assert_eq!(image[6], 0.0);
    }

    #[test]
    fn test_pad_mirrors_by_default() {
        let out = Pad::new(vec![1]).apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[6, 8]);
        let image = flat(&out, "image");
        assert_eq!(image[..8], [0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 5.0]);
        assert!(flat(&out, "label").iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn test_pad_post_pct() {
        let out = Pad::pct(vec![0.5])
            .with_side(Side::Post)
            .with_boundary(Boundary::Replicate)
            .apply(&Params::empty(), &bundle())
            .unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[6, 9]);
        assert_eq!(flat(&out, "image")[..9], [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_power_two() {
        let out = PowerTwo::new(vec![2]).apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[4, 8]);
        assert_eq!(out.get("label").unwrap().spatial_shape(), &[4, 8]);

        let unchanged = PowerTwo::new(vec![1]).apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(unchanged, bundle());

        let per_axis = PowerTwo::new(vec![3, 0]).apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(per_axis.get("image").unwrap().spatial_shape(), &[8, 6]);

        let huge = PowerTwo::new(vec![200]).apply(&Params::empty(), &bundle());
        assert!(matches!(huge, Err(CoreError::Configuration { .. })));
    }

    #[test]
    fn test_shape_changes_reach_every_member() {
        let image_only = Targets::roles(["image"]);
        let transforms: Vec<Box<dyn Transform>> = vec![
            Box::new(Crop::new(vec![1])),
            Box::new(Pad::new(vec![2])),
            Box::new(Patch::new(vec![3])),
            Box::new(PowerTwo::new(vec![3])),
            Box::new(RandomPatch::new(vec![2], 2)),
        ];
        for transform in transforms {
            let sequence = Sequence::new()
                .then(transform)
                .then(Flip::new(vec![0]).with_targets(image_only.clone()));
            let params = sequence.sample(&mut Sampler::new(Seed::new(1))).unwrap();
            let out = sequence.apply(&params, &bundle()).unwrap();
            assert_eq!(
                out.get("image").unwrap().spatial_shape(),
                out.get("label").unwrap().spatial_shape()
            );
        }
    }

    #[test]
    fn test_patch_corner() {
        let patch = Patch::new(vec![2]).with_centre(vec![-1.0, 1.0]);
        let out = patch.apply(&Params::empty(), &bundle()).unwrap();
        assert_eq!(flat(&out, "image"), vec![4.0, 5.0, 10.0, 11.0]);
    }

    #[test]
    fn test_patch_bad_centre() {
        let patch = Patch::new(vec![2]).with_centre(vec![1.5]);
        let err = patch.apply(&Params::empty(), &bundle()).unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn test_random_patch_stays_inside() {
        let patch = RandomPatch::new(vec![3], 2);
        for seed in 0..25 {
            let params = patch.sample(&mut Sampler::new(Seed::new(seed))).unwrap();
            let out = patch.apply(&params, &bundle()).unwrap();
            assert_eq!(out.get("image").unwrap().spatial_shape(), &[3, 3]);
            assert!(flat(&out, "image").iter().all(|&v| (0.0..24.0).contains(&v)));

            let image = flat(&out, "image");
            let label = flat(&out, "label");
            for (i, l) in image.iter().zip(&label) {
                assert_eq!((*i as u32 % 2) as f32, *l);
            }
        }
    }

    #[test]
    fn test_random_patch_larger_than_volume() {
        let patch = RandomPatch::new(vec![8], 2);
        let params = patch.sample(&mut Sampler::new(Seed::new(2))).unwrap();
        let out = patch.apply(&params, &bundle()).unwrap();
        assert_eq!(out.get("image").unwrap().spatial_shape(), &[8, 8]);
    }
}
