//! Role-tagged bundles of co-registered tensors.
//!
//! Tensors are channel-first: `(C, X[, Y[, Z]])`. The spatial shape is
//! everything after the channel axis.

use ndarray::{ArcArray, Array, Dimension, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Copy-on-write tensor. Members a transform leaves untouched share their
/// buffer with the input bundle.
pub type Tensor = ArcArray<f32, IxDyn>;

/// What a bundle member holds, which decides how transforms treat it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Intensity image: receives intensity transforms, interpolated resampling.
    Intensity,
    /// Label map: geometric transforms only, nearest-neighbour resampling.
    Label,
    /// K-space data: geometric transforms only, interpolated resampling.
    KSpace,
}

impl MemberKind {
    /// Default resampling discipline for this kind.
    #[must_use]
    pub const fn interpolation(&self) -> Interpolation {
        match self {
            MemberKind::Label => Interpolation::Nearest,
            MemberKind::Intensity | MemberKind::KSpace => Interpolation::Linear,
        }
    }
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberKind::Intensity => write!(f, "intensity"),
            MemberKind::Label => write!(f, "label"),
            MemberKind::KSpace => write!(f, "kspace"),
        }
    }
}

/// Resampling discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Nearest neighbour; never introduces new values.
    Nearest,
    /// Multilinear.
    Linear,
}

/// One tensor of a bundle, with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    data: Tensor,
    kind: MemberKind,
    interpolation: Interpolation,
}

impl Member {
    /// Create a member of the given kind, using that kind's interpolation.
    pub fn new<D: Dimension>(data: Array<f32, D>, kind: MemberKind) -> Self {
        Self::from_tensor(data.into_dyn().into_shared(), kind)
    }

    /// Create a member from a shared tensor.
    #[must_use]
    pub fn from_tensor(data: Tensor, kind: MemberKind) -> Self {
        Self {
            data,
            kind,
            interpolation: kind.interpolation(),
        }
    }

    /// Intensity image.
    pub fn intensity<D: Dimension>(data: Array<f32, D>) -> Self {
        Self::new(data, MemberKind::Intensity)
    }

    /// Label map.
    pub fn label<D: Dimension>(data: Array<f32, D>) -> Self {
        Self::new(data, MemberKind::Label)
    }

    /// K-space data.
    pub fn kspace<D: Dimension>(data: Array<f32, D>) -> Self {
        Self::new(data, MemberKind::KSpace)
    }

    /// Override the interpolation discipline.
    #[must_use]
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Same metadata, new data.
    #[must_use]
    pub fn with_data(&self, data: Tensor) -> Self {
        Self {
            data,
            kind: self.kind,
            interpolation: self.interpolation,
        }
    }

    /// The tensor.
    #[must_use]
    pub const fn data(&self) -> &Tensor {
        &self.data
    }

    /// Member kind.
    #[must_use]
    pub const fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Resampling discipline.
    #[must_use]
    pub const fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Full shape, channel axis first.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Shape without the channel axis.
    #[must_use]
    pub fn spatial_shape(&self) -> &[usize] {
        self.data.shape().get(1..).unwrap_or(&[])
    }
}

/// Which bundle members a leaf transform acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Targets {
    /// Every member of a compatible kind.
    #[default]
    All,
    /// Only the listed roles; each must be present in the bundle.
    Roles(Vec<String>),
}

impl Targets {
    /// Restrict to the given roles.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Roles(roles.into_iter().map(Into::into).collect())
    }

    /// Check if `role` is selected.
    #[must_use]
    pub fn includes(&self, role: &str) -> bool {
        match self {
            Self::All => true,
            Self::Roles(roles) => roles.iter().any(|r| r == role),
        }
    }
}

/// Ordered mapping from role key to [`Member`].
///
/// All members are expected to share one spatial domain so a single
/// geometric parameter set applies coherently; geometric transforms check
/// this with [`Bundle::spatial_shape`].
///
/// # Example
///
/// ```rust
/// use cornucopia_core::{Bundle, Member};
/// use ndarray::Array3;
///
/// let bundle = Bundle::new()
///     .with("image", Member::intensity(Array3::<f32>::zeros((1, 8, 8))))
///     .with("label", Member::label(Array3::<f32>::zeros((1, 8, 8))));
/// assert_eq!(bundle.spatial_shape("doc").unwrap(), Some(vec![8, 8]));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    members: Vec<(String, Member)>,
}

impl Bundle {
    /// Create an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a member, builder style.
    #[must_use]
    pub fn with(mut self, role: impl Into<String>, member: Member) -> Self {
        self.insert(role, member);
        self
    }

    /// Add or replace a member. Replacing keeps the original position.
    pub fn insert(&mut self, role: impl Into<String>, member: Member) {
        let role = role.into();
        match self.members.iter_mut().find(|(r, _)| *r == role) {
            Some((_, slot)) => *slot = member,
            None => self.members.push((role, member)),
        }
    }

    /// Look up a member.
    #[must_use]
    pub fn get(&self, role: &str) -> Option<&Member> {
        self.members.iter().find(|(r, _)| r == role).map(|(_, m)| m)
    }

    /// Look up a member that `transform` requires.
    ///
    /// # Errors
    ///
    /// A role error if `role` is absent.
    pub fn require(&self, role: &str, transform: &str) -> Result<&Member> {
        self.get(role).ok_or_else(|| CoreError::role(transform, role))
    }

    /// Check if `role` is present.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.get(role).is_some()
    }

    /// Role keys, in insertion order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(r, _)| r.as_str())
    }

    /// Members, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(r, m)| (r.as_str(), m))
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the bundle has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The spatial shape shared by every member, `None` for an empty bundle.
    ///
    /// # Errors
    ///
    /// A shape mismatch, attributed to `transform` and naming the first
    /// member that disagrees with the first member.
    pub fn spatial_shape(&self, transform: &str) -> Result<Option<Vec<usize>>> {
        let mut members = self.members.iter();
        let Some((first_role, first)) = members.next() else {
            return Ok(None);
        };
        let reference = first.spatial_shape();
        for (role, member) in members {
            if member.spatial_shape() != reference {
                return Err(CoreError::shape_mismatch(
                    transform,
                    role.as_str(),
                    format!(
                        "spatial shape {:?} disagrees with {:?} of `{first_role}`",
                        member.spatial_shape(),
                        reference
                    ),
                ));
            }
        }
        Ok(Some(reference.to_vec()))
    }

    /// Build a new bundle by transforming the selected members.
    ///
    /// A member is passed to `f` when `targets` includes its role and its
    /// kind is in `kinds`; every other member is carried over sharing its
    /// buffer. The input bundle is never modified, and nothing is returned
    /// if `f` fails for any member.
    ///
    /// # Errors
    ///
    /// A role error if `targets` names a role absent from the bundle, or the
    /// first error returned by `f`.
    pub fn map_members<F>(
        &self,
        transform: &str,
        targets: &Targets,
        kinds: &[MemberKind],
        mut f: F,
    ) -> Result<Bundle>
    where
        F: FnMut(&str, &Member) -> Result<Tensor>,
    {
        if let Targets::Roles(roles) = targets {
            if let Some(missing) = roles.iter().find(|role| !self.contains(role)) {
                return Err(CoreError::role(transform, missing.as_str()));
            }
        }

        let mut members = Vec::with_capacity(self.members.len());
        for (role, member) in &self.members {
            let member = if targets.includes(role) && kinds.contains(&member.kind) {
                member.with_data(f(role, member)?)
            } else {
                member.clone()
            };
            members.push((role.clone(), member));
        }
        Ok(Bundle { members })
    }
}
