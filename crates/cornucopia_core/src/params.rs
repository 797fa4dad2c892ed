//! Parameter specifications and realized parameter trees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::error::{CoreError, Result};
use crate::sampler::Sampler;
use crate::value::Value;

/// Realized values of one leaf transform, keyed by parameter name.
pub type ParamMap = BTreeMap<String, Value>;

/// One declared parameter: where it comes from and what shape it has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    /// Distribution (or fixed value) to draw from.
    pub distribution: Distribution,
    /// Declared shape; empty for scalars.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape: Vec<usize>,
}

/// Declarative description of the quantities a leaf transform samples.
///
/// Entries are drawn in name order, so two specs with the same entries
/// always consume randomness identically.
///
/// # Example
///
/// ```rust
/// use cornucopia_core::{Distribution, ParameterSpec, Sampler, Seed};
///
/// let spec = ParameterSpec::new()
///     .with("gamma", Distribution::uniform(0.5, 1.5))
///     .with_shape("shift", Distribution::symmetric(2.0), vec![3]);
///
/// let values = spec.sample("Example", &mut Sampler::new(Seed::new(0))).unwrap();
/// assert_eq!(values["shift"].shape(), vec![3]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    entries: BTreeMap<String, ParameterEntry>,
}

impl ParameterSpec {
    /// Create an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scalar parameter.
    #[must_use]
    pub fn with(self, name: impl Into<String>, distribution: Distribution) -> Self {
        self.with_shape(name, distribution, Vec::new())
    }

    /// Add a parameter with a declared shape.
    #[must_use]
    pub fn with_shape(
        mut self,
        name: impl Into<String>,
        distribution: Distribution,
        shape: Vec<usize>,
    ) -> Self {
        self.entries.insert(
            name.into(),
            ParameterEntry {
                distribution,
                shape,
            },
        );
        self
    }

    /// Add a fixed parameter.
    #[must_use]
    pub fn fixed(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(name, Distribution::fixed(value))
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterEntry> {
        self.entries.get(name)
    }

    /// Parameter names, in draw order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every entry on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// A configuration error naming the first invalid parameter, or a shape
    /// mismatch if per-element arguments do not fit the declared shape.
    pub fn validate(&self, owner: &str) -> Result<()> {
        for (name, entry) in &self.entries {
            entry.distribution.validate().map_err(|err| {
                CoreError::configuration(owner, format!("parameter `{name}`: {}", detail(&err)))
            })?;
            if let Some(len) = entry.distribution.element_count() {
                let n: usize = entry.shape.iter().product();
                if len != n {
                    return Err(CoreError::shape_mismatch(
                        owner,
                        name,
                        format!("{len} per-element arguments for declared shape {:?}", entry.shape),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Draw every declared parameter from `sampler`.
    ///
    /// # Errors
    ///
    /// Configuration or shape errors from the draws, attributed to `owner`.
    pub fn sample(&self, owner: &str, sampler: &mut Sampler) -> Result<ParamMap> {
        let mut values = ParamMap::new();
        for (name, entry) in &self.entries {
            let value = sampler
                .draw(name, &entry.distribution, &entry.shape)
                .map_err(|err| attribute(err, owner))?;
            values.insert(name.clone(), value);
        }
        Ok(values)
    }
}

fn detail(err: &CoreError) -> String {
    match err {
        CoreError::Configuration { message, .. }
        | CoreError::ShapeMismatch { message, .. }
        | CoreError::ReplayMismatch { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn attribute(err: CoreError, owner: &str) -> CoreError {
    match err {
        CoreError::Configuration { path, message, .. } => CoreError::Configuration {
            path,
            transform: owner.to_string(),
            message,
        },
        CoreError::ShapeMismatch { path, role, message, .. } => CoreError::ShapeMismatch {
            path,
            transform: owner.to_string(),
            role,
            message,
        },
        other => other,
    }
}

/// Realized parameters of a transform tree.
///
/// The tree is isomorphic to the transform tree that produced it: leaves
/// carry their [`ParamMap`], combinator nodes carry their decision (gate,
/// choice, order, subset) and their children's parameters.
///
/// Serialized with a `node` tag:
///
/// ```json
/// { "node": "gated", "gate": true, "child": { "node": "leaf", "values": {} } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Params {
    /// Values of a leaf transform.
    Leaf {
        /// Realized values.
        values: ParamMap,
    },
    /// Children of a sequence, in declaration order.
    Sequence {
        /// One entry per child.
        children: Vec<Params>,
    },
    /// Children of a random-order node, in declaration order, plus the
    /// application order that was drawn.
    Ordered {
        /// Permutation of child indices, in application order.
        order: Vec<usize>,
        /// One entry per child.
        children: Vec<Params>,
    },
    /// A probability gate.
    Gated {
        /// Whether the child is applied.
        gate: bool,
        /// Child parameters, present exactly when `gate` is true.
        child: Option<Box<Params>>,
    },
    /// A single choice among children.
    Choice {
        /// Index of the chosen child.
        choice_index: usize,
        /// Parameters of the chosen child.
        child: Box<Params>,
    },
    /// A subset of children.
    Subset {
        /// Chosen child indices, in application order.
        indices: Vec<usize>,
        /// Parameters of each chosen child, aligned with `indices`.
        children: Vec<Params>,
    },
}

impl Params {
    /// Leaf parameters.
    #[must_use]
    pub const fn leaf(values: ParamMap) -> Self {
        Self::Leaf { values }
    }

    /// Leaf with no values, for transforms without random parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::leaf(ParamMap::new())
    }

    /// Node kind name, used in replay errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Leaf { .. } => "leaf",
            Self::Sequence { .. } => "sequence",
            Self::Ordered { .. } => "ordered",
            Self::Gated { .. } => "gated",
            Self::Choice { .. } => "choice",
            Self::Subset { .. } => "subset",
        }
    }

    /// Total number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + match self {
            Self::Leaf { .. } => 0,
            Self::Sequence { children }
            | Self::Ordered { children, .. }
            | Self::Subset { children, .. } => children.iter().map(Self::node_count).sum(),
            Self::Gated { child, .. } => child.as_ref().map_or(0, |c| c.node_count()),
            Self::Choice { child, .. } => child.node_count(),
        }
    }

    /// Name of the first leaf value holding a NaN or infinity, if any.
    fn first_non_finite(&self) -> Option<&str> {
        match self {
            Self::Leaf { values } => values
                .iter()
                .find(|(_, value)| !value.is_finite())
                .map(|(name, _)| name.as_str()),
            Self::Sequence { children }
            | Self::Ordered { children, .. }
            | Self::Subset { children, .. } => children.iter().find_map(Self::first_non_finite),
            Self::Gated { child, .. } => child.as_deref().and_then(Self::first_non_finite),
            Self::Choice { child, .. } => child.first_non_finite(),
        }
    }

    fn check_finite(&self) -> Result<()> {
        match self.first_non_finite() {
            Some(name) => Err(CoreError::Serialization(format!(
                "parameter `{name}` is not finite and has no JSON form"
            ))),
            None => Ok(()),
        }
    }

    /// View this node as leaf parameters of `owner`.
    ///
    /// # Errors
    ///
    /// A replay mismatch if the node is not a leaf.
    pub fn expect_leaf<'a>(&'a self, owner: &'a str) -> Result<LeafParams<'a>> {
        match self {
            Self::Leaf { values } => Ok(LeafParams { owner, values }),
            other => Err(CoreError::replay_mismatch(
                owner,
                format!("expected leaf parameters, found a `{}` node", other.kind()),
            )),
        }
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails or a value is NaN or
    /// infinite (JSON would silently write `null`).
    pub fn to_json(&self) -> Result<String> {
        self.check_finite()?;
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails or a value is not
    /// finite.
    pub fn to_json_pretty(&self) -> Result<String> {
        self.check_finite()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the document is not a parameter tree.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Typed access to a leaf's realized values.
///
/// Missing or mistyped entries are replay mismatches: the parameter tree
/// was not produced by this transform.
#[derive(Debug, Clone, Copy)]
pub struct LeafParams<'a> {
    owner: &'a str,
    values: &'a ParamMap,
}

impl<'a> LeafParams<'a> {
    /// All values.
    #[must_use]
    pub const fn values(&self) -> &'a ParamMap {
        self.values
    }

    /// Raw value.
    ///
    /// # Errors
    ///
    /// A replay mismatch if `name` is absent.
    pub fn value(&self, name: &str) -> Result<&'a Value> {
        self.values.get(name).ok_or_else(|| {
            CoreError::replay_mismatch(self.owner, format!("missing parameter `{name}`"))
        })
    }

    fn mistyped(&self, name: &str, expected: &str, found: &Value) -> CoreError {
        CoreError::replay_mismatch(
            self.owner,
            format!(
                "parameter `{name}` should be {expected}, found {}",
                found.type_name()
            ),
        )
    }

    /// Scalar as `f64`.
    ///
    /// # Errors
    ///
    /// A replay mismatch if absent or not a scalar.
    pub fn float(&self, name: &str) -> Result<f64> {
        let value = self.value(name)?;
        value
            .as_f64()
            .ok_or_else(|| self.mistyped(name, "a scalar", value))
    }

    /// Scalar integer.
    ///
    /// # Errors
    ///
    /// A replay mismatch if absent or not an integer.
    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self.value(name)?;
        value
            .as_i64()
            .ok_or_else(|| self.mistyped(name, "an int", value))
    }

    /// Scalar integer reinterpreted as `u64` (used for noise seeds).
    ///
    /// # Errors
    ///
    /// A replay mismatch if absent or not an integer.
    pub fn seed(&self, name: &str) -> Result<u64> {
        self.int(name).map(|v| v as u64)
    }

    /// Scalar boolean.
    ///
    /// # Errors
    ///
    /// A replay mismatch if absent or not a bool.
    pub fn bool(&self, name: &str) -> Result<bool> {
        let value = self.value(name)?;
        value
            .as_bool()
            .ok_or_else(|| self.mistyped(name, "a bool", value))
    }

    /// Vector of floats (int and bool vectors are widened).
    ///
    /// # Errors
    ///
    /// A replay mismatch if absent or a scalar.
    pub fn floats(&self, name: &str) -> Result<Vec<f64>> {
        let value = self.value(name)?;
        match value {
            Value::FloatVector(_) | Value::IntVector(_) | Value::BoolVector(_) => {
                Ok(value.to_f64_vec())
            }
            other => Err(self.mistyped(name, "a vector", other)),
        }
    }

    /// Vector of booleans.
    ///
    /// # Errors
    ///
    /// A replay mismatch if absent or not a bool vector.
    pub fn bools(&self, name: &str) -> Result<Vec<bool>> {
        match self.value(name)? {
            Value::BoolVector(v) => Ok(v.clone()),
            other => Err(self.mistyped(name, "a bool_vector", other)),
        }
    }
}
