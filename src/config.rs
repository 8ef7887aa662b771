//! Compression run configuration.
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! [graph]
//! node_label = "USER"
//! rel_label = "FOLLOWS"
//! weight = "count"          # optional
//!
//! [agglomeration]
//! orientation = "out"       # undirected | in | out
//! min_degree = 2            # optional
//! hops = { min = 1, max = 3 }
//! max_cores = 500
//!
//! [cutoff]
//! sensitivity = 1.0
//! online = true
//! ```

use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::meta::knee::KneeConfig;
use crate::model::Direction;
use crate::{Error, Result};

// ============================================================================
// Hop range
// ============================================================================

/// Inclusive hop interval `[min, max]`, `1 <= min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HopBounds", into = "HopBounds")]
pub struct HopRange {
    min: u32,
    max: u32,
}

/// Unvalidated wire form of a `HopRange`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HopBounds {
    pub min: u32,
    pub max: u32,
}

impl TryFrom<HopBounds> for HopRange {
    type Error = Error;

    fn try_from(bounds: HopBounds) -> Result<Self> {
        HopRange::new(bounds.min, bounds.max)
    }
}

impl From<HopRange> for HopBounds {
    fn from(range: HopRange) -> Self {
        HopBounds { min: range.min, max: range.max }
    }
}

impl HopRange {
    pub fn new(min: u32, max: u32) -> Result<Self> {
        if min < 1 {
            return Err(Error::Config(format!("minimum hop must be at least 1, got {min}")));
        }
        if min > max {
            return Err(Error::Config(format!("hop range is inverted: {min} > {max}")));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 { self.min }
    pub fn max(&self) -> u32 { self.max }

    /// Same range with a new lower bound.
    pub fn with_min(self, min: u32) -> Result<Self> {
        Self::new(min, self.max)
    }

    /// Same range with a new upper bound.
    pub fn with_max(self, max: u32) -> Result<Self> {
        Self::new(self.min, max)
    }

    /// Hop distances probed, ascending.
    pub fn hops(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

impl Default for HopRange {
    fn default() -> Self {
        Self { min: 1, max: 3 }
    }
}

impl std::fmt::Display for HopRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

// ============================================================================
// Orientation
// ============================================================================

/// Which way relationships are walked when expanding from a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Undirected,
    /// Walk relationships pointing into the current node.
    In,
    /// Walk relationships pointing out of the current node.
    Out,
}

impl Orientation {
    pub fn direction(self) -> Direction {
        match self {
            Orientation::Undirected => Direction::Both,
            Orientation::In => Direction::Incoming,
            Orientation::Out => Direction::Outgoing,
        }
    }

    /// Pattern arrow ends, e.g. `("<-", "-")` for `In`.
    pub fn endpoints(self) -> (&'static str, &'static str) {
        match self {
            Orientation::Undirected => ("-", "-"),
            Orientation::In => ("<-", "-"),
            Orientation::Out => ("-", "->"),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Labels and attributes naming the graph being compressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLabels {
    /// Label of the nodes to compress.
    pub node_label: String,
    /// Relationship type traversed and summarised.
    pub rel_label: String,
    /// Extra label carried by core nodes (they also carry `node_label`).
    #[serde(default = "default_core_label")]
    pub core_label: String,
    /// Relationship type written from a core to each node it represents.
    #[serde(default = "default_represents_label")]
    pub represents_label: String,
    /// Numeric relationship attribute. Enables weighted tie-breaks and sums.
    #[serde(default)]
    pub weight: Option<String>,
}

fn default_core_label() -> String { "CORE".into() }
fn default_represents_label() -> String { "REPRESENTS".into() }

impl GraphLabels {
    /// Meta-relation type derived from the relationship type.
    pub fn meta_label(&self) -> String {
        format!("META_{}", self.rel_label)
    }
}

/// Agglomeration knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgglomerationConfig {
    pub orientation: Orientation,
    /// Only nodes with at least this degree are traversed or counted.
    pub min_degree: Option<u64>,
    /// Recompute the degree property even if the store already has it.
    pub recalculate_degree: bool,
    pub hops: HopRange,
    /// Refuse to run with more cores than this.
    pub max_cores: Option<usize>,
    /// Label of progress ledger nodes (they also carry `META`).
    pub ledger_label: String,
    /// Node property holding the degree used by `min_degree`.
    pub degree_property: String,
}

impl Default for AgglomerationConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            min_degree: None,
            recalculate_degree: false,
            hops: HopRange::default(),
            max_cores: None,
            ledger_label: "AGGLOM_PROGRESS".into(),
            degree_property: "agglom_degree".into(),
        }
    }
}

/// Full configuration of a compression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub graph: GraphLabels,
    #[serde(default)]
    pub agglomeration: AgglomerationConfig,
    #[serde(default)]
    pub cutoff: KneeConfig,
}

impl CompressionConfig {
    /// Defaults for everything but the two labels that have none.
    pub fn new(node_label: impl Into<String>, rel_label: impl Into<String>) -> Self {
        Self {
            graph: GraphLabels {
                node_label: node_label.into(),
                rel_label: rel_label.into(),
                core_label: default_core_label(),
                represents_label: default_represents_label(),
                weight: None,
            },
            agglomeration: AgglomerationConfig::default(),
            cutoff: KneeConfig::default(),
        }
    }

    pub fn with_weight(mut self, weight: impl Into<String>) -> Self {
        self.graph.weight = Some(weight.into());
        self
    }

    pub fn with_core_label(mut self, label: impl Into<String>) -> Self {
        self.graph.core_label = label.into();
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.agglomeration.orientation = orientation;
        self
    }

    pub fn with_min_degree(mut self, degree: u64) -> Self {
        self.agglomeration.min_degree = Some(degree);
        self
    }

    pub fn with_hops(mut self, min: u32, max: u32) -> Result<Self> {
        self.agglomeration.hops = HopRange::new(min, max)?;
        Ok(self)
    }

    pub fn with_max_cores(mut self, max: usize) -> Self {
        self.agglomeration.max_cores = Some(max);
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Store-independent checks. Store-dependent ones (labels present,
    /// core count) run when an `Agglomerator` is built.
    pub fn validate(&self) -> Result<()> {
        let labels = [
            ("node_label", &self.graph.node_label),
            ("rel_label", &self.graph.rel_label),
            ("core_label", &self.graph.core_label),
            ("represents_label", &self.graph.represents_label),
            ("ledger_label", &self.agglomeration.ledger_label),
            ("degree_property", &self.agglomeration.degree_property),
        ];
        for (name, value) in labels {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }
        if self.graph.core_label == self.graph.node_label {
            return Err(Error::Config("core_label must differ from node_label".into()));
        }
        if self.graph.weight.as_deref().is_some_and(|w| w.trim().is_empty()) {
            return Err(Error::Config("weight attribute must not be empty".into()));
        }
        if self.agglomeration.max_cores == Some(0) {
            return Err(Error::Config("max_cores must be at least 1".into()));
        }
        if !(self.cutoff.sensitivity.is_finite() && self.cutoff.sensitivity >= 0.0) {
            return Err(Error::Config("cutoff sensitivity must be a non-negative number".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_range_validation() {
        assert!(HopRange::new(1, 3).is_ok());
        assert!(HopRange::new(2, 2).is_ok());
        assert!(matches!(HopRange::new(0, 3), Err(Error::Config(_))));
        assert!(matches!(HopRange::new(3, 1), Err(Error::Config(_))));
        let range = HopRange::new(1, 3).unwrap();
        assert_eq!(range.hops().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(range.with_min(2).unwrap().min(), 2);
        assert!(range.with_max(0).is_err());
    }

    #[test]
    fn test_toml_defaults() {
        let config = CompressionConfig::from_toml_str(
            r#"
            [graph]
            node_label = "USER"
            rel_label = "FOLLOWS"
            "#,
        ).unwrap();
        assert_eq!(config, CompressionConfig::new("USER", "FOLLOWS"));
        assert_eq!(config.graph.meta_label(), "META_FOLLOWS");
        assert_eq!(config.agglomeration.hops, HopRange::default());
    }

    #[test]
    fn test_toml_full() {
        let config = CompressionConfig::from_toml_str(
            r#"
            [graph]
            node_label = "USER"
            rel_label = "FOLLOWS"
            weight = "count"

            [agglomeration]
            orientation = "out"
            min_degree = 2
            hops = { min = 2, max = 4 }
            max_cores = 10

            [cutoff]
            sensitivity = 2.0
            online = false
            "#,
        ).unwrap();
        assert_eq!(config.graph.weight.as_deref(), Some("count"));
        assert_eq!(config.agglomeration.orientation, Orientation::Out);
        assert_eq!(config.agglomeration.orientation.direction(), Direction::Outgoing);
        assert_eq!(config.agglomeration.min_degree, Some(2));
        assert_eq!(config.agglomeration.hops, HopRange::new(2, 4).unwrap());
        assert!(!config.cutoff.online);
    }

    #[test]
    fn test_toml_rejects_inverted_hops() {
        let result = CompressionConfig::from_toml_str(
            r#"
            [graph]
            node_label = "USER"
            rel_label = "FOLLOWS"

            [agglomeration]
            hops = { min = 3, max = 1 }
            "#,
        );
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_toml_rejects_non_integer_hops() {
        let result = CompressionConfig::from_toml_str(
            r#"
            [graph]
            node_label = "USER"
            rel_label = "FOLLOWS"

            [agglomeration]
            hops = { min = 1.5, max = 3 }
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_labels() {
        let config = CompressionConfig::new("USER", "");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        let config = CompressionConfig::new("CORE", "FOLLOWS");
        assert!(config.validate().is_err());
        let config = CompressionConfig::new("USER", "FOLLOWS").with_max_cores(0);
        assert!(config.validate().is_err());
    }
}
