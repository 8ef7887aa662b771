//! # Meta-relations
//!
//! Turns a finished agglomeration into a weighted core-to-core graph.
//!
//! For every relation `(n)-[:REL]->(m)` where `n` is represented by core `s`
//! and `m` by a different core `t`, the ordered pair `(s, t)` accumulates:
//!
//! | Attribute | Meaning |
//! |-----------|---------|
//! | `weight` | sum of the edge weight attribute, or a plain count when unweighted |
//! | `n_distinct` | distinct source-side nodes contributing to the pair |
//! | `score` | `n_distinct / s.n_subnodes * weight` |
//! | `min_weight`, `max_weight` | weighted graphs only |
//!
//! Meta-relations are created once per ordered pair. Rebuilding never
//! touches stored values; `reset()` first to recompute.

pub mod knee;

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::config::{CompressionConfig, GraphLabels};
use crate::model::{NodeId, PropertyMap, Relationship, Value, props};
use crate::storage::GraphStore;
use crate::{Error, Result};
use knee::{KneeConfig, find_knee};

/// Node property the agglomerator stores on every core.
pub const N_SUBNODES: &str = "n_subnodes";

// ============================================================================
// Output rows
// ============================================================================

/// One stored meta-relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRelation {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
    pub n_distinct: u64,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_weight: Option<f64>,
}

impl MetaRelation {
    fn from_relationship(rel: &Relationship) -> Self {
        let float = |key: &str| rel.get(key).and_then(Value::as_float);
        Self {
            source: rel.src,
            target: rel.dst,
            weight: float("weight").unwrap_or(0.0),
            n_distinct: rel.get("n_distinct").and_then(Value::as_int).unwrap_or(0).max(0) as u64,
            score: float("score").unwrap_or(0.0),
            min_weight: float("min_weight"),
            max_weight: float("max_weight"),
        }
    }
}

/// A core and the number of nodes it represents (itself included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSummary {
    pub id: NodeId,
    pub n_subnodes: Option<u64>,
}

/// Running aggregate for one ordered core pair.
#[derive(Debug, Default)]
struct PairAggregate {
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    sources: HashSet<NodeId>,
}

impl PairAggregate {
    fn add(&mut self, source_node: NodeId, weight: Option<f64>) {
        self.count += 1;
        self.sources.insert(source_node);
        if let Some(w) = weight {
            self.sum += w;
            self.min = Some(self.min.map_or(w, |m| m.min(w)));
            self.max = Some(self.max.map_or(w, |m| m.max(w)));
        }
    }
}

// ============================================================================
// MetaRelator
// ============================================================================

/// Builds, scores and filters the core graph. Holds the cached cutoff.
pub struct MetaRelator<S: GraphStore> {
    store: Arc<S>,
    labels: GraphLabels,
    meta_label: String,
    knee: KneeConfig,
    cutoff: Option<f64>,
}

impl<S: GraphStore> MetaRelator<S> {
    pub fn new(store: Arc<S>, config: &CompressionConfig) -> Self {
        Self {
            store,
            meta_label: config.graph.meta_label(),
            labels: config.graph.clone(),
            knee: config.cutoff.clone(),
            cutoff: None,
        }
    }

    /// Relationship type of the meta-relations, `META_<rel>`.
    pub fn meta_label(&self) -> &str {
        &self.meta_label
    }

    /// Create the missing meta-relations. Returns how many were created;
    /// pairs that already have one are left as they are.
    pub async fn build_meta_relations(&mut self) -> Result<u64> {
        self.invalidate_cutoff();

        let cores = self.store.nodes_by_label(&self.labels.core_label).await?;
        if cores.is_empty() {
            return Err(Error::NotBuilt(format!(
                "no :{} nodes in the store", self.labels.core_label
            )));
        }
        let mut n_subnodes: HashMap<NodeId, f64> = HashMap::with_capacity(cores.len());
        for core in &cores {
            let count = core.get(N_SUBNODES).and_then(Value::as_float).ok_or_else(|| {
                Error::NotBuilt(format!(
                    "core {} has no {N_SUBNODES}. Run agglomerate() first", core.id
                ))
            })?;
            n_subnodes.insert(core.id, count);
        }

        let owner = self.representation().await?;
        let weight_key = self.labels.weight.as_deref();

        let mut pairs: BTreeMap<(NodeId, NodeId), PairAggregate> = BTreeMap::new();
        for rel in self.store.relationships_by_type(&self.labels.rel_label).await? {
            let (Some(&source), Some(&target)) = (owner.get(&rel.src), owner.get(&rel.dst)) else {
                continue;
            };
            if source == target {
                continue;
            }
            let weight = match weight_key {
                Some(key) => rel.get(key).and_then(Value::as_float),
                None => Some(1.0),
            };
            pairs.entry((source, target)).or_default().add(rel.src, weight);
        }

        let mut created = 0u64;
        for ((source, target), agg) in pairs {
            let Some(&subnodes) = n_subnodes.get(&source) else { continue };
            let n_distinct = agg.sources.len() as u64;
            let weight = match weight_key {
                Some(_) => Value::Float(agg.sum),
                None => Value::Int(agg.count as i64),
            };
            let score = if subnodes > 0.0 {
                n_distinct as f64 / subnodes * weight.as_float().unwrap_or(0.0)
            } else {
                0.0
            };
            let mut on_create: PropertyMap = props([
                ("weight", weight),
                ("n_distinct", Value::Int(n_distinct as i64)),
                ("score", Value::Float(score)),
            ]);
            if weight_key.is_some() {
                on_create.insert("min_weight".into(), agg.min.map_or(Value::Null, Value::Float));
                on_create.insert("max_weight".into(), agg.max.map_or(Value::Null, Value::Float));
            }
            if self.store.merge_relationship(source, target, &self.meta_label, on_create).await? {
                created += 1;
            }
        }

        tracing::info!(
            meta_label = %self.meta_label,
            created,
            total = self.count_meta_relations().await?,
            "Built meta-relations"
        );
        Ok(created)
    }

    /// Node -> representing core, from the represents edges.
    async fn representation(&self) -> Result<HashMap<NodeId, NodeId>> {
        let represents = self.store.relationships_by_type(&self.labels.represents_label).await?;
        Ok(represents.into_iter().map(|r| (r.dst, r.src)).collect())
    }

    pub async fn count_meta_relations(&self) -> Result<u64> {
        Ok(self.store.relationships_by_type(&self.meta_label).await?.len() as u64)
    }

    /// Every stored score, ascending.
    pub async fn meta_relation_scores(&self) -> Result<Vec<f64>> {
        let mut scores: Vec<f64> = self.store.relationships_by_type(&self.meta_label).await?
            .iter()
            .filter_map(|r| r.get("score").and_then(Value::as_float))
            .collect();
        scores.sort_by(f64::total_cmp);
        Ok(scores)
    }

    /// The cached cutoff, computed on first use.
    ///
    /// This is the lowest score kept by the filter, not the knee's own `y`:
    /// see `calculate_cutoff_score`.
    pub async fn cutoff_score(&mut self) -> Result<f64> {
        match self.cutoff {
            Some(cutoff) => Ok(cutoff),
            None => self.calculate_cutoff_score().await,
        }
    }

    /// Recompute the cutoff from the stored scores and cache it.
    ///
    /// The cutoff is the first score above the knee, so the knee itself and
    /// everything below it is treated as noise. With no knee every relation
    /// passes.
    pub async fn calculate_cutoff_score(&mut self) -> Result<f64> {
        let scores = self.meta_relation_scores().await?;
        let Some(&lowest) = scores.first() else {
            return Err(self.not_built());
        };
        let cutoff = match find_knee(&scores, &self.knee) {
            Some(knee) => scores[knee.index + 1..]
                .iter()
                .copied()
                .find(|s| *s > knee.y)
                .unwrap_or(knee.y),
            None => lowest,
        };
        tracing::debug!(cutoff, n_scores = scores.len(), "Calculated cutoff score");
        self.cutoff = Some(cutoff);
        Ok(cutoff)
    }

    /// Forget the cached cutoff.
    pub fn invalidate_cutoff(&mut self) {
        self.cutoff = None;
    }

    /// Meta-relations ordered by (source, target), filtered by the cutoff
    /// unless `unfiltered`.
    pub async fn get_core_edge_list(&mut self, unfiltered: bool) -> Result<Vec<MetaRelation>> {
        self.ensure_built().await?;
        let mut edges: Vec<MetaRelation> = self.store.relationships_by_type(&self.meta_label).await?
            .iter()
            .map(MetaRelation::from_relationship)
            .collect();
        edges.sort_by_key(|e| (e.source, e.target));
        if !unfiltered {
            let cutoff = self.cutoff_score().await?;
            edges.retain(|e| e.score >= cutoff);
        }
        Ok(edges)
    }

    /// Every core when `unfiltered`, otherwise cores touching at least one
    /// meta-relation that passes the cutoff.
    pub async fn get_core_node_list(&mut self, unfiltered: bool) -> Result<Vec<CoreSummary>> {
        self.ensure_built().await?;
        let cores = self.store.nodes_by_label(&self.labels.core_label).await?;
        let keep: Option<HashSet<NodeId>> = if unfiltered {
            None
        } else {
            let edges = self.get_core_edge_list(false).await?;
            Some(edges.iter().flat_map(|e| [e.source, e.target]).collect())
        };
        Ok(cores.into_iter()
            .filter(|c| keep.as_ref().is_none_or(|k| k.contains(&c.id)))
            .map(|c| CoreSummary {
                id: c.id,
                n_subnodes: c.get(N_SUBNODES).and_then(Value::as_int).map(|n| n.max(0) as u64),
            })
            .collect())
    }

    /// Delete every meta-relation and the cached cutoff.
    pub async fn reset(&mut self) -> Result<u64> {
        self.invalidate_cutoff();
        let removed = self.store.wipe_relationships(&self.meta_label).await?;
        tracing::info!(meta_label = %self.meta_label, removed, "Reset meta-relations");
        Ok(removed)
    }

    async fn ensure_built(&self) -> Result<()> {
        if self.count_meta_relations().await? == 0 {
            return Err(self.not_built());
        }
        Ok(())
    }

    fn not_built(&self) -> Error {
        Error::NotBuilt(format!(
            "no meta-relations of type {}. Call build_meta_relations() first",
            self.meta_label
        ))
    }
}
