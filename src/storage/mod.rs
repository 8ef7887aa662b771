//! # Graph Store Trait
//!
//! This is THE contract between the compression engine and whatever holds
//! the graph. The agglomerator and meta-relator only ever talk to a
//! `GraphStore`; they never build query strings.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory, snapshot-able to JSON |
//!
//! Stores own their timeout and retry policy. Errors are handed back to the
//! caller as-is.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::Result;

pub use memory::{GraphSnapshot, MemoryStore};

// ============================================================================
// Request types
// ============================================================================

/// Per-node degree predicate: `node[property] >= min`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeFilter {
    pub property: String,
    pub min: u64,
}

impl DegreeFilter {
    /// Nodes without the property never pass.
    pub fn admits(&self, node: &Node) -> bool {
        node.get(&self.property)
            .and_then(Value::as_float)
            .is_some_and(|d| d >= self.min as f64)
    }
}

/// Which degree to compute and where to store it.
#[derive(Debug, Clone)]
pub struct DegreeSpec {
    /// Nodes that receive the property.
    pub node_label: String,
    /// Relationship type counted.
    pub rel_type: String,
    /// Only count relationships whose other end carries this label.
    pub target_label: Option<String>,
    /// Property written on each node.
    pub property: String,
    pub direction: Direction,
}

/// Exact-distance reachability query from a single start node.
#[derive(Debug, Clone)]
pub struct HopQuery {
    pub start: NodeId,
    /// Exact number of relationships on the path (not "up to").
    pub hops: u32,
    pub rel_type: String,
    pub direction: Direction,
    /// Label the end node must carry.
    pub end_label: String,
    /// Applied to every node after the start, end node included.
    pub degree: Option<DegreeFilter>,
    /// Relationship property summed along the path. `None` means weight 0.
    pub weight: Option<String>,
}

/// A node returned by `reach_exact`, with the weight of the store-chosen path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reached {
    pub node: NodeId,
    pub path_weight: f64,
}

/// What to do when `write_edges` finds the relationship already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnDuplicate {
    /// Replace the listed attributes.
    #[default]
    Overwrite,
    /// Add numeric attributes onto the stored values.
    Increment,
}

/// One edge of an `EdgeBatch`.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    pub source: NodeId,
    pub target: NodeId,
    pub properties: PropertyMap,
}

/// Bulk idempotent edge upsert: at most one `edge_label` relationship per
/// ordered (source, target) pair.
#[derive(Debug, Clone)]
pub struct EdgeBatch {
    pub edges: Vec<EdgeSpec>,
    /// Edges whose source lacks this label are skipped.
    pub source_label: String,
    pub edge_label: String,
    /// Edges whose target lacks this label are skipped.
    pub target_label: String,
    pub on_duplicate: OnDuplicate,
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The capability set the compression engine needs from a graph store.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    // ========================================================================
    // Schema introspection
    // ========================================================================

    /// True if at least one node carries `label`.
    async fn label_exists(&self, label: &str) -> Result<bool>;

    /// True if at least one relationship has type `rel_type`.
    async fn relationship_type_exists(&self, rel_type: &str) -> Result<bool>;

    /// True if at least one `label` node has property `attr`.
    async fn attribute_exists(&self, label: &str, attr: &str) -> Result<bool>;

    /// True if at least one `rel_type` relationship has property `attr`.
    async fn relationship_attribute_exists(&self, rel_type: &str, attr: &str) -> Result<bool>;

    /// Number of nodes carrying `label`.
    async fn node_count(&self, label: &str) -> Result<u64>;

    // ========================================================================
    // Nodes
    // ========================================================================

    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId>;

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// All nodes carrying `label`, ordered by id.
    async fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>>;

    /// Set a property on a node (upsert).
    async fn set_node_property(&self, id: NodeId, key: &str, val: Value) -> Result<()>;

    /// Delete `label` nodes whose `key` is numerically `>= min`, together with
    /// their relationships. Returns the number of nodes removed.
    async fn delete_nodes_at_least(&self, label: &str, key: &str, min: i64) -> Result<u64>;

    // ========================================================================
    // Relationships
    // ========================================================================

    async fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    /// All relationships of a given type, ordered by id.
    async fn relationships_by_type(&self, rel_type: &str) -> Result<Vec<Relationship>>;

    /// Merge-if-absent: create `(src)-[rel_type]->(dst)` with `on_create` only
    /// if no such relationship exists. An existing relationship is left
    /// untouched. Returns true if one was created.
    async fn merge_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        on_create: PropertyMap,
    ) -> Result<bool>;

    /// Bulk idempotent upsert. Returns the number of edges written
    /// (created or updated).
    async fn write_edges(&self, batch: EdgeBatch) -> Result<u64>;

    /// Delete `rel_type` relationships whose `key` is numerically `>= min`.
    async fn delete_relationships_at_least(&self, rel_type: &str, key: &str, min: i64) -> Result<u64>;

    /// Delete every relationship of a type.
    async fn wipe_relationships(&self, rel_type: &str) -> Result<u64>;

    // ========================================================================
    // Analytics
    // ========================================================================

    /// Count each node's relationships per `spec` and store it as a property.
    async fn compute_and_store_degree(&self, spec: &DegreeSpec) -> Result<()>;

    /// Distinct `node_label` nodes with at least one `rel_type` relationship
    /// (either direction) to another `node_label` node, optionally restricted
    /// by a degree predicate.
    async fn connected_node_count(
        &self,
        node_label: &str,
        rel_type: &str,
        degree: Option<&DegreeFilter>,
    ) -> Result<u64>;

    /// Nodes reachable from `query.start` along a path of exactly
    /// `query.hops` relationships. Each end node appears once.
    async fn reach_exact(&self, query: &HopQuery) -> Result<Vec<Reached>>;
}
