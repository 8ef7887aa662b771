//! Shared fixtures for the end-to-end suites.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use coregraph::{
    Agglomerator, Assignment, CompressionConfig, DegreeFilter, DegreeSpec, EdgeBatch, Error, GraphStore,
    HopQuery, InterruptHandle, MemoryStore, Node, NodeId, PropertyMap, Reached, RelId, Relationship,
    Result, Value,
};

pub const NODE: &str = "NODE";
pub const REL: &str = "REL";

pub fn config() -> CompressionConfig {
    CompressionConfig::new(NODE, REL)
}

/// Create `n_cores` cores followed by `n_plain` plain nodes, ids ascending.
pub async fn nodes<S: GraphStore + ?Sized>(store: &S, n_cores: usize, n_plain: usize) -> Vec<NodeId> {
    let mut ids = Vec::with_capacity(n_cores + n_plain);
    for i in 0..n_cores + n_plain {
        let labels: &[&str] = if i < n_cores { &[NODE, "CORE"] } else { &[NODE] };
        ids.push(store.create_node(labels, PropertyMap::new()).await.unwrap());
    }
    ids
}

pub async fn link<S: GraphStore + ?Sized>(store: &S, src: NodeId, dst: NodeId) {
    store.create_relationship(src, dst, REL, PropertyMap::new()).await.unwrap();
}

pub async fn link_weighted<S: GraphStore + ?Sized>(store: &S, src: NodeId, dst: NodeId, weight: f64) {
    let mut props = PropertyMap::new();
    props.insert("weight".into(), Value::Float(weight));
    store.create_relationship(src, dst, REL, props).await.unwrap();
}

/// Assignments as a sorted list, for whole-table comparisons.
pub fn table<S: GraphStore>(agg: &Agglomerator<S>) -> Vec<(NodeId, Assignment)> {
    agg.assignments().sorted()
}

// ============================================================================
// Fault-injecting store
// ============================================================================

/// What happens on the first `reach_exact` call at the armed hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    /// Trigger the interrupt handle, so the run stops before the next query.
    Interrupt,
    /// Fail the query like a dropped connection would.
    Fail,
}

/// `MemoryStore` that injects one fault at a chosen hop.
pub struct FaultyStore {
    pub inner: MemoryStore,
    armed: Mutex<Option<(u32, Fault, Option<InterruptHandle>)>>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner, armed: Mutex::new(None) }
    }

    pub fn arm(&self, hop: u32, fault: Fault, handle: Option<InterruptHandle>) {
        *self.armed.lock() = Some((hop, fault, handle));
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().is_some()
    }
}

#[async_trait]
impl GraphStore for FaultyStore {
    async fn label_exists(&self, label: &str) -> Result<bool> {
        self.inner.label_exists(label).await
    }

    async fn relationship_type_exists(&self, rel_type: &str) -> Result<bool> {
        self.inner.relationship_type_exists(rel_type).await
    }

    async fn attribute_exists(&self, label: &str, attr: &str) -> Result<bool> {
        self.inner.attribute_exists(label, attr).await
    }

    async fn relationship_attribute_exists(&self, rel_type: &str, attr: &str) -> Result<bool> {
        self.inner.relationship_attribute_exists(rel_type, attr).await
    }

    async fn node_count(&self, label: &str) -> Result<u64> {
        self.inner.node_count(label).await
    }

    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId> {
        self.inner.create_node(labels, props).await
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        self.inner.get_node(id).await
    }

    async fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>> {
        self.inner.nodes_by_label(label).await
    }

    async fn set_node_property(&self, id: NodeId, key: &str, val: Value) -> Result<()> {
        self.inner.set_node_property(id, key, val).await
    }

    async fn delete_nodes_at_least(&self, label: &str, key: &str, min: i64) -> Result<u64> {
        self.inner.delete_nodes_at_least(label, key, min).await
    }

    async fn create_relationship(&self, src: NodeId, dst: NodeId, rel_type: &str, props: PropertyMap) -> Result<RelId> {
        self.inner.create_relationship(src, dst, rel_type, props).await
    }

    async fn relationships_by_type(&self, rel_type: &str) -> Result<Vec<Relationship>> {
        self.inner.relationships_by_type(rel_type).await
    }

    async fn merge_relationship(&self, src: NodeId, dst: NodeId, rel_type: &str, on_create: PropertyMap) -> Result<bool> {
        self.inner.merge_relationship(src, dst, rel_type, on_create).await
    }

    async fn write_edges(&self, batch: EdgeBatch) -> Result<u64> {
        self.inner.write_edges(batch).await
    }

    async fn delete_relationships_at_least(&self, rel_type: &str, key: &str, min: i64) -> Result<u64> {
        self.inner.delete_relationships_at_least(rel_type, key, min).await
    }

    async fn wipe_relationships(&self, rel_type: &str) -> Result<u64> {
        self.inner.wipe_relationships(rel_type).await
    }

    async fn compute_and_store_degree(&self, spec: &DegreeSpec) -> Result<()> {
        self.inner.compute_and_store_degree(spec).await
    }

    async fn connected_node_count(&self, node_label: &str, rel_type: &str, degree: Option<&DegreeFilter>) -> Result<u64> {
        self.inner.connected_node_count(node_label, rel_type, degree).await
    }

    async fn reach_exact(&self, query: &HopQuery) -> Result<Vec<Reached>> {
        let fault = {
            let mut armed = self.armed.lock();
            let due = armed.as_ref().is_some_and(|(hop, _, _)| *hop == query.hops);
            if due { armed.take() } else { None }
        };
        match fault {
            Some((_, Fault::Fail, _)) => Err(Error::StorageError("connection lost".into())),
            Some((_, Fault::Interrupt, handle)) => {
                if let Some(handle) = handle {
                    handle.trigger();
                }
                self.inner.reach_exact(query).await
            }
            None => self.inner.reach_exact(query).await,
        }
    }
}

/// A `FaultyStore` over a fresh `MemoryStore`, shared.
pub fn faulty() -> Arc<FaultyStore> {
    Arc::new(FaultyStore::new(MemoryStore::new()))
}
