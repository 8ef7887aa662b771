//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It uses simple HashMaps protected by RwLock.
//!
//! ## Limitations
//!
//! - **No transactions**: writes are applied immediately. An interrupted
//!   agglomeration leaves whatever was written so far, which is exactly the
//!   state the resume logic expects to clean up.
//! - **Single-writer only**: per-collection locks mean multi-step mutations
//!   are NOT atomic.
//! - **Exponential traversal**: `reach_exact` enumerates simple paths. Fine
//!   for tests and modest graphs, not for production-sized ones.
//!
//! State survives a process restart through [`GraphSnapshot`], which is
//! what lets the CLI resume an interrupted run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::{Error, Result};
use super::{DegreeFilter, DegreeSpec, EdgeBatch, GraphStore, HopQuery, OnDuplicate, Reached};

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory property graph store. Clones share the same graph.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id → list of relationship IDs
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    /// label → node IDs (poor man's label index)
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
}

/// Serializable copy of a whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                ..MemoryInner::default()
            }),
        }
    }

    /// Rebuild a store from a snapshot, keeping every id.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let store = Self::new();
        let max_node = snapshot.nodes.iter().map(|n| n.id.0).max().unwrap_or(0);
        let max_rel = snapshot.relationships.iter().map(|r| r.id.0).max().unwrap_or(0);
        {
            let mut nodes = store.inner.nodes.write();
            let mut adj = store.inner.adjacency.write();
            let mut idx = store.inner.label_index.write();
            for node in snapshot.nodes {
                for label in &node.labels {
                    idx.entry(label.clone()).or_default().push(node.id);
                }
                adj.insert(node.id, Vec::new());
                nodes.insert(node.id, node);
            }
        }
        for rel in snapshot.relationships {
            store.attach(rel)?;
        }
        store.inner.next_node_id.store(max_node + 1, Ordering::Relaxed);
        store.inner.next_rel_id.store(max_rel + 1, Ordering::Relaxed);
        Ok(store)
    }

    /// Copy the whole graph out, ordered by id.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<Node> = self.inner.nodes.read().values().cloned().collect();
        nodes.sort_by_key(|n| n.id);
        let mut relationships: Vec<Relationship> =
            self.inner.relationships.read().values().cloned().collect();
        relationships.sort_by_key(|r| r.id);
        GraphSnapshot { nodes, relationships }
    }

    // ========================================================================
    // Sync helpers (no lock is ever held across an await)
    // ========================================================================

    fn insert_node(&self, labels: &[&str], props: PropertyMap) -> NodeId {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node {
            id,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: props,
        };
        {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                idx.entry(label.clone()).or_default().push(id);
            }
        }
        self.inner.nodes.write().insert(id, node);
        self.inner.adjacency.write().insert(id, Vec::new());
        id
    }

    fn insert_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let mut rel = Relationship::new(id, src, dst, rel_type);
        rel.properties = props;
        self.attach(rel)?;
        Ok(id)
    }

    /// Store a relationship and wire it into the adjacency lists.
    fn attach(&self, rel: Relationship) -> Result<()> {
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&rel.src) {
                return Err(Error::NotFound(format!("Source node {}", rel.src)));
            }
            if !nodes.contains_key(&rel.dst) {
                return Err(Error::NotFound(format!("Target node {}", rel.dst)));
            }
        }
        let (id, src, dst) = (rel.id, rel.src, rel.dst);
        self.inner.relationships.write().insert(id, rel);
        let mut adj = self.inner.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }
        Ok(())
    }

    fn remove_relationship(&self, id: RelId) -> bool {
        let removed = self.inner.relationships.write().remove(&id);
        if let Some(rel) = &removed {
            let mut adj = self.inner.adjacency.write();
            if let Some(rels) = adj.get_mut(&rel.src) {
                rels.retain(|rid| *rid != id);
            }
            if rel.src != rel.dst {
                if let Some(rels) = adj.get_mut(&rel.dst) {
                    rels.retain(|rid| *rid != id);
                }
            }
        }
        removed.is_some()
    }

    fn detach_delete(&self, id: NodeId) -> bool {
        let rel_ids = self.inner.adjacency.read().get(&id).cloned().unwrap_or_default();
        for rid in rel_ids {
            self.remove_relationship(rid);
        }
        let removed = self.inner.nodes.write().remove(&id);
        self.inner.adjacency.write().remove(&id);
        if let Some(node) = &removed {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                if let Some(ids) = idx.get_mut(label) {
                    ids.retain(|nid| *nid != id);
                }
            }
        }
        removed.is_some()
    }

    /// Relationships of `node` walkable in `dir`, optionally of one type.
    fn relationships_of(&self, node: NodeId, dir: Direction, rel_type: Option<&str>) -> Vec<Relationship> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();
        adj.get(&node)
            .map(|ids| {
                ids.iter()
                    .filter_map(|rid| rels.get(rid))
                    .filter(|rel| rel.follows(node, dir))
                    .filter(|rel| rel_type.is_none_or(|t| rel.rel_type == t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `(src)-[rel_type]->(dst)` relationship, if any.
    fn find_directed(&self, src: NodeId, dst: NodeId, rel_type: &str) -> Option<RelId> {
        self.relationships_of(src, Direction::Outgoing, Some(rel_type))
            .into_iter()
            .find(|rel| rel.dst == dst)
            .map(|rel| rel.id)
    }

    fn node_has_label(&self, id: NodeId, label: &str) -> bool {
        self.inner.nodes.read().get(&id).is_some_and(|n| n.has_label(label))
    }

    fn ids_by_label(&self, label: &str) -> Vec<NodeId> {
        let mut ids = self.inner.label_index.read().get(label).cloned().unwrap_or_default();
        ids.sort();
        ids
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    // ========================================================================
    // Schema introspection
    // ========================================================================

    async fn label_exists(&self, label: &str) -> Result<bool> {
        Ok(self.inner.label_index.read().get(label).is_some_and(|ids| !ids.is_empty()))
    }

    async fn relationship_type_exists(&self, rel_type: &str) -> Result<bool> {
        Ok(self.inner.relationships.read().values().any(|r| r.rel_type == rel_type))
    }

    async fn attribute_exists(&self, label: &str, attr: &str) -> Result<bool> {
        let nodes = self.inner.nodes.read();
        Ok(self.ids_by_label(label)
            .iter()
            .filter_map(|id| nodes.get(id))
            .any(|n| n.properties.contains_key(attr)))
    }

    async fn relationship_attribute_exists(&self, rel_type: &str, attr: &str) -> Result<bool> {
        Ok(self.inner.relationships.read()
            .values()
            .any(|r| r.rel_type == rel_type && r.properties.contains_key(attr)))
    }

    async fn node_count(&self, label: &str) -> Result<u64> {
        Ok(self.inner.label_index.read().get(label).map_or(0, |ids| ids.len() as u64))
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId> {
        Ok(self.insert_node(labels, props))
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    async fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>> {
        let ids = self.ids_by_label(label);
        let nodes = self.inner.nodes.read();
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    async fn set_node_property(&self, id: NodeId, key: &str, val: Value) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        node.properties.insert(key.to_string(), val);
        Ok(())
    }

    async fn delete_nodes_at_least(&self, label: &str, key: &str, min: i64) -> Result<u64> {
        let doomed: Vec<NodeId> = {
            let nodes = self.inner.nodes.read();
            self.ids_by_label(label)
                .into_iter()
                .filter(|id| {
                    nodes.get(id)
                        .and_then(|n| n.get(key))
                        .and_then(|v| v.compare(&Value::Int(min)))
                        .is_some_and(|ord| ord.is_ge())
                })
                .collect()
        };
        Ok(doomed.into_iter().filter(|id| self.detach_delete(*id)).count() as u64)
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    async fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        self.insert_relationship(src, dst, rel_type, props)
    }

    async fn relationships_by_type(&self, rel_type: &str) -> Result<Vec<Relationship>> {
        let mut result: Vec<Relationship> = self.inner.relationships.read()
            .values()
            .filter(|r| r.rel_type == rel_type)
            .cloned()
            .collect();
        result.sort_by_key(|r| r.id);
        Ok(result)
    }

    async fn merge_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        on_create: PropertyMap,
    ) -> Result<bool> {
        if self.find_directed(src, dst, rel_type).is_some() {
            return Ok(false);
        }
        self.insert_relationship(src, dst, rel_type, on_create)?;
        Ok(true)
    }

    async fn write_edges(&self, batch: EdgeBatch) -> Result<u64> {
        let mut written = 0u64;
        for edge in batch.edges {
            if !self.node_has_label(edge.source, &batch.source_label)
                || !self.node_has_label(edge.target, &batch.target_label)
            {
                continue;
            }
            match self.find_directed(edge.source, edge.target, &batch.edge_label) {
                Some(rid) => {
                    let mut rels = self.inner.relationships.write();
                    let rel = rels.get_mut(&rid)
                        .ok_or_else(|| Error::NotFound(format!("Relationship {rid}")))?;
                    for (key, val) in edge.properties {
                        let merged = match (batch.on_duplicate, rel.properties.get(&key)) {
                            (OnDuplicate::Increment, Some(Value::Int(a))) => match val {
                                Value::Int(b) => Value::Int(a + b),
                                other => other.as_float().map_or(other, |b| Value::Float(*a as f64 + b)),
                            },
                            (OnDuplicate::Increment, Some(Value::Float(a))) => {
                                val.as_float().map_or(val, |b| Value::Float(a + b))
                            }
                            _ => val,
                        };
                        rel.properties.insert(key, merged);
                    }
                }
                None => {
                    self.insert_relationship(edge.source, edge.target, &batch.edge_label, edge.properties)?;
                }
            }
            written += 1;
        }
        Ok(written)
    }

    async fn delete_relationships_at_least(&self, rel_type: &str, key: &str, min: i64) -> Result<u64> {
        let doomed: Vec<RelId> = self.inner.relationships.read()
            .values()
            .filter(|r| r.rel_type == rel_type)
            .filter(|r| {
                r.get(key)
                    .and_then(|v| v.compare(&Value::Int(min)))
                    .is_some_and(|ord| ord.is_ge())
            })
            .map(|r| r.id)
            .collect();
        Ok(doomed.into_iter().filter(|id| self.remove_relationship(*id)).count() as u64)
    }

    async fn wipe_relationships(&self, rel_type: &str) -> Result<u64> {
        let doomed: Vec<RelId> = self.inner.relationships.read()
            .values()
            .filter(|r| r.rel_type == rel_type)
            .map(|r| r.id)
            .collect();
        Ok(doomed.into_iter().filter(|id| self.remove_relationship(*id)).count() as u64)
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    async fn compute_and_store_degree(&self, spec: &DegreeSpec) -> Result<()> {
        for id in self.ids_by_label(&spec.node_label) {
            let degree = self.relationships_of(id, spec.direction, Some(&spec.rel_type))
                .iter()
                .filter(|rel| match &spec.target_label {
                    Some(label) => rel.other_node(id).is_some_and(|o| self.node_has_label(o, label)),
                    None => true,
                })
                .count();
            if let Some(node) = self.inner.nodes.write().get_mut(&id) {
                node.properties.insert(spec.property.clone(), Value::Int(degree as i64));
            }
        }
        Ok(())
    }

    async fn connected_node_count(
        &self,
        node_label: &str,
        rel_type: &str,
        degree: Option<&DegreeFilter>,
    ) -> Result<u64> {
        let mut count = 0u64;
        for id in self.ids_by_label(node_label) {
            let admitted = match degree {
                Some(filter) => self.inner.nodes.read().get(&id).is_some_and(|n| filter.admits(n)),
                None => true,
            };
            if !admitted {
                continue;
            }
            let connected = self.relationships_of(id, Direction::Both, Some(rel_type))
                .iter()
                .any(|rel| rel.other_node(id).is_some_and(|o| self.node_has_label(o, node_label)));
            if connected {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn reach_exact(&self, query: &HopQuery) -> Result<Vec<Reached>> {
        if query.hops == 0 {
            return Err(Error::StorageError("reach_exact needs at least one hop".into()));
        }
        let start = self.inner.nodes.read().get(&query.start).cloned()
            .ok_or_else(|| Error::NotFound(format!("Node {}", query.start)))?;

        let target = query.hops as usize;
        let mut best: HashMap<NodeId, f64> = HashMap::new();

        // BFS over simple paths; only paths of exactly `hops` relationships count.
        let mut queue: Vec<Path> = vec![Path::single(start)];
        for current_depth in 0..target {
            let mut next_queue = Vec::new();
            for path in &queue {
                let Some(tip) = path.end() else { continue };
                for rel in self.relationships_of(tip.id, query.direction, Some(&query.rel_type)) {
                    let next_id = rel.other_node(tip.id).unwrap_or(rel.dst);
                    // Avoid cycles
                    if path.contains(next_id) {
                        continue;
                    }
                    let Some(next_node) = self.inner.nodes.read().get(&next_id).cloned() else {
                        continue;
                    };
                    if let Some(filter) = &query.degree {
                        if !filter.admits(&next_node) {
                            continue;
                        }
                    }
                    let mut new_path = path.clone();
                    new_path.append(rel, next_node);
                    if current_depth + 1 == target {
                        if new_path.end().is_some_and(|n| n.has_label(&query.end_label)) {
                            let weight = query.weight.as_deref().map_or(0.0, |w| new_path.weight(w));
                            best.entry(next_id)
                                .and_modify(|w| *w = w.max(weight))
                                .or_insert(weight);
                        }
                    } else {
                        next_queue.push(new_path);
                    }
                }
            }
            queue = next_queue;
            if queue.is_empty() { break; }
        }

        let mut reached: Vec<Reached> = best.into_iter()
            .map(|(node, path_weight)| Reached { node, path_weight })
            .collect();
        reached.sort_by_key(|r| r.node);
        Ok(reached)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::props;
    use crate::storage::EdgeSpec;

    fn hop_query(start: NodeId, hops: u32) -> HopQuery {
        HopQuery {
            start,
            hops,
            rel_type: "KNOWS".into(),
            direction: Direction::Both,
            end_label: "Person".into(),
            degree: None,
            weight: None,
        }
    }

    async fn chain(db: &MemoryStore, len: usize) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for _ in 0..len {
            ids.push(db.create_node(&["Person"], PropertyMap::new()).await.unwrap());
        }
        for pair in ids.windows(2) {
            db.create_relationship(pair[0], pair[1], "KNOWS", props([("w", 2i64)])).await.unwrap();
        }
        ids
    }

    #[tokio::test]
    async fn test_create_and_get_node() {
        let db = MemoryStore::new();
        let id = db.create_node(&["Person"], props([("name", "Ada")])).await.unwrap();
        let node = db.get_node(id).await.unwrap().unwrap();
        assert_eq!(node.labels, vec!["Person"]);
        assert_eq!(node.get("name"), Some(&Value::from("Ada")));
        assert!(db.label_exists("Person").await.unwrap());
        assert!(!db.label_exists("Company").await.unwrap());
    }

    #[tokio::test]
    async fn test_relationship_to_missing_node_fails() {
        let db = MemoryStore::new();
        let a = db.create_node(&["Person"], PropertyMap::new()).await.unwrap();
        let result = db.create_relationship(a, NodeId(99), "KNOWS", PropertyMap::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reach_exact_is_not_a_range() {
        let db = MemoryStore::new();
        let ids = chain(&db, 4).await;
        let one = db.reach_exact(&hop_query(ids[0], 1)).await.unwrap();
        assert_eq!(one.iter().map(|r| r.node).collect::<Vec<_>>(), vec![ids[1]]);
        let two = db.reach_exact(&hop_query(ids[0], 2)).await.unwrap();
        assert_eq!(two.iter().map(|r| r.node).collect::<Vec<_>>(), vec![ids[2]]);
        let four = db.reach_exact(&hop_query(ids[0], 4)).await.unwrap();
        assert!(four.is_empty());
    }

    #[tokio::test]
    async fn test_reach_exact_direction_and_weight() {
        let db = MemoryStore::new();
        let ids = chain(&db, 3).await;
        let mut q = hop_query(ids[2], 1);
        q.direction = Direction::Outgoing;
        assert!(db.reach_exact(&q).await.unwrap().is_empty());
        q.direction = Direction::Incoming;
        q.hops = 2;
        q.weight = Some("w".into());
        let reached = db.reach_exact(&q).await.unwrap();
        assert_eq!(reached, vec![Reached { node: ids[0], path_weight: 4.0 }]);
    }

    #[tokio::test]
    async fn test_reach_exact_degree_filter_blocks_intermediate() {
        let db = MemoryStore::new();
        let ids = chain(&db, 3).await;
        db.set_node_property(ids[1], "deg", Value::Int(1)).await.unwrap();
        db.set_node_property(ids[2], "deg", Value::Int(5)).await.unwrap();
        let mut q = hop_query(ids[0], 2);
        q.degree = Some(DegreeFilter { property: "deg".into(), min: 2 });
        assert!(db.reach_exact(&q).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_relationship_is_create_once() {
        let db = MemoryStore::new();
        let ids = chain(&db, 2).await;
        assert!(db.merge_relationship(ids[0], ids[1], "META", props([("score", 1.0)])).await.unwrap());
        assert!(!db.merge_relationship(ids[0], ids[1], "META", props([("score", 9.0)])).await.unwrap());
        let metas = db.relationships_by_type("META").await.unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].get("score"), Some(&Value::Float(1.0)));
        // Reverse direction is a different pair
        assert!(db.merge_relationship(ids[1], ids[0], "META", PropertyMap::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_edges_overwrite_and_increment() {
        let db = MemoryStore::new();
        let ids = chain(&db, 2).await;
        let batch = |on_duplicate| EdgeBatch {
            edges: vec![EdgeSpec { source: ids[0], target: ids[1], properties: props([("n", 2i64)]) }],
            source_label: "Person".into(),
            edge_label: "LINK".into(),
            target_label: "Person".into(),
            on_duplicate,
        };
        assert_eq!(db.write_edges(batch(OnDuplicate::Overwrite)).await.unwrap(), 1);
        db.write_edges(batch(OnDuplicate::Overwrite)).await.unwrap();
        assert_eq!(db.relationships_by_type("LINK").await.unwrap()[0].get("n"), Some(&Value::Int(2)));
        db.write_edges(batch(OnDuplicate::Increment)).await.unwrap();
        let links = db.relationships_by_type("LINK").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].get("n"), Some(&Value::Int(4)));
    }

    #[tokio::test]
    async fn test_write_edges_skips_wrong_labels() {
        let db = MemoryStore::new();
        let ids = chain(&db, 2).await;
        let written = db.write_edges(EdgeBatch {
            edges: vec![EdgeSpec { source: ids[0], target: ids[1], properties: PropertyMap::new() }],
            source_label: "CORE".into(),
            edge_label: "LINK".into(),
            target_label: "Person".into(),
            on_duplicate: OnDuplicate::Overwrite,
        }).await.unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_threshold_deletes() {
        let db = MemoryStore::new();
        let ids = chain(&db, 3).await;
        for (i, hop) in [(0usize, 1i64), (1, 2)] {
            db.create_relationship(ids[2], ids[i], "REP", props([("distance", hop)])).await.unwrap();
            db.create_node(&["LEDGER"], props([("hop", hop)])).await.unwrap();
        }
        assert_eq!(db.delete_relationships_at_least("REP", "distance", 2).await.unwrap(), 1);
        assert_eq!(db.relationships_by_type("REP").await.unwrap().len(), 1);
        assert_eq!(db.delete_nodes_at_least("LEDGER", "hop", 1).await.unwrap(), 2);
        assert_eq!(db.node_count("LEDGER").await.unwrap(), 0);
        assert_eq!(db.wipe_relationships("KNOWS").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_degree_and_connected_count() {
        let db = MemoryStore::new();
        let ids = chain(&db, 3).await;
        db.create_node(&["Person"], PropertyMap::new()).await.unwrap(); // isolated
        db.compute_and_store_degree(&DegreeSpec {
            node_label: "Person".into(),
            rel_type: "KNOWS".into(),
            target_label: None,
            property: "deg".into(),
            direction: Direction::Both,
        }).await.unwrap();
        let middle = db.get_node(ids[1]).await.unwrap().unwrap();
        assert_eq!(middle.get("deg"), Some(&Value::Int(2)));
        assert_eq!(db.connected_node_count("Person", "KNOWS", None).await.unwrap(), 3);
        let filter = DegreeFilter { property: "deg".into(), min: 2 };
        assert_eq!(db.connected_node_count("Person", "KNOWS", Some(&filter)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_keeps_ids() {
        let db = MemoryStore::new();
        let ids = chain(&db, 3).await;
        let restored = MemoryStore::from_snapshot(db.snapshot()).unwrap();
        assert_eq!(restored.snapshot(), db.snapshot());
        let reached = restored.reach_exact(&hop_query(ids[0], 2)).await.unwrap();
        assert_eq!(reached[0].node, ids[2]);
        let fresh = restored.create_node(&["Person"], PropertyMap::new()).await.unwrap();
        assert!(fresh.0 > ids[2].0);
    }
}
