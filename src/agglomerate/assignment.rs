//! Finalised node -> core assignments.
//!
//! An arena keyed by node id. Entries are only ever added: `merge` inserts
//! if absent, so a node finalised at one hop keeps its core and distance for
//! good.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{NodeId, PropertyMap, Relationship, Value};
use crate::storage::EdgeSpec;

/// Where a node ended up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub core: NodeId,
    pub distance: u32,
    /// Weight of the winning path, weighted runs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_weight: Option<f64>,
}

impl Assignment {
    pub fn new(core: NodeId, distance: u32) -> Self {
        Self { core, distance, path_weight: None }
    }

    pub fn with_path_weight(mut self, weight: f64) -> Self {
        self.path_weight = Some(weight);
        self
    }

    fn to_properties(self) -> PropertyMap {
        let mut map = PropertyMap::new();
        map.insert("distance".into(), Value::from(self.distance));
        if let Some(weight) = self.path_weight {
            map.insert("path_weight".into(), Value::Float(weight));
        }
        map
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentTable {
    entries: HashMap<NodeId, Assignment>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every core represents itself at distance 0.
    pub fn seeded(cores: &[NodeId]) -> Self {
        Self {
            entries: cores.iter().map(|&c| (c, Assignment::new(c, 0))).collect(),
        }
    }

    /// Rebuild from persisted represents edges (`src` is the core).
    /// Edges without an integer `distance` are ignored.
    pub fn from_relationships(rels: &[Relationship]) -> Self {
        let mut table = Self::new();
        for rel in rels {
            let Some(distance) = rel.get("distance").and_then(Value::as_int) else {
                continue;
            };
            let mut assignment = Assignment::new(rel.src, distance.max(0) as u32);
            assignment.path_weight = rel.get("path_weight").and_then(Value::as_float);
            table.entries.entry(rel.dst).or_insert(assignment);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, node: NodeId) -> Option<&Assignment> {
        self.entries.get(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }

    /// Insert entries for nodes not yet assigned. Returns how many were
    /// added; entries for already assigned nodes are dropped.
    pub fn merge(&mut self, resolved: impl IntoIterator<Item = (NodeId, Assignment)>) -> usize {
        let mut added = 0;
        for (node, assignment) in resolved {
            if !self.entries.contains_key(&node) {
                self.entries.insert(node, assignment);
                added += 1;
            }
        }
        added
    }

    /// All entries ordered by node id.
    pub fn sorted(&self) -> Vec<(NodeId, Assignment)> {
        let mut all: Vec<_> = self.entries.iter().map(|(n, a)| (*n, *a)).collect();
        all.sort_by_key(|(n, _)| *n);
        all
    }

    /// Represents edges for the entries finalised at `distance`.
    pub fn edges_at(&self, distance: u32) -> Vec<EdgeSpec> {
        self.sorted()
            .into_iter()
            .filter(|(_, a)| a.distance == distance)
            .map(|(node, a)| EdgeSpec {
                source: a.core,
                target: node,
                properties: a.to_properties(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelId;

    #[test]
    fn test_merge_never_overwrites() {
        let mut table = AssignmentTable::seeded(&[NodeId(1), NodeId(2)]);
        let added = table.merge([
            (NodeId(1), Assignment::new(NodeId(2), 1)),
            (NodeId(5), Assignment::new(NodeId(2), 1)),
        ]);
        assert_eq!(added, 1);
        assert_eq!(table.get(NodeId(1)), Some(&Assignment::new(NodeId(1), 0)));
        assert_eq!(table.merge([(NodeId(5), Assignment::new(NodeId(1), 2))]), 0);
        assert_eq!(table.get(NodeId(5)).map(|a| a.distance), Some(1));
    }

    #[test]
    fn test_edges_at_distance() {
        let mut table = AssignmentTable::seeded(&[NodeId(1)]);
        table.merge([(NodeId(3), Assignment::new(NodeId(1), 2).with_path_weight(1.5))]);
        let seeds = table.edges_at(0);
        assert_eq!(seeds.len(), 1);
        assert_eq!((seeds[0].source, seeds[0].target), (NodeId(1), NodeId(1)));

        let hop2 = table.edges_at(2);
        assert_eq!(hop2[0].properties.get("distance"), Some(&Value::Int(2)));
        assert_eq!(hop2[0].properties.get("path_weight"), Some(&Value::Float(1.5)));
        assert!(table.edges_at(1).is_empty());
    }

    #[test]
    fn test_from_relationships() {
        let rels = vec![
            Relationship::new(RelId(1), NodeId(1), NodeId(1), "REPRESENTS").with_property("distance", 0i64),
            Relationship::new(RelId(2), NodeId(1), NodeId(4), "REPRESENTS").with_property("distance", 1i64),
            Relationship::new(RelId(3), NodeId(2), NodeId(9), "REPRESENTS"),
        ];
        let table = AssignmentTable::from_relationships(&rels);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(NodeId(4)), Some(&Assignment::new(NodeId(1), 1)));
        assert!(!table.contains(NodeId(9)));
    }
}
