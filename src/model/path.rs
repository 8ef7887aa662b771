//! Path: a sequence of alternating nodes and relationships.

use serde::{Deserialize, Serialize};
use super::{Node, Relationship};

/// A path in the graph: node -[rel]- node -[rel]- node ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Nodes along the path. Always has one more element than `relationships`.
    pub nodes: Vec<Node>,
    /// Relationships connecting consecutive nodes.
    pub relationships: Vec<Relationship>,
}

impl Path {
    pub fn single(node: Node) -> Self {
        Self { nodes: vec![node], relationships: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Last node of the path. `None` only for a hand-built path with no nodes.
    pub fn end(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn contains(&self, node: super::NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == node)
    }

    /// Running sum of a numeric relationship property along the path.
    /// Relationships without the property contribute nothing.
    pub fn weight(&self, key: &str) -> f64 {
        self.relationships
            .iter()
            .filter_map(|r| r.get(key).and_then(|v| v.as_float()))
            .sum()
    }

    /// Extend path with a relationship and its target node.
    pub fn append(&mut self, rel: Relationship, node: Node) {
        self.relationships.push(rel);
        self.nodes.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeId, RelId};

    #[test]
    fn test_weight_sums_property() {
        let mut path = Path::single(Node::new(NodeId(1)));
        path.append(
            Relationship::new(RelId(1), NodeId(1), NodeId(2), "R").with_property("w", 2.5),
            Node::new(NodeId(2)),
        );
        path.append(
            Relationship::new(RelId(2), NodeId(2), NodeId(3), "R").with_property("w", 1i64),
            Node::new(NodeId(3)),
        );
        assert_eq!(path.len(), 2);
        assert_eq!(path.weight("w"), 3.5);
        assert_eq!(path.weight("missing"), 0.0);
        assert_eq!(path.end().map(|n| n.id), Some(NodeId(3)));
    }
}
