//! Per-hop candidate pool: which cores reached a node at the current hop,
//! and with what path weight.

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::assignment::{Assignment, AssignmentTable};
use crate::model::NodeId;
use crate::storage::Reached;

/// Most nodes are reached by one or two cores per hop.
type Candidates = SmallVec<[(NodeId, f64); 2]>;

#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    pool: HashMap<NodeId, Candidates>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Record that `core` reached `node` with `weight`. A second report from
    /// the same core replaces the first.
    pub fn offer(&mut self, node: NodeId, core: NodeId, weight: f64) {
        let candidates = self.pool.entry(node).or_default();
        match candidates.iter_mut().find(|(c, _)| *c == core) {
            Some(entry) => entry.1 = weight,
            None => candidates.push((core, weight)),
        }
    }

    /// Record a whole traversal result for `core`.
    pub fn offer_all(&mut self, core: NodeId, reached: &[Reached]) {
        for r in reached {
            self.offer(r.node, core, r.path_weight);
        }
    }

    /// Drop nodes that already have a final assignment. Returns how many
    /// were dropped.
    pub fn retain_unassigned(&mut self, table: &AssignmentTable) -> usize {
        let before = self.pool.len();
        self.pool.retain(|node, _| !table.contains(*node));
        before - self.pool.len()
    }

    /// Pick one core per node: highest path weight, ties going to the lowest
    /// core id. Output is ordered by node id.
    pub fn resolve(self, distance: u32, weighted: bool) -> Vec<(NodeId, Assignment)> {
        let mut resolved: Vec<(NodeId, Assignment)> = self.pool
            .into_iter()
            .filter_map(|(node, candidates)| {
                let (core, weight) = candidates.into_iter().reduce(|best, next| {
                    match next.1.total_cmp(&best.1).then_with(|| best.0.cmp(&next.0)) {
                        std::cmp::Ordering::Greater => next,
                        _ => best,
                    }
                })?;
                let assignment = Assignment::new(core, distance);
                Some((node, if weighted { assignment.with_path_weight(weight) } else { assignment }))
            })
            .collect();
        resolved.sort_by_key(|(node, _)| *node);
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_weight_wins() {
        let mut pool = CandidatePool::new();
        pool.offer(NodeId(10), NodeId(1), 1.0);
        pool.offer(NodeId(10), NodeId(2), 4.0);
        pool.offer(NodeId(10), NodeId(3), 2.0);
        let resolved = pool.resolve(2, true);
        assert_eq!(resolved, vec![(NodeId(10), Assignment::new(NodeId(2), 2).with_path_weight(4.0))]);
    }

    #[test]
    fn test_ties_go_to_lowest_core() {
        let mut pool = CandidatePool::new();
        pool.offer(NodeId(10), NodeId(7), 0.0);
        pool.offer(NodeId(10), NodeId(3), 0.0);
        pool.offer(NodeId(10), NodeId(5), 0.0);
        assert_eq!(pool.resolve(1, false)[0].1, Assignment::new(NodeId(3), 1));
    }

    #[test]
    fn test_repeat_offer_replaces_weight() {
        let mut pool = CandidatePool::new();
        pool.offer(NodeId(10), NodeId(1), 9.0);
        pool.offer(NodeId(10), NodeId(2), 5.0);
        pool.offer(NodeId(10), NodeId(1), 1.0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.resolve(1, false)[0].1.core, NodeId(2));
    }

    #[test]
    fn test_retain_unassigned() {
        let mut pool = CandidatePool::new();
        pool.offer_all(NodeId(1), &[
            Reached { node: NodeId(1), path_weight: 0.0 },
            Reached { node: NodeId(4), path_weight: 0.0 },
        ]);
        let table = AssignmentTable::seeded(&[NodeId(1)]);
        assert_eq!(pool.retain_unassigned(&table), 1);
        assert_eq!(pool.resolve(1, false).len(), 1);
    }
}
