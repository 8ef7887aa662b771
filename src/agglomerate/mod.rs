//! # Agglomeration
//!
//! Assigns every node reachable from a core to its nearest core, hop by hop.
//!
//! ## Algorithm
//!
//! ```text
//! fresh start:  every core represents itself at distance 0
//! for hop in min..=max:
//!     for core in cores (ascending id):
//!         reached = nodes at exactly `hop` relationships from core
//!         candidate pool += (node, core, path weight)
//!         ledger += (hop, core index, timings, coverage)
//!     drop candidates already assigned at a smaller hop
//!     resolve: max path weight, ties to the lowest core id
//!     persist (core)-[:REPRESENTS {distance: hop}]->(node)
//! n_subnodes = represents out-degree of each core
//! ```
//!
//! ## Resuming
//!
//! Progress lives in the store, not in this struct. A hop is complete when
//! the ledger holds one record per core; the last of those records is only
//! written after the hop's represents edges are persisted. On resume every
//! represents edge and ledger record at or above the first incomplete hop is
//! discarded and the run restarts there.

mod assignment;
mod candidate;

pub use assignment::{Assignment, AssignmentTable};
pub use candidate::CandidatePool;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::config::{AgglomerationConfig, CompressionConfig, GraphLabels, HopRange};
use crate::meta::N_SUBNODES;
use crate::metrics::{MetricsSnapshot, ProgressLedger, ProgressMetrics};
use crate::model::{Direction, NodeId};
use crate::storage::{DegreeFilter, DegreeSpec, EdgeBatch, GraphStore, HopQuery, OnDuplicate};
use crate::{Error, Result};

// ============================================================================
// Interruption
// ============================================================================

/// Cooperative cancellation flag, checked before every core query. The
/// flag is consumed by the `Error::Interrupted` it causes.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of one `agglomerate()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgglomerationReport {
    /// First hop processed when resuming, `None` for a fresh start.
    pub resumed_from: Option<u32>,
    /// Hops processed by this call.
    pub hops: Vec<u32>,
    /// Total assignments, cores included.
    pub assigned: usize,
    pub metrics: MetricsSnapshot,
}

// ============================================================================
// Agglomerator
// ============================================================================

pub struct Agglomerator<S: GraphStore> {
    store: Arc<S>,
    labels: GraphLabels,
    settings: AgglomerationConfig,
    cores: Vec<NodeId>,
    graph_size: u64,
    degree: Option<DegreeFilter>,
    ledger: ProgressLedger,
    metrics: ProgressMetrics,
    assignments: AssignmentTable,
    /// Every node seen by any core query, resolved or not. Drives coverage.
    claimed: HashSet<NodeId>,
    current_hop: u32,
    interrupt: InterruptHandle,
}

impl<S: GraphStore> Agglomerator<S> {
    /// Validate the configuration against the store and prepare a run.
    /// Nothing is written except the degree property when a minimum degree
    /// is configured and the property is missing (or a recalculation is
    /// forced).
    pub async fn new(store: Arc<S>, config: &CompressionConfig) -> Result<Self> {
        config.validate()?;
        let labels = config.graph.clone();
        let settings = config.agglomeration.clone();

        for label in [&labels.node_label, &labels.core_label] {
            if !store.label_exists(label).await? {
                return Err(Error::Config(format!("No {label} nodes identified")));
            }
        }
        if !store.relationship_type_exists(&labels.rel_label).await? {
            return Err(Error::Config(format!("No {} relationships identified", labels.rel_label)));
        }
        if let Some(weight) = &labels.weight {
            if !store.relationship_attribute_exists(&labels.rel_label, weight).await? {
                return Err(Error::Config(format!(
                    "No {} relationship carries a {weight} attribute", labels.rel_label
                )));
            }
        }

        let core_nodes = store.nodes_by_label(&labels.core_label).await?;
        if let Some(max) = settings.max_cores {
            if core_nodes.len() > max {
                return Err(Error::Config(format!(
                    "{} {} nodes exceed max_cores = {max}", core_nodes.len(), labels.core_label
                )));
            }
        }
        if let Some(stray) = core_nodes.iter().find(|c| !c.has_label(&labels.node_label)) {
            return Err(Error::Config(format!(
                "core {} is not labelled {}", stray.id, labels.node_label
            )));
        }
        let cores: Vec<NodeId> = core_nodes.iter().map(|c| c.id).collect();

        let degree = match settings.min_degree {
            Some(min) => {
                let stored = store.attribute_exists(&labels.node_label, &settings.degree_property).await?;
                if !stored || settings.recalculate_degree {
                    store.compute_and_store_degree(&DegreeSpec {
                        node_label: labels.node_label.clone(),
                        rel_type: labels.rel_label.clone(),
                        target_label: Some(labels.node_label.clone()),
                        property: settings.degree_property.clone(),
                        direction: settings.orientation.direction(),
                    }).await?;
                    tracing::info!(property = %settings.degree_property, "Stored node degrees");
                }
                Some(DegreeFilter { property: settings.degree_property.clone(), min })
            }
            None => None,
        };

        let graph_size = store
            .connected_node_count(&labels.node_label, &labels.rel_label, degree.as_ref())
            .await?;

        tracing::info!(
            cores = cores.len(),
            graph_size,
            hops = %settings.hops,
            weighted = labels.weight.is_some(),
            "Agglomerator ready"
        );

        Ok(Self {
            store,
            ledger: ProgressLedger::new(settings.ledger_label.clone()),
            labels,
            settings,
            cores,
            graph_size,
            degree,
            metrics: ProgressMetrics::new(),
            assignments: AssignmentTable::new(),
            claimed: HashSet::new(),
            current_hop: 0,
            interrupt: InterruptHandle::default(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn cores(&self) -> &[NodeId] { &self.cores }
    pub fn graph_size(&self) -> u64 { self.graph_size }
    pub fn assignments(&self) -> &AssignmentTable { &self.assignments }
    pub fn metrics(&self) -> &ProgressMetrics { &self.metrics }
    pub fn current_hop(&self) -> u32 { self.current_hop }
    pub fn hop_range(&self) -> HopRange { self.settings.hops }

    /// Handle that stops the run before its next core query.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn set_hop_range(&mut self, hops: HopRange) {
        self.settings.hops = hops;
    }

    /// Hops with one ledger record per core, ascending.
    pub async fn list_complete_hops(&self) -> Result<Vec<u32>> {
        self.ledger.complete_hops(self.store.as_ref(), self.cores.len()).await
    }

    /// The traversal pattern, the degree constraint and the output pattern.
    pub fn describe(&self) -> String {
        let (left, right) = self.settings.orientation.endpoints();
        let GraphLabels { node_label: node, rel_label: rel, core_label: core, represents_label: represents, .. } =
            &self.labels;
        let mut text = format!("To traverse: ({node}){left}[{rel}]{right}({node})\n");
        if let Some(min) = self.settings.min_degree {
            text.push_str(&format!("({node}) must have at least {min} {rel} connections.\n"));
        }
        text.push_str(&format!("To create: ({core})-[{represents}]->({node})"));
        text
    }

    // ========================================================================
    // Run
    // ========================================================================

    /// Run (or resume) the agglomeration over the configured hop range.
    pub async fn agglomerate(&mut self) -> Result<AgglomerationReport> {
        let fresh = self.ledger.is_empty(self.store.as_ref()).await?;
        let start = if fresh {
            self.initialize().await?;
            Some(self.settings.hops.min())
        } else {
            self.resume().await?
        };

        let hops: Vec<u32> = match start {
            Some(start) => (start..=self.settings.hops.max()).collect(),
            None => Vec::new(),
        };
        for &hop in &hops {
            if let Err(err) = self.run_hop(hop).await {
                tracing::warn!(
                    hop,
                    position = %self.metrics.snapshot(),
                    error = %err,
                    "Agglomeration incomplete. Call agglomerate() to restart hop {hop}, or reset() to start over"
                );
                return Err(err);
            }
        }
        // Nothing is left to stop once the last query has returned.
        if self.interrupt.is_set() {
            self.interrupt.clear();
            tracing::debug!("Interrupt arrived after the final core query, ignored");
        }

        self.store_n_subnodes().await?;

        let report = AgglomerationReport {
            resumed_from: if fresh { None } else { start },
            hops,
            assigned: self.assignments.len(),
            metrics: self.metrics.snapshot(),
        };
        tracing::info!(assigned = report.assigned, graph_size = self.graph_size, "Agglomeration complete");
        Ok(report)
    }

    /// Fresh start: cores represent themselves at distance 0.
    async fn initialize(&mut self) -> Result<()> {
        self.current_hop = 0;
        self.metrics.reset();
        self.assignments = AssignmentTable::seeded(&self.cores);
        self.claimed = self.cores.iter().copied().collect();
        self.persist(0).await?;
        tracing::info!(cores = self.cores.len(), "Starting fresh agglomeration");
        Ok(())
    }

    /// Clean up after an interrupted run. Returns the hop to restart at, or
    /// `None` when every configured hop is already complete.
    async fn resume(&mut self) -> Result<Option<u32>> {
        let complete = self.list_complete_hops().await?;
        let start = self.settings.hops.hops().find(|h| !complete.contains(h));

        if let Some(start) = start {
            let edges = self.store
                .delete_relationships_at_least(&self.labels.represents_label, "distance", start as i64)
                .await?;
            let records = self.ledger.purge_from(self.store.as_ref(), start).await?;
            tracing::warn!(hop = start, edges, records, "Discarded incomplete hop before resuming");
        }

        let represents = self.store.relationships_by_type(&self.labels.represents_label).await?;
        self.assignments = AssignmentTable::from_relationships(&represents);
        self.claimed = self.assignments.nodes().collect();
        self.metrics.restore(&self.ledger.load(self.store.as_ref()).await?);
        self.metrics.update(self.graph_size, self.claimed.len() as u64);
        self.current_hop = start.unwrap_or(self.settings.hops.max());

        match start {
            Some(hop) => tracing::info!(hop, assigned = self.assignments.len(), "Resuming agglomeration"),
            None => tracing::info!("Every hop already complete, nothing to resume"),
        }
        Ok(start)
    }

    async fn run_hop(&mut self, hop: u32) -> Result<()> {
        self.current_hop = hop;
        let n_cores = self.cores.len();
        let mut pool = CandidatePool::new();
        let mut last_record = None;

        for (i, &core) in self.cores.iter().enumerate() {
            let index = i + 1;
            self.metrics.set_position(hop, index, n_cores);
            if self.interrupt.is_set() {
                self.interrupt.clear();
                return Err(Error::Interrupted { hop, snapshot: self.metrics.snapshot() });
            }

            self.metrics.start_timer();
            let reached = self.store.reach_exact(&self.hop_query(core, hop)).await?;
            self.claimed.extend(reached.iter().map(|r| r.node));
            pool.offer_all(core, &reached);
            let elapsed = self.metrics.stop_timer();
            self.metrics.update(self.graph_size, self.claimed.len() as u64);

            tracing::debug!(
                hop,
                core = %core,
                index,
                reached = reached.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Core query done"
            );

            let record = self.metrics.record();
            if index == n_cores {
                last_record = Some(record);
            } else {
                self.ledger.record(self.store.as_ref(), &record).await?;
                self.metrics.note_persisted();
            }
        }

        let stale = pool.retain_unassigned(&self.assignments);
        if stale > 0 {
            tracing::debug!(hop, stale, "Dropped candidates assigned at an earlier hop");
        }
        let added = self.assignments.merge(pool.resolve(hop, self.labels.weight.is_some()));
        self.persist(hop).await?;

        if let Some(record) = last_record {
            self.ledger.record(self.store.as_ref(), &record).await?;
            self.metrics.note_persisted();
        }

        tracing::info!(
            hop,
            added,
            assigned = self.assignments.len(),
            ratio = self.metrics.snapshot().ratio,
            "Hop complete"
        );
        Ok(())
    }

    fn hop_query(&self, core: NodeId, hops: u32) -> HopQuery {
        HopQuery {
            start: core,
            hops,
            rel_type: self.labels.rel_label.clone(),
            direction: self.settings.orientation.direction(),
            end_label: self.labels.node_label.clone(),
            degree: self.degree.clone(),
            weight: self.labels.weight.clone(),
        }
    }

    /// Write the represents edges finalised at `distance`.
    async fn persist(&self, distance: u32) -> Result<u64> {
        let edges = self.assignments.edges_at(distance);
        if edges.is_empty() {
            return Ok(0);
        }
        self.store.write_edges(EdgeBatch {
            edges,
            source_label: self.labels.core_label.clone(),
            edge_label: self.labels.represents_label.clone(),
            target_label: self.labels.node_label.clone(),
            on_duplicate: OnDuplicate::Overwrite,
        }).await
    }

    async fn store_n_subnodes(&self) -> Result<()> {
        self.store.compute_and_store_degree(&DegreeSpec {
            node_label: self.labels.core_label.clone(),
            rel_type: self.labels.represents_label.clone(),
            target_label: Some(self.labels.node_label.clone()),
            property: N_SUBNODES.into(),
            direction: Direction::Outgoing,
        }).await
    }

    /// Wipe represents edges and the ledger so the next run starts fresh.
    pub async fn reset(&mut self) -> Result<()> {
        let edges = self.store.wipe_relationships(&self.labels.represents_label).await?;
        let records = self.ledger.wipe(self.store.as_ref()).await?;
        self.metrics.reset();
        self.assignments = AssignmentTable::new();
        self.claimed.clear();
        self.current_hop = 0;
        tracing::info!(edges, records, "Reset agglomeration");
        Ok(())
    }
}
