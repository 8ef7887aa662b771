//! Agglomeration progress: in-memory counters plus a durable per-hop,
//! per-core ledger kept in the store.
//!
//! The ledger is what makes a run resumable from a different process: a hop
//! is complete exactly when it has one ledger record per core.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Node, NodeId, PropertyMap, Value, props};
use crate::storage::GraphStore;
use crate::{Error, Result};

/// Label every ledger node carries next to the configured ledger label.
pub const META_LABEL: &str = "META";

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time copy of the counters, for reports and interrupt errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Ledger records persisted over the whole run, resumed ones included.
    pub pass: u64,
    /// Ledger records persisted by this invocation.
    pub local_pass: u64,
    pub hop: u32,
    /// 1-based index of the core being processed.
    pub core_index: usize,
    pub n_cores: usize,
    pub graph_size: u64,
    pub n_assigned: u64,
    pub ratio: f64,
    pub last_elapsed_secs: f64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hop {} | core {}/{} | assigned {}/{} ({:.4}) | pass {} | last query {:.3}s",
            self.hop, self.core_index, self.n_cores,
            self.n_assigned, self.graph_size, self.ratio,
            self.pass, self.last_elapsed_secs,
        )
    }
}

// ============================================================================
// ProgressMetrics
// ============================================================================

/// Counters and timer for the running agglomeration.
#[derive(Debug, Default)]
pub struct ProgressMetrics {
    pass: u64,
    local_pass: u64,
    hop: u32,
    core_index: usize,
    n_cores: usize,
    graph_size: u64,
    n_assigned: u64,
    ratio: f64,
    started: Option<Instant>,
    last_elapsed: Duration,
}

impl ProgressMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(&self) -> u64 { self.pass }
    pub fn local_pass(&self) -> u64 { self.local_pass }

    pub fn set_position(&mut self, hop: u32, core_index: usize, n_cores: usize) {
        self.hop = hop;
        self.core_index = core_index;
        self.n_cores = n_cores;
    }

    /// Refresh coverage. The ratio is rounded to 4 places and is 0 for an
    /// empty graph.
    pub fn update(&mut self, graph_size: u64, n_assigned: u64) {
        self.graph_size = graph_size;
        self.n_assigned = n_assigned;
        self.ratio = if graph_size == 0 {
            0.0
        } else {
            (n_assigned as f64 / graph_size as f64 * 10_000.0).round() / 10_000.0
        };
    }

    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn stop_timer(&mut self) -> Duration {
        if let Some(started) = self.started.take() {
            self.last_elapsed = started.elapsed();
        }
        self.last_elapsed
    }

    /// Ledger record for the current position. Call after `stop_timer`.
    pub fn record(&self) -> ProgressRecord {
        ProgressRecord {
            hop: self.hop,
            core_index: self.core_index,
            elapsed_secs: self.last_elapsed.as_secs_f64(),
            graph_size: self.graph_size,
            n_assigned: self.n_assigned,
            ratio: self.ratio,
            recorded_at: Utc::now(),
        }
    }

    /// Count a record as persisted.
    pub fn note_persisted(&mut self) {
        self.pass += 1;
        self.local_pass += 1;
    }

    /// Pick up where a previous process left off.
    pub fn restore(&mut self, records: &[ProgressRecord]) {
        self.pass = records.len() as u64;
        self.local_pass = 0;
        if let Some(last) = records.last() {
            self.hop = last.hop;
            self.core_index = last.core_index;
            self.graph_size = last.graph_size;
            self.n_assigned = last.n_assigned;
            self.ratio = last.ratio;
            self.last_elapsed = Duration::from_secs_f64(last.elapsed_secs.max(0.0));
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pass: self.pass,
            local_pass: self.local_pass,
            hop: self.hop,
            core_index: self.core_index,
            n_cores: self.n_cores,
            graph_size: self.graph_size,
            n_assigned: self.n_assigned,
            ratio: self.ratio,
            last_elapsed_secs: self.last_elapsed.as_secs_f64(),
        }
    }
}

impl fmt::Display for ProgressMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.snapshot().fmt(f)
    }
}

// ============================================================================
// ProgressRecord
// ============================================================================

/// One ledger entry: a single core's query at a single hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub hop: u32,
    pub core_index: usize,
    pub elapsed_secs: f64,
    pub graph_size: u64,
    pub n_assigned: u64,
    pub ratio: f64,
    pub recorded_at: DateTime<Utc>,
}

impl ProgressRecord {
    fn to_properties(&self) -> PropertyMap {
        let mut map = props([
            ("hop", Value::from(self.hop)),
            ("core_index", Value::Int(self.core_index as i64)),
            ("elapsed_secs", Value::Float(self.elapsed_secs)),
            ("graph_size", Value::Int(self.graph_size as i64)),
            ("n_assigned", Value::Int(self.n_assigned as i64)),
            ("ratio", Value::Float(self.ratio)),
        ]);
        map.insert("recorded_at".into(), Value::DateTime(self.recorded_at));
        map
    }

    fn from_node(node: &Node) -> Result<Self> {
        let recorded_at = match node.get("recorded_at") {
            Some(Value::DateTime(dt)) => *dt,
            other => return Err(type_error("DATETIME", other)),
        };
        Ok(Self {
            hop: int_property(node, "hop")? as u32,
            core_index: int_property(node, "core_index")? as usize,
            elapsed_secs: float_property(node, "elapsed_secs")?,
            graph_size: int_property(node, "graph_size")? as u64,
            n_assigned: int_property(node, "n_assigned")? as u64,
            ratio: float_property(node, "ratio")?,
            recorded_at,
        })
    }
}

fn type_error(expected: &str, got: Option<&Value>) -> Error {
    Error::TypeError {
        expected: expected.into(),
        got: got.map_or("missing", Value::type_name).into(),
    }
}

fn int_property(node: &Node, key: &str) -> Result<i64> {
    let value = node.get(key);
    value.and_then(Value::as_int).ok_or_else(|| type_error("INTEGER", value))
}

fn float_property(node: &Node, key: &str) -> Result<f64> {
    let value = node.get(key);
    value.and_then(Value::as_float).ok_or_else(|| type_error("FLOAT", value))
}

// ============================================================================
// ProgressLedger
// ============================================================================

/// Durable ledger of `ProgressRecord`s, stored as `(:META:<label>)` nodes.
#[derive(Debug, Clone)]
pub struct ProgressLedger {
    label: String,
}

impl ProgressLedger {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    pub async fn record<S: GraphStore + ?Sized>(&self, store: &S, record: &ProgressRecord) -> Result<NodeId> {
        store.create_node(&[META_LABEL, &self.label], record.to_properties()).await
    }

    /// Every record, ordered by (hop, core index).
    pub async fn load<S: GraphStore + ?Sized>(&self, store: &S) -> Result<Vec<ProgressRecord>> {
        let mut records = store.nodes_by_label(&self.label).await?
            .iter()
            .map(ProgressRecord::from_node)
            .collect::<Result<Vec<_>>>()?;
        records.sort_by_key(|r| (r.hop, r.core_index));
        Ok(records)
    }

    pub async fn is_empty<S: GraphStore + ?Sized>(&self, store: &S) -> Result<bool> {
        Ok(store.node_count(&self.label).await? == 0)
    }

    /// Hops with exactly one record per core, ascending.
    pub async fn complete_hops<S: GraphStore + ?Sized>(&self, store: &S, n_cores: usize) -> Result<Vec<u32>> {
        let mut per_hop: BTreeMap<u32, usize> = BTreeMap::new();
        for record in self.load(store).await? {
            *per_hop.entry(record.hop).or_default() += 1;
        }
        Ok(per_hop.into_iter()
            .filter(|(_, count)| *count == n_cores)
            .map(|(hop, _)| hop)
            .collect())
    }

    /// Drop every record with `hop >= from`.
    pub async fn purge_from<S: GraphStore + ?Sized>(&self, store: &S, from: u32) -> Result<u64> {
        store.delete_nodes_at_least(&self.label, "hop", from as i64).await
    }

    pub async fn wipe<S: GraphStore + ?Sized>(&self, store: &S) -> Result<u64> {
        store.delete_nodes_at_least(&self.label, "hop", i64::MIN).await
    }
}
