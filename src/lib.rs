//! # coregraph: Core Graph Compression
//!
//! Compresses a large property graph into a small "core graph": a bounded
//! set of representative core nodes joined by scored meta-relations.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between the algorithms and storage
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Value` cross all boundaries
//! 3. **Durable progress**: agglomeration state lives in the store, never only in memory
//! 4. **Deterministic**: cores are processed in id order, ties resolve to the lowest core id
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use coregraph::{Agglomerator, CompressionConfig, MemoryStore, MetaRelator};
//!
//! # async fn example() -> coregraph::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! // ... load USER nodes, FOLLOWS edges, and tag selected cores with :CORE ...
//! let config = CompressionConfig::new("USER", "FOLLOWS");
//!
//! let mut agglomerator = Agglomerator::new(store.clone(), &config).await?;
//! agglomerator.agglomerate().await?;
//!
//! let mut meta = MetaRelator::new(store, &config);
//! meta.build_meta_relations().await?;
//! for edge in meta.get_core_edge_list(false).await? {
//!     println!("{} -> {} score={}", edge.source, edge.target, edge.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Type | Produces |
//! |-------|------|----------|
//! | Core selection | external | nodes labelled `CORE` |
//! | Agglomeration | `Agglomerator` | `(:CORE)-[:REPRESENTS {distance}]->(:NODE)`, `n_subnodes` |
//! | Meta-relations | `MetaRelator` | `(:CORE)-[:META_<REL> {weight, n_distinct, score}]->(:CORE)` |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod config;
pub mod metrics;
pub mod agglomerate;
pub mod meta;
pub mod squash;
pub mod export;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Path, Value, PropertyMap,
    NodeId, RelId, Direction,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{
    GraphStore, MemoryStore, GraphSnapshot,
    DegreeFilter, DegreeSpec, HopQuery, Reached, EdgeBatch, EdgeSpec, OnDuplicate,
};

// ============================================================================
// Re-exports: Engine
// ============================================================================

pub use config::{CompressionConfig, GraphLabels, AgglomerationConfig, HopRange, Orientation};
pub use metrics::{MetricsSnapshot, ProgressLedger, ProgressMetrics, ProgressRecord};
pub use agglomerate::{
    Agglomerator, AgglomerationReport, Assignment, AssignmentTable, CandidatePool, InterruptHandle,
};
pub use meta::{CoreSummary, MetaRelation, MetaRelator};
pub use meta::knee::{KneeConfig, KneePoint};
pub use squash::{Squash, SquashReport};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not built: {0}")]
    NotBuilt(String),

    #[error("Agglomeration interrupted at hop {hop} ({snapshot}). Run agglomerate() again to resume, or reset() to start over")]
    Interrupted { hop: u32, snapshot: MetricsSnapshot },

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
