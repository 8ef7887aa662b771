//! One-call compression: agglomerate, then build the meta-relations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agglomerate::{AgglomerationReport, Agglomerator, InterruptHandle};
use crate::config::CompressionConfig;
use crate::meta::{CoreSummary, MetaRelation, MetaRelator};
use crate::storage::GraphStore;
use crate::Result;

/// What `Squash::squash_graph` did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquashReport {
    pub agglomeration: AgglomerationReport,
    /// Meta-relations created by this call.
    pub meta_relations: u64,
}

/// The agglomerator and meta-relator of one compression run, sharing a store.
pub struct Squash<S: GraphStore> {
    agglomerator: Agglomerator<S>,
    meta_relator: MetaRelator<S>,
}

impl<S: GraphStore> Squash<S> {
    pub async fn new(store: Arc<S>, config: &CompressionConfig) -> Result<Self> {
        Ok(Self {
            agglomerator: Agglomerator::new(store.clone(), config).await?,
            meta_relator: MetaRelator::new(store, config),
        })
    }

    pub fn agglomerator(&self) -> &Agglomerator<S> { &self.agglomerator }
    pub fn meta_relator(&mut self) -> &mut MetaRelator<S> { &mut self.meta_relator }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.agglomerator.interrupt_handle()
    }

    /// Run the whole compression. `min_hops` / `max_hops` override the
    /// configured hop range for this and later runs.
    pub async fn squash_graph(&mut self, min_hops: Option<u32>, max_hops: Option<u32>) -> Result<SquashReport> {
        let mut hops = self.agglomerator.hop_range();
        if let Some(min) = min_hops {
            hops = hops.with_min(min)?;
        }
        if let Some(max) = max_hops {
            hops = hops.with_max(max)?;
        }
        self.agglomerator.set_hop_range(hops);

        let agglomeration = self.agglomerator.agglomerate().await?;
        let meta_relations = self.meta_relator.build_meta_relations().await?;
        Ok(SquashReport { agglomeration, meta_relations })
    }

    /// Meta-relations first, then represents edges and the ledger.
    pub async fn reset(&mut self) -> Result<()> {
        self.meta_relator.reset().await?;
        self.agglomerator.reset().await
    }

    /// Meta-relations passing the cutoff.
    pub async fn get_core_edge_list(&mut self) -> Result<Vec<MetaRelation>> {
        self.meta_relator.get_core_edge_list(false).await
    }

    /// Cores touching a meta-relation that passes the cutoff.
    pub async fn get_core_node_list(&mut self) -> Result<Vec<CoreSummary>> {
        self.meta_relator.get_core_node_list(false).await
    }
}
