//! Property tests on random graphs.

mod common;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use proptest::prelude::*;

use common::{Fault, config, faulty, link, nodes, table};
use coregraph::{Agglomerator, Error, MemoryStore, MetaRelator, NodeId, PropertyMap, Value, GraphStore};

const MAX_HOP: u32 = 3;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

/// Undirected edge list over `n` nodes, no self loops.
fn graph() -> impl Strategy<Value = (usize, usize, Vec<(usize, usize)>)> {
    (3usize..12, 1usize..4).prop_flat_map(|(n, k)| {
        let edges = prop::collection::vec((0..n, 0..n), 0..n * 2)
            .prop_map(|pairs| pairs.into_iter().filter(|(a, b)| a != b).collect::<Vec<_>>());
        (Just(n), Just(k.min(n)), edges)
    })
}

/// Shortest hop distance from each core, by BFS.
fn distances(n: usize, edges: &[(usize, usize)], from: usize) -> Vec<Option<u32>> {
    let mut adj = vec![Vec::new(); n];
    for &(a, b) in edges {
        adj[a].push(b);
        adj[b].push(a);
    }
    let mut dist = vec![None; n];
    dist[from] = Some(0);
    let mut queue = VecDeque::from([from]);
    while let Some(u) = queue.pop_front() {
        let du = dist[u].unwrap_or(0);
        for &v in &adj[u] {
            if dist[v].is_none() {
                dist[v] = Some(du + 1);
                queue.push_back(v);
            }
        }
    }
    dist
}

async fn load<S: GraphStore + ?Sized>(store: &S, n: usize, k: usize, edges: &[(usize, usize)]) -> Vec<NodeId> {
    let ids = nodes(store, k, n - k).await;
    for &(a, b) in edges {
        link(store, ids[a], ids[b]).await;
    }
    ids
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every node within range has exactly one owner: the lowest-id core
    /// among those at the smallest hop distance.
    #[test]
    fn prop_single_owner_at_min_distance((n, k, edges) in graph()) {
        prop_assume!(!edges.is_empty());
        let rt = runtime();
        let (ids, assigned) = rt.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let ids = load(store.as_ref(), n, k, &edges).await;
            let mut agg = Agglomerator::new(store, &config()).await.unwrap();
            agg.agglomerate().await.unwrap();
            (ids, table(&agg))
        });
        let owner: HashMap<NodeId, _> = assigned.into_iter().collect();

        let per_core: Vec<Vec<Option<u32>>> = (0..k).map(|c| distances(n, &edges, c)).collect();
        for v in 0..n {
            let best = (0..k)
                .filter_map(|c| per_core[c][v].map(|d| (d, c)))
                .min();
            match best {
                Some((d, c)) if d <= MAX_HOP => {
                    let got = owner.get(&ids[v]);
                    prop_assert_eq!(got.map(|a| (a.core, a.distance)), Some((ids[c], d)));
                }
                _ => prop_assert!(!owner.contains_key(&ids[v])),
            }
        }
    }

    /// Stopping at any hop and resuming gives the uninterrupted result.
    #[test]
    fn prop_resume_equivalence((n, k, edges) in graph(), stop_at in 1u32..=MAX_HOP) {
        prop_assume!(!edges.is_empty());
        let rt = runtime();
        let (straight, resumed) = rt.block_on(async {
            let plain = Arc::new(MemoryStore::new());
            load(plain.as_ref(), n, k, &edges).await;
            let mut agg = Agglomerator::new(plain, &config()).await.unwrap();
            agg.agglomerate().await.unwrap();
            let straight = table(&agg);

            let store = faulty();
            load(store.as_ref(), n, k, &edges).await;
            let mut agg = Agglomerator::new(store.clone(), &config()).await.unwrap();
            store.arm(stop_at, Fault::Interrupt, Some(agg.interrupt_handle()));
            match agg.agglomerate().await {
                Ok(_) | Err(Error::Interrupted { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
            agg.agglomerate().await.unwrap();
            (straight, table(&agg))
        });
        prop_assert_eq!(straight, resumed);
    }

    /// The cutoff lies within the score range and filtering only removes.
    #[test]
    fn prop_cutoff_within_scores(scores in prop::collection::vec(0.0f64..100.0, 1..20)) {
        let rt = runtime();
        let (cutoff, sorted, all, kept) = rt.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let cores = nodes(store.as_ref(), 5, 0).await;
            let pairs = cores.iter()
                .flat_map(|&s| cores.iter().map(move |&t| (s, t)))
                .filter(|(s, t)| s != t);
            for ((s, t), &score) in pairs.zip(&scores) {
                let mut props = PropertyMap::new();
                props.insert("score".into(), Value::Float(score));
                store.create_relationship(s, t, "META_REL", props).await.unwrap();
            }
            let mut meta = MetaRelator::new(store, &config());
            let cutoff = meta.cutoff_score().await.unwrap();
            let sorted = meta.meta_relation_scores().await.unwrap();
            let all = meta.get_core_edge_list(true).await.unwrap();
            let kept = meta.get_core_edge_list(false).await.unwrap();
            (cutoff, sorted, all, kept)
        });
        prop_assert!(cutoff >= sorted[0]);
        prop_assert!(cutoff <= sorted[sorted.len() - 1]);
        prop_assert!(!kept.is_empty());
        prop_assert!(kept.iter().all(|e| all.contains(e)));
        prop_assert!(kept.iter().all(|e| e.score >= cutoff));
    }
}
