//! Worker Module Tests
//!
//! Validates the rank-update algorithm against hand-computed values, the
//! degraded-read and idempotency behavior, the barrier gating of the worker
//! lifecycle, and full runs through both the in-process and the HTTP path.

#[cfg(test)]
mod tests {
    use crate::config::RunConfig;
    use crate::coordinator::barrier::{HttpCoordinator, IterationBarrier};
    use crate::coordinator::Coordinator;
    use crate::coordinator::reconcile::supervise_until_complete;
    use crate::graph::partition::Partitioner;
    use crate::graph::types::{PageId, RankRecord, Shard};
    use crate::node::build_node;
    use crate::store::object::{HttpObjectStore, MemoryObjectStore, ObjectStore};
    use crate::store::rank::{HttpRankStore, MemoryRankStore, RankStore};
    use crate::worker::invoker::{HttpInvoker, Invoker, LocalInvoker};
    use crate::worker::ranker::process_shard;
    use crate::worker::runner::{self, WorkerContext};
    use crate::worker::types::{ShardRef, WorkerPayload};

    use anyhow::Result;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const TOLERANCE: f64 = 1e-9;

    fn page(id: &str) -> PageId {
        PageId::new(id)
    }

    fn shard(relations: Vec<(&str, Vec<&str>)>) -> Shard {
        Shard {
            id: 0,
            relations: relations
                .into_iter()
                .map(|(p, ns)| (page(p), ns.into_iter().map(page).collect()))
                .collect(),
        }
    }

    fn payload(current_iter: u32, damping: f64, leak: f64) -> WorkerPayload {
        WorkerPayload {
            run_id: "test-run".to_string(),
            current_iter,
            end_iter: current_iter,
            damping,
            leak,
            shard: ShardRef {
                shard_id: 0,
                bucket: "pagerank".to_string(),
                relation_key: "relations/shard-0.json".to_string(),
            },
        }
    }

    async fn seed(store: &MemoryRankStore, page_id: &str, page_count: usize, weight: u32) {
        store
            .put(RankRecord::seed(page(page_id), page_count, weight))
            .await
            .unwrap();
    }

    async fn rank_of(store: &MemoryRankStore, page_id: &str) -> RankRecord {
        store.get(&page(page_id)).await.unwrap().unwrap()
    }

    struct RecordingInvoker {
        payloads: Mutex<Vec<WorkerPayload>>,
    }

    impl RecordingInvoker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                payloads: Mutex::new(Vec::new()),
            })
        }
    }

    impl Invoker for RecordingInvoker {
        async fn invoke(&self, payload: WorkerPayload) -> Result<()> {
            self.payloads.lock().unwrap().push(payload);
            Ok(())
        }
    }

    /// Rank store double whose `get` fails for one page a configurable
    /// number of times before recovering. Writes always succeed.
    struct FlakyRankStore {
        inner: MemoryRankStore,
        fail_page: PageId,
        failures_left: AtomicUsize,
    }

    impl FlakyRankStore {
        fn new(fail_page: &str, failures: usize) -> Self {
            Self {
                inner: MemoryRankStore::new(),
                fail_page: page(fail_page),
                failures_left: AtomicUsize::new(failures),
            }
        }
    }

    impl RankStore for FlakyRankStore {
        async fn get(&self, page: &PageId) -> Result<Option<RankRecord>> {
            if *page == self.fail_page && self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow::anyhow!("simulated store outage"));
            }
            self.inner.get(page).await
        }

        async fn put(&self, record: RankRecord) -> Result<()> {
            self.inner.put(record).await
        }
    }

    // ============================================================
    // RANK UPDATE
    // ============================================================

    #[tokio::test]
    async fn test_three_page_cycle_holds_its_fixed_point() {
        // A -> B -> C -> A: every page has one in-neighbor of out-degree 1,
        // so the uniform distribution is the fixed point at any damping.
        let store = MemoryRankStore::new();
        for p in ["A", "B", "C"] {
            seed(&store, p, 3, 1).await;
        }
        let cycle = shard(vec![("A", vec!["C"]), ("B", vec!["A"]), ("C", vec!["B"])]);
        let leak = (1.0 - 0.8) / 3.0;

        let report = process_shard(&store, &cycle, &payload(1, 0.8, leak)).await;

        assert_eq!(report.pages_processed, 3);
        assert_eq!(report.pages_failed, 0);
        assert_eq!(report.degraded_reads, 0);
        for p in ["A", "B", "C"] {
            let record = rank_of(&store, p).await;
            assert_eq!(record.iteration, 1);
            assert!((record.rank - 1.0 / 3.0).abs() < TOLERANCE);
            assert!((record.prev_rank - 1.0 / 3.0).abs() < TOLERANCE);
        }
    }

    #[tokio::test]
    async fn test_page_without_in_neighbors_keeps_only_the_leak() {
        let store = MemoryRankStore::new();
        seed(&store, "lonely", 4, 1).await;
        let leak = (1.0 - 0.8) / 4.0;

        process_shard(&store, &shard(vec![("lonely", vec![])]), &payload(1, 0.8, leak)).await;

        let record = rank_of(&store, "lonely").await;
        assert!((record.rank - leak).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn test_update_formula_matches_hand_computation() {
        // A -> B, A -> C, B -> C (in-neighbor form below). Out-degrees:
        // A = 2, B = 1, C = 0. With d = 0.5 and uniform seeds of 1/3:
        //   A = 0.5 * 0                       + 1/6 = 1/6
        //   B = 0.5 * (1/3 / 2)               + 1/6 = 1/4
        //   C = 0.5 * (1/3 / 2 + 1/3 / 1)     + 1/6 = 5/12
        let store = MemoryRankStore::new();
        seed(&store, "A", 3, 2).await;
        seed(&store, "B", 3, 1).await;
        seed(&store, "C", 3, 0).await;
        let graph = shard(vec![("A", vec![]), ("B", vec!["A"]), ("C", vec!["A", "B"])]);

        process_shard(&store, &graph, &payload(1, 0.5, 1.0 / 6.0)).await;

        assert!((rank_of(&store, "A").await.rank - 1.0 / 6.0).abs() < TOLERANCE);
        assert!((rank_of(&store, "B").await.rank - 1.0 / 4.0).abs() < TOLERANCE);
        assert!((rank_of(&store, "C").await.rank - 5.0 / 12.0).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn test_missing_neighbor_degrades_instead_of_failing() {
        let store = MemoryRankStore::new();
        seed(&store, "A", 2, 1).await;
        seed(&store, "B", 2, 1).await;
        // "ghost" was never seeded
        let graph = shard(vec![("B", vec!["A", "ghost"])]);

        let report = process_shard(&store, &graph, &payload(1, 0.8, 0.1)).await;

        assert_eq!(report.pages_processed, 1);
        assert_eq!(report.pages_failed, 0);
        assert_eq!(report.degraded_reads, 1);

        // The present neighbor still contributes
        let record = rank_of(&store, "B").await;
        assert!((record.rank - (0.8 * 0.5 + 0.1)).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn test_duplicate_execution_rewrites_identical_records() {
        let store = MemoryRankStore::new();
        for p in ["A", "B", "C"] {
            seed(&store, p, 3, 1).await;
        }
        let cycle = shard(vec![("A", vec!["C"]), ("B", vec!["A"]), ("C", vec!["B"])]);
        let payload = payload(1, 0.8, (1.0 - 0.8) / 3.0);

        process_shard(&store, &cycle, &payload).await;
        let first: Vec<RankRecord> = [
            rank_of(&store, "A").await,
            rank_of(&store, "B").await,
            rank_of(&store, "C").await,
        ]
        .to_vec();

        // A re-invocation after reconciliation runs the same iteration again
        let report = process_shard(&store, &cycle, &payload).await;
        assert_eq!(report.pages_failed, 0);

        let second = [
            rank_of(&store, "A").await,
            rank_of(&store, "B").await,
            rank_of(&store, "C").await,
        ];
        assert_eq!(first, second.to_vec());
    }

    #[tokio::test]
    async fn test_neighbor_already_at_current_iteration_contributes_prev_rank() {
        let store = MemoryRankStore::new();
        seed(&store, "A", 2, 1).await;
        // B's shard already finished iteration 1; its previous rank is 0.5
        store
            .put(RankRecord {
                page: page("B"),
                iteration: 1,
                rank: 0.7,
                prev_rank: 0.5,
                weight: 1,
            })
            .await
            .unwrap();

        process_shard(&store, &shard(vec![("A", vec!["B"])]), &payload(1, 0.8, 0.05)).await;

        let record = rank_of(&store, "A").await;
        assert!((record.rank - (0.8 * 0.5 + 0.05)).abs() < TOLERANCE);
    }

    // ============================================================
    // LIFECYCLE
    // ============================================================

    #[tokio::test]
    async fn test_worker_does_not_advance_past_an_incomplete_iteration() {
        let rank_store = Arc::new(MemoryRankStore::new());
        let object_store = Arc::new(MemoryObjectStore::new());
        let barrier = Arc::new(IterationBarrier::new(2));
        let invoker = RecordingInvoker::new();

        seed(&rank_store, "A", 1, 1).await;
        let relations: BTreeMap<PageId, Vec<PageId>> =
            [(page("A"), vec![])].into_iter().collect();
        object_store
            .put(
                "pagerank",
                "relations/shard-0.json",
                serde_json::to_vec(&relations).unwrap(),
            )
            .await
            .unwrap();

        let ctx = WorkerContext::new(
            rank_store,
            object_store,
            barrier.clone(),
            invoker.clone(),
        );

        let mut work = payload(1, 0.8, 0.2);
        work.end_iter = 2;
        let run_ctx = ctx.clone();
        let handle = tokio::spawn(async move { run_ctx.run(work).await });

        // Shard 1 has not reported iteration 1, so the continuation must not
        // have been submitted yet.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(invoker.payloads.lock().unwrap().is_empty());
        assert_eq!(barrier.unreported_shards(1), vec![1]);

        barrier.record_completion(1, 1);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not advance")
            .unwrap()
            .unwrap();

        let recorded = invoker.payloads.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].current_iter, 2);
        assert_eq!(recorded[0].shard.shard_id, 0);
    }

    /// Context over a two-page shard (A with no in-neighbors, B fed by A)
    /// backed by the given rank store. A gets weight 1, B weight 0.
    async fn two_page_context<S: RankStore>(
        rank_store: Arc<S>,
        barrier: Arc<IterationBarrier>,
        invoker: Arc<RecordingInvoker>,
    ) -> Arc<WorkerContext<S, MemoryObjectStore, IterationBarrier, RecordingInvoker>> {
        rank_store
            .put(RankRecord::seed(page("A"), 2, 1))
            .await
            .unwrap();
        rank_store
            .put(RankRecord::seed(page("B"), 2, 0))
            .await
            .unwrap();

        let relations: BTreeMap<PageId, Vec<PageId>> =
            [(page("A"), vec![]), (page("B"), vec![page("A")])]
                .into_iter()
                .collect();
        let object_store = Arc::new(MemoryObjectStore::new());
        object_store
            .put(
                "pagerank",
                "relations/shard-0.json",
                serde_json::to_vec(&relations).unwrap(),
            )
            .await
            .unwrap();

        WorkerContext::new(rank_store, object_store, barrier, invoker)
    }

    #[tokio::test]
    async fn test_shard_with_failed_page_withholds_its_completion_report() {
        // B's own record read always fails, so B's computation fails while
        // its sibling A still processes.
        let store = Arc::new(FlakyRankStore::new("B", usize::MAX));
        let barrier = Arc::new(IterationBarrier::new(1));
        let invoker = RecordingInvoker::new();
        let ctx = two_page_context(store.clone(), barrier.clone(), invoker.clone()).await;

        let err = ctx.run(payload(1, 0.8, 0.1)).await.unwrap_err();
        assert!(err.to_string().contains("withholding completion report"));

        // The sibling page was still computed
        let a = store.get(&page("A")).await.unwrap().unwrap();
        assert_eq!(a.iteration, 1);
        assert!((a.rank - 0.1).abs() < TOLERANCE);

        // The shard must stay visible as unreported so reconciliation can
        // re-invoke it; the failed page keeps its seed record until then.
        assert!(!barrier.is_complete(1).await.unwrap());
        assert_eq!(barrier.unreported_shards(1), vec![0]);
        let b = store.get(&page("B")).await.unwrap().unwrap();
        assert_eq!(b.iteration, 0);
        assert!(invoker.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reinvocation_recovers_a_shard_with_a_failed_page() {
        // One transient failure on B's record, as a re-invoked worker sees it
        let store = Arc::new(FlakyRankStore::new("B", 1));
        let barrier = Arc::new(IterationBarrier::new(1));
        let invoker = RecordingInvoker::new();
        let ctx = two_page_context(store.clone(), barrier.clone(), invoker.clone()).await;

        let work = payload(1, 0.8, 0.1);
        assert!(ctx.run(work.clone()).await.is_err());
        let a_first = store.get(&page("A")).await.unwrap().unwrap();

        ctx.run(work).await.unwrap();

        // The re-run recomputed the failed page and rewrote A identically
        let a = store.get(&page("A")).await.unwrap().unwrap();
        let b = store.get(&page("B")).await.unwrap().unwrap();
        assert_eq!(a, a_first);
        assert_eq!(b.iteration, 1);
        assert!((b.rank - (0.8 * 0.5 + 0.1)).abs() < TOLERANCE);
        assert!(barrier.is_complete(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_payload_for_iteration_zero() {
        let store = Arc::new(MemoryRankStore::new());
        let barrier = Arc::new(IterationBarrier::new(1));
        let invoker = RecordingInvoker::new();
        let ctx = two_page_context(store, barrier.clone(), invoker).await;

        let err = ctx.run(payload(0, 0.8, 0.1)).await.unwrap_err();
        assert!(err.to_string().contains("iteration numbering starts at 1"));
        assert!(barrier.unreported_shards(1).contains(&0));
    }

    // ============================================================
    // END TO END
    // ============================================================

    fn ring(n: usize) -> BTreeMap<PageId, Vec<PageId>> {
        (0..n)
            .map(|i| {
                let prev = (i + n - 1) % n;
                (
                    page(&format!("page_{}", i)),
                    vec![page(&format!("page_{}", prev))],
                )
            })
            .collect()
    }

    fn run_config(shard_size: usize, end_iter: u32) -> RunConfig {
        let mut config = RunConfig::default();
        config.target_shard_size = shard_size;
        config.end_iter = end_iter;
        config.damping = 0.8;
        config
    }

    #[tokio::test]
    async fn test_full_run_in_process() {
        let rank_store = Arc::new(MemoryRankStore::new());
        let object_store = Arc::new(MemoryObjectStore::new());
        let barrier = Arc::new(IterationBarrier::new(0));
        let (invoker, rx) = LocalInvoker::new();
        let invoker = Arc::new(invoker);

        let ctx = WorkerContext::new(
            rank_store.clone(),
            object_store.clone(),
            barrier.clone(),
            invoker.clone(),
        );
        runner::spawn_dispatcher(ctx, rx);

        let partitioner = Partitioner::new(
            object_store,
            rank_store.clone(),
            barrier.clone(),
            invoker.clone(),
            run_config(2, 5),
        );

        let relations = ring(6);
        let outcome = partitioner.run(relations.clone()).await.unwrap();
        assert!(outcome.submission_failures.is_empty());

        tokio::time::timeout(
            Duration::from_secs(30),
            supervise_until_complete(
                &*barrier,
                &*invoker,
                &outcome.payloads,
                outcome.plan.end_iter,
                Duration::from_secs(5),
            ),
        )
        .await
        .expect("run did not complete")
        .unwrap();

        // A ring preserves the uniform distribution, and no page dangles, so
        // the total rank mass stays 1.
        let mut mass = 0.0;
        for (p, _) in &relations {
            let record = rank_store.get(p).await.unwrap().unwrap();
            assert_eq!(record.iteration, 5);
            assert!((record.rank - 1.0 / 6.0).abs() < TOLERANCE);
            mass += record.rank;
        }
        assert!((mass - 1.0).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn test_full_run_against_a_node() {
        let node = build_node();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, node.router).await.unwrap();
        });

        let object_store = Arc::new(HttpObjectStore::new(base.clone()));
        let rank_store = Arc::new(HttpRankStore::new(base.clone()));
        let coordinator = Arc::new(HttpCoordinator::new(base.clone()));
        let invoker = Arc::new(HttpInvoker::new(base));

        let partitioner = Partitioner::new(
            object_store,
            rank_store.clone(),
            coordinator.clone(),
            invoker.clone(),
            run_config(2, 3),
        );

        let relations = ring(4);
        let outcome = partitioner.run(relations.clone()).await.unwrap();
        assert!(outcome.submission_failures.is_empty());

        tokio::time::timeout(
            Duration::from_secs(30),
            supervise_until_complete(
                &*coordinator,
                &*invoker,
                &outcome.payloads,
                outcome.plan.end_iter,
                Duration::from_secs(5),
            ),
        )
        .await
        .expect("run did not complete")
        .unwrap();

        for (p, _) in &relations {
            let record = rank_store.get(p).await.unwrap().unwrap();
            assert_eq!(record.iteration, 3);
            assert!((record.rank - 0.25).abs() < TOLERANCE);
        }
    }
}
