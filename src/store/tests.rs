//! Store Module Tests
//!
//! Validates the in-memory store mechanics and the HTTP round trip through
//! a node's store endpoints.

#[cfg(test)]
mod tests {
    use crate::graph::types::{PageId, RankRecord};
    use crate::node::build_node;
    use crate::store::object::{HttpObjectStore, MemoryObjectStore, ObjectStore};
    use crate::store::rank::{HttpRankStore, MemoryRankStore, RankStore};

    fn record(page: &str, iteration: u32, rank: f64) -> RankRecord {
        RankRecord {
            page: PageId::new(page),
            iteration,
            rank,
            prev_rank: rank,
            weight: 1,
        }
    }

    // ============================================================
    // MEMORY RANK STORE
    // ============================================================

    #[tokio::test]
    async fn test_rank_store_put_and_get() {
        let store = MemoryRankStore::new();
        store.put(record("A", 1, 0.25)).await.unwrap();

        let fetched = store.get(&PageId::new("A")).await.unwrap().unwrap();
        assert_eq!(fetched.iteration, 1);
        assert!((fetched.rank - 0.25).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_rank_store_absent_page_is_none() {
        let store = MemoryRankStore::new();
        assert!(store.get(&PageId::new("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rank_store_put_is_last_write_wins() {
        let store = MemoryRankStore::new();
        store.put(record("A", 1, 0.25)).await.unwrap();
        store.put(record("A", 2, 0.5)).await.unwrap();

        let fetched = store.get(&PageId::new("A")).await.unwrap().unwrap();
        assert_eq!(fetched.iteration, 2);
        assert!((fetched.rank - 0.5).abs() < 1e-12);
        assert_eq!(store.len(), 1);
    }

    // ============================================================
    // MEMORY OBJECT STORE
    // ============================================================

    #[tokio::test]
    async fn test_object_store_roundtrip() {
        let store = MemoryObjectStore::new();
        store
            .put("bucket", "relations/shard-0.json", b"{}".to_vec())
            .await
            .unwrap();

        let data = store.get("bucket", "relations/shard-0.json").await.unwrap();
        assert_eq!(data, b"{}".to_vec());
        assert_eq!(store.object_count("bucket"), 1);
    }

    #[tokio::test]
    async fn test_object_store_missing_object_is_an_error() {
        let store = MemoryObjectStore::new();
        let err = store.get("bucket", "nope").await.unwrap_err();
        assert!(err.to_string().contains("object not found"));
    }

    // ============================================================
    // HTTP ROUND TRIP
    // ============================================================

    async fn spawn_node() -> String {
        let node = build_node();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, node.router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_rank_store_roundtrip() {
        let base = spawn_node().await;
        let store = HttpRankStore::new(base);

        store.put(record("A", 3, 0.125)).await.unwrap();

        let fetched = store.get(&PageId::new("A")).await.unwrap().unwrap();
        assert_eq!(fetched.iteration, 3);
        assert!((fetched.rank - 0.125).abs() < 1e-12);

        assert!(store.get(&PageId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_http_object_store_roundtrip() {
        let base = spawn_node().await;
        let store = HttpObjectStore::new(base);

        let payload = serde_json::to_vec(&vec!["page_0", "page_1"]).unwrap();
        store
            .put("pagerank", "relations/pages.json", payload.clone())
            .await
            .unwrap();

        let data = store.get("pagerank", "relations/pages.json").await.unwrap();
        assert_eq!(data, payload);

        assert!(store.get("pagerank", "relations/ghost.json").await.is_err());
    }
}
