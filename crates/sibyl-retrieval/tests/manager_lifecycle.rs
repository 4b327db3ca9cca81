//! Tests for snapshot lifecycle, lazy loading, and reader/writer isolation

#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use std::sync::Arc;

use tempfile::TempDir;

use sibyl_core::{Chunk, EmbeddedChunk, Error, SearchMode, SearchRequest};
use sibyl_retrieval::{IndexManager, IndexStore};

fn entry(source: &str, sequence_no: usize, vector: Vec<f32>) -> EmbeddedChunk {
    EmbeddedChunk {
        chunk: Chunk::new(
            format!("content of {source} chunk {sequence_no}"),
            source.to_owned(),
            sequence_no,
        ),
        vector,
    }
}

fn manager_in(temp_dir: &TempDir) -> IndexManager {
    IndexManager::new(IndexStore::new(temp_dir.path().join("index")))
}

#[tokio::test]
async fn test_snapshot_before_any_index_is_unavailable() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let manager = manager_in(&temp_dir);

    let error = manager
        .get_snapshot()
        .await
        .expect_err("no index has been built yet");
    assert!(matches!(error, Error::IndexUnavailable));
    assert!(error.is_not_ready());
    assert!(!manager.is_ready().await);
}

#[tokio::test]
async fn test_build_publishes_a_searchable_snapshot() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let manager = manager_in(&temp_dir);

    let published = manager
        .build_and_publish(
            vec![
                entry("a.txt", 0, vec![1.0, 0.0, 0.0]),
                entry("b.txt", 0, vec![0.0, 1.0, 0.0]),
            ],
            3,
        )
        .await
        .expect("build and publish");
    assert_eq!(published, 2);
    assert!(manager.is_ready().await);

    let snapshot = manager.get_snapshot().await.expect("get snapshot");
    let results = snapshot
        .search(&[0.0, 1.0, 0.0], &SearchRequest::new(SearchMode::Similarity, 1))
        .expect("search");
    assert_eq!(results[0].chunk.source, "b.txt");
}

#[tokio::test]
async fn test_snapshot_loads_lazily_from_persisted_state() {
    let temp_dir = TempDir::new().expect("create temp dir");

    {
        let manager = manager_in(&temp_dir);
        manager
            .build_and_publish(vec![entry("a.txt", 0, vec![1.0, 0.0, 0.0])], 3)
            .await
            .expect("build and publish");
    }

    // A fresh manager over the same directory restores on first read.
    let restarted = manager_in(&temp_dir);
    let snapshot = restarted.get_snapshot().await.expect("lazy load");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.entries()[0].chunk.source, "a.txt");
}

#[tokio::test]
async fn test_reader_keeps_its_snapshot_across_a_rebuild() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let manager = manager_in(&temp_dir);

    manager
        .build_and_publish(vec![entry("old.txt", 0, vec![1.0, 0.0, 0.0])], 3)
        .await
        .expect("build old index");

    // Reader acquires its snapshot before the rebuild completes.
    let held = manager.get_snapshot().await.expect("acquire old snapshot");

    manager
        .build_and_publish(
            vec![
                entry("new.txt", 0, vec![1.0, 0.0, 0.0]),
                entry("new.txt", 1, vec![0.0, 1.0, 0.0]),
            ],
            3,
        )
        .await
        .expect("rebuild");

    // The held snapshot still observes the pre-build state, never a mix.
    assert_eq!(held.len(), 1);
    assert_eq!(held.entries()[0].chunk.source, "old.txt");

    let fresh = manager.get_snapshot().await.expect("acquire new snapshot");
    assert_eq!(fresh.len(), 2);
    assert_eq!(fresh.entries()[0].chunk.source, "new.txt");
}

#[tokio::test]
async fn test_add_requires_an_existing_index() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let manager = manager_in(&temp_dir);

    let error = manager
        .add_and_publish(vec![entry("a.txt", 0, vec![1.0, 0.0, 0.0])])
        .await
        .expect_err("nothing to extend");
    assert!(matches!(error, Error::IndexUnavailable));
}

#[tokio::test]
async fn test_add_persists_before_publishing() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let manager = manager_in(&temp_dir);

    manager
        .build_and_publish(vec![entry("a.txt", 0, vec![1.0, 0.0, 0.0])], 3)
        .await
        .expect("build base index");
    let total = manager
        .add_and_publish(vec![entry("b.txt", 0, vec![0.0, 1.0, 0.0])])
        .await
        .expect("extend index");
    assert_eq!(total, 2);

    // The appended result is durable: a fresh manager sees both entries.
    let restarted = manager_in(&temp_dir);
    let snapshot = restarted.get_snapshot().await.expect("lazy load");
    assert_eq!(snapshot.len(), 2);
}

#[tokio::test]
async fn test_concurrent_readers_see_complete_snapshots_only() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let manager = Arc::new(manager_in(&temp_dir));

    manager
        .build_and_publish(vec![entry("old.txt", 0, vec![1.0, 0.0, 0.0])], 3)
        .await
        .expect("build old index");

    let writer = Arc::clone(&manager);
    let write_task = tokio::spawn(async move {
        writer
            .build_and_publish(
                vec![
                    entry("new.txt", 0, vec![1.0, 0.0, 0.0]),
                    entry("new.txt", 1, vec![0.0, 1.0, 0.0]),
                    entry("new.txt", 2, vec![0.0, 0.0, 1.0]),
                ],
                3,
            )
            .await
    });

    // Readers racing the rebuild must observe either the full old index
    // or the full new one, never an intermediate size.
    for _ in 0..16 {
        let snapshot = manager.get_snapshot().await.expect("get snapshot");
        assert!(
            snapshot.len() == 1 || snapshot.len() == 3,
            "snapshot has unexpected size {}",
            snapshot.len()
        );
    }

    let published = write_task
        .await
        .expect("writer task")
        .expect("rebuild during reads");
    assert_eq!(published, 3);
}

#[tokio::test]
async fn test_clear_returns_the_manager_to_not_ready() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let manager = manager_in(&temp_dir);

    manager
        .build_and_publish(vec![entry("a.txt", 0, vec![1.0, 0.0, 0.0])], 3)
        .await
        .expect("build index");
    let held = manager.get_snapshot().await.expect("hold snapshot");

    manager.clear().await.expect("clear index");

    assert!(!manager.is_ready().await);
    assert!(matches!(
        manager.get_snapshot().await.expect_err("cleared"),
        Error::IndexUnavailable
    ));

    // A reader that acquired its snapshot before the clear keeps it.
    assert_eq!(held.len(), 1);
}
