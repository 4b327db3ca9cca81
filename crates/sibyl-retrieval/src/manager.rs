//! Process-wide index lifecycle: one active snapshot, concurrent readers,
//! serialized writers.
//!
//! The manager owns the single "current snapshot" cell. Readers copy the
//! reference once at query start and keep using that immutable index for
//! the query's duration, even if a newer snapshot is published mid-query.
//! Writers build the next index off to the side, persist it, and only
//! then swap the cell, so a read always sees either the pre-write or the
//! fully published post-write snapshot, never an intermediate state.
//!
//! Lifecycle states: uninitialized (empty cell) → loading (first reader
//! populates from the store) → ready; a build or add moves ready →
//! rebuilding/extending → ready under the writer lock. At most one writer
//! runs at a time; readers never block writers or each other.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::index::VectorIndex;
use crate::store::IndexStore;
use sibyl_core::{EmbeddedChunk, Error, Result};

/// An immutable, shareable reference to one index instance.
pub type Snapshot = Arc<VectorIndex>;

/// Coordinates load-on-demand, concurrent reads, and serialized writes
/// over the single active index.
pub struct IndexManager {
    store: IndexStore,
    /// The atomically replaceable "current snapshot" cell.
    current: RwLock<Option<Snapshot>>,
    /// Serializes build/add so one write completes fully (persist, then
    /// publish) before the next begins. Readers never take this lock.
    write_lock: Mutex<()>,
}

impl IndexManager {
    /// Create a manager over the given store. Nothing is loaded until the
    /// first snapshot request.
    pub fn new(store: IndexStore) -> Self {
        Self {
            store,
            current: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Return the current snapshot, loading from the store on first call.
    ///
    /// # Errors
    /// Returns `IndexUnavailable` if no index has been built yet and none
    /// is persisted; callers surface this as "service not ready".
    /// Persisted-state problems (`CorruptIndex`, `VersionMismatch`)
    /// propagate unchanged; they require re-ingestion, not a retry.
    pub async fn get_snapshot(&self) -> Result<Snapshot> {
        {
            let cell = self.current.read().await;
            if let Some(snapshot) = cell.as_ref() {
                return Ok(Arc::clone(snapshot));
            }
        }

        let mut cell = self.current.write().await;
        // Another reader may have finished loading while we waited.
        if let Some(snapshot) = cell.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        match self.store.load().await {
            Ok(index) => {
                let snapshot: Snapshot = Arc::new(index);
                *cell = Some(Arc::clone(&snapshot));
                info!(entries = snapshot.len(), "snapshot loaded on demand");
                Ok(snapshot)
            }
            Err(Error::NotFound(path)) => {
                warn!(path = %path, "no persisted index; service is not ready");
                Err(Error::IndexUnavailable)
            }
            Err(error) => Err(error),
        }
    }

    /// Whether a snapshot is either in memory or restorable from disk.
    pub async fn is_ready(&self) -> bool {
        if self.current.read().await.is_some() {
            return true;
        }
        self.store.exists().await
    }

    /// Build a fresh index from the given chunks, persist it, and publish
    /// it as the new current snapshot. Queries in flight against the old
    /// snapshot continue unaffected until they complete.
    ///
    /// # Errors
    /// Returns `EmptyInput` for zero chunks; persistence failures leave
    /// the previously published snapshot (if any) in place.
    pub async fn build_and_publish(
        &self,
        chunks: Vec<EmbeddedChunk>,
        dimension: usize,
    ) -> Result<usize> {
        let _writer = self.write_lock.lock().await;

        let index = VectorIndex::build(chunks, dimension)?;
        let entry_count = index.len();

        // Persist before publish: an unpublished persisted state is
        // recoverable on restart, a published-but-unpersisted one is not.
        self.store.save(&index).await?;
        *self.current.write().await = Some(Arc::new(index));

        info!(entries = entry_count, "✓ new index published");
        Ok(entry_count)
    }

    /// Append chunks to the current index, persist the appended result,
    /// and publish it.
    ///
    /// # Errors
    /// Returns `IndexUnavailable` if there is no current index to extend,
    /// and `EmptyInput` for zero chunks.
    pub async fn add_and_publish(&self, chunks: Vec<EmbeddedChunk>) -> Result<usize> {
        let _writer = self.write_lock.lock().await;

        let base = self.get_snapshot().await?;
        let extended = base.add(chunks)?;
        let entry_count = extended.len();

        self.store.save(&extended).await?;
        *self.current.write().await = Some(Arc::new(extended));

        info!(
            entries = entry_count,
            added = entry_count - base.len(),
            "✓ extended index published"
        );
        Ok(entry_count)
    }

    /// Remove the persisted index and empty the snapshot cell. Readers
    /// holding an old snapshot keep it; new readers see "not ready".
    ///
    /// # Errors
    /// Returns an error if the persisted state cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        let _writer = self.write_lock.lock().await;

        self.store.clear().await?;
        *self.current.write().await = None;

        info!("index cleared; service requires re-ingestion");
        Ok(())
    }
}
