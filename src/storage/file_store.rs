//! File-backed submission store.
//!
//! Reads are served from a concurrent in-memory map. Every add rewrites the
//! whole backing file through [`SnapshotFile`], one writer at a time.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::atomic::AtomicUsize;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::persistence::SnapshotFile;
use super::query::{SubmissionQuery, oldest_first};
use super::SubmissionStore;
use crate::core::{Result, StoreError, Submission};

/// Startup progress of a [`FileSubmissionStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Loading,
    Ready,
}

/// Submission store persisted as a single JSON file.
///
/// Cheap to clone; clones share the same map and file.
#[derive(Clone)]
pub struct FileSubmissionStore {
    inner: Arc<Inner>,
}

struct Inner {
    file: SnapshotFile,
    records: DashMap<Uuid, Submission>,
    /// Startup guard. Held by the load task for the whole initial load.
    startup: Arc<Mutex<InitState>>,
    ready: AtomicBool,
    /// Serializes disk writes only; readers and map inserts never take it.
    write_lock: Mutex<()>,
    #[cfg(test)]
    loads: AtomicUsize,
}

impl FileSubmissionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            inner: Arc::new(Inner {
                file: SnapshotFile::new(path),
                records: DashMap::new(),
                startup: Arc::new(Mutex::new(InitState::Uninitialized)),
                ready: AtomicBool::new(false),
                write_lock: Mutex::new(()),
                #[cfg(test)]
                loads: AtomicUsize::new(0),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        self.inner.file.path()
    }

    /// Number of cached records. Zero until initialized.
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// `Loading` is reported while another caller holds the startup guard.
    pub fn init_state(&self) -> InitState {
        if self.inner.ready.load(Ordering::Acquire) {
            return InitState::Ready;
        }
        match self.inner.startup.try_lock() {
            Ok(state) => *state,
            Err(_) => InitState::Loading,
        }
    }

    async fn ensure_initialized(&self) -> Result<()> {
        if self.inner.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        // The load runs to completion even if this caller is dropped, and it
        // keeps the startup guard until the outcome is recorded.
        tokio::spawn(Arc::clone(&self.inner).initialize_once()).await?
    }

    fn snapshot_records(&self) -> Vec<Submission> {
        self.inner
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Inner {
    async fn initialize_once(self: Arc<Self>) -> Result<()> {
        let mut state = Arc::clone(&self.startup).lock_owned().await;
        if *state == InitState::Ready {
            return Ok(());
        }

        *state = InitState::Loading;
        match self.load().await {
            Ok(()) => {
                *state = InitState::Ready;
                self.ready.store(true, Ordering::Release);
                Ok(())
            }
            Err(err) => {
                *state = InitState::Uninitialized;
                Err(err)
            }
        }
    }

    async fn load(&self) -> Result<()> {
        #[cfg(test)]
        self.loads.fetch_add(1, Ordering::SeqCst);

        let path = self.file.path();
        let loaded = match self.file.load().await {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to load submissions from file");
                return Err(err);
            }
        };

        match loaded {
            None => {
                if let Err(err) = self.file.save(Vec::new()).await {
                    error!(path = %path.display(), error = %err, "failed to create submissions file");
                    return Err(err);
                }
                info!(path = %path.display(), "created empty submissions file");
            }
            Some(records) => {
                let count = records.len();
                // Later entries win on duplicate ids.
                for record in records {
                    self.records.insert(record.id, record);
                }
                info!(path = %path.display(), count, "loaded submissions from file");
            }
        }

        Ok(())
    }

    /// Writes the current map to disk. Queued writers each snapshot after
    /// acquiring the lock, so they include every insert made before their turn.
    async fn persist(self: Arc<Self>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot: Vec<Submission> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        snapshot.sort_by(oldest_first);
        let count = snapshot.len();

        match self.file.save(snapshot).await {
            Ok(()) => {
                debug!(path = %self.file.path().display(), count, "persisted submissions");
                Ok(())
            }
            Err(err) => {
                error!(path = %self.file.path().display(), error = %err, "failed to persist submissions to file");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl SubmissionStore for FileSubmissionStore {
    async fn initialize(&self) -> Result<()> {
        self.ensure_initialized().await
    }

    async fn add(&self, mut submission: Submission) -> Result<Submission> {
        self.ensure_initialized().await?;
        submission.ensure_identity();

        self.inner.records.insert(submission.id, submission.clone());

        // Spawned so that dropping this future cannot abort a write in progress.
        tokio::spawn(Arc::clone(&self.inner).persist()).await??;

        Ok(submission)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Submission>> {
        self.ensure_initialized().await?;
        Ok(self
            .inner
            .records
            .get(&id)
            .map(|entry| entry.value().clone()))
    }

    async fn get_all(&self) -> Result<Vec<Submission>> {
        self.ensure_initialized().await?;
        Ok(self.snapshot_records())
    }

    async fn query(
        &self,
        query: &SubmissionQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Submission>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            initialized = self.ensure_initialized() => {
                initialized?;
                if cancel.is_cancelled() {
                    return Err(StoreError::Cancelled);
                }
                Ok(query.apply(self.snapshot_records()))
            }
        }
    }
}
