pub mod file_store;
pub mod persistence;
pub mod query;
pub mod sql_store;

pub use file_store::{FileSubmissionStore, InitState};
pub use persistence::SnapshotFile;
pub use query::SubmissionQuery;
pub use sql_store::SqlSubmissionStore;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::{Result, Submission};

/// Storage contract shared by every backend.
///
/// Every operation initializes the store on demand, so calling
/// [`SubmissionStore::initialize`] up front is optional.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Idempotent setup; concurrent callers wait for the first one to finish.
    async fn initialize(&self) -> Result<()>;

    /// Stores `submission` durably and returns the stored record.
    ///
    /// A nil id is replaced with a generated one. An existing id is overwritten.
    async fn add(&self, submission: Submission) -> Result<Submission>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Submission>>;

    /// Every stored submission, in no particular order.
    async fn get_all(&self) -> Result<Vec<Submission>>;

    /// Filters, orders newest first and paginates.
    ///
    /// Returns [`crate::StoreError::Cancelled`] if `cancel` fires first.
    async fn query(
        &self,
        query: &SubmissionQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Submission>>;
}
