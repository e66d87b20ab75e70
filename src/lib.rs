// ============================================================================
// tinyform Library
// ============================================================================

//! Storage core for arbitrary-shaped form submissions.
//!
//! Two interchangeable [`SubmissionStore`] backends share one query contract:
//!
//! - [`FileSubmissionStore`]: concurrent in-memory map, lazily loaded once
//!   from a JSON file and rewritten atomically on every add.
//! - [`SqlSubmissionStore`]: SQLite through `sqlx`, with filtering, search,
//!   ordering and pagination pushed down into SQL.
//!
//! # Examples
//!
//! ```no_run
//! use tinyform::{FileSubmissionStore, Submission, SubmissionQuery, SubmissionStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> tinyform::Result<()> {
//! let store = FileSubmissionStore::new("data/submissions.json");
//! store.add(Submission::new("Contact", r#"{"email":"a@b.c"}"#)).await?;
//!
//! let contacts = store
//!     .query(&SubmissionQuery::new().form_type("contact"), &CancellationToken::new())
//!     .await?;
//! println!("{} contact submissions", contacts.len());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod core;
pub mod service;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{Result, StoreError, Submission};
pub use service::{ListParams, LoggingService, StoreService, SubmissionService};
pub use storage::{
    FileSubmissionStore, InitState, SnapshotFile, SqlSubmissionStore, SubmissionQuery,
    SubmissionStore,
};
