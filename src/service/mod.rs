//! Boundary contract used by front ends (CLI, HTTP adapters, tests).

pub mod validation;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::{Result, StoreError, Submission};
use crate::storage::{SubmissionQuery, SubmissionStore};

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Paged listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub form_type: Option<String>,
    pub search: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            form_type: None,
            search: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListParams {
    pub fn to_query(&self) -> SubmissionQuery {
        SubmissionQuery {
            form_type: self.form_type.clone(),
            search: self.search.clone(),
            ..SubmissionQuery::default()
        }
        .page(self.page, self.page_size)
    }
}

#[async_trait]
pub trait SubmissionService: Send + Sync {
    /// Stores a new submission of `form_type` carrying the raw JSON `payload`.
    async fn create(&self, form_type: &str, payload: &str) -> Result<Submission>;

    async fn list(
        &self,
        params: &ListParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<Submission>>;

    async fn get(&self, id: Uuid) -> Result<Option<Submission>>;
}

/// Validates input and forwards to a [`SubmissionStore`].
#[derive(Clone)]
pub struct StoreService {
    store: Arc<dyn SubmissionStore>,
}

impl StoreService {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }
}

#[async_trait]
impl SubmissionService for StoreService {
    async fn create(&self, form_type: &str, payload: &str) -> Result<Submission> {
        validation::validate_form_type(form_type)?;
        validation::validate_payload(payload)?;

        let submission = Submission::new(form_type, payload.trim());
        self.store.add(submission).await
    }

    async fn list(
        &self,
        params: &ListParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<Submission>> {
        validation::validate_page(params.page, params.page_size)?;
        validation::validate_search(params.search.as_deref())?;

        self.store.query(&params.to_query(), cancel).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>> {
        self.store.get_by_id(id).await
    }
}

/// Wraps a service and logs every call and its outcome.
#[derive(Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S: SubmissionService> LoggingService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn log_failure(operation: &str, err: &StoreError) {
    match err {
        StoreError::Validation(reason) => warn!(operation, reason = %reason, "rejected request"),
        StoreError::Cancelled => info!(operation, "request cancelled"),
        other => error!(operation, error = %other, "request failed"),
    }
}

#[async_trait]
impl<S: SubmissionService> SubmissionService for LoggingService<S> {
    async fn create(&self, form_type: &str, payload: &str) -> Result<Submission> {
        info!(form_type, "creating new submission");
        let result = self.inner.create(form_type, payload).await;
        match &result {
            Ok(created) => info!(id = %created.id, form_type, "created submission"),
            Err(err) => log_failure("create", err),
        }
        result
    }

    async fn list(
        &self,
        params: &ListParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<Submission>> {
        info!(
            form_type = ?params.form_type,
            search = ?params.search,
            page = params.page,
            page_size = params.page_size,
            "querying submissions"
        );
        let result = self.inner.list(params, cancel).await;
        if let Err(err) = &result {
            log_failure("list", err);
        }
        result
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>> {
        info!(id = %id, "getting submission");
        let result = self.inner.get(id).await;
        if let Err(err) = &result {
            log_failure("get", err);
        }
        result
    }
}
