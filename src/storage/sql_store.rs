//! SQL-backed submission store.
//!
//! Filtering, search, ordering and pagination are pushed down to SQLite.
//! Case folding happens in Rust at write time (`*_key` columns) so results
//! match the file-backed store exactly.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::SubmissionStore;
use super::query::{SubmissionQuery, fold_case};
use crate::core::submission::parse_timestamp;
use crate::core::{Result, StoreError, Submission};

pub const IN_MEMORY_URL: &str = "sqlite::memory:";

const SCHEMA_SQL: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS submissions (
        id TEXT PRIMARY KEY NOT NULL,
        form_type TEXT NOT NULL,
        form_type_key TEXT NOT NULL,
        submitted_at TEXT NOT NULL,
        payload TEXT NOT NULL,
        payload_key TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_submissions_form_type_key ON submissions (form_type_key)",
    "CREATE INDEX IF NOT EXISTS idx_submissions_submitted_at ON submissions (submitted_at DESC, id)",
];

const SELECT_COLUMNS: &str = "SELECT id, form_type, submitted_at, payload FROM submissions";

const UPSERT_SQL: &str = r#"
    INSERT INTO submissions (id, form_type, form_type_key, submitted_at, payload, payload_key)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        form_type = excluded.form_type,
        form_type_key = excluded.form_type_key,
        submitted_at = excluded.submitted_at,
        payload = excluded.payload,
        payload_key = excluded.payload_key
"#;

pub struct SqlSubmissionStore {
    pool: SqlitePool,
    schema: OnceCell<()>,
}

impl SqlSubmissionStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    /// Opens a pool for `url`. In-memory databases are pinned to one
    /// long-lived connection, since each connection would otherwise get its
    /// own empty database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = is_in_memory(url);
        let max_connections = if in_memory { 1 } else { max_connections.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        info!(url, max_connections, "connected to submissions database");
        Ok(Self::from_pool(pool))
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect(IN_MEMORY_URL, 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        let pool = &self.pool;
        self.schema
            .get_or_try_init(|| async move {
                for statement in SCHEMA_SQL {
                    sqlx::query(statement).execute(pool).await?;
                }
                info!("submissions schema ready");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    async fn run_query(&self, query: &SubmissionQuery) -> Result<Vec<Submission>> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        let mut has_where = false;

        if let Some(form_type) = query.form_type_key() {
            push_condition(&mut builder, &mut has_where);
            builder.push("form_type_key = ").push_bind(form_type);
        }

        if let Some(term) = query.search_key() {
            push_condition(&mut builder, &mut has_where);
            builder
                .push("(instr(payload_key, ")
                .push_bind(term.clone())
                .push(") > 0 OR instr(form_type_key, ")
                .push_bind(term)
                .push(") > 0)");
        }

        builder
            .push(" ORDER BY submitted_at DESC, id ASC LIMIT ")
            .push_bind(to_sql_count(query.take))
            .push(" OFFSET ")
            .push_bind(to_sql_count(query.skip));

        let rows = builder
            .build_query_as::<SubmissionRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Submission::try_from).collect()
    }
}

#[async_trait]
impl SubmissionStore for SqlSubmissionStore {
    async fn initialize(&self) -> Result<()> {
        self.ensure_schema().await
    }

    async fn add(&self, mut submission: Submission) -> Result<Submission> {
        self.ensure_schema().await?;
        submission.ensure_identity();

        let mut tx = self.pool.begin().await?;
        sqlx::query(UPSERT_SQL)
            .bind(submission.id.to_string())
            .bind(&submission.form_type)
            .bind(fold_case(&submission.form_type))
            .bind(timestamp_text(&submission))
            .bind(&submission.payload)
            .bind(fold_case(&submission.payload))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(id = %submission.id, form_type = %submission.form_type, "inserted submission");
        Ok(submission)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Submission>> {
        self.ensure_schema().await?;
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let row = sqlx::query_as::<_, SubmissionRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Submission::try_from).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Submission>> {
        self.ensure_schema().await?;
        let rows = sqlx::query_as::<_, SubmissionRow>(SELECT_COLUMNS)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Submission::try_from).collect()
    }

    async fn query(
        &self,
        query: &SubmissionQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Submission>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            result = async {
                self.ensure_schema().await?;
                self.run_query(query).await
            } => result,
        }
    }
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: String,
    form_type: String,
    submitted_at: String,
    payload: String,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|err| StoreError::decode(format!("invalid uuid in id: {err}")))?;
        let submitted_at = parse_timestamp(&row.submitted_at)
            .map_err(|err| StoreError::decode(format!("invalid timestamp in submitted_at: {err}")))?;

        Ok(Submission {
            id,
            form_type: row.form_type,
            submitted_at,
            payload: row.payload,
        })
    }
}

fn push_condition(builder: &mut QueryBuilder<'_, Sqlite>, has_where: &mut bool) {
    if *has_where {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_where = true;
    }
}

/// Fixed-width UTC text, so lexical order in SQLite equals time order.
fn timestamp_text(submission: &Submission) -> String {
    submission
        .submitted_at
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn timestamp_text_sorts_lexically() {
        let early = Submission::new("A", "{}")
            .with_submitted_at(Utc.with_ymd_and_hms(2024, 1, 1, 9, 59, 59).unwrap());
        let late = Submission::new("A", "{}").with_submitted_at(
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::nanoseconds(1),
        );

        let (early, late) = (timestamp_text(&early), timestamp_text(&late));
        assert_eq!(early.len(), late.len());
        assert!(early < late);
    }

    #[test]
    fn in_memory_urls_are_detected() {
        assert!(is_in_memory(IN_MEMORY_URL));
        assert!(is_in_memory("sqlite://file:forms?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://data/submissions.db?mode=rwc"));
    }

    #[test]
    fn malformed_rows_fail_to_decode() {
        let row = SubmissionRow {
            id: "not-a-uuid".to_string(),
            form_type: "Contact".to_string(),
            submitted_at: "2024-01-01T00:00:00Z".to_string(),
            payload: "{}".to_string(),
        };
        assert!(matches!(Submission::try_from(row), Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn rows_round_trip_through_sqlite() {
        let store = SqlSubmissionStore::in_memory().await.unwrap();
        let added = store
            .add(Submission::new("Contact", r#"{"Message":"Hello"}"#))
            .await
            .unwrap();

        let fetched = store.get_by_id(added.id).await.unwrap().unwrap();
        assert_eq!(fetched, added);
    }

    #[tokio::test]
    async fn nil_ids_are_assigned() {
        let store = SqlSubmissionStore::in_memory().await.unwrap();
        let added = store
            .add(Submission::new("Contact", "{}").with_id(Uuid::nil()))
            .await
            .unwrap();
        assert!(!added.id.is_nil());
    }
}
