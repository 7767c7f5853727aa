use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{FormStoreError, Result};
use crate::forms::Form;
use crate::submissions::scopes::SubmissionQuery;
use crate::submissions::types::{
    DataRecord, DataRef, RelationRow, Submission, SubmissionState, Submitter,
};

use super::{NewSubmitter, SubmissionStore, TransitionCommit};

const SUBMISSION_COLUMNS: &str =
    "id, status, treated, submitter_id, form_id, data_id, data_type, created_at, updated_at";

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and optionally run migrations
    pub async fn connect(database_url: &str, max_connections: u32, auto_migrate: bool) -> Result<Self> {
        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        if auto_migrate {
            store.migrate().await?;
        }
        Ok(store)
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        info!("Opening submission database at {}", config.url);
        Self::connect(&config.url, config.max_connections, config.auto_migrate).await
    }

    /// Private in-memory database on a single connection, already migrated
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

fn now_text() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| FormStoreError::Timestamp {
            value: value.to_string(),
            source,
        })
}

fn parse_fields(text: &str) -> Result<Map<String, Value>> {
    Ok(serde_json::from_str(text)?)
}

fn submission_from_row(row: &SqliteRow) -> Result<Submission> {
    let status: i64 = row.try_get("status")?;
    let treated: Option<String> = row.try_get("treated")?;
    let data_id: Option<i64> = row.try_get("data_id")?;
    let data_type: Option<String> = row.try_get("data_type")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Submission {
        id: row.try_get("id")?,
        status: SubmissionState::from_code(status)?,
        treated: treated.as_deref().map(parse_timestamp).transpose()?,
        form_id: row.try_get("form_id")?,
        submitter_id: row.try_get("submitter_id")?,
        data: match (data_type, data_id) {
            (Some(kind), Some(id)) => Some(DataRef { kind, id }),
            _ => None,
        },
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn form_from_row(row: &SqliteRow) -> Result<Form> {
    let definition: String = row.try_get("definition")?;
    let mut form: Form = serde_json::from_str(&definition)?;
    form.id = row.try_get("id")?;
    Ok(form)
}

fn submitter_from_row(row: &SqliteRow) -> Result<Submitter> {
    Ok(Submitter {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
    })
}

fn relation_row_from_row(row: &SqliteRow) -> Result<RelationRow> {
    let fields: String = row.try_get("fields")?;
    Ok(RelationRow {
        id: row.try_get("id")?,
        data_id: row.try_get("data_id")?,
        field: row.try_get("field")?,
        fields: parse_fields(&fields)?,
    })
}

#[async_trait]
impl SubmissionStore for SqliteStore {
    async fn submission(&self, id: i64) -> Result<Option<Submission>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM formstore_submissions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(submission_from_row).transpose()
    }

    async fn list_submissions(&self, query: &SubmissionQuery) -> Result<Vec<Submission>> {
        let (clause, binds) = query.where_clause();
        let sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM formstore_submissions {clause} ORDER BY id ASC"
        );

        let mut statement = sqlx::query(&sql);
        for value in binds {
            statement = statement.bind(value);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(submission_from_row).collect()
    }

    async fn create_submission(&self, form_id: i64, submitter_id: i64) -> Result<Submission> {
        if self.form(form_id).await?.is_none() {
            return Err(FormStoreError::not_found("Form", form_id));
        }
        if self.submitter(submitter_id).await?.is_none() {
            return Err(FormStoreError::not_found("Submitter", submitter_id));
        }

        let now = now_text();
        let id = sqlx::query(
            r#"
            INSERT INTO formstore_submissions (status, submitter_id, form_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(SubmissionState::Draft.code())
        .bind(submitter_id)
        .bind(form_id)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(submission.id = id, form.id = form_id, "Created submission");
        self.submission(id)
            .await?
            .ok_or_else(|| FormStoreError::not_found("Submission", id))
    }

    async fn attach_data(&self, submission_id: i64, data: &DataRef) -> Result<()> {
        if self.data_record(data).await?.is_none() {
            return Err(FormStoreError::not_found("Data record", data.id));
        }

        let result = sqlx::query(
            r#"
            UPDATE formstore_submissions
            SET data_id = ?1, data_type = ?2, updated_at = ?3
            WHERE id = ?4 AND status = ?5 AND data_id IS NULL
            "#,
        )
        .bind(data.id)
        .bind(&data.kind)
        .bind(now_text())
        .bind(submission_id)
        .bind(SubmissionState::Draft.code())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let submission = self
                .submission(submission_id)
                .await?
                .ok_or_else(|| FormStoreError::not_found("Submission", submission_id))?;
            if submission.status.is_final() {
                return Err(FormStoreError::Locked {
                    id: submission_id,
                    status: submission.status.to_string(),
                });
            }
            return Err(FormStoreError::DataAttached { id: submission_id });
        }
        Ok(())
    }

    async fn form(&self, id: i64) -> Result<Option<Form>> {
        let row = sqlx::query("SELECT id, definition FROM formstore_forms WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(form_from_row).transpose()
    }

    async fn forms(&self) -> Result<Vec<Form>> {
        let rows = sqlx::query("SELECT id, definition FROM formstore_forms ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(form_from_row).collect()
    }

    async fn insert_form(&self, mut form: Form) -> Result<Form> {
        let now = now_text();
        let closes_at = form.closes_at.map(|t| t.to_rfc3339());

        if form.id == 0 {
            let id = sqlx::query(
                r#"
                INSERT INTO formstore_forms (title, closes_at, definition, created_at, updated_at)
                VALUES (?1, ?2, '{}', ?3, ?3)
                "#,
            )
            .bind(&form.title)
            .bind(&closes_at)
            .bind(&now)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
            form.id = id;
        } else {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO formstore_forms (id, title, closes_at, definition, created_at, updated_at)
                VALUES (?1, ?2, ?3, '{}', ?4, ?4)
                "#,
            )
            .bind(form.id)
            .bind(&form.title)
            .bind(&closes_at)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }

        sqlx::query("UPDATE formstore_forms SET definition = ?1 WHERE id = ?2")
            .bind(serde_json::to_string(&form)?)
            .bind(form.id)
            .execute(&self.pool)
            .await?;

        info!(form.id = form.id, title = %form.title, "Stored form definition");
        Ok(form)
    }

    async fn submitter(&self, id: i64) -> Result<Option<Submitter>> {
        let row = sqlx::query("SELECT id, email, name FROM formstore_submitters WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(submitter_from_row).transpose()
    }

    async fn submitters(&self) -> Result<Vec<Submitter>> {
        let rows = sqlx::query("SELECT id, email, name FROM formstore_submitters ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(submitter_from_row).collect()
    }

    async fn insert_submitter(&self, submitter: NewSubmitter) -> Result<Submitter> {
        let id = sqlx::query(
            "INSERT INTO formstore_submitters (email, name, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&submitter.email)
        .bind(&submitter.name)
        .bind(now_text())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Submitter {
            id,
            email: submitter.email,
            name: submitter.name,
        })
    }

    async fn data_record(&self, data: &DataRef) -> Result<Option<DataRecord>> {
        let row = sqlx::query(
            "SELECT id, kind, fields FROM formstore_records WHERE id = ?1 AND kind = ?2",
        )
        .bind(data.id)
        .bind(&data.kind)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let fields: String = row.try_get("fields")?;
                Ok(Some(DataRecord {
                    id: row.try_get("id")?,
                    kind: row.try_get("kind")?,
                    fields: parse_fields(&fields)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn insert_data_record(
        &self,
        kind: &str,
        fields: Map<String, Value>,
    ) -> Result<DataRecord> {
        let now = now_text();
        let id = sqlx::query(
            r#"
            INSERT INTO formstore_records (kind, fields, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            "#,
        )
        .bind(kind)
        .bind(serde_json::to_string(&fields)?)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(DataRecord {
            id,
            kind: kind.to_string(),
            fields,
        })
    }

    async fn update_data_record(
        &self,
        data: &DataRef,
        fields: Map<String, Value>,
    ) -> Result<DataRecord> {
        let result = sqlx::query(
            "UPDATE formstore_records SET fields = ?1, updated_at = ?2 WHERE id = ?3 AND kind = ?4",
        )
        .bind(serde_json::to_string(&fields)?)
        .bind(now_text())
        .bind(data.id)
        .bind(&data.kind)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(FormStoreError::not_found("Data record", data.id));
        }
        Ok(DataRecord {
            id: data.id,
            kind: data.kind.clone(),
            fields,
        })
    }

    async fn relation_rows(&self, data: &DataRef, field: &str) -> Result<Vec<RelationRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, data_id, field, fields
            FROM formstore_relation_rows
            WHERE data_id = ?1 AND field = ?2
            ORDER BY id ASC
            "#,
        )
        .bind(data.id)
        .bind(field)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(relation_row_from_row).collect()
    }

    async fn insert_relation_row(
        &self,
        data: &DataRef,
        field: &str,
        fields: Map<String, Value>,
    ) -> Result<RelationRow> {
        if self.data_record(data).await?.is_none() {
            return Err(FormStoreError::not_found("Data record", data.id));
        }

        let id = sqlx::query(
            r#"
            INSERT INTO formstore_relation_rows (data_id, field, fields, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(data.id)
        .bind(field)
        .bind(serde_json::to_string(&fields)?)
        .bind(now_text())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(RelationRow {
            id,
            data_id: data.id,
            field: field.to_string(),
            fields,
        })
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE formstore_submissions
            SET status = ?1, treated = ?2, updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(commit.to.code())
        .bind(commit.treated.to_rfc3339())
        .bind(now_text())
        .bind(commit.submission_id)
        .bind(commit.from.code())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            if self.submission(commit.submission_id).await?.is_none() {
                return Err(FormStoreError::not_found("Submission", commit.submission_id));
            }
            warn!(
                submission.id = commit.submission_id,
                expected = %commit.from,
                "Status changed underneath transition"
            );
            return Ok(false);
        }

        if let Some(purge) = &commit.purge {
            let attached = sqlx::query(
                "SELECT data_id, data_type FROM formstore_submissions WHERE id = ?1",
            )
            .bind(commit.submission_id)
            .fetch_one(&mut *tx)
            .await?;
            let data_id: Option<i64> = attached.try_get("data_id")?;
            let data_type: Option<String> = attached.try_get("data_type")?;

            if let (Some(data_id), Some(data_type)) = (data_id, data_type) {
                for field in &purge.relation_fields {
                    let deleted = sqlx::query(
                        "DELETE FROM formstore_relation_rows WHERE data_id = ?1 AND field = ?2",
                    )
                    .bind(data_id)
                    .bind(field)
                    .execute(&mut *tx)
                    .await?;
                    debug!(
                        submission.id = commit.submission_id,
                        relation = %field,
                        rows = deleted.rows_affected(),
                        "Deleted relation rows"
                    );
                }

                sqlx::query("DELETE FROM formstore_records WHERE id = ?1 AND kind = ?2")
                    .bind(data_id)
                    .bind(&data_type)
                    .execute(&mut *tx)
                    .await?;
            }

            sqlx::query(
                "UPDATE formstore_submissions SET data_id = NULL, data_type = NULL WHERE id = ?1",
            )
            .bind(commit.submission_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            submission.id = commit.submission_id,
            status = %commit.to,
            purged = commit.purge.is_some(),
            "Committed submission transition"
        );
        Ok(true)
    }
}
