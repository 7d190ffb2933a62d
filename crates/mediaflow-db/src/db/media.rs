use async_trait::async_trait;
use chrono::Utc;
use mediaflow_core::models::{MediaRecord, MetadataEntry};
use mediaflow_core::{AppError, MediaRepository};
use sqlx::{PgPool, Postgres};

const MEDIA_COLUMNS: &str = r#"
    id, external_id, title, filename, description, category, mime_type,
    duration, screen_size, aspect_ratio, file_size, thumbnail, preview,
    status, progress, error, path, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgMediaRepository {
    pool: PgPool,
}

impl PgMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, record: &mut MediaRecord) -> Result<(), AppError> {
        let (id, created_at): (i64, chrono::DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO media (
                external_id, title, filename, description, category, mime_type,
                duration, screen_size, aspect_ratio, file_size, thumbnail, preview,
                status, progress, error, path, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17)
            RETURNING id, created_at
            "#,
        )
        .bind(&record.external_id)
        .bind(&record.title)
        .bind(&record.filename)
        .bind(&record.description)
        .bind(record.category)
        .bind(&record.mime_type)
        .bind(record.duration)
        .bind(&record.screen_size)
        .bind(&record.aspect_ratio)
        .bind(record.file_size)
        .bind(&record.thumbnail)
        .bind(&record.preview)
        .bind(record.status)
        .bind(record.progress)
        .bind(&record.error)
        .bind(&record.path)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, title = %record.title, "Failed to insert media record");
            AppError::from(e)
        })?;

        record.id = id;
        record.created_at = created_at;
        tracing::debug!(media_id = id, status = %record.status, "Media record inserted");
        Ok(())
    }

    async fn update(&self, record: &MediaRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE media SET
                external_id = $2, title = $3, filename = $4, description = $5,
                category = $6, mime_type = $7, duration = $8, screen_size = $9,
                aspect_ratio = $10, file_size = $11, thumbnail = $12, preview = $13,
                status = $14, progress = $15, error = $16, path = $17, updated_at = $18
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.external_id)
        .bind(&record.title)
        .bind(&record.filename)
        .bind(&record.description)
        .bind(record.category)
        .bind(&record.mime_type)
        .bind(record.duration)
        .bind(&record.screen_size)
        .bind(&record.aspect_ratio)
        .bind(record.file_size)
        .bind(&record.thumbnail)
        .bind(&record.preview)
        .bind(record.status)
        .bind(record.progress)
        .bind(&record.error)
        .bind(&record.path)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, media_id = record.id, "Failed to update media record");
            AppError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Media {} not found", record.id)));
        }
        tracing::debug!(media_id = record.id, status = %record.status, "Media record updated");
        Ok(())
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    #[tracing::instrument(skip(self, record), fields(media_id = record.id))]
    async fn save(&self, record: &mut MediaRecord) -> Result<(), AppError> {
        record.updated_at = Utc::now();
        if record.is_persisted() {
            self.update(record).await
        } else {
            self.insert(record).await
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<MediaRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, MediaRecord>(&format!(
            "SELECT {} FROM media WHERE id = $1",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<MediaRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, MediaRecord>(&format!(
            "SELECT {} FROM media WHERE external_id = $1",
            MEDIA_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    #[tracing::instrument(skip(self, entries), fields(tag_count = entries.len()))]
    async fn save_metadata(
        &self,
        media_id: i64,
        entries: &[MetadataEntry],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM media_metadata WHERE media_id = $1")
            .bind(media_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO media_metadata (media_id, key, value)
                VALUES ($1, $2, $3)
                ON CONFLICT (media_id, key) DO UPDATE SET value = EXCLUDED.value
                "#,
            )
            .bind(media_id)
            .bind(&entry.key)
            .bind(&entry.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, media_id, key = %entry.key, "Failed to insert metadata tag");
                AppError::from(e)
            })?;
        }

        tx.commit().await?;
        tracing::debug!(media_id, "Metadata tags saved");
        Ok(())
    }

    async fn list_metadata(&self, media_id: i64) -> Result<Vec<MetadataEntry>, AppError> {
        let entries = sqlx::query_as::<Postgres, MetadataEntry>(
            "SELECT key, value FROM media_metadata WHERE media_id = $1 ORDER BY key",
        )
        .bind(media_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
