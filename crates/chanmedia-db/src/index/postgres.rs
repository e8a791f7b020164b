use std::collections::BTreeMap;

use async_trait::async_trait;
use chanmedia_core::models::{MediaDescriptor, MediaStats};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres};

use super::{DuplicateIndex, IndexResult, InsertOutcome, PurgeFilter};

const DESCRIPTOR_COLUMNS: &str = "content_digest, storage_key, mime_type, size_bytes, width, \
     height, thumbnail_key, original_filename, spoiler, created_at";

/// Duplicate index backed by the `media_descriptors` table.
#[derive(Clone)]
pub struct PgDuplicateIndex {
    pool: PgPool,
}

impl PgDuplicateIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DuplicateIndex for PgDuplicateIndex {
    #[tracing::instrument(skip(self), fields(db.table = "media_descriptors"))]
    async fn lookup(&self, content_digest: &str) -> IndexResult<Option<MediaDescriptor>> {
        let sql = format!(
            "SELECT {} FROM media_descriptors WHERE content_digest = $1",
            DESCRIPTOR_COLUMNS
        );
        let row = sqlx::query_as::<Postgres, MediaDescriptor>(&sql)
            .bind(content_digest)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[tracing::instrument(
        skip(self, descriptor),
        fields(db.table = "media_descriptors", digest = %descriptor.content_digest)
    )]
    async fn record(&self, descriptor: &MediaDescriptor) -> IndexResult<InsertOutcome> {
        let sql = format!(
            r#"
            INSERT INTO media_descriptors ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (content_digest) DO NOTHING
            RETURNING {cols}
            "#,
            cols = DESCRIPTOR_COLUMNS
        );
        let inserted = sqlx::query_as::<Postgres, MediaDescriptor>(&sql)
            .bind(&descriptor.content_digest)
            .bind(&descriptor.storage_key)
            .bind(&descriptor.mime_type)
            .bind(descriptor.size_bytes)
            .bind(descriptor.width)
            .bind(descriptor.height)
            .bind(&descriptor.thumbnail_key)
            .bind(&descriptor.original_filename)
            .bind(descriptor.spoiler)
            .bind(descriptor.created_at)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row));
        }

        // Lost the race: the conflicting row is committed and therefore visible.
        match self.lookup(&descriptor.content_digest).await? {
            Some(existing) => Ok(InsertOutcome::Existing(existing)),
            None => Err(super::IndexError::Unavailable(format!(
                "Descriptor {} conflicted but could not be read back",
                descriptor.content_digest
            ))),
        }
    }

    #[tracing::instrument(skip(self, filter), fields(db.table = "media_descriptors", cutoff = %filter.cutoff))]
    async fn purge_candidates(&self, filter: &PurgeFilter) -> IndexResult<Vec<MediaDescriptor>> {
        let mime_types: Vec<String> = filter
            .mime_types
            .iter()
            .map(|m| m.to_ascii_lowercase())
            .collect();
        let sql = format!(
            r#"
            SELECT {}
            FROM media_descriptors
            WHERE created_at < $1
              AND (cardinality($2::text[]) = 0 OR mime_type = ANY($2))
              AND NOT (content_digest = ANY($3) OR storage_key = ANY($3))
            ORDER BY created_at ASC
            "#,
            DESCRIPTOR_COLUMNS
        );
        let rows = sqlx::query_as::<Postgres, MediaDescriptor>(&sql)
            .bind(filter.cutoff)
            .bind(&mime_types)
            .bind(&filter.exclude_keys)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_descriptors"))]
    async fn remove(&self, content_digest: &str) -> IndexResult<bool> {
        let result = sqlx::query("DELETE FROM media_descriptors WHERE content_digest = $1")
            .bind(content_digest)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn references_key(&self, storage_key: &str) -> IndexResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM media_descriptors
                WHERE storage_key = $1 OR thumbnail_key = $1
            )
            "#,
        )
        .bind(storage_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_descriptors"))]
    async fn stats(&self, now: DateTime<Utc>) -> IndexResult<MediaStats> {
        let (total_files, total_size, files_last_day, files_last_week): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(size_bytes), 0)::BIGINT,
                    COUNT(*) FILTER (WHERE created_at > $1),
                    COUNT(*) FILTER (WHERE created_at > $2)
                FROM media_descriptors
                "#,
            )
            .bind(now - Duration::days(1))
            .bind(now - Duration::days(7))
            .fetch_one(&self.pool)
            .await?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT mime_type, COUNT(*) FROM media_descriptors GROUP BY mime_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let average_file_size = if total_files > 0 {
            total_size as f64 / total_files as f64
        } else {
            0.0
        };

        Ok(MediaStats {
            total_files,
            total_size,
            files_by_type: by_type.into_iter().collect::<BTreeMap<_, _>>(),
            average_file_size,
            files_last_day,
            files_last_week,
        })
    }

    async fn ping(&self) -> IndexResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    // Requires a PostgreSQL instance: TEST_DATABASE_URL=postgres://... cargo test -- --ignored
    async fn pool() -> PgPool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .unwrap();
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
        sqlx::migrate::Migrator::new(dir)
            .await
            .unwrap()
            .run(&pool)
            .await
            .unwrap();
        pool
    }

    fn descriptor(digest: String) -> MediaDescriptor {
        MediaDescriptor {
            storage_key: format!("media/{}/{}.png", &digest[..2], digest),
            content_digest: digest,
            mime_type: "image/png".to_string(),
            size_bytes: 128,
            width: Some(4),
            height: Some(4),
            thumbnail_key: None,
            original_filename: Some("a.png".to_string()),
            spoiler: false,
            created_at: Utc::now() - Duration::days(45),
        }
    }

    fn unique_digest(seed: u8) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{:02x}{:062x}", seed, nanos)
    }

    #[tokio::test]
    #[ignore]
    async fn test_record_is_insert_if_absent() {
        let index = PgDuplicateIndex::new(pool().await);
        let first = descriptor(unique_digest(0xa1));
        let mut second = first.clone();
        second.original_filename = Some("other.png".to_string());

        let a = index.record(&first).await.unwrap();
        let b = index.record(&second).await.unwrap();

        assert!(a.was_inserted());
        assert!(!b.was_inserted());
        assert_eq!(b.descriptor().original_filename.as_deref(), Some("a.png"));

        index.remove(&first.content_digest).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_concurrent_record_single_winner() {
        let index = PgDuplicateIndex::new(pool().await);
        let d = descriptor(unique_digest(0xb2));

        let (x, y) = tokio::join!(index.record(&d), index.record(&d));
        let inserted = [x.unwrap(), y.unwrap()]
            .iter()
            .filter(|o| o.was_inserted())
            .count();
        assert_eq!(inserted, 1);

        index.remove(&d.content_digest).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_purge_candidates_respects_exclusions() {
        let index = PgDuplicateIndex::new(pool().await);
        let d = descriptor(unique_digest(0xc3));
        index.record(&d).await.unwrap();

        let mut filter = PurgeFilter {
            cutoff: Utc::now() - Duration::days(30),
            mime_types: vec!["image/png".to_string()],
            exclude_keys: vec![],
        };
        let found = index.purge_candidates(&filter).await.unwrap();
        assert!(found.iter().any(|c| c.content_digest == d.content_digest));

        filter.exclude_keys = vec![d.storage_key.clone()];
        let found = index.purge_candidates(&filter).await.unwrap();
        assert!(!found.iter().any(|c| c.content_digest == d.content_digest));

        assert!(index.references_key(&d.storage_key).await.unwrap());
        assert!(index.remove(&d.content_digest).await.unwrap());
        assert!(!index.references_key(&d.storage_key).await.unwrap());
    }
}
