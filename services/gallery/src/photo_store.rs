use crate::config::DatabaseConfig;
use crate::photo::{NewPhoto, Photo, PhotoSummary};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Errors raised by photo store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid photo id: {0:?}")]
    InvalidId(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Persistence seam for photo records.
///
/// Ids are taken as strings: parsing them is the store's concern, and an id
/// that does not parse is a lookup failure rather than a miss.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Persist a new photo, returning its assigned id and timestamp
    async fn insert(&self, photo: NewPhoto) -> Result<PhotoSummary, StoreError>;

    /// Look up a photo with its image bytes
    async fn find_by_id(&self, id: &str) -> Result<Option<Photo>, StoreError>;

    /// All photos, most recent first
    async fn list_recent(&self) -> Result<Vec<PhotoSummary>, StoreError>;

    /// Cheap connectivity check
    async fn ping(&self) -> Result<(), StoreError>;
}

pub(crate) fn parse_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// Photo store backed by a PostgreSQL `photos` table.
///
/// Migrations are applied by the first operation that reaches the database
/// and retried by later ones until they succeed, so a server that is down at
/// boot gets its schema once it comes up.
pub struct PgPhotoStore {
    pool: PgPool,
    migrate_on_use: bool,
    schema: OnceCell<()>,
}

impl PgPhotoStore {
    /// Build the connection pool without touching the database.
    ///
    /// Connections are opened on first use, so an unreachable server only
    /// surfaces as errors from individual operations.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_lazy(&config.url)?;

        Ok(Self {
            pool,
            migrate_on_use: config.run_migrations,
            schema: OnceCell::new(),
        })
    }

    /// Apply migrations unless they already ran on this store
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        if !self.migrate_on_use {
            return Ok(());
        }

        self.schema
            .get_or_try_init(|| self.run_migrations())
            .await?;

        Ok(())
    }

    /// Whether migrations have completed (always false when disabled)
    pub fn schema_ready(&self) -> bool {
        self.schema.initialized()
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl PhotoStore for PgPhotoStore {
    #[instrument(skip(self, photo), fields(filename = %photo.filename, size_bytes = photo.image.len()))]
    async fn insert(&self, photo: NewPhoto) -> Result<PhotoSummary, StoreError> {
        self.ensure_schema().await?;

        let saved = sqlx::query_as::<_, PhotoSummary>(
            r#"
            INSERT INTO photos (image, filename)
            VALUES ($1, $2)
            RETURNING id, filename, timestamp
            "#,
        )
        .bind(&photo.image)
        .bind(&photo.filename)
        .fetch_one(&self.pool)
        .await?;

        debug!(photo_id = %saved.id, "Photo inserted");

        Ok(saved)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Photo>, StoreError> {
        let id = parse_id(id)?;
        self.ensure_schema().await?;

        let photo = sqlx::query_as::<_, Photo>(
            r#"
            SELECT id, image, filename, timestamp
            FROM photos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(photo)
    }

    async fn list_recent(&self) -> Result<Vec<PhotoSummary>, StoreError> {
        self.ensure_schema().await?;

        let photos = sqlx::query_as::<_, PhotoSummary>(
            r#"
            SELECT id, filename, timestamp
            FROM photos
            ORDER BY timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        self.ensure_schema().await
    }
}
