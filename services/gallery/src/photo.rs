use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored photo record
#[derive(Debug, Clone, FromRow)]
pub struct Photo {
    /// Store-assigned identifier
    pub id: Uuid,
    /// Raw uploaded bytes
    pub image: Vec<u8>,
    /// Generated name, `photo_<epoch millis>.jpg`
    pub filename: String,
    /// Creation time, set once by the store
    pub timestamp: DateTime<Utc>,
}

/// Fields supplied by the uploader; the store assigns `id` and `timestamp`
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub image: Vec<u8>,
    pub filename: String,
}

impl NewPhoto {
    /// Wrap uploaded bytes with a filename derived from `now`.
    pub fn from_upload(image: Vec<u8>, now: DateTime<Utc>) -> Self {
        Self {
            image,
            filename: generated_filename(now),
        }
    }
}

/// Listing projection of a photo, without the image bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PhotoSummary {
    pub id: Uuid,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Photo> for PhotoSummary {
    fn from(p: &Photo) -> Self {
        Self {
            id: p.id,
            filename: p.filename.clone(),
            timestamp: p.timestamp,
        }
    }
}

/// The extension is always `.jpg`, whatever was uploaded.
pub fn generated_filename(now: DateTime<Utc>) -> String {
    format!("photo_{}.jpg", now.timestamp_millis())
}
