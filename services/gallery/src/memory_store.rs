use crate::photo::{NewPhoto, Photo, PhotoSummary};
use crate::photo_store::{parse_id, PhotoStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local photo store, kept in insertion order.
///
/// Used by tests and by `database.backend = "memory"` for running without
/// PostgreSQL. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryPhotoStore {
    photos: RwLock<Vec<Photo>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored photos
    pub async fn len(&self) -> usize {
        self.photos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.photos.read().await.is_empty()
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn insert(&self, photo: NewPhoto) -> Result<PhotoSummary, StoreError> {
        let record = Photo {
            id: Uuid::new_v4(),
            image: photo.image,
            filename: photo.filename,
            timestamp: Utc::now(),
        };
        let summary = PhotoSummary::from(&record);

        self.photos.write().await.push(record);

        Ok(summary)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Photo>, StoreError> {
        let id = parse_id(id)?;

        Ok(self
            .photos
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn list_recent(&self) -> Result<Vec<PhotoSummary>, StoreError> {
        // Newest insert first so equal timestamps keep reverse insertion order
        let mut photos: Vec<PhotoSummary> = self
            .photos
            .read()
            .await
            .iter()
            .rev()
            .map(PhotoSummary::from)
            .collect();

        photos.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(photos)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(bytes: &[u8]) -> NewPhoto {
        NewPhoto::from_upload(bytes.to_vec(), Utc::now())
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = MemoryPhotoStore::new();
        let saved = store.insert(upload(b"0123456789")).await.unwrap();

        let photo = store
            .find_by_id(&saved.id.to_string())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(photo.image, b"0123456789");
        assert_eq!(photo.timestamp, saved.timestamp);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_and_malformed_ids() {
        let store = MemoryPhotoStore::new();
        store.insert(upload(b"a")).await.unwrap();

        let missing = store.find_by_id(&Uuid::new_v4().to_string()).await;
        assert!(matches!(missing, Ok(None)));

        let malformed = store.find_by_id("12345").await;
        assert!(matches!(malformed, Err(StoreError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let store = MemoryPhotoStore::new();
        let first = store.insert(upload(b"a")).await.unwrap();
        let second = store.insert(upload(b"b")).await.unwrap();
        let third = store.insert(upload(b"c")).await.unwrap();

        let ids: Vec<Uuid> = store
            .list_recent()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();

        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }
}
