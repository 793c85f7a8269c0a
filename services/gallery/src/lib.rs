//! Gallery Service
//!
//! Photo upload and gallery service for IoT camera snapshots. Cameras post a
//! single image as multipart form data; the service stores the raw bytes with
//! a generated filename and serves them back by id. A listing endpoint and a
//! self-refreshing HTML page make up the gallery.
//!
//! ## Endpoints
//!
//! | Method | Path          | Purpose                                  |
//! |--------|---------------|------------------------------------------|
//! | POST   | `/upload`     | Store the multipart `file` part          |
//! | GET    | `/image/:id`  | Raw image bytes, served as `image/jpeg`  |
//! | GET    | `/photos`     | Metadata for every photo, newest first   |
//! | GET    | `/`           | Gallery page polling `/photos`           |
//! | GET    | `/health`     | Liveness                                 |
//! | GET    | `/ready`      | Store connectivity                       |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Camera /     │────▶│ Gallery API  │────▶│ PhotoStore   │
//! │ Browser      │◀────│ (axum)       │◀────│ (PostgreSQL) │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod memory_store;
pub mod page;
pub mod photo;
pub mod photo_store;

pub use api::{create_router, start_api_server, ApiError, AppState, UploadResponse};
pub use config::{Config, StoreBackend};
pub use memory_store::MemoryPhotoStore;
pub use photo::{NewPhoto, Photo, PhotoSummary};
pub use photo_store::{PgPhotoStore, PhotoStore, StoreError};
