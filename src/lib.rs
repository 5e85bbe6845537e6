//! Doctor-side client for the MediKariyer profile-photo approval
//! workflow: submit a photo as an optimistic pending request, reconcile
//! it against the authoritative server status and a durable per-user
//! local cache, and poll until an admin decision lands.

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod flow;
pub mod image_validator;
pub mod reconciler;
pub mod types;

pub use cache::{CacheStore, MemoryCache, SqliteCache, CACHE_FILE_URL_MAX};
pub use config::ClientConfig;
pub use core::api_client::PhotoApiClient;
pub use flow::{spawn_poller, PhotoRequestFlow, PollHandle};
pub use image_validator::{PhotoValidator, MAX_UPLOAD_BYTES};
pub use reconciler::{merge_history, reconcile, Effect, Reconciliation, HISTORY_CAP};
pub use types::{PhotoRequest, ReconciledView, RequestStatus};
