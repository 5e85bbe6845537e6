// src/core/mod.rs
pub mod api_client;

pub use api_client::PhotoApiClient;
