use serde::{Deserialize, Serialize};

use crate::types::photo_request::PhotoRequest;

// ===== Wire envelopes for the photo endpoints =====
//
// Every field is defaulted so a partial or malformed payload degrades to
// null/empty instead of failing the whole fetch.

#[derive(Debug, Default, Deserialize)]
pub struct PhotoStatusResponse {
    #[serde(default)]
    pub data: PhotoStatusData,
}

#[derive(Debug, Default, Deserialize)]
pub struct PhotoStatusData {
    /// The active request, or null when none is in flight.
    #[serde(default)]
    pub status: Option<PhotoRequest>,
    #[serde(default)]
    pub history: Vec<PhotoRequest>,
}

#[derive(Debug, Serialize)]
pub struct SubmitPhotoRequest {
    pub file_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitPhotoResponse {
    /// The created request as echoed back by the server, when provided.
    #[serde(default)]
    pub data: Option<PhotoRequest>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelResponse {
    #[serde(default)]
    pub message: Option<String>,
}
