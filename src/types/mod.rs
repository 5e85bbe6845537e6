// src/types/mod.rs
pub mod photo_request;
pub mod response;

pub use photo_request::{DedupKey, PhotoRequest, ReconciledView, RequestStatus};
pub use response::{
    CancelResponse, PhotoStatusData, PhotoStatusResponse, SubmitPhotoRequest, SubmitPhotoResponse,
};
