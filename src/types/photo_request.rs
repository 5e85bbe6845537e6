// src/types/photo_request.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review status of a photo change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    /// True once an admin decision (or a cancellation) has been recorded.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A profile-photo change request, as reported by the server or as a
/// local optimistic placeholder awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRequest {
    /// Server-assigned identifier. Absent for optimistic entries.
    #[serde(default)]
    pub id: Option<i64>,
    pub status: RequestStatus,
    #[serde(default)]
    pub file_url: Option<String>,
    /// Rejection reason, present only when `status` is `rejected`.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Doctor who submitted the request. Namespaces local cache entries.
    #[serde(default)]
    pub owner_user_id: String,
    /// Local-only entry, not yet confirmed by the server. Never sent on
    /// the wire; the server simply omits it.
    #[serde(default)]
    pub optimistic: bool,
    /// Client-generated correlation id for optimistic entries, so a
    /// rollback or replacement can be matched against the cached copy.
    #[serde(default)]
    pub client_update_id: Option<Uuid>,
}

impl PhotoRequest {
    /// Build the optimistic placeholder created at submission time,
    /// before any network confirmation.
    pub fn optimistic(owner_user_id: &str, file_url: &str) -> Self {
        Self {
            id: None,
            status: RequestStatus::Pending,
            file_url: Some(file_url.to_string()),
            reason: None,
            created_at: Utc::now(),
            reviewed_at: None,
            owner_user_id: owner_user_id.to_string(),
            optimistic: true,
            client_update_id: Some(Uuid::new_v4()),
        }
    }

    /// Deduplication key for history merging: server id when assigned,
    /// otherwise the (created_at, status, file_url) tuple.
    pub fn dedup_key(&self) -> DedupKey {
        match self.id {
            Some(id) => DedupKey::Id(id),
            None => DedupKey::Fields(self.created_at, self.status, self.file_url.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Id(i64),
    Fields(DateTime<Utc>, RequestStatus, Option<String>),
}

/// The single rendering decision produced by reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledView {
    pub is_pending: bool,
    pub preview_url: Option<String>,
    pub history: Vec<PhotoRequest>,
}
