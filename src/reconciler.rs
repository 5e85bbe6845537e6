// src/reconciler.rs
//! Three-way merge of server status, local cache and optimistic state
//! into one rendering decision, plus the history merge routine.

use std::collections::HashSet;

use crate::types::{PhotoRequest, RequestStatus};

/// Maximum number of history entries kept after a merge.
pub const HISTORY_CAP: usize = 50;

/// Side effect the caller must apply after a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Persist this entry as the current user's pending request,
    /// replacing any optimistic placeholder.
    PersistPending(PhotoRequest),
    /// Remove the current user's pending cache entry.
    PurgePending,
    /// The profile photo may have changed; schedule a profile refetch.
    RefreshProfile,
}

/// Pending-state half of the rendering decision. History is merged
/// separately via [`merge_history`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingView {
    pub is_pending: bool,
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub view: PendingView,
    pub effects: Vec<Effect>,
}

impl Reconciliation {
    fn cleared(effects: Vec<Effect>) -> Self {
        Self {
            view: PendingView::default(),
            effects,
        }
    }
}

/// Merge the three state sources in strict priority order:
///
/// 1. no user identity: everything is invalid, clear and purge;
/// 2. server `pending`: authoritative, mirror its file URL, persist it;
/// 3. server terminal: clear everything, purge the cache, refresh the
///    profile;
/// 4. server null with the optimistic override set: trust the local
///    submission over the stale null (the server may not have indexed
///    the new request yet);
/// 5. server null otherwise: a same-user pending cache entry survives a
///    reload, anything else clears.
///
/// A cached entry owned by a different user is never shown.
pub fn reconcile(
    server: Option<&PhotoRequest>,
    cached: Option<&PhotoRequest>,
    optimistic_override: bool,
    user_id: Option<&str>,
) -> Reconciliation {
    let Some(user) = user_id else {
        return Reconciliation::cleared(vec![Effect::PurgePending]);
    };

    let cached = cached.filter(|c| c.owner_user_id == user);

    match server {
        Some(req) if req.status == RequestStatus::Pending => {
            let mut adopted = req.clone();
            adopted.optimistic = false;
            if adopted.owner_user_id.is_empty() {
                adopted.owner_user_id = user.to_string();
            }
            Reconciliation {
                view: PendingView {
                    is_pending: true,
                    preview_url: adopted.file_url.clone(),
                },
                effects: vec![Effect::PersistPending(adopted)],
            }
        }
        Some(_) => {
            // Terminal decision: the profile photo may have changed.
            Reconciliation::cleared(vec![Effect::PurgePending, Effect::RefreshProfile])
        }
        None if optimistic_override => Reconciliation {
            view: PendingView {
                is_pending: true,
                preview_url: cached.and_then(|c| c.file_url.clone()),
            },
            effects: vec![],
        },
        None => match cached {
            Some(c) if c.status == RequestStatus::Pending => Reconciliation {
                view: PendingView {
                    is_pending: true,
                    preview_url: c.file_url.clone(),
                },
                effects: vec![],
            },
            Some(_) => Reconciliation::cleared(vec![Effect::PurgePending]),
            None => Reconciliation::cleared(vec![]),
        },
    }
}

/// Merge server-reported history with locally cached entries.
///
/// Entries are deduplicated by [`PhotoRequest::dedup_key`] with the
/// server copy winning, sorted newest-first and capped at
/// [`HISTORY_CAP`].
pub fn merge_history(server: &[PhotoRequest], cached: &[PhotoRequest]) -> Vec<PhotoRequest> {
    let mut seen = HashSet::new();
    let mut merged: Vec<PhotoRequest> = Vec::with_capacity(server.len() + cached.len());

    for entry in server.iter().chain(cached.iter()) {
        if seen.insert(entry.dedup_key()) {
            merged.push(entry.clone());
        }
    }

    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged.truncate(HISTORY_CAP);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn server_request(status: RequestStatus, file_url: Option<&str>) -> PhotoRequest {
        PhotoRequest {
            id: Some(1),
            status,
            file_url: file_url.map(String::from),
            reason: None,
            created_at: Utc::now(),
            reviewed_at: None,
            owner_user_id: "doctor-1".to_string(),
            optimistic: false,
            client_update_id: None,
        }
    }

    #[test]
    fn test_no_user_clears_everything() {
        let cached = PhotoRequest::optimistic("doctor-1", "data:image/png;base64,AAAA");
        let rec = reconcile(None, Some(&cached), true, None);
        assert!(!rec.view.is_pending);
        assert!(rec.view.preview_url.is_none());
        assert!(rec.effects.contains(&Effect::PurgePending));
    }

    #[test]
    fn test_server_pending_is_authoritative() {
        let server = server_request(RequestStatus::Pending, Some("https://cdn/photo.png"));
        let cached = PhotoRequest::optimistic("doctor-1", "data:image/png;base64,AAAA");
        let rec = reconcile(Some(&server), Some(&cached), true, Some("doctor-1"));

        assert!(rec.view.is_pending);
        assert_eq!(rec.view.preview_url.as_deref(), Some("https://cdn/photo.png"));
        match &rec.effects[..] {
            [Effect::PersistPending(entry)] => {
                assert!(!entry.optimistic);
                assert_eq!(entry.id, Some(1));
            }
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_terminal_clears_stale_cached_pending() {
        // A stale cached "pending" entry must not survive a decision.
        let server = server_request(RequestStatus::Approved, None);
        let cached = PhotoRequest::optimistic("doctor-1", "data:image/png;base64,AAAA");
        let rec = reconcile(Some(&server), Some(&cached), false, Some("doctor-1"));

        assert!(!rec.view.is_pending);
        assert!(rec.view.preview_url.is_none());
        assert!(rec.effects.contains(&Effect::PurgePending));
        assert!(rec.effects.contains(&Effect::RefreshProfile));
    }

    #[test]
    fn test_optimistic_override_beats_stale_null() {
        let cached = PhotoRequest::optimistic("doctor-1", "data:image/png;base64,AAAA");
        let rec = reconcile(None, Some(&cached), true, Some("doctor-1"));

        assert!(rec.view.is_pending);
        assert_eq!(
            rec.view.preview_url.as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert!(rec.effects.is_empty());
    }

    #[test]
    fn test_null_without_override_keeps_same_user_cache() {
        // Reload-during-review window: the cache entry carries the state.
        let cached = PhotoRequest::optimistic("doctor-1", "data:image/png;base64,AAAA");
        let rec = reconcile(None, Some(&cached), false, Some("doctor-1"));
        assert!(rec.view.is_pending);
    }

    #[test]
    fn test_null_without_override_and_no_cache_clears() {
        let rec = reconcile(None, None, false, Some("doctor-1"));
        assert!(!rec.view.is_pending);
        assert!(rec.effects.is_empty());
    }

    #[test]
    fn test_other_users_cache_entry_is_invisible() {
        let cached = PhotoRequest::optimistic("doctor-2", "data:image/png;base64,AAAA");
        let rec = reconcile(None, Some(&cached), false, Some("doctor-1"));
        assert!(!rec.view.is_pending);
        assert!(rec.view.preview_url.is_none());
    }

    #[test]
    fn test_at_most_one_pending_view() {
        // Whatever the combination of sources, the view is a single
        // pending flag, never two concurrent pending requests.
        let server = server_request(RequestStatus::Pending, Some("https://cdn/a.png"));
        let cached = PhotoRequest::optimistic("doctor-1", "data:image/png;base64,BBBB");
        let rec = reconcile(Some(&server), Some(&cached), true, Some("doctor-1"));
        assert!(rec.view.is_pending);
        // The server copy won; the optimistic preview is gone.
        assert_eq!(rec.view.preview_url.as_deref(), Some("https://cdn/a.png"));
    }

    #[test]
    fn test_merge_history_dedups_by_id_preferring_server() {
        let now = Utc::now();
        let mut server_copy = server_request(RequestStatus::Approved, Some("https://cdn/a.png"));
        server_copy.created_at = now;
        let mut cached_copy = server_copy.clone();
        cached_copy.file_url = Some("data:image/png;base64,stale".to_string());

        let merged = merge_history(
            std::slice::from_ref(&server_copy),
            std::slice::from_ref(&cached_copy),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].file_url.as_deref(), Some("https://cdn/a.png"));
    }

    #[test]
    fn test_merge_history_orders_newest_first_and_caps() {
        let base = Utc::now();
        let entries: Vec<PhotoRequest> = (0..60)
            .map(|i| {
                let mut req = server_request(RequestStatus::Rejected, None);
                req.id = Some(i);
                req.created_at = base + Duration::seconds(i);
                req
            })
            .collect();

        let merged = merge_history(&entries, &[]);
        assert_eq!(merged.len(), HISTORY_CAP);
        assert_eq!(merged[0].id, Some(59));
        assert!(merged.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_merge_history_dedups_unidentified_entries_by_fields() {
        let optimistic = PhotoRequest::optimistic("doctor-1", "data:image/png;base64,AAAA");
        let duplicate = optimistic.clone();
        let merged = merge_history(&[], &[optimistic, duplicate]);
        assert_eq!(merged.len(), 1);
    }
}
