// src/flow.rs
//! Stateful orchestrator for the photo-approval workflow: owns the API
//! client, the local cache and the optimistic override flag, and applies
//! reconciliation effects. All cache access is best-effort; persistence
//! failures are logged and swallowed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::core::api_client::PhotoApiClient;
use crate::image_validator::PhotoValidator;
use crate::reconciler::{merge_history, reconcile, Effect};
use crate::types::{PhotoRequest, ReconciledView, RequestStatus};

pub struct PhotoRequestFlow<S: CacheStore> {
    api: PhotoApiClient,
    store: S,
    user_id: Option<String>,
    optimistic_override: bool,
    view: ReconciledView,
    profile_refresh_needed: bool,
}

impl<S: CacheStore> PhotoRequestFlow<S> {
    pub fn new(api: PhotoApiClient, store: S) -> Self {
        Self {
            api,
            store,
            user_id: None,
            optimistic_override: false,
            view: ReconciledView::default(),
            profile_refresh_needed: false,
        }
    }

    /// The current rendering decision.
    pub fn view(&self) -> &ReconciledView {
        &self.view
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// True once, after a transition that may have changed the profile
    /// photo. Consuming it resets the flag.
    pub fn take_profile_refresh(&mut self) -> bool {
        std::mem::take(&mut self.profile_refresh_needed)
    }

    /// Switch the active user. Purges every other user's cache entries,
    /// resets in-memory state, and re-seeds the view from the new user's
    /// cache so a pending request survives a restart.
    pub async fn set_user(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
        self.optimistic_override = false;
        self.profile_refresh_needed = false;
        self.view = ReconciledView::default();

        let Some(user) = self.user_id.clone() else {
            return;
        };

        if let Err(e) = self.store.purge_other_users(&user).await {
            warn!("Failed to purge cache entries of other users: {}", e);
        }

        match self.store.pending_for(&user).await {
            Ok(Some(entry)) if entry.status == RequestStatus::Pending => {
                debug!("Restored pending photo request from cache for {}", user);
                self.view.is_pending = true;
                self.view.preview_url = entry.file_url;
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to read pending cache entry: {}", e),
        }

        match self.store.history_for(&user).await {
            Ok(entries) => self.view.history = entries,
            Err(e) => warn!("Failed to read history cache: {}", e),
        }
    }

    /// Submit a new photo. The pending state is shown and persisted
    /// immediately, before the network call; a failed submission rolls
    /// everything back to the pre-submission state.
    pub async fn submit(&mut self, file_url: &str) -> Result<()> {
        let user = self
            .user_id
            .clone()
            .context("No active user; log in before submitting a photo")?;

        if self.view.is_pending {
            anyhow::bail!("A photo change request is already pending approval");
        }

        PhotoValidator::validate_data_url(file_url).map_err(anyhow::Error::new)?;

        let placeholder = PhotoRequest::optimistic(&user, file_url);

        self.optimistic_override = true;
        self.view.is_pending = true;
        self.view.preview_url = Some(file_url.to_string());
        if let Err(e) = self.store.put_pending(&placeholder).await {
            warn!("Failed to persist optimistic cache entry: {}", e);
        }

        match self.api.submit_photo(file_url).await {
            Ok(response) => {
                // Adopt the server echo when present, otherwise keep the
                // placeholder until the next status poll confirms it.
                let entry = match response.data {
                    Some(mut confirmed) => {
                        confirmed.optimistic = false;
                        if confirmed.owner_user_id.is_empty() {
                            confirmed.owner_user_id = user.clone();
                        }
                        if confirmed.file_url.is_none() {
                            confirmed.file_url = Some(file_url.to_string());
                        }
                        if let Err(e) = self.store.put_pending(&confirmed).await {
                            warn!("Failed to persist confirmed cache entry: {}", e);
                        }
                        confirmed
                    }
                    None => placeholder,
                };

                self.view.history =
                    merge_history(std::slice::from_ref(&entry), &self.view.history);
                if let Err(e) = self.store.put_history(&user, &self.view.history).await {
                    warn!("Failed to persist history cache: {}", e);
                }

                info!("Photo change request submitted for {}", user);
                Ok(())
            }
            Err(e) => {
                // Rollback: no phantom pending entry may survive.
                self.optimistic_override = false;
                self.view.is_pending = false;
                self.view.preview_url = None;
                if let Err(purge_err) = self.store.clear_pending(&user).await {
                    warn!("Failed to clear optimistic cache entry: {}", purge_err);
                }
                Err(e).context("Photo submission failed; the request was rolled back")
            }
        }
    }

    /// Cancel the pending request. On failure the prior state is left
    /// untouched so the user can retry.
    pub async fn cancel(&mut self) -> Result<()> {
        let user = self
            .user_id
            .clone()
            .context("No active user; log in before cancelling")?;

        if !self.view.is_pending {
            anyhow::bail!("No pending photo change request to cancel");
        }

        self.api
            .cancel_request()
            .await
            .context("Cancellation failed; the pending request is unchanged")?;

        self.optimistic_override = false;
        self.view.is_pending = false;
        self.view.preview_url = None;
        if let Err(e) = self.store.clear_pending(&user).await {
            warn!("Failed to clear pending cache entry: {}", e);
        }

        if let Some(newest) = self.view.history.first_mut() {
            newest.status = RequestStatus::Cancelled;
            newest.reviewed_at = Some(Utc::now());
        }
        if let Err(e) = self.store.put_history(&user, &self.view.history).await {
            warn!("Failed to persist history cache: {}", e);
        }

        self.profile_refresh_needed = true;
        info!("Pending photo change request cancelled for {}", user);
        Ok(())
    }

    /// Fetch the authoritative status once and reconcile it with the
    /// cache and the optimistic override.
    pub async fn sync_once(&mut self) -> Result<&ReconciledView> {
        let Some(user) = self.user_id.clone() else {
            self.view = ReconciledView::default();
            return Ok(&self.view);
        };

        let data = self
            .api
            .fetch_status()
            .await
            .context("Failed to fetch photo request status")?;

        let cached = match self.store.pending_for(&user).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read pending cache entry: {}", e);
                None
            }
        };

        let rec = reconcile(
            data.status.as_ref(),
            cached.as_ref(),
            self.optimistic_override,
            Some(&user),
        );

        // Any non-null server answer is definitive and consumes the
        // override; a null answer is definitive only once no override
        // is active.
        let definitive = data.status.is_some();
        if definitive && self.optimistic_override {
            if let Some(update_id) = cached.as_ref().and_then(|c| c.client_update_id) {
                debug!("Optimistic submission {} resolved by the server", update_id);
            }
            self.optimistic_override = false;
        }

        self.view.is_pending = rec.view.is_pending;
        // A pending reconciliation without a preview (cache write failed
        // or the entry was size-trimmed) must not clobber a preview the
        // session already holds.
        self.view.preview_url = match rec.view.preview_url {
            Some(url) => Some(url),
            None if rec.view.is_pending => self.view.preview_url.take(),
            None => None,
        };

        for effect in rec.effects {
            match effect {
                Effect::PersistPending(entry) => {
                    if let Err(e) = self.store.put_pending(&entry).await {
                        warn!("Failed to persist pending cache entry: {}", e);
                    }
                }
                Effect::PurgePending => {
                    if let Err(e) = self.store.clear_pending(&user).await {
                        warn!("Failed to clear pending cache entry: {}", e);
                    }
                }
                Effect::RefreshProfile => {
                    self.profile_refresh_needed = true;
                }
            }
        }

        let cached_history = match self.store.history_for(&user).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read history cache: {}", e);
                Vec::new()
            }
        };
        // The active (or just-decided) request belongs in history too,
        // so a decision updates any stale pending copy of it.
        let mut server_history = data.history;
        if let Some(req) = data.status {
            server_history.push(req);
        }
        let merged = merge_history(&server_history, &cached_history);
        self.view.history = merge_history(&merged, &self.view.history);
        // Once the server has answered authoritatively, an unconfirmed
        // placeholder has been superseded by the id-bearing server copy
        // (whose dedup key differs) and must not linger in history.
        if definitive {
            self.view.history.retain(|entry| !entry.optimistic);
        }
        if let Err(e) = self.store.put_history(&user, &self.view.history).await {
            warn!("Failed to persist history cache: {}", e);
        }

        Ok(&self.view)
    }
}

/// Handle to a background polling task. The task stops on its own once
/// the pending request reaches a terminal state, or when `stop` is
/// called.
pub struct PollHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Poll the server at a fixed interval until the pending request is
/// resolved. Lifecycle is driven by pending-state entry/exit, not by
/// any rendering surface.
pub fn spawn_poller<S>(
    flow: Arc<Mutex<PhotoRequestFlow<S>>>,
    interval: Duration,
) -> PollHandle
where
    S: CacheStore + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    debug!("Photo status poller stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let mut flow = flow.lock().await;
                    match flow.sync_once().await {
                        Ok(view) => {
                            if !view.is_pending {
                                debug!("Pending photo request resolved, stopping poller");
                                break;
                            }
                        }
                        // Transient poll failures keep the loop alive.
                        Err(e) => warn!("Photo status poll failed: {}", e),
                    }
                }
            }
        }
    });

    PollHandle { stop_tx, task }
}
