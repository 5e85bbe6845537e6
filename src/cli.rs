// src/cli.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::cache::SqliteCache;
use crate::config::ClientConfig;
use crate::core::api_client::PhotoApiClient;
use crate::flow::PhotoRequestFlow;
use crate::image_validator::encode_data_url;
use crate::types::ReconciledView;

#[derive(Parser)]
#[command(name = "medikariyer-photo")]
#[command(about = "Doctor-side profile photo approval workflow for MediKariyer")]
pub struct PhotoCli {
    #[command(subcommand)]
    pub command: PhotoCommand,

    /// Doctor user id; namespaces the local cache
    #[arg(long)]
    pub user: String,

    /// Override MEDIKARIYER_API_URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Override MEDIKARIYER_TOKEN
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum PhotoCommand {
    /// Show the current photo request state
    Status,
    /// Submit a new profile photo (PNG or JPEG) for approval
    Submit { image: PathBuf },
    /// Cancel the pending photo change request
    Cancel,
    /// Poll until the pending request is approved, rejected or cancelled
    Watch,
    /// Show the merged request history
    History,
}

pub async fn handle_photo_command(cli: PhotoCli) -> Result<()> {
    let mut config = ClientConfig::load()?;
    if let Some(url) = cli.api_url {
        config = config.with_api_base_url(url);
    }
    if cli.token.is_some() {
        config = config.with_bearer_token(cli.token);
    }

    let api = PhotoApiClient::new(
        config.api_base_url.clone(),
        config.bearer_token.clone(),
        config.timeout_seconds,
    )?;
    let store = SqliteCache::open(config.cache_db_path.clone()).await?;

    let mut flow = PhotoRequestFlow::new(api, store);
    flow.set_user(Some(cli.user.clone())).await;

    match cli.command {
        PhotoCommand::Status => {
            let view = flow.sync_once().await?;
            report_view(view);
        }

        PhotoCommand::Submit { image } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Failed to read image: {}", image.display()))?;
            let data_url = encode_data_url(&image, &bytes)?;

            flow.submit(&data_url).await?;
            info!("✅ Photo submitted and awaiting approval");
            info!("   Poll with: medikariyer-photo --user {} watch", cli.user);
        }

        PhotoCommand::Cancel => {
            // A failing status fetch must not block cancellation of a
            // locally known pending request.
            if let Err(e) = flow.sync_once().await.map(|_| ()) {
                warn!("Status fetch failed, cancelling from local state: {}", e);
            }
            flow.cancel().await?;
            info!("✅ Pending photo change request cancelled");
        }

        PhotoCommand::Watch => {
            let view = flow.sync_once().await?;
            if !view.is_pending {
                info!("No pending photo change request to watch");
                report_view(view);
                return Ok(());
            }

            info!(
                "Watching pending photo request (every {}s)...",
                config.poll_interval.as_secs()
            );
            loop {
                tokio::time::sleep(config.poll_interval).await;
                match flow.sync_once().await {
                    Ok(view) if !view.is_pending => break,
                    Ok(_) => info!("Still pending..."),
                    Err(e) => warn!("Poll failed, retrying: {}", e),
                }
            }

            let decided = flow.view().history.first().cloned();
            match decided {
                Some(entry) => {
                    info!("✅ Request resolved: {}", entry.status.as_str());
                    if let Some(reason) = entry.reason {
                        info!("   Reason: {}", reason);
                    }
                }
                None => info!("✅ Request resolved"),
            }
            if flow.take_profile_refresh() {
                info!("   Profile photo may have changed; refresh your profile");
            }
        }

        PhotoCommand::History => {
            let view = flow.sync_once().await?;
            if view.history.is_empty() {
                info!("No photo change requests on record");
            } else {
                info!("{:<6} {:<10} {:<20} Reason", "ID", "Status", "Created");
                for entry in &view.history {
                    info!(
                        "{:<6} {:<10} {:<20} {}",
                        entry
                            .id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        entry.status.as_str(),
                        entry.created_at.format("%Y-%m-%d %H:%M"),
                        entry.reason.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }

    Ok(())
}

fn report_view(view: &ReconciledView) {
    if view.is_pending {
        info!("⏳ A photo change request is pending approval");
        if let Some(url) = &view.preview_url {
            let shown: String = url.chars().take(64).collect();
            info!("   Preview: {}", shown);
        }
    } else {
        info!("No pending photo change request");
    }
    info!("   History entries: {}", view.history.len());
}
