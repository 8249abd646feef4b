use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::config::RETENTION_HOURS;
use crate::core::lifecycle::LifecycleManager;
use crate::core::reconcile::ReconcileEngine;
use crate::discord::reminders::ReminderService;
use crate::storage::Database;
use crate::storage::types::ChannelRecord;
use crate::util;
use crate::youtube::VideoResolver;

/// Everything the cron closures need. Cloned into each job.
#[derive(Clone)]
pub struct TaskContext {
    pub db: Database,
    pub engine: Arc<ReconcileEngine>,
    pub reminders: Arc<ReminderService>,
    pub resolver: Arc<dyn VideoResolver>,
    pub http: reqwest::Client,
    pub lookahead_minutes: i64,
}

pub async fn register_jobs(lifecycle: &mut LifecycleManager, ctx: TaskContext) -> Result<()> {
    register_feed_polls(lifecycle, &ctx).await?;
    register_reminder_sweep(lifecycle, &ctx).await?;
    register_status_refresh(lifecycle, &ctx).await?;
    register_cleanup(lifecycle, &ctx).await?;
    Ok(())
}

/// One cron per distinct polling interval. The interval set is read once
/// at startup; which channels belong to an interval is re-read on every
/// tick, so adding a channel at an existing cadence needs no restart.
async fn register_feed_polls(lifecycle: &mut LifecycleManager, ctx: &TaskContext) -> Result<()> {
    let intervals = ctx.db.get_active_intervals().await?;
    if intervals.is_empty() {
        warn!("No active channels configured. Feed polling is idle.");
        return Ok(());
    }

    for minutes in intervals {
        let expr = format!("0 0/{} * * * *", minutes);
        let ctx_clone = ctx.clone();
        match tokio_cron_scheduler::Job::new_async(expr.as_str(), move |_uuid, mut _l| {
            let ctx = ctx_clone.clone();
            Box::pin(async move {
                if let Err(e) = poll_channels(&ctx, minutes).await {
                    error!("Feed poll ({}m) failed: {}", minutes, e);
                }
            })
        }) {
            Ok(job) => {
                lifecycle.scheduler.add(job).await?;
                info!("Feed poll registered every {} minute(s)", minutes);
            }
            Err(e) => {
                error!("Failed to create feed poll cron ({}m): {}", minutes, e);
            }
        }
    }
    Ok(())
}

async fn poll_channels(ctx: &TaskContext, interval_minutes: u32) -> Result<()> {
    let channels = ctx
        .db
        .get_active_channels_with_interval(interval_minutes)
        .await?;
    for channel in channels {
        maintain_channel_icon(ctx, &channel).await;
        if let Err(e) = ctx.engine.reconcile_channel(&channel).await {
            error!("Channel {} reconcile failed: {}", channel.channel_id, e);
        }
    }
    Ok(())
}

/// Thumbnail URLs rot when a channel changes its avatar. Replace dead
/// ones in storage; the current cycle still posts with the old URL.
async fn maintain_channel_icon(ctx: &TaskContext, channel: &ChannelRecord) {
    let usable = !channel.channel_icon_url.is_empty()
        && util::is_url_accessible(&ctx.http, &channel.channel_icon_url).await;
    if usable {
        return;
    }

    match ctx.resolver.fetch_channel_icon(&channel.channel_id).await {
        Ok(Some(url)) => {
            info!("Refreshing icon for channel {}", channel.channel_id);
            if let Err(e) = ctx.db.update_channel_icon(&channel.channel_id, &url).await {
                error!("Failed to store icon for {}: {}", channel.channel_id, e);
            }
        }
        Ok(None) => {
            warn!("Channel {} has no default thumbnail", channel.channel_id);
        }
        Err(e) => {
            warn!("Icon lookup for {} failed: {}", channel.channel_id, e);
        }
    }
}

/// Every minute, arm one-shot timers for reminders entering the
/// lookahead window.
async fn register_reminder_sweep(lifecycle: &mut LifecycleManager, ctx: &TaskContext) -> Result<()> {
    let ctx_clone = ctx.clone();
    match tokio_cron_scheduler::Job::new_async("0 * * * * *", move |_uuid, mut _l| {
        let ctx = ctx_clone.clone();
        Box::pin(async move {
            if let Err(e) = ctx
                .reminders
                .schedule_due_reminders(ctx.lookahead_minutes)
                .await
            {
                error!("Reminder sweep failed: {}", e);
            }
        })
    }) {
        Ok(job) => {
            lifecycle.scheduler.add(job).await?;
        }
        Err(e) => {
            error!("Failed to create reminder sweep cron: {}", e);
        }
    }
    Ok(())
}

/// Every five minutes, catch streams whose scheduled start has passed
/// without the feed moving.
async fn register_status_refresh(lifecycle: &mut LifecycleManager, ctx: &TaskContext) -> Result<()> {
    let ctx_clone = ctx.clone();
    match tokio_cron_scheduler::Job::new_async("0 0/5 * * * *", move |_uuid, mut _l| {
        let ctx = ctx_clone.clone();
        Box::pin(async move {
            match ctx.engine.refresh_overdue_statuses().await {
                Ok(0) => {}
                Ok(n) => info!("Status refresh updated {} video(s)", n),
                Err(e) => error!("Status refresh failed: {}", e),
            }
        })
    }) {
        Ok(job) => {
            lifecycle.scheduler.add(job).await?;
        }
        Err(e) => {
            error!("Failed to create status refresh cron: {}", e);
        }
    }
    Ok(())
}

/// Hourly retention sweep of terminal and stale rows.
async fn register_cleanup(lifecycle: &mut LifecycleManager, ctx: &TaskContext) -> Result<()> {
    let ctx_clone = ctx.clone();
    match tokio_cron_scheduler::Job::new_async("0 0 * * * *", move |_uuid, mut _l| {
        let ctx = ctx_clone.clone();
        Box::pin(async move {
            let cutoff = Utc::now() - Duration::hours(RETENTION_HOURS);
            match ctx.db.sweep_stale_videos(cutoff).await {
                Ok(swept) => {
                    for video in &swept {
                        info!(
                            "Swept {} [{:?}] {}",
                            video.video_id, video.status, video.title
                        );
                    }
                    if !swept.is_empty() {
                        info!("Retention sweep removed {} video(s)", swept.len());
                    }
                }
                Err(e) => error!("Retention sweep failed: {}", e),
            }
        })
    }) {
        Ok(job) => {
            lifecycle.scheduler.add(job).await?;
        }
        Err(e) => {
            error!("Failed to create retention sweep cron: {}", e);
        }
    }
    Ok(())
}
