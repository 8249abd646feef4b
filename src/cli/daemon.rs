use anyhow::Result;
use console::style;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::config::AppConfig;
use crate::core::lifecycle::LifecycleManager;
use crate::core::reconcile::ReconcileEngine;
use crate::core::terminal::{GuideSection, print_error, print_info, print_warn};
use crate::discord::bot::DiscordBot;
use crate::discord::reminders::{DirectMessenger, ReminderService, SerenityMessenger};
use crate::discord::webhook::{Notifier, WebhookNotifier};
use crate::platform::{NativePlatform, Platform};
use crate::storage::Database;
use crate::tasks::{self, TaskContext};
use crate::youtube::{FeedClient, FeedSource, VideoResolver, YoutubeClient};

pub async fn gateway_start(run_dir: &Path, pid_file: &Path) -> Result<()> {
    std::fs::create_dir_all(run_dir)?;
    NativePlatform::restrict_dir_permissions(run_dir);
    if pid_file.exists() && std::fs::read_to_string(pid_file).is_ok() {
        print_warn("Daemon is already running. Use 'oshirase gateway stop' first.");
        return Ok(());
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(run_dir.join("oshirase.log"))?;

    let exe = std::env::current_exe()?;
    let child = std::process::Command::new(exe)
        .arg("daemon-run")
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    std::fs::write(pid_file, child.id().to_string())?;

    GuideSection::new("Gateway Started")
        .status(
            "Status",
            &format!(
                "{} (PID {})",
                style("RUNNING").green().bold(),
                style(child.id()).dim()
            ),
        )
        .blank()
        .info(&format!(
            "Run {} to follow the daemon output.",
            style("oshirase logs").cyan().bold()
        ))
        .print();
    println!();

    Ok(())
}

pub async fn gateway_stop(pid_file: &Path) -> Result<()> {
    let mut daemon_stopped = false;
    if pid_file.exists() {
        if let Ok(pid_str) = std::fs::read_to_string(pid_file) {
            let pid = pid_str.trim();
            if !pid.is_empty() {
                let _ = NativePlatform::kill_process(pid);
                GuideSection::new("Gateway Stopped")
                    .status(
                        "Status",
                        &format!(
                            "{} (was PID {})",
                            style("STOPPED").red().bold(),
                            style(pid).dim()
                        ),
                    )
                    .print();
                daemon_stopped = true;
            }
        }
        std::fs::remove_file(pid_file).ok();
    }

    if !daemon_stopped {
        print_info("Gateway is not currently running.");
    }

    println!();
    Ok(())
}

pub async fn gateway_restart() -> Result<()> {
    let exe = std::env::current_exe()?;
    let _ = std::process::Command::new(&exe)
        .arg("gateway")
        .arg("stop")
        .status();
    let _ = std::process::Command::new(&exe)
        .arg("gateway")
        .arg("start")
        .status();
    Ok(())
}

pub async fn gateway_status(pid_file: &Path) -> Result<()> {
    if pid_file.exists() {
        let pid_str = std::fs::read_to_string(pid_file)?;
        GuideSection::new("Gateway Status")
            .status(
                "Gateway",
                &format!(
                    "{} (PID {})",
                    style("RUNNING").green().bold(),
                    style(pid_str.trim()).dim()
                ),
            )
            .print();
    } else {
        GuideSection::new("Gateway Status")
            .status("Gateway", &style("STOPPED").red().bold().to_string())
            .blank()
            .info(&format!(
                "Run {} to start the daemon.",
                style("oshirase gateway start").cyan().bold()
            ))
            .print();
    }
    println!();
    Ok(())
}

pub async fn follow_logs(run_dir: &Path, pid_file: &Path) -> Result<()> {
    if pid_file.exists() && std::fs::read_to_string(pid_file).is_ok() {
        let log_file = run_dir.join("oshirase.log");
        if log_file.exists() {
            GuideSection::new("Live Logs")
                .text(&format!(
                    "Following {} - press {} to stop.",
                    style("oshirase.log").cyan(),
                    style("Ctrl+C").bold().yellow()
                ))
                .print();
            println!();
            let mut child = NativePlatform::tail_file(&log_file)?;
            let _ = child.wait()?;
        } else {
            print_error(&format!(
                "Log file not found at {}",
                style(log_file.display()).dim()
            ));
        }
    } else {
        GuideSection::new("Live Logs")
            .warn("Gateway is not running.")
            .blank()
            .info(&format!(
                "Run {} to start it.",
                style("oshirase gateway start").cyan().bold()
            ))
            .print();
        println!();
    }
    Ok(())
}

/// Foreground daemon. Wires storage, the YouTube clients, the Discord
/// surfaces, and the cron jobs, then parks on Ctrl+C.
pub async fn run_daemon() -> Result<()> {
    crate::logging::init();

    let config = AppConfig::from_env()?;

    let db = Database::open(&config.db_path)?;
    if let Some(parent) = config.db_path.parent() {
        NativePlatform::restrict_dir_permissions(parent);
    }
    NativePlatform::restrict_file_permissions(&config.db_path);
    info!("Database ready at {}", config.db_path.display());

    if config.youtube_api_key.is_empty() {
        warn!("YOUTUBE_API_KEY is not set. Video status lookups will fail.");
    }

    let http = reqwest::Client::new();
    let resolver: Arc<dyn VideoResolver> = Arc::new(YoutubeClient::new(
        http.clone(),
        config.youtube_api_key.clone(),
    ));
    let feed: Arc<dyn FeedSource> = Arc::new(FeedClient::new(http.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(http.clone()));

    let gateway_http = Arc::new(serenity::http::Http::new(&config.discord_bot_token));
    let messenger: Arc<dyn DirectMessenger> = Arc::new(SerenityMessenger::new(gateway_http));
    let reminders = Arc::new(ReminderService::new(
        db.clone(),
        messenger,
        config.reminder_lead_minutes,
        config.display_tz,
    ));

    let engine = Arc::new(ReconcileEngine::new(
        db.clone(),
        resolver.clone(),
        feed,
        notifier,
        reminders.clone(),
        config.display_tz,
    ));

    let mut lifecycle = LifecycleManager::new().await?;
    lifecycle.attach(Arc::new(Mutex::new(DiscordBot::new(
        config.discord_bot_token.clone(),
        db.clone(),
        reminders.clone(),
        config.display_tz,
        config.reminder_recheck_minutes,
    ))));

    let ctx = TaskContext {
        db,
        engine,
        reminders,
        resolver,
        http,
        lookahead_minutes: config.reminder_lookahead_minutes,
    };
    tasks::register_jobs(&mut lifecycle, ctx).await?;

    lifecycle.start().await?;
    info!("oshirase is watching. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    Ok(())
}
