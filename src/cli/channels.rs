use anyhow::Result;
use console::style;

use crate::core::config::AppConfig;
use crate::core::terminal::{self, TV, print_info, print_link, print_success};
use crate::storage::Database;
use crate::storage::types::ChannelRecord;

fn open_db() -> Result<Database> {
    let config = AppConfig::from_env()?;
    Database::open(&config.db_path)
}

pub async fn run_channel_add() -> Result<()> {
    terminal::print_banner();
    println!("  {}\n", style("Channel Setup: YouTube").bold());

    let channel_id = inquire::Text::new("YouTube channel ID:")
        .with_help_message("The UC... ID from the channel URL")
        .prompt()?;
    let channel_id = channel_id.trim().to_string();
    if channel_id.is_empty() {
        println!("  Error: Channel ID cannot be empty.");
        return Ok(());
    }
    if !channel_id.starts_with("UC") {
        print_info("Channel IDs usually start with 'UC'. Continuing anyway.");
    }

    let channel_name = inquire::Text::new("Channel name:")
        .with_help_message("Shown as the webhook username on notifications")
        .prompt()?;
    if channel_name.trim().is_empty() {
        println!("  Error: Channel name cannot be empty.");
        return Ok(());
    }

    let webhook_url = inquire::Text::new("Discord webhook URL:")
        .with_help_message("Leave empty to track activity without posting")
        .prompt()?;
    let webhook_url = webhook_url.trim().to_string();
    if !webhook_url.is_empty() && url::Url::parse(&webhook_url).is_err() {
        println!("  Error: That webhook URL does not parse.");
        return Ok(());
    }

    let interval_raw = inquire::Text::new("Polling interval (minutes):")
        .with_default("10")
        .with_help_message("How often the channel feed is checked")
        .prompt()?;
    let Some(interval_minutes) = interval_raw.trim().parse::<u32>().ok().filter(|m| *m > 0)
    else {
        println!("  Error: Interval must be a positive number of minutes.");
        return Ok(());
    };

    let db = open_db()?;
    db.upsert_channel(&ChannelRecord {
        channel_id: channel_id.clone(),
        channel_name: channel_name.trim().to_string(),
        channel_icon_url: String::new(),
        discord_webhook_url: webhook_url,
        interval_minutes,
        is_active: true,
    })
    .await?;

    print_success(&format!("Channel '{}' saved.", channel_id));
    println!("\n  Next steps:");
    println!("  1. Restart the gateway to pick up the interval: oshirase gateway restart");
    println!("  2. The channel icon fills in automatically on the first poll\n");

    Ok(())
}

pub async fn run_channel_list() -> Result<()> {
    let db = open_db()?;
    let channels = db.get_all_channels().await?;
    if channels.is_empty() {
        print_info("No channels registered. Run 'oshirase channel add' first.");
        return Ok(());
    }

    println!("\n{}", style("Watched Channels").bold().underlined());
    for channel in channels {
        let state = if channel.is_active {
            style("active").green().bold()
        } else {
            style("inactive").red().bold()
        };
        println!(
            "\n{} {} [{}] every {}m",
            TV,
            style(&channel.channel_name).bold(),
            state,
            channel.interval_minutes
        );
        println!("  {}", style(&channel.channel_id).dim());
        if channel.discord_webhook_url.is_empty() {
            print_info("No webhook URL; notifications are dropped.");
        } else {
            print_link("Webhook", &channel.discord_webhook_url);
        }
        if !channel.channel_icon_url.is_empty() {
            print_link("Icon", &channel.channel_icon_url);
        }
    }
    println!();

    Ok(())
}

pub async fn run_channel_remove() -> Result<()> {
    let db = open_db()?;
    let channels = db.get_all_channels().await?;
    if channels.is_empty() {
        print_info("No channels registered.");
        return Ok(());
    }

    let labels: Vec<String> = channels
        .iter()
        .map(|c| format!("{} ({})", c.channel_name, c.channel_id))
        .collect();
    let picked = inquire::Select::new("Remove which channel?", labels.clone()).prompt()?;
    let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
    let target = &channels[index];

    let confirmed = inquire::Confirm::new(&format!("Really remove '{}'?", target.channel_name))
        .with_default(false)
        .with_help_message("Stored videos for this channel stay until the retention sweep")
        .prompt()?;
    if !confirmed {
        print_info("Nothing removed.");
        return Ok(());
    }

    if db.remove_channel(&target.channel_id).await? {
        print_success(&format!("Channel '{}' removed.", target.channel_name));
    } else {
        print_info("Channel was already gone.");
    }

    Ok(())
}

pub async fn run_channel_set_active(channel_id: &str, active: bool) -> Result<()> {
    let db = open_db()?;
    if db.set_channel_active(channel_id, active).await? {
        let verb = if active { "enabled" } else { "disabled" };
        print_success(&format!("Channel {} {}.", channel_id, verb));
        print_info("Restart the gateway if this changes the set of polling intervals.");
    } else {
        println!("  Error: No channel with ID '{}'.", channel_id);
    }
    Ok(())
}
