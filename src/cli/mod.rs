mod channels;
mod daemon;

use anyhow::Result;
use console::style;

use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Core")
        .command("run", "Run the notifier in the foreground")
        .print();

    GuideSection::new("Management")
        .command("gateway", "Manage the background daemon process")
        .command("channel", "Manage watched YouTube channels")
        .print();

    GuideSection::new("Diagnostics")
        .command("logs", "Follow real-time daemon logs")
        .print();

    println!(
        "\n {} {} <command> [subcommand]\n",
        style("Usage:").bold(),
        style("oshirase").green()
    );
}

pub(crate) fn channel_id_arg(args: &[String], index: usize) -> Option<String> {
    args.get(index)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    use crate::platform::{NativePlatform, Platform};
    let run_dir = NativePlatform::data_dir().join("run");
    let pid_file = run_dir.join("oshirase.pid");

    if args.len() <= 1 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "run" | "daemon-run" => daemon::run_daemon().await,
        "gateway" => {
            let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "" };
            match sub_cmd {
                "start" => daemon::gateway_start(&run_dir, &pid_file).await,
                "stop" => daemon::gateway_stop(&pid_file).await,
                "restart" => daemon::gateway_restart().await,
                "status" => daemon::gateway_status(&pid_file).await,
                _ => {
                    print_error(
                        "Unknown or missing gateway command. Expected: start, stop, restart, status",
                    );
                    print_help();
                    Ok(())
                }
            }
        }
        "logs" => daemon::follow_logs(&run_dir, &pid_file).await,
        "channel" => {
            let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "" };
            match sub_cmd {
                "add" => channels::run_channel_add().await,
                "list" => channels::run_channel_list().await,
                "remove" => channels::run_channel_remove().await,
                "enable" | "disable" => {
                    let active = sub_cmd == "enable";
                    match channel_id_arg(&args, 3) {
                        Some(id) => channels::run_channel_set_active(&id, active).await,
                        None => {
                            print_error(&format!(
                                "Usage: oshirase channel {} <channel_id>",
                                sub_cmd
                            ));
                            Ok(())
                        }
                    }
                }
                _ => {
                    GuideSection::new("oshirase channel")
                        .command("add", "Register a YouTube channel to watch")
                        .command("list", "Show watched channels")
                        .command("remove", "Remove a channel")
                        .command("enable", "Resume polling a channel")
                        .command("disable", "Pause polling a channel")
                        .blank()
                        .hint("oshirase channel add", "")
                        .hint("oshirase channel disable UCxxxxxxxxxxxxxxxxxxxxxx", "")
                        .print();
                    println!();
                    Ok(())
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        cmd => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}
