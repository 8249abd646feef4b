use std::path::PathBuf;
use std::process::{Command, Output};

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

fn oshirase_binary_path() -> TestResult<PathBuf> {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_oshirase") {
        return Ok(PathBuf::from(path));
    }

    let candidate = PathBuf::from("target").join("debug").join(if cfg!(windows) {
        "oshirase.exe"
    } else {
        "oshirase"
    });
    if candidate.exists() {
        return Ok(candidate);
    }

    Err("Could not locate oshirase test binary path".into())
}

fn run_cli(data_dir: &std::path::Path, args: &[&str]) -> TestResult<Output> {
    let bin = oshirase_binary_path()?;
    let output = Command::new(bin)
        .args(args)
        .env("OSHIRASE_DATA_DIR", data_dir)
        .output()?;
    Ok(output)
}

#[test]
fn help_lists_the_command_groups() -> TestResult<()> {
    let dir = tempfile::tempdir()?;
    let output = run_cli(dir.path(), &["help"])?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("gateway"));
    assert!(stdout.contains("channel"));
    assert!(stdout.contains("logs"));
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("Thanks for using oshirase"));
    Ok(())
}

#[test]
fn bare_invocation_prints_help() -> TestResult<()> {
    let dir = tempfile::tempdir()?;
    let output = run_cli(dir.path(), &[])?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Usage:"));
    Ok(())
}

#[test]
fn gateway_status_reports_stopped_in_a_fresh_dir() -> TestResult<()> {
    let dir = tempfile::tempdir()?;
    let output = run_cli(dir.path(), &["gateway", "status"])?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("STOPPED"));
    assert!(stdout.contains("oshirase gateway start"));
    Ok(())
}

#[test]
fn unknown_command_is_reported_on_stderr() -> TestResult<()> {
    let dir = tempfile::tempdir()?;
    let output = run_cli(dir.path(), &["frobnicate"])?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stderr.contains("Unknown command: frobnicate"));
    assert!(stdout.contains("Usage:"));
    Ok(())
}

#[test]
fn channel_toggle_requires_an_id() -> TestResult<()> {
    let dir = tempfile::tempdir()?;
    let output = run_cli(dir.path(), &["channel", "enable"])?;
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success());
    assert!(stderr.contains("Usage: oshirase channel enable"));
    Ok(())
}
