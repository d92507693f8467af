use anyhow::Result;
use clap::Parser;
use sheet_sync::{CliArgs, RetryPolicy, SyncConfig};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn defaults_without_file_or_flags() -> Result<()> {
    let config = SyncConfig::from_args(CliArgs::default())?;
    assert_eq!(config, SyncConfig::default());
    assert_eq!(config.retry, RetryPolicy::new(10, Duration::from_millis(100)));
    assert_eq!(config.max_parallel_writes, 4);
    assert_eq!(config.notification_capacity, 64);
    Ok(())
}

#[test]
fn yaml_file_fills_unset_fields() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sync.yaml");
    fs::write(&path, "max_retries: 2\nretry_delay_ms: 5\n")?;

    let config = SyncConfig::from_args(CliArgs {
        config: Some(path),
        ..CliArgs::default()
    })?;
    assert_eq!(config.retry, RetryPolicy::new(2, Duration::from_millis(5)));
    assert_eq!(config.max_parallel_writes, 4);
    Ok(())
}

#[test]
fn flags_override_the_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sync.json");
    fs::write(
        &path,
        r#"{ "max_retries": 2, "max_parallel_writes": 8, "notification_capacity": 16 }"#,
    )?;

    let args = CliArgs::parse_from([
        "sheet-sync",
        "--config",
        path.to_str().expect("utf-8 path"),
        "--max-retries",
        "7",
        "--max-parallel-writes",
        "1",
    ]);
    let config = SyncConfig::from_args(args)?;
    assert_eq!(config.retry.max_retries, 7);
    assert_eq!(config.max_parallel_writes, 1);
    assert_eq!(config.notification_capacity, 16);
    Ok(())
}

#[test]
fn zero_counts_are_clamped() -> Result<()> {
    let config = SyncConfig::from_args(CliArgs {
        max_parallel_writes: Some(0),
        notification_capacity: Some(0),
        ..CliArgs::default()
    })?;
    assert_eq!(config.max_parallel_writes, 1);
    assert_eq!(config.notification_capacity, 1);
    assert_eq!(SyncConfig::default().with_max_parallel_writes(0).max_parallel_writes, 1);
    Ok(())
}

#[test]
fn unknown_keys_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sync.yml");
    fs::write(&path, "max_retries: 2\nmax_retry: 3\n")?;

    let err = SyncConfig::from_args(CliArgs {
        config: Some(path),
        ..CliArgs::default()
    })
    .expect_err("typo in key");
    assert!(format!("{err:#}").contains("max_retry"));
    Ok(())
}

#[test]
fn unsupported_extension_and_missing_file() -> Result<()> {
    let dir = tempdir()?;
    let toml = dir.path().join("sync.toml");
    fs::write(&toml, "max_retries = 2\n")?;

    let err = SyncConfig::from_args(CliArgs {
        config: Some(toml),
        ..CliArgs::default()
    })
    .expect_err("toml unsupported");
    assert!(err.to_string().contains("unsupported config extension"));

    let err = SyncConfig::from_args(CliArgs {
        config: Some(dir.path().join("absent.yaml")),
        ..CliArgs::default()
    })
    .expect_err("missing file");
    assert!(err.to_string().contains("does not exist"));
    Ok(())
}
