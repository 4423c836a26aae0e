//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, and path handling.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = HarnessConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.display.xvfb_path, "Xvfb");
    assert_eq!(config.wm.command, "i3");
    assert!(config.wm.socket_path.is_none());
    assert!(config.sync.timeout_ms > 0);
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("wmsync.toml");
    fs::write(
        &path,
        r#"
[display]
xvfb_path = "/usr/bin/Xvfb"

[wm]
command = "i3"
args = ["-d", "all"]
config_file = "i3.config"

[sync]
timeout_ms = 250
token_seed = 9
"#,
    )?;

    let config = HarnessConfig::load(&path)?;

    assert_eq!(config.display.xvfb_path, "/usr/bin/Xvfb");
    // Unspecified fields keep their defaults
    assert_eq!(config.display.startup_timeout_ms, 5000);
    assert_eq!(config.wm.args, vec!["-d", "all"]);
    assert_eq!(config.wm.config_file, Some(dir.path().join("i3.config")));
    assert_eq!(config.sync.options().timeout, Duration::from_millis(250));
    assert_eq!(config.sync.options().token_seed, Some(9));
    assert_eq!(config.sync.reply_timeout_ms, 2000);

    Ok(())
}

#[test]
fn test_absolute_wm_config_is_kept() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("wmsync.toml");
    fs::write(&path, "[wm]\nconfig_file = \"/etc/i3/config\"\n")?;

    let config = HarnessConfig::load(&path)?;
    assert_eq!(config.wm.config_file, Some(PathBuf::from("/etc/i3/config")));

    Ok(())
}

#[test]
fn test_zero_sync_timeout_rejected() {
    let mut config = HarnessConfig::default();
    config.sync.timeout_ms = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("sync.timeout_ms"));
}

#[test]
fn test_display_in_extra_env_rejected() {
    let mut config = HarnessConfig::default();
    config
        .wm
        .extra_env
        .insert("DISPLAY".to_string(), ":5".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_toml_is_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[sync\ntimeout_ms = ")?;

    let err = HarnessConfig::load(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));

    Ok(())
}

#[test]
fn test_load_or_default_missing_file() -> Result<()> {
    let dir = tempdir()?;
    let config = HarnessConfig::load_or_default(Some(dir.path().join("absent.toml")))?;
    assert_eq!(config, HarnessConfig::default());

    let config = HarnessConfig::load_or_default(None::<&Path>)?;
    assert_eq!(config, HarnessConfig::default());

    Ok(())
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("saved.toml");

    let mut config = HarnessConfig::default();
    config.wm.socket_path = Some(PathBuf::from("/tmp/i3-test.sock"));
    config
        .wm
        .extra_env
        .insert("XDG_RUNTIME_DIR".to_string(), "/tmp".to_string());
    config.save(&path)?;

    let reloaded = HarnessConfig::load(&path)?;
    assert_eq!(reloaded, config);

    Ok(())
}

#[test]
fn test_bundled_sample_config() -> Result<()> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/wmsync.toml");
    let config = HarnessConfig::load(&path)?;

    config.validate()?;
    assert_eq!(
        config.wm.config_file,
        Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/i3.config"))
    );
    assert_eq!(config.wm.extra_env.get("LC_ALL").map(String::as_str), Some("C.UTF-8"));
    assert_eq!(config.sync.options().timeout, Duration::from_secs(5));

    Ok(())
}
