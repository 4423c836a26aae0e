//! End-to-end barrier against a real Xvfb and i3
//!
//! Requires `Xvfb` and `i3` on PATH. Run with
//! `cargo test --features live-x11 --test live_x11`.

#![cfg(feature = "live-x11")]

use std::collections::BTreeMap;

use anyhow::Result;
use serial_test::serial;

use wmsync::{config::HarnessConfig, harness::Harness};

fn live_config(dir: &std::path::Path) -> Result<HarnessConfig> {
    let i3_config = dir.join("i3.config");
    std::fs::write(
        &i3_config,
        "# i3 config file (v4)\nfont pango:monospace 8\n",
    )?;

    let mut config = HarnessConfig::default();
    config.wm.config_file = Some(i3_config);
    config.wm.extra_env = BTreeMap::new();
    Ok(config)
}

#[tokio::test]
#[serial]
async fn test_live_sync() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let harness = Harness::start(&live_config(dir.path())?).await?;

    let mut barrier = harness.scenario().await?.barrier()?;
    let first = barrier.sync().await?;
    let second = barrier.sync().await?;
    assert_ne!(first.request.token, second.request.token);
    barrier.close()?;

    harness.shutdown().await
}

#[tokio::test]
#[serial]
async fn test_live_scenarios_are_isolated() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let harness = Harness::start(&live_config(dir.path())?).await?;

    for _ in 0..3 {
        let mut barrier = harness.scenario().await?.barrier()?;
        let completion = barrier.sync().await?;
        assert_eq!(completion.request.window, barrier.window());
        barrier.close()?;
    }

    harness.shutdown().await
}
