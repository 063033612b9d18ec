use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::db::DEFAULT_DB_PATH;
use crate::report::{ReportLayout, QCOR_URL};
use crate::traversal::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

/// Settings file looked up in the working directory (any format `config` reads).
const SETTINGS_FILE: &str = "qcor";
const ENV_PREFIX: &str = "QCOR";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub report_url: String,
    pub year: String,
    pub db_path: PathBuf,
    pub headless: bool,
    pub settle_timeout_secs: u64,
    pub open_timeout_secs: u64,
    pub max_attempts: u32,
    pub level2_offset: usize,
    pub level3_offset: usize,
}

impl Settings {
    /// Defaults, then `qcor.toml` if present, then `QCOR_*` environment.
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::with_name(SETTINGS_FILE).required(false))
                .add_source(config::Environment::with_prefix(ENV_PREFIX)),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings = with_defaults(builder)?
            .build()
            .context("Failed to read settings")?
            .try_deserialize::<Settings>()
            .context("Invalid settings")?;
        Ok(settings)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            open_timeout: Duration::from_secs(self.open_timeout_secs),
            settle_timeout: self.settle_timeout(),
        }
    }

    pub fn layout(&self) -> ReportLayout {
        ReportLayout {
            level2_offset: self.level2_offset,
            level3_offset: self.level3_offset,
        }
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    let layout = ReportLayout::default();
    Ok(builder
        .set_default("report_url", QCOR_URL)?
        .set_default("year", "2021")?
        .set_default("db_path", DEFAULT_DB_PATH)?
        .set_default("headless", true)?
        .set_default("settle_timeout_secs", 30)?
        .set_default("open_timeout_secs", 30)?
        .set_default("max_attempts", i64::from(DEFAULT_MAX_ATTEMPTS))?
        .set_default("level2_offset", layout.level2_offset as i64)?
        .set_default("level3_offset", layout.level3_offset as i64)?)
}
