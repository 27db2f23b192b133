use anyhow::{Context, Result, bail};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::solver::DEFAULT_GROUP_SIZE;

/// Location of the config file under a project root.
pub const CONFIG_PATH: &str = ".lunchbot/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LunchConfig {
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    #[serde(default = "default_lunch_weekday")]
    pub lunch_weekday: Weekday,
    #[serde(default = "default_signup_emoji")]
    pub signup_emoji: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for LunchConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            sample_count: default_sample_count(),
            lunch_weekday: default_lunch_weekday(),
            signup_emoji: default_signup_emoji(),
            data_dir: default_data_dir(),
            output: None,
        }
    }
}

impl LunchConfig {
    /// Reject values the solver cannot work with.
    ///
    /// # Errors
    ///
    /// Fails on a zero group size or a zero sample count.
    pub fn validate(&self) -> Result<()> {
        if self.group_size == 0 {
            bail!("group_size must be at least 1");
        }
        if self.sample_count == 0 {
            bail!("sample_count must be at least 1");
        }
        if self.signup_emoji.trim().is_empty() {
            bail!("signup_emoji must not be empty");
        }
        Ok(())
    }

    /// Data directory, resolved against `project_root` when relative.
    #[must_use]
    pub fn data_path(&self, project_root: &Path) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            project_root.join(&self.data_dir)
        }
    }

    fn apply_env(&mut self, data_dir: Option<String>, group_size: Option<String>) -> Result<()> {
        if let Some(dir) = data_dir.filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = group_size {
            self.group_size = raw
                .trim()
                .parse()
                .with_context(|| format!("LUNCHBOT_GROUP_SIZE is not a number: {raw:?}"))?;
        }
        Ok(())
    }
}

/// Read `.lunchbot/config.toml` under `project_root`; a missing file yields
/// defaults.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<LunchConfig> {
    let path = project_root.join(CONFIG_PATH);
    if !path.exists() {
        return Ok(LunchConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<LunchConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// File config plus environment overrides, validated.
///
/// # Errors
///
/// Fails on unreadable config, malformed overrides, or invalid values.
pub fn resolve_config(project_root: &Path) -> Result<LunchConfig> {
    let mut config = load_config(project_root)?;
    config.apply_env(
        env::var("LUNCHBOT_DATA_DIR").ok(),
        env::var("LUNCHBOT_GROUP_SIZE").ok(),
    )?;
    config.validate()?;
    Ok(config)
}

/// Output mode for command results: `json`, `pretty`, or `text`.
///
/// `--json` beats `LUNCHBOT_FORMAT`, which beats the config file; otherwise
/// a terminal gets `pretty` and a pipe gets `text`.
#[must_use]
pub fn resolve_output(cli_json: bool, config: &LunchConfig) -> &'static str {
    resolve_output_from(cli_json, config.output.as_deref(), env::var("LUNCHBOT_FORMAT").ok().as_deref())
}

fn resolve_output_from(cli_json: bool, configured: Option<&str>, env_format: Option<&str>) -> &'static str {
    fn normalize(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some("pretty"),
            "text" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json";
    }
    if let Some(mode) = env_format.and_then(normalize) {
        return mode;
    }
    if let Some(mode) = configured.and_then(normalize) {
        return mode;
    }
    if std::io::stdout().is_terminal() { "pretty" } else { "text" }
}

const fn default_group_size() -> usize {
    DEFAULT_GROUP_SIZE
}

const fn default_sample_count() -> usize {
    100
}

const fn default_lunch_weekday() -> Weekday {
    Weekday::Wed
}

fn default_signup_emoji() -> String {
    "hungry".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".lunchbot/data")
}
