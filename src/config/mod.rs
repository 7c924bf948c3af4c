//! Persistent settings for the planning core and their on-disk manager.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{domain::CurrencyCode, errors::PlanError};

const CONFIG_DIR: &str = "config";
const CONFIG_FILE: &str = "config.json";
const TMP_SUFFIX: &str = "tmp";

/// User-configurable settings consumed by the coordinator and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub locale: String,
    /// Currency assigned to plans created without an explicit one.
    pub currency: CurrencyCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for stored plans. Defaults to `~/Documents/Plans`.
    pub data_root: Option<PathBuf>,
    /// Calendar months of recorded expenses averaged for months without their own data.
    #[serde(default = "Config::default_expense_lookback_months")]
    pub expense_lookback_months: u32,
    #[serde(default = "Config::default_log_filter")]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
            currency: CurrencyCode::default(),
            data_root: None,
            expense_lookback_months: Self::default_expense_lookback_months(),
            log_filter: Self::default_log_filter(),
        }
    }
}

impl Config {
    pub fn default_expense_lookback_months() -> u32 {
        3
    }

    pub fn default_log_filter() -> String {
        "plan_core=info".into()
    }

    pub fn resolve_data_root(&self) -> PathBuf {
        if let Some(path) = &self.data_root {
            return path.clone();
        }

        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("Plans")
    }
}

/// Handles persistence for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, PlanError> {
        let config_dir = base.join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).map_err(config_error)?;
        Ok(Self::new(config_dir.join(CONFIG_FILE)))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the stored config, or the defaults when nothing has been saved yet.
    pub fn load(&self) -> Result<Config, PlanError> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&self.config_path).map_err(config_error)?;
        serde_json::from_str(&data).map_err(config_error)
    }

    pub fn save(&self, config: &Config) -> Result<(), PlanError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(config_error)?;
        }
        let json = serde_json::to_string_pretty(config).map_err(config_error)?;
        let tmp = tmp_path(&self.config_path);
        write_file(&tmp, &json).map_err(config_error)?;
        fs::rename(&tmp, &self.config_path).map_err(config_error)?;
        Ok(())
    }
}

fn config_error(err: impl std::fmt::Display) -> PlanError {
    PlanError::Config(err.to_string())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_file(path: &Path, data: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()
}
