use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides `store_dir` when set
pub const STORE_DIR_ENV: &str = "PLANT_REPORT_STORE";

const DEFAULT_PLANT_NAME: &str = "AD-008";
const DEFAULT_REPORT_TITLE: &str = "Weekly Water Treatment Report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_dir: Option<PathBuf>,
    pub plant_name: String,
    pub report_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: None,
            plant_name: DEFAULT_PLANT_NAME.into(),
            report_title: DEFAULT_REPORT_TITLE.into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ReportError::Config("Home directory not found".into()))?;
        Ok(home.join(".config").join("plant-report"))
    }

    /// Store directory: environment, then config file, then `~/.config/plant-report/store`
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(STORE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("store")),
        }
    }

    pub fn set_store_dir(&mut self, dir: PathBuf) -> Result<()> {
        self.store_dir = Some(dir);
        self.save()
    }

    pub fn set_plant_name(&mut self, name: String) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ReportError::Config("Plant name must not be empty".into()));
        }
        self.plant_name = name.trim().to_string();
        self.save()
    }
}
