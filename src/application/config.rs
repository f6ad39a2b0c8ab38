//! User configuration.
//!
//! Settings live in a small JSON file. Every field is optional; missing
//! fields take the defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Sheet, Workbook, DEFAULT_DISPLAY_PLACES};
use crate::infrastructure::{InfrastructureError, InfrastructureResult};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "SHEETWALK_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "sheetwalk.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_sheet_name: String,
    pub rows: usize,
    pub cols: usize,
    pub default_column_width: usize,
    /// Decimal places shown for numbers in the grid.
    pub display_places: i64,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_sheet_name: "Sheet1".to_string(),
            rows: 100,
            cols: 26,
            default_column_width: 8,
            display_places: DEFAULT_DISPLAY_PLACES,
            log_file: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> InfrastructureResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| InfrastructureError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Finds the config to use: an explicit path, then `$SHEETWALK_CONFIG`,
    /// then `./sheetwalk.json`, then the defaults.
    pub fn discover(explicit: Option<&Path>) -> InfrastructureResult<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::discover_from(explicit, env_path.as_deref(), Path::new(LOCAL_CONFIG_FILE))
    }

    fn discover_from(explicit: Option<&Path>, env_path: Option<&Path>, local: &Path) -> InfrastructureResult<Self> {
        if let Some(path) = explicit.or(env_path) {
            return Self::load(path);
        }
        if local.exists() {
            return Self::load(local);
        }
        Ok(Self::default())
    }

    pub fn new_sheet(&self, name: impl Into<String>) -> Sheet {
        Sheet::new(name, self.rows, self.cols, self.default_column_width)
    }

    pub fn new_workbook(&self) -> Workbook {
        Workbook::with_sheet(self.new_sheet(self.default_sheet_name.clone()))
    }
}
