pub mod ask;
pub mod kb;
pub mod serve;

use ragline_config::AppConfig;
use std::path::Path;

/// Load config from `path`, `.env` and the process environment.
pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load(path).map_err(|e| format!("Failed to load config: {e}").into())
}
