use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

/// Process-wide settings, built once at startup and handed to every component.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Path of the SQLite database file.
    pub database_url: String,
    /// Only records below this folder are touched by the quarantine move.
    pub managed_root: String,
    /// Root folder that receives one sub-folder per duplicated fingerprint value.
    pub quarantine_root: String,
    /// Worker threads for the hash pass; 0 lets rayon decide.
    pub hash_workers: usize,
    /// Glob patterns skipped while scanning.
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "photo_dupes.db".to_string(),
            managed_root: String::new(),
            quarantine_root: "./quarantine".to_string(),
            hash_workers: 0,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Load settings from an optional `Config.toml` and `PHOTO_DUPES_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let defaults = AppConfig::default();
    let builder = Config::builder()
        .set_default("database_url", defaults.database_url)?
        .set_default("managed_root", defaults.managed_root)?
        .set_default("quarantine_root", defaults.quarantine_root)?
        .set_default("hash_workers", defaults.hash_workers as u64)?
        .set_default("ignore_patterns", Vec::<String>::new())?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("PHOTO_DUPES")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
