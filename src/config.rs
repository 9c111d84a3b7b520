use crate::logging;
use crate::settings::Settings;
use eyre::Result;
use serde_json;
use std::{fs, path::PathBuf};

pub const APP_DIR_NAME: &str = "ureader";
pub const CONFIG_FILE_NAME: &str = "configuration.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    filepath: PathBuf,
}

impl Config {
    pub fn new() -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        Self::load_from(prefix.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from a custom path, writing defaults there if the
    /// file does not exist yet.
    pub fn load_from(filepath: PathBuf) -> Result<Self> {
        let settings = if filepath.exists() {
            let config_str = fs::read_to_string(&filepath)?;
            parse_settings(&config_str)
        } else {
            let config = Self {
                settings: Settings::default(),
                filepath: filepath.clone(),
            };
            config.save()?;
            config.settings
        };

        Ok(Self { settings, filepath })
    }

    /// Get the configuration file path
    pub fn filepath(&self) -> &PathBuf {
        &self.filepath
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<()> {
        let config_json = serde_json::json!({
            "Setting": self.settings,
        });

        let config_str = serde_json::to_string_pretty(&config_json)?;

        if let Some(parent) = self.filepath.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.filepath, config_str)?;
        Ok(())
    }
}

/// Settings from the `"Setting"` object; anything unreadable yields defaults.
fn parse_settings(config_str: &str) -> Settings {
    let user_config = match serde_json::from_str::<serde_json::Value>(config_str) {
        Ok(value) => value,
        Err(err) => {
            logging::warn(format!("Ignoring invalid configuration: {}", err));
            return Settings::default();
        }
    };

    match user_config.get("Setting") {
        Some(user_settings) => serde_json::from_value(user_settings.clone()).unwrap_or_else(|err| {
            logging::warn(format!("Ignoring invalid settings: {}", err));
            Settings::default()
        }),
        None => Settings::default(),
    }
}

pub fn get_app_data_prefix() -> Result<PathBuf> {
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
        let path = PathBuf::from(config_home).join(APP_DIR_NAME);
        return Ok(path);
    } else if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home.clone()).join(".config").join(APP_DIR_NAME);
        if path.exists() {
            return Ok(path);
        } else {
            return Ok(PathBuf::from(home).join(format!(".{}", APP_DIR_NAME)));
        }
    } else if let Some(user_profile) = std::env::var_os("USERPROFILE") {
        return Ok(PathBuf::from(user_profile).join(format!(".{}", APP_DIR_NAME)));
    }

    Err(eyre::eyre!(
        "Could not determine application data directory"
    ))
}
