use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::engine::EngineSettings;
use crate::audio::output::OutputSettings;
use crate::error::ConfigError;

/// Player configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub default_volume: f32,
    pub loop_enabled: bool,
    pub auto_advance: bool,
    pub preferred_device: Option<String>,
    /// Length of the device-side sample queue
    pub buffer_ms: u64,
    /// Bound on the worker join for pause, stop and item switches
    pub control_timeout_ms: u64,
    /// Bound on the worker join during shutdown
    pub shutdown_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.8,
            loop_enabled: false,
            auto_advance: true,
            preferred_device: None,
            buffer_ms: 250,
            control_timeout_ms: 100,
            shutdown_timeout_ms: 1000,
        }
    }
}

impl From<&PlayerConfig> for EngineSettings {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            control_timeout: Duration::from_millis(config.control_timeout_ms.max(1)),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms.max(1)),
            initial_volume: config.default_volume.clamp(0.0, 1.0),
            loop_enabled: config.loop_enabled,
        }
    }
}

impl From<&PlayerConfig> for OutputSettings {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            preferred_device: config.preferred_device.clone(),
            buffer: Duration::from_millis(config.buffer_ms.clamp(20, 5000)),
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from `~/.config/clip-player/config.toml`. A missing file yields
    /// defaults, a malformed one is an error.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::at_path(config_path)
    }

    pub fn at_path(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        let config = Self::load_config(&config_path)?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.config.default_volume = volume.clamp(0.0, 1.0);
        self.save_config()
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.loop_enabled = enabled;
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("clip-player");

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let mut config: PlayerConfig = toml::from_str(&config_content)?;
        config.default_volume = config.default_volume.clamp(0.0, 1.0);

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_manager = ConfigManager::at_path(config_path).unwrap();
        (config_manager, temp_dir)
    }

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();

        assert_eq!(config.default_volume, 0.8);
        assert_eq!(config.preferred_device, None);
        assert!(!config.loop_enabled);
        assert!(config.auto_advance);
        assert_eq!(config.control_timeout_ms, 100);
        assert_eq!(config.shutdown_timeout_ms, 1000);
    }

    #[test]
    fn test_engine_settings_from_config() {
        let config = PlayerConfig {
            default_volume: 1.7,
            loop_enabled: true,
            control_timeout_ms: 0,
            shutdown_timeout_ms: 2500,
            ..PlayerConfig::default()
        };

        let settings = EngineSettings::from(&config);
        assert_eq!(settings.control_timeout, Duration::from_millis(1));
        assert_eq!(settings.shutdown_timeout, Duration::from_millis(2500));
        assert_eq!(settings.initial_volume, 1.0);
        assert!(settings.loop_enabled);
    }

    #[test]
    fn test_output_settings_from_config() {
        let config = PlayerConfig {
            preferred_device: Some("USB DAC".to_string()),
            buffer_ms: 1,
            ..PlayerConfig::default()
        };

        let settings = OutputSettings::from(&config);
        assert_eq!(settings.preferred_device.as_deref(), Some("USB DAC"));
        assert_eq!(settings.buffer, Duration::from_millis(20));
    }

    #[test]
    fn test_save_and_load_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager
            .update_config(|config| {
                config.default_volume = 0.6;
                config.preferred_device = Some("Test Device".to_string());
                config.buffer_ms = 500;
            })
            .unwrap();

        let loaded_config = ConfigManager::load_config(config_manager.config_path()).unwrap();

        assert_eq!(loaded_config.default_volume, 0.6);
        assert_eq!(loaded_config.preferred_device, Some("Test Device".to_string()));
        assert_eq!(loaded_config.buffer_ms, 500);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigManager::load_config(&temp_dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "loop_enabled = true\ndefault_volume = 3.0\n").unwrap();

        let config = ConfigManager::load_config(&config_path).unwrap();
        assert!(config.loop_enabled);
        assert_eq!(config.default_volume, 1.0);
        assert_eq!(config.control_timeout_ms, 100);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        fs::write(&config_path, "invalid toml content [[[").unwrap();

        match ConfigManager::at_path(&config_path) {
            Err(ConfigError::DeserializationError(_)) => {}
            Err(e) => panic!("Expected DeserializationError, got {}", e),
            Ok(_) => panic!("Expected DeserializationError"),
        }
    }

    #[test]
    fn test_set_volume() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.set_volume(0.7).unwrap();
        assert_eq!(config_manager.get_config().default_volume, 0.7);

        config_manager.set_volume(1.5).unwrap();
        assert_eq!(config_manager.get_config().default_volume, 1.0);

        config_manager.set_volume(-0.5).unwrap();
        assert_eq!(config_manager.get_config().default_volume, 0.0);
    }

    #[test]
    fn test_set_loop_and_device() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.set_loop_enabled(true).unwrap();
        config_manager
            .update_config(|config| config.preferred_device = Some("My DAC".to_string()))
            .unwrap();

        let reloaded = ConfigManager::at_path(config_manager.config_path()).unwrap();
        assert!(reloaded.get_config().loop_enabled);
        assert_eq!(reloaded.get_config().preferred_device, Some("My DAC".to_string()));
    }

    #[test]
    fn test_config_path_creation() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("config").join("config.toml");

        let config_manager = ConfigManager::at_path(&nested_path).unwrap();
        config_manager.save_config().unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_toml_format() {
        let config = PlayerConfig {
            preferred_device: Some("AudioQuest DragonFly".to_string()),
            ..PlayerConfig::default()
        };

        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("default_volume"));
        assert!(toml_string.contains("control_timeout_ms = 100"));
        assert!(toml_string.contains("shutdown_timeout_ms = 1000"));
        assert!(toml_string.contains("AudioQuest DragonFly"));
    }
}
