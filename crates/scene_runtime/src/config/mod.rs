//! Configuration system

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        match ConfigFormat::of(path)? {
            ConfigFormat::Toml => {
                toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            ConfigFormat::Ron => {
                ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::of(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Scene runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Viewport width in global units, used by viewport-relative placement
    pub viewport_width: f32,

    /// Viewport height in global units
    pub viewport_height: f32,

    /// Tag given to the root entity
    pub root_tag: String,

    /// Pending delayed invocations above which a warning is logged
    pub max_delayed: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            viewport_width: 800.0,
            viewport_height: 600.0,
            root_tag: "root".to_string(),
            max_delayed: 4096,
        }
    }
}

impl Config for SceneConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SceneConfig = toml::from_str("viewport_width = 1280.0\n").unwrap();
        assert_eq!(config.viewport_width, 1280.0);
        assert_eq!(config.viewport_height, 600.0);
        assert_eq!(config.root_tag, "root");
    }

    #[test]
    fn test_ron_parse() {
        let config: SceneConfig = ron::from_str("(root_tag: \"stage\", max_delayed: 8)").unwrap();
        assert_eq!(config.root_tag, "stage");
        assert_eq!(config.max_delayed, 8);
    }

    #[test]
    fn test_file_round_trip() {
        let name = format!("scene_runtime_config_{}.toml", std::process::id());
        let path = std::env::temp_dir().join(name);
        let config = SceneConfig {
            viewport_width: 320.0,
            ..SceneConfig::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = SceneConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = SceneConfig::load_from_file("scene.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_) | ConfigError::UnsupportedFormat(_)));
        assert!(matches!(
            SceneConfig::default().save_to_file("scene.json"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
