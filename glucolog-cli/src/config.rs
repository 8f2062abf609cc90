use glucolog_core::cache::{
    CacheManifest, DEFAULT_ASSETS, DEFAULT_CACHE_VERSION, DEFAULT_EXCLUDED_SCHEMES,
    DEFAULT_OPAQUE_ORIGINS,
};
use glucolog_core::DEFAULT_SLOT_KEY;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CACHE_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_PROXY_PORT: u16 = 8090;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Offline cache configuration
#[derive(Debug, Clone, Serialize)]
pub struct CacheConfig {
    /// Root directory holding one subdirectory per cache generation
    pub dir: ConfigValue<PathBuf>,
    /// Origin the application assets are served from
    pub origin: ConfigValue<String>,
    /// Cache generation tag; bump on every asset change
    pub version: String,
    /// Port for `cache serve`
    pub port: u16,
    /// Assets pre-fetched on install
    pub assets: Vec<String>,
    /// Third-party origins fetched without CORS
    pub opaque_origins: Vec<String>,
    /// URL schemes never intercepted
    pub excluded_schemes: Vec<String>,
}

impl CacheConfig {
    pub fn manifest(&self) -> CacheManifest {
        CacheManifest::new(self.version.clone(), self.assets.clone())
    }

    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin.value)
            .map_err(|e| ConfigError::InvalidOrigin(self.origin.value.clone(), e.to_string()))
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the readings slot
    pub data_dir: ConfigValue<PathBuf>,
    /// Slot name of the reading collection
    pub storage_key: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Offline cache configuration
    pub cache: CacheConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    storage_key: Option<String>,
    cache: Option<CacheFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CacheFile {
    dir: Option<PathBuf>,
    origin: Option<String>,
    version: Option<String>,
    port: Option<u16>,
    assets: Option<Vec<String>>,
    opaque_origins: Option<Vec<String>>,
    excluded_schemes: Option<Vec<String>>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut storage_key =
            ConfigValue::new(DEFAULT_SLOT_KEY.to_string(), ConfigSource::Default);
        let mut cache_dir = None;
        let mut origin = ConfigValue::new(DEFAULT_CACHE_ORIGIN.to_string(), ConfigSource::Default);
        let mut cache_file = CacheFile::default();
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                data_dir = ConfigValue::new(resolve_relative(&path, dir), ConfigSource::File);
            }
            if let Some(key) = file_config.storage_key {
                storage_key = ConfigValue::new(key, ConfigSource::File);
            }
            if let Some(cache) = file_config.cache {
                if let Some(dir) = &cache.dir {
                    cache_dir = Some(ConfigValue::new(
                        resolve_relative(&path, dir.clone()),
                        ConfigSource::File,
                    ));
                }
                if let Some(url) = &cache.origin {
                    origin = ConfigValue::new(url.clone(), ConfigSource::File);
                }
                cache_file = cache;
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("GLUCOLOG_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(key) = std::env::var("GLUCOLOG_STORAGE_KEY") {
            storage_key = ConfigValue::new(key, ConfigSource::Environment);
        }
        if let Ok(dir) = std::env::var("GLUCOLOG_CACHE_DIR") {
            cache_dir = Some(ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment));
        }
        if let Ok(url) = std::env::var("GLUCOLOG_CACHE_ORIGIN") {
            origin = ConfigValue::new(url, ConfigSource::Environment);
        }

        // Caches live under the data directory unless placed elsewhere
        let cache_dir = cache_dir.unwrap_or_else(|| {
            ConfigValue::new(data_dir.value.join("caches"), ConfigSource::Default)
        });

        let cache = CacheConfig {
            dir: cache_dir,
            origin,
            version: cache_file
                .version
                .unwrap_or_else(|| DEFAULT_CACHE_VERSION.to_string()),
            port: cache_file.port.unwrap_or(DEFAULT_PROXY_PORT),
            assets: cache_file
                .assets
                .unwrap_or_else(|| to_strings(DEFAULT_ASSETS)),
            opaque_origins: cache_file
                .opaque_origins
                .unwrap_or_else(|| to_strings(DEFAULT_OPAQUE_ORIGINS)),
            excluded_schemes: cache_file
                .excluded_schemes
                .unwrap_or_else(|| to_strings(DEFAULT_EXCLUDED_SCHEMES)),
        };

        Ok(Self {
            data_dir,
            storage_key,
            config_file,
            cache,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/glucolog/
    /// - macOS: ~/Library/Application Support/glucolog/
    /// - Windows: %APPDATA%/glucolog/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glucolog")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/glucolog/
    /// - macOS: ~/Library/Application Support/glucolog/
    /// - Windows: %APPDATA%/glucolog/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glucolog")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

/// Resolve relative paths against the config file's directory
fn resolve_relative(config_path: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        config_path
            .parent()
            .map(|p| p.join(&path))
            .unwrap_or(path)
    } else {
        path
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidOrigin(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidOrigin(origin, e) => {
                write!(f, "Invalid cache origin '{}': {}", origin, e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config.data_dir.value.ends_with("glucolog"));
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert_eq!(config.storage_key.value, "glucoseReadings");
        assert_eq!(config.cache.version, "glucose-logger-v1.2");
        assert_eq!(config.cache.port, 8090);
        assert_eq!(config.cache.excluded_schemes, vec!["chrome-extension"]);
        assert!(config.cache.dir.value.ends_with("caches"));
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /custom/glucose").unwrap();
        writeln!(file, "storage_key: lecturas").unwrap();
        writeln!(file, "cache:").unwrap();
        writeln!(file, "  origin: https://glucose.example.com").unwrap();
        writeln!(file, "  version: glucose-logger-v2.0").unwrap();
        writeln!(file, "  port: 9000").unwrap();
        writeln!(file, "  assets: [\"/\", \"/index.html\"]").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/custom/glucose"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert_eq!(config.storage_key.value, "lecturas");
        assert_eq!(config.cache.origin.value, "https://glucose.example.com");
        assert_eq!(config.cache.origin.source, ConfigSource::File);
        assert_eq!(config.cache.version, "glucose-logger-v2.0");
        assert_eq!(config.cache.port, 9000);
        assert_eq!(config.cache.assets, vec!["/", "/index.html"]);
        assert_eq!(
            config.cache.dir.value,
            PathBuf::from("/custom/glucose/caches")
        );
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: data").unwrap();
        writeln!(file, "cache:").unwrap();
        writeln!(file, "  dir: assets-cache").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("data"));
        assert_eq!(config.cache.dir.value, temp_dir.path().join("assets-cache"));
        assert_eq!(config.cache.dir.source, ConfigSource::File);
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "storage_key: fromfile").unwrap();

        std::env::set_var("GLUCOLOG_STORAGE_KEY", "fromenv");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.storage_key.value, "fromenv");
        assert_eq!(config.storage_key.source, ConfigSource::Environment);

        std::env::remove_var("GLUCOLOG_STORAGE_KEY");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_invalid_origin() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "cache:").unwrap();
        writeln!(file, "  origin: not a url").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        let err = config.cache.origin_url().unwrap_err();
        assert!(err.to_string().contains("Invalid cache origin"));
    }

    #[test]
    fn test_manifest_from_config() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load(Some(temp_dir.path().join("none.yaml"))).unwrap();

        let manifest = config.cache.manifest();
        assert_eq!(manifest.version, DEFAULT_CACHE_VERSION);
        assert_eq!(manifest.urls.len(), DEFAULT_ASSETS.len());
    }
}
