use std::{
    fmt,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.toml";
pub const THEME_DIR: &str = "theme";
pub const DEFAULT_PUBLISH_DIR: &str = "public";
pub const DEFAULT_PAGINATION: usize = 10;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parsing(toml::de::Error),
    Serializing(toml::ser::Error),
    MissingBaseUrl,
    InvalidBaseUrl(String),
    MissingTheme,
    InvalidPagination(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parsing(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::Serializing(e) => write!(f, "TOML write error: {}", e),
            ConfigError::MissingBaseUrl => write!(f, "No base URL set in configuration file"),
            ConfigError::InvalidBaseUrl(url) => {
                write!(f, "Base URL must be an absolute URL or path, got {:?}", url)
            }
            ConfigError::MissingTheme => write!(f, "No theme specified in configuration file"),
            ConfigError::InvalidPagination(n) => {
                write!(f, "Pagination must be at least 1, got {}", n)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parsing(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        ConfigError::Serializing(value)
    }
}

/// Site-wide settings read from `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Description")]
    pub description: String,
    #[serde(alias = "Owner")]
    pub owner: String,
    #[serde(rename = "baseURL", alias = "BaseURL", alias = "baseUrl")]
    pub base_url: String,
    #[serde(alias = "Pagination")]
    pub pagination: usize,
    #[serde(alias = "Theme")]
    pub theme: String,
    #[serde(rename = "publishDir", alias = "PublishDir")]
    pub publish_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            owner: String::new(),
            base_url: String::new(),
            pagination: DEFAULT_PAGINATION,
            theme: String::new(),
            publish_dir: DEFAULT_PUBLISH_DIR.to_string(),
        }
    }
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&data)?;

        Ok(config)
    }

    /// Reads `config.toml` from a site root and validates it.
    pub fn open<P: AsRef<Path>>(root: P, check_theme: bool) -> Result<Self, ConfigError> {
        let config = Self::read(root.as_ref().join(CONFIG_FILE))?;
        config.validate(check_theme)?;

        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }

    pub fn validate(&self, check_theme: bool) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        // Either a full URL or an absolute path on the serving host.
        if !base_url.starts_with('/') && url::Url::parse(base_url).is_err() {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        if check_theme && self.theme.trim().is_empty() {
            return Err(ConfigError::MissingTheme);
        }

        if self.pagination == 0 {
            return Err(ConfigError::InvalidPagination(self.pagination));
        }

        Ok(())
    }

    pub fn page_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.pagination).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn theme_dir<P: AsRef<Path>>(&self, root: P) -> PathBuf {
        root.as_ref().join(THEME_DIR).join(&self.theme)
    }

    pub fn publish_dir<P: AsRef<Path>>(&self, root: P) -> PathBuf {
        let dir = match self.publish_dir.trim() {
            "" => DEFAULT_PUBLISH_DIR,
            dir => dir,
        };
        root.as_ref().join(dir)
    }
}
