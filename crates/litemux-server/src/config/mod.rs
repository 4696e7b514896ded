//! Server configuration.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory holding one SQLite file per logical database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// URI-style options appended to every database file when opened,
    /// identical for every database (e.g. `cache=shared`).
    #[serde(default = "default_db_options")]
    pub db_options: String,

    /// Root credentials as a `user:secret` pair.
    #[serde(default = "default_root")]
    pub root: String,

    /// Log each incoming statement.
    #[serde(default)]
    pub verbose: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:4000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_db_options() -> String {
    "cache=shared".to_string()
}

fn default_root() -> String {
    "root:root".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            data_dir: default_data_dir(),
            db_options: default_db_options(),
            root: default_root(),
            verbose: false,
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Splits the root pair into user and secret; a missing separator
    /// means an empty secret.
    pub fn credentials(&self) -> (String, String) {
        match self.root.split_once(':') {
            Some((user, secret)) => (user.to_string(), secret.to_string()),
            None => (self.root.clone(), String::new()),
        }
    }

    /// Creates a builder for configuration.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for server configuration.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Sets the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Sets the per-database option string.
    pub fn db_options(mut self, options: impl Into<String>) -> Self {
        self.config.db_options = options.into();
        self
    }

    /// Sets the root credential pair.
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Enables statement logging.
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.config.verbose = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:4000");
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.db_options, "cache=shared");
        assert!(!config.verbose);
    }

    #[test]
    fn test_credentials() {
        let config = ServerConfig::builder().root("admin:hunter2").build();
        assert_eq!(
            config.credentials(),
            ("admin".to_string(), "hunter2".to_string())
        );

        let config = ServerConfig::builder().root("admin:").build();
        assert_eq!(config.credentials(), ("admin".to_string(), String::new()));

        let config = ServerConfig::builder().root("admin").build();
        assert_eq!(config.credentials(), ("admin".to_string(), String::new()));
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:13306")
            .data_dir("/tmp/litemux")
            .db_options("cache=shared&mode=rwc")
            .verbose(true)
            .build();

        assert_eq!(config.listen_addr, "127.0.0.1:13306");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/litemux"));
        assert_eq!(config.db_options, "cache=shared&mode=rwc");
        assert!(config.verbose);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = ServerConfig::builder()
            .listen_addr("localhost:9999")
            .root("ops:secret")
            .build();

        config.save(&path).unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.listen_addr, "localhost:9999");
        assert_eq!(loaded.root, "ops:secret");
        assert_eq!(loaded.db_options, "cache=shared");
    }
}
