//! Configuration file handling for httpmq-cli

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_SERVER: &str = "http://127.0.0.1:4101";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default data plane URL
    pub server: Option<String>,
    /// Bearer access token
    pub access_token: Option<String>,
    /// Custom CA file
    pub ca_file: Option<PathBuf>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("httpmq-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        server: Option<&str>,
        access_token: Option<&str>,
        ca_file: Option<&Path>,
        output: Option<&str>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            server: server
                .map(String::from)
                .or_else(|| self.server.clone())
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            access_token: access_token
                .map(String::from)
                .or_else(|| self.access_token.clone()),
            ca_file: ca_file
                .map(Path::to_path_buf)
                .or_else(|| self.ca_file.clone()),
            output: output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "table".to_string()),
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub server: String,
    pub access_token: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub output: String,
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server = \"http://mq.local:4101\"\naccess_token = \"abc\"\noutput = \"json\""
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.as_deref(), Some("http://mq.local:4101"));
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert_eq!(config.output.as_deref(), Some("json"));
        assert!(config.ca_file.is_none());
    }

    #[test]
    fn test_args_override_file() {
        let config = Config {
            server: Some("http://from-file:4101".into()),
            access_token: Some("file-token".into()),
            ca_file: None,
            output: Some("csv".into()),
            no_color: Some(true),
        };

        let merged = config.merge_with_args(
            Some("http://from-args:4101"),
            None,
            Some(Path::new("/etc/ca.pem")),
            None,
            false,
        );
        assert_eq!(merged.server, "http://from-args:4101");
        assert_eq!(merged.access_token.as_deref(), Some("file-token"));
        assert_eq!(merged.ca_file, Some(PathBuf::from("/etc/ca.pem")));
        assert_eq!(merged.output, "csv");
        assert!(merged.no_color);
    }

    #[test]
    fn test_defaults() {
        let merged = Config::default().merge_with_args(None, None, None, None, false);
        assert_eq!(merged.server, DEFAULT_SERVER);
        assert_eq!(merged.output, "table");
        assert!(merged.access_token.is_none());
        assert!(!merged.no_color);
    }
}
