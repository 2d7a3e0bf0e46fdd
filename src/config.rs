//! Application configuration loaded from TOML
//!
//! ```toml
//! [paths]
//! solutions = "schemes"
//! config = "config"
//! exports = "exports"
//!
//! [render]
//! trim_blocks = true
//! lstrip_blocks = true
//! keep_trailing_newline = true
//! ```
//!
//! Every key is optional. Relative paths are taken relative to the directory
//! holding the configuration file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::renderer::RenderConfig;

/// Errors that can occur when loading the application configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse configuration TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

pub const DEFAULT_SOLUTIONS_DIR: &str = "schemes";
pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const DEFAULT_EXPORTS_DIR: &str = "exports";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Root scanned for solution directories
    pub solutions_dir: PathBuf,
    /// Directory holding the parameter library
    pub config_dir: PathBuf,
    /// Default destination for rendered programs
    pub exports_dir: PathBuf,
    pub render: RenderConfig,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    paths: TomlPaths,
    #[serde(default)]
    render: TomlRender,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TomlPaths {
    solutions: Option<PathBuf>,
    config: Option<PathBuf>,
    exports: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TomlRender {
    trim_blocks: Option<bool>,
    lstrip_blocks: Option<bool>,
    keep_trailing_newline: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            solutions_dir: PathBuf::from(DEFAULT_SOLUTIONS_DIR),
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            exports_dir: PathBuf::from(DEFAULT_EXPORTS_DIR),
            render: RenderConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file, resolving paths against its directory
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&content, base)
    }

    /// Load configuration from a TOML string; relative paths stay relative
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new(""))
    }

    fn parse(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let defaults = RenderConfig::default().whitespace;
        let TomlPaths {
            solutions,
            config,
            exports,
        } = parsed.paths;

        Ok(AppConfig {
            solutions_dir: base.join(solutions.unwrap_or_else(|| DEFAULT_SOLUTIONS_DIR.into())),
            config_dir: base.join(config.unwrap_or_else(|| DEFAULT_CONFIG_DIR.into())),
            exports_dir: base.join(exports.unwrap_or_else(|| DEFAULT_EXPORTS_DIR.into())),
            render: RenderConfig::new()
                .with_trim_blocks(parsed.render.trim_blocks.unwrap_or(defaults.trim_blocks))
                .with_lstrip_blocks(parsed.render.lstrip_blocks.unwrap_or(defaults.lstrip_blocks))
                .with_keep_trailing_newline(
                    parsed
                        .render
                        .keep_trailing_newline
                        .unwrap_or(defaults.keep_trailing_newline),
                ),
        })
    }

    pub fn with_solutions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.solutions_dir = dir.into();
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_exports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exports_dir = dir.into();
        self
    }

    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.solutions_dir, PathBuf::from("schemes"));
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::from_str(
            r#"
[paths]
solutions = "programs"

[render]
trim_blocks = false
"#,
        )
        .unwrap();
        assert_eq!(config.solutions_dir, PathBuf::from("programs"));
        assert_eq!(config.exports_dir, PathBuf::from("exports"));
        assert!(!config.render.whitespace.trim_blocks);
        assert!(config.render.whitespace.lstrip_blocks);
    }

    #[test]
    fn test_paths_relative_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nc-forge.toml");
        std::fs::write(&path, "[paths]\nexports = \"out\"\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.exports_dir, dir.path().join("out"));
        assert_eq!(config.config_dir, dir.path().join("config"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = AppConfig::from_str("[render]\ntrim = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file(Path::new("/nonexistent/nc-forge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
