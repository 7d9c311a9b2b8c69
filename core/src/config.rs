//! Client configuration read from a TOML file.
//!
//! ```toml
//! [central]
//! base_url = "https://central.example.com"
//! username = "admin@example.com"
//! password = "secret"
//! default_project_id = 1
//! ```
//!
//! The file is located from an explicit path, else `ODK_CONFIG_FILE`, else
//! `.odk_config.toml` in the user's home directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::error;

use crate::error::{OdkError, Result};

pub const CONFIG_ENV_VAR: &str = "ODK_CONFIG_FILE";
pub const CONFIG_FILE_NAME: &str = ".odk_config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub central: CentralConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CentralConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub default_project_id: Option<u64>,
}

impl Config {
    /// Locate, read and validate the configuration file.
    pub fn read(path: Option<&Path>) -> Result<Self> {
        let path = config_path(path)?;
        let text = std::fs::read_to_string(&path).map_err(|e| {
            log_and_wrap(format!("could not read config file {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| log_and_wrap(format!("invalid config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let central = &self.central;
        for (key, value) in [
            ("base_url", &central.base_url),
            ("username", &central.username),
            ("password", &central.password),
        ] {
            if value.trim().is_empty() {
                return Err(log_and_wrap(format!("config value central.{key} must not be empty")));
            }
        }
        Ok(())
    }
}

fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(CONFIG_FILE_NAME))
        .ok_or_else(|| log_and_wrap(format!("no home directory found; set {CONFIG_ENV_VAR}")))
}

fn log_and_wrap(message: String) -> OdkError {
    let err = OdkError::Configuration(message);
    error!(error = %err, "configuration rejected");
    err
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const VALID: &str = r#"
[central]
base_url = "https://central.example.com"
username = "admin@example.com"
password = "secret"
default_project_id = 1
"#;

    #[test]
    fn parses_valid_config() {
        let config = Config::parse(VALID).unwrap();
        assert_eq!(config.central.base_url, "https://central.example.com");
        assert_eq!(config.central.default_project_id, Some(1));
    }

    #[test]
    fn default_project_is_optional() {
        let text = VALID.replace("default_project_id = 1\n", "");
        assert_eq!(Config::parse(&text).unwrap().central.default_project_id, None);
    }

    #[test]
    fn empty_password_is_rejected() {
        let text = VALID.replace("\"secret\"", "\"\"");
        let err = Config::parse(&text).unwrap_err();
        assert!(matches!(err, OdkError::Configuration(ref msg) if msg.contains("central.password")));
    }

    #[test]
    fn missing_section_is_rejected() {
        assert!(matches!(Config::parse("base_url = 'x'"), Err(OdkError::Configuration(_))));
    }

    #[test]
    fn reads_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        let config = Config::read(Some(file.path())).unwrap();
        assert_eq!(config.central.username, "admin@example.com");
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::read(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, OdkError::Configuration(_)));
    }
}
