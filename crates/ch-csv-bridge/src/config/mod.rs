//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(
            r#"
connection:
  host: ch.internal
  password: secret
"#,
        )
        .unwrap();

        assert_eq!(config.connection.port, 8123);
        assert_eq!(config.connection.database, "default");
        assert_eq!(config.connection.user, "default");
        assert_eq!(config.transfer.batch_size, 1_000);
        assert_eq!(config.transfer.null_marker, "\\N");
        assert!((config.transfer.max_error_fraction - 0.2).abs() < f64::EPSILON);
        assert!(config.transfer.create_if_missing);
        assert_eq!(
            config.connection.credential(),
            Credential::Password("secret")
        );
    }

    #[test]
    fn test_from_yaml_overrides() {
        let config = Config::from_yaml(
            r#"
connection:
  host: ch.internal
  port: 8443
  database: analytics
  user: loader
  jwt_token: eyJhbGciOi
  secure: true
transfer:
  batch_size: 250
  max_error_fraction: 0.05
  output_dir: /tmp/exports
"#,
        )
        .unwrap();

        assert_eq!(config.connection.base_url(), "https://ch.internal:8443/");
        assert_eq!(config.connection.credential(), Credential::Bearer("eyJhbGciOi"));
        assert_eq!(config.transfer.batch_size, 250);
        assert_eq!(
            config.transfer.default_export_path("events"),
            std::path::PathBuf::from("/tmp/exports/events_export.csv")
        );
    }

    #[test]
    fn test_from_yaml_rejects_empty_document() {
        assert!(Config::from_yaml("").is_err());
    }

    #[test]
    fn test_from_yaml_rejects_missing_host() {
        assert!(Config::from_yaml("connection:\n  port: 8123\n").is_err());
    }
}
