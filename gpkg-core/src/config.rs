//! Container configuration
//!
//! Loaded from TOML, optionally overridden from `GPKG_*` environment variables.

use crate::constants::APPLICATION_ID_VALUE;
use crate::{ConfigError, GpkgResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options applied when a container is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GeoPackageConfig {
    /// Only accept `.gpkg` / `.gpkx` paths.
    pub require_extension: bool,
    /// Create the file when it does not exist.
    pub create_if_missing: bool,
    /// Enforce foreign keys in the storage engine.
    pub foreign_keys: bool,
    /// How long the engine waits on a locked file, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Insert the -1, 0 and 4326 SRS rows into new containers.
    pub seed_default_srs: bool,
    /// Value written to, and expected in, the file header.
    pub application_id: u32,
}

impl Default for GeoPackageConfig {
    fn default() -> Self {
        Self {
            require_extension: true,
            create_if_missing: true,
            foreign_keys: true,
            busy_timeout_ms: 5_000,
            seed_default_srs: true,
            application_id: APPLICATION_ID_VALUE,
        }
    }
}

impl GeoPackageConfig {
    /// Read and validate a TOML config file. Missing keys take defaults.
    pub fn from_path(path: &Path) -> GpkgResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&contents)?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> GpkgResult<Self> {
        let config: GeoPackageConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden from the environment.
    ///
    /// # Environment Variables
    /// - `GPKG_REQUIRE_EXTENSION`: accept only .gpkg/.gpkx paths (default: true)
    /// - `GPKG_CREATE_IF_MISSING`: create missing files (default: true)
    /// - `GPKG_FOREIGN_KEYS`: enforce foreign keys (default: true)
    /// - `GPKG_BUSY_TIMEOUT_MS`: engine busy timeout (default: 5000)
    /// - `GPKG_SEED_DEFAULT_SRS`: seed default SRS rows (default: true)
    pub fn from_env() -> GpkgResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Unparseable values are errors.
    pub fn with_overrides<F>(mut self, lookup: F) -> GpkgResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GPKG_REQUIRE_EXTENSION") {
            self.require_extension = parse_bool("GPKG_REQUIRE_EXTENSION", &v)?;
        }
        if let Some(v) = lookup("GPKG_CREATE_IF_MISSING") {
            self.create_if_missing = parse_bool("GPKG_CREATE_IF_MISSING", &v)?;
        }
        if let Some(v) = lookup("GPKG_FOREIGN_KEYS") {
            self.foreign_keys = parse_bool("GPKG_FOREIGN_KEYS", &v)?;
        }
        if let Some(v) = lookup("GPKG_BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "GPKG_BUSY_TIMEOUT_MS".to_string(),
                value: v.clone(),
                reason: "must be a non-negative integer".to_string(),
            })?;
        }
        if let Some(v) = lookup("GPKG_SEED_DEFAULT_SRS") {
            self.seed_default_srs = parse_bool("GPKG_SEED_DEFAULT_SRS", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> GpkgResult<()> {
        if self.application_id == 0 {
            return Err(ConfigError::InvalidValue {
                field: "application_id".to_string(),
                value: "0".to_string(),
                reason: "must be non-zero".to_string(),
            }
            .into());
        }
        if self.busy_timeout_ms > i32::MAX as u64 {
            return Err(ConfigError::InvalidValue {
                field: "busy_timeout_ms".to_string(),
                value: self.busy_timeout_ms.to_string(),
                reason: format!("must be <= {}", i32::MAX),
            }
            .into());
        }
        Ok(())
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = GeoPackageConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.require_extension);
        assert_eq!(config.application_id, APPLICATION_ID_VALUE);
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = GeoPackageConfig::from_toml_str(
            "require_extension = false\nbusy_timeout_ms = 250\n",
        )
        .unwrap();
        assert!(!config.require_extension);
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(config.seed_default_srs);
    }

    #[test]
    fn test_unknown_toml_key_rejected() {
        let err = GeoPackageConfig::from_toml_str("journal = \"wal\"\n").unwrap_err();
        assert!(matches!(err, crate::GpkgError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_application_id_rejected() {
        let err = GeoPackageConfig::from_toml_str("application_id = 0\n").unwrap_err();
        assert!(err.to_string().contains("application_id"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GPKG_FOREIGN_KEYS", "off"),
            ("GPKG_BUSY_TIMEOUT_MS", "10"),
        ]
        .into_iter()
        .collect();
        let config = GeoPackageConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, 10);
    }

    #[test]
    fn test_bad_override_rejected() {
        let err = GeoPackageConfig::default()
            .with_overrides(|k| (k == "GPKG_SEED_DEFAULT_SRS").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("GPKG_SEED_DEFAULT_SRS"));
    }
}
