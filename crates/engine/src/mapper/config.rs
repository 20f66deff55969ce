//! Mapper configuration via `settee.toml`
//!
//! Every option has a default, so an empty file (or no file) is a valid
//! configuration. Per-call option structs (`SaveOptions`, `RemoveOptions`,
//! `FindOptions`) override the values here when they set them.

use serde::{Deserialize, Serialize};
use settee_core::{Error, Result, DEFAULT_DELIMITER, DEFAULT_REF_INDEX_KEY_PREFIX};
use std::path::Path;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "settee.toml";

/// Mapper configuration
///
/// # Example
///
/// ```toml
/// store_full_reference_id = false
/// wait_for_index = true
/// delimiter = "::"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Store full (prefixed) keys in reference fields and index documents
    pub store_full_reference_id: bool,
    /// Store the full key in the document's own key field
    pub store_full_key: bool,
    /// Block `save`/`remove` until index writes complete
    pub wait_for_index: bool,
    /// A single-key find still returns a batch
    pub always_return_arrays: bool,
    /// Drop empty branches from stored documents
    pub minimize: bool,
    /// Separator in document and index keys
    pub delimiter: String,
    /// Prefix of index document keys
    pub ref_index_key_prefix: String,
    /// Upper bound on concurrent sub-operations of one call
    pub max_concurrency: usize,
    /// Recursion cap for populating every reference
    pub populate_max_depth: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            store_full_reference_id: false,
            store_full_key: false,
            wait_for_index: false,
            always_return_arrays: false,
            minimize: true,
            delimiter: DEFAULT_DELIMITER.to_string(),
            ref_index_key_prefix: DEFAULT_REF_INDEX_KEY_PREFIX.to_string(),
            max_concurrency: 10,
            populate_max_depth: 3,
        }
    }
}

impl MapperConfig {
    /// Check option values
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty delimiter or a zero concurrency
    /// bound.
    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(Error::Config("delimiter must not be empty".into()));
        }
        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# settee mapper configuration

# Store full (prefixed) keys in reference fields and index documents
store_full_reference_id = false

# Store the full key in the document's own key field
store_full_key = false

# Wait for index documents to be written before save/remove return
wait_for_index = false

# Return a batch even when finding a single key
always_return_arrays = false

# Drop empty objects from stored documents
minimize = true

# Separator between key parts
delimiter = "_"

# Prefix of index document keys
ref_index_key_prefix = "$_ref_by_"

# Maximum concurrent store calls issued by one operation
max_concurrency = 10

# How deep populate-everything follows references
populate_max_depth = 3
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MapperConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = MapperConfig::default();
        assert_eq!(config.delimiter, "_");
        assert_eq!(config.ref_index_key_prefix, "$_ref_by_");
        assert!(config.minimize);
        assert!(!config.wait_for_index);
        assert_eq!(config.max_concurrency, 10);
        config.validate().unwrap();
    }

    #[test]
    fn default_toml_matches_default() {
        let config = MapperConfig::from_toml_str(MapperConfig::default_toml()).unwrap();
        assert_eq!(config, MapperConfig::default());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = MapperConfig::from_toml_str("wait_for_index = true\ndelimiter = \"::\"").unwrap();
        assert!(config.wait_for_index);
        assert_eq!(config.delimiter, "::");
        assert_eq!(config.populate_max_depth, 3);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            MapperConfig::from_toml_str("delimiter = \"\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            MapperConfig::from_toml_str("max_concurrency = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            MapperConfig::from_toml_str("minimize = \"yes\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        MapperConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(MapperConfig::from_file(&path).unwrap(), MapperConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "store_full_key = true\n").unwrap();

        MapperConfig::write_default_if_missing(&path).unwrap();
        assert!(MapperConfig::from_file(&path).unwrap().store_full_key);
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = MapperConfig {
            store_full_reference_id: true,
            always_return_arrays: true,
            ref_index_key_prefix: "idx::".to_string(),
            ..MapperConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(MapperConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = MapperConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
