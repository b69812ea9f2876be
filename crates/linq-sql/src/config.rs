//! Backend configuration with sensible defaults.
//!
//! ```toml
//! [identifiers]
//! table_alias_prefix = "t"
//! sub_statement_alias_prefix = "q"
//!
//! [generation]
//! parameter_prefix = "@"
//! value_column_name = "value"
//! like_escape_character = "\\"
//! log_generated_sql = false
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefixes handed to the unique identifier generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentifierConfig {
    /// Prefix for mapped tables (`t0`, `t1`, ...)
    #[serde(default = "default_table_alias_prefix")]
    pub table_alias_prefix: String,
    /// Prefix for nested statements used as tables (`q0`, ...)
    #[serde(default = "default_sub_statement_alias_prefix")]
    pub sub_statement_alias_prefix: String,
}

fn default_table_alias_prefix() -> String {
    "t".to_string()
}

fn default_sub_statement_alias_prefix() -> String {
    "q".to_string()
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            table_alias_prefix: default_table_alias_prefix(),
            sub_statement_alias_prefix: default_sub_statement_alias_prefix(),
        }
    }
}

/// Text generation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationConfig {
    #[serde(default = "default_parameter_prefix")]
    pub parameter_prefix: String,
    /// Column name for projections that are a single value
    #[serde(default = "default_value_column_name")]
    pub value_column_name: String,
    #[serde(default = "default_like_escape_character")]
    pub like_escape_character: char,
    /// Emit the full command text at debug level
    #[serde(default)]
    pub log_generated_sql: bool,
}

fn default_parameter_prefix() -> String {
    "@".to_string()
}

fn default_value_column_name() -> String {
    "value".to_string()
}

fn default_like_escape_character() -> char {
    '\\'
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            parameter_prefix: default_parameter_prefix(),
            value_column_name: default_value_column_name(),
            like_escape_character: default_like_escape_character(),
            log_generated_sql: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqlBackendConfig {
    #[serde(default)]
    pub identifiers: IdentifierConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl SqlBackendConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: SqlBackendConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Prefixes must be distinct or generated aliases become ambiguous
    /// to a reader of the SQL (the counter still keeps them unique).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ids = &self.identifiers;
        if ids.table_alias_prefix.is_empty() || ids.sub_statement_alias_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "alias prefixes must not be empty".to_string(),
            ));
        }
        if ids.table_alias_prefix == ids.sub_statement_alias_prefix {
            return Err(ConfigError::Invalid(format!(
                "table and sub-statement alias prefixes are both '{}'",
                ids.table_alias_prefix
            )));
        }
        if self.generation.parameter_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "parameter prefix must not be empty".to_string(),
            ));
        }
        if self.generation.value_column_name.is_empty() {
            return Err(ConfigError::Invalid(
                "value column name must not be empty".to_string(),
            ));
        }
        let escape = self.generation.like_escape_character;
        if matches!(escape, '%' | '_' | '[' | ']' | '\'') {
            return Err(ConfigError::Invalid(format!(
                "'{}' cannot be used as LIKE escape character",
                escape
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let config = SqlBackendConfig::default();
        assert_eq!(config.identifiers.table_alias_prefix, "t");
        assert_eq!(config.identifiers.sub_statement_alias_prefix, "q");
        assert_eq!(config.generation.parameter_prefix, "@");
        assert_eq!(config.generation.value_column_name, "value");
        assert_eq!(config.generation.like_escape_character, '\\');
        assert!(!config.generation.log_generated_sql);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SqlBackendConfig::from_toml_str(
            r#"
            [generation]
            log_generated_sql = true
            "#,
        )
        .unwrap();

        assert!(config.generation.log_generated_sql);
        assert_eq!(config.generation.parameter_prefix, "@");
        assert_eq!(config.identifiers, IdentifierConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = SqlBackendConfig::from_toml_str("").unwrap();
        assert_eq!(config, SqlBackendConfig::default());
    }

    #[test]
    fn test_rejects_colliding_prefixes() {
        let err = SqlBackendConfig::from_toml_str(
            r#"
            [identifiers]
            table_alias_prefix = "x"
            sub_statement_alias_prefix = "x"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test_case("%"; "percent")]
    #[test_case("_"; "underscore")]
    #[test_case("["; "bracket")]
    fn test_rejects_wildcard_as_like_escape(escape: &str) {
        let err = SqlBackendConfig::from_toml_str(&format!(
            "[generation]\nlike_escape_character = \"{}\"\n",
            escape
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_custom_like_escape() {
        let config =
            SqlBackendConfig::from_toml_str("[generation]\nlike_escape_character = \"!\"\n").unwrap();
        assert_eq!(config.generation.like_escape_character, '!');
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = SqlBackendConfig::from_toml_str("[generation\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[identifiers]\ntable_alias_prefix = \"tab\"").unwrap();

        let config = SqlBackendConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.identifiers.table_alias_prefix, "tab");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SqlBackendConfig::from_toml_file("/nonexistent/linq-sql.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
