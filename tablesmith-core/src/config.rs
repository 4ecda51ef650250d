//! Engine configuration.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Schemas that hold built-in roles rather than user tables.
pub const DEFAULT_EXCLUDED_SCHEMAS: &[&str] = &[
    "guest",
    "INFORMATION_SCHEMA",
    "sys",
    "db_owner",
    "db_accessadmin",
    "db_securityadmin",
    "db_ddladmin",
    "db_backupoperator",
    "db_datareader",
    "db_datawriter",
    "db_denydatareader",
    "db_denydatawriter",
];

/// Naming and filtering knobs for the mutation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Appended to the table name to form the shadow table.
    pub shadow_suffix: String,
    /// Prefix for default constraints added by the retype path:
    /// `{prefix}_{table}_{column}`.
    pub default_constraint_prefix: String,
    /// Schemas hidden from `list_schemas`.
    pub excluded_schemas: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shadow_suffix: "_TEMP".to_string(),
            default_constraint_prefix: "DF".to_string(),
            excluded_schemas: DEFAULT_EXCLUDED_SCHEMAS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shadow_suffix.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "shadow_suffix".to_string(),
            });
        }
        if self.shadow_suffix.contains(']') || self.shadow_suffix.contains('[') {
            return Err(ValidationError::InvalidValue {
                field: "shadow_suffix".to_string(),
                reason: "must not contain brackets".to_string(),
            });
        }
        if self.default_constraint_prefix.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "default_constraint_prefix".to_string(),
            });
        }
        Ok(())
    }

    /// Name of the shadow table for `table`.
    pub fn shadow_table_name(&self, table: &str) -> String {
        format!("{}{}", table, self.shadow_suffix)
    }

    /// Name of the default constraint the retype path creates.
    pub fn default_constraint_name(&self, table: &str, column: &str) -> String {
        format!("{}_{}_{}", self.default_constraint_prefix, table, column)
    }

    pub fn is_excluded_schema(&self, schema: &str) -> bool {
        self.excluded_schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(schema))
    }
}
