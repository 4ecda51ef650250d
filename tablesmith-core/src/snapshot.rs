//! Read-only picture of an existing table and its dependent objects.
//!
//! Everything here is captured from the catalog at the start of an operation
//! and never mutated afterwards.

use crate::column::{validate_column_name, validate_specs, ColumnChange, ColumnSpec};
use crate::error::ValidationError;
use crate::ident::QualifiedName;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// COLUMNS
// ============================================================================

/// Identity seed and increment, kept as the server renders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub seed: String,
    pub increment: String,
}

/// Expression of a computed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Computed {
    /// Stored definition, parentheses included.
    pub definition: String,
    pub persisted: bool,
}

/// A column as it exists in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingColumn {
    pub name: String,
    /// Base type plus family-specific parameters, e.g. `nvarchar(50)`.
    pub type_text: String,
    pub nullable: bool,
    /// Stored default definition with outer parentheses removed; empty if none.
    pub default_definition: String,
    /// Name of the constraint holding the default.
    pub default_constraint: Option<String>,
    /// 1-based.
    pub ordinal_position: i32,
    pub identity: Option<Identity>,
    pub computed: Option<Computed>,
}

impl ExistingColumn {
    pub fn has_default(&self) -> bool {
        !self.default_definition.is_empty()
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }
}

// ============================================================================
// KEYS AND INDEXES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn from_descending_flag(is_descending: bool) -> Self {
        if is_descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub order: SortOrder,
}

impl KeyColumn {
    pub fn new(name: impl Into<String>, order: SortOrder) -> Self {
        Self {
            name: name.into(),
            order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: String,
    pub clustered: bool,
    pub columns: Vec<KeyColumn>,
}

/// Storage layout of an index, from `sys.indexes.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexKind {
    #[default]
    Rowstore,
    ClusteredColumnstore,
    NonclusteredColumnstore,
}

impl IndexKind {
    /// `None` for index types a rebuild cannot reproduce (heap, XML,
    /// spatial, hash).
    pub fn from_type_code(code: i32) -> Option<Self> {
        match code {
            1 | 2 => Some(IndexKind::Rowstore),
            5 => Some(IndexKind::ClusteredColumnstore),
            6 => Some(IndexKind::NonclusteredColumnstore),
            _ => None,
        }
    }
}

/// A non-primary-key index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub kind: IndexKind,
    pub unique: bool,
    pub clustered: bool,
    /// The index backs a UNIQUE constraint rather than standing alone.
    pub is_unique_constraint: bool,
    pub key_columns: Vec<KeyColumn>,
    pub included_columns: Vec<String>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    /// Stored definition, parentheses included.
    pub definition: String,
}

// ============================================================================
// FOREIGN KEYS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Parse the catalog's `*_referential_action_desc` text.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NO_ACTION" => Some(ReferentialAction::NoAction),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET_NULL" => Some(ReferentialAction::SetNull),
            "SET_DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    /// Table holding the constraint.
    pub parent: QualifiedName,
    pub parent_columns: Vec<String>,
    pub referenced: QualifiedName,
    pub referenced_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

/// A foreign key on another table that references the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundForeignKey {
    pub key: ForeignKey,
    pub drop_script: String,
    pub recreate_script: String,
}

// ============================================================================
// PERMISSIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    Grant,
    GrantWithGrantOption,
    Deny,
}

impl PermissionState {
    /// Parse the catalog's `state_desc` text.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GRANT" => Some(PermissionState::Grant),
            "GRANT_WITH_GRANT_OPTION" => Some(PermissionState::GrantWithGrantOption),
            "DENY" => Some(PermissionState::Deny),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// e.g. `SELECT`, `UPDATE`.
    pub permission_name: String,
    pub state: PermissionState,
    pub grantee: String,
    /// Non-empty for column-level grants.
    pub columns: Vec<String>,
}

/// An explicit grant or deny on the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub permission: Permission,
    pub revoke_script: String,
    pub recreate_script: String,
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Everything needed to reproduce a table after dropping it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: QualifiedName,
    /// Ordinal order.
    pub columns: Vec<ExistingColumn>,
    /// Full `CREATE TABLE` text.
    pub definition: String,
    pub primary_key: Option<PrimaryKey>,
    pub index_scripts: Vec<String>,
    pub check_scripts: Vec<String>,
    pub outbound_fk_scripts: Vec<String>,
    pub inbound_foreign_keys: Vec<InboundForeignKey>,
    pub permissions: Vec<PermissionGrant>,
}

impl TableSnapshot {
    pub fn identity_column(&self) -> Option<&ExistingColumn> {
        self.columns.iter().find(|c| c.identity.is_some())
    }

    pub fn has_identity(&self) -> bool {
        self.identity_column().is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// MUTATION PLAN
// ============================================================================

/// What a single request asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationPlan {
    AddColumns { specs: Vec<ColumnSpec> },
    Rename { column: String, new_name: String },
    Modify { column: String, change: ColumnChange },
    Delete { column: String },
}

impl MutationPlan {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            MutationPlan::AddColumns { specs } => validate_specs(specs),
            MutationPlan::Rename { column, new_name } => {
                validate_column_name("column", column)?;
                validate_column_name("new_name", new_name)
            }
            MutationPlan::Modify { column, change } => {
                validate_column_name("column", column)?;
                change.validate()
            }
            MutationPlan::Delete { column } => validate_column_name("column", column),
        }
    }

    /// Whether the plan goes through the table rebuild.
    pub fn requires_rebuild(&self) -> bool {
        matches!(self, MutationPlan::AddColumns { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            MutationPlan::AddColumns { .. } => "add_columns",
            MutationPlan::Rename { .. } => "rename_column",
            MutationPlan::Modify { .. } => "modify_column",
            MutationPlan::Delete { .. } => "delete_column",
        }
    }
}
