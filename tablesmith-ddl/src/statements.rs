//! Statement builders for every DDL the engine executes.
//!
//! Identifiers are bracket-quoted here and nowhere else. The only value that
//! travels as a parameter is the rename pair, which `sp_rename` takes as
//! arguments.

use crate::clause::default_clause;
use tablesmith_core::{
    quote_ident, CheckConstraint, ColumnType, DefaultValue, ForeignKey, IndexDefinition,
    IndexKind, KeyColumn, Permission, PermissionState, QualifiedName,
};

/// Column rename through the system procedure. Binds the three-part quoted
/// old name to `@P1` and the new bare name to `@P2`.
pub const RENAME_COLUMN: &str = "EXEC sp_rename @P1, @P2, 'COLUMN'";

// ============================================================================
// REBUILD
// ============================================================================

pub fn copy_to_shadow(table: &QualifiedName, shadow: &QualifiedName) -> String {
    format!("SELECT * INTO {} FROM {}", shadow.quoted(), table.quoted())
}

pub fn drop_table(table: &QualifiedName) -> String {
    format!("DROP TABLE {}", table.quoted())
}

/// Copy rows back with an explicit column list so physical order does not
/// matter.
pub fn restore_from_shadow(
    table: &QualifiedName,
    shadow: &QualifiedName,
    columns: &[&str],
) -> String {
    let list = column_list(columns.iter().copied());
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        table.quoted(),
        list,
        list,
        shadow.quoted()
    )
}

pub fn identity_insert(table: &QualifiedName, enabled: bool) -> String {
    format!(
        "SET IDENTITY_INSERT {} {}",
        table.quoted(),
        if enabled { "ON" } else { "OFF" }
    )
}

// ============================================================================
// DEPENDENT OBJECTS
// ============================================================================

/// Recreate a non-primary-key index. Indexes that back a UNIQUE constraint
/// come back as the constraint.
pub fn create_index(table: &QualifiedName, index: &IndexDefinition) -> String {
    match index.kind {
        IndexKind::ClusteredColumnstore => {
            return format!(
                "CREATE CLUSTERED COLUMNSTORE INDEX {} ON {}",
                quote_ident(&index.name),
                table.quoted()
            );
        }
        IndexKind::NonclusteredColumnstore => {
            let members = index
                .key_columns
                .iter()
                .map(|c| c.name.as_str())
                .chain(index.included_columns.iter().map(String::as_str));
            let mut sql = format!(
                "CREATE NONCLUSTERED COLUMNSTORE INDEX {} ON {} ({})",
                quote_ident(&index.name),
                table.quoted(),
                column_list(members)
            );
            if let Some(filter) = index.filter.as_deref().filter(|f| !f.trim().is_empty()) {
                sql.push_str(&format!(" WHERE {}", filter.trim()));
            }
            return sql;
        }
        IndexKind::Rowstore => {}
    }

    let clustering = if index.clustered {
        "CLUSTERED"
    } else {
        "NONCLUSTERED"
    };
    let keys = key_list(&index.key_columns);

    if index.is_unique_constraint {
        return format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE {} ({})",
            table.quoted(),
            quote_ident(&index.name),
            clustering,
            keys
        );
    }

    let mut sql = format!(
        "CREATE {}{} INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        clustering,
        quote_ident(&index.name),
        table.quoted(),
        keys
    );
    if !index.included_columns.is_empty() {
        sql.push_str(&format!(
            " INCLUDE ({})",
            column_list(index.included_columns.iter().map(String::as_str))
        ));
    }
    if let Some(filter) = index.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        sql.push_str(&format!(" WHERE {}", filter.trim()));
    }
    sql
}

pub fn add_check_constraint(table: &QualifiedName, check: &CheckConstraint) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} CHECK {}",
        table.quoted(),
        quote_ident(&check.name),
        check.definition.trim()
    )
}

/// Create a foreign key on its parent table.
pub fn add_foreign_key(key: &ForeignKey) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        key.parent.quoted(),
        quote_ident(&key.name),
        column_list(key.parent_columns.iter().map(String::as_str)),
        key.referenced.quoted(),
        column_list(key.referenced_columns.iter().map(String::as_str)),
        key.on_delete.as_sql(),
        key.on_update.as_sql()
    )
}

pub fn drop_constraint(table: &QualifiedName, constraint: &str) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        table.quoted(),
        quote_ident(constraint)
    )
}

// ============================================================================
// PERMISSIONS
// ============================================================================

fn permission_target(table: &QualifiedName, permission: &Permission) -> String {
    if permission.columns.is_empty() {
        table.quoted()
    } else {
        format!(
            "{} ({})",
            table.quoted(),
            column_list(permission.columns.iter().map(String::as_str))
        )
    }
}

/// Statement that re-establishes a captured grant or deny.
pub fn grant_script(table: &QualifiedName, permission: &Permission) -> String {
    let target = permission_target(table, permission);
    let grantee = quote_ident(&permission.grantee);
    match permission.state {
        PermissionState::Grant => {
            format!("GRANT {} ON {} TO {}", permission.permission_name, target, grantee)
        }
        PermissionState::GrantWithGrantOption => format!(
            "GRANT {} ON {} TO {} WITH GRANT OPTION",
            permission.permission_name, target, grantee
        ),
        PermissionState::Deny => {
            format!("DENY {} ON {} TO {}", permission.permission_name, target, grantee)
        }
    }
}

/// Statement that removes a captured grant or deny.
pub fn revoke_script(table: &QualifiedName, permission: &Permission) -> String {
    let mut sql = format!(
        "REVOKE {} ON {} FROM {}",
        permission.permission_name,
        permission_target(table, permission),
        quote_ident(&permission.grantee)
    );
    if permission.state == PermissionState::GrantWithGrantOption {
        sql.push_str(" CASCADE");
    }
    sql
}

// ============================================================================
// DIRECT ALTER
// ============================================================================

/// Parameters for [`RENAME_COLUMN`].
pub fn rename_column_params(table: &QualifiedName, column: &str, new_name: &str) -> [String; 2] {
    [table.quoted_column(column), new_name.to_string()]
}

pub fn alter_column(
    table: &QualifiedName,
    column: &str,
    column_type: &ColumnType,
    nullable: bool,
) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {} {} {}",
        table.quoted(),
        quote_ident(column),
        column_type,
        if nullable { "NULL" } else { "NOT NULL" }
    )
}

pub fn add_default_constraint(
    table: &QualifiedName,
    constraint: &str,
    column: &str,
    default: &DefaultValue,
    column_type: &ColumnType,
) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {} FOR {}",
        table.quoted(),
        quote_ident(constraint),
        default_clause(default, column_type.family()),
        quote_ident(column)
    )
}

pub fn drop_column(table: &QualifiedName, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        table.quoted(),
        quote_ident(column)
    )
}

// ============================================================================
// HELPERS
// ============================================================================

fn column_list<'a>(columns: impl Iterator<Item = &'a str>) -> String {
    columns.map(quote_ident).collect::<Vec<_>>().join(", ")
}

fn key_list(columns: &[KeyColumn]) -> String {
    columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.order.keyword()))
        .collect::<Vec<_>>()
        .join(", ")
}
