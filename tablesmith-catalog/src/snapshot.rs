//! Table snapshot capture.
//!
//! A snapshot holds everything needed to recreate a table after it has been
//! dropped: the definition text plus scripts for every dependent object.

use crate::queries;
use crate::reader::{fetch, field, list_columns, table_exists, table_params};
use tablesmith_core::{
    CheckConstraint, ForeignKey, IndexDefinition, IndexKind, InboundForeignKey, KeyColumn,
    MetadataError, Permission, PermissionGrant, PermissionState, PrimaryKey, QualifiedName,
    ReferentialAction, SortOrder, TableSnapshot, TablesmithResult,
};
use tablesmith_ddl::{statements, table_definition};
use tablesmith_session::{Row, Session};

// ============================================================================
// KEYS AND INDEXES
// ============================================================================

pub async fn capture_primary_key<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<Option<PrimaryKey>>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "primary_key",
        queries::PRIMARY_KEY,
        &table_params(table),
    )
    .await?;

    let mut primary_key: Option<PrimaryKey> = None;
    for row in rows.rows() {
        let column = KeyColumn::new(
            field::<String>(row, "column_name")?,
            SortOrder::from_descending_flag(field(row, "is_descending_key")?),
        );
        match primary_key.as_mut() {
            Some(pk) => pk.columns.push(column),
            None => {
                primary_key = Some(PrimaryKey {
                    name: field(row, "constraint_name")?,
                    clustered: field(row, "is_clustered")?,
                    columns: vec![column],
                })
            }
        }
    }
    Ok(primary_key)
}

/// Non-primary-key indexes, grouped from one row per index column.
pub async fn capture_indexes<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<Vec<IndexDefinition>>
where
    S: Session + ?Sized,
{
    let rows = fetch(session, "indexes", queries::INDEXES, &table_params(table)).await?;

    let mut indexes: Vec<IndexDefinition> = Vec::new();
    for row in rows.rows() {
        let name: String = field(row, "index_name")?;
        if indexes.last().map(|i| &i.name) != Some(&name) {
            let filter: Option<String> = field(row, "filter_definition")?;
            let code: i32 = field(row, "index_type")?;
            let kind = IndexKind::from_type_code(code).ok_or_else(|| {
                MetadataError::UnexpectedValue {
                    column: "index_type".to_string(),
                    reason: format!("index {name} has unsupported type {code}"),
                }
            })?;
            indexes.push(IndexDefinition {
                name,
                kind,
                unique: field(row, "is_unique")?,
                clustered: field(row, "is_clustered")?,
                is_unique_constraint: field(row, "is_unique_constraint")?,
                key_columns: Vec::new(),
                included_columns: Vec::new(),
                filter,
            });
        }
        let Some(index) = indexes.last_mut() else {
            continue;
        };
        let Some(column) = field::<Option<String>>(row, "column_name")? else {
            continue;
        };
        if field::<bool>(row, "is_included_column")? {
            index.included_columns.push(column);
        } else {
            index.key_columns.push(KeyColumn::new(
                column,
                SortOrder::from_descending_flag(field(row, "is_descending_key")?),
            ));
        }
    }
    Ok(indexes)
}

/// Fail with [`MetadataError::UnsupportedObject`] if `table` carries an
/// index the rebuild would drop without being able to recreate.
pub async fn ensure_rebuild_supported<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<()>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "unsupported_indexes",
        queries::UNSUPPORTED_INDEXES,
        &table_params(table),
    )
    .await?;
    let Some(row) = rows.rows().first() else {
        return Ok(());
    };
    let name: String = field(row, "index_name")?;
    let type_desc: String = field(row, "type_desc")?;
    Err(MetadataError::UnsupportedObject {
        schema: table.schema.clone(),
        table: table.table.clone(),
        object: format!("{} index [{name}]", type_desc.to_lowercase().replace('_', " ")),
    }
    .into())
}

pub async fn capture_checks<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<Vec<CheckConstraint>>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "check_constraints",
        queries::CHECK_CONSTRAINTS,
        &table_params(table),
    )
    .await?;
    rows.rows()
        .iter()
        .map(|row| {
            Ok(CheckConstraint {
                name: field(row, "constraint_name")?,
                definition: field(row, "definition")?,
            })
        })
        .collect()
}

// ============================================================================
// FOREIGN KEYS
// ============================================================================

fn referential_action(row: &Row, column: &str) -> TablesmithResult<ReferentialAction> {
    let text: String = field(row, column)?;
    ReferentialAction::from_db_str(&text).ok_or_else(|| {
        MetadataError::UnexpectedValue {
            column: column.to_string(),
            reason: format!("unknown referential action '{text}'"),
        }
        .into()
    })
}

/// Group one-row-per-column foreign key results into keys.
fn decode_foreign_keys(rows: &[Row]) -> TablesmithResult<Vec<ForeignKey>> {
    let mut keys: Vec<ForeignKey> = Vec::new();
    for row in rows {
        let name: String = field(row, "constraint_name")?;
        let parent = QualifiedName::new(
            field::<String>(row, "parent_schema")?,
            field::<String>(row, "parent_table")?,
        );
        let continues = keys
            .last()
            .is_some_and(|k| k.name == name && k.parent == parent);
        if !continues {
            keys.push(ForeignKey {
                name,
                parent,
                parent_columns: Vec::new(),
                referenced: QualifiedName::new(
                    field::<String>(row, "referenced_schema")?,
                    field::<String>(row, "referenced_table")?,
                ),
                referenced_columns: Vec::new(),
                on_delete: referential_action(row, "on_delete")?,
                on_update: referential_action(row, "on_update")?,
            });
        }
        if let Some(key) = keys.last_mut() {
            key.parent_columns.push(field(row, "parent_column")?);
            key.referenced_columns.push(field(row, "referenced_column")?);
        }
    }
    Ok(keys)
}

/// Foreign keys declared on `table`.
pub async fn capture_outbound_foreign_keys<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<Vec<ForeignKey>>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "outbound_foreign_keys",
        queries::OUTBOUND_FOREIGN_KEYS,
        &table_params(table),
    )
    .await?;
    decode_foreign_keys(rows.rows())
}

/// Foreign keys on other tables that reference `table`, with the scripts to
/// drop and recreate them.
pub async fn capture_inbound_foreign_keys<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<Vec<InboundForeignKey>>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "inbound_foreign_keys",
        queries::INBOUND_FOREIGN_KEYS,
        &table_params(table),
    )
    .await?;
    Ok(decode_foreign_keys(rows.rows())?
        .into_iter()
        .map(|key| InboundForeignKey {
            drop_script: statements::drop_constraint(&key.parent, &key.name),
            recreate_script: statements::add_foreign_key(&key),
            key,
        })
        .collect())
}

// ============================================================================
// PERMISSIONS
// ============================================================================

/// Explicit grants and denies on `table`, with revoke and recreate scripts.
/// Column-level entries for the same grantee, permission and state are
/// folded into one grant.
pub async fn capture_permissions<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<Vec<PermissionGrant>>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "permissions",
        queries::PERMISSIONS,
        &table_params(table),
    )
    .await?;

    let mut permissions: Vec<Permission> = Vec::new();
    for row in rows.rows() {
        let state_desc: String = field(row, "state_desc")?;
        let state = PermissionState::from_db_str(&state_desc).ok_or_else(|| {
            MetadataError::UnexpectedValue {
                column: "state_desc".to_string(),
                reason: format!("unknown permission state '{state_desc}'"),
            }
        })?;
        let permission_name: String = field(row, "permission_name")?;
        let grantee: String = field(row, "grantee")?;
        let column: Option<String> = field(row, "column_name")?;

        let extends_last = column.is_some()
            && permissions.last().is_some_and(|last| {
                !last.columns.is_empty()
                    && last.grantee == grantee
                    && last.permission_name == permission_name
                    && last.state == state
            });
        if !extends_last {
            permissions.push(Permission {
                permission_name,
                state,
                grantee,
                columns: column.into_iter().collect(),
            });
        } else if let (Some(column), Some(last)) = (column, permissions.last_mut()) {
            last.columns.push(column);
        }
    }

    Ok(permissions
        .into_iter()
        .map(|permission| PermissionGrant {
            revoke_script: statements::revoke_script(table, &permission),
            recreate_script: statements::grant_script(table, &permission),
            permission,
        })
        .collect())
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Capture the table's own structure: columns, definition text, indexes,
/// checks and outbound foreign keys. Inbound keys and permissions are left
/// empty.
pub async fn capture_table_structure<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<TableSnapshot>
where
    S: Session + ?Sized,
{
    if !table_exists(session, table).await? {
        return Err(MetadataError::TableNotFound {
            schema: table.schema.clone(),
            table: table.table.clone(),
        }
        .into());
    }

    let columns = list_columns(session, table).await?;
    let primary_key = capture_primary_key(session, table).await?;
    let indexes = capture_indexes(session, table).await?;
    let checks = capture_checks(session, table).await?;
    let outbound = capture_outbound_foreign_keys(session, table).await?;

    tracing::debug!(
        table = %table,
        columns = columns.len(),
        indexes = indexes.len(),
        checks = checks.len(),
        foreign_keys = outbound.len(),
        "captured table structure"
    );

    Ok(TableSnapshot {
        name: table.clone(),
        definition: table_definition(table, &columns, primary_key.as_ref()),
        columns,
        primary_key,
        index_scripts: indexes
            .iter()
            .map(|index| statements::create_index(table, index))
            .collect(),
        check_scripts: checks
            .iter()
            .map(|check| statements::add_check_constraint(table, check))
            .collect(),
        outbound_fk_scripts: outbound.iter().map(statements::add_foreign_key).collect(),
        inbound_foreign_keys: Vec::new(),
        permissions: Vec::new(),
    })
}

/// Capture the full snapshot, including inbound foreign keys and
/// permissions.
pub async fn capture_table_snapshot<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<TableSnapshot>
where
    S: Session + ?Sized,
{
    let mut snapshot = capture_table_structure(session, table).await?;
    snapshot.inbound_foreign_keys = capture_inbound_foreign_keys(session, table).await?;
    snapshot.permissions = capture_permissions(session, table).await?;
    Ok(snapshot)
}
