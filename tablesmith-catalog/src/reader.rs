//! Schema, table and column listings.

use crate::queries;
use tablesmith_core::{Computed, ExistingColumn, Identity, QualifiedName, TablesmithResult};
use tablesmith_ddl::{type_text, unwrap_default_definition};
use tablesmith_session::{FromValue, Row, RowSet, Session, Value};

/// Run a catalog query, attributing any failure to `name`.
pub(crate) async fn fetch<S>(
    session: &mut S,
    name: &str,
    sql: &str,
    params: &[Value],
) -> TablesmithResult<RowSet>
where
    S: Session + ?Sized,
{
    tracing::debug!(query = name, "running catalog query");
    session.query(sql, params).await.map_err(|e| {
        tracing::error!(query = name, error = %e, "catalog query failed");
        e.into_metadata_error(name)
    })
}

/// Decode one cell of a catalog row.
pub(crate) fn field<T: FromValue>(row: &Row, column: &str) -> TablesmithResult<T> {
    row.get(column).map_err(|e| e.into_metadata_error(column))
}

pub(crate) fn table_params(table: &QualifiedName) -> [Value; 2] {
    [
        Value::from(table.schema.as_str()),
        Value::from(table.table.as_str()),
    ]
}

/// User schemas, sorted, without the `excluded` built-in ones.
pub async fn list_schemas<S>(session: &mut S, excluded: &[String]) -> TablesmithResult<Vec<String>>
where
    S: Session + ?Sized,
{
    let rows = fetch(session, "list_schemas", queries::LIST_SCHEMAS, &[]).await?;
    let mut schemas = Vec::with_capacity(rows.len());
    for row in rows.rows() {
        let name: String = field(row, "schema_name")?;
        if !excluded.iter().any(|e| e.eq_ignore_ascii_case(&name)) {
            schemas.push(name);
        }
    }
    Ok(schemas)
}

/// Table names in `schema`, sorted.
pub async fn list_tables<S>(session: &mut S, schema: &str) -> TablesmithResult<Vec<String>>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "list_tables",
        queries::LIST_TABLES,
        &[Value::from(schema)],
    )
    .await?;
    rows.rows().iter().map(|row| field(row, "table_name")).collect()
}

pub async fn table_exists<S>(session: &mut S, table: &QualifiedName) -> TablesmithResult<bool>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "table_exists",
        queries::TABLE_EXISTS,
        &table_params(table),
    )
    .await?;
    Ok(!rows.is_empty())
}

/// Columns of `table` in ordinal order.
pub async fn list_columns<S>(
    session: &mut S,
    table: &QualifiedName,
) -> TablesmithResult<Vec<ExistingColumn>>
where
    S: Session + ?Sized,
{
    let rows = fetch(
        session,
        "list_columns",
        queries::LIST_COLUMNS,
        &table_params(table),
    )
    .await?;
    rows.rows().iter().map(decode_column).collect()
}

fn decode_column(row: &Row) -> TablesmithResult<ExistingColumn> {
    let type_name: String = field(row, "type_name")?;
    let max_length: i32 = field(row, "max_length")?;
    let precision: i32 = field(row, "precision")?;
    let scale: i32 = field(row, "scale")?;
    let default: Option<String> = field(row, "default_definition")?;
    let seed: Option<String> = field(row, "identity_seed")?;
    let increment: Option<String> = field(row, "identity_increment")?;
    let computed: Option<String> = field(row, "computed_definition")?;
    let persisted: Option<bool> = field(row, "is_persisted")?;

    Ok(ExistingColumn {
        name: field(row, "column_name")?,
        type_text: type_text(&type_name, max_length, precision, scale),
        nullable: field(row, "is_nullable")?,
        default_definition: default
            .map(|d| unwrap_default_definition(&d))
            .unwrap_or_default(),
        default_constraint: field(row, "default_constraint")?,
        ordinal_position: field(row, "ordinal_position")?,
        identity: seed.zip(increment).map(|(seed, increment)| Identity { seed, increment }),
        computed: computed.map(|definition| Computed {
            definition,
            persisted: persisted.unwrap_or(false),
        }),
    })
}

/// Name of the default constraint bound to `column`, if any.
pub async fn find_default_constraint<S>(
    session: &mut S,
    table: &QualifiedName,
    column: &str,
) -> TablesmithResult<Option<String>>
where
    S: Session + ?Sized,
{
    let [schema, name] = table_params(table);
    let rows = fetch(
        session,
        "find_default_constraint",
        queries::DEFAULT_CONSTRAINT,
        &[schema, name, Value::from(column)],
    )
    .await?;
    rows.rows()
        .first()
        .map(|row| field(row, "constraint_name"))
        .transpose()
}
