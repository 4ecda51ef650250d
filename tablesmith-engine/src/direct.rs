//! In-place alterations: rename, retype and delete.
//!
//! Each runs a short statement sequence inside one transaction and settles
//! it with a commit or a rollback.

use crate::log::LogSink;
use crate::txn;
use tablesmith_catalog::find_default_constraint;
use tablesmith_core::{ColumnChange, EngineConfig, QualifiedName, TablesmithResult};
use tablesmith_ddl::statements;
use tablesmith_session::{Session, Value};

pub(crate) async fn rename_column<S, L>(
    session: &mut S,
    sink: &L,
    table: &QualifiedName,
    column: &str,
    new_name: &str,
) -> TablesmithResult<()>
where
    S: Session + ?Sized,
    L: LogSink + ?Sized,
{
    if column == new_name {
        tracing::debug!(table = %table, column, "rename to the same name skipped");
        return Ok(());
    }

    txn::open(session, sink).await?;
    let params = statements::rename_column_params(table, column, new_name).map(Value::Text);
    let outcome = txn::execute(session, statements::RENAME_COLUMN, &params).await;
    txn::settle(session, sink, outcome).await
}

pub(crate) async fn modify_column<S, L>(
    session: &mut S,
    sink: &L,
    config: &EngineConfig,
    table: &QualifiedName,
    column: &str,
    change: &ColumnChange,
) -> TablesmithResult<()>
where
    S: Session + ?Sized,
    L: LogSink + ?Sized,
{
    txn::open(session, sink).await?;
    let outcome = modify_steps(session, config, table, column, change).await;
    txn::settle(session, sink, outcome).await
}

async fn modify_steps<S: Session + ?Sized>(
    session: &mut S,
    config: &EngineConfig,
    table: &QualifiedName,
    column: &str,
    change: &ColumnChange,
) -> TablesmithResult<()> {
    // A bound default blocks ALTER COLUMN.
    drop_bound_default(session, table, column).await?;

    let alter = statements::alter_column(table, column, &change.column_type, change.nullable);
    txn::execute(session, &alter, &[]).await?;

    if let Some(default) = &change.default {
        let constraint = config.default_constraint_name(&table.table, column);
        let add = statements::add_default_constraint(
            table,
            &constraint,
            column,
            default,
            &change.column_type,
        );
        txn::execute(session, &add, &[]).await?;
    }
    Ok(())
}

pub(crate) async fn delete_column<S, L>(
    session: &mut S,
    sink: &L,
    table: &QualifiedName,
    column: &str,
) -> TablesmithResult<()>
where
    S: Session + ?Sized,
    L: LogSink + ?Sized,
{
    txn::open(session, sink).await?;
    let outcome = async {
        drop_bound_default(session, table, column).await?;
        txn::execute(session, &statements::drop_column(table, column), &[]).await
    }
    .await;
    txn::settle(session, sink, outcome).await
}

async fn drop_bound_default<S: Session + ?Sized>(
    session: &mut S,
    table: &QualifiedName,
    column: &str,
) -> TablesmithResult<()> {
    if let Some(name) = find_default_constraint(session, table, column).await? {
        tracing::debug!(table = %table, column, constraint = %name, "dropping bound default");
        txn::execute(session, &statements::drop_constraint(table, &name), &[]).await?;
    }
    Ok(())
}
