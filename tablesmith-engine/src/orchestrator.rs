//! Request surface for the presentation layer.

use crate::direct;
use crate::log::LogSink;
use crate::rebuild::{Rebuild, RebuildReport};
use crate::txn;
use tablesmith_catalog::{list_columns, list_schemas, list_tables};
use tablesmith_core::{
    ColumnChange, ColumnSpec, ConnectionError, EngineConfig, ExistingColumn, MutationPlan,
    QualifiedName, TablesmithError, TablesmithResult, ValidationError,
};
use tablesmith_session::Session;

/// Column mutation orchestrator.
///
/// Owns at most one session. Every request takes `&mut self`, so one
/// instance never has two mutations in flight. Mutations return the
/// table's refreshed column list on success.
pub struct Orchestrator<S: Session, L: LogSink> {
    /// Attached database session
    session: Option<S>,
    /// Receives state transitions, errors and rollback attempts
    sink: L,
    /// Naming and filtering knobs
    config: EngineConfig,
    /// Report of the most recent rebuild, committed or not
    last_report: Option<RebuildReport>,
}

impl<S: Session, L: LogSink> Orchestrator<S, L> {
    /// Create an orchestrator with the default configuration and no session.
    pub fn new(sink: L) -> Self {
        Self {
            session: None,
            sink,
            config: EngineConfig::default(),
            last_report: None,
        }
    }

    /// Create an orchestrator with a validated configuration.
    pub fn with_config(sink: L, config: EngineConfig) -> TablesmithResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(sink)
        })
    }

    /// Attach a session, returning the one it replaces.
    pub fn attach_session(&mut self, session: S) -> Option<S> {
        self.session.replace(session)
    }

    pub fn detach_session(&mut self) -> Option<S> {
        self.session.take()
    }

    pub fn session(&self) -> Option<&S> {
        self.session.as_ref()
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn last_report(&self) -> Option<&RebuildReport> {
        self.last_report.as_ref()
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// User schemas, without the configured built-in ones.
    pub async fn list_schemas(&mut self) -> TablesmithResult<Vec<String>> {
        let Self {
            session,
            sink,
            config,
            ..
        } = self;
        let session = connected(session.as_mut(), &*sink)?;
        list_schemas(session, &config.excluded_schemas)
            .await
            .map_err(|e| reported(&*sink, e))
    }

    pub async fn list_tables(&mut self, schema: &str) -> TablesmithResult<Vec<String>> {
        let Self { session, sink, .. } = self;
        if schema.trim().is_empty() {
            return Err(reported(&*sink, ValidationError::NoTableTargeted.into()));
        }
        let session = connected(session.as_mut(), &*sink)?;
        list_tables(session, schema)
            .await
            .map_err(|e| reported(&*sink, e))
    }

    pub async fn list_columns(
        &mut self,
        table: &QualifiedName,
    ) -> TablesmithResult<Vec<ExistingColumn>> {
        let Self { session, sink, .. } = self;
        targeted(&*sink, table)?;
        let session = connected(session.as_mut(), &*sink)?;
        refresh(session, &*sink, table).await
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Add columns at their anchors by rebuilding the table.
    pub async fn add_columns(
        &mut self,
        table: &QualifiedName,
        specs: Vec<ColumnSpec>,
    ) -> TablesmithResult<Vec<ExistingColumn>> {
        self.apply(table, &MutationPlan::AddColumns { specs }).await
    }

    /// Rename a column. Renaming to the identical name runs no DDL.
    pub async fn rename_column(
        &mut self,
        table: &QualifiedName,
        column: &str,
        new_name: &str,
    ) -> TablesmithResult<Vec<ExistingColumn>> {
        let plan = MutationPlan::Rename {
            column: column.to_string(),
            new_name: new_name.to_string(),
        };
        self.apply(table, &plan).await
    }

    /// Change a column's type, nullability and default in place.
    pub async fn modify_column(
        &mut self,
        table: &QualifiedName,
        column: &str,
        change: ColumnChange,
    ) -> TablesmithResult<Vec<ExistingColumn>> {
        let plan = MutationPlan::Modify {
            column: column.to_string(),
            change,
        };
        self.apply(table, &plan).await
    }

    /// Drop a column along with its bound default.
    pub async fn delete_column(
        &mut self,
        table: &QualifiedName,
        column: &str,
    ) -> TablesmithResult<Vec<ExistingColumn>> {
        let plan = MutationPlan::Delete {
            column: column.to_string(),
        };
        self.apply(table, &plan).await
    }

    /// Run `plan` against `table`.
    ///
    /// The target, the plan and the session are all checked before any
    /// transaction opens.
    pub async fn apply(
        &mut self,
        table: &QualifiedName,
        plan: &MutationPlan,
    ) -> TablesmithResult<Vec<ExistingColumn>> {
        let Self {
            session,
            sink,
            config,
            last_report,
        } = self;
        let sink = &*sink;

        targeted(sink, table)?;
        plan.validate().map_err(|e| reported(sink, e.into()))?;
        let session = connected(session.as_mut(), sink)?;

        tracing::info!(table = %table, operation = plan.name(), "applying column mutation");
        match plan {
            MutationPlan::AddColumns { specs } => {
                let (report, outcome) = Rebuild::new(&mut *session, sink, config, table.clone())
                    .run(specs)
                    .await;
                tracing::info!(
                    table = %table,
                    final_state = %report.final_state(),
                    statements = report.statements_executed,
                    "rebuild finished"
                );
                *last_report = Some(report);
                outcome?;
            }
            MutationPlan::Rename { column, new_name } => {
                direct::rename_column(&mut *session, sink, table, column, new_name).await?;
            }
            MutationPlan::Modify { column, change } => {
                direct::modify_column(&mut *session, sink, config, table, column, change).await?;
            }
            MutationPlan::Delete { column } => {
                direct::delete_column(&mut *session, sink, table, column).await?;
            }
        }

        refresh(session, sink, table).await
    }
}

fn reported<L: LogSink + ?Sized>(sink: &L, error: TablesmithError) -> TablesmithError {
    txn::report_error(sink, &error);
    error
}

fn targeted<L: LogSink + ?Sized>(sink: &L, table: &QualifiedName) -> TablesmithResult<()> {
    if table.schema.trim().is_empty() || table.table.trim().is_empty() {
        return Err(reported(sink, ValidationError::NoTableTargeted.into()));
    }
    Ok(())
}

fn connected<'s, S, L>(session: Option<&'s mut S>, sink: &L) -> TablesmithResult<&'s mut S>
where
    S: Session,
    L: LogSink + ?Sized,
{
    match session {
        None => Err(reported(sink, ConnectionError::NoSession.into())),
        Some(s) if !s.is_open() => Err(reported(sink, ConnectionError::SessionClosed.into())),
        Some(s) => Ok(s),
    }
}

async fn refresh<S, L>(
    session: &mut S,
    sink: &L,
    table: &QualifiedName,
) -> TablesmithResult<Vec<ExistingColumn>>
where
    S: Session + ?Sized,
    L: LogSink + ?Sized,
{
    list_columns(session, table)
        .await
        .map_err(|e| reported(sink, e))
}
