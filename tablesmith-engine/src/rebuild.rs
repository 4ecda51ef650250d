//! The table rebuild.
//!
//! Adding columns at arbitrary positions cannot be expressed as an in-place
//! alteration, so the table is copied aside, dropped, recreated from its
//! captured definition with the new columns merged in, refilled, and has
//! every dependent object replayed onto it. All of it runs inside one
//! transaction: the only exits are `Committed` and `Aborted`.
//!
//! A state is entered once its step has completed.

use crate::log::{LogLevel, LogSink};
use crate::txn;
use tablesmith_catalog::{
    capture_inbound_foreign_keys, capture_permissions, capture_table_structure,
    ensure_rebuild_supported,
};
use tablesmith_core::{
    ColumnSpec, EngineConfig, QualifiedName, RebuildState, TableSnapshot, TablesmithResult,
};
use tablesmith_ddl::{merge_columns_into_table_text, statements};
use tablesmith_session::Session;

/// Types whose values cannot be inserted explicitly.
const SERVER_GENERATED_TYPES: &[&str] = &["timestamp", "rowversion"];

/// What a rebuild went through, recorded whether it committed or aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub table: QualifiedName,
    pub states_visited: Vec<RebuildState>,
    pub statements_executed: usize,
}

impl RebuildReport {
    fn new(table: QualifiedName) -> Self {
        Self {
            table,
            states_visited: vec![RebuildState::Idle],
            statements_executed: 0,
        }
    }

    pub fn final_state(&self) -> RebuildState {
        self.states_visited
            .last()
            .copied()
            .unwrap_or(RebuildState::Idle)
    }

    pub fn committed(&self) -> bool {
        self.final_state() == RebuildState::Committed
    }
}

pub(crate) struct Rebuild<'a, S: Session + ?Sized, L: LogSink + ?Sized> {
    session: &'a mut S,
    sink: &'a L,
    table: QualifiedName,
    shadow: QualifiedName,
    state: RebuildState,
    report: RebuildReport,
}

impl<'a, S, L> Rebuild<'a, S, L>
where
    S: Session + ?Sized,
    L: LogSink + ?Sized,
{
    pub(crate) fn new(
        session: &'a mut S,
        sink: &'a L,
        config: &EngineConfig,
        table: QualifiedName,
    ) -> Self {
        let shadow = table.with_table(config.shadow_table_name(&table.table));
        Self {
            session,
            sink,
            report: RebuildReport::new(table.clone()),
            table,
            shadow,
            state: RebuildState::Idle,
        }
    }

    /// Run the rebuild to `Committed` or `Aborted`.
    pub(crate) async fn run(
        mut self,
        specs: &[ColumnSpec],
    ) -> (RebuildReport, TablesmithResult<()>) {
        if let Err(e) = txn::open(self.session, self.sink).await {
            self.enter(RebuildState::Aborted);
            return (self.report, Err(e));
        }

        let outcome = match self.forward(specs).await {
            Ok(()) => txn::commit(self.session).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.enter(RebuildState::Committed);
                (self.report, Ok(()))
            }
            Err(cause) => {
                tracing::error!(table = %self.table, state = %self.state, "rebuild failed");
                let error = txn::abort(self.session, self.sink, cause).await;
                self.enter(RebuildState::Aborted);
                (self.report, Err(error))
            }
        }
    }

    fn enter(&mut self, next: RebuildState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal rebuild transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        self.report.states_visited.push(next);
        tracing::info!(table = %self.table, state = %next, "rebuild state");
        self.sink
            .append(LogLevel::Info, &format!("{}: {}", self.table, next));
    }

    async fn exec(&mut self, sql: &str) -> TablesmithResult<()> {
        txn::execute(self.session, sql, &[]).await?;
        self.report.statements_executed += 1;
        Ok(())
    }

    async fn exec_all<'s>(
        &mut self,
        scripts: impl IntoIterator<Item = &'s String>,
    ) -> TablesmithResult<()> {
        for script in scripts {
            self.exec(script).await?;
        }
        Ok(())
    }

    async fn forward(&mut self, specs: &[ColumnSpec]) -> TablesmithResult<()> {
        ensure_rebuild_supported(self.session, &self.table).await?;

        self.exec(&statements::copy_to_shadow(&self.table, &self.shadow))
            .await?;
        self.enter(RebuildState::TempCopy);

        let inbound = capture_inbound_foreign_keys(self.session, &self.table).await?;
        self.exec_all(inbound.iter().map(|fk| &fk.drop_script)).await?;
        self.enter(RebuildState::FkDetached);

        let permissions = capture_permissions(self.session, &self.table).await?;
        self.enter(RebuildState::PermissionsCaptured);

        let mut snapshot = capture_table_structure(self.session, &self.table).await?;
        snapshot.inbound_foreign_keys = inbound;
        snapshot.permissions = permissions;
        self.enter(RebuildState::DdlCaptured);

        self.exec(&statements::drop_table(&self.table)).await?;
        self.enter(RebuildState::OriginalDropped);

        let definition = merge_columns_into_table_text(&snapshot.definition, specs)?;
        self.exec(&definition).await?;
        self.enter(RebuildState::Rebuilt);

        self.restore_rows(&snapshot).await?;
        self.enter(RebuildState::DataRestored);

        self.exec(&statements::drop_table(&self.shadow)).await?;
        self.enter(RebuildState::TempDropped);

        self.restore_objects(&snapshot).await?;
        self.enter(RebuildState::ObjectsRestored);
        Ok(())
    }

    async fn restore_rows(&mut self, snapshot: &TableSnapshot) -> TablesmithResult<()> {
        let columns: Vec<&str> = snapshot
            .columns
            .iter()
            .filter(|c| {
                !c.is_computed()
                    && !SERVER_GENERATED_TYPES
                        .iter()
                        .any(|t| c.type_text.eq_ignore_ascii_case(t))
            })
            .map(|c| c.name.as_str())
            .collect();
        let insert = statements::restore_from_shadow(&self.table, &self.shadow, &columns);

        if snapshot.has_identity() {
            self.exec(&statements::identity_insert(&self.table, true))
                .await?;
            self.exec(&insert).await?;
            self.exec(&statements::identity_insert(&self.table, false))
                .await
        } else {
            self.exec(&insert).await
        }
    }

    /// Indexes, then checks, then outbound keys, then inbound keys, then
    /// permissions.
    async fn restore_objects(&mut self, snapshot: &TableSnapshot) -> TablesmithResult<()> {
        self.exec_all(&snapshot.index_scripts).await?;
        self.exec_all(&snapshot.check_scripts).await?;
        self.exec_all(&snapshot.outbound_fk_scripts).await?;
        self.exec_all(snapshot.inbound_foreign_keys.iter().map(|fk| &fk.recreate_script))
            .await?;
        self.exec_all(snapshot.permissions.iter().map(|p| &p.recreate_script))
            .await
    }
}
