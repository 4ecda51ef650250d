//! Orchestrator tests: validation, session checks, and the direct-alter paths
//!
//! Every rejection here must happen before the session sees anything.

use tablesmith_catalog::queries;
use tablesmith_core::{
    Anchor, BaseType, ColumnChange, ColumnSpec, ColumnType, ConnectionError, DefaultValue,
    EngineConfig, ErrorKind, MutationPlan, QualifiedName, TablesmithError, ValidationError,
};
use tablesmith_engine::{LogLevel, MemorySink, Orchestrator};
use tablesmith_session::{MockSession, RowSet, SessionEvent, Value};
use tablesmith_test_utils::fixtures::*;

fn orchestrator(session: &MockSession) -> Orchestrator<MockSession, MemorySink> {
    let mut orchestrator = Orchestrator::new(MemorySink::new());
    orchestrator.attach_session(session.clone());
    orchestrator
}

fn default_constraint(name: &str) -> RowSet {
    RowSet::new(&["constraint_name"]).with_row(vec![name.into()])
}

fn amount_change(default: Option<DefaultValue>) -> ColumnChange {
    ColumnChange {
        column_type: ColumnType::with_parameters(BaseType::Decimal, "12,2"),
        nullable: false,
        default,
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

#[tokio::test]
async fn test_validation_happens_before_any_session_call() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    let blank = ColumnSpec::new("  ", ColumnType::new(BaseType::Int));
    let err = orchestrator
        .add_columns(&orders_table(), vec![blank])
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = orchestrator
        .add_columns(&orders_table(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TablesmithError::Validation(ValidationError::RequiredFieldMissing { ref field }) if field == "columns"
    ));

    let twice = vec![currency_spec(), currency_spec()];
    let err = orchestrator
        .add_columns(&orders_table(), twice)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TablesmithError::Validation(ValidationError::DuplicateColumn { .. })
    ));

    let err = orchestrator
        .rename_column(&orders_table(), "Amount", "")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = orchestrator
        .delete_column(&orders_table(), "")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert!(session.events().is_empty());
    assert_eq!(orchestrator.sink().messages_at(LogLevel::Error).len(), 5);
    assert!(orchestrator.last_report().is_none());
}

#[tokio::test]
async fn test_no_table_targeted() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    for table in [
        QualifiedName::new("", "Orders"),
        QualifiedName::new("dbo", " "),
    ] {
        let err = orchestrator
            .add_columns(&table, vec![currency_spec()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TablesmithError::Validation(ValidationError::NoTableTargeted)
        ));
        let err = orchestrator.list_columns(&table).await.unwrap_err();
        assert!(err.is_validation());
    }
    assert!(session.events().is_empty());
}

#[tokio::test]
async fn test_missing_or_closed_session() {
    let mut orchestrator: Orchestrator<MockSession, MemorySink> =
        Orchestrator::new(MemorySink::new());
    let err = orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TablesmithError::Connection(ConnectionError::NoSession)
    ));
    assert!(orchestrator.list_schemas().await.is_err());

    let session = orders_session();
    session.set_open(false);
    orchestrator.attach_session(session.clone());
    let err = orchestrator
        .delete_column(&orders_table(), "Amount")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TablesmithError::Connection(ConnectionError::SessionClosed)
    ));
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(session.events().is_empty());

    assert!(orchestrator.detach_session().is_some());
    assert!(orchestrator.session().is_none());
}

#[tokio::test]
async fn test_validation_is_checked_before_session() {
    let mut orchestrator: Orchestrator<MockSession, MemorySink> =
        Orchestrator::new(MemorySink::new());
    let err = orchestrator
        .add_columns(&orders_table(), Vec::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_with_config_rejects_invalid_config() {
    let config = EngineConfig {
        shadow_suffix: "]".to_string(),
        ..EngineConfig::default()
    };
    let result: Result<Orchestrator<MockSession, MemorySink>, _> =
        Orchestrator::with_config(MemorySink::new(), config);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_custom_shadow_suffix() {
    let session = orders_session();
    let config = EngineConfig {
        shadow_suffix: "__rebuild".to_string(),
        ..EngineConfig::default()
    };
    let mut orchestrator = Orchestrator::with_config(MemorySink::new(), config).unwrap();
    orchestrator.attach_session(session.clone());

    orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap();
    assert_eq!(
        session.executed()[0],
        "SELECT * INTO [dbo].[Orders__rebuild] FROM [dbo].[Orders]"
    );
}

// ============================================================================
// READS
// ============================================================================

#[tokio::test]
async fn test_reads_go_through_attached_session() {
    let session = orders_session();
    session
        .respond(
            queries::LIST_SCHEMAS,
            RowSet::new(&["schema_name"])
                .with_row(vec!["db_owner".into()])
                .with_row(vec!["dbo".into()])
                .with_row(vec!["sales".into()]),
        )
        .respond(
            queries::LIST_TABLES,
            RowSet::new(&["table_name"]).with_row(vec!["Orders".into()]),
        );
    let mut orchestrator = orchestrator(&session);

    assert_eq!(orchestrator.list_schemas().await.unwrap(), vec!["dbo", "sales"]);
    assert_eq!(orchestrator.list_tables("dbo").await.unwrap(), vec!["Orders"]);
    assert!(orchestrator.list_tables("").await.unwrap_err().is_validation());

    let columns = orchestrator.list_columns(&orders_table()).await.unwrap();
    assert_eq!(columns.len(), 2);
    assert!(session.transaction_events().is_empty());
}

// ============================================================================
// RENAME
// ============================================================================

#[tokio::test]
async fn test_rename_binds_names_as_parameters() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    orchestrator
        .rename_column(&orders_table(), "Amount", "Total]; DROP TABLE x; --")
        .await
        .unwrap();

    assert_eq!(
        session.executed_with_params(),
        vec![(
            "EXEC sp_rename @P1, @P2, 'COLUMN'".to_string(),
            vec![
                Value::Text("[dbo].[Orders].[Amount]".to_string()),
                Value::Text("Total]; DROP TABLE x; --".to_string()),
            ]
        )]
    );
    assert_eq!(
        session.transaction_events(),
        vec![SessionEvent::Begin, SessionEvent::Commit]
    );
}

#[tokio::test]
async fn test_rename_to_same_name_is_noop() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    let columns = orchestrator
        .rename_column(&orders_table(), "Amount", "Amount")
        .await
        .unwrap();

    assert_eq!(columns.len(), 2);
    assert!(session.executed().is_empty());
    assert!(session.transaction_events().is_empty());
}

#[tokio::test]
async fn test_rename_failure_rolls_back() {
    let session = orders_session();
    session.fail_on("sp_rename", "Either the parameter @objname is ambiguous");
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .rename_column(&orders_table(), "Amount", "Total")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DdlExecution);
    assert_eq!(
        session.transaction_events(),
        vec![SessionEvent::Begin, SessionEvent::Rollback]
    );
    assert_eq!(
        orchestrator.sink().messages_at(LogLevel::Warn),
        vec!["Transaction rolled back"]
    );
}

// ============================================================================
// MODIFY
// ============================================================================

#[tokio::test]
async fn test_modify_drops_bound_default_before_alter() {
    let session = orders_session();
    session.respond(
        queries::DEFAULT_CONSTRAINT,
        default_constraint("DF__Orders__Amoun__1A2B"),
    );
    let mut orchestrator = orchestrator(&session);

    orchestrator
        .modify_column(
            &orders_table(),
            "Amount",
            amount_change(Some(DefaultValue::Literal("0".to_string()))),
        )
        .await
        .unwrap();

    assert_eq!(
        session.executed(),
        vec![
            "ALTER TABLE [dbo].[Orders] DROP CONSTRAINT [DF__Orders__Amoun__1A2B]",
            "ALTER TABLE [dbo].[Orders] ALTER COLUMN [Amount] decimal(12,2) NOT NULL",
            "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [DF_Orders_Amount] DEFAULT 0 FOR [Amount]",
        ]
    );
    assert_eq!(
        session.transaction_events(),
        vec![SessionEvent::Begin, SessionEvent::Commit]
    );
}

#[tokio::test]
async fn test_modify_without_defaults() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    orchestrator
        .modify_column(&orders_table(), "Amount", amount_change(None))
        .await
        .unwrap();
    assert_eq!(
        session.executed(),
        vec!["ALTER TABLE [dbo].[Orders] ALTER COLUMN [Amount] decimal(12,2) NOT NULL"]
    );
}

#[tokio::test]
async fn test_modify_text_default_is_quoted() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    let change = ColumnChange {
        column_type: ColumnType::with_parameters(BaseType::NVarChar, "20"),
        nullable: true,
        default: Some(DefaultValue::infer("O'Brien")),
    };
    orchestrator
        .modify_column(&orders_table(), "Customer", change)
        .await
        .unwrap();
    assert_eq!(
        session.executed()[1],
        "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [DF_Orders_Customer] DEFAULT N'O''Brien' FOR [Customer]"
    );
}

#[tokio::test]
async fn test_modify_rejects_bad_numeric_default() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .modify_column(
            &orders_table(),
            "Amount",
            amount_change(Some(DefaultValue::Literal("0); DROP TABLE t; --".to_string()))),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(session.events().is_empty());
}

#[tokio::test]
async fn test_modify_failure_rolls_back() {
    let session = orders_session();
    session.fail_on("ALTER COLUMN", "Arithmetic overflow");
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .modify_column(&orders_table(), "Amount", amount_change(None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DdlExecution);
    assert_eq!(session.events().last(), Some(&SessionEvent::Rollback));
    assert!(!session.in_transaction());
}

// ============================================================================
// DELETE
// ============================================================================

#[tokio::test]
async fn test_delete_drops_default_then_column() {
    let session = orders_session();
    session.respond(
        queries::DEFAULT_CONSTRAINT,
        default_constraint("DF_Orders_Currency"),
    );
    let mut orchestrator = orchestrator(&session);

    orchestrator
        .delete_column(&orders_table(), "Currency")
        .await
        .unwrap();
    assert_eq!(
        session.executed(),
        vec![
            "ALTER TABLE [dbo].[Orders] DROP CONSTRAINT [DF_Orders_Currency]",
            "ALTER TABLE [dbo].[Orders] DROP COLUMN [Currency]",
        ]
    );
}

#[tokio::test]
async fn test_delete_failure_rolls_back() {
    let session = orders_session();
    session.fail_on("DROP COLUMN", "The object 'IX_Orders_Id' is dependent on column 'Id'");
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .delete_column(&orders_table(), "Id")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DdlExecution);
    assert_eq!(
        session.transaction_events(),
        vec![SessionEvent::Begin, SessionEvent::Rollback]
    );
    assert_eq!(orchestrator.sink().messages_at(LogLevel::Error).len(), 1);
}

// ============================================================================
// PLANS
// ============================================================================

#[tokio::test]
async fn test_apply_add_at_start_plan() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    let plan = MutationPlan::AddColumns {
        specs: vec![ColumnSpec::new("Note", ColumnType::with_parameters(BaseType::NVarChar, "max"))
            .with_anchor(Anchor::AtStart)],
    };
    assert!(plan.requires_rebuild());
    orchestrator.apply(&orders_table(), &plan).await.unwrap();

    let create = session
        .executed()
        .into_iter()
        .find(|s| s.starts_with("CREATE TABLE"))
        .unwrap();
    assert!(create.starts_with("CREATE TABLE [dbo].[Orders] (\n    [Note] nvarchar(max),\n    [Id] int NOT NULL"));
}
