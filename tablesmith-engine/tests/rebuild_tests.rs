//! Rebuild path tests against a scripted session
//!
//! Covers the Orders scenario end to end, the statement order of a rebuild,
//! and rollback on a failure at every state.

use tablesmith_core::{
    DdlExecutionError, ErrorKind, MetadataError, RebuildState, TablesmithError,
};
use tablesmith_catalog::queries;
use tablesmith_engine::{LogLevel, MemorySink, Orchestrator};
use tablesmith_session::{MockSession, SessionEvent};
use tablesmith_test_utils::fixtures::*;

fn orchestrator(session: &MockSession) -> Orchestrator<MockSession, MemorySink> {
    let mut orchestrator = Orchestrator::new(MemorySink::new());
    orchestrator.attach_session(session.clone());
    orchestrator
}

fn position(executed: &[String], prefix: &str) -> usize {
    executed
        .iter()
        .position(|s| s.starts_with(prefix))
        .unwrap_or_else(|| panic!("no statement starting with {prefix:?} in {executed:#?}"))
}

// ============================================================================
// ORDERS SCENARIO
// ============================================================================

#[tokio::test]
async fn test_orders_add_currency_after_amount() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);

    let columns = orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap();

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Id", "Amount", "Currency"]);
    assert_eq!(columns[2].default_definition, "N'USD'");
    assert!(!columns[2].nullable);

    let executed = session.executed();
    let create = &executed[position(&executed, "CREATE TABLE")];
    assert_eq!(
        create,
        "CREATE TABLE [dbo].[Orders] (\n    \
         [Id] int NOT NULL,\n    \
         [Amount] decimal(10,2) NOT NULL,\n    \
         [Currency] varchar(3) NOT NULL DEFAULT N'USD',\n    \
         CONSTRAINT [PK_Orders] PRIMARY KEY CLUSTERED ([Id] ASC)\n)"
    );
    let restore = "INSERT INTO [dbo].[Orders] ([Id], [Amount]) \
                   SELECT [Id], [Amount] FROM [dbo].[Orders_TEMP]";
    assert!(executed.contains(&restore.to_string()));
    let index = "CREATE NONCLUSTERED INDEX [IX_Orders_Id] ON [dbo].[Orders] ([Id] ASC)";
    assert!(executed.contains(&index.to_string()));

    assert_eq!(
        session.transaction_events(),
        vec![SessionEvent::Begin, SessionEvent::Commit]
    );
    assert!(!session.in_transaction());
}

#[tokio::test]
async fn test_rebuild_statement_order() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);
    orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap();

    let executed = session.executed();
    let order = [
        format!("SELECT * INTO {ORDERS_SHADOW}"),
        "ALTER TABLE [sales].[OrderLines] DROP CONSTRAINT [FK_OrderLines_Orders]".to_string(),
        "DROP TABLE [dbo].[Orders]".to_string(),
        "CREATE TABLE [dbo].[Orders]".to_string(),
        "INSERT INTO [dbo].[Orders]".to_string(),
        format!("DROP TABLE {ORDERS_SHADOW}"),
        "CREATE NONCLUSTERED INDEX".to_string(),
        "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [CK_Orders_Amount] CHECK ([Amount]>=(0))"
            .to_string(),
        "ALTER TABLE [sales].[OrderLines] ADD CONSTRAINT [FK_OrderLines_Orders] FOREIGN KEY ([OrderId]) REFERENCES [dbo].[Orders] ([Id]) ON DELETE CASCADE ON UPDATE NO ACTION".to_string(),
        "GRANT SELECT ON [dbo].[Orders] TO [reporting]".to_string(),
    ];
    let positions: Vec<usize> = order.iter().map(|p| position(&executed, p)).collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "out of order: {executed:#?}"
    );
    assert_eq!(executed.len(), order.len());

    let report = orchestrator.last_report().unwrap();
    assert!(report.committed());
    assert_eq!(report.states_visited, RebuildState::SEQUENCE.to_vec());
    assert_eq!(report.statements_executed, executed.len());
}

#[tokio::test]
async fn test_every_state_is_logged() {
    let session = orders_session();
    let mut orchestrator = orchestrator(&session);
    orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap();

    let info = orchestrator.sink().messages_at(LogLevel::Info);
    let expected: Vec<String> = RebuildState::SEQUENCE[1..]
        .iter()
        .map(|s| format!("[dbo].[Orders]: {s}"))
        .collect();
    assert_eq!(info, expected);
    assert!(info.contains(&"[dbo].[Orders]: FKDetached".to_string()));
    assert!(orchestrator.sink().messages_at(LogLevel::Error).is_empty());
}

#[tokio::test]
async fn test_identity_insert_brackets_restore() {
    let session = MockSession::new();
    let before = vec![
        CatalogColumn::new("Id", "int", 4, 10, 0).identity(1, 1),
        CatalogColumn::new("Amount", "decimal", 9, 10, 2),
        CatalogColumn::new("Doubled", "decimal", 13, 11, 2)
            .nullable()
            .computed("([Amount]*(2))", false),
        CatalogColumn::new("Version", "timestamp", 8, 0, 0),
    ];
    script_orders(&session, &before, &before);
    let mut orchestrator = orchestrator(&session);

    orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap();

    let executed = session.executed();
    let on = position(&executed, "SET IDENTITY_INSERT [dbo].[Orders] ON");
    let insert = position(&executed, "INSERT INTO");
    let off = position(&executed, "SET IDENTITY_INSERT [dbo].[Orders] OFF");
    assert!(on < insert && insert < off);
    assert_eq!(
        executed[insert],
        "INSERT INTO [dbo].[Orders] ([Id], [Amount]) SELECT [Id], [Amount] FROM [dbo].[Orders_TEMP]"
    );
    let create = &executed[position(&executed, "CREATE TABLE")];
    assert!(create.contains("[Id] int IDENTITY(1,1) NOT NULL"));
    assert!(create.contains("[Doubled] AS ([Amount]*(2)),"), "{create}");
}

#[tokio::test]
async fn test_rebuilt_table_keeps_computed_and_named_default_columns() {
    let session = MockSession::new();
    let before = vec![
        CatalogColumn::new("Id", "int", 4, 10, 0),
        CatalogColumn::new("Amount", "decimal", 9, 10, 2)
            .with_named_default("DF_Orders_Amount", "((0))"),
        CatalogColumn::new("Taxed", "decimal", 17, 16, 4)
            .computed("([Amount]*(1.2))", true),
    ];
    script_orders(&session, &before, &before);
    let mut orchestrator = orchestrator(&session);

    orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap();

    let executed = session.executed();
    let create = &executed[position(&executed, "CREATE TABLE")];
    assert_eq!(
        create,
        "CREATE TABLE [dbo].[Orders] (\n    \
         [Id] int NOT NULL,\n    \
         [Amount] decimal(10,2) NOT NULL CONSTRAINT [DF_Orders_Amount] DEFAULT 0,\n    \
         [Currency] varchar(3) NOT NULL DEFAULT N'USD',\n    \
         [Taxed] AS ([Amount]*(1.2)) PERSISTED NOT NULL,\n    \
         CONSTRAINT [PK_Orders] PRIMARY KEY CLUSTERED ([Id] ASC)\n)"
    );
    assert_eq!(
        executed[position(&executed, "INSERT INTO")],
        "INSERT INTO [dbo].[Orders] ([Id], [Amount]) SELECT [Id], [Amount] FROM [dbo].[Orders_TEMP]"
    );
}

#[tokio::test]
async fn test_xml_index_blocks_rebuild_before_copy() {
    let session = orders_session();
    session.respond(
        queries::UNSUPPORTED_INDEXES,
        unsupported_index_rows(&[("PXML_Orders_Doc", "XML")]),
    );
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TablesmithError::Metadata(MetadataError::UnsupportedObject { ref object, .. })
            if object == "xml index [PXML_Orders_Doc]"
    ));
    assert!(session.executed().is_empty());
    assert_eq!(
        session.transaction_events(),
        vec![SessionEvent::Begin, SessionEvent::Rollback]
    );
    assert_eq!(
        orchestrator.last_report().unwrap().states_visited,
        vec![RebuildState::Idle, RebuildState::Aborted]
    );
}

// ============================================================================
// FAILURE AND ROLLBACK
// ============================================================================

/// `(needle, last state reached before the failing step)`
const FAILURE_POINTS: &[(&str, RebuildState)] = &[
    ("i.type NOT IN", RebuildState::Idle),
    ("SELECT * INTO", RebuildState::Idle),
    ("sys.foreign_key_columns", RebuildState::TempCopy),
    ("DROP CONSTRAINT [FK_OrderLines_Orders]", RebuildState::TempCopy),
    ("sys.database_permissions", RebuildState::FkDetached),
    ("SELECT t.object_id FROM sys.tables", RebuildState::PermissionsCaptured),
    ("DROP TABLE [dbo].[Orders]", RebuildState::DdlCaptured),
    ("CREATE TABLE", RebuildState::OriginalDropped),
    ("INSERT INTO", RebuildState::Rebuilt),
    ("DROP TABLE [dbo].[Orders_TEMP]", RebuildState::DataRestored),
    ("CREATE NONCLUSTERED INDEX", RebuildState::TempDropped),
    ("CHECK ([Amount]", RebuildState::TempDropped),
    ("REFERENCES [dbo].[Orders]", RebuildState::TempDropped),
    ("GRANT SELECT", RebuildState::TempDropped),
];

#[tokio::test]
async fn test_failure_at_every_state_rolls_back() {
    for (needle, last_completed) in FAILURE_POINTS {
        let session = orders_session();
        session.fail_on(needle, "statement rejected");
        let mut orchestrator = orchestrator(&session);

        let err = orchestrator
            .add_columns(&orders_table(), vec![currency_spec()])
            .await
            .unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::DdlExecution | ErrorKind::Metadata),
            "{needle}: {err:?}"
        );

        assert_eq!(
            session.transaction_events(),
            vec![SessionEvent::Begin, SessionEvent::Rollback],
            "{needle}"
        );
        assert!(!session.in_transaction(), "{needle}");

        let report = orchestrator.last_report().unwrap();
        let visited = &report.states_visited;
        assert_eq!(visited.last(), Some(&RebuildState::Aborted), "{needle}");
        assert_eq!(visited[visited.len() - 2], *last_completed, "{needle}");

        let sink = orchestrator.sink();
        assert_eq!(sink.messages_at(LogLevel::Error).len(), 1, "{needle}");
        assert_eq!(
            sink.messages_at(LogLevel::Warn),
            vec!["Transaction rolled back"],
            "{needle}"
        );
    }
}

#[tokio::test]
async fn test_not_null_without_default_fails_on_restore() {
    let session = orders_session();
    session.fail_on(
        "INSERT INTO",
        "Cannot insert the value NULL into column 'Currency'",
    );
    let mut orchestrator = orchestrator(&session);

    let mut spec = currency_spec();
    spec.default = None;
    let err = orchestrator
        .add_columns(&orders_table(), vec![spec])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TablesmithError::DdlExecution(DdlExecutionError::StatementFailed { ref reason, .. })
            if reason.contains("Cannot insert the value NULL")
    ));
    assert_eq!(session.events().last(), Some(&SessionEvent::Rollback));
    assert!(!session
        .executed()
        .iter()
        .any(|s| s == &format!("DROP TABLE {ORDERS_SHADOW}")));
}

#[tokio::test]
async fn test_commit_failure_rolls_back() {
    let session = orders_session();
    session.fail_commit("transaction doomed");
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TablesmithError::DdlExecution(DdlExecutionError::CommitFailed { .. })
    ));
    assert_eq!(
        session.transaction_events(),
        vec![
            SessionEvent::Begin,
            SessionEvent::Commit,
            SessionEvent::Rollback
        ]
    );
    let visited = &orchestrator.last_report().unwrap().states_visited;
    assert_eq!(
        &visited[visited.len() - 2..],
        &[RebuildState::ObjectsRestored, RebuildState::Aborted]
    );
}

#[tokio::test]
async fn test_failed_rollback_is_not_swallowed() {
    let session = orders_session();
    session
        .fail_on("CREATE TABLE", "permission denied")
        .fail_rollback("connection reset");
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RollbackFailed);
    match err {
        TablesmithError::RollbackFailed { cause, reason } => {
            assert!(reason.contains("connection reset"));
            assert_eq!(cause.kind(), ErrorKind::DdlExecution);
        }
        other => panic!("expected RollbackFailed, got {other:?}"),
    }
    assert!(session.in_transaction());

    let sink = orchestrator.sink();
    assert_eq!(sink.messages_at(LogLevel::Error).len(), 2);
    assert!(sink.messages_at(LogLevel::Warn)[0].starts_with("Rollback failed"));
}

#[tokio::test]
async fn test_begin_failure_skips_rollback() {
    let session = orders_session();
    session.fail_begin("too many connections");
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TablesmithError::DdlExecution(DdlExecutionError::BeginFailed { .. })
    ));
    assert_eq!(session.transaction_events(), vec![SessionEvent::Begin]);
    assert!(session.executed().is_empty());
    assert_eq!(
        orchestrator.last_report().unwrap().states_visited,
        vec![RebuildState::Idle, RebuildState::Aborted]
    );
}

#[tokio::test]
async fn test_missing_table_aborts_with_metadata_error() {
    let session = MockSession::new();
    let mut orchestrator = orchestrator(&session);

    let err = orchestrator
        .add_columns(&orders_table(), vec![currency_spec()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TablesmithError::Metadata(MetadataError::TableNotFound { .. })
    ));
    assert_eq!(session.events().last(), Some(&SessionEvent::Rollback));
}
