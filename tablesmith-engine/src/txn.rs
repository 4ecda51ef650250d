//! Ambient transaction discipline shared by every mutation path.

use crate::log::{LogLevel, LogSink};
use tablesmith_core::{DdlExecutionError, TablesmithError, TablesmithResult};
use tablesmith_session::{Session, Value};

/// Write an error to the sink and to `tracing`.
pub(crate) fn report_error<L: LogSink + ?Sized>(sink: &L, error: &TablesmithError) {
    tracing::error!(error = %error, kind = error.kind().as_str(), "request failed");
    sink.append(LogLevel::Error, &error.to_string());
}

pub(crate) async fn begin<S: Session + ?Sized>(session: &mut S) -> TablesmithResult<()> {
    session.begin().await.map_err(|e| {
        DdlExecutionError::BeginFailed {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Begin, reporting a failure to the sink. Nothing needs rolling back.
pub(crate) async fn open<S, L>(session: &mut S, sink: &L) -> TablesmithResult<()>
where
    S: Session + ?Sized,
    L: LogSink + ?Sized,
{
    begin(session).await.map_err(|e| {
        report_error(sink, &e);
        e
    })
}

pub(crate) async fn commit<S: Session + ?Sized>(session: &mut S) -> TablesmithResult<()> {
    session.commit().await.map_err(|e| {
        DdlExecutionError::CommitFailed {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Execute one statement inside the transaction.
pub(crate) async fn execute<S: Session + ?Sized>(
    session: &mut S,
    sql: &str,
    params: &[Value],
) -> TablesmithResult<()> {
    tracing::debug!(statement = sql, "executing");
    session
        .execute(sql, params)
        .await
        .map(|_| ())
        .map_err(|e| e.into_ddl_error(sql))
}

/// Log `cause`, roll back, and hand back the error the caller should see:
/// `cause` itself, or `RollbackFailed` wrapping it.
pub(crate) async fn abort<S, L>(
    session: &mut S,
    sink: &L,
    cause: TablesmithError,
) -> TablesmithError
where
    S: Session + ?Sized,
    L: LogSink + ?Sized,
{
    report_error(sink, &cause);
    match session.rollback().await {
        Ok(()) => {
            tracing::warn!(cause = %cause, "transaction rolled back");
            sink.append(LogLevel::Warn, "Transaction rolled back");
            cause
        }
        Err(e) => {
            tracing::warn!(error = %e, "rollback failed");
            sink.append(LogLevel::Warn, &format!("Rollback failed: {e}"));
            let failed = TablesmithError::RollbackFailed {
                cause: Box::new(cause),
                reason: e.to_string(),
            };
            report_error(sink, &failed);
            failed
        }
    }
}

/// Commit when `outcome` is `Ok`; otherwise, or when the commit itself
/// fails, roll back.
pub(crate) async fn settle<S, L>(
    session: &mut S,
    sink: &L,
    outcome: TablesmithResult<()>,
) -> TablesmithResult<()>
where
    S: Session + ?Sized,
    L: LogSink + ?Sized,
{
    let outcome = match outcome {
        Ok(()) => commit(session).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(()) => Ok(()),
        Err(cause) => Err(abort(session, sink, cause).await),
    }
}
