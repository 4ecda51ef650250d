//! [`Session`] over a TDS connection.

use crate::config::ConnectionConfig;
use async_trait::async_trait;
use tablesmith_core::{ConnectionError, TablesmithResult};
use tablesmith_session::{RowSet, Session, SessionError, Value};
use tiberius::{Client, ColumnData, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

const BEGIN: &str = "BEGIN TRANSACTION";
const COMMIT: &str = "COMMIT TRANSACTION";
/// A server-side error can already have rolled the transaction back.
const ROLLBACK: &str = "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION";

type TdsClient = Client<Compat<TcpStream>>;

/// A live SQL Server session.
pub struct MssqlSession {
    client: Option<TdsClient>,
    target: String,
}

impl MssqlSession {
    /// Open a connection described by `config`.
    pub async fn connect(config: &ConnectionConfig) -> TablesmithResult<Self> {
        let target = config.target();
        let failed = |reason: String| ConnectionError::ConnectFailed {
            target: target.clone(),
            reason,
        };

        let tds = config.to_tiberius();
        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|e| failed(format!("connecting to SQL Server: {e}")))?;
        tcp.set_nodelay(true)
            .map_err(|e| failed(format!("setting nodelay socket option: {e}")))?;

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| failed(e.to_string()))?;

        tracing::info!(server = %target, "connected to SQL Server");
        Ok(Self {
            client: Some(client),
            target,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn client(&mut self) -> Result<&mut TdsClient, SessionError> {
        self.client.as_mut().ok_or(SessionError::Closed)
    }

    async fn run_batch(&mut self, sql: &str) -> Result<(), SessionError> {
        self.client()?
            .simple_query(sql)
            .await
            .map_err(driver)?
            .into_results()
            .await
            .map_err(driver)?;
        Ok(())
    }
}

fn driver(e: tiberius::error::Error) -> SessionError {
    SessionError::driver(e.to_string())
}

fn bind<'a>(sql: &'a str, params: &'a [Value]) -> Query<'a> {
    let mut query = Query::new(sql);
    for param in params {
        match param {
            Value::Null => query.bind(Option::<&str>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
        }
    }
    query
}

/// Convert one cell. Types the catalog never returns are a decode error.
fn to_value(column: &str, data: ColumnData<'static>) -> Result<Value, SessionError> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I16(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I32(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(|v| Value::Float(v.into())),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.map(|s| Value::Text(s.into_owned())),
        ColumnData::Binary(v) => v.map(|b| Value::Bytes(b.into_owned())),
        ColumnData::Guid(v) => v.map(|g| Value::Text(g.to_string())),
        ColumnData::Numeric(v) => v.map(|n| Value::Text(n.to_string())),
        other => {
            return Err(SessionError::Decode {
                column: column.to_string(),
                reason: format!("unsupported column type {other:?}"),
            })
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn to_row_set(rows: Vec<tiberius::Row>) -> Result<RowSet, SessionError> {
    let Some(first) = rows.first() else {
        return Ok(RowSet::default());
    };
    let names: Vec<String> = first.columns().iter().map(|c| c.name().to_string()).collect();
    let header: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut set = RowSet::new(&header);
    for row in rows {
        let values = names
            .iter()
            .zip(row)
            .map(|(name, data)| to_value(name, data))
            .collect::<Result<Vec<_>, _>>()?;
        set.push(values);
    }
    Ok(set)
}

#[async_trait]
impl Session for MssqlSession {
    async fn begin(&mut self) -> Result<(), SessionError> {
        self.run_batch(BEGIN).await
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        self.run_batch(COMMIT).await
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        self.run_batch(ROLLBACK).await
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, SessionError> {
        let client = self.client()?;
        let result = bind(sql, params).execute(client).await.map_err(driver)?;
        Ok(result.total())
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, SessionError> {
        let client = self.client()?;
        let rows = bind(sql, params)
            .query(client)
            .await
            .map_err(driver)?
            .into_first_result()
            .await
            .map_err(driver)?;
        to_row_set(rows)
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        match self.client.take() {
            Some(client) => {
                tracing::info!(server = %self.target, "closing SQL Server session");
                client.close().await.map_err(driver)
            }
            None => Ok(()),
        }
    }
}
