//! `PostgreSQL` session implementation.
//!
//! Implements [`SqlSession`]/[`SqlSessionFactory`] over `tokio-postgres`
//! with `deadpool-postgres` connection pooling. Each session owns one
//! pooled connection for the duration of a logical operation, so
//! transactions and prepared statements stay on a single backend
//! connection.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;
use uuid::Uuid;

use sluice_core::{Row, Value};

use crate::error::{ConnectorError, Result};
use crate::sql::client::{SqlSession, SqlSessionFactory};

/// Pooled [`SqlSessionFactory`] for `PostgreSQL`.
///
/// Parses the connection string and creates the pool eagerly; backend
/// connectivity is not validated until the first session is used.
pub struct PostgresSessionFactory {
    pool: Pool,
}

impl PostgresSessionFactory {
    /// Creates a pool over `connection_string` (key-value or URI form).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ConnectionFailed`] for an invalid
    /// connection string or pool configuration.
    pub fn new(connection_string: &str, max_pool_size: usize) -> Result<Self> {
        let pg_config: tokio_postgres::Config = connection_string.parse().map_err(|e| {
            ConnectorError::ConnectionFailed(format!("invalid connection string: {e}"))
        })?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(max_pool_size)
            .build()
            .map_err(|e| ConnectorError::ConnectionFailed(format!("pool creation failed: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SqlSessionFactory for PostgresSessionFactory {
    async fn session(&self) -> Result<Box<dyn SqlSession>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| ConnectorError::ConnectionFailed(format!("pool get failed: {e}")))?;
        Ok(Box::new(PostgresSession {
            client,
            statements: HashMap::new(),
            next_statement: 0,
        }))
    }
}

/// One pooled `PostgreSQL` connection.
pub struct PostgresSession {
    client: deadpool_postgres::Object,
    statements: HashMap<u64, tokio_postgres::Statement>,
    next_statement: u64,
}

#[async_trait]
impl SqlSession for PostgresSession {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let bound = bind_params(params);
        let refs = param_refs(&bound);
        self.client
            .execute(sql, &refs)
            .await
            .map_err(|e| ConnectorError::Write(e.to_string()))
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let bound = bind_params(params);
        let refs = param_refs(&bound);
        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(|e| ConnectorError::Read(e.to_string()))?;
        rows.iter().map(row_values).collect()
    }

    async fn begin(&mut self) -> Result<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| ConnectorError::Write(e.to_string()))
    }

    async fn commit(&mut self) -> Result<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| ConnectorError::Write(e.to_string()))
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| ConnectorError::Write(e.to_string()))
    }

    async fn prepare(&mut self, sql: &str) -> Result<u64> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| ConnectorError::Write(e.to_string()))?;
        self.next_statement += 1;
        self.statements.insert(self.next_statement, statement);
        Ok(self.next_statement)
    }

    async fn execute_prepared(&mut self, statement: u64, params: &[Value]) -> Result<u64> {
        let prepared = self
            .statements
            .get(&statement)
            .ok_or_else(|| ConnectorError::Write(format!("unknown statement {statement}")))?
            .clone();
        let bound = bind_params(params);
        let refs = param_refs(&bound);
        self.client
            .execute(&prepared, &refs)
            .await
            .map_err(|e| ConnectorError::Write(e.to_string()))
    }
}

/// Converts canonical values into owned `ToSql` boxes.
///
/// Unsigned types widen into the next signed type; `UInt64` goes through
/// NUMERIC exactly (the store has no unsigned 64-bit).
fn bind_params(values: &[Value]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    values
        .iter()
        .map(|value| -> Box<dyn ToSql + Sync + Send> {
            match value {
                Value::Null => Box::new(Option::<String>::None),
                Value::Binary(b) => Box::new(b.clone()),
                Value::Byte(v) => Box::new(i16::from(*v)),
                Value::SByte(v) => Box::new(i16::from(*v)),
                Value::UInt16(v) => Box::new(i32::from(*v)),
                Value::UInt32(v) => Box::new(i64::from(*v)),
                Value::UInt64(v) => Box::new(Decimal::from(*v)),
                Value::Int16(v) => Box::new(*v),
                Value::Int32(v) => Box::new(*v),
                Value::Int64(v) => Box::new(*v),
                Value::Decimal(d) => Box::new(*d),
                Value::Double(v) => Box::new(*v),
                Value::Single(v) => Box::new(*v),
                Value::String(s) => Box::new(s.clone()),
                Value::Boolean(b) => Box::new(*b),
                Value::DateTime(dt) => Box::new(*dt),
                Value::Time(t) => Box::new(*t),
                Value::Guid(g) => Box::new(*g),
            }
        })
        .collect()
}

fn param_refs(bound: &[Box<dyn ToSql + Sync + Send>]) -> Vec<&(dyn ToSql + Sync)> {
    bound
        .iter()
        .map(|b| b.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// Maps one backend row into canonical values by column type.
fn row_values(row: &tokio_postgres::Row) -> Result<Row> {
    let mut values = Vec::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        values.push(column_value(row, i, column.type_())?);
    }
    Ok(values)
}

#[allow(clippy::too_many_lines)]
fn column_value(row: &tokio_postgres::Row, i: usize, ty: &Type) -> Result<Value> {
    let read = |e: tokio_postgres::Error| ConnectorError::Read(e.to_string());
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(i).map_err(read)?.map(Value::Boolean)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(i).map_err(read)?.map(Value::Int16)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(i).map_err(read)?.map(Value::Int32)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(i).map_err(read)?.map(Value::Int64)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(i).map_err(read)?.map(Value::Single)
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(i).map_err(read)?.map(Value::Double)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(i)
            .map_err(read)?
            .map(Value::Decimal)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(i)
            .map_err(read)?
            .map(Value::DateTime)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(i)
            .map_err(read)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::DateTime)
    } else if *ty == Type::TIME {
        row.try_get::<_, Option<NaiveTime>>(i).map_err(read)?.map(Value::Time)
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<Uuid>>(i).map_err(read)?.map(Value::Guid)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(i)
            .map_err(read)?
            .map(Value::Binary)
    } else {
        // TEXT, VARCHAR, BPCHAR, NAME, and anything else readable as text.
        row.try_get::<_, Option<String>>(i)
            .map_err(read)?
            .map(Value::String)
    };
    Ok(value.unwrap_or(Value::Null))
}
