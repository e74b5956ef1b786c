use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;

use kindred_shared::errors::{StoreError, StoreResult};

use crate::dbi::{CacheSpec, DatabaseInterface, Param, Row};

/// Direct implementation: one PostgreSQL connection per unit of work,
/// released when the interface is closed or dropped.
pub struct PgInterface {
    client: tokio_postgres::Client,
    driver: tokio::task::JoinHandle<()>,
}

impl PgInterface {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection terminated");
            }
        });

        tracing::debug!("postgres connection established");
        Ok(Self { client, driver })
    }

    async fn run(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>> {
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = self.client.query(query, &refs).await?;
        rows.iter().map(row_to_json).collect()
    }

    fn one(mut rows: Vec<Row>, op: &'static str) -> StoreResult<Option<Row>> {
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(rows.remove(0))),
            count => Err(StoreError::TooManyRows { op, count }),
        }
    }
}

impl Drop for PgInterface {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[async_trait]
impl DatabaseInterface for PgInterface {
    async fn read_one(
        &self,
        query: &str,
        params: &[Param],
        _cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>> {
        Self::one(self.run(query, params).await?, "read_one")
    }

    async fn read_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>> {
        self.run(query, params).await
    }

    async fn write_one(
        &self,
        query: &str,
        params: &[Param],
        _cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>> {
        Self::one(self.run(query, params).await?, "write_one")
    }

    async fn write_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>> {
        self.run(query, params).await
    }

    async fn delete_one(
        &self,
        query: &str,
        params: &[Param],
        _cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>> {
        Self::one(self.run(query, params).await?, "delete_one")
    }

    async fn delete_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>> {
        self.run(query, params).await
    }

    fn close(&self) {
        self.driver.abort();
    }
}

fn row_to_json(row: &tokio_postgres::Row) -> StoreResult<Row> {
    let mut object = serde_json::Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), column_to_json(row, idx)?);
    }
    Ok(JsonValue::Object(object))
}

fn column_to_json(row: &tokio_postgres::Row, idx: usize) -> StoreResult<JsonValue> {
    let ty = row.columns()[idx].type_();

    if *ty == Type::BOOL {
        json_of(row.try_get::<_, Option<bool>>(idx)?)
    } else if *ty == Type::INT2 {
        json_of(row.try_get::<_, Option<i16>>(idx)?)
    } else if *ty == Type::INT4 {
        json_of(row.try_get::<_, Option<i32>>(idx)?)
    } else if *ty == Type::INT8 {
        json_of(row.try_get::<_, Option<i64>>(idx)?)
    } else if *ty == Type::FLOAT4 {
        json_of(row.try_get::<_, Option<f32>>(idx)?)
    } else if *ty == Type::FLOAT8 {
        json_of(row.try_get::<_, Option<f64>>(idx)?)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        json_of(row.try_get::<_, Option<String>>(idx)?)
    } else if *ty == Type::UUID {
        json_of(row.try_get::<_, Option<uuid::Uuid>>(idx)?)
    } else if *ty == Type::DATE {
        json_of(row.try_get::<_, Option<chrono::NaiveDate>>(idx)?)
    } else if *ty == Type::TIMESTAMP {
        json_of(row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)?)
    } else if *ty == Type::TIMESTAMPTZ {
        json_of(row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        Ok(row
            .try_get::<_, Option<JsonValue>>(idx)?
            .unwrap_or(JsonValue::Null))
    } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
        json_of(row.try_get::<_, Option<Vec<String>>>(idx)?)
    } else if *ty == Type::UUID_ARRAY {
        json_of(row.try_get::<_, Option<Vec<uuid::Uuid>>>(idx)?)
    } else if *ty == Type::INT8_ARRAY {
        json_of(row.try_get::<_, Option<Vec<i64>>>(idx)?)
    } else {
        Err(StoreError::Internal(anyhow::anyhow!(
            "unsupported column type {ty} in result row"
        )))
    }
}

fn json_of<T: serde::Serialize>(value: Option<T>) -> StoreResult<JsonValue> {
    match value {
        None => Ok(JsonValue::Null),
        Some(value) => serde_json::to_value(value)
            .map_err(|err| StoreError::Internal(anyhow::anyhow!("row serialization failed: {err}"))),
    }
}
