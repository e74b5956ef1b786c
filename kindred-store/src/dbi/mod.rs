//! The data-access interface: uniform read/write/delete operations with
//! optional caching metadata, implemented directly against PostgreSQL and
//! as a cache-coherent wrapper around any other implementation.

pub mod cached;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, Utc};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use uuid::Uuid;

use kindred_shared::cache::Expiration;
use kindred_shared::errors::StoreResult;

pub use cached::CachedInterface;
pub use postgres::PgInterface;
pub use schema::CacheShape;

/// One result row as a JSON object.
pub type Row = serde_json::Value;

/// Query parameter accepted by the data-access interface.
#[derive(Debug, Clone)]
pub enum Param {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    OptText(Option<String>),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    TextArray(Vec<String>),
    UuidArray(Vec<Uuid>),
    IntArray(Vec<i64>),
}

impl ToSql for Param {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Bool(v) => v.to_sql(ty, out),
            Self::Int(v) => v.to_sql(ty, out),
            Self::Float(v) => v.to_sql(ty, out),
            Self::Text(v) => v.to_sql(ty, out),
            Self::OptText(v) => v.to_sql(ty, out),
            Self::Uuid(v) => v.to_sql(ty, out),
            Self::Date(v) => v.to_sql(ty, out),
            Self::Timestamp(v) => v.to_sql(ty, out),
            Self::TextArray(v) => v.to_sql(ty, out),
            Self::UuidArray(v) => v.to_sql(ty, out),
            Self::IntArray(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Mismatches surface from the delegated to_sql call.
        true
    }

    to_sql_checked!();
}

/// Key, shape, and expiration for a cacheable single-row operation.
#[derive(Debug, Clone)]
pub struct CacheSpec {
    pub key: String,
    pub shape: CacheShape,
    pub expiration: Expiration,
}

impl CacheSpec {
    pub fn ttl(key: String, shape: CacheShape, secs: u64) -> Self {
        Self {
            key,
            shape,
            expiration: Expiration::ttl_secs(secs),
        }
    }
}

/// Uniform access to the relational store. `*_one` operations may carry a
/// [`CacheSpec`]; multi-row operations are never cacheable.
#[async_trait]
pub trait DatabaseInterface: Send + Sync {
    async fn read_one(
        &self,
        query: &str,
        params: &[Param],
        cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>>;

    async fn read_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>>;

    async fn write_one(
        &self,
        query: &str,
        params: &[Param],
        cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>>;

    async fn write_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>>;

    async fn delete_one(
        &self,
        query: &str,
        params: &[Param],
        cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>>;

    async fn delete_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>>;

    /// Release the unit of work's resources. Also runs on drop; exposed so
    /// callers can release early on any exit path.
    fn close(&self);
}
