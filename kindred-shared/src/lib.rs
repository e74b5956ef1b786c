pub mod cache;
pub mod clients;
pub mod errors;
pub mod limiter;
pub mod telemetry;

pub use cache::{CacheStore, Expiration, MemoryCache};
pub use errors::{DbErrorKind, StoreError, StoreResult};
