//! Kindred core: the cached data-access layer and the mutual-interest
//! matching engine, consumed by request handlers as a library.

pub mod config;
pub mod dbi;
pub mod location;
pub mod models;
pub mod rows;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use location::Location;
pub use store::Store;

pub use kindred_shared::{StoreError, StoreResult};
