//! TTL and schema-versioned cache store

mod store;

pub use store::CacheStore;
