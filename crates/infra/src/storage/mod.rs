//! Durable key/value storage adapters

mod file;

pub use file::FileStore;
