//! # Trailhead Infrastructure
//!
//! Adapters behind the engine's ports:
//! - [`HttpProbe`]: reqwest-based internet/backend reachability probes
//! - [`FileStore`]: durable file-per-key storage with atomic writes
//! - [`config`]: configuration loading (env vars, then file probing)
//!
//! ## Architecture Principles
//! - All I/O lives here; `trailhead-core` stays pure
//! - Every external error converts into `TrailheadError` at this boundary

pub mod config;
pub mod errors;
pub mod probes;
pub mod storage;

pub use errors::InfraError;
pub use probes::HttpProbe;
pub use storage::FileStore;
