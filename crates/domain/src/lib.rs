//! # Trailhead Domain
//!
//! Domain types and models for the Trailhead offline-resilience engine.
//!
//! This crate contains:
//! - Connectivity, queue, and cache data types
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Trailhead crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
