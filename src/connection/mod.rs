//! Connection management for taskdesk.
//!
//! Centralizes the lifecycle of the single database session.

pub mod global;
pub mod manager;

pub use manager::ConnectionManager;
