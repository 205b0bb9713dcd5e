//! Integration tests for taskdesk.

pub mod config_test;
pub mod connection_test;
pub mod lifecycle_test;
