//! taskdesk - data-layer tools for the taskdesk task manager.
//!
//! This library exposes the core modules for use in integration tests.

pub mod app;
pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod roles;
pub mod secrets;
