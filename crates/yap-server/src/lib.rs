//! YAP custom fields HTTP server library
//!
//! Provides the REST API components for testing and reuse.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
