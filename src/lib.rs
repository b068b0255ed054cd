//! Tubely - video upload service
//!
//! This library crate exposes the service for the binary and integration tests.

pub mod config;
pub mod server;
pub mod storage;
