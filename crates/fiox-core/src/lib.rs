//! Fiox Core Library
//!
//! This library provides the machinery behind the `fiox-core` binary:
//! - Terse-v3 line decoding into named metric snapshots
//! - fio process supervision with a decode fault tolerance
//! - The latest-snapshot store and its Prometheus collector
//! - The HTTP exposition endpoint
//! - Exit codes, logging, and CLI configuration
//!
//! The binary entry point is in `main.rs`.

pub mod collector;
pub mod config;
pub mod decode;
pub mod driver;
pub mod exit_codes;
pub mod logging;
pub mod server;
pub mod signal;
pub mod store;
