//! Fiox common types shared between the supervisor and the exposition layer.
//!
//! This crate provides the foundational vocabulary:
//! - The fio terse-v3 metric field schema and its startup validation
//! - The snapshot map type handed from the decoder to the store
//! - The unified error taxonomy with stable codes and categories

pub mod error;
pub mod schema;

pub use error::{Error, ErrorCategory, Result};
pub use schema::{MetricMap, FIELDS, FIELD_COUNT, TERSE_VERSION};
