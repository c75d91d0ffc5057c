//! Poolwatch Core
//!
//! Core types shared by the poolwatch engine and CLI.
//!
//! This crate contains:
//! - Domain types: typed attribute values, records, keyed record sets, format specs
//! - DTOs: serializable shapes persisted by the engine between calls

pub mod domain;
pub mod dto;

pub use domain::format::{AttrType, FormatSpec};
pub use domain::job::JobId;
pub use domain::record::{Record, RecordKey, RecordSet};
pub use domain::value::Value;
