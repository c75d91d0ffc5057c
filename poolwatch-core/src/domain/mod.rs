//! Core domain types
//!
//! These types describe the data a pool query produces: scheduler attribute
//! values, the records (ads) they live in, and record sets keyed by one or
//! more identifying attributes.

pub mod format;
pub mod job;
pub mod record;
pub mod value;
