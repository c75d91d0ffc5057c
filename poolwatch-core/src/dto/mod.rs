//! Data Transfer Objects
//!
//! Serializable shapes the engine persists between calls (location lookups,
//! native daemon locations) and hands to external consumers (record set
//! snapshots).

pub mod location;
pub mod snapshot;
