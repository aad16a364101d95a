//! Core data model types: raw message records and destination keys.

pub mod key;
pub mod record;
