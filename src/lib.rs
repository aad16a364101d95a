//! `mboxsplit` — split an MBOX file into one mailbox per month.
//!
//! This crate provides the streaming MBOX parser, `Date:` header handling
//! and the append-only output set used by the `mboxsplit` binary.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod split;
