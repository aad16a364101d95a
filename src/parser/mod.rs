//! Email parsing: MBOX streaming parser and header/date decoding.

pub mod header;
pub mod mbox;
