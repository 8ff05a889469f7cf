//! AAC 码流解析.

pub mod adts;

pub use adts::{AdtsHeader, find_adts_sync, parse_adts_header};
