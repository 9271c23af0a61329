//! seedmorph-export: Pure result-table serializers (sans-IO)
//!
//! Converts feature rows into the tab-separated result table and parses
//! such a table back into rows.

pub mod tsv;

pub use tsv::{COLUMNS, TsvError, from_tsv, to_tsv};
