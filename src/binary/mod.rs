//! Per-category rule-set file format.
//!
//! A rule-set file holds one category's rules as typed slices behind a
//! fixed header:
//!
//! ```text
//! +------------------+
//! |     HEADER       |  48 bytes (fixed)
//! +------------------+
//! |   SLICE INDEX    |  16 bytes per slice
//! +------------------+
//! |   SLICE DATA     |  variable
//! +------------------+
//! ```
//!
//! See [`format`] for the byte layout.

pub mod format;
mod reader;
mod writer;

pub use format::{FormatFlags, RuleSetHeader, SliceEntry, SliceType, FORMAT_VERSION, MAGIC};
pub use reader::RuleSetReader;
pub use writer::RuleSetWriter;
