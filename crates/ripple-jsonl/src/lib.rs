//! JSONL (JSON Lines) helpers for recording ripple snapshots.
//!
//! Ripple's core never stores anything on its own. Callers that want a
//! history of graph, impact or execution snapshots append them to a JSONL
//! file with this crate and read them back later:
//!
//! - [`append_jsonl`] appends a single record, creating the file if needed
//! - [`write_jsonl_atomic`] rewrites a whole file with temp-file-then-rename
//! - [`read_jsonl_resilient`] loads every parseable record and reports the
//!   rest as [`Warning`]s instead of failing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod warning;
pub mod writer;

pub use atomic::{append_jsonl, write_jsonl_atomic};
pub use error::{Error, Result};
pub use reader::{JsonlReader, read_jsonl_resilient};
pub use warning::Warning;
pub use writer::JsonlWriter;
