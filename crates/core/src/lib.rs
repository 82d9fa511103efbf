//! Core record types shared by the dkll server, agent and client.
//!
//! The crate defines the wire-level vocabulary of the pipeline:
//!
//! - [`LogEntry`] - a single parsed log record, as persisted and served
//! - [`EntryId`] - time-sortable 12-byte record identifier (hex on the wire)
//! - [`Request`] - query descriptor exchanged between client and server
//! - [`Pattern`] - the `/regex/`-or-literal filter DSL used by queries
//!
//! Everything here is plain data; no I/O happens in this crate.

pub mod entry;
pub mod id;
pub mod pattern;
pub mod request;

pub use entry::{LogEntry, ParseError};
pub use id::{EntryId, IdGenerator};
pub use pattern::Pattern;
pub use request::Request;
