//! dkll server side: syslog intake, forwarder pipeline, file fan-out and
//! the REST API.
//!
//! Wiring is the host's job (see the `dkll` binary): bind a
//! [`SyslogSource`], build a store, hand both to a [`Forwarder`] together
//! with a [`FileLogger`], and run a [`RestServer`] next to it. Every piece
//! shuts down on the shared cancellation token.

pub mod file_logger;
pub mod forwarder;
pub mod rest;
pub mod syslog;

pub use file_logger::{FileLogger, WritersFactory};
pub use forwarder::{
    FileWriter, Forwarder, ForwarderMetrics, NopFileWriter, Publisher,
};
pub use rest::{DataService, RestConfig, RestServer};
pub use syslog::{LineSource, SyslogConfig, SyslogError, SyslogMetrics, SyslogSource};
