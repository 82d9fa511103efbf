//! dkll agent: discovers running containers and streams their logs.
//!
//! The [`EventLoop`] supervises one [`ContainerStreamer`] per container in
//! response to start/stop [`Event`]s. Each streamer drives a long-running
//! tail through the [`LogsEmitter`] seam into a pair of writers built by a
//! [`WriterFactory`] - typically a [`MultiWriter`] fanning out to rotated
//! files and a remote [`SyslogWriter`].
//!
//! The container runtime itself stays behind the seams; the in-tree
//! [`demo`] module provides an event source and emitter that need no
//! runtime at all.

pub mod demo;
pub mod event;
pub mod event_loop;
pub mod streamer;
pub mod syslog;
pub mod writer;

pub use demo::{DemoEmitter, DemoEvents};
pub use event::{Event, EventFilter, EventStatus};
pub use event_loop::{EventLoop, WriterFactory, WriterPair};
pub use streamer::{ContainerStreamer, EmitError, LogsEmitter, LogsOptions, StreamerParams};
pub use syslog::{SyslogProto, SyslogWriter, SyslogWriterConfig};
pub use writer::{shared, MultiWriter, NopWriter, SharedSink, SharedWriter, WriteCloser};
