//! Writer fan-out
//!
//! [`MultiWriter`] broadcasts every write to its sinks best-effort: a
//! failing sink is logged and skipped, the write still succeeds for the
//! rest. Closing reports all sink failures combined. The optional JSON
//! envelope wraps each payload as
//! `{"msg": …, "container": …, "group": …, "host": …, "ts": …}`.

use std::io::{self, Write};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;

/// A writer the streamer can close on teardown.
pub trait WriteCloser: Write + Send {
    fn close(&mut self) -> io::Result<()>;
}

/// Writers are shared between the streamer (which closes them) and the
/// emitter (which writes into them). In mix mode stdout and stderr share
/// one value; `Arc::ptr_eq` tells the teardown path to close only once.
pub type SharedWriter = Arc<Mutex<Box<dyn WriteCloser>>>;

/// Wrap a writer for sharing.
pub fn shared(w: Box<dyn WriteCloser>) -> SharedWriter {
    Arc::new(Mutex::new(w))
}

impl WriteCloser for dkll_rotate::RotatingFile {
    fn close(&mut self) -> io::Result<()> {
        dkll_rotate::RotatingFile::close(self)
    }
}

/// Adapter letting one writer feed several [`MultiWriter`]s, e.g. a single
/// syslog connection carrying both stdout and stderr. Closing is
/// idempotent on the shared writer.
#[derive(Clone)]
pub struct SharedSink(SharedWriter);

impl SharedSink {
    pub fn new(writer: Box<dyn WriteCloser>) -> SharedSink {
        SharedSink(shared(writer))
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

impl WriteCloser for SharedSink {
    fn close(&mut self) -> io::Result<()> {
        self.0.lock().close()
    }
}

/// Discarding writer, handy as a default sink.
pub struct NopWriter;

impl Write for NopWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteCloser for NopWriter {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Best-effort fan-out writer with an optional JSON envelope.
pub struct MultiWriter {
    sinks: Vec<Box<dyn WriteCloser>>,
    ext: Option<ExtJson>,
}

struct ExtJson {
    container: String,
    group: String,
    host: String,
}

impl MultiWriter {
    /// Fan out to the given sinks, ignoring per-sink write errors.
    pub fn new(sinks: Vec<Box<dyn WriteCloser>>) -> MultiWriter {
        MultiWriter { sinks, ext: None }
    }

    /// Wrap every payload in the JSON envelope. The host field is this
    /// machine's hostname.
    pub fn with_ext_json(mut self, container: &str, group: &str) -> MultiWriter {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        self.ext = Some(ExtJson {
            container: container.to_string(),
            group: group.to_string(),
            host,
        });
        self
    }

    fn envelope(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let ext = self.ext.as_ref()?;
        let msg = String::from_utf8_lossy(payload);
        let msg = msg.strip_suffix('\n').unwrap_or(&msg);
        let value = json!({
            "msg": msg,
            "container": ext.container,
            "group": ext.group,
            "host": ext.host,
            "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        let mut line = value.to_string().into_bytes();
        line.push(b'\n');
        Some(line)
    }
}

impl Write for MultiWriter {
    /// Reports the input length as written regardless of sink failures.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let wrapped = self.envelope(buf);
        let payload = wrapped.as_deref().unwrap_or(buf);
        for sink in &mut self.sinks {
            if let Err(e) = sink.write_all(payload) {
                debug!(error = %e, "multiwriter sink failed");
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush() {
                debug!(error = %e, "multiwriter flush failed");
            }
        }
        Ok(())
    }
}

impl WriteCloser for MultiWriter {
    /// Close all sinks; failures are combined into one error.
    fn close(&mut self) -> io::Result<()> {
        let mut failures = Vec::new();
        for sink in &mut self.sinks {
            if let Err(e) = sink.close() {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "{} writer(s) failed to close: {}",
                failures.len(),
                failures.join("; ")
            )))
        }
    }
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
