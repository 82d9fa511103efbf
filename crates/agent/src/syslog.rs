//! Remote syslog writer
//!
//! Line-oriented `io::Write` shipping each complete line as one RFC3164
//! message: `<pri>TIMESTAMP HOST TAG[pid]: MSG`. Priority is fixed at
//! daemon.warning, the tag is the configured prefix plus the container
//! name. UDP messages are fire-and-forget; a TCP write failure closes the
//! connection and redials with bounded retry before the line is dropped.

use std::io::{self, Write};
use std::net::{TcpStream, UdpSocket};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::writer::WriteCloser;

/// daemon.warning
const PRIORITY: u8 = 28;

/// Dial/redial attempts.
const RETRY_ATTEMPTS: usize = 10;

/// Delay between attempts.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogProto {
    Udp4,
    Tcp4,
}

impl std::str::FromStr for SyslogProto {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" | "udp4" => Ok(SyslogProto::Udp4),
            "tcp" | "tcp4" => Ok(SyslogProto::Tcp4),
            other => Err(format!("unknown syslog protocol {other}")),
        }
    }
}

/// Remote endpoint and message tag.
#[derive(Debug, Clone)]
pub struct SyslogWriterConfig {
    /// `host:port` of the syslog server.
    pub host: String,
    pub proto: SyslogProto,
    /// Message tag, typically `prefix + container_name`.
    pub tag: String,
}

enum Transport {
    Udp(UdpSocket),
    Tcp(Option<TcpStream>),
}

/// Syslog transport as a line writer.
pub struct SyslogWriter {
    config: SyslogWriterConfig,
    transport: Transport,
    hostname: String,
    pid: u32,
    /// Bytes of a not-yet-terminated line.
    partial: Vec<u8>,
}

impl SyslogWriter {
    /// Dial the remote endpoint with bounded retry.
    pub fn dial(config: SyslogWriterConfig) -> io::Result<SyslogWriter> {
        let transport = match config.proto {
            SyslogProto::Udp4 => {
                let socket = UdpSocket::bind("0.0.0.0:0")?;
                socket.connect(&config.host)?;
                Transport::Udp(socket)
            }
            SyslogProto::Tcp4 => Transport::Tcp(Some(connect_with_retry(&config.host)?)),
        };

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());

        Ok(SyslogWriter {
            config,
            transport,
            hostname,
            pid: std::process::id(),
            partial: Vec::new(),
        })
    }

    /// Frame one line as an RFC3164 message.
    fn frame(&self, line: &str) -> String {
        format!(
            "<{}>{} {} {}[{}]: {}\n",
            PRIORITY,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            self.hostname,
            self.config.tag,
            self.pid,
            line
        )
    }

    fn send(&mut self, line: &str) -> io::Result<()> {
        let message = self.frame(line);
        match &mut self.transport {
            Transport::Udp(socket) => {
                socket.send(message.as_bytes())?;
                Ok(())
            }
            Transport::Tcp(conn) => {
                if let Some(stream) = conn.as_mut() {
                    if stream.write_all(message.as_bytes()).is_ok() {
                        return Ok(());
                    }
                    debug!(host = %self.config.host, "syslog tcp write failed, reconnecting");
                }
                // failed or no connection: redial once with bounded retry
                *conn = None;
                let mut stream = connect_with_retry(&self.config.host)?;
                stream.write_all(message.as_bytes())?;
                *conn = Some(stream);
                Ok(())
            }
        }
    }

    fn flush_lines(&mut self) -> io::Result<()> {
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if text.is_empty() {
                continue;
            }
            if let Err(e) = self.send(&text) {
                warn!(host = %self.config.host, error = %e, "syslog send failed, line dropped");
            }
        }
        Ok(())
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partial.extend_from_slice(buf);
        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_lines()
    }
}

impl WriteCloser for SyslogWriter {
    fn close(&mut self) -> io::Result<()> {
        // ship a trailing unterminated line before closing
        if !self.partial.is_empty() {
            self.partial.push(b'\n');
            self.flush_lines()?;
        }
        if let Transport::Tcp(conn) = &mut self.transport {
            *conn = None;
        }
        Ok(())
    }
}

/// Dial with fixed-delay retry.
fn connect_with_retry(host: &str) -> io::Result<TcpStream> {
    let mut last_err = io::Error::other("no attempts made");
    for attempt in 1..=RETRY_ATTEMPTS {
        match TcpStream::connect(host) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(host, attempt, error = %e, "syslog dial failed");
                last_err = e;
            }
        }
        if attempt < RETRY_ATTEMPTS {
            std::thread::sleep(RETRY_DELAY);
        }
    }
    Err(last_err)
}

#[cfg(test)]
#[path = "syslog_test.rs"]
mod syslog_test;
