//! Syslog intake
//!
//! Listens on one port over both TCP and UDP. Framing is not parsed beyond
//! the optional `<pri>` prefix, which is stripped; the remainder of each
//! line is delivered as-is on a bounded channel. Cancellation stops the
//! acceptors, the per-connection readers and the UDP worker; the channel
//! closes once they are gone.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default outbound line-channel capacity.
pub const DEFAULT_QUEUE_SIZE: usize = 10_000;

/// Largest accepted UDP datagram.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Syslog listener configuration.
#[derive(Debug, Clone)]
pub struct SyslogConfig {
    /// Bind address.
    pub address: String,
    /// Port for both TCP and UDP. 0 picks a free TCP port and reuses it
    /// for UDP.
    pub port: u16,
    /// Outbound channel capacity.
    pub queue_size: usize,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        SyslogConfig {
            address: "0.0.0.0".into(),
            port: 5514,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

/// Intake counters.
#[derive(Debug, Default)]
pub struct SyslogMetrics {
    /// TCP connections accepted over the listener's lifetime.
    pub connections_total: AtomicU64,

    /// Lines delivered downstream (both transports).
    pub lines_received: AtomicU64,

    /// Payload bytes delivered downstream.
    pub bytes_received: AtomicU64,

    /// UDP datagrams received.
    pub datagrams_received: AtomicU64,
}

impl SyslogMetrics {
    pub const fn new() -> SyslogMetrics {
        SyslogMetrics {
            connections_total: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            datagrams_received: AtomicU64::new(0),
        }
    }

    #[inline]
    fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn line_received(&self, bytes: u64) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    fn datagram_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot.
    pub fn snapshot(&self) -> SyslogMetricsSnapshot {
        SyslogMetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the intake counters at one moment.
#[derive(Debug, Clone, Copy)]
pub struct SyslogMetricsSnapshot {
    pub connections_total: u64,
    pub lines_received: u64,
    pub bytes_received: u64,
    pub datagrams_received: u64,
}

/// Intake errors.
#[derive(Debug, thiserror::Error)]
pub enum SyslogError {
    #[error("syslog can't listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of raw syslog payload lines.
///
/// `open` starts background readers and hands back the line channel; the
/// channel closes when the cancellation token fires.
#[async_trait]
pub trait LineSource: Send + Sync {
    async fn open(&self, cancel: CancellationToken) -> Result<mpsc::Receiver<String>, SyslogError>;
}

/// TCP+UDP syslog listener.
///
/// Sockets are bound eagerly by [`SyslogSource::bind`], so the actual port
/// is known before the readers start (ephemeral ports in tests).
pub struct SyslogSource {
    queue_size: usize,
    bound: parking_lot::Mutex<Option<Bound>>,
    local_addr: SocketAddr,
    metrics: Arc<SyslogMetrics>,
}

struct Bound {
    tcp: TcpListener,
    udp: UdpSocket,
}

impl SyslogSource {
    /// Bind the TCP listener and UDP socket on the configured port.
    pub async fn bind(config: &SyslogConfig) -> Result<SyslogSource, SyslogError> {
        let addr = format!("{}:{}", config.address, config.port);
        let tcp = TcpListener::bind(&addr).await.map_err(|e| SyslogError::Bind {
            address: addr.clone(),
            source: e,
        })?;
        let local_addr = tcp.local_addr()?;

        // one port for both transports, even when the OS picked it
        let udp_addr = format!("{}:{}", config.address, local_addr.port());
        let udp = UdpSocket::bind(&udp_addr).await.map_err(|e| SyslogError::Bind {
            address: udp_addr,
            source: e,
        })?;

        info!(addr = %local_addr, "syslog listening on tcp+udp");
        Ok(SyslogSource {
            queue_size: config.queue_size,
            bound: parking_lot::Mutex::new(Some(Bound { tcp, udp })),
            local_addr,
            metrics: Arc::new(SyslogMetrics::new()),
        })
    }

    /// Actual bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Intake counters; stay valid after `open`.
    pub fn metrics(&self) -> Arc<SyslogMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[async_trait]
impl LineSource for SyslogSource {
    async fn open(&self, cancel: CancellationToken) -> Result<mpsc::Receiver<String>, SyslogError> {
        let bound = self
            .bound
            .lock()
            .take()
            .ok_or_else(|| SyslogError::Io(std::io::Error::other("syslog source already opened")))?;

        let (tx, rx) = mpsc::channel(self.queue_size);

        let accept_cancel = cancel.clone();
        let accept_tx = tx.clone();
        let accept_metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            accept_loop(bound.tcp, accept_tx, accept_cancel, accept_metrics).await;
        });

        let udp_metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            udp_loop(bound.udp, tx, cancel, udp_metrics).await;
        });

        Ok(rx)
    }
}

/// Accept TCP connections until canceled, one reader task per connection.
async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    metrics: Arc<SyslogMetrics>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "syslog tcp connection");
                        metrics.connection_opened();
                        let tx = tx.clone();
                        let cancel = cancel.clone();
                        let metrics = Arc::clone(&metrics);
                        tokio::spawn(async move {
                            let mut lines = BufReader::new(stream).lines();
                            loop {
                                tokio::select! {
                                    _ = cancel.cancelled() => break,
                                    line = lines.next_line() => match line {
                                        Ok(Some(line)) => {
                                            if deliver(&tx, line, &metrics).await.is_err() {
                                                break;
                                            }
                                        }
                                        Ok(None) => break,
                                        Err(e) => {
                                            debug!(%peer, error = %e, "syslog tcp read failed");
                                            break;
                                        }
                                    },
                                }
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "syslog tcp accept failed");
                    }
                }
            }
        }
    }
    let snapshot = metrics.snapshot();
    warn!(
        connections = snapshot.connections_total,
        lines = snapshot.lines_received,
        "syslog tcp acceptor terminated"
    );
}

/// Read UDP datagrams until canceled; a datagram may carry several lines.
async fn udp_loop(
    socket: UdpSocket,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    metrics: Arc<SyslogMetrics>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((n, _peer)) => {
                        metrics.datagram_received();
                        let text = String::from_utf8_lossy(&buf[..n]);
                        for line in text.lines() {
                            if line.is_empty() {
                                continue;
                            }
                            if deliver(&tx, line.to_string(), &metrics).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "syslog udp recv failed");
                    }
                }
            }
        }
    }
    warn!("syslog udp reader terminated");
}

/// Strip the `<pri>` prefix and push the line downstream.
async fn deliver(
    tx: &mpsc::Sender<String>,
    line: String,
    metrics: &SyslogMetrics,
) -> Result<(), ()> {
    let line = strip_priority(line);
    metrics.line_received(line.len() as u64);
    tx.send(line).await.map_err(|_| ())
}

/// Drop a leading `<N>` priority tag, when present.
fn strip_priority(line: String) -> String {
    if line.starts_with('<') {
        if let Some(pos) = line.find('>') {
            return line[pos + 1..].to_string();
        }
    }
    line
}

#[cfg(test)]
#[path = "syslog_test.rs"]
mod syslog_test;
