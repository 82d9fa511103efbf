//! Tests for the syslog intake

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

use crate::syslog::{strip_priority, LineSource, SyslogConfig, SyslogSource};

fn test_config() -> SyslogConfig {
    SyslogConfig {
        address: "127.0.0.1".into(),
        port: 0,
        ..SyslogConfig::default()
    }
}

#[test]
fn test_strip_priority() {
    assert_eq!(
        strip_priority("<14>May 30 16:49:03 host msg".into()),
        "May 30 16:49:03 host msg"
    );
    assert_eq!(strip_priority("no priority here".into()), "no priority here");
    assert_eq!(strip_priority("<unclosed rest".into()), "<unclosed rest");
}

#[tokio::test]
async fn test_tcp_lines_delivered() {
    let source = SyslogSource::bind(&test_config()).await.unwrap();
    let addr = source.local_addr();
    let cancel = CancellationToken::new();
    let mut rx = source.open(cancel.clone()).await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"<14>May 30 16:49:03 h1 docker/c1[1]: one\nMay 30 16:49:04 h1 docker/c1[1]: two\n")
        .await
        .unwrap();
    stream.flush().await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "May 30 16:49:03 h1 docker/c1[1]: one");

    let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, "May 30 16:49:04 h1 docker/c1[1]: two");

    let snapshot = source.metrics().snapshot();
    assert_eq!(snapshot.connections_total, 1);
    assert_eq!(snapshot.lines_received, 2);
    assert!(snapshot.bytes_received > 0);

    cancel.cancel();
}

#[tokio::test]
async fn test_udp_datagram_delivered() {
    let source = SyslogSource::bind(&test_config()).await.unwrap();
    let addr = source.local_addr();
    let cancel = CancellationToken::new();
    let mut rx = source.open(cancel.clone()).await.unwrap();

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket
        .send_to(b"<6>May 30 16:49:03 h1 docker/c1[1]: from udp", addr)
        .await
        .unwrap();

    let line = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line, "May 30 16:49:03 h1 docker/c1[1]: from udp");

    cancel.cancel();
}

#[tokio::test]
async fn test_channel_closes_on_cancel() {
    let source = SyslogSource::bind(&test_config()).await.unwrap();
    let cancel = CancellationToken::new();
    let mut rx = source.open(cancel.clone()).await.unwrap();

    cancel.cancel();
    let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("channel must close promptly");
    assert!(got.is_none());
}

#[tokio::test]
async fn test_open_twice_fails() {
    let source = SyslogSource::bind(&test_config()).await.unwrap();
    let cancel = CancellationToken::new();
    let _rx = source.open(cancel.clone()).await.unwrap();
    assert!(source.open(cancel).await.is_err());
}
