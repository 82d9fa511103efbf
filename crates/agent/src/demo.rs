//! Demo mode: synthetic containers with canned logs
//!
//! [`DemoEvents`] announces three pretend containers and [`DemoEmitter`]
//! writes realistic lines for each at a fixed cadence. Together they
//! exercise the whole agent path without a container runtime.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::{Event, EventStatus};
use crate::streamer::{EmitError, LogsEmitter, LogsOptions};

const DEMO_CONTAINERS: [&str; 3] = ["nginx", "rest", "mongo"];

/// Event source announcing the demo containers as started.
pub struct DemoEvents;

impl DemoEvents {
    /// Emit one `started` event per demo container, then keep the channel
    /// open until the token fires.
    pub fn channel(cancel: CancellationToken) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(DEMO_CONTAINERS.len() + 1);
        tokio::spawn(async move {
            for name in DEMO_CONTAINERS {
                let event = Event {
                    status: EventStatus::Started,
                    container_id: format!("demo-{name}"),
                    container_name: name.to_string(),
                    group: String::new(),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            debug!("demo containers announced");
            cancel.cancelled().await;
        });
        rx
    }
}

/// Emitter producing canned log lines, no runtime involved.
pub struct DemoEmitter {
    /// Delay between lines.
    pub every: Duration,
}

#[async_trait]
impl LogsEmitter for DemoEmitter {
    async fn logs(&self, opts: LogsOptions) -> Result<(), EmitError> {
        loop {
            tokio::select! {
                _ = opts.cancel.cancelled() => return Err(EmitError::Canceled),
                _ = tokio::time::sleep(self.every) => {
                    let line = pick_line(&opts.container_id);
                    let mut writer = opts.stdout.lock();
                    if let Err(e) = writeln!(writer, "{line}") {
                        debug!(error = %e, "demo log write failed");
                    }
                }
            }
        }
    }
}

fn pick_line(container_id: &str) -> &'static str {
    let mut rng = rand::thread_rng();
    match container_id {
        "demo-nginx" => NGINX_DEMO[rng.gen_range(0..NGINX_DEMO.len())],
        "demo-rest" => REST_DEMO[rng.gen_range(0..REST_DEMO.len())],
        _ => MONGO_DEMO[rng.gen_range(0..MONGO_DEMO.len())],
    }
}

static NGINX_DEMO: &[&str] = &[
    r#"192.168.1.123 - - [29/May/2019:06:51:42 +0000] "GET /rt_podcast651.mp3 HTTP/1.1" 302 70 "-" "AppleCoreMedia/1.0.0.16E227 (iPhone; U; CPU OS 12_2 like Mac OS X; en_us)"#,
    r#"192.168.1.123 - - [29/May/2019:06:51:50 +0000] "GET /rt_podcast651.mp3 HTTP/1.1" 302 70 "-" "CastBox/7.67.2-190518054 (Linux;Android 8.0.0) ExoPlayerLib/2.9.1"#,
    r#"192.168.1.123 - - [29/May/2019:06:51:54 +0000] "HEAD / HTTP/1.1" 301 0 "-" "updown.io daemon 2.2"#,
    r#"192.168.1.123 - - [29/May/2019:06:51:54 +0000] "GET /rt_podcast651.mp3 HTTP/1.1" 302 70 "-" "PodcastAddict/v2 - Dalvik/2.1.0 (Linux; U; Android 9; ONEPLUS A5000 Build/PKQ1.180716.001)"#,
    r#"192.168.1.123 - - [29/May/2019:06:52:08 +0000] "GET /podcast-archives.rss HTTP/1.1" 301 178 "-" "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"#,
    r#"192.168.1.123 - - [29/May/2019:06:52:09 +0000] "GET /rt_podcast651.mp3 HTTP/1.1" 302 70 "-" "atc/1.0 watchOS/5.2.1 model/Watch4,2 hwp/t8006 build/16U113 (6; dt:191)"#,
    r#"192.168.1.123 - - [29/May/2019:06:52:27 +0000] "HEAD / HTTP/1.1" 301 0 "-" "Monit/5.24.0"#,
    r#"192.168.1.123 - - [29/May/2019:06:52:32 +0000] "HEAD /rt_podcast500.mp3 HTTP/1.1" 302 0 "-" "Monit/5.24.0"#,
];

static REST_DEMO: &[&str] = &[
    r#"2019/05/27 16:10:36.274 [INFO]  GET - /api/v1/rss/site?site=radiot - 721f34e65c51 - 200 (15872) - 207.497µs"#,
    r#"2019/05/27 16:10:55.045 [INFO]  POST - /api/v1/counts?site=radiot - d40c6ca5b373 - 200 (3) - 75.952µs - []"#,
    r#"2019/05/27 16:10:55.055 [INFO]  GET - /api/v1/config?site=radiot - d40c6ca5b373 - 200 (498) - 69.365µs"#,
    r#"2019/05/27 16:10:55.241 [INFO]  GET - /api/v1/find?site=radiot&sort=-active&format=tree - d40c6ca5b373 - 200 (23087) - 188.182µs"#,
    r#"2019/05/27 16:11:06.284 [INFO]  GET - /api/v1/rss/site?site=radiot - 721f34e65c51 - 200 (15872) - 862.73µs"#,
    r#"2019/05/27 16:13:36.322 [INFO]  GET - /api/v1/rss/site?site=radiot - 721f34e65c51 - 200 (15872) - 251.704µs"#,
];

static MONGO_DEMO: &[&str] = &[
    r#"2019-05-11T02:04:03.245+0000 I ACCESS   [conn44204] Successfully authenticated as principal root on admin"#,
    r#"2019-05-11T02:04:44.584+0000 I NETWORK  [listener] connection accepted from 172.18.0.9:54266 #45239 (6 connections now open)"#,
    r#"2019-05-11T02:04:44.585+0000 I NETWORK  [conn45239] end connection 172.18.0.9:54266 (5 connections now open)"#,
    r#"2019-05-11T02:07:57.165+0000 I ACCESS   [conn44204] Successfully authenticated as principal root on admin"#,
    r#"2019-05-11T02:09:03.369+0000 I NETWORK  [listener] connection accepted from 172.18.0.9:55068 #45243 (6 connections now open)"#,
    r#"2019-05-11T02:09:03.370+0000 I NETWORK  [conn45243] end connection 172.18.0.9:55068 (5 connections now open)"#,
];

#[cfg(test)]
#[path = "demo_test.rs"]
mod demo_test;
