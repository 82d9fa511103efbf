//! Tests for event filtering and normalization

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::event::{Event, EventFilter, EventStatus};

fn started(id: &str, name: &str) -> Event {
    Event {
        status: EventStatus::Started,
        container_id: id.into(),
        container_name: name.into(),
        group: String::new(),
    }
}

#[test]
fn test_allows() {
    let all = EventFilter::default();
    assert!(all.allows("anything"));

    let include = EventFilter::new(vec!["web".into()], vec![]);
    assert!(include.allows("web"));
    assert!(!include.allows("db"));

    let exclude = EventFilter::new(vec![], vec!["noisy".into()]);
    assert!(exclude.allows("web"));
    assert!(!exclude.allows("noisy"));
}

#[tokio::test]
async fn test_apply_filters_and_normalizes() {
    let (tx, raw) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let mut filtered = EventFilter::new(vec![], vec!["secret".into()]).apply(raw, cancel.clone());

    tx.send(started("id1", "/web")).await.unwrap();
    tx.send(started("id2", "secret")).await.unwrap();
    tx.send(started("id3", "staging/api")).await.unwrap();
    drop(tx);

    let first = filtered.recv().await.unwrap();
    assert_eq!(first.container_name, "web", "leading slash stripped");

    let second = filtered.recv().await.unwrap();
    assert_eq!(second.container_id, "id3", "filtered event skipped");
    assert_eq!(second.container_name, "api");
    assert_eq!(second.group, "staging", "group lifted from the name");

    assert!(filtered.recv().await.is_none(), "closes with the source");
}
