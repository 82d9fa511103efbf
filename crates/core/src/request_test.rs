//! Tests for the query descriptor

use chrono::{TimeZone, Utc};

use crate::request::Request;

#[test]
fn test_serde_wire_names() {
    let req = Request {
        last_id: "5ce8718aef1d7346a5443a3f".into(),
        limit: 100,
        hosts: vec!["h1".into()],
        ..Request::default()
    };

    let js = serde_json::to_value(&req).unwrap();
    assert_eq!(js["id"], "5ce8718aef1d7346a5443a3f");
    assert_eq!(js["max"], 100);
    assert_eq!(js["hosts"][0], "h1");
    assert!(js.get("containers").is_none(), "empty lists are omitted");
    assert!(js.get("from_ts").is_none(), "unset bounds are omitted");
}

#[test]
fn test_deserialize_empty_object() {
    let req: Request = serde_json::from_str("{}").unwrap();
    assert_eq!(req, Request::default());
}

#[test]
fn test_display() {
    let req = Request {
        last_id: "abc".into(),
        limit: 10,
        hosts: vec!["h1".into()],
        from_ts: Some(Utc.with_ymd_and_hms(2019, 5, 24, 20, 54, 30).unwrap()),
        ..Request::default()
    };
    let s = req.to_string();
    assert!(s.contains("hosts=[\"h1\"]"));
    assert!(s.contains("max=10"));
    assert!(s.contains("from=2019-05-24T20:54:30Z"));
    assert!(s.ends_with("last-id=abc"));
}
