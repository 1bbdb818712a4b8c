use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn ts(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn make_test_log(action_id: &str, slot_id: &str, at: NaiveDateTime) -> ActionLog {
    ActionLog {
        action_id: action_id.to_string(),
        caster_id: "CASTER-1".to_string(),
        slot_id: Some(slot_id.to_string()),
        action_type: ActionType::CreateSlot.to_string(),
        action_ts: at,
        actor: "dispatcher".to_string(),
        payload_json: Some(json!({"requested_start": "2026-03-02 11:00:00"})),
        impact_json: Some(json!([{"slot_id": "P1"}])),
        detail: Some("新建时间槽".to_string()),
    }
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = make_test_log("log1", "S1", ts(9, 0));
    assert_eq!(repo.insert(&log).unwrap(), "log1");

    let found = repo.find_by_id("log1").unwrap().unwrap();
    assert_eq!(found.action_type, "CREATE_SLOT");
    assert_eq!(found.action_ts, ts(9, 0));
    assert_eq!(found.impact_json, Some(json!([{"slot_id": "P1"}])));

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_slot_is_chronological() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&make_test_log("log2", "S1", ts(10, 0))).unwrap();
    repo.insert(&make_test_log("log1", "S1", ts(9, 0))).unwrap();
    repo.insert(&make_test_log("log3", "S2", ts(11, 0))).unwrap();

    let logs = repo.find_by_slot("S1").unwrap();
    let ids: Vec<&str> = logs.iter().map(|l| l.action_id.as_str()).collect();
    assert_eq!(ids, vec!["log1", "log2"]);
}

#[test]
fn test_find_recent_by_caster_respects_limit() {
    let repo = ActionLogRepository::new(setup_test_db());

    for (i, h) in [8u32, 9, 10].iter().enumerate() {
        repo.insert(&make_test_log(&format!("log{}", i), "S1", ts(*h, 0))).unwrap();
    }

    let logs = repo.find_recent_by_caster("CASTER-1", 2).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action_id, "log2");

    let in_range = repo.find_by_time_range(ts(8, 30), ts(9, 30)).unwrap();
    assert_eq!(in_range.len(), 1);
}
