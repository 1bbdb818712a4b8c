// 引擎单元测试共用构造器

use crate::domain::slot::{Slot, SlotAttributes, SlotMove};
use crate::domain::types::{SlotKind, SlotStatus, StatusPolicy};
use crate::engine::collaborators::AlwaysUnstarted;
use crate::engine::timeline::Timeline;
use chrono::{NaiveDate, NaiveDateTime};

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

pub fn slot(id: &str, start: NaiveDateTime, end: NaiveDateTime, status: SlotStatus) -> Slot {
    Slot {
        slot_id: id.to_string(),
        caster_id: "CASTER-1".to_string(),
        kind: SlotKind::Production,
        status,
        planned_start: start,
        planned_end: end,
        planned_duration_sec: Some((end - start).num_seconds()),
        actual_start: None,
        actual_end: None,
        process_started_at: None,
        linked_process_ref: None,
        attrs: SlotAttributes::default(),
        created_by: "test".to_string(),
        created_at: at(0, 0),
        updated_at: at(0, 0),
        revision: 0,
    }
}

/// 默认状态策略 + 全部工序未开工
pub fn timeline_of(slots: Vec<Slot>) -> Timeline {
    Timeline::classify("CASTER-1", slots, &StatusPolicy::default(), &AlwaysUnstarted).unwrap()
}

pub fn find_move<'a>(moves: &'a [SlotMove], slot_id: &str) -> Option<&'a SlotMove> {
    moves.iter().find(|m| m.slot_id == slot_id)
}
