// ==========================================
// 铸机排产系统 - 时间轴视图与时间槽分类
// ==========================================
// 职责: 将一台铸机的时间槽按状态集合策略分类,供各引擎只读使用
// 分类:
// - Movable: 状态可移动,未开工,关联工序未开工
// - Frozen: 状态可移动,但关联工序已开工(二级锁定)
// - Locked: 锁定状态 / 已记录实际开始 / 状态不属于任一集合
// - Inactive: 已取消(NOT_PRODUCED), 既不阻挡也不移动
// ==========================================

use crate::domain::slot::Slot;
use crate::domain::types::{SlotStatus, StatusPolicy};
use crate::engine::collaborators::ProcessStateProbe;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotClass {
    Movable,
    Frozen,
    Locked,
    Inactive,
}

impl SlotClass {
    /// 是否阻挡其他时间槽(锁定或冻结)
    pub fn is_blocking(&self) -> bool {
        matches!(self, SlotClass::Locked | SlotClass::Frozen)
    }

    pub fn is_movable(&self) -> bool {
        matches!(self, SlotClass::Movable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotClass::Movable => "MOVABLE",
            SlotClass::Frozen => "FROZEN",
            SlotClass::Locked => "LOCKED",
            SlotClass::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for SlotClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个时间槽的分类
///
/// # 参数
/// - `linked_unstarted`: 关联工序是否仍未开工(无关联工序时传 true)
pub fn classify_slot(slot: &Slot, policy: &StatusPolicy, linked_unstarted: bool) -> SlotClass {
    if slot.status == SlotStatus::NotProduced {
        return SlotClass::Inactive;
    }
    if policy.is_locked(slot.status) || !policy.is_movable(slot.status) {
        return SlotClass::Locked;
    }
    if slot.actual_start.is_some() {
        return SlotClass::Locked;
    }
    if !linked_unstarted {
        return SlotClass::Frozen;
    }
    SlotClass::Movable
}

/// 时间轴条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub slot: Slot,
    pub class: SlotClass,
}

impl TimelineEntry {
    pub fn slot_id(&self) -> &str {
        &self.slot.slot_id
    }

    pub fn start(&self) -> NaiveDateTime {
        self.slot.planned_start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.slot.planned_end
    }
}

// ==========================================
// Timeline - 单台铸机的分类时间轴
// ==========================================
// 条目按 (planned_start, planned_end, slot_id) 升序
#[derive(Debug, Clone)]
pub struct Timeline {
    caster_id: String,
    policy: StatusPolicy,
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new(caster_id: impl Into<String>, policy: StatusPolicy, mut entries: Vec<TimelineEntry>) -> Self {
        entries.sort_by(|a, b| {
            (a.start(), a.end(), a.slot_id()).cmp(&(b.start(), b.end(), b.slot_id()))
        });
        Self {
            caster_id: caster_id.into(),
            policy,
            entries,
        }
    }

    /// 读取时间槽并分类
    ///
    /// 仅对"状态可移动且未开工且有关联工序"的时间槽询问探针
    pub fn classify(
        caster_id: impl Into<String>,
        slots: Vec<Slot>,
        policy: &StatusPolicy,
        probe: &dyn ProcessStateProbe,
    ) -> anyhow::Result<Self> {
        let mut entries = Vec::with_capacity(slots.len());
        for slot in slots {
            let needs_probe = policy.is_movable(slot.status) && slot.actual_start.is_none();
            let linked_unstarted = match (&slot.linked_process_ref, needs_probe) {
                (Some(process_ref), true) => probe.is_unstarted(process_ref)?,
                _ => true,
            };
            let class = classify_slot(&slot, policy, linked_unstarted);
            entries.push(TimelineEntry { slot, class });
        }
        Ok(Self::new(caster_id, policy.clone(), entries))
    }

    pub fn caster_id(&self) -> &str {
        &self.caster_id
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TimelineEntry> {
        self.entries
    }

    pub fn get(&self, slot_id: &str) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.slot_id() == slot_id)
    }

    /// 未取消的时间槽
    pub fn active(&self) -> impl Iterator<Item = &TimelineEntry> + '_ {
        self.entries.iter().filter(|e| e.class != SlotClass::Inactive)
    }

    /// 锁定或冻结的时间槽
    pub fn blocking(&self) -> impl Iterator<Item = &TimelineEntry> + '_ {
        self.entries.iter().filter(|e| e.class.is_blocking())
    }

    pub fn movable(&self) -> impl Iterator<Item = &TimelineEntry> + '_ {
        self.entries.iter().filter(|e| e.class.is_movable())
    }

    /// 时刻 t 所在的时间槽
    pub fn find_containing(&self, t: NaiveDateTime) -> Option<&TimelineEntry> {
        self.active().find(|e| e.slot.contains(t))
    }

    /// 开始时间严格早于 entry 的最近一个时间槽
    pub fn predecessor_of(&self, entry: &TimelineEntry) -> Option<&TimelineEntry> {
        self.active()
            .filter(|e| e.start() < entry.start())
            .last()
    }
}
