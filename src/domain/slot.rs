// ==========================================
// 铸机排产系统 - 时间槽领域模型
// ==========================================
// 时间槽(Slot): 铸机时间轴上的一段生产或停机窗口
// 区间语义: 半开区间 [planned_start, planned_end)
// ==========================================

use crate::domain::types::{SlotKind, SlotStatus};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Slot - 时间槽
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: String,                // 时间槽ID
    pub caster_id: String,              // 所属铸机
    pub kind: SlotKind,                 // 生产/停机
    pub status: SlotStatus,             // 状态
    pub planned_start: NaiveDateTime,   // 计划开始
    pub planned_end: NaiveDateTime,     // 计划结束
    pub planned_duration_sec: Option<i64>, // 计划时长(秒); 重锚定时据此重算结束时间
    pub actual_start: Option<NaiveDateTime>, // 实际开始
    pub actual_end: Option<NaiveDateTime>,   // 实际结束
    pub process_started_at: Option<NaiveDateTime>, // 重锚定已执行的标记(工序开始时间戳)
    pub linked_process_ref: Option<String>, // 关联外部工序(熔炼批次)
    pub attrs: SlotAttributes,          // 业务附加属性(调度器不解释)
    pub created_by: String,             // 创建人
    pub created_at: NaiveDateTime,      // 创建时间
    pub updated_at: NaiveDateTime,      // 更新时间
    pub revision: i32,                  // 乐观锁版本
}

/// 时间槽业务附加属性
///
/// 调度器只负责存取,不做校验
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotAttributes {
    pub product_item: Option<String>,
    pub alloy: Option<String>,
    pub temper: Option<String>,
    pub width_mm: Option<f64>,
    pub final_gauge_mm: Option<f64>,
    pub planned_weight_mt: Option<f64>,
    pub downtime_reason: Option<String>,
    pub remark: Option<String>,
}

impl Slot {
    /// 当前计划窗口长度
    pub fn window_duration(&self) -> Duration {
        self.planned_end - self.planned_start
    }

    /// 有效计划时长: 优先取记录的 planned_duration, 缺失时退回当前窗口长度
    pub fn effective_duration(&self) -> Duration {
        match self.planned_duration_sec {
            Some(secs) if secs > 0 => Duration::seconds(secs),
            _ => self.window_duration(),
        }
    }

    /// 半开区间重叠判定: a.start < b.end && b.start < a.end
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.planned_start < end && start < self.planned_end
    }

    /// 时刻是否落在计划窗口内
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.planned_start <= t && t < self.planned_end
    }

    /// 是否已实际开工(实际开始时间已记录且不晚于 now)
    pub fn has_begun(&self, now: NaiveDateTime) -> bool {
        matches!(self.actual_start, Some(started) if started <= now)
    }

    /// 将计划窗口平移到新的开始时间(保持窗口长度)
    pub fn moved_to(&self, new_start: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        (new_start, new_start + self.window_duration())
    }
}

// ==========================================
// SlotMove - 单个时间槽的窗口变更
// ==========================================
// 用途: 影响预览、审计日志
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMove {
    pub slot_id: String,
    pub old_start: NaiveDateTime,
    pub old_end: NaiveDateTime,
    pub new_start: NaiveDateTime,
    pub new_end: NaiveDateTime,
}

impl SlotMove {
    pub fn from_slot(slot: &Slot, new_start: NaiveDateTime, new_end: NaiveDateTime) -> Self {
        Self {
            slot_id: slot.slot_id.clone(),
            old_start: slot.planned_start,
            old_end: slot.planned_end,
            new_start,
            new_end,
        }
    }

    /// 时长是否保持不变
    pub fn preserves_duration(&self) -> bool {
        self.new_end - self.new_start == self.old_end - self.old_start
    }

    pub fn delta(&self) -> Duration {
        self.new_start - self.old_start
    }
}

// ==========================================
// TimelineChange - 一次原子提交的变更集
// ==========================================
// 红线: 要么全部提交,要么全部不提交
#[derive(Debug, Clone, Default)]
pub struct TimelineChange {
    pub inserted: Option<Slot>, // 新增时间槽
    pub updated: Vec<Slot>,     // 需整行更新的时间槽(携带读取时的 revision)
    pub moves: Vec<SlotMove>,   // 窗口变更明细(审计用)
}

impl TimelineChange {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_none() && self.updated.is_empty()
    }
}
