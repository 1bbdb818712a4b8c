// ==========================================
// 铸机排产系统 - 重叠校验引擎 (Overlap Validator)
// ==========================================
// 规则:
// 1) 与锁定/冻结时间槽重叠 → OverlapWithLocked
// 2) 与开始时间早于候选开始的可移动时间槽重叠 → OverlapWithEarlierMovable
// 3) 与开始时间不早于候选开始的可移动时间槽重叠 → 允许,由移位引擎消解
// 纯判定,无副作用
// ==========================================

use crate::engine::error::{EngineResult, ScheduleError};
use crate::engine::timeline::Timeline;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictReason {
    OverlapWithLocked,
    OverlapWithEarlierMovable,
}

/// 校验结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapVerdict {
    Ok,
    Conflict {
        slot_id: String,
        reason: ConflictReason,
    },
}

impl OverlapVerdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, OverlapVerdict::Ok)
    }

    pub fn into_result(self) -> EngineResult<()> {
        match self {
            OverlapVerdict::Ok => Ok(()),
            OverlapVerdict::Conflict {
                slot_id,
                reason: ConflictReason::OverlapWithLocked,
            } => Err(ScheduleError::OverlapWithLocked { slot_id }),
            OverlapVerdict::Conflict {
                slot_id,
                reason: ConflictReason::OverlapWithEarlierMovable,
            } => Err(ScheduleError::OverlapWithEarlierMovable { slot_id }),
        }
    }
}

// ==========================================
// OverlapValidator
// ==========================================
#[derive(Debug, Default)]
pub struct OverlapValidator {}

impl OverlapValidator {
    pub fn new() -> Self {
        Self {}
    }

    /// 校验候选区间 [candidate_start, candidate_end)
    ///
    /// # 参数
    /// - `excluding`: 不参与校验的时间槽(移动自身时传入)
    pub fn check_insertion(
        &self,
        timeline: &Timeline,
        candidate_start: NaiveDateTime,
        candidate_end: NaiveDateTime,
        excluding: Option<&str>,
    ) -> OverlapVerdict {
        let others = || {
            timeline
                .entries()
                .iter()
                .filter(move |e| excluding != Some(e.slot_id()))
        };

        if let Some(locked) = others()
            .filter(|e| e.class.is_blocking())
            .find(|e| e.slot.overlaps(candidate_start, candidate_end))
        {
            return OverlapVerdict::Conflict {
                slot_id: locked.slot.slot_id.clone(),
                reason: ConflictReason::OverlapWithLocked,
            };
        }

        if let Some(earlier) = others()
            .filter(|e| e.class.is_movable() && e.start() < candidate_start)
            .find(|e| e.slot.overlaps(candidate_start, candidate_end))
        {
            return OverlapVerdict::Conflict {
                slot_id: earlier.slot.slot_id.clone(),
                reason: ConflictReason::OverlapWithEarlierMovable,
            };
        }

        OverlapVerdict::Ok
    }
}
