// ==========================================
// 铸机排产系统 - 插入规划引擎 (Insertion Planner)
// ==========================================
// 流程:
// 1) 时长/过去时间校验
// 2) 请求开始时间落在已有时间槽内 → 吸附
// 3) 吸附后再次校验过去时间
// 4) 重叠校验
// 5) 计算平移起点与平移量,生成受影响时间槽清单
// 红线: 规划只产出方案,不写库
// ==========================================

use crate::domain::slot::{Slot, SlotMove};
use crate::engine::error::{EngineResult, ScheduleError};
use crate::engine::overlap::OverlapValidator;
use crate::engine::shift::ShiftEngine;
use crate::engine::timeline::{SlotClass, Timeline, TimelineEntry};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// 插入预览结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertionPreview {
    pub caster_id: String,
    pub requested_start: NaiveDateTime,
    pub requested_end: NaiveDateTime,
    pub suggested_start: NaiveDateTime,
    pub suggested_end: NaiveDateTime,
    pub snapped: bool,                      // 是否发生吸附
    pub shift_from: Option<NaiveDateTime>,  // 平移起点(最早的受影响可移动时间槽开始)
    pub shift_from_slot_id: Option<String>,
    pub shift_delta_sec: i64,               // 平移量(秒), 0 表示无需平移
    pub affected_slot_ids: Vec<String>,     // 开始时间 >= shift_from 的可移动时间槽
    pub moves: Vec<SlotMove>,               // 实际会发生的窗口变更
}

impl InsertionPreview {
    pub fn shift_delta(&self) -> Duration {
        Duration::seconds(self.shift_delta_sec)
    }
}

/// 人工调整窗口方案
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan {
    pub slot: Slot,          // 调整后的目标时间槽
    pub slot_move: SlotMove, // 目标时间槽自身的窗口变更
    pub moves: Vec<SlotMove>, // 级联重排引起的其他变更
}

// ==========================================
// InsertionPlanner
// ==========================================
#[derive(Debug, Default)]
pub struct InsertionPlanner {
    validator: OverlapValidator,
    shift_engine: ShiftEngine,
}

impl InsertionPlanner {
    pub fn new() -> Self {
        Self {
            validator: OverlapValidator::new(),
            shift_engine: ShiftEngine::new(),
        }
    }

    /// 预览插入
    ///
    /// # 参数
    /// - `timeline`: 已分类的铸机时间轴
    /// - `requested_start`/`requested_end`: 请求窗口
    /// - `now`: 当前时间
    ///
    /// # 错误
    /// - `InvalidDuration`, `PastSchedulingAttempt`
    /// - `OverlapWithLocked`, `OverlapWithEarlierMovable`
    #[instrument(skip(self, timeline), fields(caster_id = %timeline.caster_id()))]
    pub fn preview_insertion(
        &self,
        timeline: &Timeline,
        requested_start: NaiveDateTime,
        requested_end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> EngineResult<InsertionPreview> {
        ensure_valid_window(requested_start, requested_end, now)?;
        let duration = requested_end - requested_start;

        let suggested_start = match timeline.find_containing(requested_start) {
            Some(overlapped) => snap_start(timeline, overlapped, now),
            None => requested_start,
        };
        let suggested_end = suggested_start + duration;
        let snapped = suggested_start != requested_start;
        if snapped {
            tracing::debug!(
                requested_start = %requested_start,
                suggested_start = %suggested_start,
                "请求开始时间落在已有时间槽内,已吸附"
            );
        }

        if suggested_start < now {
            return Err(ScheduleError::PastSchedulingAttempt {
                start: suggested_start,
                now,
            });
        }

        self.validator
            .check_insertion(timeline, suggested_start, suggested_end, None)
            .into_result()?;

        let shift_from = timeline
            .movable()
            .find(|e| e.start() >= suggested_start)
            .map(|e| (e.start(), e.slot.slot_id.clone()));

        let (delta, affected_slot_ids, moves) = match &shift_from {
            Some((from, _)) => {
                let delta = (suggested_end - *from).max(Duration::zero());
                let affected: Vec<String> = timeline
                    .movable()
                    .filter(|e| e.start() >= *from)
                    .map(|e| e.slot.slot_id.clone())
                    .collect();
                let moves = self.shift_engine.shift_uniform(timeline, *from, delta)?;
                (delta, affected, moves)
            }
            None => (Duration::zero(), Vec::new(), Vec::new()),
        };

        Ok(InsertionPreview {
            caster_id: timeline.caster_id().to_string(),
            requested_start,
            requested_end,
            suggested_start,
            suggested_end,
            snapped,
            shift_from: shift_from.as_ref().map(|(t, _)| *t),
            shift_from_slot_id: shift_from.map(|(_, id)| id),
            shift_delta_sec: delta.num_seconds(),
            affected_slot_ids,
            moves,
        })
    }

    /// 规划人工调整窗口
    ///
    /// 目标必须是 Movable 类时间槽; 新窗口经过与插入相同的校验(排除自身),
    /// 再从新开始时间做级联重排
    pub fn plan_move(
        &self,
        timeline: &Timeline,
        target: &TimelineEntry,
        new_start: NaiveDateTime,
        new_end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> EngineResult<MovePlan> {
        if target.slot.status.is_terminal() {
            return Err(ScheduleError::SlotTerminal {
                slot_id: target.slot.slot_id.clone(),
                status: target.slot.status,
            });
        }
        if target.class != SlotClass::Movable {
            return Err(ScheduleError::SlotNotMovable {
                slot_id: target.slot.slot_id.clone(),
                class: target.class,
            });
        }

        ensure_valid_window(new_start, new_end, now)?;
        self.validator
            .check_insertion(timeline, new_start, new_end, Some(target.slot_id()))
            .into_result()?;

        let mut slot = target.slot.clone();
        slot.planned_start = new_start;
        slot.planned_end = new_end;
        slot.planned_duration_sec = Some((new_end - new_start).num_seconds());
        slot.updated_at = now;

        let slot_move = SlotMove::from_slot(&target.slot, new_start, new_end);
        let moves = self
            .shift_engine
            .restack_after(timeline, target.slot_id(), new_start, new_end, new_start);

        Ok(MovePlan {
            slot,
            slot_move,
            moves,
        })
    }
}

fn ensure_valid_window(start: NaiveDateTime, end: NaiveDateTime, now: NaiveDateTime) -> EngineResult<()> {
    if end <= start {
        return Err(ScheduleError::InvalidDuration { start, end });
    }
    if start < now {
        return Err(ScheduleError::PastSchedulingAttempt { start, now });
    }
    Ok(())
}

/// 吸附规则
///
/// - 被覆盖的时间槽已开工: 吸附到其结束(若已过去则取 now)
/// - 存在更早的时间槽: 吸附到前驱结束
/// - 否则吸附到被覆盖时间槽的开始(插在它之前)
fn snap_start(timeline: &Timeline, overlapped: &TimelineEntry, now: NaiveDateTime) -> NaiveDateTime {
    if overlapped.slot.has_begun(now) {
        return overlapped.end().max(now);
    }
    match timeline.predecessor_of(overlapped) {
        Some(prev) => prev.end(),
        None => overlapped.start(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SlotStatus;
    use crate::engine::test_fixtures::{at, find_move, slot, timeline_of};

    #[test]
    fn test_scenario_a_insert_before_and_shift() {
        let timeline = timeline_of(vec![
            slot("P1", at(12, 0), at(13, 0), SlotStatus::Planned),
            slot("P2", at(13, 0), at(14, 0), SlotStatus::Planned),
        ]);

        let preview = InsertionPlanner::new()
            .preview_insertion(&timeline, at(11, 0), at(12, 30), at(8, 0))
            .unwrap();

        assert!(!preview.snapped);
        assert_eq!(preview.suggested_start, at(11, 0));
        assert_eq!(preview.suggested_end, at(12, 30));
        assert_eq!(preview.shift_from, Some(at(12, 0)));
        assert_eq!(preview.shift_delta(), Duration::minutes(30));
        assert_eq!(preview.affected_slot_ids, vec!["P1".to_string(), "P2".to_string()]);

        let p1 = find_move(&preview.moves, "P1").unwrap();
        assert_eq!((p1.new_start, p1.new_end), (at(12, 30), at(13, 30)));
        let p2 = find_move(&preview.moves, "P2").unwrap();
        assert_eq!((p2.new_start, p2.new_end), (at(13, 30), at(14, 30)));
    }

    #[test]
    fn test_scenario_d_invalid_duration() {
        let timeline = timeline_of(vec![]);
        let result = InsertionPlanner::new().preview_insertion(&timeline, at(9, 0), at(8, 30), at(6, 0));
        assert_eq!(
            result,
            Err(ScheduleError::InvalidDuration {
                start: at(9, 0),
                end: at(8, 30)
            })
        );
    }

    #[test]
    fn test_past_request_rejected() {
        let timeline = timeline_of(vec![]);
        let result = InsertionPlanner::new().preview_insertion(&timeline, at(7, 0), at(8, 0), at(7, 30));
        assert!(matches!(result, Err(ScheduleError::PastSchedulingAttempt { .. })));
    }

    #[test]
    fn test_snap_behind_started_slot() {
        let mut running = slot("R", at(10, 0), at(12, 0), SlotStatus::Casting);
        running.actual_start = Some(at(10, 0));
        let timeline = timeline_of(vec![
            running,
            slot("P1", at(12, 0), at(13, 0), SlotStatus::Planned),
        ]);

        let preview = InsertionPlanner::new()
            .preview_insertion(&timeline, at(11, 0), at(11, 30), at(10, 30))
            .unwrap();

        assert!(preview.snapped);
        assert_eq!(preview.suggested_start, at(12, 0));
        assert_eq!(preview.suggested_end, at(12, 30));
        let p1 = find_move(&preview.moves, "P1").unwrap();
        assert_eq!(p1.new_start, at(12, 30));
    }

    #[test]
    fn test_snap_to_predecessor_end() {
        let timeline = timeline_of(vec![
            slot("P0", at(10, 0), at(11, 0), SlotStatus::Planned),
            slot("P1", at(11, 0), at(12, 0), SlotStatus::Planned),
        ]);

        let preview = InsertionPlanner::new()
            .preview_insertion(&timeline, at(11, 30), at(12, 0), at(8, 0))
            .unwrap();

        // 插在 P0 之后, P1 被推迟 30 分钟
        assert_eq!(preview.suggested_start, at(11, 0));
        assert_eq!(preview.suggested_end, at(11, 30));
        let p1 = find_move(&preview.moves, "P1").unwrap();
        assert_eq!((p1.new_start, p1.new_end), (at(11, 30), at(12, 30)));
        assert!(find_move(&preview.moves, "P0").is_none());
    }

    #[test]
    fn test_snap_to_first_slot_start() {
        let timeline = timeline_of(vec![slot("P1", at(12, 0), at(13, 0), SlotStatus::Planned)]);

        let preview = InsertionPlanner::new()
            .preview_insertion(&timeline, at(12, 20), at(12, 50), at(8, 0))
            .unwrap();

        assert_eq!(preview.suggested_start, at(12, 0));
        assert_eq!(preview.shift_delta(), Duration::minutes(30));
    }

    #[test]
    fn test_no_shift_when_gap_is_large_enough() {
        let timeline = timeline_of(vec![slot("P1", at(14, 0), at(15, 0), SlotStatus::Planned)]);

        let preview = InsertionPlanner::new()
            .preview_insertion(&timeline, at(12, 0), at(13, 0), at(8, 0))
            .unwrap();

        assert_eq!(preview.shift_delta_sec, 0);
        assert!(preview.moves.is_empty());
        assert_eq!(preview.affected_slot_ids, vec!["P1".to_string()]);
    }

    #[test]
    fn test_insert_over_locked_rejected() {
        let timeline = timeline_of(vec![
            slot("P1", at(10, 0), at(11, 0), SlotStatus::Planned),
            slot("L", at(11, 0), at(12, 0), SlotStatus::Casting),
        ]);

        // 吸附到 P1 之后仍压到锁定时间槽
        let result = InsertionPlanner::new().preview_insertion(&timeline, at(11, 30), at(12, 30), at(8, 0));
        assert!(matches!(result, Err(ScheduleError::OverlapWithLocked { .. })));
    }

    #[test]
    fn test_plan_move_restacks_from_new_start() {
        let timeline = timeline_of(vec![
            slot("P1", at(12, 0), at(13, 0), SlotStatus::Planned),
            slot("P2", at(13, 0), at(14, 0), SlotStatus::Planned),
            slot("P3", at(15, 0), at(16, 0), SlotStatus::Planned),
        ]);
        let planner = InsertionPlanner::new();
        let target = timeline.get("P3").unwrap();

        // P3 提前到 13:30 会压到更早开始的 P2
        let result = planner.plan_move(&timeline, target, at(13, 30), at(14, 30), at(8, 0));
        assert!(matches!(result, Err(ScheduleError::OverlapWithEarlierMovable { .. })));

        // P3 提前到 12:00, P1/P2 被推到其后
        let plan = planner.plan_move(&timeline, target, at(12, 0), at(13, 0), at(8, 0)).unwrap();
        assert_eq!(plan.slot.planned_start, at(12, 0));
        let p1 = find_move(&plan.moves, "P1").unwrap();
        assert_eq!((p1.new_start, p1.new_end), (at(13, 0), at(14, 0)));
        let p2 = find_move(&plan.moves, "P2").unwrap();
        assert_eq!((p2.new_start, p2.new_end), (at(14, 0), at(15, 0)));
    }

    #[test]
    fn test_plan_move_rejects_locked() {
        let timeline = timeline_of(vec![slot("L", at(12, 0), at(13, 0), SlotStatus::Casting)]);
        let target = timeline.get("L").unwrap();
        let result = InsertionPlanner::new().plan_move(&timeline, target, at(14, 0), at(15, 0), at(8, 0));
        assert_eq!(
            result,
            Err(ScheduleError::SlotNotMovable {
                slot_id: "L".to_string(),
                class: SlotClass::Locked,
            })
        );
    }
}
