// ==========================================
// 铸机排产系统 - 生命周期控制引擎
// ==========================================
// 职责:
// - 重锚定 (Re-anchor): 工序实际开始 → 计划窗口对齐实际开始, 级联重排
// - 完成对账 (Reconcile): 工序实际完成 → 窗口替换为实际窗口, 级联重排
// - 取消守卫 (Cancellation Guard): 仅允许取消未开工的可移动时间槽
// - 子状态推进: 熔炼中 → 铝水就绪 → 浇铸中
// 红线: 终态时间槽对调度器只读
// ==========================================

use crate::domain::slot::{Slot, SlotMove};
use crate::domain::types::{SlotStatus, StatusPolicy};
use crate::engine::error::{BlockReason, EngineResult, ScheduleError};
use crate::engine::shift::ShiftEngine;
use crate::engine::timeline::{SlotClass, Timeline, TimelineEntry};
use chrono::NaiveDateTime;

/// 生命周期事件处理方案
#[derive(Debug, Clone, PartialEq)]
pub struct LifecyclePlan {
    pub slot: Slot,                  // 处理后的目标时间槽
    pub slot_move: Option<SlotMove>, // 目标窗口变更(窗口不变时为 None)
    pub moves: Vec<SlotMove>,        // 级联重排引起的其他变更
}

/// 重锚定结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReanchorOutcome {
    Applied(LifecyclePlan),
    /// 已执行过重锚定,本次为空操作
    AlreadyAnchored(Slot),
}

// ==========================================
// LifecycleController
// ==========================================
#[derive(Debug, Default)]
pub struct LifecycleController {
    shift_engine: ShiftEngine,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self {
            shift_engine: ShiftEngine::new(),
        }
    }

    /// 工序开始重锚定
    ///
    /// 仅首次生效(以 process_started_at 为标记)
    /// 新窗口 = [actual_start, actual_start + 计划时长)
    pub fn reanchor_on_start(
        &self,
        timeline: &Timeline,
        target: &TimelineEntry,
        actual_start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> EngineResult<ReanchorOutcome> {
        ensure_not_terminal(&target.slot)?;

        if target.slot.process_started_at.is_some() {
            tracing::debug!(slot_id = %target.slot_id(), "时间槽已重锚定,忽略重复开工事件");
            return Ok(ReanchorOutcome::AlreadyAnchored(target.slot.clone()));
        }

        let duration = target.slot.effective_duration();
        let new_start = actual_start;
        let new_end = actual_start + duration;

        let mut slot = target.slot.clone();
        slot.planned_start = new_start;
        slot.planned_end = new_end;
        slot.planned_duration_sec = Some(duration.num_seconds());
        slot.actual_start = Some(actual_start);
        slot.process_started_at = Some(actual_start);
        if timeline.policy().is_movable(slot.status) {
            slot.status = SlotStatus::first_in_process();
        }
        slot.updated_at = now;

        warn_if_blocked(timeline, target.slot_id(), new_start, new_end);

        let reference = target.start().min(new_start);
        let moves = self
            .shift_engine
            .restack_after(timeline, target.slot_id(), new_start, new_end, reference);

        Ok(ReanchorOutcome::Applied(LifecyclePlan {
            slot_move: window_change(&target.slot, new_start, new_end),
            slot,
            moves,
        }))
    }

    /// 工序完成对账
    ///
    /// 窗口替换为 [actual_start, actual_end); 实际开始未知时取 [planned_start, actual_end)
    /// 只接受锁定且非终态的时间槽
    pub fn reconcile_on_complete(
        &self,
        timeline: &Timeline,
        target: &TimelineEntry,
        actual_end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> EngineResult<LifecyclePlan> {
        ensure_not_terminal(&target.slot)?;

        if !timeline.policy().is_locked(target.slot.status) {
            return Err(ScheduleError::InvalidStateTransition {
                slot_id: target.slot.slot_id.clone(),
                from: target.slot.status,
                to: SlotStatus::completion(),
            });
        }

        let new_start = target.slot.actual_start.unwrap_or(target.slot.planned_start);
        if actual_end <= new_start {
            return Err(ScheduleError::InvalidDuration {
                start: new_start,
                end: actual_end,
            });
        }

        let mut slot = target.slot.clone();
        slot.planned_start = new_start;
        slot.planned_end = actual_end;
        slot.actual_end = Some(actual_end);
        slot.status = SlotStatus::completion();
        slot.updated_at = now;

        warn_if_blocked(timeline, target.slot_id(), new_start, actual_end);

        let reference = target.start().min(new_start);
        let moves = self
            .shift_engine
            .restack_after(timeline, target.slot_id(), new_start, actual_end, reference);

        Ok(LifecyclePlan {
            slot_move: window_change(&target.slot, new_start, actual_end),
            slot,
            moves,
        })
    }

    /// 取消守卫
    ///
    /// 允许条件: 状态在可移动集合,未实际开工,关联工序未开工
    pub fn check_cancellation(&self, target: &TimelineEntry, policy: &StatusPolicy) -> EngineResult<()> {
        let blocked = |reason| {
            Err(ScheduleError::CancellationBlocked {
                slot_id: target.slot.slot_id.clone(),
                reason,
            })
        };

        if target.slot.status.is_terminal() {
            return blocked(BlockReason::TerminalStatus);
        }
        if !policy.is_movable(target.slot.status) {
            return blocked(BlockReason::LockedStatus);
        }
        if target.slot.actual_start.is_some() {
            return blocked(BlockReason::ExecutionStarted);
        }
        if target.class == SlotClass::Frozen {
            return blocked(BlockReason::LinkedProcessStarted);
        }
        Ok(())
    }

    /// 取消时间槽: 状态置为 NOT_PRODUCED, 窗口保留
    pub fn plan_cancel(
        &self,
        target: &TimelineEntry,
        policy: &StatusPolicy,
        now: NaiveDateTime,
    ) -> EngineResult<Slot> {
        self.check_cancellation(target, policy)?;

        let mut slot = target.slot.clone();
        slot.status = SlotStatus::NotProduced;
        slot.updated_at = now;
        Ok(slot)
    }

    /// 推进工序子状态(只进不退)
    ///
    /// 允许: MELTING → METAL_READY → CASTING, 且前后状态都在锁定集合内
    /// COILS_COMPLETE 只能经完成对账, NOT_PRODUCED 只能经取消
    pub fn advance_status(
        &self,
        target: &TimelineEntry,
        policy: &StatusPolicy,
        next: SlotStatus,
        now: NaiveDateTime,
    ) -> EngineResult<Slot> {
        ensure_not_terminal(&target.slot)?;

        let current = target.slot.status;
        let in_process = current >= SlotStatus::first_in_process()
            && current < SlotStatus::Casting
            && policy.is_locked(current);
        let valid_target = next > current && next <= SlotStatus::Casting && policy.is_locked(next);
        if !in_process || !valid_target {
            return Err(ScheduleError::InvalidStateTransition {
                slot_id: target.slot.slot_id.clone(),
                from: current,
                to: next,
            });
        }

        let mut slot = target.slot.clone();
        slot.status = next;
        slot.updated_at = now;
        Ok(slot)
    }
}

fn ensure_not_terminal(slot: &Slot) -> EngineResult<()> {
    if slot.status.is_terminal() {
        return Err(ScheduleError::SlotTerminal {
            slot_id: slot.slot_id.clone(),
            status: slot.status,
        });
    }
    Ok(())
}

fn window_change(slot: &Slot, new_start: NaiveDateTime, new_end: NaiveDateTime) -> Option<SlotMove> {
    if slot.planned_start == new_start && slot.planned_end == new_end {
        None
    } else {
        Some(SlotMove::from_slot(slot, new_start, new_end))
    }
}

/// 实际时间来自现场事件,压到其他锁定时间槽时只告警不拒绝
fn warn_if_blocked(timeline: &Timeline, slot_id: &str, start: NaiveDateTime, end: NaiveDateTime) {
    for other in timeline
        .blocking()
        .filter(|e| e.slot_id() != slot_id && e.slot.overlaps(start, end))
    {
        tracing::warn!(
            slot_id = %slot_id,
            other_slot_id = %other.slot_id(),
            "实际窗口与锁定时间槽重叠"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_fixtures::{at, find_move, slot, timeline_of};
    use chrono::Duration;

    fn applied(outcome: ReanchorOutcome) -> LifecyclePlan {
        match outcome {
            ReanchorOutcome::Applied(plan) => plan,
            other => panic!("Expected Applied, got {:?}", other),
        }
    }

    #[test]
    fn test_scenario_b_early_start_leaves_earlier_slot() {
        let mut p2 = slot("P2", at(13, 0), at(14, 0), SlotStatus::Melting);
        p2.actual_start = Some(at(13, 0));
        let timeline = timeline_of(vec![
            slot("P1", at(12, 0), at(13, 0), SlotStatus::Planned),
            p2,
            slot("P3", at(14, 0), at(15, 0), SlotStatus::Planned),
        ]);
        let target = timeline.get("P2").unwrap();

        let plan = applied(
            LifecycleController::new()
                .reanchor_on_start(&timeline, target, at(12, 45), at(12, 50))
                .unwrap(),
        );

        assert_eq!(plan.slot.planned_start, at(12, 45));
        assert_eq!(plan.slot.planned_end, at(13, 45));
        assert_eq!(plan.slot.process_started_at, Some(at(12, 45)));
        assert!(find_move(&plan.moves, "P1").is_none());
        assert!(find_move(&plan.moves, "P3").is_none());
    }

    #[test]
    fn test_late_start_pushes_followers_and_locks_status() {
        let timeline = timeline_of(vec![
            slot("A", at(12, 0), at(13, 0), SlotStatus::Released),
            slot("B", at(13, 0), at(14, 0), SlotStatus::Planned),
            slot("C", at(14, 0), at(15, 0), SlotStatus::Planned),
        ]);
        let target = timeline.get("A").unwrap();

        let plan = applied(
            LifecycleController::new()
                .reanchor_on_start(&timeline, target, at(13, 30), at(13, 30))
                .unwrap(),
        );

        assert_eq!(plan.slot.status, SlotStatus::Melting);
        assert_eq!(plan.slot.actual_start, Some(at(13, 30)));
        assert_eq!((plan.slot.planned_start, plan.slot.planned_end), (at(13, 30), at(14, 30)));

        // B 原本在 A 之后,即使开始早于 A 的新开始也要推后
        let b = find_move(&plan.moves, "B").unwrap();
        assert_eq!((b.new_start, b.new_end), (at(14, 30), at(15, 30)));
        let c = find_move(&plan.moves, "C").unwrap();
        assert_eq!((c.new_start, c.new_end), (at(15, 30), at(16, 30)));
    }

    #[test]
    fn test_reanchor_is_idempotent() {
        let mut a = slot("A", at(12, 0), at(13, 0), SlotStatus::Melting);
        a.actual_start = Some(at(12, 10));
        a.process_started_at = Some(at(12, 10));
        let timeline = timeline_of(vec![a.clone()]);
        let target = timeline.get("A").unwrap();

        let outcome = LifecycleController::new()
            .reanchor_on_start(&timeline, target, at(12, 20), at(12, 30))
            .unwrap();
        assert_eq!(outcome, ReanchorOutcome::AlreadyAnchored(a));
    }

    #[test]
    fn test_reanchor_uses_planned_duration() {
        let mut a = slot("A", at(12, 0), at(13, 30), SlotStatus::Planned);
        a.planned_duration_sec = Some(3600);
        let timeline = timeline_of(vec![a]);
        let target = timeline.get("A").unwrap();

        let plan = applied(
            LifecycleController::new()
                .reanchor_on_start(&timeline, target, at(12, 15), at(12, 15))
                .unwrap(),
        );
        assert_eq!(plan.slot.planned_end - plan.slot.planned_start, Duration::hours(1));
    }

    #[test]
    fn test_reconcile_late_completion_pushes_followers() {
        let mut a = slot("A", at(12, 0), at(13, 0), SlotStatus::Casting);
        a.actual_start = Some(at(12, 5));
        let timeline = timeline_of(vec![a, slot("B", at(13, 0), at(14, 0), SlotStatus::Planned)]);
        let target = timeline.get("A").unwrap();

        let plan = LifecycleController::new()
            .reconcile_on_complete(&timeline, target, at(13, 20), at(13, 20))
            .unwrap();

        assert_eq!(plan.slot.status, SlotStatus::CoilsComplete);
        assert_eq!((plan.slot.planned_start, plan.slot.planned_end), (at(12, 5), at(13, 20)));
        assert_eq!(plan.slot.actual_end, Some(at(13, 20)));
        let b = find_move(&plan.moves, "B").unwrap();
        assert_eq!((b.new_start, b.new_end), (at(13, 20), at(14, 20)));
    }

    #[test]
    fn test_reconcile_without_actual_start_and_invalid_end() {
        let timeline = timeline_of(vec![slot("A", at(12, 0), at(13, 0), SlotStatus::MetalReady)]);
        let target = timeline.get("A").unwrap();
        let controller = LifecycleController::new();

        let plan = controller
            .reconcile_on_complete(&timeline, target, at(12, 40), at(12, 40))
            .unwrap();
        assert_eq!((plan.slot.planned_start, plan.slot.planned_end), (at(12, 0), at(12, 40)));

        let result = controller.reconcile_on_complete(&timeline, target, at(11, 0), at(12, 40));
        assert!(matches!(result, Err(ScheduleError::InvalidDuration { .. })));
    }

    #[test]
    fn test_reconcile_requires_locked_status() {
        let timeline = timeline_of(vec![slot("A", at(12, 0), at(13, 0), SlotStatus::Planned)]);
        let target = timeline.get("A").unwrap();

        let result = LifecycleController::new().reconcile_on_complete(&timeline, target, at(13, 0), at(13, 0));
        assert!(matches!(result, Err(ScheduleError::InvalidStateTransition { .. })));
    }

    #[test]
    fn test_scenario_c_cancel_completed_blocked() {
        let timeline = timeline_of(vec![slot("A", at(12, 0), at(13, 0), SlotStatus::CoilsComplete)]);
        let target = timeline.get("A").unwrap();

        let result = LifecycleController::new().plan_cancel(target, timeline.policy(), at(14, 0));
        assert_eq!(
            result,
            Err(ScheduleError::CancellationBlocked {
                slot_id: "A".to_string(),
                reason: BlockReason::TerminalStatus,
            })
        );
    }

    #[test]
    fn test_cancel_block_reasons() {
        let controller = LifecycleController::new();
        let policy = StatusPolicy::default();

        let casting = TimelineEntry {
            slot: slot("L", at(12, 0), at(13, 0), SlotStatus::Casting),
            class: SlotClass::Locked,
        };
        assert!(matches!(
            controller.check_cancellation(&casting, &policy),
            Err(ScheduleError::CancellationBlocked { reason: BlockReason::LockedStatus, .. })
        ));

        let mut started_slot = slot("S", at(12, 0), at(13, 0), SlotStatus::Planned);
        started_slot.actual_start = Some(at(12, 0));
        let started = TimelineEntry {
            slot: started_slot,
            class: SlotClass::Locked,
        };
        assert!(matches!(
            controller.check_cancellation(&started, &policy),
            Err(ScheduleError::CancellationBlocked { reason: BlockReason::ExecutionStarted, .. })
        ));

        let frozen = TimelineEntry {
            slot: slot("F", at(12, 0), at(13, 0), SlotStatus::Released),
            class: SlotClass::Frozen,
        };
        assert!(matches!(
            controller.check_cancellation(&frozen, &policy),
            Err(ScheduleError::CancellationBlocked { reason: BlockReason::LinkedProcessStarted, .. })
        ));

        let movable = TimelineEntry {
            slot: slot("M", at(12, 0), at(13, 0), SlotStatus::Planned),
            class: SlotClass::Movable,
        };
        let cancelled = controller.plan_cancel(&movable, &policy, at(9, 0)).unwrap();
        assert_eq!(cancelled.status, SlotStatus::NotProduced);
        assert_eq!(cancelled.planned_start, at(12, 0));
    }

    #[test]
    fn test_advance_status_forward_only() {
        let controller = LifecycleController::new();
        let policy = StatusPolicy::default();
        let melting = TimelineEntry {
            slot: slot("A", at(12, 0), at(13, 0), SlotStatus::Melting),
            class: SlotClass::Locked,
        };

        let next = controller
            .advance_status(&melting, &policy, SlotStatus::MetalReady, at(12, 30))
            .unwrap();
        assert_eq!(next.status, SlotStatus::MetalReady);

        assert!(controller
            .advance_status(&melting, &policy, SlotStatus::Melting, at(12, 30))
            .is_err());
        assert!(controller
            .advance_status(&melting, &policy, SlotStatus::CoilsComplete, at(12, 30))
            .is_err());

        let planned = TimelineEntry {
            slot: slot("B", at(14, 0), at(15, 0), SlotStatus::Planned),
            class: SlotClass::Movable,
        };
        assert!(controller
            .advance_status(&planned, &policy, SlotStatus::Casting, at(12, 30))
            .is_err());
    }

    #[test]
    fn test_advance_status_follows_locked_set() {
        let controller = LifecycleController::new();
        // METAL_READY 不在锁定集合中
        let policy = StatusPolicy::new(
            [SlotStatus::Planned, SlotStatus::Released],
            [SlotStatus::Melting, SlotStatus::Casting, SlotStatus::CoilsComplete],
        )
        .unwrap();
        let melting = TimelineEntry {
            slot: slot("A", at(12, 0), at(13, 0), SlotStatus::Melting),
            class: SlotClass::Locked,
        };

        let result = controller.advance_status(&melting, &policy, SlotStatus::MetalReady, at(12, 30));
        assert!(matches!(result, Err(ScheduleError::InvalidStateTransition { .. })));

        let casting = controller
            .advance_status(&melting, &policy, SlotStatus::Casting, at(12, 30))
            .unwrap();
        assert_eq!(casting.status, SlotStatus::Casting);

        let released = TimelineEntry {
            slot: slot("B", at(14, 0), at(15, 0), SlotStatus::Released),
            class: SlotClass::Movable,
        };
        assert!(controller
            .advance_status(&released, &policy, SlotStatus::Casting, at(12, 30))
            .is_err());
    }
}
