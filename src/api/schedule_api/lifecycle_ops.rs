use super::*;
use crate::api::caster_lock;
use crate::domain::slot::TimelineChange;
use crate::domain::types::ProcessState;
use crate::engine::lifecycle::{LifecyclePlan, ReanchorOutcome};

impl ScheduleApi {
    // ==========================================
    // 生命周期接口
    // ==========================================

    /// 工序开始: 重锚定
    ///
    /// # 返回
    /// - Ok(TimelineUpdate): applied=false 表示该时间槽已重锚定过(幂等)
    pub fn reanchor_on_start(
        &self,
        slot_id: &str,
        actual_start: NaiveDateTime,
        operator: &str,
    ) -> ApiResult<TimelineUpdate> {
        let actual_start = whole_seconds(actual_start);
        let caster_id = self.load_slot(slot_id)?.caster_id;

        let handle = self.caster_locks.handle(&caster_id);
        let _guard = caster_lock::enter(&handle);

        let now = self.now();
        let timeline = self.load_timeline(&caster_id)?;
        let target = timeline
            .get(slot_id)
            .ok_or_else(|| ApiError::NotFound(format!("时间槽(id={})不存在", slot_id)))?;

        let plan = match self.lifecycle.reanchor_on_start(&timeline, target, actual_start, now)? {
            ReanchorOutcome::Applied(plan) => plan,
            ReanchorOutcome::AlreadyAnchored(slot) => {
                tracing::info!(slot_id = %slot_id, "重复的开工事件,已忽略");
                return Ok(TimelineUpdate {
                    slot,
                    moves: Vec::new(),
                    applied: false,
                });
            }
        };

        let update = self.commit_lifecycle_plan(&timeline, plan, now)?;

        tracing::info!(
            caster_id = %caster_id,
            slot_id = %slot_id,
            actual_start = %actual_start,
            status = %update.slot.status,
            cascaded = update.moved_slot_ids().len(),
            "开工重锚定已提交"
        );

        self.record_action(
            &caster_id,
            slot_id,
            ActionType::ReanchorOnStart,
            operator,
            serde_json::json!({
                "actual_start": actual_start,
                "status": update.slot.status,
            }),
            &update.moves,
            format!("工序开始于 {}, 重锚定计划窗口", actual_start),
        );
        self.publish(
            &caster_id,
            slot_id,
            ScheduleEventType::SlotReanchored,
            update.moved_slot_ids(),
            operator,
        );

        Ok(update)
    }

    /// 工序完成: 对账
    ///
    /// 窗口替换为实际窗口, 状态置为 COILS_COMPLETE, 后续可移动时间槽级联重排
    pub fn reconcile_on_complete(
        &self,
        slot_id: &str,
        actual_end: NaiveDateTime,
        operator: &str,
    ) -> ApiResult<TimelineUpdate> {
        let actual_end = whole_seconds(actual_end);
        let caster_id = self.load_slot(slot_id)?.caster_id;

        let handle = self.caster_locks.handle(&caster_id);
        let _guard = caster_lock::enter(&handle);

        let now = self.now();
        let timeline = self.load_timeline(&caster_id)?;
        let target = timeline
            .get(slot_id)
            .ok_or_else(|| ApiError::NotFound(format!("时间槽(id={})不存在", slot_id)))?;

        let plan = self
            .lifecycle
            .reconcile_on_complete(&timeline, target, actual_end, now)?;
        let update = self.commit_lifecycle_plan(&timeline, plan, now)?;

        tracing::info!(
            caster_id = %caster_id,
            slot_id = %slot_id,
            actual_end = %actual_end,
            cascaded = update.moved_slot_ids().len(),
            "完工对账已提交"
        );

        self.record_action(
            &caster_id,
            slot_id,
            ActionType::ReconcileComplete,
            operator,
            serde_json::json!({
                "actual_start": update.slot.actual_start,
                "actual_end": actual_end,
            }),
            &update.moves,
            format!("工序完成于 {}", actual_end),
        );
        self.publish(
            &caster_id,
            slot_id,
            ScheduleEventType::SlotReconciled,
            update.moved_slot_ids(),
            operator,
        );

        Ok(update)
    }

    /// 取消时间槽
    ///
    /// # 红线
    /// - 只允许取消未开工的可移动时间槽
    /// - 其余情况返回 CancellationBlocked 及原因
    pub fn cancel_slot(&self, slot_id: &str, operator: &str, reason: Option<&str>) -> ApiResult<Slot> {
        ensure_not_blank(operator, "操作人")?;
        let caster_id = self.load_slot(slot_id)?.caster_id;

        let handle = self.caster_locks.handle(&caster_id);
        let _guard = caster_lock::enter(&handle);

        let now = self.now();
        let timeline = self.load_timeline(&caster_id)?;
        let target = timeline
            .get(slot_id)
            .ok_or_else(|| ApiError::NotFound(format!("时间槽(id={})不存在", slot_id)))?;

        let cancelled = self.lifecycle.plan_cancel(target, timeline.policy(), now)?;
        self.slot_repo.commit(&TimelineChange {
            inserted: None,
            updated: vec![cancelled.clone()],
            moves: Vec::new(),
        })?;

        tracing::info!(caster_id = %caster_id, slot_id = %slot_id, "时间槽已取消");

        self.record_action(
            &caster_id,
            slot_id,
            ActionType::CancelSlot,
            operator,
            serde_json::json!({
                "previous_status": target.slot.status,
                "reason": reason,
            }),
            &[],
            format!("取消时间槽: {}", reason.unwrap_or("未填写原因")),
        );
        self.publish(&caster_id, slot_id, ScheduleEventType::SlotCancelled, Vec::new(), operator);

        Ok(cancelled)
    }

    /// 推进工序子状态 (MELTING → METAL_READY → CASTING)
    pub fn advance_status(&self, slot_id: &str, next: SlotStatus, operator: &str) -> ApiResult<Slot> {
        let caster_id = self.load_slot(slot_id)?.caster_id;

        let handle = self.caster_locks.handle(&caster_id);
        let _guard = caster_lock::enter(&handle);

        let now = self.now();
        let timeline = self.load_timeline(&caster_id)?;
        let target = timeline
            .get(slot_id)
            .ok_or_else(|| ApiError::NotFound(format!("时间槽(id={})不存在", slot_id)))?;

        let advanced = self.lifecycle
            .advance_status(target, timeline.policy(), next, now)?;
        self.slot_repo.commit(&TimelineChange {
            inserted: None,
            updated: vec![advanced.clone()],
            moves: Vec::new(),
        })?;

        tracing::info!(
            caster_id = %caster_id,
            slot_id = %slot_id,
            from = %target.slot.status,
            to = %next,
            "工序子状态已推进"
        );

        self.record_action(
            &caster_id,
            slot_id,
            ActionType::AdvanceStatus,
            operator,
            serde_json::json!({
                "from": target.slot.status,
                "to": next,
            }),
            &[],
            format!("状态 {} → {}", target.slot.status, next),
        );
        self.publish(&caster_id, slot_id, ScheduleEventType::SlotStatusAdvanced, Vec::new(), operator);

        Ok(advanced)
    }

    /// 记录关联工序(熔炼批次)状态
    ///
    /// # 规则
    /// - 首次登记可为任意状态
    /// - 之后只允许合法转换; 与当前状态相同视为重复事件
    ///
    /// # 并发
    /// 持有所有关联铸机的锁(按铸机ID顺序获取), 与这些铸机上的规划互斥
    pub fn record_process_state(&self, process_ref: &str, state: ProcessState) -> ApiResult<()> {
        ensure_not_blank(process_ref, "关联工序")?;

        let casters = self.slot_repo.list_casters_linked_to(process_ref)?;
        let handles: Vec<_> = casters.iter().map(|c| self.caster_locks.handle(c)).collect();
        let _guards: Vec<_> = handles.iter().map(|h| caster_lock::enter(h)).collect();

        if let Some(current) = self.process_repo.find_state(process_ref)? {
            if current == state {
                tracing::debug!(process_ref = %process_ref, state = %state, "工序状态未变化");
                return Ok(());
            }
            if !current.can_transition_to(state) {
                return Err(ApiError::InvalidStateTransition {
                    from: current.to_string(),
                    to: state.to_string(),
                });
            }
        }

        let touched = self.process_repo.upsert_state(process_ref, state, self.now())?;
        tracing::info!(
            process_ref = %process_ref,
            state = %state,
            linked_slots = touched,
            "关联工序状态已更新"
        );
        Ok(())
    }

    /// 提交生命周期方案: 目标时间槽 + 级联重排
    fn commit_lifecycle_plan(
        &self,
        timeline: &Timeline,
        plan: LifecyclePlan,
        now: NaiveDateTime,
    ) -> ApiResult<TimelineUpdate> {
        let mut updated = vec![plan.slot.clone()];
        updated.extend(self.shift_engine.materialize(timeline, &plan.moves, now));

        let mut moves: Vec<SlotMove> = plan.slot_move.into_iter().collect();
        moves.extend(plan.moves);

        let change = TimelineChange {
            inserted: None,
            updated,
            moves,
        };
        self.slot_repo.commit(&change)?;

        Ok(TimelineUpdate {
            slot: plan.slot,
            moves: change.moves,
            applied: true,
        })
    }
}
