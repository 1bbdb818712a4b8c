use super::*;
use crate::api::caster_lock;
use crate::domain::slot::TimelineChange;
use crate::engine::planner::InsertionPreview;

impl ScheduleApi {
    // ==========================================
    // 插入 / 调整接口
    // ==========================================

    /// 插入预览
    ///
    /// # 参数
    /// - caster_id: 铸机
    /// - requested_start / requested_end: 请求窗口
    ///
    /// # 返回
    /// - Ok(InsertionPreview): 建议窗口、平移起点与平移量、受影响时间槽
    /// - Err(ApiError): 校验失败
    pub fn preview_insertion(
        &self,
        caster_id: &str,
        requested_start: NaiveDateTime,
        requested_end: NaiveDateTime,
    ) -> ApiResult<InsertionPreview> {
        ensure_not_blank(caster_id, "铸机")?;

        let timeline = self.load_timeline(caster_id)?;
        let preview = self.planner.preview_insertion(
            &timeline,
            whole_seconds(requested_start),
            whole_seconds(requested_end),
            self.now(),
        )?;
        Ok(preview)
    }

    /// 新建时间槽
    ///
    /// 在铸机锁内重新规划, 整体平移与插入在同一事务提交
    ///
    /// # 返回
    /// - Ok(TimelineUpdate): 新时间槽 + 被平移的时间槽
    pub fn create_slot(&self, request: CreateSlotRequest) -> ApiResult<TimelineUpdate> {
        ensure_not_blank(&request.caster_id, "铸机")?;
        ensure_not_blank(&request.created_by, "创建人")?;

        let status = request.status.unwrap_or(SlotStatus::Planned);
        let policy = self.status_policy()?;
        if !policy.is_movable(status) {
            return Err(ApiError::InvalidInput(format!(
                "新建时间槽的状态必须在可移动集合内: {}",
                status
            )));
        }

        let handle = self.caster_locks.handle(&request.caster_id);
        let _guard = caster_lock::enter(&handle);

        let requested_start = whole_seconds(request.requested_start);
        let requested_end = whole_seconds(request.requested_end);

        let now = self.now();
        let timeline = self.load_timeline(&request.caster_id)?;
        let preview = self
            .planner
            .preview_insertion(&timeline, requested_start, requested_end, now)?;

        let slot = Slot {
            slot_id: uuid::Uuid::new_v4().to_string(),
            caster_id: request.caster_id.clone(),
            kind: request.kind,
            status,
            planned_start: preview.suggested_start,
            planned_end: preview.suggested_end,
            planned_duration_sec: Some((preview.suggested_end - preview.suggested_start).num_seconds()),
            actual_start: None,
            actual_end: None,
            process_started_at: None,
            linked_process_ref: request.linked_process_ref.clone(),
            attrs: request.attrs.clone(),
            created_by: request.created_by.clone(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        let change = TimelineChange {
            inserted: Some(slot.clone()),
            updated: self.shift_engine.materialize(&timeline, &preview.moves, now),
            moves: preview.moves.clone(),
        };
        self.slot_repo.commit(&change)?;

        tracing::info!(
            caster_id = %slot.caster_id,
            slot_id = %slot.slot_id,
            start = %slot.planned_start,
            end = %slot.planned_end,
            shifted = change.moves.len(),
            "新建时间槽已提交"
        );

        let update = TimelineUpdate {
            slot,
            moves: change.moves,
            applied: true,
        };

        self.record_action(
            &update.slot.caster_id,
            &update.slot.slot_id,
            ActionType::CreateSlot,
            &request.created_by,
            serde_json::json!({
                "kind": request.kind,
                "requested_start": requested_start,
                "requested_end": requested_end,
                "suggested_start": preview.suggested_start,
                "suggested_end": preview.suggested_end,
                "snapped": preview.snapped,
                "shift_delta_sec": preview.shift_delta_sec,
                "linked_process_ref": request.linked_process_ref,
            }),
            &update.moves,
            format!(
                "新建时间槽 {} ~ {}, 平移{}个时间槽",
                update.slot.planned_start,
                update.slot.planned_end,
                update.moves.len()
            ),
        );
        self.publish(
            &update.slot.caster_id,
            &update.slot.slot_id,
            ScheduleEventType::SlotCreated,
            update.moved_slot_ids(),
            &request.created_by,
        );

        Ok(update)
    }

    /// 人工调整时间槽窗口
    ///
    /// # 红线
    /// - 只允许调整 Movable 类时间槽
    /// - 新窗口之后的可移动时间槽级联重排
    pub fn move_slot(
        &self,
        slot_id: &str,
        new_start: NaiveDateTime,
        new_end: NaiveDateTime,
        operator: &str,
    ) -> ApiResult<TimelineUpdate> {
        ensure_not_blank(operator, "操作人")?;
        let new_start = whole_seconds(new_start);
        let new_end = whole_seconds(new_end);
        let caster_id = self.load_slot(slot_id)?.caster_id;

        let handle = self.caster_locks.handle(&caster_id);
        let _guard = caster_lock::enter(&handle);

        let now = self.now();
        let timeline = self.load_timeline(&caster_id)?;
        let target = timeline
            .get(slot_id)
            .ok_or_else(|| ApiError::NotFound(format!("时间槽(id={})不存在", slot_id)))?;

        let plan = self.planner.plan_move(&timeline, target, new_start, new_end, now)?;

        let mut updated = vec![plan.slot.clone()];
        updated.extend(self.shift_engine.materialize(&timeline, &plan.moves, now));
        let mut moves = vec![plan.slot_move.clone()];
        moves.extend(plan.moves.iter().cloned());

        let change = TimelineChange {
            inserted: None,
            updated,
            moves,
        };
        self.slot_repo.commit(&change)?;

        tracing::info!(
            caster_id = %caster_id,
            slot_id = %slot_id,
            new_start = %new_start,
            cascaded = plan.moves.len(),
            "时间槽窗口调整已提交"
        );

        let update = TimelineUpdate {
            slot: plan.slot,
            moves: change.moves,
            applied: true,
        };

        self.record_action(
            &caster_id,
            slot_id,
            ActionType::MoveSlot,
            operator,
            serde_json::json!({
                "old_start": plan.slot_move.old_start,
                "old_end": plan.slot_move.old_end,
                "new_start": new_start,
                "new_end": new_end,
            }),
            &update.moves,
            format!("调整时间槽窗口至 {} ~ {}", new_start, new_end),
        );
        self.publish(
            &caster_id,
            slot_id,
            ScheduleEventType::SlotMoved,
            update.moved_slot_ids(),
            operator,
        );

        Ok(update)
    }
}
