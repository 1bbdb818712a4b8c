// ==========================================
// 铸机排产系统 - 移位引擎 (Shift Engine)
// ==========================================
// 算法:
// - 整体平移 (uniform shift): pivot 之后的可移动时间槽统一平移 delta
// - 级联重排 (cascading re-stack): 按开始时间扫描,把与前驱重叠的时间槽
//   推到前驱结束处,保持各自时长
// 红线: 只移动 Movable 类时间槽; 锁定/冻结时间槽永不移动
// 红线: 引擎只产出 SlotMove, 不直接写库
// ==========================================

use crate::domain::slot::{Slot, SlotMove};
use crate::engine::error::{EngineResult, ScheduleError};
use crate::engine::timeline::{Timeline, TimelineEntry};
use chrono::{Duration, NaiveDateTime};
use tracing::instrument;

// ==========================================
// ShiftEngine
// ==========================================
#[derive(Debug, Default)]
pub struct ShiftEngine {}

impl ShiftEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 整体平移
    ///
    /// 对所有 planned_start >= pivot 的可移动时间槽: start += delta, end += delta
    ///
    /// # 错误
    /// - `OverlapWithLocked`: 平移后的时间槽会压到锁定/冻结时间槽
    pub fn shift_uniform(
        &self,
        timeline: &Timeline,
        pivot: NaiveDateTime,
        delta: Duration,
    ) -> EngineResult<Vec<SlotMove>> {
        if delta <= Duration::zero() {
            return Ok(Vec::new());
        }

        let mut moves = Vec::new();
        for entry in timeline.movable().filter(|e| e.start() >= pivot) {
            let new_start = entry.start() + delta;
            let new_end = entry.end() + delta;

            if let Some(obstacle) = first_obstacle(timeline, entry.slot_id(), new_start, new_end) {
                return Err(ScheduleError::OverlapWithLocked {
                    slot_id: obstacle.slot.slot_id.clone(),
                });
            }

            moves.push(SlotMove::from_slot(&entry.slot, new_start, new_end));
        }

        Ok(moves)
    }

    /// 级联重排
    ///
    /// cursor 从锚点结束时间开始,按 (start, end, id) 顺序扫描
    /// planned_start >= reference 的可移动时间槽(锚点除外):
    /// - start < cursor: 推到 cursor, 时长取 planned_duration(缺失时取当前窗口)
    /// - 落点压到锁定/冻结时间槽: 继续后推越过该时间槽
    /// - cursor 前进到该时间槽结束
    ///
    /// # 参数
    /// - `anchor_id`: 锚点时间槽
    /// - `anchor_start`/`anchor_end`: 锚点的新窗口
    /// - `reference`: 扫描起点(开始时间早于它的时间槽不参与)
    #[instrument(skip(self, timeline), fields(caster_id = %timeline.caster_id()))]
    pub fn restack_after(
        &self,
        timeline: &Timeline,
        anchor_id: &str,
        anchor_start: NaiveDateTime,
        anchor_end: NaiveDateTime,
        reference: NaiveDateTime,
    ) -> Vec<SlotMove> {
        let mut cursor = anchor_end;
        let mut moves = Vec::new();

        for entry in timeline
            .movable()
            .filter(|e| e.slot_id() != anchor_id && e.start() >= reference)
        {
            let (mut start, duration) = if entry.start() < cursor {
                (cursor, entry.slot.effective_duration())
            } else {
                (entry.start(), entry.slot.window_duration())
            };

            // 越过锁定/冻结障碍
            while let Some(obstacle) = first_obstacle_except(
                timeline,
                &[entry.slot_id(), anchor_id],
                start,
                start + duration,
            ) {
                start = obstacle.end();
            }

            let end = start + duration;
            if start != entry.start() || end != entry.end() {
                tracing::debug!(
                    slot_id = %entry.slot_id(),
                    old_start = %entry.start(),
                    new_start = %start,
                    "级联重排推移时间槽"
                );
                moves.push(SlotMove::from_slot(&entry.slot, start, end));
            }
            cursor = end;
        }

        tracing::debug!(anchor_start = %anchor_start, moved = moves.len(), "级联重排完成");
        moves
    }

    /// 把 SlotMove 应用到时间槽副本上(保留读取时的 revision 供乐观锁校验)
    pub fn materialize(&self, timeline: &Timeline, moves: &[SlotMove], now: NaiveDateTime) -> Vec<Slot> {
        moves
            .iter()
            .filter_map(|m| {
                timeline.get(&m.slot_id).map(|entry| {
                    let mut slot = entry.slot.clone();
                    slot.planned_start = m.new_start;
                    slot.planned_end = m.new_end;
                    slot.updated_at = now;
                    slot
                })
            })
            .collect()
    }
}

fn first_obstacle<'a>(
    timeline: &'a Timeline,
    slot_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Option<&'a TimelineEntry> {
    first_obstacle_except(timeline, &[slot_id], start, end)
}

fn first_obstacle_except<'a>(
    timeline: &'a Timeline,
    excluded: &[&str],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Option<&'a TimelineEntry> {
    timeline
        .blocking()
        .filter(|e| !excluded.contains(&e.slot_id()))
        .find(|e| e.slot.overlaps(start, end))
}
