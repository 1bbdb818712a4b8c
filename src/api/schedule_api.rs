// ==========================================
// 铸机排产系统 - 时间轴调度 API
// ==========================================
// 职责: 调度器对外入口(插入、调整、取消、重锚定、对账、查询)
// 流程: 铸机加锁 → 读取并分类时间轴 → 引擎规划 → 原子提交 → 审计 → 事件
// 红线: 规划失败时不做任何写入
// 红线: 审计/事件失败只告警, 不影响已提交的时间轴
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::caster_lock::CasterLockRegistry;
use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::slot::{Slot, SlotAttributes, SlotMove};
use crate::domain::types::{SlotKind, SlotStatus, StatusPolicy};
use crate::engine::collaborators::{Clock, ProcessStateProbe};
use crate::engine::events::{OptionalEventPublisher, ScheduleEvent, ScheduleEventPublisher, ScheduleEventType};
use crate::engine::free_window::FreeWindowFinder;
use crate::engine::lifecycle::LifecycleController;
use crate::engine::planner::InsertionPlanner;
use crate::engine::shift::ShiftEngine;
use crate::engine::timeline::Timeline;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::process_link_repo::ProcessLinkRepository;
use crate::repository::slot_repo::SlotRepository;

mod insertion;
mod lifecycle_ops;
mod queries;

// ==========================================
// 请求/响应 DTO
// ==========================================

/// 新建时间槽请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub caster_id: String,
    pub kind: SlotKind,
    pub requested_start: NaiveDateTime,
    pub requested_end: NaiveDateTime,
    /// 初始状态(必须在可移动集合内), 缺省为 PLANNED
    pub status: Option<SlotStatus>,
    pub linked_process_ref: Option<String>,
    #[serde(default)]
    pub attrs: SlotAttributes,
    pub created_by: String,
}

/// 时间轴写操作结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineUpdate {
    /// 操作后的目标时间槽
    pub slot: Slot,
    /// 所有窗口变更(含目标自身)
    pub moves: Vec<SlotMove>,
    /// 是否实际写入(重复事件为 false)
    pub applied: bool,
}

impl TimelineUpdate {
    pub fn moved_slot_ids(&self) -> Vec<String> {
        self.moves
            .iter()
            .filter(|m| m.slot_id != self.slot.slot_id)
            .map(|m| m.slot_id.clone())
            .collect()
    }
}

// ==========================================
// ScheduleApi - 时间轴调度 API
// ==========================================

/// 时间轴调度API
///
/// 职责：
/// 1. 插入预览与新建(吸附、重叠校验、整体平移)
/// 2. 人工调整窗口(级联重排)
/// 3. 生命周期事件(开工重锚定、完工对账、子状态推进)
/// 4. 取消守卫
/// 5. 时间轴/空闲窗口/审计日志查询
pub struct ScheduleApi {
    slot_repo: Arc<SlotRepository>,
    process_repo: Arc<ProcessLinkRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn ProcessStateProbe>,
    caster_locks: CasterLockRegistry,
    planner: InsertionPlanner,
    lifecycle: LifecycleController,
    shift_engine: ShiftEngine,
    free_window_finder: FreeWindowFinder,
    // 事件发布器（依赖倒置：下游刷新由适配器实现）
    event_publisher: OptionalEventPublisher,
}

impl ScheduleApi {
    /// 创建新的ScheduleApi实例
    ///
    /// 关联工序探针直接使用 process_repo
    pub fn new(
        slot_repo: Arc<SlotRepository>,
        process_repo: Arc<ProcessLinkRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
        clock: Arc<dyn Clock>,
        event_publisher: Option<Arc<dyn ScheduleEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };
        let probe: Arc<dyn ProcessStateProbe> = process_repo.clone();

        Self {
            slot_repo,
            process_repo,
            action_log_repo,
            config_manager,
            clock,
            probe,
            caster_locks: CasterLockRegistry::new(),
            planner: InsertionPlanner::new(),
            lifecycle: LifecycleController::new(),
            shift_engine: ShiftEngine::new(),
            free_window_finder: FreeWindowFinder::new(),
            event_publisher,
        }
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 当前时间(秒精度)
    fn now(&self) -> NaiveDateTime {
        whole_seconds(self.clock.now())
    }

    fn status_policy(&self) -> ApiResult<StatusPolicy> {
        self.config_manager
            .get_status_policy()
            .map_err(|e| ApiError::InternalError(format!("读取状态集合配置失败: {}", e)))
    }

    /// 读取并分类整条铸机时间轴
    fn load_timeline(&self, caster_id: &str) -> ApiResult<Timeline> {
        let policy = self.status_policy()?;
        let slots = self.slot_repo.list_by_caster(caster_id)?;
        Ok(Timeline::classify(caster_id, slots, &policy, self.probe.as_ref())?)
    }

    /// 按ID读取时间槽
    fn load_slot(&self, slot_id: &str) -> ApiResult<Slot> {
        self.slot_repo
            .find_by_id(slot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("时间槽(id={})不存在", slot_id)))
    }

    /// 写操作审计(失败只告警)
    #[allow(clippy::too_many_arguments)]
    fn record_action(
        &self,
        caster_id: &str,
        slot_id: &str,
        action_type: ActionType,
        actor: &str,
        payload: Value,
        moves: &[SlotMove],
        detail: String,
    ) {
        let log = ActionLog {
            action_id: uuid::Uuid::new_v4().to_string(),
            caster_id: caster_id.to_string(),
            slot_id: Some(slot_id.to_string()),
            action_type: action_type.to_string(),
            action_ts: self.now(),
            actor: actor.to_string(),
            payload_json: Some(payload),
            impact_json: serde_json::to_value(moves).ok(),
            detail: Some(detail),
        };

        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(slot_id = %slot_id, action_type = %action_type, "写入操作日志失败: {}", e);
        }
    }

    /// 发布时间轴变更事件(失败只告警)
    fn publish(&self, caster_id: &str, slot_id: &str, event_type: ScheduleEventType, moved: Vec<String>, actor: &str) {
        let event = ScheduleEvent::new(caster_id, slot_id, event_type, Some(format!("ScheduleApi by {}", actor)))
            .with_moved(moved);

        match self.event_publisher.publish(event) {
            Ok(task_id) => {
                if !task_id.is_empty() {
                    tracing::debug!(task_id = %task_id, slot_id = %slot_id, "时间轴变更事件已发布");
                }
            }
            Err(e) => {
                tracing::warn!(slot_id = %slot_id, "时间轴变更事件发布失败: {}", e);
            }
        }
    }
}

fn ensure_not_blank(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

/// 时间按秒存储, 入口处截去亚秒部分, 使规划与落库看到同一窗口
fn whole_seconds(t: NaiveDateTime) -> NaiveDateTime {
    t.trunc_subsecs(0)
}
