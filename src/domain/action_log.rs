// ==========================================
// 铸机排产系统 - 操作日志领域模型
// ==========================================
// 红线: 所有时间轴写入必须记录
// 用途: 审计追踪, 级联影响回溯
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志ID
    pub caster_id: String,               // 铸机
    pub slot_id: Option<String>,         // 触发操作的时间槽
    pub action_type: String,             // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,        // 操作时间戳
    pub actor: String,                   // 操作人
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub impact_json: Option<JsonValue>,  // 级联影响 (SlotMove 列表)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateSlot,        // 新建时间槽
    MoveSlot,          // 人工调整窗口
    CancelSlot,        // 取消
    ReanchorOnStart,   // 工序开始重锚定
    ReconcileComplete, // 工序完成对账
    AdvanceStatus,     // 工序子状态推进
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateSlot => "CREATE_SLOT",
            ActionType::MoveSlot => "MOVE_SLOT",
            ActionType::CancelSlot => "CANCEL_SLOT",
            ActionType::ReanchorOnStart => "REANCHOR_ON_START",
            ActionType::ReconcileComplete => "RECONCILE_COMPLETE",
            ActionType::AdvanceStatus => "ADVANCE_STATUS",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
