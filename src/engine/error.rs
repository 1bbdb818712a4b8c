// ==========================================
// 铸机排产系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 所有拒绝都在任何写入之前返回,时间轴保持不变
// ==========================================

use crate::domain::types::SlotStatus;
use crate::engine::timeline::SlotClass;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 取消被阻止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    TerminalStatus,       // 已完成或已取消
    LockedStatus,         // 状态不在可移动集合
    ExecutionStarted,     // 已记录实际开始
    LinkedProcessStarted, // 关联工序已开工
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::TerminalStatus => "TERMINAL_STATUS",
            BlockReason::LockedStatus => "LOCKED_STATUS",
            BlockReason::ExecutionStarted => "EXECUTION_STARTED",
            BlockReason::LinkedProcessStarted => "LINKED_PROCESS_STARTED",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 排产引擎错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    // ===== 输入校验 =====
    #[error("时长无效: 结束时间 {end} 不晚于开始时间 {start}")]
    InvalidDuration {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("不允许排入过去的时间: start={start}, now={now}")]
    PastSchedulingAttempt {
        start: NaiveDateTime,
        now: NaiveDateTime,
    },

    // ===== 重叠冲突 =====
    #[error("与锁定时间槽重叠: slot_id={slot_id}")]
    OverlapWithLocked { slot_id: String },

    #[error("与更早的可移动时间槽重叠: slot_id={slot_id}")]
    OverlapWithEarlierMovable { slot_id: String },

    // ===== 状态约束 =====
    #[error("取消被阻止: slot_id={slot_id}, reason={reason}")]
    CancellationBlocked { slot_id: String, reason: BlockReason },

    #[error("无效的状态转换: slot_id={slot_id}, from={from} to={to}")]
    InvalidStateTransition {
        slot_id: String,
        from: SlotStatus,
        to: SlotStatus,
    },

    #[error("时间槽已为终态,不可修改: slot_id={slot_id}, status={status}")]
    SlotTerminal { slot_id: String, status: SlotStatus },

    #[error("时间槽不可移动: slot_id={slot_id}, class={class}")]
    SlotNotMovable { slot_id: String, class: SlotClass },
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, ScheduleError>;
