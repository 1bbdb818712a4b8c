// ==========================================
// 铸机排产系统 - 领域类型定义
// ==========================================
// 职责: 时间槽类型/状态、关联工序状态、可移动/锁定状态集合
// 红线: 状态集合显式传入引擎,禁止在调用点散落字符串字面量
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ==========================================
// 时间槽类型 (Slot Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotKind {
    Production, // 生产(浇铸)
    Downtime,   // 计划停机
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl SlotKind {
    /// 从字符串解析类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PRODUCTION" => Some(SlotKind::Production),
            "DOWNTIME" => Some(SlotKind::Downtime),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SlotKind::Production => "PRODUCTION",
            SlotKind::Downtime => "DOWNTIME",
        }
    }
}

// ==========================================
// 时间槽状态 (Slot Status)
// ==========================================
// 顺序: Planned < Released < Melting < MetalReady < Casting < CoilsComplete
// NotProduced 为取消终态,不参与推进顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Planned,       // 已计划
    Released,      // 已下达
    Melting,       // 熔炼中
    MetalReady,    // 铝水就绪
    Casting,       // 浇铸中
    CoilsComplete, // 卷材完成
    NotProduced,   // 未生产(取消)
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl SlotStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PLANNED" => Some(SlotStatus::Planned),
            "RELEASED" => Some(SlotStatus::Released),
            "MELTING" => Some(SlotStatus::Melting),
            "METAL_READY" => Some(SlotStatus::MetalReady),
            "CASTING" => Some(SlotStatus::Casting),
            "COILS_COMPLETE" => Some(SlotStatus::CoilsComplete),
            "NOT_PRODUCED" => Some(SlotStatus::NotProduced),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SlotStatus::Planned => "PLANNED",
            SlotStatus::Released => "RELEASED",
            SlotStatus::Melting => "MELTING",
            SlotStatus::MetalReady => "METAL_READY",
            SlotStatus::Casting => "CASTING",
            SlotStatus::CoilsComplete => "COILS_COMPLETE",
            SlotStatus::NotProduced => "NOT_PRODUCED",
        }
    }

    /// 工序开始后进入的第一个锁定子状态
    pub fn first_in_process() -> Self {
        SlotStatus::Melting
    }

    /// 工序完成后的终态
    pub fn completion() -> Self {
        SlotStatus::CoilsComplete
    }

    /// 是否为终态(调度器不可再修改)
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::CoilsComplete | SlotStatus::NotProduced)
    }
}

// ==========================================
// 关联工序状态 (Linked Process State)
// ==========================================
// 对应熔炼批次: Draft → Charging → Melting → ReadyForTransfer → Transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Draft,            // 草稿(未开工)
    Charging,         // 投料中
    Melting,          // 熔炼中
    ReadyForTransfer, // 待转运
    Transferred,      // 已转运
    Cancelled,        // 已取消
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ProcessState {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Some(ProcessState::Draft),
            "CHARGING" => Some(ProcessState::Charging),
            "MELTING" => Some(ProcessState::Melting),
            "READY_FOR_TRANSFER" => Some(ProcessState::ReadyForTransfer),
            "TRANSFERRED" => Some(ProcessState::Transferred),
            "CANCELLED" => Some(ProcessState::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProcessState::Draft => "DRAFT",
            ProcessState::Charging => "CHARGING",
            ProcessState::Melting => "MELTING",
            ProcessState::ReadyForTransfer => "READY_FOR_TRANSFER",
            ProcessState::Transferred => "TRANSFERRED",
            ProcessState::Cancelled => "CANCELLED",
        }
    }

    /// 是否仍处于未开工状态(未投料、无子事件)
    pub fn is_unstarted(&self) -> bool {
        matches!(self, ProcessState::Draft)
    }

    /// 合法的状态转换
    ///
    /// 取消后可重新打开为草稿; 已转运为终态
    pub fn can_transition_to(&self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Draft, Charging)
                | (Charging, Melting)
                | (Melting, ReadyForTransfer)
                | (ReadyForTransfer, Transferred)
                | (Draft, Cancelled)
                | (Charging, Cancelled)
                | (Melting, Cancelled)
                | (ReadyForTransfer, Cancelled)
                | (Cancelled, Draft)
        )
    }
}

// ==========================================
// 状态集合策略 (Status Policy)
// ==========================================
// MovableStatuses: 调度器可改写计划窗口
// LockedStatuses: 调度器永不移动
// 两个集合必须互斥,且均不包含 NotProduced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPolicy {
    movable: BTreeSet<SlotStatus>,
    locked: BTreeSet<SlotStatus>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            movable: [SlotStatus::Planned, SlotStatus::Released].into_iter().collect(),
            locked: [
                SlotStatus::Melting,
                SlotStatus::MetalReady,
                SlotStatus::Casting,
                SlotStatus::CoilsComplete,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl StatusPolicy {
    /// 构造状态集合策略(带互斥校验)
    pub fn new(
        movable: impl IntoIterator<Item = SlotStatus>,
        locked: impl IntoIterator<Item = SlotStatus>,
    ) -> Result<Self, String> {
        let movable: BTreeSet<SlotStatus> = movable.into_iter().collect();
        let locked: BTreeSet<SlotStatus> = locked.into_iter().collect();

        if movable.is_empty() {
            return Err("可移动状态集合不能为空".to_string());
        }
        if let Some(dup) = movable.intersection(&locked).next() {
            return Err(format!("状态{}同时出现在可移动与锁定集合中", dup));
        }
        if movable.contains(&SlotStatus::NotProduced) || locked.contains(&SlotStatus::NotProduced) {
            return Err("NOT_PRODUCED 为取消终态,不能配置到状态集合".to_string());
        }

        Ok(Self { movable, locked })
    }

    pub fn is_movable(&self, status: SlotStatus) -> bool {
        self.movable.contains(&status)
    }

    pub fn is_locked(&self, status: SlotStatus) -> bool {
        self.locked.contains(&status)
    }

    pub fn movable_statuses(&self) -> impl Iterator<Item = SlotStatus> + '_ {
        self.movable.iter().copied()
    }

    pub fn locked_statuses(&self) -> impl Iterator<Item = SlotStatus> + '_ {
        self.locked.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_db_str() {
        for status in [
            SlotStatus::Planned,
            SlotStatus::MetalReady,
            SlotStatus::CoilsComplete,
            SlotStatus::NotProduced,
        ] {
            assert_eq!(SlotStatus::from_str(status.to_db_str()), Some(status));
        }
        assert_eq!(SlotStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_default_policy_sets() {
        let policy = StatusPolicy::default();
        assert!(policy.is_movable(SlotStatus::Planned));
        assert!(policy.is_movable(SlotStatus::Released));
        assert!(policy.is_locked(SlotStatus::Casting));
        assert!(!policy.is_locked(SlotStatus::NotProduced));
        assert!(!policy.is_movable(SlotStatus::NotProduced));
    }

    #[test]
    fn test_policy_rejects_overlapping_sets() {
        let result = StatusPolicy::new(
            [SlotStatus::Planned, SlotStatus::Released],
            [SlotStatus::Released, SlotStatus::Casting],
        );
        assert!(result.is_err());

        let result = StatusPolicy::new([SlotStatus::Planned], [SlotStatus::NotProduced]);
        assert!(result.is_err());
    }

    #[test]
    fn test_process_state_workflow() {
        assert!(ProcessState::Draft.is_unstarted());
        assert!(!ProcessState::Charging.is_unstarted());
        assert!(!ProcessState::Cancelled.is_unstarted());

        assert!(ProcessState::Draft.can_transition_to(ProcessState::Charging));
        assert!(!ProcessState::Draft.can_transition_to(ProcessState::Melting));
        assert!(!ProcessState::Transferred.can_transition_to(ProcessState::Cancelled));
        assert!(ProcessState::Cancelled.can_transition_to(ProcessState::Draft));
    }
}
