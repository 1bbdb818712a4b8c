// ==========================================
// 铸机排产系统 - 引擎外部协作者
// ==========================================
// 引擎只向外部询问两件事:
// 1) 当前时间 (Clock)
// 2) 关联工序是否仍未开工 (ProcessStateProbe)
// ==========================================

use crate::repository::process_link_repo::ProcessLinkRepository;
use chrono::NaiveDateTime;
use std::sync::RwLock;

// ==========================================
// Clock - 当前时间
// ==========================================
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// 系统本地时间
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// 固定时间(测试与回放使用), 可手动拨动
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

// ==========================================
// ProcessStateProbe - 关联工序状态探针
// ==========================================

/// 关联工序状态探针
///
/// 用于判断名义上可移动的时间槽是否已被外部工序冻结
pub trait ProcessStateProbe: Send + Sync {
    /// 关联工序是否仍处于初始(未开工)状态
    ///
    /// # 返回
    /// - `Ok(true)`: 未开工,或工序记录不存在
    /// - `Ok(false)`: 已投料或已有子事件
    fn is_unstarted(&self, process_ref: &str) -> anyhow::Result<bool>;
}

/// 所有工序均视为未开工
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUnstarted;

impl ProcessStateProbe for AlwaysUnstarted {
    fn is_unstarted(&self, _process_ref: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

impl ProcessStateProbe for ProcessLinkRepository {
    fn is_unstarted(&self, process_ref: &str) -> anyhow::Result<bool> {
        let state = self.find_state(process_ref)?;
        Ok(state.map_or(true, |s| s.is_unstarted()))
    }
}
