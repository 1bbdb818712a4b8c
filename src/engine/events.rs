// ==========================================
// 铸机排产系统 - 引擎层事件发布
// ==========================================
// 职责: 定义时间轴变更事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，下游(看板刷新/消息推送)实现适配器
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 排产事件类型
// ==========================================

/// 时间轴变更事件类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEventType {
    /// 新建时间槽
    SlotCreated,
    /// 人工调整窗口
    SlotMoved,
    /// 取消时间槽
    SlotCancelled,
    /// 工序开始重锚定
    SlotReanchored,
    /// 工序完成对账
    SlotReconciled,
    /// 工序子状态推进
    SlotStatusAdvanced,
}

impl ScheduleEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            ScheduleEventType::SlotCreated => "SlotCreated",
            ScheduleEventType::SlotMoved => "SlotMoved",
            ScheduleEventType::SlotCancelled => "SlotCancelled",
            ScheduleEventType::SlotReanchored => "SlotReanchored",
            ScheduleEventType::SlotReconciled => "SlotReconciled",
            ScheduleEventType::SlotStatusAdvanced => "SlotStatusAdvanced",
        }
    }
}

/// 时间轴变更事件
///
/// 时间轴提交成功后发布
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEvent {
    /// 铸机
    pub caster_id: String,
    /// 触发事件的时间槽
    pub slot_id: String,
    /// 事件类型
    pub event_type: ScheduleEventType,
    /// 事件来源描述
    pub source: Option<String>,
    /// 被级联移动的时间槽
    pub moved_slot_ids: Vec<String>,
}

impl ScheduleEvent {
    pub fn new(
        caster_id: impl Into<String>,
        slot_id: impl Into<String>,
        event_type: ScheduleEventType,
        source: Option<String>,
    ) -> Self {
        Self {
            caster_id: caster_id.into(),
            slot_id: slot_id.into(),
            event_type,
            source,
            moved_slot_ids: Vec::new(),
        }
    }

    /// 附带级联移动的时间槽
    pub fn with_moved(mut self, moved_slot_ids: Vec<String>) -> Self {
        self.moved_slot_ids = moved_slot_ids;
        self
    }

    /// 是否引起了级联移动
    pub fn has_cascade(&self) -> bool {
        !self.moved_slot_ids.is_empty()
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 时间轴事件发布者 Trait
///
/// # 返回
/// - `Ok(task_id)`: 任务 ID（如果支持）或空字符串
/// - `Err`: 发布失败(调用方只记录告警,不回滚时间轴)
pub trait ScheduleEventPublisher: Send + Sync {
    fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ScheduleEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - caster_id={}, slot_id={}, event_type={}",
            event.caster_id,
            event.slot_id,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn ScheduleEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ScheduleEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn ScheduleEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - caster_id={}, event_type={}",
                    event.caster_id,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 收集事件的发布者
    #[derive(Default)]
    struct CollectingPublisher {
        events: Mutex<Vec<ScheduleEvent>>,
    }

    impl ScheduleEventPublisher for CollectingPublisher {
        fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok("task-1".to_string())
        }
    }

    #[test]
    fn test_event_with_moved_slots() {
        let event = ScheduleEvent::new("CASTER-1", "S1", ScheduleEventType::SlotCreated, None)
            .with_moved(vec!["P1".to_string(), "P2".to_string()]);

        assert_eq!(event.caster_id, "CASTER-1");
        assert!(event.has_cascade());
        assert_eq!(event.moved_slot_ids.len(), 2);
    }

    #[test]
    fn test_noop_publisher() {
        let publisher = NoOpEventPublisher;
        let event = ScheduleEvent::new("CASTER-1", "S1", ScheduleEventType::SlotCancelled, None);

        let result = publisher.publish(event);
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_optional_publisher_none() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());

        let event = ScheduleEvent::new("CASTER-1", "S1", ScheduleEventType::SlotMoved, None);
        assert!(publisher.publish(event).is_ok());
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let collector = Arc::new(CollectingPublisher::default());
        let publisher =
            OptionalEventPublisher::with_publisher(collector.clone() as Arc<dyn ScheduleEventPublisher>);
        assert!(publisher.is_configured());

        let event = ScheduleEvent::new(
            "CASTER-1",
            "S1",
            ScheduleEventType::SlotReanchored,
            Some("test".to_string()),
        );
        assert_eq!(publisher.publish(event).unwrap(), "task-1");
        assert_eq!(collector.events.lock().unwrap().len(), 1);
    }
}
