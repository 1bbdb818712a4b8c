// ==========================================
// 铸机排产系统 - 空闲窗口查找
// ==========================================
// 在给定的工作时段内找出未被占用、且不短于最小时长的区间
// 已取消的时间槽不占用时间
// ==========================================

use crate::engine::timeline::Timeline;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: i64,
}

#[derive(Debug, Default)]
pub struct FreeWindowFinder {}

impl FreeWindowFinder {
    pub fn new() -> Self {
        Self {}
    }

    /// 查找 [window_start, window_end) 内的空闲区间
    pub fn find(
        &self,
        timeline: &Timeline,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        min_duration: Duration,
    ) -> Vec<FreeWindow> {
        if window_end <= window_start {
            return Vec::new();
        }

        let mut gaps: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::new();

        let mut cursor = window_start;
        for entry in timeline
            .active()
            .filter(|e| e.slot.overlaps(window_start, window_end))
        {
            if entry.start() > cursor {
                gaps.push((cursor, entry.start().min(window_end)));
            }
            cursor = cursor.max(entry.end());
            if cursor >= window_end {
                break;
            }
        }
        if cursor < window_end {
            gaps.push((cursor, window_end));
        }

        gaps.into_iter()
            .filter(|(start, end)| *end - *start >= min_duration)
            .map(|(start, end)| FreeWindow {
                start,
                end,
                duration_minutes: (end - start).num_minutes(),
            })
            .collect()
    }
}
