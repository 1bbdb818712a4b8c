use super::*;
use crate::engine::free_window::FreeWindow;
use crate::engine::timeline::TimelineEntry;
use chrono::{Duration, NaiveDate, NaiveTime};

impl ScheduleApi {
    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询铸机时间轴 [from, to)
    ///
    /// # 参数
    /// - include_cancelled: 是否包含已取消(NOT_PRODUCED)的时间槽
    ///
    /// # 返回
    /// - Ok(Vec<TimelineEntry>): 按开始时间排序, 附带分类(MOVABLE/FROZEN/LOCKED/INACTIVE)
    pub fn list_timeline(
        &self,
        caster_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        include_cancelled: bool,
    ) -> ApiResult<Vec<TimelineEntry>> {
        ensure_not_blank(caster_id, "铸机")?;
        if to <= from {
            return Err(ApiError::InvalidInput(format!(
                "查询区间无效: from={}, to={}",
                from, to
            )));
        }

        let policy = self.status_policy()?;
        let slots = self
            .slot_repo
            .list_in_range(caster_id, from, to, include_cancelled)?;
        let timeline = Timeline::classify(caster_id, slots, &policy, self.probe.as_ref())?;
        Ok(timeline.into_entries())
    }

    /// 查询铸机某日工作时段内的空闲窗口
    ///
    /// # 参数
    /// - min_minutes: 最小窗口时长(分钟), 缺省取配置 min_free_window_minutes
    pub fn find_free_windows(
        &self,
        caster_id: &str,
        date: NaiveDate,
        min_minutes: Option<i64>,
    ) -> ApiResult<Vec<FreeWindow>> {
        ensure_not_blank(caster_id, "铸机")?;

        let config = self
            .config_manager
            .load_scheduler_config()
            .map_err(|e| ApiError::InternalError(format!("读取调度配置失败: {}", e)))?;

        let min_minutes = min_minutes.unwrap_or(config.min_free_window_minutes);
        if min_minutes <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "最小窗口时长必须大于0: {}",
                min_minutes
            )));
        }

        let day_start = date.and_time(NaiveTime::MIN);
        let window_start = day_start + Duration::hours(i64::from(config.day_window_start_hour));
        let window_end = day_start + Duration::hours(i64::from(config.day_window_end_hour));

        let slots = self
            .slot_repo
            .list_in_range(caster_id, window_start, window_end, false)?;
        let timeline = Timeline::classify(caster_id, slots, &config.status_policy, self.probe.as_ref())?;

        Ok(self.free_window_finder.find(
            &timeline,
            window_start,
            window_end,
            Duration::minutes(min_minutes),
        ))
    }

    /// 查询时间槽的操作日志(按时间正序)
    pub fn list_slot_actions(&self, slot_id: &str) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_by_slot(slot_id)?)
    }

    /// 查询铸机最近的操作日志
    pub fn list_recent_actions(&self, caster_id: &str, limit: usize) -> ApiResult<Vec<ActionLog>> {
        ensure_not_blank(caster_id, "铸机")?;
        Ok(self.action_log_repo.find_recent_by_caster(caster_id, limit)?)
    }

    /// 查询所有铸机
    pub fn list_casters(&self) -> ApiResult<Vec<String>> {
        Ok(self.slot_repo.list_casters()?)
    }
}
