// ==========================================
// 铸机排产系统 - 命令行入口
// ==========================================
// 用法: caster-aps [db_path] [caster] [date]
// - 初始化 schema（幂等）
// - 未给出铸机时列出所有铸机
// - 给出铸机时输出该日时间轴与空闲窗口(JSON)
// ==========================================

use anyhow::{anyhow, Context};
use chrono::{Duration, NaiveDate, NaiveTime};

use caster_aps::app::{get_default_db_path, AppState};
use caster_aps::logging;

fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", caster_aps::APP_NAME, caster_aps::VERSION);
    tracing::info!("==================================================");

    let mut args = std::env::args().skip(1);
    let db_path = args.next().unwrap_or_else(get_default_db_path);
    let caster = args.next();
    let date = match args.next() {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("日期格式应为 YYYY-MM-DD: {}", raw))?,
        None => chrono::Local::now().date_naive(),
    };

    tracing::info!("使用数据库: {}", db_path);
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let api = &state.schedule_api;

    let output = match caster {
        None => serde_json::json!({ "casters": api.list_casters()? }),
        Some(caster_id) => {
            let from = date.and_time(NaiveTime::MIN);
            let to = from + Duration::days(1);
            let timeline = api.list_timeline(&caster_id, from, to, true)?;
            let free_windows = api.find_free_windows(&caster_id, date, None)?;
            serde_json::json!({
                "caster_id": caster_id,
                "date": date,
                "timeline": timeline,
                "free_windows": free_windows,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
