use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use cron::Schedule;

use crate::common::config::WindowConfig;
use crate::common::error::Result;

/// 全局统一的时间窗口与计划计算器
///
/// 所有截止日比较都集中在这里，扫描逻辑里不做裸的日期运算。
pub struct TimeUtils;

impl TimeUtils {
    /// 计算生效截止日
    ///
    /// 集体讨论案件在任何比较之前先顺延固定天数。
    pub fn effective_deadline(
        deadline: DateTime<Utc>,
        discussion: bool,
        window: &WindowConfig,
    ) -> DateTime<Utc> {
        if discussion {
            deadline + Duration::days(window.discussion_extension_days)
        } else {
            deadline
        }
    }

    /// 已逾期的整天数 (向下取整)
    pub fn days_overdue(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        (now - deadline).num_days()
    }

    /// 距截止日的整天数 (向下取整)
    pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        (deadline - now).num_days()
    }

    /// 是否处于 Near 窗口 (距截止不足 near_hours)
    pub fn is_near(deadline: DateTime<Utc>, now: DateTime<Utc>, window: &WindowConfig) -> bool {
        deadline - now < Duration::hours(window.near_hours)
    }

    /// 是否处于 WeekOut 窗口
    ///
    /// 两端都是开区间: `now + 6d < deadline < now + 7d`。
    pub fn in_week_out_window(
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
        window: &WindowConfig,
    ) -> bool {
        let start = now + Duration::days(window.week_out_start_days);
        let end = now + Duration::days(window.week_out_end_days);

        deadline > start && deadline < end
    }

    /// 内容审查是否应当关闭
    ///
    /// 闲置超时 + 绝对上限的组合策略:
    /// - 创建超过 7 天: 无条件关闭 (上限压过近期活动)。
    /// - 创建超过 3 天且最近 2 天无更新: 闲置关闭。
    pub fn content_should_close(
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
        window: &WindowConfig,
    ) -> bool {
        let over_ceiling = created_at < now - Duration::days(window.content_max_age_days);
        let old_enough = created_at < now - Duration::days(window.content_idle_age_days);
        let idle = updated_at < now - Duration::days(window.content_idle_update_days);

        over_ceiling || (old_enough && idle)
    }

    /// 回溯 N 个日历月
    ///
    /// 极端日期下按 30 天/月兜底，避免 panic。
    pub fn months_ago(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(months))
            .unwrap_or_else(|| now - Duration::days(30 * months as i64))
    }

    /// 验证 cron 表达式是否合法
    ///
    /// 主要用于启动前检查扫描计划，防止某类扫描永远无法触发。
    pub fn validate_schedule(expr: &str) -> Result<()> {
        Schedule::from_str(expr)?;
        Ok(())
    }

    /// 计算计划的下一次触发时间
    ///
    /// 在指定时区内求值 cron，返回统一的 UTC 时间。
    /// 时区名无法解析时回落 UTC。
    pub fn next_fire(expr: &str, tz_str: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let schedule = Schedule::from_str(expr).ok()?;
        let tz: chrono_tz::Tz = tz_str.parse().unwrap_or(chrono_tz::UTC);

        schedule
            .after(&after.with_timezone(&tz))
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
