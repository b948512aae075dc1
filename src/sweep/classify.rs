use chrono::{DateTime, Utc};

use crate::common::config::WindowConfig;
use crate::common::model::AlertKind;
use crate::common::time::TimeUtils;

/// 截止日紧急度 (每轮扫描重新推导，不落盘)
///
/// 优先级自上而下，首个命中即生效；各工作流共用这一个
/// 分类函数，各自只消费自己关心的变体。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineState {
    /// 已逾期
    Overdue {
        /// 逾期整天数 (向下取整)
        days: i64,
    },
    /// 24 小时内到期
    Near,
    /// 一周后到期 (仅重新认证案件响应，触发指派)
    WeekOut,
    /// 无需动作
    Dormant,
}

impl DeadlineState {
    /// 对应的告警标记 (幂等去重用)
    pub fn alert_kind(&self) -> Option<AlertKind> {
        match self {
            DeadlineState::Overdue { .. } => Some(AlertKind::Overdue),
            DeadlineState::Near => Some(AlertKind::Near),
            DeadlineState::WeekOut => Some(AlertKind::WeekOut),
            DeadlineState::Dormant => None,
        }
    }
}

/// 分类器
///
/// `deadline` 应当已是生效截止日 (讨论顺延在调用前完成)。
/// `week_out_eligible` 由工作流类型和指派状态共同决定:
/// 只有尚未指派评审员的重新认证案件会进入 WeekOut。
pub fn classify(
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
    window: &WindowConfig,
    week_out_eligible: bool,
) -> DeadlineState {
    if now > deadline {
        return DeadlineState::Overdue {
            days: TimeUtils::days_overdue(deadline, now),
        };
    }

    if TimeUtils::is_near(deadline, now, window) {
        return DeadlineState::Near;
    }

    if week_out_eligible && TimeUtils::in_week_out_window(deadline, now, window) {
        return DeadlineState::WeekOut;
    }

    DeadlineState::Dormant
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn overdue_wins_and_reports_whole_days() {
        let window = WindowConfig::default();
        let now = at("2024-03-12T00:00:00Z");
        let deadline = now - Duration::days(2);

        assert_eq!(
            classify(deadline, now, &window, true),
            DeadlineState::Overdue { days: 2 }
        );
    }

    #[test]
    fn near_within_24_hours() {
        let window = WindowConfig::default();
        let now = at("2024-03-12T00:00:00Z");

        assert_eq!(
            classify(now + Duration::hours(23), now, &window, true),
            DeadlineState::Near
        );
        assert_eq!(
            classify(now + Duration::hours(25), now, &window, true),
            DeadlineState::Dormant
        );
    }

    #[test]
    fn week_out_only_when_eligible() {
        let window = WindowConfig::default();
        let now = at("2024-03-12T00:00:00Z");
        let deadline = now + Duration::days(6) + Duration::hours(12);

        assert_eq!(
            classify(deadline, now, &window, true),
            DeadlineState::WeekOut
        );
        // 已有指派的案件不再进入 WeekOut
        assert_eq!(
            classify(deadline, now, &window, false),
            DeadlineState::Dormant
        );
    }
}
