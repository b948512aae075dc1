//! 成员资格台账 (Membership Ledger)
//!
//! 从一份可能不一致的、按时间排序的 joined/left 事件日志中，
//! 推导出某个 (角色类别, 模式) 的累计在任天数。
//!
//! 设计要点:
//! - 纯函数，无 IO，永不失败；脏数据静默修复而不是拒绝。
//! - 结果对固定历史随 `now` 单调不减。

use chrono::{DateTime, Utc};

use crate::common::model::{EventKind, HistoryEvent, Mode, RoleGroup};

/// 推导累计在任天数
///
/// 过滤出匹配 (group, mode) 的事件后执行两趟处理:
/// 1. **修复趟**: 按时间扫描，相邻同类事件视为冗余——重复的
///    `Joined` 保留更早的那条，重复的 `Left` 保留更晚的那条。
///    这是针对上游脏数据的尽力归一化，不是严格校验。
/// 2. **配对趟**: 每条 `Joined` 与其后最近的未消费 `Left` 配对，
///    逐对累加整天数；末尾未配对的 `Joined` 记到 `now` 为止。
///
/// 完全没有历史记录时返回 `None`；有历史但无匹配事件返回 `Some(0)`。
pub fn reconcile(
    history: &[HistoryEvent],
    group: RoleGroup,
    mode: Mode,
    now: DateTime<Utc>,
) -> Option<i64> {
    if history.is_empty() {
        return None;
    }

    let mut events: Vec<&HistoryEvent> = history
        .iter()
        .filter(|h| h.group == group && h.mode == mode)
        .collect();
    events.sort_by_key(|h| h.date);

    let repaired = repair(&events);

    let mut total = 0i64;
    let mut open_joined: Option<DateTime<Utc>> = None;

    for event in repaired {
        match event.kind {
            EventKind::Joined => {
                // 修复趟之后不会出现双开，这里只做兜底
                if open_joined.is_none() {
                    open_joined = Some(event.date);
                }
            }
            EventKind::Left => {
                // 没有对应 Joined 的 Left 直接忽略
                if let Some(joined) = open_joined.take() {
                    total += (event.date - joined).num_days();
                }
            }
        }
    }

    // 末尾仍在任: 记到观察时刻
    if let Some(joined) = open_joined {
        total += (now - joined).num_days();
    }

    Some(total)
}

/// 修复趟: 丢弃相邻的同类冗余事件
///
/// 对已经干净 (交替) 的历史，这一趟是恒等变换。
fn repair<'a>(events: &[&'a HistoryEvent]) -> Vec<&'a HistoryEvent> {
    let mut repaired: Vec<&HistoryEvent> = Vec::with_capacity(events.len());

    for &event in events {
        match repaired.last_mut() {
            Some(last) if last.kind == event.kind => {
                // 重复 Left: 保留更晚的; 重复 Joined: 保留更早的
                if event.kind == EventKind::Left {
                    *last = event;
                }
            }
            _ => repaired.push(event),
        }
    }

    repaired
}
