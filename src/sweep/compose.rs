//! 通知文案组装
//!
//! 扫描到的每种紧急度对应一个组装器；这里只产出字符串和
//! 点名名单，绝不做 IO。

use crate::common::model::{ContentReviewCase, ContentVerdict, Consensus, Member, MemberId, Review, RoleGroup};

/// 逾期措辞: "was due today!" / "1 day ago!" / "N days ago!"
pub(crate) fn overdue_phrase(days: i64) -> String {
    match days {
        0 => "was due today!".to_string(),
        1 => "was due 1 day ago!".to_string(),
        n => format!("was due {} days ago!", n),
    }
}

/// 应答状态清单
///
/// 把已提交评审集合与指派集合做差集，逐人打勾/打叉。
/// 集体讨论案件不列清单 (人人都该参与，没有固定名单)。
pub(crate) fn reviewer_statuses(reviews: &[Review], assignees: &[Member], discussion: bool) -> String {
    if discussion {
        return String::new();
    }

    let submitted: Vec<&MemberId> = reviews.iter().map(|r| &r.reviewer).collect();
    let mut text = String::new();

    for member in assignees {
        if submitted.contains(&&member.id) {
            text.push_str("\n✅ ");
        } else {
            text.push_str("\n❌ ");
        }
        text.push_str(&member.name);
    }

    text
}

/// 下一步提示
///
/// 按办理进度取第一个缺口: 凑评审 → 定结论 → 写反馈 → 通知本人。
pub(crate) fn next_step(
    discussion: bool,
    consensus: Option<Consensus>,
    feedback: Option<&str>,
) -> String {
    let step = if !discussion {
        "collect more reviews"
    } else if consensus.is_none() {
        "decide consensus"
    } else if feedback.is_none() {
        "write feedback"
    } else {
        "notify the subject"
    };

    format!("\n**Next step:** {}", step)
}

/// 需要单独点名的成员
///
/// - 普通案件: 点名尚未提交评审的指派成员。
/// - 讨论案件: 点名已经表过态的资深成员 (催他们收尾)。
///
/// 两种情况都只点仍开启评审参与的成员。
pub(crate) fn pending_reviewer_mentions(
    reviews: &[Review],
    assignees: &[Member],
    discussion: bool,
) -> Vec<MemberId> {
    if discussion {
        assignees
            .iter()
            .filter(|m| {
                m.holds(RoleGroup::Senior)
                    && m.is_reviewer_enabled
                    && reviews.iter().any(|r| r.reviewer == m.id)
            })
            .map(|m| m.id.clone())
            .collect()
    } else {
        assignees
            .iter()
            .filter(|m| {
                m.is_reviewer_enabled && !reviews.iter().any(|r| r.reviewer == m.id)
            })
            .map(|m| m.id.clone())
            .collect()
    }
}

/// 成员名单 (逗号分隔)
pub(crate) fn name_list(members: &[Member]) -> String {
    members
        .iter()
        .map(|m| m.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 内容审查结算文案
///
/// 按角色类别分组统计赞成/反对比例。
pub(crate) fn content_tally(case: &ContentReviewCase) -> String {
    let pct = |part: usize, total: usize| -> f64 {
        if total == 0 {
            return 0.0;
        }
        (part as f64 / total as f64 * 1000.0).round() / 10.0
    };

    let split = |group: Option<RoleGroup>| -> (usize, usize) {
        let mut agree = 0;
        let mut disagree = 0;
        for ballot in &case.votes {
            if group.is_some_and(|g| ballot.group != g) {
                continue;
            }
            match ballot.verdict {
                ContentVerdict::Agree => agree += 1,
                ContentVerdict::Disagree => disagree += 1,
                ContentVerdict::Neutral => {}
            }
        }
        (agree, disagree)
    };

    let (sr_yes, sr_no) = split(Some(RoleGroup::Senior));
    let (rv_yes, rv_no) = split(Some(RoleGroup::Reviewer));
    let (all_yes, all_no) = split(None);

    format!(
        "Concluded vote for **{}**\n\n\
         **Senior:** {}% yes | {}% no\n\
         **Reviewer:** {}% yes | {}% no\n\
         **Total:** {}% yes | {}% no",
        case.title,
        pct(sr_yes, sr_yes + sr_no),
        pct(sr_no, sr_yes + sr_no),
        pct(rv_yes, rv_yes + rv_no),
        pct(rv_no, rv_yes + rv_no),
        pct(all_yes, all_yes + all_no),
        pct(all_no, all_yes + all_no),
    )
}
