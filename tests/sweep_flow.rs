//! 端到端扫描流程测试: 内存后端 + 通道分发器。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use argus::common::{
    AlertColor, AlertMessage, ApplicationCase, ChannelKey, ContentReviewCase, CoordinatorConfig,
    DisputeCase, DisputeStatus, EventKind, HistoryEvent, Member, MembershipLevel, Mode, ModeStatus,
    RecertCase, Review, RoleGroup,
};
use argus::persistence::{
    CaseRecord, ChannelSink, ExternalRoles, MemoryBackend, StaticActivity, StaticAuthority,
};
use argus::policy::Throttle;
use argus::sweep::DeadlineSweeper;

struct World {
    backend: MemoryBackend,
    authority: Arc<StaticAuthority>,
    activity: Arc<StaticActivity>,
    sweeper: DeadlineSweeper,
    outbox: UnboundedReceiver<(ChannelKey, AlertMessage)>,
}

fn world_with(config: CoordinatorConfig) -> World {
    let backend = MemoryBackend::new();
    let authority = Arc::new(StaticAuthority::new());
    let activity = Arc::new(StaticActivity::new());
    let (sink, outbox) = ChannelSink::new();

    let sweeper = DeadlineSweeper::builder(config)
        .store(Arc::new(backend.clone()))
        .directory(Arc::new(backend.clone()))
        .authority(authority.clone())
        .activity(activity.clone())
        .sink(Arc::new(sink))
        .throttle(Throttle::none())
        .build()
        .unwrap();

    World {
        backend,
        authority,
        activity,
        sweeper,
        outbox,
    }
}

fn world() -> World {
    world_with(CoordinatorConfig::default())
}

fn drain(outbox: &mut UnboundedReceiver<(ChannelKey, AlertMessage)>) -> Vec<(ChannelKey, AlertMessage)> {
    let mut all = Vec::new();
    while let Ok(item) = outbox.try_recv() {
        all.push(item);
    }
    all
}

fn member(id: &str, name: &str, groups: &[RoleGroup], mode: Mode) -> Member {
    let mut m = Member::new(1000, name);
    m.id = id.to_string();
    m.groups = groups.to_vec();
    m.modes = vec![ModeStatus {
        mode,
        level: MembershipLevel::Full,
    }];
    m
}

fn joined(date: DateTime<Utc>, group: RoleGroup, mode: Mode) -> HistoryEvent {
    HistoryEvent {
        date,
        mode,
        kind: EventKind::Joined,
        group,
        related_case: None,
    }
}

#[tokio::test]
async fn overdue_recert_lists_non_responding_seniors() {
    let mut w = world();
    let now = Utc::now();

    w.backend
        .seed_member(member("subj", "Subject", &[RoleGroup::Reviewer], Mode::Osu));
    w.backend
        .seed_member(member("s1", "SeniorOne", &[RoleGroup::Senior], Mode::Osu));
    w.backend
        .seed_member(member("s2", "SeniorTwo", &[RoleGroup::Senior], Mode::Osu));

    let mut case = RecertCase::new("subj".into(), Mode::Osu, now - Duration::days(2));
    case.senior_assignees = vec!["s1".into(), "s2".into()];
    let case_id = case.id.clone();
    w.backend.seed_case(CaseRecord::Recert(case));

    w.sweeper.sweep(now).await.unwrap();

    let sent = drain(&mut w.outbox);
    assert_eq!(sent.len(), 1);
    let (channel, message) = &sent[0];
    assert_eq!(*channel, ChannelKey::Mode(Mode::Osu));
    assert_eq!(message.color, AlertColor::Red);
    assert!(message.description.contains("was due 2 days ago!"));
    // 没有任何评审提交: 两人都打叉，并被点名
    assert!(message.description.contains("❌ SeniorOne"));
    assert!(message.description.contains("❌ SeniorTwo"));
    assert!(!message.description.contains("✅"));
    assert!(message.description.contains("**Next step:** collect more reviews"));
    assert_eq!(message.mentions, vec!["s1".to_string(), "s2".to_string()]);

    // 同一状态下紧邻重跑: 不产生新通知 (幂等)
    w.sweeper.sweep(now).await.unwrap();
    assert!(drain(&mut w.outbox).is_empty());

    // 已提交评审的一方打勾
    let CaseRecord::Recert(stored) = w.backend.case_snapshot(&case_id).unwrap() else {
        panic!("wrong case kind");
    };
    assert_eq!(stored.last_alert, Some(argus::common::AlertKind::Overdue));
}

#[tokio::test]
async fn overdue_statuses_reflect_submitted_reviews() {
    let mut w = world();
    let now = Utc::now();

    w.backend
        .seed_member(member("s1", "Ann", &[RoleGroup::Senior], Mode::Taiko));
    w.backend
        .seed_member(member("s2", "Bob", &[RoleGroup::Senior], Mode::Taiko));

    let mut case = RecertCase::new("ghost".into(), Mode::Taiko, now - Duration::days(1));
    case.senior_assignees = vec!["s1".into(), "s2".into()];
    case.reviews = vec![Review {
        reviewer: "s1".into(),
        vote: None,
        comment: None,
    }];
    w.backend.seed_case(CaseRecord::Recert(case));

    w.sweeper.sweep(now).await.unwrap();

    let sent = drain(&mut w.outbox);
    assert_eq!(sent.len(), 1);
    let message = &sent[0].1;
    assert!(message.description.contains("✅ Ann"));
    assert!(message.description.contains("❌ Bob"));
    // 只点名未应答的 Bob
    assert_eq!(message.mentions, vec!["s2".to_string()]);
}

#[tokio::test]
async fn week_out_assigns_seniors_and_trials() {
    let mut config = CoordinatorConfig::default();
    config.modes.get_mut(&Mode::Osu).unwrap().has_trial_tier = true;
    let mut w = world_with(config);
    let now = Utc::now();

    // 被考核者本人也在试用层里: 必须被排除
    let mut subject = member("subj", "Subject", &[RoleGroup::Reviewer], Mode::Osu);
    subject.is_trial_reviewer = true;
    w.backend.seed_member(subject);

    for (id, name) in [("n1", "NatOne"), ("n2", "NatTwo"), ("n3", "NatThree")] {
        w.backend
            .seed_member(member(id, name, &[RoleGroup::Senior], Mode::Osu));
    }
    for (id, name) in [("t1", "TrialOne"), ("t2", "TrialTwo"), ("t3", "TrialThree")] {
        let mut t = member(id, name, &[RoleGroup::Reviewer], Mode::Osu);
        t.is_trial_reviewer = true;
        w.backend.seed_member(t);
    }

    let deadline = now + Duration::days(6) + Duration::hours(12);
    let case = RecertCase::new("subj".into(), Mode::Osu, deadline);
    let case_id = case.id.clone();
    w.backend.seed_case(CaseRecord::Recert(case));

    w.sweeper.sweep(now).await.unwrap();

    let CaseRecord::Recert(stored) = w.backend.case_snapshot(&case_id).unwrap() else {
        panic!("wrong case kind");
    };
    // 资深: 足额 3 人; 指派历史逐人落盘并带剩余天数快照
    assert_eq!(stored.senior_assignees.len(), 3);
    assert_eq!(stored.assignment_log.len(), 3);
    assert!(stored.assignment_log.iter().all(|e| e.days_remaining == 6));

    // 试用: 3 - 1 = 2 人，且绝不包含本人或刚指派的资深
    assert_eq!(stored.trial_assignees.len(), 2);
    assert!(!stored.trial_assignees.contains(&"subj".to_string()));
    for id in &stored.trial_assignees {
        assert!(!stored.senior_assignees.contains(id));
    }

    // 摘要通知而不是应答清单
    let sent = drain(&mut w.outbox);
    assert_eq!(sent.len(), 1);
    let message = &sent[0].1;
    assert_eq!(message.color, AlertColor::Pink);
    assert!(message.description.contains("is due in 1 week!"));
    assert!(message.fields.iter().any(|f| f.name == "Assigned seniors"));
    assert!(message.fields.iter().any(|f| f.name == "Assigned trials"));

    // 被抽走的资深评审员已出袋
    for id in &stored.senior_assignees {
        assert!(!w.backend.member_snapshot(id).unwrap().in_pool);
    }

    // 重跑: 已有指派，不再触发 WeekOut
    w.sweeper.sweep(now).await.unwrap();
    assert!(drain(&mut w.outbox).is_empty());
}

#[tokio::test]
async fn near_application_gets_a_reminder_without_mentions() {
    let mut w = world();
    let now = Utc::now();

    w.backend
        .seed_member(member("app", "Applicant", &[], Mode::Catch));
    w.backend
        .seed_member(member("s1", "Ann", &[RoleGroup::Senior], Mode::Catch));

    let mut case = ApplicationCase::new("app".into(), Mode::Catch, now + Duration::hours(10));
    case.senior_assignees = vec!["s1".into()];
    let case_id = case.id.clone();
    w.backend.seed_case(CaseRecord::Application(case));

    w.sweeper.sweep(now).await.unwrap();

    let sent = drain(&mut w.outbox);
    assert_eq!(sent.len(), 1);
    let message = &sent[0].1;
    assert_eq!(message.color, AlertColor::LightRed);
    assert!(message
        .description
        .contains("**Applicant**'s membership application is due in less than 24 hours!"));
    assert!(message.description.contains("❌ Ann"));
    // Near 态不点名
    assert!(message.mentions.is_empty());

    let CaseRecord::Application(stored) = w.backend.case_snapshot(&case_id).unwrap() else {
        panic!("wrong case kind");
    };
    assert_eq!(stored.last_alert, Some(argus::common::AlertKind::Near));
}

#[tokio::test]
async fn discussion_extension_defers_the_deadline() {
    let mut w = world();
    let now = Utc::now();

    // 生截止日已过 2 天，但讨论案件顺延 7 天 → 还不算逾期
    let mut case = RecertCase::new("ghost".into(), Mode::Catch, now - Duration::days(2));
    case.discussion = true;
    case.senior_assignees = vec!["s1".into()];
    w.backend.seed_case(CaseRecord::Recert(case));

    w.sweeper.sweep(now).await.unwrap();
    assert!(drain(&mut w.outbox).is_empty());
}

#[tokio::test]
async fn dispute_alerts_only_in_mediation() {
    let mut w = world();
    let now = Utc::now();

    let near = DisputeCase::new("contested ruling", Mode::Mania, now + Duration::hours(12));
    w.backend.seed_case(CaseRecord::Dispute(near));

    let mut archived = DisputeCase::new("old ruling", Mode::Mania, now - Duration::days(3));
    archived.status = DisputeStatus::Archived;
    w.backend.seed_case(CaseRecord::Dispute(archived));

    w.sweeper.sweep(now).await.unwrap();

    let sent = drain(&mut w.outbox);
    assert_eq!(sent.len(), 1);
    let (channel, message) = &sent[0];
    assert_eq!(*channel, ChannelKey::Mode(Mode::Mania));
    assert!(message
        .description
        .contains("Dispute mediation for **contested ruling** is due in less than 24 hours!"));
}

#[tokio::test]
async fn content_review_ceiling_overrides_recent_activity() {
    let mut w = world();
    let now = Utc::now();

    // 8 天前创建、昨天刚更新: 绝对上限仍然关闭它
    let mut stale = ContentReviewCase::new("old case", now - Duration::days(8));
    stale.updated_at = now - Duration::days(1);
    let stale_id = stale.id.clone();
    w.backend.seed_case(CaseRecord::ContentReview(stale));

    // 昨天创建: 保持活跃
    let fresh = ContentReviewCase::new("fresh case", now - Duration::days(1));
    let fresh_id = fresh.id.clone();
    w.backend.seed_case(CaseRecord::ContentReview(fresh));

    w.sweeper.close_content_reviews(now).await.unwrap();

    let CaseRecord::ContentReview(stored) = w.backend.case_snapshot(&stale_id).unwrap() else {
        panic!("wrong case kind");
    };
    assert!(!stored.active);

    let CaseRecord::ContentReview(untouched) = w.backend.case_snapshot(&fresh_id).unwrap() else {
        panic!("wrong case kind");
    };
    assert!(untouched.active);

    // 公开频道 + 内部频道各一条结算通知
    let sent = drain(&mut w.outbox);
    let channels: Vec<ChannelKey> = sent.iter().map(|(c, _)| *c).collect();
    assert_eq!(
        channels,
        vec![ChannelKey::ContentReview, ChannelKey::ContentReviewInternal]
    );
    assert!(sent[0].1.description.contains("Concluded vote for **old case**"));
}

#[tokio::test]
async fn low_activity_flags_once_and_respects_cooldown() {
    let mut w = world();
    let now = Utc::now();

    let mut idle = member("idle", "Idle", &[RoleGroup::Reviewer], Mode::Osu);
    idle.history = vec![joined(
        now - Duration::days(200),
        RoleGroup::Reviewer,
        Mode::Osu,
    )];
    w.backend.seed_member(idle);
    w.activity.set("idle", 1);

    // 新人: 观察窗口不足，不评估
    let mut rookie = member("rookie", "Rookie", &[RoleGroup::Reviewer], Mode::Osu);
    rookie.history = vec![joined(
        now - Duration::days(10),
        RoleGroup::Reviewer,
        Mode::Osu,
    )];
    w.backend.seed_member(rookie);
    w.activity.set("rookie", 0);

    w.sweeper.flag_low_activity(now).await.unwrap();

    let sent = drain(&mut w.outbox);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ChannelKey::Mode(Mode::Osu));
    assert!(sent[0].1.description.contains("**Idle**"));

    let flagged = w.backend.member_snapshot("idle").unwrap();
    assert_eq!(flagged.last_flagged_low_activity, Some(now));

    // 冷却期内重跑: 不再标记
    w.sweeper.flag_low_activity(now + Duration::days(5)).await.unwrap();
    assert!(drain(&mut w.outbox).is_empty());
}

#[tokio::test]
async fn tenure_check_flags_disagreements_and_audits_failures() {
    let mut w = world();
    let now = Utc::now();

    // 台账说还在任，机构说早没这个人了 → 不变量告警
    let mut stale = member("stale", "Stale", &[RoleGroup::Reviewer], Mode::Taiko);
    stale.external_id = 77;
    stale.history = vec![joined(
        now - Duration::days(400),
        RoleGroup::Reviewer,
        Mode::Taiko,
    )];
    w.backend.seed_member(stale);
    w.authority.set(77, ExternalRoles::default());

    // 机构查无此人 → 记审计，不中断
    let mut unknown = member("unknown", "Unknown", &[RoleGroup::Reviewer], Mode::Osu);
    unknown.external_id = 88;
    unknown.history = vec![joined(
        now - Duration::days(100),
        RoleGroup::Reviewer,
        Mode::Osu,
    )];
    w.backend.seed_member(unknown);

    w.sweeper.check_tenure(now).await.unwrap();

    let sent = drain(&mut w.outbox);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ChannelKey::Audit);
    assert!(sent[0]
        .1
        .description
        .contains("**Stale** taiko history disagrees with the membership authority"));

    let audit = w.sweeper.drain_audit();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].member, "unknown");
    assert_eq!(audit[0].context, "tenure-check");
}
