use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use chrono::{DateTime, Utc};

use crate::common::config::CoordinatorConfig;
use crate::common::error::{CoordinatorError, Result};
use crate::common::model::{
    AlertColor, AlertMessage, ApplicationCase, AuditEntry, ChannelKey, ContentReviewCase,
    DisputeCase, EventKind, Member, MemberId, Mode, RecertCase, RoleGroup,
};
use crate::common::time::TimeUtils;
use crate::ledger::reconcile;
use crate::persistence::model::{CaseFilter, CasePatch, CaseRecord};
use crate::persistence::traits::{
    ActivitySource, CaseStore, MemberDirectory, MembershipAuthority, NotificationSink,
};
use crate::policy::Throttle;
use crate::pool::AssignmentPool;
use crate::sweep::classify::{classify, DeadlineState};
use crate::sweep::compose;

// ==========================================
// 1. 构建器 (SweeperBuilder)
// ==========================================

/// DeadlineSweeper 构建器
///
/// 协作者较多，用 Builder 把装配过程摊平。
pub struct SweeperBuilder {
    config: CoordinatorConfig,
    store: Option<Arc<dyn CaseStore>>,
    directory: Option<Arc<dyn MemberDirectory>>,
    authority: Option<Arc<dyn MembershipAuthority>>,
    activity: Option<Arc<dyn ActivitySource>>,
    sink: Option<Arc<dyn NotificationSink>>,
    throttle: Option<Throttle>,
}

impl SweeperBuilder {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            store: None,
            directory: None,
            authority: None,
            activity: None,
            sink: None,
            throttle: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn CaseStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn MemberDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn authority(mut self, authority: Arc<dyn MembershipAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn activity(mut self, activity: Arc<dyn ActivitySource>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// 完成装配
    ///
    /// 缺少任何协作者都在这里报配置错误，而不是运行期 panic。
    pub fn build(self) -> Result<DeadlineSweeper> {
        self.config.validate()?;

        let missing = |what: &str| CoordinatorError::Config(format!("{} not configured", what));
        let directory = self.directory.ok_or_else(|| missing("member directory"))?;

        Ok(DeadlineSweeper {
            pool: AssignmentPool::new(directory.clone()),
            store: self.store.ok_or_else(|| missing("case store"))?,
            directory,
            authority: self.authority.ok_or_else(|| missing("membership authority"))?,
            activity: self.activity.ok_or_else(|| missing("activity source"))?,
            sink: self.sink.ok_or_else(|| missing("notification sink"))?,
            throttle: self.throttle.unwrap_or_else(Throttle::none),
            config: Arc::new(self.config),
            audit: Mutex::new(Vec::new()),
        })
    }
}

// ==========================================
// 2. 截止日扫描器 (DeadlineSweeper)
// ==========================================

/// 截止日扫描器
///
/// 按优先级对每个活跃工作流实例分类，并在分类变化时发出
/// 对应通知 / 请求指派。每类扫描由 Runner 在各自的计划上
/// 触发；单轮内部实例串行处理，彼此故障隔离。
pub struct DeadlineSweeper {
    config: Arc<CoordinatorConfig>,
    store: Arc<dyn CaseStore>,
    directory: Arc<dyn MemberDirectory>,
    authority: Arc<dyn MembershipAuthority>,
    activity: Arc<dyn ActivitySource>,
    sink: Arc<dyn NotificationSink>,
    pool: AssignmentPool,
    throttle: Throttle,

    /// 外部机构故障的审计清单
    audit: Mutex<Vec<AuditEntry>>,
}

impl DeadlineSweeper {
    pub fn builder(config: CoordinatorConfig) -> SweeperBuilder {
        SweeperBuilder::new(config)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// 取走累积的审计条目
    pub fn drain_audit(&self) -> Vec<AuditEntry> {
        std::mem::take(&mut *self.audit.lock())
    }

    // ==========================================
    // 截止日主扫描 (Deadlines Sweep)
    // ==========================================

    /// 截止日扫描: 争议 → 申请 → 重新认证
    ///
    /// 对同一状态紧邻重跑是幂等的: 每个案件落盘的 `last_alert`
    /// 标记挡掉重复通知。
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<()> {
        debug!(runner = %self.config.runner_id, %now, "deadline sweep started");

        self.sweep_disputes(now).await?;
        self.sweep_applications(now).await?;
        self.sweep_recerts(now).await?;

        Ok(())
    }

    async fn sweep_disputes(&self, now: DateTime<Utc>) -> Result<()> {
        for record in self.store.find(CaseFilter::ActiveDisputes).await? {
            let CaseRecord::Dispute(case) = record else {
                continue;
            };
            self.isolated(case.id.clone(), self.process_dispute(&case, now))
                .await;
        }

        Ok(())
    }

    async fn sweep_applications(&self, now: DateTime<Utc>) -> Result<()> {
        for record in self.store.find(CaseFilter::ActiveApplications).await? {
            let CaseRecord::Application(case) = record else {
                continue;
            };
            self.isolated(case.id.clone(), self.process_application(&case, now))
                .await;
        }

        Ok(())
    }

    async fn sweep_recerts(&self, now: DateTime<Utc>) -> Result<()> {
        for record in self.store.find(CaseFilter::ActiveRecerts).await? {
            let CaseRecord::Recert(case) = record else {
                continue;
            };
            self.isolated(case.id.clone(), self.process_recert(&case, now))
                .await;
        }

        Ok(())
    }

    /// 按案件隔离故障
    ///
    /// 单个案件报错或 panic 只记日志，绝不中断同轮其余案件。
    async fn isolated(&self, case_id: String, fut: impl std::future::Future<Output = Result<()>>) {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_transient() => {
                warn!(case = %case_id, error = %e, "case skipped (transient)");
            }
            Ok(Err(e)) => {
                error!(case = %case_id, error = %e, "case processing failed");
            }
            Err(_) => {
                error!(case = %case_id, "case processing panicked");
            }
        }
    }

    /// 争议案件: 只响应 Overdue/Near，通知发往模式频道
    async fn process_dispute(&self, case: &DisputeCase, now: DateTime<Utc>) -> Result<()> {
        let state = classify(case.deadline, now, &self.config.window, false);
        let Some(kind) = state.alert_kind() else {
            return Ok(());
        };
        if case.last_alert == Some(kind) {
            return Ok(());
        }

        let description = match state {
            DeadlineState::Overdue { .. } => {
                format!("Dispute mediation for **{}** is overdue!", case.subject)
            }
            DeadlineState::Near => format!(
                "Dispute mediation for **{}** is due in less than 24 hours!",
                case.subject
            ),
            _ => return Ok(()),
        };

        self.dispatch(
            ChannelKey::Mode(case.mode),
            AlertMessage::text(description, AlertColor::Red),
        )
        .await;

        self.store
            .update(&case.id, CasePatch::RecordAlert(kind))
            .await?;

        Ok(())
    }

    /// 申请案件: Overdue/Near 提醒，无 WeekOut 指派
    async fn process_application(&self, case: &ApplicationCase, now: DateTime<Utc>) -> Result<()> {
        let deadline =
            TimeUtils::effective_deadline(case.deadline, case.discussion, &self.config.window);
        let state = classify(deadline, now, &self.config.window, false);
        let Some(kind) = state.alert_kind() else {
            return Ok(());
        };
        if case.last_alert == Some(kind) {
            return Ok(());
        }

        let subject = self.display_name(&case.applicant).await;
        let assignees = self
            .resolve_assignees(case.mode, &case.senior_assignees, &case.trial_assignees)
            .await;

        let (phrase, color, mentions) = match state {
            DeadlineState::Overdue { days } => (
                compose::overdue_phrase(days),
                AlertColor::Red,
                compose::pending_reviewer_mentions(&case.reviews, &assignees, case.discussion),
            ),
            DeadlineState::Near => (
                "is due in less than 24 hours!".to_string(),
                AlertColor::LightRed,
                Vec::new(),
            ),
            _ => return Ok(()),
        };

        let mut description = format!("**{}**'s membership application {}", subject, phrase);
        description.push_str(&compose::reviewer_statuses(
            &case.reviews,
            &assignees,
            case.discussion,
        ));
        description.push_str(&compose::next_step(
            case.discussion,
            case.consensus,
            case.feedback.as_deref(),
        ));

        let mut message = AlertMessage::text(description, color);
        message.mentions = mentions;
        self.dispatch(ChannelKey::Mode(case.mode), message).await;

        self.store
            .update(&case.id, CasePatch::RecordAlert(kind))
            .await?;

        Ok(())
    }

    /// 重新认证案件: 完整四态机
    async fn process_recert(&self, case: &RecertCase, now: DateTime<Utc>) -> Result<()> {
        let deadline =
            TimeUtils::effective_deadline(case.deadline, case.discussion, &self.config.window);
        let week_out_eligible = case.senior_assignees.is_empty();
        let state = classify(deadline, now, &self.config.window, week_out_eligible);

        let Some(kind) = state.alert_kind() else {
            return Ok(());
        };
        if case.last_alert == Some(kind) {
            return Ok(());
        }

        let subject = self.display_name(&case.member).await;
        let label = if case.is_resignation {
            "resignation evaluation"
        } else {
            "recertification"
        };

        match state {
            DeadlineState::WeekOut => {
                self.assign_reviewers(case, deadline, now, &subject, label)
                    .await?
            }
            DeadlineState::Overdue { days } => {
                let assignees = self
                    .resolve_assignees(case.mode, &case.senior_assignees, &case.trial_assignees)
                    .await;

                let mut description =
                    format!("**{}**'s {} {}", subject, label, compose::overdue_phrase(days));
                description.push_str(&compose::reviewer_statuses(
                    &case.reviews,
                    &assignees,
                    case.discussion,
                ));
                description.push_str(&compose::next_step(
                    case.discussion,
                    case.consensus,
                    case.feedback.as_deref(),
                ));

                let mut message = AlertMessage::text(description, AlertColor::Red);
                message.mentions =
                    compose::pending_reviewer_mentions(&case.reviews, &assignees, case.discussion);
                self.dispatch(ChannelKey::Mode(case.mode), message).await;
            }
            DeadlineState::Near => {
                let assignees = self
                    .resolve_assignees(case.mode, &case.senior_assignees, &case.trial_assignees)
                    .await;

                let mut description =
                    format!("**{}**'s {} is due in less than 24 hours!", subject, label);
                description.push_str(&compose::reviewer_statuses(
                    &case.reviews,
                    &assignees,
                    case.discussion,
                ));
                description.push_str(&compose::next_step(
                    case.discussion,
                    case.consensus,
                    case.feedback.as_deref(),
                ));

                self.dispatch(
                    ChannelKey::Mode(case.mode),
                    AlertMessage::text(description, AlertColor::LightRed),
                )
                .await;
            }
            DeadlineState::Dormant => return Ok(()),
        }

        self.store
            .update(&case.id, CasePatch::RecordAlert(kind))
            .await?;

        Ok(())
    }

    /// WeekOut 指派: 抽取评审组、落盘指派历史、发摘要通知
    async fn assign_reviewers(
        &self,
        case: &RecertCase,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
        subject: &str,
        label: &str,
    ) -> Result<()> {
        let mode_cfg = self.config.mode(case.mode);
        let days_remaining = TimeUtils::days_until(deadline, now);

        // 被考核者绝不评审自己
        let exclude = vec![case.member.clone()];
        let seniors = self
            .pool
            .assign(case.mode, &exclude, mode_cfg.evaluations_required)
            .await?;
        if seniors.len() < mode_cfg.evaluations_required {
            // 降级: 袋内外合格人数不足，带着不完整的评审组继续
            warn!(
                case = %case.id,
                got = seniors.len(),
                want = mode_cfg.evaluations_required,
                "senior pool shortfall"
            );
        }

        let log = seniors
            .iter()
            .map(|m| crate::common::model::AssignmentEntry {
                date: now,
                reviewer: m.id.clone(),
                days_remaining,
            })
            .collect();
        self.store
            .update(
                &case.id,
                CasePatch::AssignSeniors {
                    assignees: seniors.iter().map(|m| m.id.clone()).collect(),
                    log,
                },
            )
            .await?;

        let mut message = AlertMessage::text(
            format!("**{}**'s {} is due in 1 week!", subject, label),
            AlertColor::Pink,
        )
        .add_field("Assigned seniors", compose::name_list(&seniors));

        // 试用层: 排除本人与刚指派的资深评审员
        if mode_cfg.has_trial_tier && case.trial_assignees.is_empty() {
            let mut trial_exclude = exclude;
            trial_exclude.extend(seniors.iter().map(|m| m.id.clone()));

            let trials = self
                .pool
                .sample_trial(
                    case.mode,
                    &trial_exclude,
                    mode_cfg.evaluations_required.saturating_sub(1),
                )
                .await?;

            if !trials.is_empty() {
                self.store
                    .update(
                        &case.id,
                        CasePatch::AssignTrials {
                            assignees: trials.iter().map(|m| m.id.clone()).collect(),
                        },
                    )
                    .await?;
                message = message.add_field("Assigned trials", compose::name_list(&trials));
            }
        }

        self.dispatch(ChannelKey::Mode(case.mode), message).await;

        Ok(())
    }

    // ==========================================
    // 内容审查关闭 (Content Review Closing)
    // ==========================================

    /// 闲置超时关闭: 7 天绝对上限，或 3 天龄 + 2 天无更新
    pub async fn close_content_reviews(&self, now: DateTime<Utc>) -> Result<()> {
        for record in self.store.find(CaseFilter::ActiveContentReviews).await? {
            let CaseRecord::ContentReview(case) = record else {
                continue;
            };
            self.isolated(case.id.clone(), self.close_content_review(&case, now))
                .await;
        }

        Ok(())
    }

    async fn close_content_review(&self, case: &ContentReviewCase, now: DateTime<Utc>) -> Result<()> {
        if !TimeUtils::content_should_close(case.created_at, case.updated_at, now, &self.config.window)
        {
            return Ok(());
        }

        self.store.update(&case.id, CasePatch::Deactivate).await?;
        info!(case = %case.id, title = %case.title, "concluded content review vote");

        let message = AlertMessage::text(compose::content_tally(case), AlertColor::DarkYellow);
        self.dispatch(ChannelKey::ContentReview, message.clone())
            .await;
        self.dispatch(ChannelKey::ContentReviewInternal, message)
            .await;

        Ok(())
    }

    // ==========================================
    // 低活跃标记 (Low Activity Check)
    // ==========================================

    /// 低活跃标记
    ///
    /// 对每个已有完整观察窗口的评审员，按模式对比长/短两个
    /// 窗口内的独立贡献数与阈值；命中且不在冷却期则落标记
    /// 并通知。这是分类检查，不改变任何案件状态。
    pub async fn flag_low_activity(&self, now: DateTime<Utc>) -> Result<()> {
        let window = &self.config.window;
        let long_since = TimeUtils::months_ago(now, window.low_activity_long_months);
        let short_since = TimeUtils::months_ago(now, window.low_activity_short_months);
        let window_days = (now - long_since).num_days();

        for member in self.directory.reviewers().await? {
            // 冷却: 30 天内不重复标记同一成员
            let cooled_down = member.last_flagged_low_activity.map_or(true, |t| {
                t < now - chrono::Duration::days(window.low_activity_cooldown_days)
            });
            if !cooled_down {
                continue;
            }

            for status in &member.modes {
                // 台账口径的累计在任天数不足一个长窗口: 不评估该模式
                let tenure = reconcile(&member.history, RoleGroup::Reviewer, status.mode, now);
                if !tenure.is_some_and(|days| days >= window_days) {
                    continue;
                }

                let per_month = self.config.mode(status.mode).low_activity_per_month;

                let long_count = match self.contributions(&member, long_since, now).await {
                    Some(c) => c,
                    None => break, // 统计源故障已记审计，跳过该成员
                };
                let short_count = match self.contributions(&member, short_since, now).await {
                    Some(c) => c,
                    None => break,
                };

                let low_long = long_count < per_month * window.low_activity_long_months as u64;
                let low_short = short_count < per_month * window.low_activity_short_months as u64;
                if !low_long && !low_short {
                    continue;
                }

                self.directory.mark_low_activity(&member.id, now).await?;

                let message = AlertMessage::text(
                    format!(
                        "**{}** — {} unique contributions since {}",
                        member.name,
                        long_count,
                        long_since.format("%Y-%m-%d")
                    ),
                    AlertColor::Red,
                )
                .with_title("Low activity");
                self.dispatch(ChannelKey::Mode(status.mode), message).await;

                // 标记落盘后冷却立即生效，本轮不再看其余模式
                break;
            }
        }

        Ok(())
    }

    /// 贡献数查询，失败转审计
    async fn contributions(
        &self,
        member: &Member,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Option<u64> {
        match self.activity.unique_contributions(member, since, until).await {
            Ok(count) => Some(count),
            Err(e) => {
                let e = CoordinatorError::Activity(e);
                self.record_audit(until, &member.id, "low-activity", &e.to_string());
                None
            }
        }
    }

    // ==========================================
    // 任期有效性校验 (Tenure Validity Check)
    // ==========================================

    /// 任期有效性校验
    ///
    /// 把外部机构观察到的角色与台账的最后一条事件对账；
    /// 不一致即发不变量告警。只检测，不修正。
    pub async fn check_tenure(&self, now: DateTime<Utc>) -> Result<()> {
        for member in self.directory.with_history().await? {
            let external = match self.authority.lookup_external_roles(member.external_id).await {
                Ok(roles) => roles,
                Err(e) => {
                    // 机构不可用: 记审计，换下一个成员
                    let e = CoordinatorError::Authority(e);
                    self.record_audit(now, &member.id, "tenure-check", &e.to_string());
                    self.throttle.pace().await;
                    continue;
                }
            };

            for mode in Mode::ALL {
                let mut disagree = false;

                for group in [RoleGroup::Reviewer, RoleGroup::Senior] {
                    let last = member
                        .history
                        .iter()
                        .filter(|h| h.group == group && h.mode == mode)
                        .max_by_key(|h| h.date);

                    let Some(last) = last else {
                        continue;
                    };
                    let externally = external.covers(group, mode);

                    match last.kind {
                        EventKind::Joined if !externally => disagree = true,
                        EventKind::Left if externally => disagree = true,
                        _ => {}
                    }
                }

                if disagree {
                    let message = AlertMessage::text(
                        format!(
                            "**{}** {} history disagrees with the membership authority",
                            member.name, mode
                        ),
                        AlertColor::Red,
                    );
                    self.dispatch(ChannelKey::Audit, message).await;
                }
            }

            self.throttle.pace().await;
        }

        Ok(())
    }

    // ==========================================
    // 内部工具 (Helpers)
    // ==========================================

    /// 把指派名单解析成成员档案
    ///
    /// 应答统计的口径: 有试用层的模式把两层合并。
    /// 目录里查不到的 ID 静默跳过 (成员可能已被移除)。
    async fn resolve_assignees(
        &self,
        mode: Mode,
        seniors: &[MemberId],
        trials: &[MemberId],
    ) -> Vec<Member> {
        let mut ids: Vec<&MemberId> = seniors.iter().collect();
        if self.config.mode(mode).has_trial_tier {
            ids.extend(trials.iter());
        }

        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            match self.directory.get(id).await {
                Ok(Some(m)) => members.push(m),
                Ok(None) => {}
                Err(e) => warn!(member = %id, error = %e, "assignee lookup failed"),
            }
        }

        members
    }

    /// 成员显示名 (查不到时退回 ID)
    async fn display_name(&self, id: &MemberId) -> String {
        match self.directory.get(id).await {
            Ok(Some(m)) => m.name,
            _ => id.clone(),
        }
    }

    /// 尽力投递: 失败只记 warn，并按策略停顿一拍
    async fn dispatch(&self, channel: ChannelKey, message: AlertMessage) {
        if let Err(e) = self
            .sink
            .post(channel, message)
            .await
            .map_err(CoordinatorError::Dispatch)
        {
            warn!(?channel, error = %e, "notification dropped");
        }
        self.throttle.pace().await;
    }

    fn record_audit(&self, at: DateTime<Utc>, member: &MemberId, context: &str, error: &str) {
        warn!(member = %member, context, error, "external failure recorded for audit");
        self.audit.lock().push(AuditEntry {
            at,
            member: member.clone(),
            context: context.to_string(),
            error: error.to_string(),
        });
    }
}
