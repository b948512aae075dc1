use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::new_entity_id;

/// 成员唯一 ID (NanoID 字符串)
pub type MemberId = String;

// ==========================================
// 1. 基础枚举 (Mode / RoleGroup / Level)
// ==========================================

/// 技能模式
///
/// 每个评审类别在各模式下相互独立：一个成员可以同时持有
/// 多个模式的资格，任期、考核与指派都按模式分开计算。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Osu,
    Taiko,
    Catch,
    Mania,
}

impl Mode {
    /// 全部模式 (遍历用)
    pub const ALL: [Mode; 4] = [Mode::Osu, Mode::Taiko, Mode::Catch, Mode::Mania];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Osu => "osu",
            Mode::Taiko => "taiko",
            Mode::Catch => "catch",
            Mode::Mania => "mania",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 评审角色类别
///
/// - `Reviewer`: 普通评审员，接受周期性重新认证。
/// - `Senior`: 资深评审员，有权对其他成员做出认证结论。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleGroup {
    Reviewer,
    Senior,
}

impl fmt::Display for RoleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleGroup::Reviewer => f.write_str("reviewer"),
            RoleGroup::Senior => f.write_str("senior"),
        }
    }
}

/// 模式内的资格等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipLevel {
    /// 正式成员
    Full,
    /// 试用期成员
    Probation,
}

/// 历史事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Joined,
    Left,
}

// ==========================================
// 2. 成员 (Member)
// ==========================================

/// 模式资格条目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeStatus {
    pub mode: Mode,
    pub level: MembershipLevel,
}

/// 成员历史事件
///
/// 由外部认证机构在成员资格变更时写入，按时间排序追加。
/// 固定 (mode, group) 下事件理应 joined/left 交替出现；
/// 台账层 (ledger) 必须容忍违反该约定的脏数据。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub date: DateTime<Utc>,
    pub mode: Mode,
    pub kind: EventKind,
    /// 事件所属的角色类别
    pub group: RoleGroup,
    /// 触发该事件的关联案件 (可选)
    #[serde(default)]
    pub related_case: Option<String>,
}

/// 成员档案
///
/// 台账 (history) 是成员自有的权威状态，本子系统只读；
/// `in_pool` 与 `last_flagged_low_activity` 是本子系统会写回的字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,

    /// 外部身份 ID (成员在上游平台上的编号)
    pub external_id: u64,

    pub name: String,

    /// 持有的角色类别
    pub groups: Vec<RoleGroup>,

    /// 各模式的资格等级
    pub modes: Vec<ModeStatus>,

    /// 资格变更历史 (追加写，时间有序)
    #[serde(default)]
    pub history: Vec<HistoryEvent>,

    /// 是否参与评审指派
    pub is_reviewer_enabled: bool,

    /// 是否参与争议调解
    pub is_mediator: bool,

    /// 是否属于初级/试用评审层
    pub is_trial_reviewer: bool,

    /// [指派袋] 当前纪元内是否仍在袋中
    ///
    /// - `true`: 本纪元尚未被抽中，可直接指派。
    /// - `false`: 已被抽中，需等待整袋补充后才会再次出现。
    pub in_pool: bool,

    /// 最近一次被标记为低活跃的时间 (冷却判定用)
    #[serde(default)]
    pub last_flagged_low_activity: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(external_id: u64, name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            external_id,
            name: name.into(),
            groups: Vec::new(),
            modes: Vec::new(),
            history: Vec::new(),
            is_reviewer_enabled: true,
            is_mediator: true,
            is_trial_reviewer: false,
            in_pool: true,
            last_flagged_low_activity: None,
        }
    }

    pub fn holds(&self, group: RoleGroup) -> bool {
        self.groups.contains(&group)
    }

    pub fn has_mode(&self, mode: Mode) -> bool {
        self.modes.iter().any(|m| m.mode == mode)
    }

    pub fn level_for(&self, mode: Mode) -> Option<MembershipLevel> {
        self.modes.iter().find(|m| m.mode == mode).map(|m| m.level)
    }

    /// 最近一次 Joined 事件的日期 (不分模式)
    ///
    /// 低活跃检查以此判断成员是否已有完整的观察窗口。
    pub fn last_joined(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .filter(|h| h.kind == EventKind::Joined)
            .map(|h| h.date)
            .max()
    }
}

// ==========================================
// 3. 工作流案件 (Cases)
// ==========================================

/// 认证结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consensus {
    Pass,
    Extend,
    Fail,
}

/// 已提交的评审
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub reviewer: MemberId,
    #[serde(default)]
    pub vote: Option<Consensus>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// 指派历史条目 (追加写)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentEntry {
    pub date: DateTime<Utc>,
    pub reviewer: MemberId,
    /// 指派时距截止日的剩余天数快照
    pub days_remaining: i64,
}

/// 扫描已发出的最后一类告警
///
/// 案件的紧急度每次扫描都重新推导，不落盘；但为了让紧邻的
/// 重复扫描不产生重复通知，这里持久化最后一次告警的种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Overdue,
    Near,
    WeekOut,
}

/// 重新认证案件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecertCase {
    pub id: String,
    /// 被考核的成员
    pub member: MemberId,
    pub mode: Mode,
    pub deadline: DateTime<Utc>,
    pub active: bool,

    /// 集体讨论模式 (生效截止日顺延 7 天)
    #[serde(default)]
    pub discussion: bool,

    /// 是否为主动离任评估 (仅影响通知措辞)
    #[serde(default)]
    pub is_resignation: bool,

    #[serde(default)]
    pub consensus: Option<Consensus>,
    #[serde(default)]
    pub feedback: Option<String>,

    /// 已指派的资深评审员
    #[serde(default)]
    pub senior_assignees: Vec<MemberId>,
    /// 已指派的初级/试用评审员
    #[serde(default)]
    pub trial_assignees: Vec<MemberId>,

    /// 已提交的评审
    #[serde(default)]
    pub reviews: Vec<Review>,

    /// 指派历史 (追加写)
    #[serde(default)]
    pub assignment_log: Vec<AssignmentEntry>,

    #[serde(default)]
    pub last_alert: Option<AlertKind>,
}

impl RecertCase {
    pub fn new(member: MemberId, mode: Mode, deadline: DateTime<Utc>) -> Self {
        Self {
            id: new_entity_id(),
            member,
            mode,
            deadline,
            active: true,
            discussion: false,
            is_resignation: false,
            consensus: None,
            feedback: None,
            senior_assignees: Vec::new(),
            trial_assignees: Vec::new(),
            reviews: Vec::new(),
            assignment_log: Vec::new(),
            last_alert: None,
        }
    }
}

/// 新成员申请案件
///
/// 与重新认证共用大部分字段，但评审员在创建时已指派，
/// 扫描不会为它补充指派 (没有 WeekOut 态)。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationCase {
    pub id: String,
    pub applicant: MemberId,
    pub mode: Mode,
    pub deadline: DateTime<Utc>,
    pub active: bool,

    #[serde(default)]
    pub discussion: bool,
    #[serde(default)]
    pub consensus: Option<Consensus>,
    #[serde(default)]
    pub feedback: Option<String>,

    #[serde(default)]
    pub senior_assignees: Vec<MemberId>,
    #[serde(default)]
    pub trial_assignees: Vec<MemberId>,
    #[serde(default)]
    pub reviews: Vec<Review>,

    #[serde(default)]
    pub last_alert: Option<AlertKind>,
}

impl ApplicationCase {
    pub fn new(applicant: MemberId, mode: Mode, deadline: DateTime<Utc>) -> Self {
        Self {
            id: new_entity_id(),
            applicant,
            mode,
            deadline,
            active: true,
            discussion: false,
            consensus: None,
            feedback: None,
            senior_assignees: Vec::new(),
            trial_assignees: Vec::new(),
            reviews: Vec::new(),
            last_alert: None,
        }
    }
}

/// 争议案件状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisputeStatus {
    Pending,
    InMediation,
    Archived,
}

/// 调解员投票
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediationVote {
    Uphold,
    Neutral,
    Dismiss,
}

/// 单个调解员的表态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mediation {
    pub mediator: MemberId,
    #[serde(default)]
    pub vote: Option<MediationVote>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// 争议调解案件
///
/// 只有 `InMediation` 状态的案件会被扫描；状态流转由
/// 外部交互操作负责，本子系统不改它。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeCase {
    pub id: String,
    /// 争议对象的描述 (标题)
    pub subject: String,
    pub mode: Mode,
    pub deadline: DateTime<Utc>,
    pub status: DisputeStatus,
    #[serde(default)]
    pub mediations: Vec<Mediation>,
    #[serde(default)]
    pub last_alert: Option<AlertKind>,
}

impl DisputeCase {
    pub fn new(subject: impl Into<String>, mode: Mode, deadline: DateTime<Utc>) -> Self {
        Self {
            id: new_entity_id(),
            subject: subject.into(),
            mode,
            deadline,
            status: DisputeStatus::InMediation,
            mediations: Vec::new(),
            last_alert: None,
        }
    }
}

/// 内容审查投票结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentVerdict {
    Agree,
    Neutral,
    Disagree,
}

/// 内容审查的单张选票
///
/// `group` 是投票时刻投票人的角色类别快照，结算统计按它分组。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBallot {
    pub mediator: MemberId,
    pub group: RoleGroup,
    pub verdict: ContentVerdict,
}

/// 内容审查案件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentReviewCase {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
    #[serde(default)]
    pub votes: Vec<ContentBallot>,
}

impl ContentReviewCase {
    pub fn new(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new_entity_id(),
            title: title.into(),
            created_at,
            updated_at: created_at,
            active: true,
            votes: Vec::new(),
        }
    }
}

// ==========================================
// 4. 通知模型 (Notification)
// ==========================================

/// 通知投递频道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKey {
    /// 模式专属频道
    Mode(Mode),
    /// 内容审查公开频道
    ContentReview,
    /// 内容审查内部频道
    ContentReviewInternal,
    /// 不变量告警/审计频道
    Audit,
}

/// 告警配色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertColor {
    /// 已逾期 / 低活跃 / 不变量告警
    Red,
    /// 24 小时内到期
    LightRed,
    /// 一周后到期 (已完成指派)
    Pink,
    /// 投票结算
    DarkYellow,
}

impl AlertColor {
    /// 数值色码 (嵌入式消息用)
    pub fn code(&self) -> u32 {
        match self {
            AlertColor::Red => 15607337,
            AlertColor::LightRed => 16742771,
            AlertColor::Pink => 16728232,
            AlertColor::DarkYellow => 7105536,
        }
    }
}

/// 结构化消息的附加字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertField {
    pub name: String,
    pub value: String,
}

/// 结构化通知消息
///
/// 投递机制 (webhook、聊天机器人等) 是外部协作者的事；
/// 本子系统只负责组装内容，发出即忘。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    pub color: AlertColor,
    #[serde(default)]
    pub fields: Vec<AlertField>,
    /// 需要单独点名的成员
    #[serde(default)]
    pub mentions: Vec<MemberId>,
}

impl AlertMessage {
    /// 纯文本消息的快捷构造
    pub fn text(description: impl Into<String>, color: AlertColor) -> Self {
        Self {
            title: None,
            description: description.into(),
            color,
            fields: Vec::new(),
            mentions: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn add_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(AlertField {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// 审计条目
///
/// 外部机构查询失败时记入，留待人工复核；绝不让它中断扫描。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub member: MemberId,
    /// 失败发生的检查环节
    pub context: String,
    pub error: String,
}
