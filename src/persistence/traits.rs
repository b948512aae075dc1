use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::error::Result;
use crate::common::model::{AlertMessage, ChannelKey, Member, MemberId, Mode};
use crate::persistence::model::{CaseFilter, CasePatch, CaseRecord, ExternalRoles};

// ==========================================
// 1. 案件存储接口 (CaseStore)
// ==========================================

/// 工作流案件存储接口
///
/// **职责**: 案件记录的查询、变更与创建。存储技术 (SQL/文档库)
/// 完全由实现方决定，本子系统只消费纯记录。
///
/// **错误语义**: 写失败向直接调用方传播；扫描循环在外层按
/// 案件隔离，单个案件的失败不会中断同轮其余案件。
#[async_trait]
pub trait CaseStore: Send + Sync + 'static {
    /// 按过滤器查询案件
    async fn find(&self, filter: CaseFilter) -> Result<Vec<CaseRecord>>;

    /// 对单个案件应用补丁，返回更新后的记录
    async fn update(&self, id: &str, patch: CasePatch) -> Result<CaseRecord>;

    /// 创建案件
    async fn create(&self, record: CaseRecord) -> Result<CaseRecord>;
}

// ==========================================
// 2. 成员目录接口 (MemberDirectory)
// ==========================================

/// 成员目录接口
///
/// **职责**: 成员档案的查询，以及指派袋 (`in_pool`) 与低活跃
/// 冷却标记这两个本子系统拥有写权的字段。
///
/// **原子性约定**: `redraw` 必须是针对单个成员的一次原子
/// 读-改-写事务。没有这一点，两个并发抽取可能在补袋阶段
/// 抽中同一个已出袋成员。
#[async_trait]
pub trait MemberDirectory: Send + Sync + 'static {
    /// 按 ID 获取成员档案
    async fn get(&self, id: &str) -> Result<Option<Member>>;

    /// 查询某模式下可指派的资深评审员
    ///
    /// 条件: 持有 Senior 角色、开启评审、覆盖该模式、
    /// `in_pool` 等于参数值、且不在排除名单内。
    async fn eligible_seniors(
        &self,
        mode: Mode,
        in_pool: bool,
        exclude: &[MemberId],
    ) -> Result<Vec<Member>>;

    /// 查询某模式下可指派的初级/试用评审员
    ///
    /// 试用层不参与指派袋，纯随机抽样。
    async fn eligible_trials(&self, mode: Mode, exclude: &[MemberId]) -> Result<Vec<Member>>;

    /// [原子] 补袋并立即抽走
    ///
    /// 把 `in_pool` 翻成 `true` 再立即翻回 `false`，整个往返
    /// 必须在同一次读-改-写里完成。返回成员是否存在。
    async fn redraw(&self, id: &str) -> Result<bool>;

    /// 补袋: `in_pool = true`
    async fn replenish(&self, id: &str) -> Result<()>;

    /// 标记已被抽走: `in_pool = false`
    async fn mark_drawn(&self, id: &str) -> Result<()>;

    /// 全部持有 Reviewer 角色的成员 (低活跃检查用)
    async fn reviewers(&self) -> Result<Vec<Member>>;

    /// 全部拥有历史记录的成员 (任期校验用)
    async fn with_history(&self) -> Result<Vec<Member>>;

    /// 写入低活跃标记时间 (冷却依据)
    async fn mark_low_activity(&self, id: &str, when: DateTime<Utc>) -> Result<()>;
}

// ==========================================
// 3. 外部协作者接口 (Collaborators)
// ==========================================

/// 成员资格机构 (外部事实源)
///
/// 只有任期有效性校验使用它。实现方可以抛任意错误，
/// 扫描会把失败记入审计清单而不是中断。
#[async_trait]
pub trait MembershipAuthority: Send + Sync + 'static {
    async fn lookup_external_roles(&self, external_id: u64) -> anyhow::Result<ExternalRoles>;
}

/// 贡献统计源
///
/// 返回成员在给定时间段内的独立贡献数。
#[async_trait]
pub trait ActivitySource: Send + Sync + 'static {
    async fn unique_contributions(
        &self,
        member: &Member,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<u64>;
}

/// 通知分发器 (发出即忘)
///
/// 投递失败被吞掉 (记 warn 日志)，不重试、不影响扫描。
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn post(&self, channel: ChannelKey, message: AlertMessage) -> anyhow::Result<()>;
}
