use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use crate::common::model::{AlertMessage, ChannelKey, Member, MemberId};
use crate::persistence::model::ExternalRoles;
use crate::persistence::traits::{ActivitySource, MembershipAuthority, NotificationSink};

// ==========================================
// 1. 通道分发器 (ChannelSink)
// ==========================================

/// 基于通道的通知分发器
///
/// 把消息原样转发进一条无界 tokio 通道，由下游消费者
/// 负责真正的投递 (webhook、聊天机器人等)。
/// 发出即忘: 接收端掉线时报错，由扫描侧吞掉。
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(ChannelKey, AlertMessage)>,
}

impl ChannelSink {
    /// 创建分发器，返回 (sink, 消费端)
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(ChannelKey, AlertMessage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn post(&self, channel: ChannelKey, message: AlertMessage) -> anyhow::Result<()> {
        self.tx
            .send((channel, message))
            .map_err(|_| anyhow::anyhow!("notification channel closed"))
    }
}

// ==========================================
// 2. 日志分发器 (LogSink)
// ==========================================

/// 把通知写进日志的分发器
///
/// 没接任何下游时的默认选择；消息按 JSON 编码方便检索。
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn post(&self, channel: ChannelKey, message: AlertMessage) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&message)?;
        info!(?channel, %payload, "notification");
        Ok(())
    }
}

// ==========================================
// 3. 静态事实源 (StaticAuthority / StaticActivity)
// ==========================================

/// 表驱动的成员资格机构
///
/// 外部 ID -> 角色快照; 未登记的 ID 视为查询失败，
/// 正好用于演练审计路径。
#[derive(Debug, Default)]
pub struct StaticAuthority {
    roles: DashMap<u64, ExternalRoles>,
}

impl StaticAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, external_id: u64, roles: ExternalRoles) {
        self.roles.insert(external_id, roles);
    }
}

#[async_trait]
impl MembershipAuthority for StaticAuthority {
    async fn lookup_external_roles(&self, external_id: u64) -> anyhow::Result<ExternalRoles> {
        self.roles
            .get(&external_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| anyhow::anyhow!("no external record for {}", external_id))
    }
}

/// 表驱动的贡献统计源
///
/// 成员 ID -> 固定贡献数，忽略时间窗口。
#[derive(Debug, Default)]
pub struct StaticActivity {
    counts: DashMap<MemberId, u64>,
}

impl StaticActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, member: impl Into<MemberId>, count: u64) {
        self.counts.insert(member.into(), count);
    }
}

#[async_trait]
impl ActivitySource for StaticActivity {
    async fn unique_contributions(
        &self,
        member: &Member,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        Ok(self.counts.get(&member.id).map(|c| *c).unwrap_or(0))
    }
}
