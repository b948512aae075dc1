use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::model::{
    AlertKind, ApplicationCase, AssignmentEntry, ContentReviewCase, DisputeCase, MemberId, Mode,
    RecertCase, RoleGroup,
};

/// 案件查询过滤器
///
/// 扫描只关心"当前活跃"的实例，按工作流类型各取一类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFilter {
    /// 活跃的重新认证案件
    ActiveRecerts,
    /// 活跃的新成员申请案件
    ActiveApplications,
    /// 调解中的争议案件
    ActiveDisputes,
    /// 活跃的内容审查案件
    ActiveContentReviews,
}

/// 统一的案件记录
///
/// 存储层对外只暴露这一种记录类型，扫描侧按变体解构。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CaseRecord {
    Recert(RecertCase),
    Application(ApplicationCase),
    Dispute(DisputeCase),
    ContentReview(ContentReviewCase),
}

impl CaseRecord {
    pub fn id(&self) -> &str {
        match self {
            CaseRecord::Recert(c) => &c.id,
            CaseRecord::Application(c) => &c.id,
            CaseRecord::Dispute(c) => &c.id,
            CaseRecord::ContentReview(c) => &c.id,
        }
    }
}

/// 案件变更补丁
///
/// 扫描只会对案件做这几类有限的修改；删除不在其中——
/// 本子系统从不删除案件。
#[derive(Debug, Clone)]
pub enum CasePatch {
    /// 写入资深评审员指派及对应的历史条目
    AssignSeniors {
        assignees: Vec<MemberId>,
        log: Vec<AssignmentEntry>,
    },
    /// 写入初级/试用评审员指派
    AssignTrials { assignees: Vec<MemberId> },
    /// 记录已发出的告警种类 (扫描幂等的依据)
    RecordAlert(AlertKind),
    /// 置为不活跃 (内容审查结算)
    Deactivate,
}

/// 外部机构视角的角色快照
///
/// 任期有效性校验用它与台账的最后一条事件对账。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalRoles {
    /// 持有的角色类别
    pub groups: Vec<RoleGroup>,
    /// 每个角色类别下生效的模式
    pub mode_roles: HashMap<RoleGroup, Vec<Mode>>,
}

impl ExternalRoles {
    pub fn holds(&self, group: RoleGroup) -> bool {
        self.groups.contains(&group)
    }

    /// 某角色类别下是否覆盖指定模式
    pub fn covers(&self, group: RoleGroup, mode: Mode) -> bool {
        self.mode_roles
            .get(&group)
            .map(|modes| modes.contains(&mode))
            .unwrap_or(false)
    }
}
