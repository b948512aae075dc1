pub mod config;
pub mod error;
pub mod model;
pub mod time;
pub(crate) mod utils;

// 导出配置
pub use config::{CoordinatorConfig, ModeConfig, PacingConfig, ScheduleConfig, WindowConfig};

// 导出错误类型
pub use error::{CoordinatorError, Result};

// 导出核心模型
pub use model::{
    AlertColor, AlertField, AlertKind, AlertMessage, ApplicationCase, AssignmentEntry, AuditEntry,
    ChannelKey, Consensus, ContentBallot, ContentReviewCase, ContentVerdict, DisputeCase,
    DisputeStatus, EventKind, HistoryEvent, Mediation, MediationVote, Member, MemberId,
    MembershipLevel, Mode, ModeStatus, RecertCase, Review, RoleGroup,
};

pub use time::TimeUtils;
// 内部工具的快捷访问
pub(crate) use utils::new_entity_id;
