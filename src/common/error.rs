use thiserror::Error;

/// 协调器统一结果类型
///
/// 使用此别名可以简化函数签名：`fn do_something() -> Result<()>`
pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    // ==========================================
    // 1. 配置与启动错误 (Configuration & Startup)
    // ==========================================
    /// 配置错误
    ///
    /// - 触发场景: 模式配置缺失、阈值非法、互斥配置同时启用。
    /// - 处理: 启动前修正配置；运行期不应出现。
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cron 表达式无效
    ///
    /// - 触发场景: 扫描计划里的 cron 字符串无法解析。
    /// - 后果: Runner 拒绝启动，防止某类扫描永远不触发。
    #[error("Invalid cron expression: {0}")]
    InvalidCron(#[from] cron::error::Error),

    // ==========================================
    // 2. 持久化错误 (Persistence)
    // ==========================================
    /// 案件不存在
    ///
    /// - 触发场景: 对一个已被删除或从未存在的案件 ID 执行 update。
    #[error("Case {0} not found.")]
    CaseNotFound(String),

    /// 成员不存在
    #[error("Member {0} not found.")]
    MemberNotFound(String),

    /// 持久化层通用错误
    ///
    /// - 说明: 用于包装底层存储 (SQL/文档库) 的驱动错误。
    /// - 处理: 按规范向变更操作的直接调用方传播；扫描循环内
    ///   按案件隔离，单个案件失败不影响同轮其余案件。
    #[error("Persistence layer failure: {0}")]
    Persistence(String),

    /// 序列化/反序列化失败
    ///
    /// - 触发场景: 外发消息编码失败，或存储里的记录结构不兼容。
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 通用 IO 错误
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    // ==========================================
    // 3. 外部协作者错误 (External Collaborators)
    // ==========================================
    /// 成员资格机构查询失败
    ///
    /// - 触发场景: 任期校验时上游接口超时/报错。
    /// - 处理: 记入审计清单留待复核，不中断扫描。
    #[error("Membership authority lookup failed: {0}")]
    Authority(#[source] anyhow::Error),

    /// 贡献统计源查询失败
    ///
    /// - 处理: 与 Authority 相同，记审计后跳过该成员。
    #[error("Activity source failure: {0}")]
    Activity(#[source] anyhow::Error),

    /// 通知投递失败
    ///
    /// - 处理: 尽力投递 (best-effort)，失败仅记 warn 日志，不重试。
    #[error("Notification dispatch failed: {0}")]
    Dispatch(#[source] anyhow::Error),
}

// --- 错误分级：决定扫描循环的处置方式 ---
impl CoordinatorError {
    /// 判断该错误是否属于暂时性故障 (Transient)
    ///
    /// - 返回 `true`: 基础设施抖动、外部接口超时等，下一轮扫描
    ///   大概率自愈，按 warn 记录即可。
    /// - 返回 `false`: 配置或数据问题，重跑也不会好，按 error 记录。
    pub fn is_transient(&self) -> bool {
        match self {
            CoordinatorError::Io(_) => true,
            CoordinatorError::Persistence(_) => true,
            CoordinatorError::Authority(_) => true,
            CoordinatorError::Activity(_) => true,
            CoordinatorError::Dispatch(_) => true,

            CoordinatorError::Config(_) => false,
            CoordinatorError::InvalidCron(_) => false,
            CoordinatorError::Serialization(_) => false,
            CoordinatorError::CaseNotFound(_) => false,
            CoordinatorError::MemberNotFound(_) => false,
        }
    }

    /// 判断该错误是否可以被扫描直接吞掉 (best-effort 语义)
    ///
    /// 只有通知投递符合条件：规范要求投递失败不影响任何后续处理。
    pub fn is_best_effort(&self) -> bool {
        matches!(self, CoordinatorError::Dispatch(_))
    }
}
