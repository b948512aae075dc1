use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::error::Result;
use crate::common::model::Mode;
use crate::common::time::TimeUtils;
use crate::common::utils::default_runner_id;

// ==========================================
// 1. 模式配置 (ModeConfig)
// ==========================================

/// 单个技能模式的评审参数
///
/// 原先散落在各处分支里的按模式查表，统一收敛到这里。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModeConfig {
    /// 达成结论所需的评审份数
    ///
    /// - 说明: WeekOut 阶段按此数量抽取资深评审员。
    /// - 默认值: 3
    pub evaluations_required: usize,

    /// 该模式是否开放初级/试用评审层
    ///
    /// - 说明: 开启后 WeekOut 阶段会额外抽取 `evaluations_required - 1`
    ///   名试用评审员，且到期通知的应答名单把两层合并统计。
    pub has_trial_tier: bool,

    /// 低活跃阈值 (每月的独立贡献数下限)
    ///
    /// - 说明: 观察窗为 N 个月时，阈值为 `N * low_activity_per_month`。
    /// - 默认值: 3 (mania 模式因评审量天然偏低，默认 2)
    pub low_activity_per_month: u64,
}

impl ModeConfig {
    /// 各模式的出厂默认
    pub fn default_for(mode: Mode) -> Self {
        Self {
            evaluations_required: 3,
            has_trial_tier: false,
            low_activity_per_month: if mode == Mode::Mania { 2 } else { 3 },
        }
    }
}

// ==========================================
// 2. 时间窗口配置 (WindowConfig)
// ==========================================

/// 截止日分类与闲置关闭的共享时间窗口策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Near 态阈值 (小时)
    ///
    /// - 说明: 距截止日不足此小时数即进入 Near 态。
    /// - 默认值: 24
    pub near_hours: i64,

    /// WeekOut 窗口起点 (天，开区间)
    /// - 默认值: 6
    pub week_out_start_days: i64,

    /// WeekOut 窗口终点 (天，开区间)
    /// - 默认值: 7
    pub week_out_end_days: i64,

    /// 集体讨论案件的截止日顺延天数
    ///
    /// - 说明: 讨论模式需要凑齐更多人，给额外的缓冲期。
    /// - 默认值: 7
    pub discussion_extension_days: i64,

    /// 内容审查的绝对存活上限 (天)
    ///
    /// - 说明: 超过即强制关闭，最近有无活动都不豁免。
    /// - 默认值: 7
    pub content_max_age_days: i64,

    /// 内容审查的闲置关闭年龄下限 (天)
    /// - 默认值: 3
    pub content_idle_age_days: i64,

    /// 内容审查的闲置判定阈值 (天，距最后更新)
    /// - 默认值: 2
    pub content_idle_update_days: i64,

    /// 低活跃长观察窗 (月)
    /// - 默认值: 3
    pub low_activity_long_months: u32,

    /// 低活跃短观察窗 (月)
    /// - 默认值: 1
    pub low_activity_short_months: u32,

    /// 低活跃重复标记冷却期 (天)
    ///
    /// - 说明: 同一成员在冷却期内不会被再次标记。
    /// - 默认值: 30
    pub low_activity_cooldown_days: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            near_hours: 24,
            week_out_start_days: 6,
            week_out_end_days: 7,
            discussion_extension_days: 7,
            content_max_age_days: 7,
            content_idle_age_days: 3,
            content_idle_update_days: 2,
            low_activity_long_months: 3,
            low_activity_short_months: 1,
            low_activity_cooldown_days: 30,
        }
    }
}

// ==========================================
// 3. 扫描计划配置 (ScheduleConfig)
// ==========================================

/// 各类扫描的触发计划
///
/// 每类扫描有自己独立的 cron 触发器，互不干扰；同类触发
/// 不会重叠 (单轮耗时远小于周期)。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// 截止日扫描 (争议/申请/重新认证)
    pub deadlines: String,

    /// 内容审查闲置关闭
    pub content_reviews: String,

    /// 低活跃标记
    pub low_activity: String,

    /// 任期有效性校验
    pub tenure: String,

    /// 计划求值所用时区 (IANA 名称)
    /// - 默认值: "UTC"
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            deadlines: "0 0 17 * * *".to_string(),
            content_reviews: "0 0 9 * * *".to_string(),
            low_activity: "0 22 22 * * *".to_string(),
            tenure: "0 40 4 4 * *".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

// ==========================================
// 4. 节流配置 (PacingConfig)
// ==========================================

/// 外呼节流
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PacingConfig {
    /// 相邻外呼 (通知投递/机构查询) 之间的固定间隔 (毫秒)
    ///
    /// - 说明: 尊重协作方限流，不是正确性要求。
    /// - 默认值: 500
    pub dispatch_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            dispatch_delay_ms: 500,
        }
    }
}

// ==========================================
// 5. 总配置入口 (CoordinatorConfig)
// ==========================================

/// 协调器总配置
///
/// 分层组织，支持 `serde`，可直接从 YAML/JSON 加载。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// 运行节点标识 (日志与排查用)
    #[serde(default = "default_runner_id")]
    pub runner_id: String,

    /// 按模式的评审参数表
    #[serde(default = "default_mode_table")]
    pub modes: HashMap<Mode, ModeConfig, RandomState>,

    /// 时间窗口策略
    #[serde(default)]
    pub window: WindowConfig,

    /// 扫描触发计划
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// 外呼节流
    #[serde(default)]
    pub pacing: PacingConfig,
}

fn default_mode_table() -> HashMap<Mode, ModeConfig, RandomState> {
    let mut table = HashMap::with_hasher(RandomState::new());
    for mode in Mode::ALL {
        table.insert(mode, ModeConfig::default_for(mode));
    }
    table
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            runner_id: default_runner_id(),
            modes: default_mode_table(),
            window: WindowConfig::default(),
            schedule: ScheduleConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// 查询某模式的评审参数
    ///
    /// 配置表缺项时回落到该模式的出厂默认，保证查询总有结果。
    pub fn mode(&self, mode: Mode) -> ModeConfig {
        self.modes
            .get(&mode)
            .copied()
            .unwrap_or_else(|| ModeConfig::default_for(mode))
    }

    /// 启动前校验
    ///
    /// 主要检查各扫描计划的 cron 表达式，防止提交了配置
    /// 却有某类扫描永远无法触发。
    pub fn validate(&self) -> Result<()> {
        TimeUtils::validate_schedule(&self.schedule.deadlines)?;
        TimeUtils::validate_schedule(&self.schedule.content_reviews)?;
        TimeUtils::validate_schedule(&self.schedule.low_activity)?;
        TimeUtils::validate_schedule(&self.schedule.tenure)?;

        for (mode, cfg) in &self.modes {
            if cfg.evaluations_required == 0 {
                return Err(crate::common::error::CoordinatorError::Config(format!(
                    "evaluations_required for mode '{}' must be positive",
                    mode
                )));
            }
        }

        Ok(())
    }
}
