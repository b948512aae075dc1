use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::common::error::Result;
use crate::common::time::TimeUtils;
use crate::sweep::scheduler::DeadlineSweeper;

/// 扫描任务种类
///
/// 每类扫描拥有独立的 cron 触发器；单轮耗时远小于周期，
/// 同类触发不会重叠。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepJob {
    Deadlines,
    ContentReviews,
    LowActivity,
    Tenure,
}

impl SweepJob {
    const ALL: [SweepJob; 4] = [
        SweepJob::Deadlines,
        SweepJob::ContentReviews,
        SweepJob::LowActivity,
        SweepJob::Tenure,
    ];

    fn label(&self) -> &'static str {
        match self {
            SweepJob::Deadlines => "deadlines",
            SweepJob::ContentReviews => "content-reviews",
            SweepJob::LowActivity => "low-activity",
            SweepJob::Tenure => "tenure",
        }
    }
}

/// 扫描运行器 (The Engine)
///
/// 为每类扫描各起一个协程循环: 算出下一次触发时间、睡到点、
/// 执行对应的扫描，全程受统一的停机信号控制。
pub struct SweepRunner {
    sweeper: Arc<DeadlineSweeper>,
    shutdown: CancellationToken,
}

impl SweepRunner {
    pub fn new(sweeper: Arc<DeadlineSweeper>, shutdown: CancellationToken) -> Self {
        Self { sweeper, shutdown }
    }

    /// 启动运行器 (阻塞直到停机)
    ///
    /// 通常在 `tokio::spawn` 中调用。启动前会整体校验一遍
    /// 扫描计划，任何一条 cron 非法都拒绝启动。
    pub async fn start(&self) -> Result<()> {
        let schedule = &self.sweeper.config().schedule;
        for job in SweepJob::ALL {
            TimeUtils::validate_schedule(Self::expr_of(job, schedule))?;
        }

        trace!(
            runner = %self.sweeper.config().runner_id,
            "sweep runner started"
        );

        let mut join_set = JoinSet::new();
        for job in SweepJob::ALL {
            let sweeper = self.sweeper.clone();
            let shutdown = self.shutdown.clone();
            join_set.spawn(async move {
                Self::run_job(sweeper, job, shutdown).await;
            });
        }
        while join_set.join_next().await.is_some() {}

        trace!("sweep runner shutdown complete");
        Ok(())
    }

    /// 触发优雅停机
    pub fn shutdown(&self) {
        trace!("sweep runner shutdown triggered");
        self.shutdown.cancel();
    }

    fn expr_of(job: SweepJob, schedule: &crate::common::config::ScheduleConfig) -> &str {
        match job {
            SweepJob::Deadlines => &schedule.deadlines,
            SweepJob::ContentReviews => &schedule.content_reviews,
            SweepJob::LowActivity => &schedule.low_activity,
            SweepJob::Tenure => &schedule.tenure,
        }
    }

    /// 单类扫描的触发循环
    async fn run_job(sweeper: Arc<DeadlineSweeper>, job: SweepJob, shutdown: CancellationToken) {
        let config = sweeper.config().clone();
        let expr = Self::expr_of(job, &config.schedule).to_string();
        let tz = config.schedule.timezone.clone();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let now = Utc::now();
            let Some(next) = TimeUtils::next_fire(&expr, &tz, now) else {
                // 表达式在启动时校验过; 没有下一次触发说明计划已走完
                error!(job = job.label(), expr = %expr, "schedule yields no next fire time");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let fired_at = Utc::now();
            debug!(job = job.label(), %fired_at, "sweep triggered");

            let result = match job {
                SweepJob::Deadlines => sweeper.sweep(fired_at).await,
                SweepJob::ContentReviews => sweeper.close_content_reviews(fired_at).await,
                SweepJob::LowActivity => sweeper.flag_low_activity(fired_at).await,
                SweepJob::Tenure => sweeper.check_tenure(fired_at).await,
            };

            if let Err(e) = result {
                // 单轮失败不影响后续触发
                error!(job = job.label(), error = %e, "sweep run failed");
            }
        }
    }
}
