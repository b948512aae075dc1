use std::sync::Arc;
use std::time::Duration;

// ==========================================
// 外呼节流策略 (Rate Policy)
// ==========================================

/// 节流策略接口 (The Interface)
///
/// 决定相邻两次外呼 (通知投递、机构查询) 之间要等多久。
/// 这是对协作方限流的显式建模，取代散落在扫描逻辑里的
/// 固定 sleep。限流是礼貌，不是正确性要求。
pub trait RatePolicy: Send + Sync + 'static {
    /// 下一次外呼前应等待的时长
    fn delay(&self) -> Duration;
}

/// 固定间隔策略
///
/// 无论系统忙闲，外呼之间保持恒定间隔。
#[derive(Debug, Clone)]
pub struct FixedPace {
    interval: Duration,
}

impl FixedPace {
    pub fn new(millis: u64) -> Self {
        Self {
            interval: Duration::from_millis(millis),
        }
    }
}

impl RatePolicy for FixedPace {
    fn delay(&self) -> Duration {
        self.interval
    }
}

/// 零等待策略 (测试/本地用)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPace;

impl RatePolicy for NoPace {
    fn delay(&self) -> Duration {
        Duration::ZERO
    }
}

// ==========================================
// 节流器 (Throttle)
// ==========================================

/// 节流器
///
/// 扫描侧在每次外呼之后调用 `pace()`，由策略决定实际停顿。
#[derive(Clone)]
pub struct Throttle {
    policy: Arc<dyn RatePolicy>,
}

impl Throttle {
    pub fn new<P: RatePolicy>(policy: P) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// 零等待节流器 (测试快捷方式)
    pub fn none() -> Self {
        Self::new(NoPace)
    }

    /// 按策略停顿一拍
    pub async fn pace(&self) {
        let delay = self.policy.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_pace_reports_its_interval() {
        assert_eq!(FixedPace::new(500).delay(), Duration::from_millis(500));
        assert_eq!(NoPace.delay(), Duration::ZERO);
    }
}
