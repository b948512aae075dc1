// 1. 基础模块
pub mod common;

// 2. 领域核心
pub mod ledger;
pub mod pool;

// 3. 外部协作接口与实现
pub mod persistence;
pub mod policy;

// 4. 扫描调度核心
pub mod sweep;

pub use common::{CoordinatorConfig, CoordinatorError, Result};
pub use ledger::reconcile;
pub use pool::AssignmentPool;
pub use sweep::{DeadlineSweeper, SweepRunner};
