//! 公平指派袋 (Assignment Pool)
//!
//! 在有限、共享、可变的评审员集合上做抽取最小化重复的随机指派:
//! 一个"纪元"内 (整袋耗尽到整袋补充之间)，任何合格成员都不会
//! 被抽中两次；选择压力先均匀摊满整个群体，然后才允许重复。
//!
//! 袋状态就是成员档案上的 `in_pool` 标记，由 `MemberDirectory`
//! 托管；补袋阶段的往返翻转依赖目录的单成员原子读-改-写。

use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::common::error::Result;
use crate::common::model::{Member, MemberId, Mode};
use crate::persistence::traits::MemberDirectory;

/// 公平指派袋
#[derive(Clone)]
pub struct AssignmentPool {
    directory: Arc<dyn MemberDirectory>,
}

impl AssignmentPool {
    pub fn new(directory: Arc<dyn MemberDirectory>) -> Self {
        Self { directory }
    }

    /// 抽取资深评审员
    ///
    /// 1. 从袋内合格成员中随机抽 `count` 名，抽中即出袋。
    /// 2. 不足时对袋外合格成员做一次全量乱序 (整袋重洗)，
    ///    逐个遍历: 仍缺人则原子地补袋并立即抽走 (`redraw`)，
    ///    已够人则只补袋——整袋因此增量回满。
    ///
    /// 合格群体小于 `count` 时返回不足额的结果，这是降级而非
    /// 错误，是否带着不完整的评审组继续由调用方决定。
    /// 返回的每个成员最终都处于出袋状态。
    pub async fn assign(
        &self,
        mode: Mode,
        exclude: &[MemberId],
        count: usize,
    ) -> Result<Vec<Member>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        // 1. 袋内抽取
        let in_pool = self.directory.eligible_seniors(mode, true, exclude).await?;
        let mut picked = sample(in_pool, count);

        for member in &picked {
            self.directory.mark_drawn(&member.id).await?;
        }

        // 2. 袋已见底: 重洗袋外集合，边补袋边抽齐
        if picked.len() < count {
            // 第一轮刚抽走的人此刻也在袋外，必须一并排除
            let mut reserve_exclude: Vec<MemberId> = exclude.to_vec();
            reserve_exclude.extend(picked.iter().map(|m| m.id.clone()));

            let exhausted = self
                .directory
                .eligible_seniors(mode, false, &reserve_exclude)
                .await?;
            let reshuffled_len = exhausted.len();
            let reshuffled = sample(exhausted, reshuffled_len);

            for member in reshuffled {
                if picked.len() < count {
                    if self.directory.redraw(&member.id).await? {
                        picked.push(member);
                    }
                } else {
                    self.directory.replenish(&member.id).await?;
                }
            }
        }

        // 返回的快照与存储状态保持一致
        for member in &mut picked {
            member.in_pool = false;
        }

        Ok(picked)
    }

    /// 抽取初级/试用评审员
    ///
    /// 试用层不带袋语义，纯随机抽样；同样允许不足额。
    pub async fn sample_trial(
        &self,
        mode: Mode,
        exclude: &[MemberId],
        count: usize,
    ) -> Result<Vec<Member>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.directory.eligible_trials(mode, exclude).await?;
        Ok(sample(candidates, count))
    }
}

/// 随机抽样: 乱序后截断
fn sample(mut candidates: Vec<Member>, amount: usize) -> Vec<Member> {
    let mut rng = rand::rng();
    candidates.shuffle(&mut rng);
    candidates.truncate(amount);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::model::{MembershipLevel, ModeStatus, RoleGroup};
    use crate::persistence::memory::MemoryBackend;
    use std::collections::HashSet;

    fn senior(name: &str, mode: Mode) -> Member {
        let mut m = Member::new(1, name);
        m.id = name.to_string();
        m.groups = vec![RoleGroup::Senior];
        m.modes = vec![ModeStatus {
            mode,
            level: MembershipLevel::Full,
        }];
        m
    }

    fn trial(name: &str, mode: Mode) -> Member {
        let mut m = Member::new(1, name);
        m.id = name.to_string();
        m.groups = vec![RoleGroup::Reviewer];
        m.is_trial_reviewer = true;
        m.modes = vec![ModeStatus {
            mode,
            level: MembershipLevel::Probation,
        }];
        m
    }

    fn pool_with(backend: &MemoryBackend) -> AssignmentPool {
        AssignmentPool::new(Arc::new(backend.clone()))
    }

    #[tokio::test]
    async fn draws_distinct_members_and_leaves_rest_in_pool() {
        let backend = MemoryBackend::new();
        for name in ["a", "b", "c", "d", "e"] {
            backend.seed_member(senior(name, Mode::Taiko));
        }

        let picked = pool_with(&backend)
            .assign(Mode::Taiko, &[], 3)
            .await
            .unwrap();

        let ids: HashSet<_> = picked.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(picked.iter().all(|m| !m.in_pool));

        // 袋里恰好剩 2 人
        let remaining = backend
            .eligible_seniors(Mode::Taiko, true, &[])
            .await
            .unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn no_repeats_until_the_pool_is_exhausted() {
        let backend = MemoryBackend::new();
        let population = ["a", "b", "c", "d", "e", "f", "g"];
        for name in population {
            backend.seed_member(senior(name, Mode::Osu));
        }
        let pool = pool_with(&backend);

        // 公平律: P 次单抽先取遍 P 个不同成员
        let mut seen = HashSet::new();
        for _ in 0..population.len() {
            let picked = pool.assign(Mode::Osu, &[], 1).await.unwrap();
            assert_eq!(picked.len(), 1);
            assert!(seen.insert(picked[0].id.clone()), "repeat before exhaustion");
        }
        assert_eq!(seen.len(), population.len());

        // 第 P+1 次抽取触发整袋重洗，仍能抽到人
        let next = pool.assign(Mode::Osu, &[], 1).await.unwrap();
        assert_eq!(next.len(), 1);

        // 重洗把其余 P-1 人补回袋内
        let replenished = backend
            .eligible_seniors(Mode::Osu, true, &[])
            .await
            .unwrap();
        assert_eq!(replenished.len(), population.len() - 1);
    }

    #[tokio::test]
    async fn exclusion_and_shortfall_are_respected() {
        let backend = MemoryBackend::new();
        for name in ["a", "b", "c"] {
            backend.seed_member(senior(name, Mode::Catch));
        }
        let pool = pool_with(&backend);

        let picked = pool
            .assign(Mode::Catch, &["a".to_string()], 5)
            .await
            .unwrap();

        // 合格群体只有 2 人: 降级返回，不报错
        let ids: HashSet<_> = picked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(picked.len(), 2);
        assert!(!ids.contains("a"));
    }

    #[tokio::test]
    async fn refill_drains_through_the_whole_population_again() {
        let backend = MemoryBackend::new();
        for name in ["a", "b", "c"] {
            backend.seed_member(senior(name, Mode::Mania));
        }
        let pool = pool_with(&backend);

        // 连抽两袋: 6 次单抽中每个成员恰好出现两次
        let mut counts = std::collections::HashMap::new();
        for _ in 0..6 {
            let picked = pool.assign(Mode::Mania, &[], 1).await.unwrap();
            *counts.entry(picked[0].id.clone()).or_insert(0u32) += 1;
        }
        assert!(counts.values().all(|&c| c == 2), "uneven spread: {counts:?}");
    }

    #[tokio::test]
    async fn trial_sampling_ignores_the_pool_flag() {
        let backend = MemoryBackend::new();
        let mut t = trial("t1", Mode::Osu);
        t.in_pool = false;
        backend.seed_member(t);
        backend.seed_member(trial("t2", Mode::Osu));
        backend.seed_member(senior("s1", Mode::Osu));

        let picked = pool_with(&backend)
            .sample_trial(Mode::Osu, &["t2".to_string()], 2)
            .await
            .unwrap();

        // 只剩 t1 合格; 出袋状态不影响试用层抽样
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "t1");
    }
}
