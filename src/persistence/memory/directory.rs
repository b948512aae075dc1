use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryBackend;
use crate::common::error::{CoordinatorError, Result};
use crate::common::model::{Member, MemberId, Mode, RoleGroup};
use crate::persistence::traits::MemberDirectory;

#[async_trait]
impl MemberDirectory for MemoryBackend {
    async fn get(&self, id: &str) -> Result<Option<Member>> {
        Ok(self.members.get(id).map(|m| m.value().clone()))
    }

    async fn eligible_seniors(
        &self,
        mode: Mode,
        in_pool: bool,
        exclude: &[MemberId],
    ) -> Result<Vec<Member>> {
        let found = self
            .members
            .iter()
            .filter(|m| {
                m.holds(RoleGroup::Senior)
                    && m.is_reviewer_enabled
                    && m.has_mode(mode)
                    && m.in_pool == in_pool
                    && !exclude.contains(&m.id)
            })
            .map(|m| m.value().clone())
            .collect();

        Ok(found)
    }

    async fn eligible_trials(&self, mode: Mode, exclude: &[MemberId]) -> Result<Vec<Member>> {
        let found = self
            .members
            .iter()
            .filter(|m| {
                m.holds(RoleGroup::Reviewer)
                    && m.is_trial_reviewer
                    && m.is_reviewer_enabled
                    && m.has_mode(mode)
                    && !exclude.contains(&m.id)
            })
            .map(|m| m.value().clone())
            .collect();

        Ok(found)
    }

    async fn redraw(&self, id: &str) -> Result<bool> {
        // DashMap 的 get_mut 持有分片写锁，往返翻转在同一临界区内
        // 完成，对并发抽取表现为一次原子读-改-写。
        match self.members.get_mut(id) {
            Some(mut m) => {
                m.in_pool = true;
                m.in_pool = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replenish(&self, id: &str) -> Result<()> {
        match self.members.get_mut(id) {
            Some(mut m) => {
                m.in_pool = true;
                Ok(())
            }
            None => Err(CoordinatorError::MemberNotFound(id.to_string())),
        }
    }

    async fn mark_drawn(&self, id: &str) -> Result<()> {
        match self.members.get_mut(id) {
            Some(mut m) => {
                m.in_pool = false;
                Ok(())
            }
            None => Err(CoordinatorError::MemberNotFound(id.to_string())),
        }
    }

    async fn reviewers(&self) -> Result<Vec<Member>> {
        let mut found: Vec<Member> = self
            .members
            .iter()
            .filter(|m| m.holds(RoleGroup::Reviewer))
            .map(|m| m.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(found)
    }

    async fn with_history(&self) -> Result<Vec<Member>> {
        let mut found: Vec<Member> = self
            .members
            .iter()
            .filter(|m| !m.history.is_empty())
            .map(|m| m.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(found)
    }

    async fn mark_low_activity(&self, id: &str, when: DateTime<Utc>) -> Result<()> {
        match self.members.get_mut(id) {
            Some(mut m) => {
                m.last_flagged_low_activity = Some(when);
                Ok(())
            }
            None => Err(CoordinatorError::MemberNotFound(id.to_string())),
        }
    }
}
