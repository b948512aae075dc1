use async_trait::async_trait;

use super::MemoryBackend;
use crate::common::error::{CoordinatorError, Result};
use crate::common::model::DisputeStatus;
use crate::persistence::model::{CaseFilter, CasePatch, CaseRecord};
use crate::persistence::traits::CaseStore;

#[async_trait]
impl CaseStore for MemoryBackend {
    async fn find(&self, filter: CaseFilter) -> Result<Vec<CaseRecord>> {
        let matches = |record: &CaseRecord| match (filter, record) {
            (CaseFilter::ActiveRecerts, CaseRecord::Recert(c)) => c.active,
            (CaseFilter::ActiveApplications, CaseRecord::Application(c)) => c.active,
            (CaseFilter::ActiveDisputes, CaseRecord::Dispute(c)) => {
                c.status == DisputeStatus::InMediation
            }
            (CaseFilter::ActiveContentReviews, CaseRecord::ContentReview(c)) => c.active,
            _ => false,
        };

        let mut found: Vec<CaseRecord> = self
            .cases
            .iter()
            .filter(|entry| matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        // DashMap 遍历无序; 按 ID 排序保证结果可复现
        found.sort_by(|a, b| a.id().cmp(b.id()));

        Ok(found)
    }

    async fn update(&self, id: &str, patch: CasePatch) -> Result<CaseRecord> {
        let mut entry = self
            .cases
            .get_mut(id)
            .ok_or_else(|| CoordinatorError::CaseNotFound(id.to_string()))?;

        apply_patch(entry.value_mut(), patch)?;

        Ok(entry.value().clone())
    }

    async fn create(&self, record: CaseRecord) -> Result<CaseRecord> {
        self.cases.insert(record.id().to_string(), record.clone());
        Ok(record)
    }
}

/// 补丁应用
///
/// 补丁与案件类型不匹配属于调用方 Bug，按持久化错误上报
/// 而不是悄悄忽略。
fn apply_patch(record: &mut CaseRecord, patch: CasePatch) -> Result<()> {
    match (record, patch) {
        (CaseRecord::Recert(c), CasePatch::AssignSeniors { assignees, log }) => {
            c.senior_assignees = assignees;
            c.assignment_log.extend(log);
        }
        (CaseRecord::Recert(c), CasePatch::AssignTrials { assignees }) => {
            c.trial_assignees = assignees;
        }
        (CaseRecord::Recert(c), CasePatch::RecordAlert(kind)) => {
            c.last_alert = Some(kind);
        }
        (CaseRecord::Application(c), CasePatch::RecordAlert(kind)) => {
            c.last_alert = Some(kind);
        }
        (CaseRecord::Dispute(c), CasePatch::RecordAlert(kind)) => {
            c.last_alert = Some(kind);
        }
        (CaseRecord::ContentReview(c), CasePatch::Deactivate) => {
            c.active = false;
        }
        (record, patch) => {
            return Err(CoordinatorError::Persistence(format!(
                "patch {:?} does not apply to case {}",
                patch,
                record.id()
            )));
        }
    }

    Ok(())
}
