use dashmap::DashMap;
use std::sync::Arc;

use crate::common::model::{Member, MemberId};
use crate::persistence::model::CaseRecord;

/// 内存后端 (In-Memory Backend)
///
/// 同时实现了 CaseStore 和 MemberDirectory。
/// 作为参考实现与测试夹具使用；生产部署通常换成真正的
/// 数据库适配器，接口语义保持一致。
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// 【案件仓库】ID -> CaseRecord
    /// - DashMap: 分片锁，单成员/单案件操作天然是原子的
    pub(super) cases: Arc<DashMap<String, CaseRecord>>,

    /// 【成员仓库】ID -> Member
    pub(super) members: Arc<DashMap<MemberId, Member>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置成员 (测试/引导用)
    pub fn seed_member(&self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }

    /// 预置案件 (测试/引导用)
    pub fn seed_case(&self, record: CaseRecord) {
        self.cases.insert(record.id().to_string(), record);
    }

    /// 读取成员快照
    pub fn member_snapshot(&self, id: &str) -> Option<Member> {
        self.members.get(id).map(|m| m.value().clone())
    }

    /// 读取案件快照
    pub fn case_snapshot(&self, id: &str) -> Option<CaseRecord> {
        self.cases.get(id).map(|c| c.value().clone())
    }
}

// Clone 实现：内部都是 Arc，Clone 是廉价的
impl Clone for MemoryBackend {
    fn clone(&self) -> Self {
        Self {
            cases: self.cases.clone(),
            members: self.members.clone(),
        }
    }
}
