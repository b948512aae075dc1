pub mod memory;
pub mod model;
pub mod traits;

pub use memory::{ChannelSink, LogSink, MemoryBackend, StaticActivity, StaticAuthority};
pub use model::{CaseFilter, CasePatch, CaseRecord, ExternalRoles};
pub use traits::{ActivitySource, CaseStore, MemberDirectory, MembershipAuthority, NotificationSink};
