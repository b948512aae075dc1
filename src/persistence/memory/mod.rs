mod collab;
mod core;
mod directory;
mod store;

pub use collab::{ChannelSink, LogSink, StaticActivity, StaticAuthority};
pub use core::MemoryBackend;
