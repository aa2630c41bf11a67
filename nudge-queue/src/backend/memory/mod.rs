pub mod reaper;
pub mod storage;

pub use reaper::LeaseReaper;
pub use storage::MemoryBackend;
