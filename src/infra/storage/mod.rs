// State store implementations.

pub mod in_memory;
pub mod sqlite_state_store;

pub use in_memory::InMemoryStateStore;
pub use sqlite_state_store::SqliteStateStore;
