// Storage port shared by every core service.
// Implementations live in infra/storage.

pub mod keyed_locks;
pub mod state_store;

pub use keyed_locks::KeyedLocks;
pub use state_store::*;
