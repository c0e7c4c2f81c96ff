mod lock_manager;
mod transaction;

pub use lock_manager::{LockManager, LockMode, RegistryLockManager};
pub use transaction::{IsolationLevel, Transaction};
