use std::sync::atomic::{AtomicBool, Ordering};

use crate::common::TxnId;

/// Transaction isolation levels understood by the executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// A client transaction. The executors only consult the isolation level and
/// the aborted flag; scheduling lives in the lock manager.
pub struct Transaction {
    id: TxnId,
    isolation_level: IsolationLevel,
    aborted: AtomicBool,
}

impl Transaction {
    pub fn new(id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            aborted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn set_aborted(&self) {
        self.aborted.store(true, Ordering::Release);
    }
}
