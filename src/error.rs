use thiserror::Error;

/// Misuse of a [`RecursiveSharedLock`](crate::RecursiveSharedLock).
///
/// Every error is detected before the lock state is touched, so a failed call
/// leaves the lock exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("exclusive access released by an identity that does not own it")]
    NotExclusiveOwner,
    #[error("shared access released by an identity that holds none")]
    NotSharedHolder,
    #[error("exclusive access requested while holding only shared access")]
    UpgradeNotSupported,
    #[error("recursive acquisition limit of {limit} exceeded")]
    RecursionLimit { limit: u32 },
    #[error("lock torn down with {holders} holder(s) and {waiters} waiter(s)")]
    DestructionWhileContended { holders: usize, waiters: usize },
}

pub type Result<T, E = LockError> = core::result::Result<T, E>;
