//! A reader-writer lock that the holding thread may re-enter.
//!
//! [`RecursiveSharedLock`] hands out exclusive ("write") and shared ("read")
//! access. A thread may nest exclusive holds, nest shared holds, and take
//! shared access while it holds exclusive access, all without deadlocking
//! itself. Holds are tracked per [`ThreadIdentity`] inside the lock.
//!
//! ```
//! use acceleratus_sync::RecursiveSharedLock;
//!
//! let lock = RecursiveSharedLock::new();
//!
//! lock.acquire_exclusive()?;
//! lock.acquire_exclusive()?;
//! lock.acquire_shared()?;
//! assert_eq!(lock.exclusive_depth(), 2);
//!
//! lock.release_shared()?;
//! lock.release_exclusive()?;
//! lock.release_exclusive()?;
//! assert!(!lock.is_locked());
//! # Ok::<(), acceleratus_sync::LockError>(())
//! ```

mod config;
mod error;
mod guard;
mod identity;
mod lock;
mod marker;
mod state;
mod wait;

pub use config::{DEFAULT_MAX_RECURSION, LockConfig, Preference};
pub use error::{LockError, Result};
pub use guard::{ExclusiveGuard, SharedGuard};
pub use identity::ThreadIdentity;
pub use lock::{IdentifiedLock, RecursiveSharedLock};
pub use marker::NotSend;
pub use state::LockSnapshot;
pub use wait::{CondvarWait, Wait, YieldWait};
