use std::fmt;
use std::thread::{self, Thread, ThreadId};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    Thread(ThreadId),
    Synthetic(u64),
}

/// Token identifying a caller of a [`RecursiveSharedLock`](crate::RecursiveSharedLock).
///
/// Recursion is detected purely by comparing identities, so two callers
/// presenting the same identity are treated as one thread. Identities of
/// OS threads are unique for the lifetime of the process; synthetic
/// identities are whatever the embedder makes of them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadIdentity(Repr);

impl ThreadIdentity {
    /// Identity of the calling thread.
    pub fn current() -> Self {
        Self::of(&thread::current())
    }

    pub fn of(thread: &Thread) -> Self {
        Self(Repr::Thread(thread.id()))
    }

    /// An identity not tied to any OS thread. Never equal to a thread identity.
    pub const fn synthetic(token: u64) -> Self {
        Self(Repr::Synthetic(token))
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.0, Repr::Synthetic(_))
    }
}

impl From<ThreadId> for ThreadIdentity {
    fn from(id: ThreadId) -> Self {
        Self(Repr::Thread(id))
    }
}

impl fmt::Debug for ThreadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Thread(id) => write!(f, "{id:?}"),
            Repr::Synthetic(token) => write!(f, "Synthetic({token})"),
        }
    }
}
