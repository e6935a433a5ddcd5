use crate::marker::NotSend;
use crate::{CondvarWait, LockError, RecursiveSharedLock, ThreadIdentity, Wait};
use acceleratus_log::println_warn;
use core::{fmt, mem::ManuallyDrop};

/// One level of exclusive access, released on drop.
///
/// Guards don't hand out the protected data: nested exclusive guards of the
/// same thread would alias. They only scope the hold.
#[must_use = "The lock is released as soon as the guard is dropped."]
pub struct ExclusiveGuard<'a, W = CondvarWait>
where
    W: Wait,
{
    lock: &'a RecursiveSharedLock<W>,
    id: ThreadIdentity,
    _not_send: NotSend,
}

/// One level of shared access, released on drop.
#[must_use = "The lock is released as soon as the guard is dropped."]
pub struct SharedGuard<'a, W = CondvarWait>
where
    W: Wait,
{
    lock: &'a RecursiveSharedLock<W>,
    id: ThreadIdentity,
    _not_send: NotSend,
}

impl<'a, W> ExclusiveGuard<'a, W>
where
    W: Wait,
{
    /// The caller MUST have just acquired one level of exclusive access for `id`.
    pub(crate) fn new(lock: &'a RecursiveSharedLock<W>, id: ThreadIdentity) -> Self {
        Self {
            lock,
            id,
            _not_send: NotSend::default(),
        }
    }

    pub fn identity(&self) -> ThreadIdentity {
        self.id
    }

    pub fn lock(&self) -> &'a RecursiveSharedLock<W> {
        self.lock
    }

    /// Trade this level of exclusive access for one level of shared access.
    ///
    /// No other writer can get in between. Other readers get in only if this
    /// was the outermost exclusive hold of the thread.
    ///
    /// # Errors
    /// If the shared count of the thread is at its limit the guard is handed
    /// back untouched.
    pub fn downgrade(self) -> Result<SharedGuard<'a, W>, (Self, LockError)> {
        match self.lock.downgrade_of(self.id) {
            Ok(()) => {
                let me = ManuallyDrop::new(self);
                Ok(SharedGuard::new(me.lock, me.id))
            }
            Err(error) => Err((self, error)),
        }
    }
}

impl<'a, W> SharedGuard<'a, W>
where
    W: Wait,
{
    /// The caller MUST have just acquired one level of shared access for `id`.
    pub(crate) fn new(lock: &'a RecursiveSharedLock<W>, id: ThreadIdentity) -> Self {
        Self {
            lock,
            id,
            _not_send: NotSend::default(),
        }
    }

    pub fn identity(&self) -> ThreadIdentity {
        self.id
    }

    pub fn lock(&self) -> &'a RecursiveSharedLock<W> {
        self.lock
    }
}

impl<W> Drop for ExclusiveGuard<'_, W>
where
    W: Wait,
{
    fn drop(&mut self) {
        // Fails only if the hold was already given back by hand.
        if let Err(error) = self.lock.release_exclusive_of(self.id) {
            println_warn!("ExclusiveGuard of {:?} dropped: {error}", self.id);
        }
    }
}

impl<W> Drop for SharedGuard<'_, W>
where
    W: Wait,
{
    fn drop(&mut self) {
        if let Err(error) = self.lock.release_shared_of(self.id) {
            println_warn!("SharedGuard of {:?} dropped: {error}", self.id);
        }
    }
}

impl<W> fmt::Debug for ExclusiveGuard<'_, W>
where
    W: Wait,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveGuard")
            .field("identity", &self.id)
            .finish()
    }
}

impl<W> fmt::Debug for SharedGuard<'_, W>
where
    W: Wait,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedGuard")
            .field("identity", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LockConfig;

    #[test]
    fn guards_release_on_drop() {
        let lock = RecursiveSharedLock::new();
        {
            let _outer = lock.exclusive().unwrap();
            let _inner = lock.exclusive().unwrap();
            let _read = lock.shared().unwrap();
            assert_eq!(lock.exclusive_depth(), 2);
            assert_eq!(lock.shared_count(), 1);
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_guards() {
        let lock = RecursiveSharedLock::new();
        let other = lock.identified(ThreadIdentity::synthetic(9));

        let read = other.try_shared().unwrap().expect("lock is free");
        assert!(lock.try_exclusive().unwrap().is_none());
        assert!(lock.try_shared().unwrap().is_some());

        drop(read);
        assert!(lock.try_exclusive().unwrap().is_some());
        assert!(!lock.is_locked());
    }

    #[test]
    fn downgrade_keeps_writers_out() {
        let lock = RecursiveSharedLock::new();
        let other = lock.identified(ThreadIdentity::synthetic(9));

        let write = lock.exclusive().unwrap();
        let read = write.downgrade().unwrap();
        assert_eq!(lock.exclusive_depth(), 0);
        assert_eq!(lock.shared_count(), 1);
        assert_eq!(other.try_acquire_exclusive(), Ok(false));
        assert_eq!(other.try_acquire_shared(), Ok(true));
        other.release_shared().unwrap();

        drop(read);
        assert_eq!(other.try_acquire_exclusive(), Ok(true));
    }

    #[test]
    fn nested_downgrade_stays_exclusive() {
        let lock = RecursiveSharedLock::new();
        let other = lock.identified(ThreadIdentity::synthetic(9));

        let outer = lock.exclusive().unwrap();
        let inner = lock.exclusive().unwrap();
        let read = inner.downgrade().unwrap();
        assert_eq!(lock.exclusive_depth(), 1);
        assert_eq!(other.try_acquire_shared(), Ok(false));

        drop(outer);
        assert_eq!(other.try_acquire_shared(), Ok(true));
        drop(read);
        other.release_shared().unwrap();
        assert!(!lock.is_locked());
    }

    #[test]
    fn failed_downgrade_returns_guard() {
        let lock = RecursiveSharedLock::with_config(LockConfig::new().max_recursion(1));
        let write = lock.exclusive().unwrap();
        let _read = lock.shared().unwrap();

        let (write, error) = write.downgrade().unwrap_err();
        assert_eq!(error, LockError::RecursionLimit { limit: 1 });
        assert_eq!(lock.exclusive_depth(), 1);
        drop(write);
        assert_eq!(lock.exclusive_depth(), 0);
    }

    #[test]
    fn guard_outliving_manual_release_only_warns() {
        let lock = RecursiveSharedLock::new();
        let guard = lock.shared().unwrap();
        lock.release_shared().unwrap();
        drop(guard);
        assert!(!lock.is_locked());
    }
}
