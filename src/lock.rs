use crate::state::{LockState, SharedEntry, Wake};
use crate::{
    CondvarWait, ExclusiveGuard, LockConfig, LockError, LockSnapshot, Result, SharedGuard,
    ThreadIdentity, Wait,
};
use acceleratus_log::{println_fatal, println_trace, println_warn};
use core::fmt;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// A reader-writer lock that the same thread may re-enter in either mode.
///
/// - Exclusive access nests: `N` acquisitions need `N` releases.
/// - The exclusive owner may also take shared access at any time; releasing
///   that shared access never releases the exclusive hold.
/// - Shared access nests per identity.
/// - A thread holding only shared access can't acquire exclusive access.
///   The request fails with [`LockError::UpgradeNotSupported`].
///
/// Holds are recorded against a [`ThreadIdentity`]. The plain methods use the
/// calling thread's identity; [`identified`](Self::identified) binds the same
/// operations to an explicit one.
///
/// Which caller gets in after a release is decided by the configured
/// [`Preference`](crate::Preference). Blocked callers are suspended through
/// the [`Wait`] strategy `W`.
pub struct RecursiveSharedLock<W = CondvarWait>
where
    W: Wait,
{
    state: Mutex<LockState>,
    wait: W,
}

/// The operations of a [`RecursiveSharedLock`] performed on behalf of one
/// [`ThreadIdentity`].
pub struct IdentifiedLock<'a, W = CondvarWait>
where
    W: Wait,
{
    lock: &'a RecursiveSharedLock<W>,
    id: ThreadIdentity,
}

impl RecursiveSharedLock<CondvarWait> {
    pub fn new() -> Self {
        Self::with_config(LockConfig::default())
    }

    pub fn with_config(config: LockConfig) -> Self {
        Self::with_wait_strategy(config)
    }
}

impl<W> RecursiveSharedLock<W>
where
    W: Wait,
{
    pub fn with_wait_strategy(config: LockConfig) -> Self {
        Self {
            state: Mutex::new(LockState::new(config)),
            wait: W::new(),
        }
    }

    pub fn config(&self) -> LockConfig {
        self.state.lock().config()
    }

    pub fn identified(&self, id: ThreadIdentity) -> IdentifiedLock<'_, W> {
        IdentifiedLock { lock: self, id }
    }

    fn current(&self) -> IdentifiedLock<'_, W> {
        self.identified(ThreadIdentity::current())
    }

    fn notify(&self, wake: Wake) {
        match wake {
            Wake::Nobody => {}
            Wake::OneWriter => self.wait.write_notify(),
            Wake::AllReaders => self.wait.read_notify(),
        }
    }

    fn deadline_after(timeout: Duration) -> Option<Instant> {
        // Too far in the future to represent: wait forever.
        Instant::now().checked_add(timeout)
    }

    fn acquire_exclusive_until(
        &self,
        id: ThreadIdentity,
        deadline: Option<Instant>,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        if state.try_acquire_exclusive(id)? {
            println_trace!(
                "trace_lock",
                "{id:?}: exclusive, depth {}",
                state.exclusive_depth_of(id)
            );
            return Ok(true);
        }

        state.start_waiting_exclusive();
        println_trace!("trace_lock", "{id:?}: waiting for exclusive");

        loop {
            let timed_out = self.wait.write_wait(&mut state, deadline);

            match state.try_acquire_exclusive(id) {
                Ok(false) if !timed_out => continue,
                result => {
                    let wake = state.stop_waiting_exclusive();
                    drop(state);

                    self.notify(wake);
                    println_trace!("trace_lock", "{id:?}: done waiting for exclusive: {result:?}");
                    return result;
                }
            }
        }
    }

    fn acquire_shared_until(
        &self,
        id: ThreadIdentity,
        deadline: Option<Instant>,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        if state.try_acquire_shared(id, SharedEntry::Blocking)? {
            println_trace!("trace_lock", "{id:?}: shared, count {}", state.shared_count_of(id));
            return Ok(true);
        }

        state.start_waiting_shared();
        println_trace!("trace_lock", "{id:?}: waiting for shared");

        loop {
            let timed_out = self.wait.read_wait(&mut state, deadline);

            match state.try_acquire_shared(id, SharedEntry::Blocking) {
                Ok(false) if !timed_out => continue,
                result => {
                    state.stop_waiting_shared();
                    println_trace!("trace_lock", "{id:?}: done waiting for shared: {result:?}");
                    return result;
                }
            }
        }
    }

    fn try_acquire_exclusive_once(&self, id: ThreadIdentity) -> Result<bool> {
        self.state.lock().try_acquire_exclusive(id)
    }

    fn try_acquire_shared_once(&self, id: ThreadIdentity) -> Result<bool> {
        self.state.lock().try_acquire_shared(id, SharedEntry::Attempt)
    }

    pub(crate) fn release_exclusive_of(&self, id: ThreadIdentity) -> Result<()> {
        let wake = self.state.lock().release_exclusive(id)?;
        println_trace!("trace_lock", "{id:?}: released exclusive, waking {wake:?}");

        self.notify(wake);
        Ok(())
    }

    pub(crate) fn release_shared_of(&self, id: ThreadIdentity) -> Result<()> {
        let wake = self.state.lock().release_shared(id)?;
        println_trace!("trace_lock", "{id:?}: released shared, waking {wake:?}");

        self.notify(wake);
        Ok(())
    }

    pub(crate) fn downgrade_of(&self, id: ThreadIdentity) -> Result<()> {
        let wake = self.state.lock().downgrade(id)?;
        println_trace!("trace_lock", "{id:?}: downgraded, waking {wake:?}");

        self.notify(wake);
        Ok(())
    }

    /// Block until the calling thread holds exclusive access.
    pub fn acquire_exclusive(&self) -> Result<()> {
        self.current().acquire_exclusive()
    }

    /// Take exclusive access if that is possible without blocking.
    pub fn try_acquire_exclusive(&self) -> Result<bool> {
        self.current().try_acquire_exclusive()
    }

    pub fn try_acquire_exclusive_for(&self, timeout: Duration) -> Result<bool> {
        self.current().try_acquire_exclusive_for(timeout)
    }

    pub fn try_acquire_exclusive_until(&self, deadline: Instant) -> Result<bool> {
        self.current().try_acquire_exclusive_until(deadline)
    }

    pub fn release_exclusive(&self) -> Result<()> {
        self.current().release_exclusive()
    }

    /// Block until the calling thread holds shared access.
    pub fn acquire_shared(&self) -> Result<()> {
        self.current().acquire_shared()
    }

    /// Take shared access unless another thread holds exclusive access.
    ///
    /// Unlike [`acquire_shared`](Self::acquire_shared), this doesn't step
    /// back for writers that are waiting.
    pub fn try_acquire_shared(&self) -> Result<bool> {
        self.current().try_acquire_shared()
    }

    pub fn try_acquire_shared_for(&self, timeout: Duration) -> Result<bool> {
        self.current().try_acquire_shared_for(timeout)
    }

    pub fn try_acquire_shared_until(&self, deadline: Instant) -> Result<bool> {
        self.current().try_acquire_shared_until(deadline)
    }

    pub fn release_shared(&self) -> Result<()> {
        self.current().release_shared()
    }

    pub fn exclusive(&self) -> Result<ExclusiveGuard<'_, W>> {
        self.current().exclusive()
    }

    pub fn try_exclusive(&self) -> Result<Option<ExclusiveGuard<'_, W>>> {
        self.current().try_exclusive()
    }

    pub fn shared(&self) -> Result<SharedGuard<'_, W>> {
        self.current().shared()
    }

    pub fn try_shared(&self) -> Result<Option<SharedGuard<'_, W>>> {
        self.current().try_shared()
    }

    /// Exclusive depth held by the calling thread.
    pub fn exclusive_depth(&self) -> u32 {
        self.current().exclusive_depth()
    }

    /// Shared count held by the calling thread.
    pub fn shared_count(&self) -> u32 {
        self.current().shared_count()
    }

    pub fn is_locked_exclusive(&self) -> bool {
        self.snapshot().exclusive_owner.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.snapshot().holders() != 0
    }

    pub fn snapshot(&self) -> LockSnapshot {
        self.state.lock().snapshot()
    }

    /// Tear the lock down, checking that nobody holds or waits for it.
    ///
    /// On error the leftover holds are discarded.
    pub fn destroy(mut self) -> Result<()> {
        let state = self.state.get_mut();
        let snapshot = state.snapshot();
        if !snapshot.is_contended() {
            return Ok(());
        }

        let config = state.config();
        *state = LockState::new(config);

        let error = LockError::DestructionWhileContended {
            holders: snapshot.holders(),
            waiters: snapshot.waiters(),
        };
        println_warn!("{error}: {snapshot:?}");
        Err(error)
    }
}

impl<'a, W> IdentifiedLock<'a, W>
where
    W: Wait,
{
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            println_warn!("{:?}: {error}", self.id);
        }
        result
    }

    pub fn identity(&self) -> ThreadIdentity {
        self.id
    }

    pub fn lock(&self) -> &'a RecursiveSharedLock<W> {
        self.lock
    }

    pub fn acquire_exclusive(&self) -> Result<()> {
        let acquired = self.report(self.lock.acquire_exclusive_until(self.id, None))?;
        debug_assert!(acquired, "untimed wait gave up");
        Ok(())
    }

    pub fn try_acquire_exclusive(&self) -> Result<bool> {
        self.report(self.lock.try_acquire_exclusive_once(self.id))
    }

    pub fn try_acquire_exclusive_for(&self, timeout: Duration) -> Result<bool> {
        let deadline = RecursiveSharedLock::<W>::deadline_after(timeout);
        self.report(self.lock.acquire_exclusive_until(self.id, deadline))
    }

    pub fn try_acquire_exclusive_until(&self, deadline: Instant) -> Result<bool> {
        self.report(self.lock.acquire_exclusive_until(self.id, Some(deadline)))
    }

    pub fn release_exclusive(&self) -> Result<()> {
        self.report(self.lock.release_exclusive_of(self.id))
    }

    pub fn acquire_shared(&self) -> Result<()> {
        let acquired = self.report(self.lock.acquire_shared_until(self.id, None))?;
        debug_assert!(acquired, "untimed wait gave up");
        Ok(())
    }

    pub fn try_acquire_shared(&self) -> Result<bool> {
        self.report(self.lock.try_acquire_shared_once(self.id))
    }

    pub fn try_acquire_shared_for(&self, timeout: Duration) -> Result<bool> {
        let deadline = RecursiveSharedLock::<W>::deadline_after(timeout);
        self.report(self.lock.acquire_shared_until(self.id, deadline))
    }

    pub fn try_acquire_shared_until(&self, deadline: Instant) -> Result<bool> {
        self.report(self.lock.acquire_shared_until(self.id, Some(deadline)))
    }

    pub fn release_shared(&self) -> Result<()> {
        self.report(self.lock.release_shared_of(self.id))
    }

    pub fn exclusive(&self) -> Result<ExclusiveGuard<'a, W>> {
        self.acquire_exclusive()?;
        Ok(ExclusiveGuard::new(self.lock, self.id))
    }

    pub fn try_exclusive(&self) -> Result<Option<ExclusiveGuard<'a, W>>> {
        Ok(self
            .try_acquire_exclusive()?
            .then(|| ExclusiveGuard::new(self.lock, self.id)))
    }

    pub fn shared(&self) -> Result<SharedGuard<'a, W>> {
        self.acquire_shared()?;
        Ok(SharedGuard::new(self.lock, self.id))
    }

    pub fn try_shared(&self) -> Result<Option<SharedGuard<'a, W>>> {
        Ok(self
            .try_acquire_shared()?
            .then(|| SharedGuard::new(self.lock, self.id)))
    }

    pub fn exclusive_depth(&self) -> u32 {
        self.lock.state.lock().exclusive_depth_of(self.id)
    }

    pub fn shared_count(&self) -> u32 {
        self.lock.state.lock().shared_count_of(self.id)
    }
}

impl<W> Clone for IdentifiedLock<'_, W>
where
    W: Wait,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<W> Copy for IdentifiedLock<'_, W> where W: Wait {}

impl<W> fmt::Debug for IdentifiedLock<'_, W>
where
    W: Wait,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifiedLock")
            .field("identity", &self.id)
            .field("lock", self.lock)
            .finish()
    }
}

impl Default for RecursiveSharedLock<CondvarWait> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> fmt::Debug for RecursiveSharedLock<W>
where
    W: Wait,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("RecursiveSharedLock");
        match self.state.try_lock() {
            Some(state) => debug.field("state", &state.snapshot()),
            None => debug.field("state", &format_args!("<busy>")),
        };
        debug.finish()
    }
}

impl<W> Drop for RecursiveSharedLock<W>
where
    W: Wait,
{
    fn drop(&mut self) {
        let snapshot = self.state.get_mut().snapshot();
        if snapshot.is_contended() {
            println_fatal!("RecursiveSharedLock dropped while in use: {snapshot:?}");
        }
    }
}
