use crate::{LockConfig, LockError, Preference, Result, ThreadIdentity};
use std::collections::{HashMap, hash_map::Entry};

/// Who has to be woken up after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Nobody,
    /// The lock is completely free and a writer is waiting. Only one of them
    /// can get in, so only one is woken up.
    OneWriter,
    /// Every blocked reader may be able to proceed now.
    AllReaders,
}

/// How a shared request treats writers that are already waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SharedEntry {
    /// A caller that is prepared to block. Subject to the writer preference.
    Blocking,
    /// A single non-blocking attempt. Only an exclusive holder stops it.
    Attempt,
}

/// Point-in-time view of a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSnapshot {
    pub exclusive_owner: Option<ThreadIdentity>,
    pub exclusive_depth: u32,
    /// Number of distinct identities holding shared access.
    pub shared_holders: usize,
    /// Sum of the recursive shared counts of all identities.
    pub shared_count: usize,
    /// The exclusive owner also appears among the shared holders.
    pub owner_holds_shared: bool,
    pub waiting_exclusive: usize,
    pub waiting_shared: usize,
}

impl LockSnapshot {
    /// Whether anybody holds or waits for the lock.
    pub fn is_contended(&self) -> bool {
        self.holders() + self.waiters() != 0
    }

    /// Number of distinct identities holding the lock in either mode.
    pub fn holders(&self) -> usize {
        let owner_only = self.exclusive_owner.is_some() && !self.owner_holds_shared;
        self.shared_holders + usize::from(owner_only)
    }

    pub fn waiters(&self) -> usize {
        self.waiting_exclusive + self.waiting_shared
    }
}

/// The record guarded by the lock's internal mutex.
///
/// Every method is a complete transition: usage errors are detected before
/// anything is written.
#[derive(Debug)]
pub(crate) struct LockState {
    config: LockConfig,
    exclusive_owner: Option<ThreadIdentity>,
    exclusive_depth: u32,
    shared_holders: HashMap<ThreadIdentity, u32>,
    waiting_exclusive: usize,
    waiting_shared: usize,
}

impl LockState {
    pub fn new(config: LockConfig) -> Self {
        Self {
            config,
            exclusive_owner: None,
            exclusive_depth: 0,
            shared_holders: HashMap::new(),
            waiting_exclusive: 0,
            waiting_shared: 0,
        }
    }

    pub fn config(&self) -> LockConfig {
        self.config
    }

    fn is_owner(&self, id: ThreadIdentity) -> bool {
        self.exclusive_owner == Some(id)
    }

    pub fn exclusive_depth_of(&self, id: ThreadIdentity) -> u32 {
        if self.is_owner(id) {
            self.exclusive_depth
        } else {
            0
        }
    }

    pub fn shared_count_of(&self, id: ThreadIdentity) -> u32 {
        self.shared_holders.get(&id).copied().unwrap_or(0)
    }

    fn recursion_limit(&self) -> LockError {
        LockError::RecursionLimit {
            limit: self.config.max_recursion,
        }
    }

    fn check_exclusive(&self, id: ThreadIdentity) -> Result<()> {
        if self.is_owner(id) {
            if self.exclusive_depth >= self.config.max_recursion {
                return Err(self.recursion_limit());
            }
        } else if self.shared_holders.contains_key(&id) {
            return Err(LockError::UpgradeNotSupported);
        }

        Ok(())
    }

    fn check_shared(&self, id: ThreadIdentity) -> Result<()> {
        if self.shared_count_of(id) >= self.config.max_recursion {
            Err(self.recursion_limit())
        } else {
            Ok(())
        }
    }

    fn can_acquire_exclusive(&self, id: ThreadIdentity) -> bool {
        match self.exclusive_owner {
            Some(owner) => owner == id,
            None => self.shared_holders.is_empty(),
        }
    }

    fn can_acquire_shared(&self, id: ThreadIdentity, entry: SharedEntry) -> bool {
        match self.exclusive_owner {
            Some(owner) => owner == id,
            None => match (entry, self.config.preference) {
                (SharedEntry::Attempt, _) | (_, Preference::Reader) => true,
                (SharedEntry::Blocking, Preference::Writer) => {
                    self.waiting_exclusive == 0 || self.shared_holders.contains_key(&id)
                }
            },
        }
    }

    /// # Returns
    /// `Ok(true)` if `id` now holds exclusive access one level deeper,
    /// `Ok(false)` if it has to wait.
    pub fn try_acquire_exclusive(&mut self, id: ThreadIdentity) -> Result<bool> {
        self.check_exclusive(id)?;

        if !self.can_acquire_exclusive(id) {
            return Ok(false);
        }

        self.exclusive_owner = Some(id);
        self.exclusive_depth += 1;
        Ok(true)
    }

    /// # Returns
    /// `Ok(true)` if `id` now holds shared access one level deeper,
    /// `Ok(false)` if it has to wait.
    pub fn try_acquire_shared(&mut self, id: ThreadIdentity, entry: SharedEntry) -> Result<bool> {
        self.check_shared(id)?;

        if !self.can_acquire_shared(id, entry) {
            return Ok(false);
        }

        *self.shared_holders.entry(id).or_insert(0) += 1;
        Ok(true)
    }

    pub fn release_exclusive(&mut self, id: ThreadIdentity) -> Result<Wake> {
        if !self.is_owner(id) {
            return Err(LockError::NotExclusiveOwner);
        }

        debug_assert!(self.exclusive_depth > 0, "owner recorded with zero depth");
        self.exclusive_depth -= 1;
        if self.exclusive_depth > 0 {
            return Ok(Wake::Nobody);
        }

        self.exclusive_owner = None;
        Ok(self.wake_after_release())
    }

    pub fn release_shared(&mut self, id: ThreadIdentity) -> Result<Wake> {
        let Entry::Occupied(mut entry) = self.shared_holders.entry(id) else {
            return Err(LockError::NotSharedHolder);
        };

        *entry.get_mut() -= 1;
        if *entry.get() == 0 {
            entry.remove();
        }

        if self.exclusive_owner.is_some() || !self.shared_holders.is_empty() {
            Ok(Wake::Nobody)
        } else {
            Ok(self.wake_after_release())
        }
    }

    /// Trade one level of exclusive access for one level of shared access
    /// in a single transition.
    pub fn downgrade(&mut self, id: ThreadIdentity) -> Result<Wake> {
        if !self.is_owner(id) {
            return Err(LockError::NotExclusiveOwner);
        }
        self.check_shared(id)?;

        *self.shared_holders.entry(id).or_insert(0) += 1;
        self.release_exclusive(id)
    }

    fn wake_after_release(&self) -> Wake {
        debug_assert!(self.exclusive_owner.is_none());

        if self.waiting_exclusive > 0 {
            if self.shared_holders.is_empty() {
                return Wake::OneWriter;
            }
            if self.config.preference == Preference::Writer {
                // The remaining holders are readers. Blocked readers keep
                // deferring to the writer.
                return Wake::Nobody;
            }
        }

        if self.waiting_shared > 0 {
            Wake::AllReaders
        } else {
            Wake::Nobody
        }
    }

    pub fn start_waiting_exclusive(&mut self) {
        self.waiting_exclusive += 1;
    }

    pub fn start_waiting_shared(&mut self) {
        self.waiting_shared += 1;
    }

    /// Called exactly once by each blocked writer, admitted or not.
    pub fn stop_waiting_exclusive(&mut self) -> Wake {
        debug_assert!(self.waiting_exclusive > 0);
        self.waiting_exclusive -= 1;

        // Readers might have been deferring to the writer that just gave up.
        if self.waiting_exclusive == 0
            && self.exclusive_owner.is_none()
            && self.waiting_shared > 0
            && self.config.preference == Preference::Writer
        {
            Wake::AllReaders
        } else {
            Wake::Nobody
        }
    }

    /// Called exactly once by each blocked reader, admitted or not.
    pub fn stop_waiting_shared(&mut self) {
        debug_assert!(self.waiting_shared > 0);
        self.waiting_shared -= 1;
    }

    pub fn snapshot(&self) -> LockSnapshot {
        LockSnapshot {
            exclusive_owner: self.exclusive_owner,
            exclusive_depth: self.exclusive_depth,
            shared_holders: self.shared_holders.len(),
            shared_count: self.shared_holders.values().map(|&count| count as usize).sum(),
            owner_holds_shared: self
                .exclusive_owner
                .is_some_and(|owner| self.shared_holders.contains_key(&owner)),
            waiting_exclusive: self.waiting_exclusive,
            waiting_shared: self.waiting_shared,
        }
    }
}
