use parking_lot::{Condvar, MutexGuard};
use std::thread;
use std::time::Instant;

/// How a blocked caller gets suspended until the state it waits for may
/// have changed.
///
/// Both wait functions are entered with the lock's internal state mutex held
/// and MUST return with it held again. They may return spuriously: callers
/// re-check their entry condition every time.
pub trait Wait {
    fn new() -> Self
    where
        Self: Sized;

    /// Wait for a `write_notify`.
    ///
    /// # Returns
    /// Whether `deadline` has passed.
    fn write_wait<T>(&self, state: &mut MutexGuard<'_, T>, deadline: Option<Instant>) -> bool
    where
        Self: Sized;

    /// Wait for a `read_notify`.
    ///
    /// # Returns
    /// Whether `deadline` has passed.
    fn read_wait<T>(&self, state: &mut MutexGuard<'_, T>, deadline: Option<Instant>) -> bool
    where
        Self: Sized;

    /// Wake up one blocked writer.
    fn write_notify(&self)
    where
        Self: Sized;

    /// Wake up every blocked reader.
    fn read_notify(&self)
    where
        Self: Sized;
}

/// Parks blocked callers on one condition variable per waiting class.
#[derive(Debug, Default)]
pub struct CondvarWait {
    writers: Condvar,
    readers: Condvar,
}

impl CondvarWait {
    fn wait_on<T>(
        condvar: &Condvar,
        state: &mut MutexGuard<'_, T>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            Some(deadline) => condvar.wait_until(state, deadline).timed_out(),
            None => {
                condvar.wait(state);
                false
            }
        }
    }
}

impl Wait for CondvarWait {
    fn new() -> Self {
        Self::default()
    }

    fn write_wait<T>(&self, state: &mut MutexGuard<'_, T>, deadline: Option<Instant>) -> bool {
        Self::wait_on(&self.writers, state, deadline)
    }

    fn read_wait<T>(&self, state: &mut MutexGuard<'_, T>, deadline: Option<Instant>) -> bool {
        Self::wait_on(&self.readers, state, deadline)
    }

    fn write_notify(&self) {
        self.writers.notify_one();
    }

    fn read_notify(&self) {
        self.readers.notify_all();
    }
}

/// Never parks: drops the state mutex, yields the processor and comes back
/// to re-check. Notifications are no-ops.
///
/// Suited to very short critical sections, or to environments where parking
/// is undesirable.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldWait;

impl YieldWait {
    fn yield_once<T>(state: &mut MutexGuard<'_, T>, deadline: Option<Instant>) -> bool {
        MutexGuard::unlocked(state, thread::yield_now);
        deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Wait for YieldWait {
    fn new() -> Self {
        Self
    }

    fn write_wait<T>(&self, state: &mut MutexGuard<'_, T>, deadline: Option<Instant>) -> bool {
        Self::yield_once(state, deadline)
    }

    fn read_wait<T>(&self, state: &mut MutexGuard<'_, T>, deadline: Option<Instant>) -> bool {
        Self::yield_once(state, deadline)
    }

    fn write_notify(&self) {}

    fn read_notify(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn wait_for_flag<W: Wait + Send + Sync + 'static>(notify: fn(&W)) {
        let shared = Arc::new((Mutex::new(false), W::new()));

        let waiter = {
            let shared = shared.clone();
            thread::spawn(move || {
                let (flag, wait) = &*shared;
                let mut flag = flag.lock();
                while !*flag {
                    wait.write_wait(&mut flag, None);
                }
            })
        };

        *shared.0.lock() = true;
        notify(&shared.1);
        waiter.join().unwrap();
    }

    #[test]
    fn condvar_wakes_waiter() {
        wait_for_flag::<CondvarWait>(CondvarWait::write_notify);
    }

    #[test]
    fn yield_observes_change() {
        wait_for_flag::<YieldWait>(YieldWait::write_notify);
    }

    #[test]
    fn deadline_expires() {
        let mutex = Mutex::new(());
        let deadline = Instant::now() + Duration::from_millis(10);

        let condvar = CondvarWait::new();
        let mut guard = mutex.lock();
        while !condvar.read_wait(&mut guard, Some(deadline)) {}
        assert!(Instant::now() >= deadline);

        let yielding = YieldWait::new();
        assert!(yielding.read_wait(&mut guard, Some(Instant::now())));
        assert!(!yielding.read_wait(&mut guard, None));
    }
}
