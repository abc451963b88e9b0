use std::sync::{Mutex, MutexGuard, PoisonError};

pub trait MutexUtils<T> {
    /// Run `f` while holding the lock, releasing it as soon as `f` returns.
    ///
    /// A lock poisoned by a panicking worker is taken over: the guarded
    /// ledger connection stays consistent on its own.
    fn with_lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(MutexGuard<'_, T>) -> R;
}

impl<T> MutexUtils<T> for Mutex<T> {
    fn with_lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(MutexGuard<'_, T>) -> R,
    {
        f(self.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
