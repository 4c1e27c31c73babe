use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

pub fn drop_in_background_thread<T>(data: T)
where
    T: Send + 'static,
{
    thread::spawn(move || drop(data));
}

/// Locks `mutex`, recovering the guard if another holder panicked. Every value guarded
/// in this crate is either write-once or rebuilt from scratch, so a poisoned lock
/// carries no torn state.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
