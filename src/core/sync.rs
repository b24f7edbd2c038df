//! Lock poisoning helpers
//!
//! Every lock in the crate goes through one of these functions so that a
//! panic while holding a lock turns into a typed error for the caller
//! instead of a second panic.

use std::sync::{LockResult, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

/// Map a poisoned `Mutex::lock` into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use topicq::core::sync::handle_mutex_poison;
/// use topicq::queue::QueueError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| QueueError::Internal { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<'a, T, E>(
    result: LockResult<MutexGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<MutexGuard<'a, T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "mutex poisoned by a panic while the lock was held: {}",
            poison_err
        ))
    })
}

/// Map a poisoned `RwLock::read` into an application error
pub fn handle_rwlock_read<'a, T, E>(
    result: LockResult<RwLockReadGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<'a, T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "RwLock poisoned by a panic in a writer: {}",
            poison_err
        ))
    })
}

/// Map a poisoned `RwLock::write` into an application error
pub fn handle_rwlock_write<'a, T, E>(
    result: LockResult<RwLockWriteGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<'a, T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "RwLock poisoned by a panic while the lock was held: {}",
            poison_err
        ))
    })
}
