//! Serialized access to the process environment for config tests.

use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Runs `run` while holding the process-wide environment lock.
///
/// A panicking test poisons the lock; later tests still get it.
pub(crate) fn with_locked_env<R>(run: impl FnOnce() -> R) -> R {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    run()
}

/// Sets `key`. Only call inside `with_locked_env`.
pub(crate) fn set_env_var(key: &str, value: &str) {
    // SAFETY: callers hold the env lock, so no other test thread touches the environment.
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Removes `key`. Only call inside `with_locked_env`.
pub(crate) fn remove_env_var(key: &str) {
    // SAFETY: callers hold the env lock, so no other test thread touches the environment.
    unsafe {
        std::env::remove_var(key);
    }
}
