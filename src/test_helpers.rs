//! Shared test utilities for serialising environment mutation.

use std::env;
use std::ffi::OsString;

use tokio::sync::{Mutex, MutexGuard};

/// Global mutex serialising environment mutation across tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores the variable on drop.
pub struct EnvGuard {
    key: String,
    previous: Option<OsString>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets an environment variable while holding a global mutex.
    #[must_use]
    pub fn set_var(key: &str, value: &str) -> Self {
        let guard = ENV_LOCK.blocking_lock();
        let previous = env::var_os(key);
        // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
        unsafe { env::set_var(key, value) };
        Self {
            key: key.to_owned(),
            previous,
            _guard: guard,
        }
    }

    /// Removes an environment variable while holding a global mutex.
    #[must_use]
    pub fn remove_var(key: &str) -> Self {
        let guard = ENV_LOCK.blocking_lock();
        let previous = env::var_os(key);
        // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
        unsafe { env::remove_var(key) };
        Self {
            key: key.to_owned(),
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: Environment mutation is serialised by holding `_guard`.
        unsafe {
            match &self.previous {
                Some(value) => env::set_var(&self.key, value),
                None => env::remove_var(&self.key),
            }
        }
    }
}
