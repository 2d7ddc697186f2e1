//! Scoped environment changes for configuration tests.
//!
//! [`EnvVarGuard`] applies one or more changes and restores every touched
//! variable, in reverse order, when dropped. Callers must serialise tests
//! that mutate the environment (for example with `serial_test`).

use std::ffi::OsString;

/// Restores the variables it changed on drop.
#[derive(Debug, Default)]
pub struct EnvVarGuard {
    saved: Vec<(OsString, Option<OsString>)>,
}

impl EnvVarGuard {
    /// Set `key` to `value` for the lifetime of the guard.
    #[must_use]
    pub fn set(key: &str, value: &str) -> Self {
        let mut guard = Self::default();
        guard.apply(key, Some(value));
        guard
    }

    /// Unset `key` for the lifetime of the guard.
    #[must_use]
    pub fn remove(key: &str) -> Self {
        let mut guard = Self::default();
        guard.apply(key, None);
        guard
    }

    /// Unset every variable whose name starts with `prefix`, so that
    /// overrides from the developer's shell cannot leak into a test.
    #[must_use]
    pub fn clear_prefix(prefix: &str) -> Self {
        let mut guard = Self::default();
        let keys: Vec<OsString> = std::env::vars_os()
            .map(|(k, _)| k)
            .filter(|k| k.to_string_lossy().starts_with(prefix))
            .collect();
        for key in keys {
            guard.apply(key, None::<&str>);
        }
        guard
    }

    /// Also set `key` to `value`, restoring it with the rest.
    #[must_use]
    pub fn and_set(mut self, key: &str, value: &str) -> Self {
        self.apply(key, Some(value));
        self
    }

    fn apply(&mut self, key: impl Into<OsString>, value: Option<&str>) {
        let key = key.into();
        self.saved.push((key.clone(), std::env::var_os(&key)));
        write_var(&key, value.map(OsString::from).as_ref());
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, original) in self.saved.drain(..).rev() {
            write_var(&key, original.as_ref());
        }
    }
}

/// SAFETY: callers run in serial test contexts, so no other thread reads the
/// environment concurrently.
fn write_var(key: &OsString, value: Option<&OsString>) {
    match value {
        Some(v) => unsafe { std::env::set_var(key, v) },
        None => unsafe { std::env::remove_var(key) },
    }
}
