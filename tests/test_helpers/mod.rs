//! Environment guards and binary discovery shared by integration tests.

use camino::Utf8PathBuf;
use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Applies environment changes for its lifetime and restores them on drop.
pub struct EnvVarGuard {
    previous: Vec<(OsString, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Sets (`Some`) or removes (`None`) each variable.
    pub fn set_many(changes: &[(OsString, Option<OsString>)]) -> Self {
        let lock = ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = changes
            .iter()
            .map(|(key, value)| {
                let before = env::var_os(key);
                apply(key, value.as_ref());
                (key.clone(), before)
            })
            .collect();
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..).rev() {
            apply(&key, value.as_ref());
        }
    }
}

fn apply(key: &OsString, value: Option<&OsString>) {
    // SAFETY: ENV_MUTEX serialises every environment change made by tests.
    unsafe {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}

/// Finds the `pg_worker` helper built alongside the tests.
///
/// Tries the path Cargo baked in at compile time, then the target directory
/// next to the running test binary, then `PATH`.
pub fn locate_pg_worker_path() -> Option<Utf8PathBuf> {
    option_env!("CARGO_BIN_EXE_pg_worker")
        .map(Utf8PathBuf::from)
        .filter(|path| path.is_file())
        .or_else(locate_near_target)
        .or_else(locate_in_path)
}

fn locate_near_target() -> Option<Utf8PathBuf> {
    let exe = Utf8PathBuf::try_from(env::current_exe().ok()?).ok()?;
    let candidate = exe.parent()?.parent()?.join("pg_worker");
    candidate.is_file().then_some(candidate)
}

fn locate_in_path() -> Option<Utf8PathBuf> {
    env::split_paths(&env::var_os("PATH")?)
        .filter_map(|dir| Utf8PathBuf::try_from(dir.join("pg_worker")).ok())
        .find(|candidate| candidate.is_file())
}
