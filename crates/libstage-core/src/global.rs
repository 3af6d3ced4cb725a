//! Once-per-process native library initialization.
//!
//! The first call to [`ensure_initialized`] builds an [`Engine`], runs one
//! initialization attempt, and keeps the engine (its loaded libraries and
//! staging directory) for the rest of the process. Later calls return the
//! recorded outcome without retrying, whether the first attempt succeeded or
//! not. On Unix the retained staging directories are removed by an `atexit`
//! hook; abnormal termination leaks them.

use crate::engine::{Engine, InitOutcome};
use crate::CoreError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

struct GlobalState {
    engine: Option<Engine>,
    result: Result<InitOutcome, String>,
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static STATE: Mutex<Option<GlobalState>> = Mutex::new(None);
static EXIT_CLEANUP: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

/// Initialize native libraries for this process, at most once.
///
/// `make_engine` is only called by the first caller. Its errors are recorded
/// like initialization errors and returned to every later caller as
/// [`CoreError::UnexpectedInitialization`].
pub fn ensure_initialized<F>(make_engine: F) -> Result<InitOutcome, CoreError>
where
    F: FnOnce() -> Result<Engine, CoreError>,
{
    let mut state = STATE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = state.as_ref() {
        debug!("native libraries already initialized");
        return existing
            .result
            .clone()
            .map_err(CoreError::UnexpectedInitialization);
    }

    let (engine, result) = match make_engine() {
        Ok(mut engine) => {
            let result = engine.initialize();
            register_exit_cleanup(engine.staging_dirs());
            (Some(engine), result)
        }
        Err(e) => (None, Err(e)),
    };

    *state = Some(GlobalState {
        engine,
        result: result.as_ref().cloned().map_err(recorded_message),
    });
    INITIALIZED.store(true, Ordering::SeqCst);
    result
}

// Recorded failures are re-raised as `UnexpectedInitialization`; keep its
// message as-is so the prefix is not doubled.
fn recorded_message(err: &CoreError) -> String {
    match err {
        CoreError::UnexpectedInitialization(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Staging directories retained by the process-wide engine.
pub fn staging_dirs() -> Vec<PathBuf> {
    let state = STATE.lock().unwrap_or_else(PoisonError::into_inner);
    state
        .as_ref()
        .and_then(|s| s.engine.as_ref())
        .map(|engine| engine.staging_dirs().map(Path::to_path_buf).collect())
        .unwrap_or_default()
}

fn register_exit_cleanup<'a>(dirs: impl Iterator<Item = &'a Path>) {
    let mut pending = EXIT_CLEANUP.lock().unwrap_or_else(PoisonError::into_inner);
    pending.extend(dirs.map(Path::to_path_buf));
    if !pending.is_empty() {
        install_exit_hook();
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn install_exit_hook() {
    static HOOK: std::sync::Once = std::sync::Once::new();
    HOOK.call_once(|| {
        // SAFETY: `remove_pending_dirs` takes no arguments and cannot unwind.
        if unsafe { libc::atexit(remove_pending_dirs) } != 0 {
            tracing::warn!("could not register staging directory cleanup at exit");
        }
    });
}

// Windows keeps loaded DLLs locked, so their directory cannot be removed
// while the process is alive anyway.
#[cfg(not(unix))]
fn install_exit_hook() {}

#[cfg(unix)]
extern "C" fn remove_pending_dirs() {
    let mut pending = match EXIT_CLEANUP.try_lock() {
        Ok(guard) => guard,
        Err(std::sync::TryLockError::Poisoned(p)) => p.into_inner(),
        Err(std::sync::TryLockError::WouldBlock) => return,
    };
    for dir in pending.drain(..) {
        let _ = std::fs::remove_dir_all(dir);
    }
}
