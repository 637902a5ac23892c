//! Staging of the `pg_worker` helper where an unprivileged user can run it.

use super::BoxError;
use super::fs_utils::open_parent_dir;
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use cap_std::fs::{Permissions, PermissionsExt};
use std::sync::{Mutex, OnceLock, PoisonError};

static STAGED_WORKER: OnceLock<Mutex<Option<Utf8PathBuf>>> = OnceLock::new();

/// Copies the worker into the temp directory with world-executable
/// permissions and returns the copy. Later calls reuse the first copy.
pub(super) fn prepare_pg_worker(worker: &Utf8Path) -> Result<Utf8PathBuf, BoxError> {
    let mut staged = STAGED_WORKER
        .get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(path) = staged.as_ref() {
        return Ok(path.clone());
    }

    let temp_dir = Utf8PathBuf::try_from(std::env::temp_dir()).map_err(|err| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("temp directory path is not valid UTF-8: {err}"),
        )) as BoxError
    })?;
    let destination = temp_dir.join(format!("jobvault_pg_worker_{}", std::process::id()));
    let (source_dir, source_name) = open_parent_dir(worker)?;
    let (destination_dir, destination_name) = open_parent_dir(&destination)?;

    match destination_dir.remove_file(destination_name) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(Box::new(err) as BoxError),
    }
    source_dir
        .copy(source_name, &destination_dir, destination_name)
        .map_err(|err| Box::new(err) as BoxError)?;

    #[cfg(unix)]
    destination_dir
        .set_permissions(destination_name, Permissions::from_mode(0o755))
        .map_err(|err| Box::new(err) as BoxError)?;

    *staged = Some(destination.clone());
    Ok(destination)
}
