//! Control-socket secret, shared through a file readable only by its owner.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{AppError, Result};

/// Token file for the control socket named `ipc_name`.
#[must_use]
pub fn token_path(ipc_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{ipc_name}.token"))
}

/// Fresh random secret.
#[must_use]
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Write `token` to `path`, replacing any previous file. On unix the file
/// is created with mode `0600`.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the file cannot be written.
pub fn write_token(path: &Path, token: &str) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|err| AppError::Ipc(format!("cannot write {}: {err}", path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|err| AppError::Ipc(format!("cannot restrict {}: {err}", path.display())))?;
    }

    file.write_all(token.as_bytes())
        .map_err(|err| AppError::Ipc(format!("cannot write {}: {err}", path.display())))
}

/// Read a token written by [`write_token`].
///
/// # Errors
///
/// Returns `AppError::Ipc` if the file is missing, unreadable or empty.
pub fn read_token(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::Ipc(format!("cannot read {}: {err}", path.display())))?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(AppError::Ipc(format!("{} is empty", path.display())));
    }
    Ok(token.to_owned())
}
