//! Atomic single-record writes.
//!
//! A payload is written to a temporary file in the target's own directory
//! (same filesystem, so the final rename is atomic), under an exclusive
//! advisory lock, and then renamed onto the target. Readers see either the
//! old file or the complete new one, never a partial write.
//!
//! There is no fsync before the rename: after a power loss the rename itself
//! may be lost even though it is atomic with respect to concurrent readers.
use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use fs4::fs_std::FileExt;
use log::{debug, error, trace};
use tempfile::{NamedTempFile, PersistError};

use crate::{DaybookError, Result};

/// Publishes `payload` at `target`, replacing any existing file.
pub fn write_atomic(target: &Path, payload: &[u8]) -> Result<()> {
    publish(target, payload, false)
}

/// Publishes `payload` at `target` only if nothing exists there yet.
///
/// An existing target is reported as a conflict and left untouched.
pub fn write_atomic_new(target: &Path, payload: &[u8]) -> Result<()> {
    publish(target, payload, true)
}

fn publish(target: &Path, payload: &[u8], no_clobber: bool) -> Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Ensure the parent directory exists
    if !dir.exists() {
        debug!("Creating parent directory: {}", dir.display());
        fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create directory {}: {}", dir.display(), e);
            DaybookError::Io(e)
        })?;
    }

    // The temp file is deleted on drop, so every early return below cleans up
    trace!("Creating temporary file in directory: {}", dir.display());
    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        error!("Failed to create temporary file: {}", e);
        DaybookError::Io(e)
    })?;

    temp_file.as_file().lock_exclusive().map_err(|e| {
        error!("Failed to lock temporary file: {}", e);
        DaybookError::Io(e)
    })?;

    temp_file.write_all(payload).map_err(|e| {
        error!("Failed to write to temporary file: {}", e);
        DaybookError::Io(e)
    })?;

    temp_file.flush().map_err(|e| {
        error!("Failed to flush temporary file: {}", e);
        DaybookError::Io(e)
    })?;

    let persisted = if no_clobber {
        temp_file.persist_noclobber(target)
    } else {
        temp_file.persist(target)
    };

    match persisted {
        Ok(_) => {
            debug!("Published {} bytes to {}", payload.len(), target.display());
            Ok(())
        }
        Err(PersistError { error, file }) => {
            drop(file);
            if no_clobber && error.kind() == io::ErrorKind::AlreadyExists {
                debug!("Refusing to overwrite {}", target.display());
                return Err(DaybookError::conflict(
                    "file",
                    target.display().to_string(),
                ));
            }
            error!("Failed to persist file {}: {}", target.display(), error);
            Err(DaybookError::Io(error))
        }
    }
}
