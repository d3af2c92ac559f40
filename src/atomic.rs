//! Crash-safe file replacement.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the file at `path` is left as it was.
/// When `path` already exists its permission bits carry over to the new file,
/// so an executable stays executable after being rewritten.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // Create tempfile in same directory to ensure same filesystem
    let parent = parent_dir(path)?;
    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copy `src` to `dest` only if `dest` does not exist yet.
///
/// The existence check and the final rename are one operation, so a copy
/// that loses a race (or finds a file already there) leaves `dest` alone.
/// Returns `false` when `dest` already existed.
pub fn copy_new(src: &Path, dest: &Path) -> io::Result<bool> {
    if dest.exists() {
        return Ok(false);
    }

    let parent = parent_dir(dest)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    let mut reader = fs::File::open(src)?;
    io::copy(&mut reader, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.as_file()
        .set_permissions(fs::metadata(src)?.permissions())?;

    match temp.persist_noclobber(dest) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

fn parent_dir(path: &Path) -> io::Result<&Path> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(Path::new(".")),
        Some(parent) => Ok(parent),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        )),
    }
}
