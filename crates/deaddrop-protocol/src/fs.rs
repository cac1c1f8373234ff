//! Filesystem write discipline shared by both sides of the bridge.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Writes the provided bytes to the path using an atomic persist step.
///
/// Data is flushed and fsync'd before the temporary file is renamed into
/// place so readers never observe a partially written payload. Every file the
/// bridge writes (requests, responses, markers, status) goes through here.
///
/// # Errors
///
/// Returns the underlying IO error when the temporary file cannot be created,
/// written, synced, or renamed into place.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("deaddrop"),
    );
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        builder.permissions(Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

/// Removes a file, treating a missing file as success.
///
/// The caller's cleanup protocol deletes whatever files exist for an id; the
/// other side may already have removed (or never written) its half, so
/// absence is never an error.
///
/// # Errors
///
/// Returns the underlying IO error for failures other than `NotFound`.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_leaves_only_the_target_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = dir.path().join("payload.json");
        atomic_write(&target, b"{\"ok\":true}").expect("write");

        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("payload.json")]);
        assert_eq!(
            fs::read(&target).expect("read back"),
            b"{\"ok\":true}".to_vec()
        );
    }

    #[test]
    fn atomic_write_replaces_existing_contents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = dir.path().join("payload.json");
        atomic_write(&target, b"old").expect("first write");
        atomic_write(&target, b"new").expect("second write");
        assert_eq!(fs::read(&target).expect("read back"), b"new".to_vec());
    }

    #[test]
    fn remove_file_if_exists_tolerates_missing_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = dir.path().join("gone.json");
        assert!(!remove_file_if_exists(&target).expect("remove missing"));

        fs::write(&target, b"x").expect("write");
        assert!(remove_file_if_exists(&target).expect("remove present"));
        assert!(!target.exists());
    }
}
