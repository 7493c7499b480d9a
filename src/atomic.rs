//! Crash-safe whole-file writes.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Replace `path` with `data` so readers see either the old or the new
/// contents, never a truncated file.
///
/// The data goes to a temp file in the same directory, is synced, then
/// renamed over the target. The temp name is unique per process and thread
/// so parallel writers to the same key never share a temp file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_name = format!(
        ".{}.{}.{:?}.tmp",
        file_name.to_string_lossy(),
        std::process::id(),
        std::thread::current().id()
    );
    let temp_path = path.with_file_name(temp_name);

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    sync_parent(path)
}

/// Flush the directory entry so the rename survives a power loss.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => File::open(".")?.sync_all(),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
