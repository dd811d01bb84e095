use std::io::Write;
use std::path::Path;

use tracing::debug;

/// Replace `path` with `contents` without ever exposing a partially written file.
///
/// The data goes to a temporary file in the same directory, is flushed to disk
/// and then renamed over the destination. The temporary file is created with
/// owner-only permissions, which suits the secrets kept in the config file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, written or renamed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), bytes = contents.len(), "Atomically replaced file");
    Ok(())
}
