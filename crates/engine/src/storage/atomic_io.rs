use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Writes `bytes` to a sibling temp file and renames it over `path`, so a
/// reader never observes a half-written file.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    if let Err(error) = fs::write(&tmp_path, bytes) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    replace_file(&tmp_path, path)
}

pub fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    write_bytes_atomic(path, text.as_bytes())
}

/// One retry after a failed write; the second error is returned to the caller.
pub fn write_text_atomic_with_retry(path: &Path, text: &str) -> io::Result<()> {
    match write_text_atomic(path, text) {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!(
                path = %path.display(),
                error = %first,
                "atomic_write_failed_retrying"
            );
            write_text_atomic(path, text)
        }
    }
}

fn replace_file(tmp_path: &Path, final_path: &Path) -> io::Result<()> {
    // rename replaces atomically on unix; windows needs the target gone first
    if cfg!(windows) {
        match fs::remove_file(final_path) {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                let _ = fs::remove_file(tmp_path);
                return Err(error);
            }
        }
    }

    if let Err(error) = fs::rename(tmp_path, final_path) {
        let _ = fs::remove_file(tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("data");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
