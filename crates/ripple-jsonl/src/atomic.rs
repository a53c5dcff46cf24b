//! File-level JSONL writes.
//!
//! [`write_jsonl_atomic`] replaces a file using the temp-file-then-rename
//! pattern: records go to `<name>.tmp` first, which is renamed over the target
//! only once it has been fully written and flushed. A crash mid-write leaves
//! the original file untouched.
//!
//! [`append_jsonl`] adds one record to the end of a file, creating it (and
//! its parent directories) on first use.

use crate::{JsonlWriter, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};

/// Atomically replaces `path` with the given records.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or the rename
/// fails. The temporary file is removed on a failed write.
pub async fn write_jsonl_atomic<T, P>(path: P, values: &[T]) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = make_temp_path(path);

    if let Err(e) = write_to_temp_file(&temp_path, values).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Appends one record to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the record cannot be
/// serialized or written.
pub async fn append_jsonl<T, P>(path: P, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let mut writer = JsonlWriter::new(file);
    writer.write(value).await?;
    writer.flush().await?;
    Ok(())
}

/// `file.jsonl` becomes `file.jsonl.tmp`, `file` becomes `file.tmp`.
fn make_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => std::ffi::OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    temp_path
}

async fn write_to_temp_file<T: Serialize>(temp_path: &Path, values: &[T]) -> Result<()> {
    let file = File::create(temp_path).await?;
    let mut writer = JsonlWriter::new(file);
    writer.write_all(values).await?;
    writer.flush().await?;
    Ok(())
}
