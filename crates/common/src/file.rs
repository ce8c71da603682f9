//! Blocking helpers for files shared between herald processes.
//!
//! `serve`, `broadcast` and `enqueue` run as separate processes against the
//! same registry and queue files, so every read-modify-write holds an
//! exclusive lock on a `<file>.lock` sidecar and publishes through a uniquely
//! named temp file. Call these from `spawn_blocking`.

use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use {fd_lock::RwLock, tempfile::NamedTempFile};

/// `<path>.<suffix>`, keeping the original extension.
#[must_use]
pub fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Run `op` while holding an exclusive lock on `<path>.lock`.
///
/// Blocks until every other holder, in this process or another, releases it.
pub fn with_exclusive_lock<T, E>(path: &Path, op: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: From<io::Error>,
{
    fs::create_dir_all(parent_dir(path))?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(sidecar(path, "lock"))?;
    let mut lock = RwLock::new(file);
    let _held = lock.write()?;
    op()
}

/// Read `path`, treating only a missing file as `None`.
pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove `path`; a file that is already gone is fine.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Replace `path` with `contents` through a temp file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
