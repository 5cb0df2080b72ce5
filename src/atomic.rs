//! Scratch-then-replace file writes.
//!
//! Every generated file (gravity hosts, blacklist hosts, user lists, cache
//! files) is written to a fresh temporary file in the destination directory
//! and renamed over the destination once complete, so a reader never sees a
//! half-written file and an interrupted run leaves the old file intact.
//!
//! When the rename is refused (some filesystems and platforms do not allow
//! replacing an existing file by rename) the destination is rewritten in place
//! while holding an exclusive advisory lock on it.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Mode given to new files, readable by the resolver's own account
const DEFAULT_MODE: u32 = 0o644;

/// A file being written next to its final destination.
///
/// Dropping it without [`AtomicFile::commit`] discards the scratch file.
pub struct AtomicFile {
    target: PathBuf,
    writer: BufWriter<NamedTempFile>,
}

impl AtomicFile {
    /// Start a scratch file for `target`, creating the parent directory if needed.
    pub fn create(target: &Path) -> Result<Self> {
        let dir = parent_dir(target);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
        let temp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create scratch file in {:?}", dir))?;
        Ok(Self {
            target: target.to_path_buf(),
            writer: BufWriter::new(temp),
        })
    }

    /// Flush, sync and move the scratch file over the target.
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        let temp = self
            .writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("Failed to flush scratch file for {:?}", target))?;

        let mode = match fs::metadata(&target) {
            Ok(meta) => meta.permissions().mode(),
            Err(_) => DEFAULT_MODE,
        };
        temp.as_file()
            .set_permissions(Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions for {:?}", target))?;
        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync scratch file for {:?}", target))?;

        match temp.persist(&target) {
            Ok(_) => {
                debug!("Replaced {:?}", target);
                Ok(())
            }
            Err(err) => {
                warn!(
                    "Atomic rename onto {:?} failed ({}), rewriting under lock",
                    target, err.error
                );
                let mut file = err.file;
                replace_locked(file.as_file_mut(), &target)
                    .with_context(|| format!("Failed to replace {:?}", target))
            }
        }
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Write `contents` to `path` through a scratch file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = AtomicFile::create(path)?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write scratch file for {:?}", path))?;
    file.commit()
}

/// Copy `source` over `target` in place while holding an exclusive lock on it.
fn replace_locked(source: &mut File, target: &Path) -> io::Result<()> {
    let mut dest = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(target)?;
    dest.lock_exclusive()?;

    let result = (|| {
        source.seek(SeekFrom::Start(0))?;
        dest.set_len(0)?;
        dest.seek(SeekFrom::Start(0))?;
        io::copy(source, &mut dest)?;
        dest.sync_all()
    })();

    // Lock also drops with the handle; unlock explicitly to release before return
    let _ = FileExt::unlock(&dest);
    result
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.list");
        write_atomic(&path, b"hello\n").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello\n");
    }

    #[test]
    fn test_write_atomic_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/out.list");
        write_atomic(&path, b"x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_default_mode_is_world_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gravity.list");
        write_atomic(&path, b"x").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_existing_mode_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("whitelist.txt");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, Permissions::from_mode(0o600)).unwrap();
        write_atomic(&path, b"new").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_drop_without_commit_keeps_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gravity.list");
        fs::write(&path, b"original").unwrap();
        {
            let mut file = AtomicFile::create(&path).unwrap();
            file.write_all(b"partial").unwrap();
        }
        assert_eq!(fs::read(&path).unwrap(), b"original");
        // Only the original remains; the scratch file was removed
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_replace_locked_overwrites_longer_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        fs::write(&target, b"a much longer original body").unwrap();
        let mut source = tempfile::tempfile().unwrap();
        source.write_all(b"short").unwrap();
        replace_locked(&mut source, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"short");
    }
}
