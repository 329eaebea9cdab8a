use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncRead;
use tracing::warn;

/// Minimal, async-capable filesystem abstraction used by the coordinator and
/// upload workers.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// List the immediate entries of a directory.
    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;

    /// Open a file for streaming its contents.
    async fn open(&self, path: &Path) -> io::Result<OpenedFile>;

    /// Delete a file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Lightweight directory entry needed by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name within the listed directory.
    pub name: String,
    /// True for regular files, following symlinks.
    pub is_file: bool,
}

/// A readable file handle together with its size at open time.
pub struct OpenedFile {
    /// Streaming reader over the file contents.
    pub reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
    /// Size in bytes at open time.
    pub len: u64,
}

impl fmt::Debug for OpenedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedFile").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Real filesystem implementation backed by tokio::fs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Handle to the host filesystem.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut rd = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    // Such names cannot be addressed in an upload URL.
                    warn!(target: "gzship::fs", name = ?raw, "skipping non UTF-8 file name");
                    continue;
                }
            };
            // file_type does not follow symlinks; metadata does.
            let is_file = match tokio::fs::metadata(entry.path()).await {
                Ok(md) => md.is_file(),
                Err(_) => false,
            };
            entries.push(DirEntry { name, is_file });
        }
        Ok(entries)
    }

    async fn open(&self, path: &Path) -> io::Result<OpenedFile> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(OpenedFile {
            reader: Box::new(file),
            len,
        })
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// In-memory filesystem for tests.
/// Note: Paths are treated literally; callers should use consistent absolute or relative paths.
#[derive(Debug, Default)]
pub struct InMemoryFs {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<HashSet<PathBuf>>,
    fail_listing: AtomicBool,
    undeletable: Mutex<HashSet<PathBuf>>,
}

impl InMemoryFs {
    /// Empty filesystem with no files or directories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file.
    pub fn add_file<P: Into<PathBuf>>(&self, path: P, contents: impl Into<Vec<u8>>) {
        lock(&self.files).insert(path.into(), contents.into());
    }

    /// Create a directory entry.
    pub fn add_dir<P: Into<PathBuf>>(&self, path: P) {
        lock(&self.dirs).insert(path.into());
    }

    /// Delete a file without going through the trait.
    pub fn remove<P: AsRef<Path>>(&self, path: P) {
        lock(&self.files).remove(path.as_ref());
    }

    /// Whether a file exists at `path`.
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        lock(&self.files).contains_key(path.as_ref())
    }

    /// Current contents of a file.
    pub fn contents<P: AsRef<Path>>(&self, path: P) -> Option<Vec<u8>> {
        lock(&self.files).get(path.as_ref()).cloned()
    }

    /// Make every subsequent `list_dir` call fail until reset.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make `remove_file` fail for this path.
    pub fn make_undeletable<P: Into<PathBuf>>(&self, path: P) {
        lock(&self.undeletable).insert(path.into());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(io::Error::other("listing disabled"));
        }

        let child_name = |path: &Path| {
            (path.parent() == Some(dir))
                .then(|| path.file_name().and_then(|n| n.to_str()).map(str::to_owned))
                .flatten()
        };

        let mut entries: Vec<DirEntry> = lock(&self.files)
            .keys()
            .filter_map(|path| child_name(path.as_path()))
            .map(|name| DirEntry {
                name,
                is_file: true,
            })
            .collect();
        entries.extend(lock(&self.dirs).iter().filter_map(|path| child_name(path.as_path())).map(
            |name| DirEntry {
                name,
                is_file: false,
            },
        ));
        Ok(entries)
    }

    async fn open(&self, path: &Path) -> io::Result<OpenedFile> {
        let contents = lock(&self.files).get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("open on missing path: {path:?}"))
        })?;
        let len = contents.len() as u64;
        Ok(OpenedFile {
            reader: Box::new(Cursor::new(contents)),
            len,
        })
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        if lock(&self.undeletable).contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("remove denied: {path:?}"),
            ));
        }
        match lock(&self.files).remove(path) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("remove on missing path: {path:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn real_fs_lists_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.gz"), b"abc").unwrap();
        std::fs::create_dir(dir.path().join("nested.gz")).unwrap();

        let mut entries = RealFs::new().list_dir(dir.path()).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "a.gz".into(),
                    is_file: true
                },
                DirEntry {
                    name: "nested.gz".into(),
                    is_file: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn real_fs_open_reports_length_and_streams_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.gz");
        std::fs::write(&path, b"payload").unwrap();

        let mut opened = RealFs::new().open(&path).await.unwrap();
        assert_eq!(opened.len, 7);
        let mut buf = Vec::new();
        opened.reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"payload");

        RealFs::new().remove_file(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn in_memory_lists_only_direct_children() {
        let fs = InMemoryFs::new();
        fs.add_file("/spool/a.gz", "a");
        fs.add_file("/spool/deeper/b.gz", "b");
        fs.add_file("/elsewhere/c.gz", "c");
        fs.add_dir("/spool/deeper");

        let mut entries = fs.list_dir(Path::new("/spool")).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "a.gz".into(),
                    is_file: true
                },
                DirEntry {
                    name: "deeper".into(),
                    is_file: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn in_memory_failure_injection() {
        let fs = InMemoryFs::new();
        fs.add_file("/spool/a.gz", "a");
        fs.make_undeletable("/spool/a.gz");
        fs.set_fail_listing(true);

        assert!(fs.list_dir(Path::new("/spool")).await.is_err());
        let err = fs.remove_file(Path::new("/spool/a.gz")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(fs.exists("/spool/a.gz"));

        let missing = fs.open(Path::new("/spool/none.gz")).await.unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }
}
