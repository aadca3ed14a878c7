//! File-system contract consumed by the cache manager.
//!
//! The manager never touches `std::fs` or `tokio::fs` directly; everything
//! goes through [`FileIo`] so hosts can sandbox or virtualize storage.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole file.
    Rewrite,
    /// Append to the end, creating the file if needed.
    Append,
}

#[async_trait]
pub trait FileIo: Send + Sync {
    async fn write_file(&self, path: &Path, content: &str, mode: WriteMode) -> io::Result<()>;

    /// Read up to `max_lines` lines starting after the first `offset` lines.
    async fn read_file(&self, path: &Path, offset: usize, max_lines: usize) -> io::Result<String>;

    /// The whole file, byte for byte.
    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace `path` with exactly `content`.
    async fn write_bytes(&self, path: &Path, content: &[u8]) -> io::Result<()>;

    /// Create `path` and any missing parents.  Succeeds if it already exists.
    async fn create_dir(&self, path: &Path) -> io::Result<()>;

    async fn dir_exists(&self, path: &Path) -> bool;

    async fn file_exists(&self, path: &Path) -> bool;
}

/// [`FileIo`] backed by the local file system through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileIo;

#[async_trait]
impl FileIo for TokioFileIo {
    async fn write_file(&self, path: &Path, content: &str, mode: WriteMode) -> io::Result<()> {
        match mode {
            WriteMode::Append => {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                file.write_all(content.as_bytes()).await?;
                file.flush().await?;
                Ok(())
            }
            WriteMode::Rewrite => rewrite_via_tmp(path, content.as_bytes()).await,
        }
    }

    async fn read_file(&self, path: &Path, offset: usize, max_lines: usize) -> io::Result<String> {
        let raw = tokio::fs::read_to_string(path).await?;
        let total = raw.lines().count();
        let mut out = raw
            .lines()
            .skip(offset)
            .take(max_lines)
            .collect::<Vec<_>>()
            .join("\n");
        if total > offset.saturating_add(max_lines) {
            out.push_str(&format!("\n…[truncated after {max_lines} lines]"));
        }
        Ok(out)
    }

    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write_bytes(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        rewrite_via_tmp(path, content).await
    }

    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn dir_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}

/// Write to a `.tmp` sibling and rename it over `path`, so readers see either
/// the old or the new content.  The `.tmp` file is removed on any error path.
async fn rewrite_via_tmp(path: &Path, content: &[u8]) -> io::Result<()> {
    let tmp_path = {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "cache".to_string());
        path.with_file_name(format!("{filename}.tmp"))
    };

    let write_result: io::Result<()> = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .await?;
        file.write_all(content).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
    .await;

    if let Err(err) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err);
    }

    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn rewrite_then_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.md");
        let io = TokioFileIo;

        io.write_file(&path, "first\n", WriteMode::Rewrite).await.unwrap();
        io.write_file(&path, "second\n", WriteMode::Append).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");

        io.write_file(&path, "replaced\n", WriteMode::Rewrite).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "replaced\n");
        assert!(!dir.path().join("log.md.tmp").exists());
    }

    #[tokio::test]
    async fn read_respects_offset_and_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lines.md");
        std::fs::write(&path, "a\nb\nc\nd\n").unwrap();

        let io = TokioFileIo;
        assert_eq!(io.read_file(&path, 0, 10).await.unwrap(), "a\nb\nc\nd");
        assert_eq!(io.read_file(&path, 1, 2).await.unwrap(), "b\nc\n…[truncated after 2 lines]");
    }

    #[tokio::test]
    async fn bytes_round_trip_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.bin");
        let io = TokioFileIo;
        let content = b"{\"a\":1}\r\n\xff\n\n";

        io.write_bytes(&path, content).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), content);
        assert_eq!(io.read_bytes(&path).await.unwrap(), content);
        assert!(!dir.path().join("raw.bin.tmp").exists());
    }

    #[tokio::test]
    async fn read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let io = TokioFileIo;
        assert!(io.read_file(&dir.path().join("nope.md"), 0, 10).await.is_err());
    }

    #[tokio::test]
    async fn existence_checks_distinguish_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        let io = TokioFileIo;
        let nested = dir.path().join("a/b");
        io.create_dir(&nested).await.unwrap();
        io.create_dir(&nested).await.unwrap();
        assert!(io.dir_exists(&nested).await);
        assert!(!io.file_exists(&nested).await);

        let file = nested.join("f.md");
        std::fs::write(&file, "x").unwrap();
        assert!(io.file_exists(&file).await);
        assert!(!io.dir_exists(&file).await);
    }
}
