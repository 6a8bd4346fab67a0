// Recovery side files
//
// Each invocation attempt may mirror its streamed text to a file of its own so
// that a crash mid-stream leaves something a human can salvage. The program
// never reads these files back.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Destination for a copy of streamed text
#[async_trait]
pub trait RecoverySink: Send {
    /// Append one fragment
    async fn write(&mut self, fragment: &str) -> io::Result<()>;

    /// Flush and close
    async fn finish(&mut self) -> io::Result<()>;

    /// File backing this sink, if any
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl RecoverySink for NoopSink {
    async fn write(&mut self, _fragment: &str) -> io::Result<()> {
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Append-only file sink, flushed after every fragment
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    /// Create the file (and its directory); fails if it already exists
    pub async fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }
}

#[async_trait]
impl RecoverySink for FileSink {
    async fn write(&mut self, fragment: &str) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "recovery file already closed"))?;
        file.write_all(fragment.as_bytes()).await?;
        file.flush().await
    }

    async fn finish(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_data().await?;
        }
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Where, if anywhere, recovery files go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Recovery {
    #[default]
    Disabled,
    Directory(PathBuf),
}

impl Recovery {
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        dir.map(Recovery::Directory).unwrap_or_default()
    }

    /// Open a fresh sink for one attempt
    ///
    /// Falls back to [`NoopSink`] when the file cannot be created; losing the
    /// mirror must not fail the attempt.
    pub async fn open(&self, unit_label: &str, attempt: u32) -> Box<dyn RecoverySink> {
        match self {
            Recovery::Disabled => Box::new(NoopSink),
            Recovery::Directory(dir) => {
                let path = dir.join(recovery_file_name(unit_label, attempt, Utc::now()));
                match FileSink::create(&path).await {
                    Ok(sink) => {
                        debug!(unit = %unit_label, attempt, path = %path.display(), "Recovery file opened");
                        Box::new(sink)
                    }
                    Err(e) => {
                        warn!(unit = %unit_label, attempt, path = %path.display(), error = %e, "Cannot create recovery file; continuing without it");
                        Box::new(NoopSink)
                    }
                }
            }
        }
    }
}

/// `<timestamp>_<sanitized unit>_attempt<N>.partial.txt`
pub fn recovery_file_name(unit_label: &str, attempt: u32, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_attempt{}.partial.txt",
        at.format("%Y%m%dT%H%M%S%.3fZ"),
        sanitize(unit_label),
        attempt
    )
}

fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unit".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_recovery_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            recovery_file_name("my novel/chapter 3", 2, at),
            "20240309T140507.000Z_my_novel_chapter_3_attempt2.partial.txt"
        );
        assert!(recovery_file_name("", 1, at).contains("_unit_"));
    }

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("partial.txt");

        let mut sink = FileSink::create(&path).await.unwrap();
        sink.write("Hello, ").await.unwrap();
        sink.write("world").await.unwrap();

        // Visible before finish
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "Hello, world");

        sink.finish().await.unwrap();
        assert_eq!(sink.location(), Some(path.as_path()));
        assert!(sink.write("late").await.is_err());
    }

    #[tokio::test]
    async fn test_recovery_directory_opens_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let recovery = Recovery::from_dir(Some(dir.path().to_path_buf()));

        let mut first = recovery.open("novel/chapter-1", 1).await;
        let mut second = recovery.open("novel/chapter-1", 2).await;
        first.write("a").await.unwrap();
        second.write("b").await.unwrap();

        assert_ne!(first.location(), second.location());
        assert!(first.location().unwrap().starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_disabled_recovery_is_noop() {
        let mut sink = Recovery::Disabled.open("novel/chapter-1", 1).await;
        sink.write("ignored").await.unwrap();
        sink.finish().await.unwrap();
        assert!(sink.location().is_none());
    }
}
