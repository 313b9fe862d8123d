use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// 1. StorageService Contract
/// StorageService
///
/// Defines the abstract contract for storing uploaded page images. This trait allows us to
/// swap the concrete implementation (LocalDiskStorage) for the in-memory Mock
/// (MockStorageService) during testing without affecting the calling handlers.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the storage directory if it is missing. Called once at startup.
    async fn ensure_dir_exists(&self) -> io::Result<()>;

    /// Stores the image bytes and returns the generated file name
    /// (`{unix millis}{sanitized original name}`).
    async fn save_image(&self, original_name: &str, bytes: &[u8]) -> io::Result<String>;
}

// 2. The Real Implementation (local disk)
/// LocalDiskStorage
///
/// Writes images into a single flat directory which is also served statically
/// under `/storage`.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_dir_exists(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    async fn save_image(&self, original_name: &str, bytes: &[u8]) -> io::Result<String> {
        let file_name = stored_file_name(original_name);
        let path = self.root.join(&file_name);

        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(file = %file_name, size = bytes.len(), "image stored");

        Ok(file_name)
    }
}

/// stored_file_name
///
/// Prefixes the sanitized client file name with the current unix time in milliseconds.
pub fn stored_file_name(original_name: &str) -> String {
    format!(
        "{}{}",
        chrono::Utc::now().timestamp_millis(),
        sanitize_file_name(original_name)
    )
}

/// sanitize_file_name
///
/// Prevents path traversal: only the last path segment of the client-provided name is
/// kept, and characters outside `[A-Za-z0-9._-]` become `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .unwrap_or("");

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// A mock implementation of `StorageService` used for integration testing. It keeps the
/// stored names in memory so the upload handler can be tested without touching the disk.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    saved: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Names of every image stored so far.
    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_dir_exists(&self) -> io::Result<()> {
        Ok(())
    }

    async fn save_image(&self, original_name: &str, _bytes: &[u8]) -> io::Result<String> {
        if self.should_fail {
            return Err(io::Error::other("mock storage failure"));
        }

        let file_name = stored_file_name(original_name);
        if let Ok(mut saved) = self.saved.lock() {
            saved.push(file_name.clone());
        }
        Ok(file_name)
    }
}

/// StorageState
///
/// The concrete type used to share the storage service access across the application state.
pub type StorageState = Arc<dyn StorageService>;
