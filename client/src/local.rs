//! Durable storage of the device's document.
//!
//! The whole document is written as one blob. A load never fails: a missing
//! blob becomes a fresh document, an old one is migrated, and a corrupt one
//! is replaced in memory (the stored bytes stay until the next good save).

use chrono::Utc;
use lumina_engine::Document;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Somewhere a serialized document can be kept.
pub trait DocumentStorage: Send + Sync {
    /// The stored blob, or `None` if nothing was ever written.
    fn read(&self) -> io::Result<Option<String>>;

    /// Replace the stored blob. Either the new blob is stored or the old one
    /// is left as it was.
    fn write(&self, contents: &str) -> io::Result<()>;
}

/// A JSON file on disk, replaced atomically through a sibling temp file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentStorage for FileStorage {
    fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        if let Err(e) = fs::write(&temp, contents).and_then(|_| fs::rename(&temp, &self.path)) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        Ok(())
    }
}

/// In-process storage. Writes can be switched off to model a full disk or
/// an exhausted browser quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    contents: Mutex<Option<String>>,
    reject_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
            reject_writes: AtomicBool::new(false),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

impl DocumentStorage for MemoryStorage {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("storage quota exceeded"));
        }
        *self.contents.lock() = Some(contents.to_string());
        Ok(())
    }
}

/// Loads and saves the document through a storage backend.
#[derive(Clone)]
pub struct LocalStore {
    storage: Arc<dyn DocumentStorage>,
}

impl LocalStore {
    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        Self { storage }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(path)))
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Read the stored document, migrating it to the current schema.
    pub fn load(&self) -> Document {
        let now = Utc::now();
        let contents = match self.storage.read() {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "could not read stored document, starting fresh");
                return Document::new(now);
            }
        };

        let Some(json) = contents else {
            info!("no stored document, creating one");
            let mut doc = Document::new(now);
            self.save(&mut doc);
            return doc;
        };

        match Document::from_json(&json, now) {
            Ok((mut doc, report)) => {
                if report.changed() {
                    info!(
                        from = report.from_version.as_deref().unwrap_or("none"),
                        steps = report.steps.len(),
                        "migrated stored document"
                    );
                    for step in &report.steps {
                        debug!(step = %step, "migration step");
                    }
                    self.save(&mut doc);
                }
                doc
            }
            Err(e) => {
                warn!(error = %e, "stored document is corrupt, starting fresh");
                Document::new(now)
            }
        }
    }

    /// Stamp `lastUpdated` and write the whole document. Returns `false` if
    /// nothing was written; the previously stored document is then intact.
    pub fn save(&self, doc: &mut Document) -> bool {
        doc.last_updated = Utc::now();
        let json = match doc.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "could not serialize document");
                return false;
            }
        };
        match self.storage.write(&json) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "could not save document");
                false
            }
        }
    }
}
