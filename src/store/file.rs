//! Single-file object store
//!
//! All tables live in memory and are written out as one image on `flush`:
//!
//! ```text
//! {"format":1,"checksum":<crc32 of body>,"body":"<serialized Tables>"}
//! ```
//!
//! The image is written to `<path>.tmp`, fsynced, then renamed over
//! `<path>`, so a crash mid-flush leaves the previous image intact. A body
//! whose checksum does not match is rejected as corruption on open.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{StoreError, StoreResult};
use super::memory::Tables;
use super::{Fields, ObjectStore, Record, RecordId};
use crate::observability::{Event, Logger};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StoreImage {
    format: u32,
    checksum: u32,
    body: String,
}

/// Object store persisted to a single checksummed JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    tables: RwLock<Tables>,
}

impl FileStore {
    /// Opens the store at `path`, loading the existing image if present.
    ///
    /// A missing file yields an empty store; nothing is written until the
    /// first `flush`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` if the file exists but cannot be read
    /// - `StoreError::Corruption` on checksum or format mismatch
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let tables = match fs::read_to_string(&path) {
            Ok(content) => Self::decode(&path, &content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Tables::new(),
            Err(e) => {
                return Err(StoreError::io(
                    format!("Failed to read store file: {}", path.display()),
                    e,
                ))
            }
        };

        let path_str = path.display().to_string();
        let records = tables.record_count().to_string();
        Logger::event(
            Event::StoreOpened,
            &[("path", path_str.as_str()), ("records", records.as_str())],
        );

        Ok(Self {
            path,
            tables: RwLock::new(tables),
        })
    }

    /// Returns the path of the store image.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(path: &Path, content: &str) -> StoreResult<Tables> {
        let image: StoreImage = serde_json::from_str(content).map_err(|e| {
            StoreError::Corruption(format!("Unreadable store image {}: {}", path.display(), e))
        })?;

        if image.format != FORMAT_VERSION {
            return Err(StoreError::Corruption(format!(
                "Unsupported store format {} in {}",
                image.format,
                path.display()
            )));
        }

        if !verify_checksum(image.body.as_bytes(), image.checksum) {
            return Err(StoreError::Corruption(format!(
                "Checksum mismatch in {}",
                path.display()
            )));
        }

        serde_json::from_str(&image.body).map_err(|e| {
            StoreError::Corruption(format!("Invalid store body in {}: {}", path.display(), e))
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn write_image(&self, tables: &Tables) -> StoreResult<()> {
        let body = serde_json::to_string(tables)?;
        let image = StoreImage {
            format: FORMAT_VERSION,
            checksum: compute_checksum(body.as_bytes()),
            body,
        };
        let bytes = serde_json::to_vec(&image)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::io(
                    format!("Failed to create store directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let tmp = self.tmp_path();
        let mut file = File::create(&tmp).map_err(|e| {
            StoreError::io(format!("Failed to create {}", tmp.display()), e)
        })?;
        file.write_all(&bytes)
            .map_err(|e| StoreError::io(format!("Failed to write {}", tmp.display()), e))?;
        file.sync_all()
            .map_err(|e| StoreError::io(format!("Failed to fsync {}", tmp.display()), e))?;

        fs::rename(&tmp, &self.path).map_err(|e| {
            StoreError::io(
                format!("Failed to replace store image {}", self.path.display()),
                e,
            )
        })?;

        let size = bytes.len().to_string();
        let path_str = self.path.display().to_string();
        Logger::event(
            Event::StoreFlushed,
            &[("bytes", size.as_str()), ("path", path_str.as_str())],
        );
        Ok(())
    }
}

impl ObjectStore for FileStore {
    fn insert(&self, table: &str, fields: Fields) -> StoreResult<RecordId> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        Ok(tables.insert(table, fields))
    }

    fn fetch(&self, table: &str, id: RecordId) -> StoreResult<Option<Record>> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.fetch(table, id))
    }

    fn find_by(&self, table: &str, field: &str, value: &Value) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.find_by(table, field, value))
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.scan(table))
    }

    fn update(&self, table: &str, id: RecordId, fields: Fields) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        tables.update(table, id, fields)
    }

    fn delete(&self, table: &str, id: RecordId) -> StoreResult<bool> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        Ok(tables.delete(table, id))
    }

    /// Writes the whole image. Holding the read lock for the duration keeps
    /// the image consistent with a single point in time.
    fn flush(&self) -> StoreResult<()> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        self.write_image(&tables)
    }

    fn clear(&self) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        tables.clear();
        Ok(())
    }
}
