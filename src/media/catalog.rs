//! Records of uploaded chat media.

use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::media::sniff::{ImageFormat, SniffedMedia};

/// A persisted chat-media upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub filename: String,
    pub original_name: Option<String>,
    pub format: ImageFormat,
    pub size_bytes: usize,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: SystemTime,
}

impl MediaRecord {
    pub fn new(
        uploader_id: Uuid,
        filename: String,
        original_name: Option<String>,
        sniffed: &SniffedMedia,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            uploader_id,
            filename,
            original_name,
            format: sniffed.format,
            size_bytes: sniffed.size_bytes,
            width: sniffed.width(),
            height: sniffed.height(),
            created_at: SystemTime::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("media record {0} already exists")]
    DuplicateId(Uuid),
}

/// Storage for media records.
pub trait MediaCatalog: Send + Sync {
    fn insert(&self, record: MediaRecord) -> Result<(), CatalogError>;
    fn get(&self, id: Uuid) -> Option<MediaRecord>;
}

/// Process-local media catalog.
#[derive(Default)]
pub struct MemoryMediaCatalog {
    records: DashMap<Uuid, MediaRecord>,
}

impl MemoryMediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MediaCatalog for MemoryMediaCatalog {
    fn insert(&self, record: MediaRecord) -> Result<(), CatalogError> {
        match self.records.entry(record.id) {
            Entry::Occupied(_) => Err(CatalogError::DuplicateId(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn get(&self, id: Uuid) -> Option<MediaRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }
}
