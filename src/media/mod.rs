//! Uploaded media subsystem.
//!
//! # Data Flow
//! ```text
//! buffered upload body
//!     → sniff.rs (size ceiling, magic bytes, header dimensions)
//!     → storage.rs (write under a generated filename)
//!     → catalog.rs (record chat media for later retrieval)
//! ```

pub mod catalog;
pub mod sniff;
pub mod storage;

pub use catalog::{CatalogError, MediaCatalog, MediaRecord, MemoryMediaCatalog};
pub use sniff::{detect_format, sniff, Dimensions, ImageFormat, MediaError, SniffedMedia};
pub use storage::{MediaKind, MediaStorage};
