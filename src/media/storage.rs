//! On-disk persistence of accepted uploads.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::media::sniff::ImageFormat;

/// Longest original filename kept for display.
const MAX_ORIGINAL_NAME_CHARS: usize = 120;

/// Longest stored filename accepted when reading back.
const MAX_FILENAME_CHARS: usize = 128;

/// Upload category; each gets its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    ProfileImage,
    ChatMedia,
}

impl MediaKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            MediaKind::ProfileImage => "profile-images",
            MediaKind::ChatMedia => "chat-media",
        }
    }

    /// Metric label.
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::ProfileImage => "profile_image",
            MediaKind::ChatMedia => "chat_media",
        }
    }
}

/// Writes and reads upload files under a base directory.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    base_dir: PathBuf,
}

impl MediaStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn dir(&self, kind: MediaKind) -> PathBuf {
        self.base_dir.join(kind.dir_name())
    }

    /// Path of a stored file, or `None` when the name could escape the directory.
    pub fn path(&self, kind: MediaKind, filename: &str) -> Option<PathBuf> {
        is_safe_filename(filename).then(|| self.dir(kind).join(filename))
    }

    /// Write `bytes` under a freshly generated name and return that name.
    pub async fn save(
        &self,
        kind: MediaKind,
        format: ImageFormat,
        bytes: &[u8],
    ) -> std::io::Result<String> {
        let dir = self.dir(kind);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = generate_filename(format);
        tokio::fs::write(dir.join(&filename), bytes).await?;
        tracing::debug!(kind = kind.dir_name(), filename = %filename, size = bytes.len(), "Stored upload");
        Ok(filename)
    }

    pub async fn read(&self, kind: MediaKind, filename: &str) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.checked_path(kind, filename)?).await
    }

    pub async fn metadata(&self, kind: MediaKind, filename: &str) -> std::io::Result<std::fs::Metadata> {
        tokio::fs::metadata(self.checked_path(kind, filename)?).await
    }

    pub async fn remove(&self, kind: MediaKind, filename: &str) -> std::io::Result<()> {
        tokio::fs::remove_file(self.checked_path(kind, filename)?).await
    }

    fn checked_path(&self, kind: MediaKind, filename: &str) -> std::io::Result<PathBuf> {
        self.path(kind, filename).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "unsafe upload filename")
        })
    }
}

/// `{unix_millis}-{16 hex}.{ext}`
pub fn generate_filename(format: ImageFormat) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let mut suffix = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!("{millis}-{}.{}", hex::encode(suffix), format.extension())
}

/// Matches `^[a-zA-Z0-9][a-zA-Z0-9._-]{0,127}$`.
pub fn is_safe_filename(filename: &str) -> bool {
    let mut chars = filename.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && filename.len() <= MAX_FILENAME_CHARS
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Reduce a client-supplied filename to something safe to display.
pub fn sanitize_original_name(raw: &str) -> Option<String> {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let replaced: String = basename
        .chars()
        .filter(|c| matches!(c, ' '..='~'))
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ' ' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_ORIGINAL_NAME_CHARS).collect();
    let trimmed = truncated.trim_end();

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Public URL of a stored profile image.
pub fn profile_image_public_path(filename: &str) -> String {
    format!("/uploads/profile-images/{filename}")
}

/// Inverse of [`profile_image_public_path`] for safe names.
pub fn profile_image_filename(public_path: &str) -> Option<&str> {
    public_path
        .strip_prefix("/uploads/profile-images/")
        .filter(|name| is_safe_filename(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_filenames_are_safe_and_unique() {
        let a = generate_filename(ImageFormat::Webp);
        let b = generate_filename(ImageFormat::Webp);
        assert_ne!(a, b);
        assert!(a.ends_with(".webp"));
        assert!(is_safe_filename(&a));
        let (_, suffix) = a.trim_end_matches(".webp").split_once('-').unwrap();
        assert_eq!(suffix.len(), 16);
    }

    #[test]
    fn test_safe_filename_rules() {
        assert!(is_safe_filename("1700000000000-abcdef.png"));
        assert!(is_safe_filename("a"));
        assert!(!is_safe_filename(""));
        assert!(!is_safe_filename(".hidden"));
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("dir/file.png"));
        assert!(!is_safe_filename(&"a".repeat(129)));
        assert!(is_safe_filename(&"a".repeat(128)));
    }

    #[test]
    fn test_sanitize_original_name() {
        assert_eq!(
            sanitize_original_name("C:\\Users\\me\\My  Photo (1).png").as_deref(),
            Some("My Photo _1_.png")
        );
        assert_eq!(sanitize_original_name("/tmp/caf\u{e9}.gif").as_deref(), Some("caf.gif"));
        assert_eq!(sanitize_original_name("dir/"), None);
        assert_eq!(sanitize_original_name("   "), None);
        assert_eq!(sanitize_original_name(&"x".repeat(200)).map(|s| s.len()), Some(120));
    }

    #[test]
    fn test_profile_image_paths() {
        let url = profile_image_public_path("1-ab.png");
        assert_eq!(url, "/uploads/profile-images/1-ab.png");
        assert_eq!(profile_image_filename(&url), Some("1-ab.png"));
        assert_eq!(profile_image_filename("/uploads/profile-images/../x"), None);
        assert_eq!(profile_image_filename("https://evil.example/a.png"), None);
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path());

        let name = storage
            .save(MediaKind::ChatMedia, ImageFormat::Gif, b"GIF89a")
            .await
            .unwrap();
        assert!(dir.path().join("chat-media").join(&name).exists());
        assert_eq!(storage.read(MediaKind::ChatMedia, &name).await.unwrap(), b"GIF89a");
        assert!(storage.read(MediaKind::ProfileImage, &name).await.is_err());

        storage.remove(MediaKind::ChatMedia, &name).await.unwrap();
        assert!(storage.read(MediaKind::ChatMedia, &name).await.is_err());
    }

    #[tokio::test]
    async fn test_unsafe_name_is_not_found() {
        let storage = MediaStorage::new("/tmp");
        let err = storage.read(MediaKind::ChatMedia, "../secret").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
