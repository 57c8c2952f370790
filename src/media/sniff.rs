//! Image format detection and header parsing.
//!
//! # Responsibilities
//! - Identify JPEG, PNG, WEBP and GIF from magic bytes alone
//! - Extract pixel dimensions from each format's header
//! - Enforce a size ceiling before anything is persisted
//!
//! # Design Decisions
//! - Client-supplied content types and extensions are never consulted
//! - Dimension parsing is best effort: truncated or inconsistent headers
//!   yield `None`, and the upload is still accepted
//! - Pure functions over the input slice; no shared state

use serde::{Deserialize, Serialize};

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const VP8_START_CODE: [u8; 3] = [0x9D, 0x01, 0x2A];
const VP8L_SIGNATURE: u8 = 0x2F;

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    Webp,
    #[serde(rename = "image/gif")]
    Gif,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 4] = [
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Webp,
        ImageFormat::Gif,
    ];

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.mime_type() == mime)
    }

    /// Guess from a stored filename's extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            "gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Pixel size read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    fn non_zero(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }
}

/// Result of sniffing an accepted buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedMedia {
    pub format: ImageFormat,
    pub size_bytes: usize,
    pub dimensions: Option<Dimensions>,
}

impl SniffedMedia {
    pub fn content_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn width(&self) -> Option<u32> {
        self.dimensions.map(|d| d.width)
    }

    pub fn height(&self) -> Option<u32> {
        self.dimensions.map(|d| d.height)
    }
}

/// Why a buffer was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Uploaded media file cannot be empty.")]
    Empty,

    #[error("Media file is too large. Maximum allowed size is {max_bytes} bytes.")]
    TooLarge { size: usize, max_bytes: usize },

    #[error("Only JPEG, PNG, WEBP, and GIF files are supported.")]
    UnrecognizedFormat,
}

/// Validate and classify an uploaded buffer.
pub fn sniff(bytes: &[u8], max_bytes: usize) -> Result<SniffedMedia, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            max_bytes,
        });
    }
    let format = detect_format(bytes).ok_or(MediaError::UnrecognizedFormat)?;

    Ok(SniffedMedia {
        format,
        size_bytes: bytes.len(),
        dimensions: dimensions(bytes, format),
    })
}

/// Identify the format from leading magic bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&JPEG_MAGIC) {
        Some(ImageFormat::Jpeg)
    } else if bytes.starts_with(&PNG_MAGIC) {
        Some(ImageFormat::Png)
    } else if bytes.get(0..4) == Some(&b"RIFF"[..]) && bytes.get(8..12) == Some(&b"WEBP"[..]) {
        Some(ImageFormat::Webp)
    } else if matches!(bytes.get(0..6), Some(b"GIF87a") | Some(b"GIF89a")) {
        Some(ImageFormat::Gif)
    } else {
        None
    }
}

/// Read pixel dimensions from the header of an already-detected format.
pub fn dimensions(bytes: &[u8], format: ImageFormat) -> Option<Dimensions> {
    match format {
        ImageFormat::Png => png_dimensions(bytes),
        ImageFormat::Gif => gif_dimensions(bytes),
        ImageFormat::Jpeg => jpeg_dimensions(bytes),
        ImageFormat::Webp => webp_dimensions(bytes),
    }
}

fn png_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    // Signature (8), IHDR length (4), "IHDR" (4), width (4), height (4).
    if bytes.get(12..16) != Some(&b"IHDR"[..]) {
        return None;
    }
    Dimensions::non_zero(be_u32(bytes, 16)?, be_u32(bytes, 20)?)
}

fn gif_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    Dimensions::non_zero(le_u16(bytes, 6)?.into(), le_u16(bytes, 8)?.into())
}

fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

/// Markers that carry no length field.
fn is_standalone(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD8)
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let len = bytes.len();
    let mut offset = 2;

    while offset + 9 <= len {
        if bytes[offset] != 0xFF {
            offset += 1;
            continue;
        }

        let mut marker = bytes[offset + 1];
        offset += 2;
        // Fill bytes: any run of 0xFF before the marker code.
        while marker == 0xFF && offset < len {
            marker = bytes[offset];
            offset += 1;
        }

        if is_standalone(marker) {
            continue;
        }
        if marker == 0xD9 || marker == 0xDA {
            return None;
        }

        let segment_len = usize::from(be_u16(bytes, offset)?);
        if segment_len < 2 || offset + segment_len > len {
            return None;
        }

        // Segment layout after the length: precision (1), height (2), width (2).
        if is_start_of_frame(marker) && segment_len >= 7 {
            let height = be_u16(bytes, offset + 3)?;
            let width = be_u16(bytes, offset + 5)?;
            if let Some(dims) = Dimensions::non_zero(width.into(), height.into()) {
                return Some(dims);
            }
        }

        offset += segment_len;
    }

    None
}

fn webp_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    match bytes.get(12..16)? {
        b"VP8X" => {
            let width = le_u24(bytes, 24)? + 1;
            let height = le_u24(bytes, 27)? + 1;
            Dimensions::non_zero(width, height)
        }
        b"VP8 " => {
            // Frame tag (3) at 20, then the start code, then 14-bit sizes.
            if bytes.get(23..26)? != &VP8_START_CODE[..] {
                return None;
            }
            let width = le_u16(bytes, 26)? & 0x3FFF;
            let height = le_u16(bytes, 28)? & 0x3FFF;
            Dimensions::non_zero(width.into(), height.into())
        }
        b"VP8L" => {
            if *bytes.get(20)? != VP8L_SIGNATURE {
                return None;
            }
            let b: [u8; 4] = bytes.get(21..25)?.try_into().ok()?;
            let (b1, b2, b3, b4) = (u32::from(b[0]), u32::from(b[1]), u32::from(b[2]), u32::from(b[3]));
            let width = 1 + (b1 | ((b2 & 0x3F) << 8));
            let height = 1 + ((b2 >> 6) | (b3 << 2) | ((b4 & 0x0F) << 10));
            Dimensions::non_zero(width, height)
        }
        _ => None,
    }
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn le_u24(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 3)?;
    Some(u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16)
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A complete 2x2 RGB PNG.
    pub const PNG_2X2: [u8; 73] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
        0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x08, 0x02, 0x00, 0x00, 0x00, 0xFD, 0xD4, 0x9A,
        0x73, 0x00, 0x00, 0x00, 0x10, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8, 0xCF, 0xC0, 0x00,
        0x44, 0x0C, 0x10, 0x0A, 0x00, 0x1F, 0xEE, 0x03, 0xFD, 0x8B, 0x5F, 0x14, 0xD4, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    /// GIF89a header with a 3x5 logical screen.
    pub const GIF_3X5: [u8; 14] = [
        b'G', b'I', b'F', b'8', b'9', b'a', 0x03, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x3B,
    ];

    /// JFIF APP0, baseline SOF0 for 640x480, EOI.
    pub const JPEG_640X480: [u8; 43] = [
        0xFF, 0xD8, // SOI
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x00, // APP0
        0xFF, 0xC0, 0x00, 0x11, 0x08, 0x01, 0xE0, 0x02, 0x80, 0x03, 0x01, 0x22, 0x00, 0x02, 0x11,
        0x01, 0x03, 0x11, 0x01, // SOF0
        0xFF, 0xD9, // EOI
        0x00, 0x00,
    ];

    /// Extended WEBP (VP8X) canvas of 1024x768.
    pub const WEBP_VP8X_1024X768: [u8; 30] = [
        b'R', b'I', b'F', b'F', 0x16, 0x00, 0x00, 0x00, b'W', b'E', b'B', b'P', b'V', b'P', b'8',
        b'X', 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x03, 0x00, 0xFF, 0x02, 0x00,
    ];

    /// Lossy WEBP (VP8) frame header of 400x300.
    pub const WEBP_VP8_400X300: [u8; 30] = [
        b'R', b'I', b'F', b'F', 0x16, 0x00, 0x00, 0x00, b'W', b'E', b'B', b'P', b'V', b'P', b'8',
        b' ', 0x0A, 0x00, 0x00, 0x00, 0x30, 0x01, 0x00, 0x9D, 0x01, 0x2A, 0x90, 0x01, 0x2C, 0x01,
    ];

    /// Lossless WEBP (VP8L) header of 128x64.
    pub const WEBP_VP8L_128X64: [u8; 25] = [
        b'R', b'I', b'F', b'F', 0x11, 0x00, 0x00, 0x00, b'W', b'E', b'B', b'P', b'V', b'P', b'8',
        b'L', 0x05, 0x00, 0x00, 0x00, 0x2F, 0x7F, 0xC0, 0x0F, 0x00,
    ];
}
