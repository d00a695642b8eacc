//! Image payload validation and thumbnail derivation.
//!
//! Everything here is CPU-only. The versioned store runs it to completion
//! before it touches the network, so a rejected payload never produces a
//! storage call.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::{AssetError, AssetResult, ImageRules};

/// An uploaded image as received from the caller. Owned by the request
/// and dropped with it.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Bytes,
    /// Content type claimed by the client, if any
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

impl RawImage {
    pub fn new<B: Into<Bytes>>(bytes: B) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
            filename: None,
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// What validation learned about a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Payload check run before any upload
pub trait ImageValidator: Send + Sync {
    fn validate(&self, raw: &RawImage) -> AssetResult<ImageInfo>;
}

/// Validator enforcing [`ImageRules`]: size, sniffed format, declared
/// content type, dimensions.
#[derive(Debug, Clone, Default)]
pub struct RulesValidator {
    rules: ImageRules,
}

impl RulesValidator {
    pub fn new(rules: ImageRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ImageRules {
        &self.rules
    }
}

fn normalize_mime(content_type: &str) -> String {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

impl ImageValidator for RulesValidator {
    fn validate(&self, raw: &RawImage) -> AssetResult<ImageInfo> {
        if raw.bytes.is_empty() {
            return Err(AssetError::invalid_image("image payload is empty"));
        }
        if raw.bytes.len() as u64 > self.rules.max_bytes {
            return Err(AssetError::invalid_image(format!(
                "image size {} exceeds maximum {}",
                raw.bytes.len(),
                self.rules.max_bytes
            )));
        }

        let format = image::guess_format(&raw.bytes)
            .map_err(|_| AssetError::invalid_image("unrecognized image format"))?;
        let content_type = format.to_mime_type();
        if !self.rules.allows(content_type) {
            return Err(AssetError::invalid_image(format!(
                "content type {content_type} is not allowed"
            )));
        }

        if let Some(declared) = raw.content_type.as_deref() {
            let declared = normalize_mime(declared);
            if declared != content_type && declared != "application/octet-stream" {
                return Err(AssetError::invalid_image(format!(
                    "declared content type {declared} does not match {content_type}"
                )));
            }
        }

        let (width, height) = ImageReader::with_format(Cursor::new(&raw.bytes[..]), format)
            .into_dimensions()
            .map_err(|e| AssetError::invalid_image(format!("unreadable image header: {e}")))?;
        if width == 0 || height == 0 {
            return Err(AssetError::invalid_image("image has no pixels"));
        }
        if width > self.rules.max_width || height > self.rules.max_height {
            return Err(AssetError::invalid_image(format!(
                "image dimensions {width}x{height} exceed {}x{}",
                self.rules.max_width, self.rules.max_height
            )));
        }

        Ok(ImageInfo {
            format,
            content_type,
            width,
            height,
        })
    }
}

/// Derives the thumbnail rendition. Same algorithm for every entity class:
/// exact resize to a square of `size` pixels, re-encoded in the source
/// format.
#[derive(Debug, Clone, Copy)]
pub struct Thumbnailer {
    size: u32,
}

impl Thumbnailer {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn derive(&self, original: &[u8], info: &ImageInfo) -> AssetResult<Bytes> {
        let decoded = image::load_from_memory_with_format(original, info.format)
            .map_err(|e| AssetError::invalid_image(format!("cannot decode image: {e}")))?;
        let resized = decoded.resize_exact(self.size, self.size, FilterType::Triangle);

        // JPEG has no alpha channel
        let encodable = match info.format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => resized,
        };

        let mut out = Cursor::new(Vec::new());
        encodable
            .write_to(&mut out, info.format)
            .map_err(|e| AssetError::invalid_image(format!("cannot encode thumbnail: {e}")))?;
        Ok(Bytes::from(out.into_inner()))
    }
}

impl Default for Thumbnailer {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use image::{Rgb, RgbImage};

    pub fn encoded(width: u32, height: u32, format: ImageFormat) -> Bytes {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, format)
            .expect("encode fixture");
        Bytes::from(out.into_inner())
    }

    pub fn png(width: u32, height: u32) -> Bytes {
        encoded(width, height, ImageFormat::Png)
    }
}
