//! Source image loading.
//!
//! Decodes uploaded bytes or data URIs into a premultiplied
//! [`tiny_skia::Pixmap`] the renderer can draw directly.

use snap_core::{ImageRef, PixelRect};
use tiny_skia::{IntRect, IntSize, Pixmap};

use crate::error::{RenderError, RenderResult};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// GIF (first frame only).
    Gif,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            "image/gif" => Self::Gif,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // GIF87a / GIF89a
        if data.starts_with(b"GIF8") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }

    /// MIME type, if known.
    #[must_use]
    pub const fn mime(self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::WebP => Some("image/webp"),
            Self::Gif => Some("image/gif"),
            Self::Unknown => None,
        }
    }
}

/// Payload of a base64 `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// Declared media type, if the URI names one.
    pub mime: Option<String>,
    /// Decoded payload bytes.
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Whether `input` uses the `data:` scheme.
    #[must_use]
    pub fn is_data_uri(input: &str) -> bool {
        input.starts_with("data:")
    }

    /// Parse `data:<mime>;base64,<payload>`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Decode`] if the scheme, comma or base64 marker
    /// is missing, or the payload is not valid base64.
    pub fn parse(uri: &str) -> RenderResult<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| RenderError::Decode("Not a data URI".to_string()))?;
        let (metadata, encoded) = rest
            .split_once(',')
            .ok_or_else(|| RenderError::Decode("Invalid data URI: missing comma".to_string()))?;
        let mut params = metadata.split(';');
        let mime = params
            .next()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(RenderError::Decode(
                "Only base64 data URIs are supported".to_string(),
            ));
        }

        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| RenderError::Decode(format!("Failed to decode base64: {e}")))?;
        Ok(Self { mime, bytes })
    }
}

/// A decoded source image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixmap: Pixmap,
    format: ImageFormat,
}

impl SourceImage {
    /// Decode an image from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Decode`] if the bytes are not a supported image.
    pub fn decode(data: &[u8]) -> RenderResult<Self> {
        let format = ImageFormat::from_magic_bytes(data);
        let img = image::load_from_memory(data)
            .map_err(|e| RenderError::Decode(e.to_string()))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut source = Self::from_rgba(width, height, rgba.into_raw())?;
        source.format = format;
        tracing::debug!(width, height, ?format, "Decoded source image");
        Ok(source)
    }

    /// Decode an image from a base64 data URI such as
    /// `data:image/png;base64,iVBORw0KGgo...`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is malformed or the payload is not an image.
    pub fn from_data_uri(uri: &str) -> RenderResult<Self> {
        Self::decode(&DataUri::parse(uri)?.bytes)
    }

    /// Wrap straight (non-premultiplied) RGBA pixels.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidImage`] if the buffer length does not
    /// match `width * height * 4` or a dimension is zero.
    pub fn from_rgba(width: u32, height: u32, mut rgba: Vec<u8>) -> RenderResult<Self> {
        let size = IntSize::from_wh(width, height)
            .ok_or_else(|| RenderError::InvalidImage(format!("{width}x{height}")))?;
        premultiply_rgba_in_place(&mut rgba);
        let pixmap = Pixmap::from_vec(rgba, size).ok_or_else(|| {
            RenderError::InvalidImage(format!("buffer does not match {width}x{height}"))
        })?;
        Ok(Self {
            pixmap,
            format: ImageFormat::Unknown,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Detected input format.
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// The premultiplied pixels.
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// The reference stored in the editor document when this image is loaded.
    #[must_use]
    pub fn image_ref(&self) -> ImageRef {
        ImageRef::new(self.width(), self.height())
    }

    /// Copy out the region selected by a committed crop.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidImage`] if `rect` lies outside the image.
    pub fn region(&self, rect: PixelRect) -> RenderResult<Pixmap> {
        let outside = || {
            RenderError::InvalidImage(format!(
                "crop {}x{}+{}+{} outside {}x{}",
                rect.width,
                rect.height,
                rect.x,
                rect.y,
                self.width(),
                self.height()
            ))
        };
        if rect.x.saturating_add(rect.width) > self.width()
            || rect.y.saturating_add(rect.height) > self.height()
        {
            return Err(outside());
        }
        let x = i32::try_from(rect.x).map_err(|_| outside())?;
        let y = i32::try_from(rect.y).map_err(|_| outside())?;
        let int_rect = IntRect::from_xywh(x, y, rect.width, rect.height).ok_or_else(outside)?;
        self.pixmap.clone_rect(int_rect).ok_or_else(outside)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn premultiply_rgba_in_place(bytes: &mut [u8]) {
    for pixel in bytes.chunks_exact_mut(4) {
        let alpha = u16::from(pixel[3]);
        if alpha == 255 {
            continue;
        }
        pixel[0] = ((u16::from(pixel[0]) * alpha + 127) / 255) as u8;
        pixel[1] = ((u16::from(pixel[1]) * alpha + 127) / 255) as u8;
        pixel[2] = ((u16::from(pixel[2]) * alpha + 127) / 255) as u8;
    }
}
