use crate::config::FilterConfig;
use crate::core::http::FetchError;
use crate::core::urls::{file_name, path_extension};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;
use url::Url;

pub const RASTER_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff", "avif",
];

const DEFAULT_EXTENSION: &str = "jpg";

/// Filename fragments that mark logos, icons and similar site chrome.
const NON_PHOTO_HINTS: &[&str] = &[
    "logo", "icon", "favicon", "badge", "wordmark", "emblem", "avatar",
];

/// Why an image URL did not become a candidate. None of these abort a crawl.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("host is not in the image allowlist")]
    DisallowedHost,

    #[error("unsupported extension .{0}")]
    UnsupportedExtension(String),

    #[error("download failed: {0}")]
    Download(#[from] FetchError),

    #[error("undecodable image: {0}")]
    Undecodable(#[from] image::ImageError),

    #[error("vector image")]
    Vector,

    #[error("non-photographic asset name {0:?}")]
    NonPhotographic(String),

    #[error("{bytes} bytes is below the {min} byte floor")]
    TooFewBytes { bytes: usize, min: usize },

    #[error("longest side {side}px is below {min}px")]
    TooSmall { side: u32, min: u32 },
}

/// An image decoded from downloaded bytes.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: Option<ImageFormat>,
    pub width: u32,
    pub height: u32,
}

/// Cheap check before any download: a URL with an extension must name a
/// raster format or SVG.
pub fn prefilter(url: &Url) -> Result<(), Rejection> {
    match path_extension(url) {
        Some(ext) if ext != "svg" && !RASTER_EXTENSIONS.contains(&ext.as_str()) => {
            Err(Rejection::UnsupportedExtension(ext))
        }
        _ => Ok(()),
    }
}

/// True for SVG documents, whatever the URL says.
pub fn is_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head).to_ascii_lowercase();
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with('<') && text.contains("<svg")
}

pub fn decode(bytes: &[u8]) -> Result<DecodedImage, Rejection> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    let format = reader.format();
    let image = reader.decode()?;
    Ok(DecodedImage {
        width: image.width(),
        height: image.height(),
        image,
        format,
    })
}

/// Extension for the stored file: the URL's own raster extension when it
/// has one (`jpeg` becomes `jpg`), else the decoded format, else `jpg`.
pub fn choose_extension(url: &Url, format: Option<ImageFormat>) -> String {
    if let Some(ext) = path_extension(url) {
        if RASTER_EXTENSIONS.contains(&ext.as_str()) {
            return if ext == "jpeg" { "jpg".to_string() } else { ext };
        }
    }

    let from_format = match format {
        Some(ImageFormat::Jpeg) => Some("jpg"),
        Some(ImageFormat::Png) => Some("png"),
        Some(ImageFormat::WebP) => Some("webp"),
        Some(ImageFormat::Gif) => Some("gif"),
        Some(ImageFormat::Bmp) => Some("bmp"),
        Some(ImageFormat::Tiff) => Some("tiff"),
        Some(ImageFormat::Avif) => Some("avif"),
        Some(other) => other.extensions_str().first().copied(),
        None => None,
    };
    from_format.unwrap_or(DEFAULT_EXTENSION).to_string()
}

pub fn is_non_photographic(file_name: &str) -> bool {
    let lowered = file_name.to_ascii_lowercase();
    NON_PHOTO_HINTS.iter().any(|hint| lowered.contains(hint))
}

/// Quality gate applied after a successful decode.
pub struct ImageFilter {
    config: FilterConfig,
}

impl ImageFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// A `.svg` URL counts as vector even when the server sends raster bytes.
    pub fn check(&self, url: &Url, bytes: usize, width: u32, height: u32) -> Result<(), Rejection> {
        if path_extension(url).as_deref() == Some("svg") {
            return Err(Rejection::Vector);
        }

        let name = file_name(url);
        if is_non_photographic(name) {
            return Err(Rejection::NonPhotographic(name.to_string()));
        }

        if bytes < self.config.min_bytes {
            return Err(Rejection::TooFewBytes {
                bytes,
                min: self.config.min_bytes,
            });
        }

        let side = width.max(height);
        if side < self.config.min_longest_side {
            return Err(Rejection::TooSmall {
                side,
                min: self.config.min_longest_side,
            });
        }

        Ok(())
    }
}
