// Image attachment storage. Posts only keep the relative path returned by `save`.
use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Subdirectory post images are written to.
const POSTS_DIR: &str = "posts";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid media path: {0}")]
    InvalidPath(String),

    #[error("Not a supported image")]
    UnsupportedImage,
}

/// Raster formats accepted for post images. Anything else, SVG included,
/// is refused whatever the client claims it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::WebP => Some(Self::Webp),
            _ => None,
        }
    }

    fn format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Gif => ImageFormat::Gif,
            Self::Webp => ImageFormat::WebP,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// An image received from a form, not yet stored. The client's file name and
/// content type are never trusted; the kind is read from the bytes.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub data: Bytes,
}

impl UploadedImage {
    /// Sniff the format from the magic bytes, then make sure the header
    /// actually decodes to a non-empty image of that format.
    pub fn detect(&self) -> Option<ImageKind> {
        let kind = image::guess_format(&self.data)
            .ok()
            .and_then(ImageKind::from_format)?;
        let (width, height) =
            image::io::Reader::with_format(Cursor::new(&self.data[..]), kind.format())
                .into_dimensions()
                .ok()?;
        (width > 0 && height > 0).then_some(kind)
    }

    pub fn is_image(&self) -> bool {
        self.detect().is_some()
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist an upload and return its path relative to the media root.
    async fn save(&self, image: &UploadedImage) -> Result<String, MediaError>;

    /// Read a stored file back. `Ok(None)` when it does not exist.
    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>, MediaError>;
}

pub type DynMediaStore = Arc<dyn MediaStore>;

/// Files on the local disk under `root`.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, MediaError> {
        let path = Path::new(relative);
        let safe = !relative.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(MediaError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, image: &UploadedImage) -> Result<String, MediaError> {
        let kind = image.detect().ok_or(MediaError::UnsupportedImage)?;
        let relative = format!(
            "{}/{}.{}",
            POSTS_DIR,
            uuid::Uuid::now_v7(),
            kind.extension()
        );
        let full = self.resolve(&relative)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &image.data).await?;
        tracing::debug!(
            "Stored image {:?} as {} ({} bytes)",
            image.file_name,
            relative,
            image.data.len()
        );
        Ok(relative)
    }

    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>, MediaError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
