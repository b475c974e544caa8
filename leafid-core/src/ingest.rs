//! Image ingestion.
//!
//! Turns a user-supplied photo (picked from disk or dropped as raw bytes)
//! into a [`StagedImage`]: the retained payload for upload plus a base64
//! data URI for previews and as the fallback stored form.
//!
//! Only JPEG and PNG are accepted. The declared content type is checked
//! first, then the magic bytes and image header are inspected so a renamed
//! text file never reaches the identification service.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{ImageFormat, ImageReader};
use tracing::{debug, instrument};

use crate::error::{LeafError, Result, DEFAULT_MAX_IMAGE_BYTES};

/// Content types accepted from a picker or drop event.
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// A photo as handed over by the user, not yet validated.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Original file name, used to derive the storage key
    pub file_name: String,
    /// Content-Type declared by the source (if any)
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Read an image selected from the filesystem.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        Ok(Self {
            content_type: content_type_for_extension(path).map(str::to_string),
            file_name,
            data,
        })
    }

    /// Wrap a payload received from a drag-and-drop event.
    pub fn dropped(
        file_name: impl Into<String>,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            data,
        }
    }
}

/// A validated image ready for identification.
#[derive(Clone)]
pub struct StagedImage {
    file_name: String,
    mime_type: &'static str,
    width: u32,
    height: u32,
    data: Vec<u8>,
    data_uri: String,
}

impl StagedImage {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw payload, suitable for upload.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// `data:<mime>;base64,...` rendition of the payload.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

impl std::fmt::Debug for StagedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Validates uploads and produces staged images.
#[derive(Debug, Clone)]
pub struct ImageIngest {
    max_bytes: usize,
}

impl Default for ImageIngest {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES)
    }
}

impl ImageIngest {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate an upload and encode its preview.
    ///
    /// Header inspection and base64 encoding run on the blocking pool so a
    /// large photo does not stall the executor.
    #[instrument(level = "debug", skip_all, fields(file = %upload.file_name, bytes = upload.data.len()))]
    pub async fn stage(&self, upload: ImageUpload) -> Result<StagedImage> {
        validate_content_type(upload.content_type.as_deref())?;
        validate_image_size(upload.data.len(), self.max_bytes)?;

        let staged = tokio::task::spawn_blocking(move || encode(upload))
            .await
            .map_err(|e| LeafError::InvalidImage(format!("preview encoding interrupted: {e}")))??;

        debug!(
            mime = staged.mime_type,
            width = staged.width,
            height = staged.height,
            "Image staged"
        );
        Ok(staged)
    }
}

fn encode(upload: ImageUpload) -> Result<StagedImage> {
    let (format, width, height) = inspect(&upload.data)?;
    let mime_type = mime_for_format(format)?;
    let data_uri = format!("data:{mime_type};base64,{}", BASE64.encode(&upload.data));

    Ok(StagedImage {
        file_name: upload.file_name,
        mime_type,
        width,
        height,
        data: upload.data,
        data_uri,
    })
}

/// Sniff the format from magic bytes and read the header dimensions.
fn inspect(data: &[u8]) -> Result<(ImageFormat, u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| LeafError::InvalidImage(format!("unreadable image: {e}")))?;

    let format = reader
        .format()
        .ok_or_else(|| LeafError::InvalidImage("unrecognized image format".into()))?;
    mime_for_format(format)?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| LeafError::InvalidImage(format!("corrupt image header: {e}")))?;

    if width == 0 || height == 0 {
        return Err(LeafError::InvalidImage("image has no pixels".into()));
    }

    Ok((format, width, height))
}

fn mime_for_format(format: ImageFormat) -> Result<&'static str> {
    match format {
        ImageFormat::Jpeg => Ok("image/jpeg"),
        ImageFormat::Png => Ok("image/png"),
        other => Err(LeafError::InvalidImage(format!(
            "unsupported format {other:?}; only JPEG and PNG are accepted"
        ))),
    }
}

fn content_type_for_extension(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        _ => None,
    }
}

/// Validate a declared content type. A missing type is left to sniffing.
pub fn validate_content_type(content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(ct) => {
            let essence = ct.split(';').next().unwrap_or("").trim().to_lowercase();
            if ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
                Ok(())
            } else {
                Err(LeafError::InvalidImage(format!(
                    "unsupported Content-Type '{ct}'; allowed: image/jpeg, image/png"
                )))
            }
        }
        None => Ok(()),
    }
}

pub fn validate_image_size(size: usize, max_size: usize) -> Result<()> {
    if size == 0 {
        Err(LeafError::InvalidImage("empty file".into()))
    } else if size > max_size {
        Err(LeafError::ImageTooLarge {
            size,
            max: max_size,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    pub fn encoded(format: ImageFormat, shade: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 6, Rgb([shade, 160, 60]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).expect("encode fixture");
        out.into_inner()
    }

    pub fn png() -> Vec<u8> {
        encoded(ImageFormat::Png, 40)
    }

    pub fn jpeg() -> Vec<u8> {
        encoded(ImageFormat::Jpeg, 40)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_type_accepts_jpeg_png() {
        assert!(validate_content_type(Some("image/jpeg")).is_ok());
        assert!(validate_content_type(Some("image/jpg")).is_ok());
        assert!(validate_content_type(Some("IMAGE/PNG")).is_ok());
        assert!(validate_content_type(Some("image/png; charset=binary")).is_ok());
        assert!(validate_content_type(None).is_ok());
    }

    #[test]
    fn test_validate_content_type_rejects_others() {
        assert!(validate_content_type(Some("image/gif")).is_err());
        assert!(validate_content_type(Some("text/html")).is_err());
        assert!(validate_content_type(Some("application/octet-stream")).is_err());
    }

    #[test]
    fn test_validate_image_size() {
        let max = 1024;
        assert!(validate_image_size(1, max).is_ok());
        assert!(validate_image_size(max, max).is_ok());
        assert!(matches!(
            validate_image_size(max + 1, max),
            Err(LeafError::ImageTooLarge { .. })
        ));
        assert!(matches!(
            validate_image_size(0, max),
            Err(LeafError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_png_produces_data_uri() {
        let ingest = ImageIngest::default();
        let upload = ImageUpload::dropped("leaf.png", fixtures::png(), Some("image/png".into()));

        let staged = ingest.stage(upload).await.unwrap();
        assert_eq!(staged.mime_type(), "image/png");
        assert_eq!(staged.dimensions(), (8, 6));
        assert!(staged.data_uri().starts_with("data:image/png;base64,"));
        assert_eq!(staged.file_name(), "leaf.png");
    }

    #[tokio::test]
    async fn test_stage_sniffs_jpeg_without_declared_type() {
        let ingest = ImageIngest::default();
        let upload = ImageUpload::dropped("leaf", fixtures::jpeg(), None);

        let staged = ingest.stage(upload).await.unwrap();
        assert_eq!(staged.mime_type(), "image/jpeg");
        assert!(staged.data_uri().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_stage_rejects_non_image_bytes() {
        let ingest = ImageIngest::default();
        let upload = ImageUpload::dropped("notes.jpg", b"just some text".to_vec(), None);
        assert!(matches!(
            ingest.stage(upload).await,
            Err(LeafError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_rejects_gif() {
        let ingest = ImageIngest::default();
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
        let upload = ImageUpload::dropped("anim.gif", gif, None);
        assert!(matches!(
            ingest.stage(upload).await,
            Err(LeafError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_enforces_size_bound() {
        let ingest = ImageIngest::new(16);
        let upload = ImageUpload::dropped("leaf.png", fixtures::png(), None);
        assert!(matches!(
            ingest.stage(upload).await,
            Err(LeafError::ImageTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_path_reads_file_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Leaf.JPG");
        std::fs::write(&path, fixtures::jpeg()).unwrap();

        let upload = ImageUpload::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name, "Leaf.JPG");
        assert_eq!(upload.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_from_path_missing_file_is_io_error() {
        let result = ImageUpload::from_path("/definitely/not/here.png").await;
        assert!(matches!(result, Err(LeafError::Io(_))));
    }
}
