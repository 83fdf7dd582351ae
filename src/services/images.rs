use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::body::Bytes;
use image::{DynamicImage, ImageFormat};
use tokio::{fs, task};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::error::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
/// Route the upload directory is served under, relative to the public base URL.
pub const STATIC_IMAGES_ROUTE: &str = "static/images/";

const INCOMPATIBLE_FORMAT: &str = "Fotos com formatos incompatíveis";
const INVALID_IMAGE: &str = "Fotos com conteúdo de imagem inválido";

/// A photo as received from the client, before it touches the disk.
#[derive(Debug, Clone)]
pub struct UploadedPhoto {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Stores uploaded photos under a single local directory.
#[derive(Clone)]
pub struct ImageStore {
    root: Arc<PathBuf>,
}

impl ImageStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root()).await?;
        Ok(())
    }

    /// Validates, renames and writes a batch of photos.
    ///
    /// Returns the generated filenames in input order. Every extension is
    /// checked before anything is written, and if a later photo fails to
    /// decode or save, the files already written for this batch are removed
    /// again, so a failed batch leaves nothing behind.
    pub async fn ingest(&self, photos: Vec<UploadedPhoto>) -> Result<Vec<String>, AppError> {
        let mut planned = Vec::with_capacity(photos.len());
        for (index, photo) in photos.into_iter().enumerate() {
            let Some(extension) = allowed_extension(&photo.file_name) else {
                warn!(
                    "rejecting photo #{} '{}': {INCOMPATIBLE_FORMAT}",
                    index + 1,
                    photo.file_name
                );
                return Err(AppError::Validation(INCOMPATIBLE_FORMAT.into()));
            };
            let filename = generate_filename(&extension);
            debug!(
                "photo #{} '{}' ({} bytes) will be stored as {filename}",
                index + 1,
                sanitize_filename(&photo.file_name),
                photo.bytes.len()
            );
            planned.push((filename, photo.bytes));
        }

        let mut written: Vec<String> = Vec::with_capacity(planned.len());
        for (filename, bytes) in planned {
            let path = self.root().join(&filename);
            if let Err(err) = store_image(path, bytes).await {
                warn!("storing photo {filename} failed, discarding batch: {err}");
                self.remove(&written).await;
                return Err(err);
            }
            written.push(filename);
        }

        Ok(written)
    }

    /// Deletes stored photos. Missing files are ignored, other failures are logged.
    pub async fn remove(&self, filenames: &[String]) {
        for filename in filenames {
            let path = self.root().join(filename);
            match fs::remove_file(&path).await {
                Ok(()) => debug!("removed photo {filename}"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!("could not remove photo {}: {err}", path.display()),
            }
        }
    }
}

/// Absolute URL of a stored photo under `base`.
pub fn public_url(base: &Url, filename: &str) -> Result<Url, AppError> {
    base.join(&format!("{STATIC_IMAGES_ROUTE}{filename}"))
        .map_err(|err| AppError::Other(err.into()))
}

/// Reduces a client-supplied filename to a safe single path component.
pub fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = last_component(raw)
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Lowercased extension of the uploaded name, if it is an accepted image type.
///
/// Only the last path component counts; the stem may hold any characters.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let last = last_component(file_name);
    let (_, extension) = last.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

fn last_component(raw: &str) -> &str {
    raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw)
}

fn generate_filename(extension: &str) -> String {
    format!("{}.{extension}", Uuid::new_v4())
}

async fn store_image(path: PathBuf, bytes: Bytes) -> Result<(), AppError> {
    task::spawn_blocking(move || {
        let decoded = image::load_from_memory(&bytes).map_err(|err| {
            debug!("photo content did not decode: {err}");
            AppError::Validation(INVALID_IMAGE.into())
        })?;
        let format = ImageFormat::from_path(&path).map_err(|err| AppError::Other(err.into()))?;
        // JPEG has no alpha channel.
        let normalized = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(decoded.to_rgb8()),
            _ => decoded,
        };
        normalized
            .save_with_format(&path, format)
            .map_err(|err| AppError::Other(err.into()))
    })
    .await
    .map_err(|err| AppError::Other(err.into()))?
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageOutputFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;

    fn png_bytes() -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 30, 30])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    fn photo(name: &str, bytes: Bytes) -> UploadedPhoto {
        UploadedPhoto {
            file_name: name.to_string(),
            bytes,
        }
    }

    fn stored_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\fotos\\praia.JPG"), "praia.JPG");
        assert_eq!(sanitize_filename("my trip (1).png"), "my_trip_1.png");
        assert_eq!(sanitize_filename("..png"), "png");
    }

    #[test]
    fn only_image_extensions_are_allowed() {
        assert_eq!(allowed_extension("a.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("a.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("a.gif"), None);
        assert_eq!(allowed_extension("noextension"), None);
        assert_eq!(allowed_extension("fotos.png/notes"), None);
    }

    #[test]
    fn non_ascii_stems_keep_their_extension() {
        assert_eq!(allowed_extension("写真.png").as_deref(), Some("png"));
        assert_eq!(allowed_extension("фото.JPG").as_deref(), Some("jpg"));
        assert_eq!(allowed_extension("viagens/férias.jpeg").as_deref(), Some("jpeg"));
    }

    #[test]
    fn public_url_is_rooted_at_static_images() {
        let base = Url::parse("http://localhost:5000/").unwrap();
        let url = public_url(&base, "abc.png").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/static/images/abc.png");
    }

    #[tokio::test]
    async fn bad_extension_fails_whole_batch_without_writes() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());

        let err = store
            .ingest(vec![
                photo("ok.png", png_bytes()),
                photo("ok2.png", png_bytes()),
                photo("notes.txt", Bytes::from_static(b"hello")),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn identical_names_never_collide() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());

        let names = store
            .ingest(vec![
                photo("beach.png", png_bytes()),
                photo("beach.png", png_bytes()),
            ])
            .await
            .unwrap();

        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
        assert!(names.iter().all(|n| n.ends_with(".png")));
        assert_eq!(stored_files(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn undecodable_content_rolls_back_earlier_files() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());

        let err = store
            .ingest(vec![
                photo("first.png", png_bytes()),
                photo("fake.jpg", Bytes::from_static(b"definitely not a jpeg")),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn content_is_reencoded_to_the_named_format() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());

        let names = store
            .ingest(vec![photo("really_a_png.JPG", png_bytes())])
            .await
            .unwrap();

        assert!(names[0].ends_with(".jpg"));
        let stored = std::fs::read(dir.path().join(&names[0])).unwrap();
        assert_eq!(&stored[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn non_ascii_names_are_stored_under_generated_names() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());

        let names = store
            .ingest(vec![photo("写真.png", png_bytes())])
            .await
            .unwrap();

        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".png"));
        assert!(names[0].is_ascii());
        assert_eq!(stored_files(dir.path()), names);
    }

    #[tokio::test]
    async fn remove_ignores_missing_files() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());
        let names = store
            .ingest(vec![photo("a.png", png_bytes())])
            .await
            .unwrap();

        store
            .remove(&[names[0].clone(), "missing.png".to_string()])
            .await;

        assert!(stored_files(dir.path()).is_empty());
    }
}
