//! Multipart form handling for the workspace and project forms: text
//! fields, the optional `image` file, and storing accepted images.

use std::collections::HashMap;

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use planboard_shared::api::{validate_name, ValidationError};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::resource::Patch;
use crate::routes::AppState;
use crate::store::Upload;

const IMAGE_FIELD: &str = "image";
const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/jpg", "image/svg+xml"];
const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "svg"];

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Validation(e.body_text())
    }
}

/// What a form asks to do with a record's image.
#[derive(Debug)]
pub enum ImageField {
    /// No image field sent.
    Keep,
    /// Image field sent empty.
    Clear,
    /// A new file to store.
    Upload(Upload),
    /// An already-hosted image URL.
    Url(String),
}

#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        Upload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn required_name(&self, field: &'static str) -> Result<String, ValidationError> {
        validate_name(field, self.text(field).unwrap_or_default())
    }

    pub fn optional_name(&self, field: &'static str) -> Result<Option<String>, ValidationError> {
        self.text(field).map(|v| validate_name(field, v)).transpose()
    }

    pub fn required_id(&self, field: &'static str) -> Result<Uuid, ValidationError> {
        let value = self
            .text(field)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ValidationError::new(field, "Required"))?;
        Uuid::parse_str(value).map_err(|_| ValidationError::new(field, "Invalid identifier"))
    }

    /// Interprets the `image` field, checking uploads against the configured
    /// size limit and the accepted image types.
    pub fn image(&mut self, config: &Config) -> Result<ImageField, ValidationError> {
        if let Some(upload) = self.files.remove(IMAGE_FIELD) {
            validate_image(&upload, config.max_image_bytes)?;
            return Ok(ImageField::Upload(upload));
        }

        match self.text(IMAGE_FIELD).map(str::trim) {
            None => Ok(ImageField::Keep),
            Some("") => Ok(ImageField::Clear),
            Some(url) if is_image_url(url) => Ok(ImageField::Url(url.to_string())),
            Some(_) => Err(ValidationError::new(IMAGE_FIELD, "Expected an image file or URL")),
        }
    }
}

fn validate_image(upload: &Upload, max_bytes: usize) -> Result<(), ValidationError> {
    if upload.bytes.is_empty() {
        return Err(ValidationError::new(IMAGE_FIELD, "File is empty"));
    }
    if upload.bytes.len() > max_bytes {
        return Err(ValidationError::new(
            IMAGE_FIELD,
            format!("File must be at most {} bytes", max_bytes),
        ));
    }

    let content_type = upload.content_type.to_ascii_lowercase();
    let extension = upload
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let type_ok = ALLOWED_IMAGE_TYPES.contains(&content_type.as_str());
    let extension_ok = ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str());
    if !type_ok && !extension_ok {
        return Err(ValidationError::new(
            IMAGE_FIELD,
            "Only JPG, PNG, SVG or JPEG images are accepted",
        ));
    }
    Ok(())
}

fn is_image_url(url: &str) -> bool {
    url.starts_with("data:image/") || url.starts_with("https://") || url.starts_with("http://")
}

/// Stores an upload in the image bucket and returns a data URL of its preview.
pub async fn store_image(state: &AppState, upload: Upload) -> Result<String, AppError> {
    let bucket = &state.config.image_bucket;
    let file = state
        .files
        .create_file(bucket, Uuid::new_v4(), upload)
        .await?;
    tracing::debug!(file_id = %file.id, size = file.size, "Stored image");

    let preview = state.files.get_file_preview(bucket, file.id).await?;
    Ok(preview.to_data_url())
}

/// Resolves an image field to the URL a new record should carry.
pub async fn initial_image_url(
    state: &AppState,
    image: ImageField,
) -> Result<Option<String>, AppError> {
    match image {
        ImageField::Keep | ImageField::Clear => Ok(None),
        ImageField::Url(url) => Ok(Some(url)),
        ImageField::Upload(upload) => Ok(Some(store_image(state, upload).await?)),
    }
}

/// Records an image change in `patch`. Returns whether a file was stored.
pub async fn apply_image(
    state: &AppState,
    patch: &mut Patch,
    image: ImageField,
) -> Result<bool, AppError> {
    match image {
        ImageField::Keep => Ok(false),
        ImageField::Clear => {
            patch.clear("image_url");
            Ok(false)
        }
        ImageField::Url(url) => {
            patch.set("image_url", url.into());
            Ok(false)
        }
        ImageField::Upload(upload) => {
            let url = store_image(state, upload).await?;
            patch.set("image_url", url.into());
            Ok(true)
        }
    }
}

/// The file store and document store share no transaction, so a failed
/// document write after an upload leaves the file behind.
pub fn warn_orphaned_image(uploaded: bool, err: &AppError) {
    if uploaded {
        tracing::warn!("Image stored but record write failed, file is orphaned: {}", err);
    }
}
