use crate::error::{BoothError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// MIME types offered by the file picker. Intake itself accepts any `image/*`.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

static MIME_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r":(.*?);").ok());

/// Where the bytes of a [`SourceFile`] live.
#[derive(Debug, Clone)]
pub enum FileOrigin {
    Path(PathBuf),
    Memory(Arc<Vec<u8>>),
}

/// A file picked by the user, before any conversion.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: String,
    pub origin: FileOrigin,
}

impl SourceFile {
    /// Stats a file on disk. The declared content type comes from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| BoothError::FileReadError {
                name: name.clone(),
                message: e.to_string(),
            })?;
        if !metadata.is_file() {
            return Err(BoothError::FileReadError {
                name,
                message: "not a regular file".into(),
            });
        }

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Self {
            content_type: mime_for_path(path).to_string(),
            name,
            size: metadata.len(),
            last_modified,
            origin: FileOrigin::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            last_modified: Utc::now(),
            content_type: content_type.into(),
            origin: FileOrigin::Memory(Arc::new(bytes)),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_accepted_type(&self) -> bool {
        ACCEPTED_MIME_TYPES.contains(&self.content_type.as_str())
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// A `data:<mime>;base64,<payload>` string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub payload: String,
}

impl DataUrl {
    pub fn compose(mime_type: &str, payload: &str) -> String {
        format!("data:{};base64,{}", mime_type, payload)
    }

    /// Splits at the first comma and pulls the MIME type out of the header.
    pub fn parse(url: &str) -> Result<Self> {
        let (header, payload) = url.split_once(',').ok_or_else(|| {
            BoothError::InvalidEncodingResult("data URL has no payload separator".into())
        })?;

        let mime_type = MIME_PATTERN
            .as_ref()
            .and_then(|pattern| pattern.captures(header))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                BoothError::InvalidEncodingResult(format!(
                    "no MIME type in data URL header '{}'",
                    header
                ))
            })?;

        if payload.is_empty() {
            return Err(BoothError::InvalidEncodingResult(
                "data URL payload is empty".into(),
            ));
        }

        Ok(Self {
            mime_type,
            payload: payload.to_string(),
        })
    }

    pub fn to_url(&self) -> String {
        Self::compose(&self.mime_type, &self.payload)
    }
}

/// A converted upload. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedImageRecord {
    id: String,
    #[serde(skip)]
    source: SourceFile,
    data_url: String,
    base64_payload: String,
    mime_type: String,
}

impl UploadedImageRecord {
    /// Builds a record from a file and the data URL its reader produced.
    pub fn from_data_url(source: SourceFile, data_url: String) -> Result<Self> {
        let parsed = DataUrl::parse(&data_url)?;
        let id = format!(
            "{}-{}-{}",
            source.name,
            source.last_modified.timestamp_millis(),
            Uuid::new_v4()
        );

        Ok(Self {
            id,
            source,
            data_url,
            base64_payload: parsed.payload,
            mime_type: parsed.mime_type,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn base64_payload(&self) -> &str {
        &self.base64_payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.base64_payload)
            .map_err(|e| BoothError::InvalidEncodingResult(e.to_string()))
    }
}
