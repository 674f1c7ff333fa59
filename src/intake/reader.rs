use crate::{
    error::{BoothError, Result},
    models::{DataUrl, FileOrigin, SourceFile},
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Turns a file into a `data:` URL string.
#[async_trait]
pub trait DataUrlReader: Send + Sync {
    async fn read_as_data_url(&self, file: &SourceFile) -> Result<String>;
}

/// Reads the whole file and base64-encodes it under its declared content type.
#[derive(Debug, Clone, Default)]
pub struct Base64Reader;

impl Base64Reader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataUrlReader for Base64Reader {
    async fn read_as_data_url(&self, file: &SourceFile) -> Result<String> {
        let encoded = match &file.origin {
            FileOrigin::Path(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| BoothError::FileReadError {
                        name: file.name.clone(),
                        message: e.to_string(),
                    })?;
                BASE64.encode(bytes)
            }
            FileOrigin::Memory(bytes) => BASE64.encode(bytes.as_slice()),
        };

        log::debug!(
            "Encoded {} ({} bytes -> {} base64 chars)",
            file.name,
            file.size,
            encoded.len()
        );

        Ok(DataUrl::compose(&file.content_type, &encoded))
    }
}
