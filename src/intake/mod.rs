//! Validation and base64 conversion of picked image files.
//!
//! Batches are all-or-nothing: a batch that would overflow the upload limit is
//! refused before any file is read, and a batch with a single failed
//! conversion is refused as a whole, discarding the conversions that worked.

pub mod reader;

use crate::{
    error::{BoothError, Result},
    models::{SourceFile, UploadedImageRecord},
};
use futures::future::join_all;
use std::sync::Arc;

pub use reader::{Base64Reader, DataUrlReader};

#[derive(Clone)]
pub struct ImageIntake {
    reader: Arc<dyn DataUrlReader>,
}

impl Default for ImageIntake {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageIntake {
    pub fn new() -> Self {
        Self::with_reader(Arc::new(Base64Reader::new()))
    }

    pub fn with_reader(reader: Arc<dyn DataUrlReader>) -> Self {
        Self { reader }
    }

    /// Converts one file into an upload record.
    pub async fn convert(&self, file: &SourceFile) -> Result<UploadedImageRecord> {
        if !file.is_image() {
            return Err(BoothError::InvalidFileType(format!(
                "{} has content type '{}'",
                file.name, file.content_type
            )));
        }

        let data_url = self.reader.read_as_data_url(file).await?;
        UploadedImageRecord::from_data_url(file.clone(), data_url)
    }

    /// Refuses a batch of `incoming` files when `current + incoming` exceeds `max`.
    pub fn check_capacity(current: usize, incoming: usize, max: usize) -> Result<()> {
        if current + incoming > max {
            return Err(BoothError::QuotaExceeded {
                max,
                current,
                incoming,
            });
        }
        Ok(())
    }

    /// Converts every file concurrently and waits for all of them.
    ///
    /// Returns the records in input order, or `BatchFailed` listing each file
    /// that could not be converted.
    pub async fn convert_batch(&self, files: &[SourceFile]) -> Result<Vec<UploadedImageRecord>> {
        let results = join_all(files.iter().map(|file| self.convert(file))).await;

        let mut records = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("Failed to convert {}: {:?}", file.name, e);
                    failures.push((file.name.clone(), e));
                }
            }
        }

        if !failures.is_empty() {
            log::error!(
                "Rejecting batch: {} of {} files failed, discarding {} converted",
                failures.len(),
                files.len(),
                records.len()
            );
            return Err(BoothError::BatchFailed { failures });
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Write;

    /// Produces a broken data URL for one named file.
    struct BrokenFor(&'static str);

    #[async_trait]
    impl DataUrlReader for BrokenFor {
        async fn read_as_data_url(&self, file: &SourceFile) -> Result<String> {
            if file.name == self.0 {
                Ok("data:;base64".to_string())
            } else {
                Base64Reader::new().read_as_data_url(file).await
            }
        }
    }

    fn png(name: &str) -> SourceFile {
        SourceFile::from_bytes(name, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
    }

    #[tokio::test]
    async fn test_convert_valid_image() {
        let record = ImageIntake::new().convert(&png("a.png")).await.unwrap();
        assert_eq!(record.data_url(), "data:image/png;base64,iVBORw==");
        assert_eq!(record.base64_payload(), "iVBORw==");
        assert_eq!(record.mime_type(), "image/png");
        assert_eq!(record.source().name, "a.png");
    }

    #[tokio::test]
    async fn test_convert_rejects_non_image() {
        let file = SourceFile::from_bytes("notes.txt", "text/plain", b"hello".to_vec());
        let err = ImageIntake::new().convert(&file).await.unwrap_err();
        assert!(matches!(err, BoothError::InvalidFileType(_)));
    }

    #[tokio::test]
    async fn test_convert_from_disk() {
        let mut tmp = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        tmp.write_all(&[0xff, 0xd8, 0xff]).unwrap();

        let file = SourceFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.content_type, "image/jpeg");
        assert_eq!(file.size, 3);

        let record = ImageIntake::new().convert(&file).await.unwrap();
        assert_eq!(record.data_url(), "data:image/jpeg;base64,/9j/");
    }

    #[tokio::test]
    async fn test_missing_path_is_read_error() {
        let err = SourceFile::from_path("/definitely/not/here.png")
            .await
            .unwrap_err();
        assert!(matches!(err, BoothError::FileReadError { .. }));
    }

    #[test]
    fn test_capacity() {
        assert!(ImageIntake::check_capacity(3, 2, 5).is_ok());
        assert!(matches!(
            ImageIntake::check_capacity(4, 2, 5),
            Err(BoothError::QuotaExceeded { max: 5, current: 4, incoming: 2 })
        ));
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let files = vec![png("1.png"), png("2.png"), png("3.png")];
        let records = ImageIntake::new().convert_batch(&files).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.source().name.as_str()).collect();
        assert_eq!(names, ["1.png", "2.png", "3.png"]);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let intake = ImageIntake::with_reader(Arc::new(BrokenFor("bad.png")));
        let files = vec![png("good.png"), png("bad.png"), png("also-good.png")];

        let err = intake.convert_batch(&files).await.unwrap_err();
        let failures = err.batch_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "bad.png");
        assert!(matches!(failures[0].1, BoothError::InvalidEncodingResult(_)));
    }
}
