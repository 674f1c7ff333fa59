pub mod image_client;

use crate::{error::Result, models::UploadedImageRecord};
use async_trait::async_trait;

pub use image_client::GeminiImageClient;

/// Something that turns a set of photos plus a prompt into one image.
///
/// Returns the result as a `data:` URL.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, images: &[UploadedImageRecord], prompt: &str) -> Result<String>;
}
