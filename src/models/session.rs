use super::image::UploadedImageRecord;
use serde::Serialize;

/// What the output pane should show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Loading,
    Success(String),
    Error(String),
}

impl GenerationStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, GenerationStatus::Loading)
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            GenerationStatus::Success(url) => Some(url),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            GenerationStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub uploads: Vec<UploadedImageRecord>,
    pub prompt: String,
    pub status: GenerationStatus,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}
