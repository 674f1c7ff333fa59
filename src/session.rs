use crate::{
    config::{BoothConfig, DEFAULT_MAX_UPLOADS},
    error::{BoothError, Result},
    gemini::ImageGenerator,
    intake::ImageIntake,
    models::{GenerationStatus, SessionState, SourceFile, UploadedImageRecord},
};
use std::sync::Arc;
use uuid::Uuid;

/// Owns one user's uploads, prompt and output status.
///
/// Every failure ends up as `GenerationStatus::Error` so the caller can render
/// it; the same error is also returned to the caller.
pub struct SessionController {
    id: String,
    state: SessionState,
    max_uploads: usize,
    intake: ImageIntake,
    generator: Arc<dyn ImageGenerator>,
}

impl SessionController {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: SessionState::new(),
            max_uploads: DEFAULT_MAX_UPLOADS,
            intake: ImageIntake::new(),
            generator,
        }
    }

    pub fn from_config(config: &BoothConfig, generator: Arc<dyn ImageGenerator>) -> Self {
        Self::new(generator).with_max_uploads(config.max_uploads)
    }

    pub fn with_max_uploads(mut self, max_uploads: usize) -> Self {
        self.max_uploads = max_uploads;
        self
    }

    pub fn with_intake(mut self, intake: ImageIntake) -> Self {
        self.intake = intake;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn uploads(&self) -> &[UploadedImageRecord] {
        &self.state.uploads
    }

    pub fn prompt(&self) -> &str {
        &self.state.prompt
    }

    pub fn status(&self) -> &GenerationStatus {
        &self.state.status
    }

    pub fn max_uploads(&self) -> usize {
        self.max_uploads
    }

    pub fn remaining_slots(&self) -> usize {
        self.max_uploads.saturating_sub(self.state.uploads.len())
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.state.prompt = prompt.into();
    }

    pub fn can_add_more(&self) -> bool {
        !self.state.status.is_loading() && self.remaining_slots() > 0
    }

    pub fn can_generate(&self) -> bool {
        !self.state.status.is_loading()
            && !self.state.uploads.is_empty()
            && !self.state.prompt.trim().is_empty()
    }

    /// Converts and appends a batch of files, all or nothing.
    pub async fn add_files(&mut self, files: Vec<SourceFile>) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        if let GenerationStatus::Error(_) = self.state.status {
            self.state.status = GenerationStatus::Idle;
        }

        if let Err(e) =
            ImageIntake::check_capacity(self.state.uploads.len(), files.len(), self.max_uploads)
        {
            log::warn!(
                "Refusing {} file(s): {} of {} slots used",
                files.len(),
                self.state.uploads.len(),
                self.max_uploads
            );
            return Err(self.fail(e));
        }

        match self.intake.convert_batch(&files).await {
            Ok(records) => {
                log::info!("Added {} photo(s)", records.len());
                self.state.uploads.extend(records);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drops the upload with this id. Unknown ids are ignored.
    pub fn remove_upload(&mut self, id: &str) {
        let before = self.state.uploads.len();
        self.state.uploads.retain(|record| record.id() != id);
        if self.state.uploads.len() < before {
            log::debug!("Removed upload {}", id);
        }
    }

    /// Sends the current uploads and prompt to the generator.
    ///
    /// Returns the result image as a `data:` URL. Holding `&mut self` for the
    /// whole call keeps a second request from starting while one is in flight.
    pub async fn generate(&mut self) -> Result<String> {
        if self.state.uploads.is_empty() {
            return Err(self.fail(BoothError::MissingImages));
        }
        if self.state.prompt.trim().is_empty() {
            return Err(self.fail(BoothError::MissingPrompt));
        }

        self.state.status = GenerationStatus::Loading;
        let result = self
            .generator
            .generate(&self.state.uploads, &self.state.prompt)
            .await;

        match result {
            Ok(url) => {
                log::info!("Generation succeeded ({} chars)", url.len());
                self.state.status = GenerationStatus::Success(url.clone());
                Ok(url)
            }
            Err(e) => {
                log::error!("Generation failed: {:?}", e);
                self.state.status = GenerationStatus::Error(format!("Generation failed: {}", e));
                Err(e)
            }
        }
    }

    fn fail(&mut self, error: BoothError) -> BoothError {
        log::debug!("Session error: {:?}", error);
        self.state.status = GenerationStatus::Error(error.to_string());
        error
    }
}
