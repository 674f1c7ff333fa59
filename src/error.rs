use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoothError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid file type. Please upload an image.")]
    InvalidFileType(String),

    #[error("Invalid image format. Could not read base64 data.")]
    InvalidEncodingResult(String),

    #[error("Could not read file {name}: {message}")]
    FileReadError { name: String, message: String },

    #[error("You can only upload a maximum of {max} images.")]
    QuotaExceeded {
        max: usize,
        current: usize,
        incoming: usize,
    },

    #[error("Error processing files. Please try again with valid image files.")]
    BatchFailed { failures: Vec<(String, BoothError)> },

    #[error("Please upload at least one image.")]
    MissingImages,

    #[error("Please enter a prompt.")]
    MissingPrompt,

    #[error("{0}")]
    ServiceError(ServiceFailure),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Ways a call to the generation service can go wrong.
#[derive(Debug, Error)]
pub enum ServiceFailure {
    /// The service answered with an error status.
    #[error("API Error: {message}")]
    Api { status: u16, message: String },

    #[error("An unexpected error occurred while communicating with the Gemini API: {0}")]
    Transport(String),

    #[error("API Error: could not parse service response: {0}")]
    MalformedResponse(String),

    #[error("API Error: No image was generated. The model may have refused the prompt or an unknown error occurred.")]
    NoImageReturned,
}

impl BoothError {
    pub fn is_service_error(&self) -> bool {
        matches!(self, BoothError::ServiceError(_))
    }

    /// Per-file errors of a rejected batch, empty for every other variant.
    pub fn batch_failures(&self) -> &[(String, BoothError)] {
        match self {
            BoothError::BatchFailed { failures } => failures,
            _ => &[],
        }
    }
}

impl From<ServiceFailure> for BoothError {
    fn from(failure: ServiceFailure) -> Self {
        BoothError::ServiceError(failure)
    }
}

impl From<reqwest::Error> for BoothError {
    fn from(err: reqwest::Error) -> Self {
        BoothError::ServiceError(ServiceFailure::Transport(err.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, BoothError>;
