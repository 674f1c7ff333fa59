pub mod config;
pub mod error;
pub mod gemini;
pub mod intake;
pub mod logger;
pub mod models;
pub mod session;

pub use config::{BoothConfig, GeminiConfig};
pub use error::{BoothError, Result, ServiceFailure};
pub use gemini::{GeminiImageClient, ImageGenerator};
pub use intake::{Base64Reader, DataUrlReader, ImageIntake};
pub use models::{DataUrl, GenerationStatus, SessionState, SourceFile, UploadedImageRecord};
pub use session::SessionController;
