pub mod gemini;
pub mod image;
pub mod session;

pub use gemini::*;
pub use image::*;
pub use session::*;
