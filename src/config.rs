use std::env;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MAX_UPLOADS: usize = 5;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct BoothConfig {
    pub max_uploads: usize,
    pub gemini: GeminiConfig,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `GEMINI_API_KEY` (or `API_KEY`), `GEMINI_MODEL` and `GEMINI_BASE_URL`.
    pub fn from_env() -> Self {
        let api_key = api_key_from(|name| env::var(name).ok());
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        GeminiConfig {
            api_key,
            model,
            base_url,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// First non-blank of `GEMINI_API_KEY` and `API_KEY`.
fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["GEMINI_API_KEY", "API_KEY"]
        .iter()
        .filter_map(|name| lookup(name))
        .find(|key| !key.trim().is_empty())
}

impl Default for BoothConfig {
    fn default() -> Self {
        BoothConfig {
            max_uploads: DEFAULT_MAX_UPLOADS,
            gemini: GeminiConfig::default(),
        }
    }
}

impl BoothConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let max_uploads = env::var("PHOTOBOOTH_MAX_UPLOADS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|max: &usize| *max > 0)
            .unwrap_or(DEFAULT_MAX_UPLOADS);

        BoothConfig {
            max_uploads,
            gemini: GeminiConfig::from_env(),
        }
    }

    pub fn with_max_uploads(mut self, max_uploads: usize) -> Self {
        self.max_uploads = max_uploads;
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoothConfig::new();
        assert_eq!(config.max_uploads, 5);
        assert_eq!(config.gemini.model, "gemini-2.5-flash-image");
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_blank_gemini_key_falls_back_to_api_key() {
        let lookup = |name: &str| match name {
            "GEMINI_API_KEY" => Some("  ".to_string()),
            "API_KEY" => Some("real-key".to_string()),
            _ => None,
        };
        assert_eq!(api_key_from(lookup).as_deref(), Some("real-key"));

        let preferred = |name: &str| Some(format!("{}-value", name));
        assert_eq!(
            api_key_from(preferred).as_deref(),
            Some("GEMINI_API_KEY-value")
        );

        let empty = |_: &str| Some(String::new());
        assert!(api_key_from(empty).is_none());
    }

    #[test]
    fn test_builder_trims_base_url() {
        let gemini = GeminiConfig::new()
            .with_api_key("key")
            .with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(gemini.base_url, "http://localhost:8080/v1beta");
        assert_eq!(gemini.api_key.as_deref(), Some("key"));
    }
}
