use crate::{
    config::GeminiConfig,
    error::{BoothError, Result, ServiceFailure},
    gemini::ImageGenerator,
    logger,
    models::{
        ApiErrorBody, Content, DataUrl, GenerateContentRequest, GenerateContentResponse,
        GenerationConfig, Part, UploadedImageRecord,
    },
};
use async_trait::async_trait;
use reqwest::Client;

#[derive(Clone)]
pub struct GeminiImageClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiImageClient {
    /// Fails with `ConfigError` when no API key is configured.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                BoothError::ConfigError(
                    "GEMINI_API_KEY (or API_KEY) environment variable is not set".into(),
                )
            })?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model: config.model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// All image parts in the given order, then the prompt as the last part.
    pub fn build_request(images: &[UploadedImageRecord], prompt: &str) -> GenerateContentRequest {
        let mut parts: Vec<Part> = images
            .iter()
            .map(|image| Part::image(image.base64_payload(), image.mime_type()))
            .collect();
        parts.push(Part::text(prompt));

        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
            },
        }
    }

    /// Data URL of the first inline image in the first candidate.
    pub fn extract_image(response: &GenerateContentResponse) -> Result<String> {
        let image = response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .and_then(|content| content.parts.iter().find_map(|part| part.inline_data.as_ref()));

        match image {
            Some(inline) => Ok(DataUrl::compose(&inline.mime_type, &inline.data)),
            None => {
                if let Some(reason) = response
                    .prompt_feedback
                    .as_ref()
                    .and_then(|feedback| feedback.block_reason.as_deref())
                {
                    log::warn!("Prompt was blocked: {}", reason);
                }
                if let Some(reason) = response
                    .candidates
                    .first()
                    .and_then(|candidate| candidate.finish_reason.as_deref())
                {
                    log::warn!("Candidate finished without an image: {}", reason);
                }
                Err(ServiceFailure::NoImageReturned.into())
            }
        }
    }

    fn api_failure(status: u16, body: &str) -> ServiceFailure {
        let message = match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => parsed.error.message,
            Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
            Err(_) => body.trim().to_string(),
        };
        ServiceFailure::Api { status, message }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate(&self, images: &[UploadedImageRecord], prompt: &str) -> Result<String> {
        let request = Self::build_request(images, prompt);

        log::info!(
            "Generating image with model {} from {} photo(s)",
            self.model,
            images.len()
        );
        let timer = logger::timer("gemini generateContent");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                log::error!("Gemini API call failed: {:?}", e);
                BoothError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            log::error!("Failed to read Gemini response body: {:?}", e);
            BoothError::from(e)
        })?;
        timer.finish();

        if !status.is_success() {
            log::error!("Gemini API returned {}: {}", status, body);
            return Err(Self::api_failure(status.as_u16(), &body).into());
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            log::error!("Unparseable Gemini response: {}", e);
            BoothError::from(ServiceFailure::MalformedResponse(e.to_string()))
        })?;

        Self::extract_image(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceFile;
    use serde_json::json;

    fn record(name: &str, mime: &str, payload: &str) -> UploadedImageRecord {
        UploadedImageRecord::from_data_url(
            SourceFile::from_bytes(name, mime, vec![]),
            DataUrl::compose(mime, payload),
        )
        .unwrap()
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = GeminiImageClient::new(GeminiConfig::new()).err().unwrap();
        assert!(matches!(err, BoothError::ConfigError(_)));

        let blank = GeminiImageClient::new(GeminiConfig::new().with_api_key("  "));
        assert!(blank.is_err());

        let client = GeminiImageClient::new(GeminiConfig::new().with_api_key("k")).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn test_request_puts_images_first_prompt_last() {
        let images = vec![
            record("a.png", "image/png", "AAAA"),
            record("b.jpg", "image/jpeg", "BBBB"),
        ];
        let request = GeminiImageClient::build_request(&images, "astronauts on the moon");

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{
                    "parts": [
                        {"inlineData": {"data": "AAAA", "mimeType": "image/png"}},
                        {"inlineData": {"data": "BBBB", "mimeType": "image/jpeg"}},
                        {"text": "astronauts on the moon"}
                    ]
                }],
                "generationConfig": {"responseModalities": ["IMAGE"]}
            })
        );
    }

    #[test]
    fn test_extract_first_inline_image() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here you go"},
                    {"inlineData": {"mimeType": "image/png", "data": "AAAA"}},
                    {"inlineData": {"mimeType": "image/jpeg", "data": "BBBB"}}
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let url = GeminiImageClient::extract_image(&response).unwrap();
        assert_eq!(url, "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_extract_without_image_fails() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "I can't do that"}]}}]
        }))
        .unwrap();
        let err = GeminiImageClient::extract_image(&response).unwrap_err();
        assert!(matches!(
            err,
            BoothError::ServiceError(ServiceFailure::NoImageReturned)
        ));

        let blocked: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(GeminiImageClient::extract_image(&blocked).is_err());
    }

    #[test]
    fn test_api_failure_uses_service_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let failure = GeminiImageClient::api_failure(400, body);
        assert_eq!(failure.to_string(), "API Error: API key not valid");

        let failure = GeminiImageClient::api_failure(502, "");
        assert_eq!(failure.to_string(), "API Error: HTTP 502");
    }

    /// Answers exactly one HTTP request with `status` and `body`, then hands
    /// back the raw request it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if name.eq_ignore_ascii_case("content-length") {
                                value.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });

        (base_url, handle)
    }

    fn client_for(base_url: &str) -> GeminiImageClient {
        GeminiImageClient::new(
            GeminiConfig::new()
                .with_api_key("k")
                .with_base_url(base_url),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_posts_parts_and_returns_image() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"AAAA"}}]}}]}"#,
        )
        .await;
        let images = vec![record("a.png", "image/png", "QUJD")];

        let url = client_for(&base_url)
            .generate(&images, "beach")
            .await
            .unwrap();
        assert_eq!(url, "data:image/png;base64,AAAA");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1beta/models/gemini-2.5-flash-image:generateContent "));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: k\r\n"));

        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let sent: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            sent["contents"][0]["parts"],
            json!([
                {"inlineData": {"data": "QUJD", "mimeType": "image/png"}},
                {"text": "beach"}
            ])
        );
        assert_eq!(sent["generationConfig"]["responseModalities"], json!(["IMAGE"]));
    }

    #[tokio::test]
    async fn test_generate_error_status_is_api_failure() {
        let (base_url, server) = serve_once(
            "400 Bad Request",
            r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#,
        )
        .await;
        let images = vec![record("a.png", "image/png", "QUJD")];

        let err = client_for(&base_url)
            .generate(&images, "beach")
            .await
            .unwrap_err();
        server.await.unwrap();

        match err {
            BoothError::ServiceError(ServiceFailure::Api { status, ref message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected Api failure, got {:?}", other),
        }
        assert_eq!(err.to_string(), "API Error: API key not valid");
    }

    #[tokio::test]
    async fn test_generate_unparseable_body_is_malformed() {
        let (base_url, server) = serve_once("200 OK", "<html>oops</html>").await;
        let images = vec![record("a.png", "image/png", "QUJD")];

        let err = client_for(&base_url)
            .generate(&images, "beach")
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(
            err,
            BoothError::ServiceError(ServiceFailure::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_unreachable_service_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());
        drop(listener);
        let images = vec![record("a.png", "image/png", "QUJD")];

        let err = client_for(&base_url)
            .generate(&images, "beach")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BoothError::ServiceError(ServiceFailure::Transport(_))
        ));
        assert!(err.to_string().contains("unexpected error"));
    }

    #[tokio::test]
    async fn test_session_reports_service_error_message() {
        use crate::session::SessionController;
        use std::sync::Arc;

        let (base_url, server) = serve_once(
            "403 Forbidden",
            r#"{"error":{"code":403,"message":"API key not valid"}}"#,
        )
        .await;
        let mut session = SessionController::new(Arc::new(client_for(&base_url)));
        session
            .add_files(vec![SourceFile::from_bytes("a.png", "image/png", vec![1, 2, 3])])
            .await
            .unwrap();
        session.set_prompt("beach");

        assert!(session.generate().await.is_err());
        server.await.unwrap();
        assert_eq!(
            session.status().error_message(),
            Some("Generation failed: API Error: API key not valid")
        );
    }
}
