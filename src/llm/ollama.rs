//! Ollama `/api/chat` client.

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::llm::{ChatMessage, ChatModel};

use anyhow::Context as _;
use std::time::Duration;

/// Non-streaming chat client for a local Ollama server.
///
/// Every request asks Ollama to unload the model afterwards (`keep_alive: 0`)
/// since calls are hours apart.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    num_thread: u32,
    use_gpu: bool,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .with_context(|| "failed to build HTTP client")?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/api/chat", normalize_base_url(&config.base_url)),
            model: config.model.clone(),
            num_thread: config.num_thread,
            use_gpu: config.use_gpu,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let mut options = serde_json::json!({ "num_thread": self.num_thread });
        if !self.use_gpu {
            options["num_gpu"] = serde_json::json!(0);
        }

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "keep_alive": 0,
            "options": options,
        })
    }
}

#[async_trait::async_trait]
impl ChatModel for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let body = self.request_body(&messages);

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Request {
                endpoint: self.endpoint.clone(),
                message: error.to_string(),
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|error| LlmError::Request {
            endpoint: self.endpoint.clone(),
            message: format!("failed to read response body: {error}"),
        })?;

        let response_body: Option<serde_json::Value> = serde_json::from_str(&response_text).ok();

        if !status.is_success() {
            let message = response_body
                .as_ref()
                .and_then(|body| body["error"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| truncate_body(&response_text).to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let Some(response_body) = response_body else {
            return Err(LlmError::InvalidResponse(format!(
                "response is not valid JSON: {}",
                truncate_body(&response_text)
            ))
            .into());
        };

        response_body["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::InvalidResponse(format!(
                    "missing message.content: {}",
                    truncate_body(&response_text)
                ))
                .into()
            })
    }
}

fn normalize_base_url(configured: &str) -> String {
    let mut base_url = configured.trim().trim_end_matches('/').to_string();

    if base_url.ends_with("/api") {
        base_url.truncate(base_url.len() - "/api".len());
    } else if base_url.ends_with("/v1") {
        base_url.truncate(base_url.len() - "/v1".len());
    }

    if !base_url.contains("://") {
        base_url = format!("http://{base_url}");
    }

    base_url
}

fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((byte_index, _)) => &body[..byte_index],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            model: "llama3.2:latest".into(),
            persona: "atreusion".into(),
            num_thread: 4,
            use_gpu: false,
            timeout_secs: 5,
        }
    }

    fn prompt() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("predict"),
            ChatMessage::user("Here is the transcript:\n\n\nNext message:"),
        ]
    }

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434/api"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://gpu-box:11434/v1/"), "http://gpu-box:11434");
        assert_eq!(normalize_base_url("127.0.0.1:11434"), "http://127.0.0.1:11434");
    }

    #[test]
    fn request_pins_cpu_unless_gpu_is_allowed() {
        let client = OllamaClient::new(&test_config("http://localhost:11434".into()))
            .expect("client should build");
        let body = client.request_body(&prompt());

        assert_eq!(body["model"], "llama3.2:latest");
        assert_eq!(body["stream"], false);
        assert_eq!(body["keep_alive"], 0);
        assert_eq!(body["options"]["num_gpu"], 0);
        assert_eq!(body["options"]["num_thread"], 4);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");

        let mut config = test_config("http://localhost:11434".into());
        config.use_gpu = true;
        let gpu_client = OllamaClient::new(&config).expect("client should build");
        let gpu_body = gpu_client.request_body(&prompt());
        assert!(gpu_body["options"].get("num_gpu").is_none());
    }

    #[tokio::test]
    async fn chat_returns_message_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.2:latest",
                "stream": false,
                "keep_alive": 0,
                "options": { "num_gpu": 0, "num_thread": 4 },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3.2:latest",
                "message": { "role": "assistant", "content": "atreusion: lol same" },
                "done": true,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(server.uri())).expect("client should build");
        let reply = client.chat(prompt()).await.expect("chat should succeed");

        assert_eq!(reply, "atreusion: lol same");
    }

    #[tokio::test]
    async fn api_errors_surface_the_ollama_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "model \"llama3.2:latest\" not found, try pulling it first",
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(server.uri())).expect("client should build");
        let error = client.chat(prompt()).await.expect_err("404 must fail");

        let rendered = error.to_string();
        assert!(rendered.contains("404"), "unexpected error: {rendered}");
        assert!(rendered.contains("try pulling it first"), "unexpected error: {rendered}");
    }

    #[tokio::test]
    async fn missing_content_is_an_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "done": true,
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(server.uri())).expect("client should build");
        let error = client.chat(prompt()).await.expect_err("shape mismatch must fail");

        assert!(matches!(
            error,
            crate::Error::Llm(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_request_error() {
        // Port 9 (discard) is essentially never an HTTP server.
        let client = OllamaClient::new(&test_config("http://127.0.0.1:9".into()))
            .expect("client should build");
        let error = client.chat(prompt()).await.expect_err("connection must fail");

        assert!(matches!(error, crate::Error::Llm(LlmError::Request { .. })));
    }
}
