//! Ollama adapter (local daemon, native chat API, no authentication)

use crate::error::ProviderError;
use crate::provider::{
    build_provider_http_client, error_for_status, map_http_error, with_deadline, Generation,
    GenerationRequest, ProviderAdapter, ProviderKind, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaAdapter {
    client: Client,
    name: String,
    model: String,
    base_url: String,
}

impl OllamaAdapter {
    pub fn new(name: String, model: String, base_url: Option<String>) -> Result<Self, ProviderError> {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: build_provider_http_client()?,
            name,
            model,
            base_url,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: String,
    message: ResponseMessage,
    // Ollama omits these when the prompt was served from cache
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn validate(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(VALIDATE_TIMEOUT)
            .send()
            .await
            .map_err(map_http_error)?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation, ProviderError> {
        let options = &request.options;
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: false,
            options: Some(ChatOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.max_tokens,
                stop: options.stop.clone(),
            }),
        };
        let url = format!("{}/api/chat", self.base_url);

        let call = async {
            let response = self
                .client
                .post(&url)
                .timeout(request.timeout)
                .json(&body)
                .send()
                .await
                .map_err(map_http_error)?;
            let response = error_for_status(response).await?;
            response
                .json::<ChatResponse>()
                .await
                .map_err(|e| ProviderError::unknown(format!("Failed to parse response: {}", e)))
        };

        let parsed = with_deadline(call, request.timeout, cancel).await?;
        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(TokenUsage::new(
                prompt.unwrap_or(0),
                completion.unwrap_or(0),
            )),
        };

        Ok(Generation {
            content: parsed.message.content,
            model: parsed.model,
            usage,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_http_error)?;
        let tags: TagsResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::unknown(format!("Failed to parse models response: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}
