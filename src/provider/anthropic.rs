//! Anthropic adapter (hosted messages API, `x-api-key` authentication)

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

const BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AnthropicAdapter {
    client: Client,
    name: String,
    model: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(name: String, model: String, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_provider_http_client()?,
            name,
            model,
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", BASE_URL, path))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessageParam<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
}

#[derive(Serialize)]
struct MessageParam<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

fn collect_text(blocks: Vec<ContentBlock>) -> String {
    blocks
        .into_iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn validate(&self) -> Result<(), ProviderError> {
        let response = self
            .request(reqwest::Method::GET, "/models")
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
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: vec![MessageParam {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.options.temperature,
            top_p: request.options.top_p,
            stop_sequences: request.options.stop.as_deref(),
        };

        let call = async {
            let response = self
                .request(reqwest::Method::POST, "/messages")
                .timeout(request.timeout)
                .json(&body)
                .send()
                .await
                .map_err(map_http_error)?;
            let response = error_for_status(response).await?;
            response
                .json::<MessagesResponse>()
                .await
                .map_err(|e| ProviderError::unknown(format!("Failed to parse response: {}", e)))
        };

        let completion = with_deadline(call, request.timeout, cancel).await?;
        Ok(Generation {
            content: collect_text(completion.content),
            model: completion.model,
            usage: completion
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        #[derive(Deserialize)]
        struct ModelsResponse {
            data: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            id: String,
        }

        let response = self
            .request(reqwest::Method::GET, "/models")
            .send()
            .await
            .map_err(map_http_error)?;
        let models: ModelsResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::unknown(format!("Failed to parse models response: {}", e)))?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}
