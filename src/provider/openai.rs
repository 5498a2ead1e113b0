//! OpenAI-compatible adapter (hosted REST, bearer key)

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct OpenAiAdapter {
    client: Client,
    name: String,
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiAdapter {
    pub fn new(
        name: String,
        model: String,
        api_key: String,
        base_url: Option<String>,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: build_provider_http_client()?,
            name,
            model,
            api_key,
            base_url,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn validate(&self) -> Result<(), ProviderError> {
        let response = self
            .get("/models")
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
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: vec![OpenAiMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            top_p: request.options.top_p,
            stop: request.options.stop.as_deref(),
            stream: false,
        };
        let url = format!("{}/chat/completions", self.base_url);

        let call = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .timeout(request.timeout)
                .json(&body)
                .send()
                .await
                .map_err(map_http_error)?;
            let response = error_for_status(response).await?;
            response
                .json::<ChatCompletionResponse>()
                .await
                .map_err(|e| ProviderError::unknown(format!("Failed to parse response: {}", e)))
        };

        let completion = with_deadline(call, request.timeout, cancel).await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::unknown("No choices in response"))?
            .message
            .content
            .unwrap_or_default();

        Ok(Generation {
            content,
            model: completion.model,
            usage: completion.usage.map(|u| TokenUsage {
                prompt: u.prompt_tokens,
                completion: u.completion_tokens,
                total: u.total_tokens,
            }),
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

        let response = self.get("/models").send().await.map_err(map_http_error)?;
        let models: ModelsResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::unknown(format!("Failed to parse models response: {}", e)))?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}
