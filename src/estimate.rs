//! Token estimation consulted before a job is accepted.

use crate::provider::ProviderKind;

/// Outcome of an estimate against a model's context limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimate {
    pub tokens: usize,
    pub limit: usize,
    pub within_limit: bool,
}

pub trait TokenEstimator: Send + Sync {
    fn estimate(
        &self,
        text: &str,
        kind: ProviderKind,
        model: &str,
        context_limit: Option<usize>,
    ) -> TokenEstimate;
}

/// Roughly four characters per token, against per-backend default windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicEstimator;

impl HeuristicEstimator {
    const CHARS_PER_TOKEN: usize = 4;

    pub fn default_limit(kind: ProviderKind) -> usize {
        match kind {
            ProviderKind::Ollama => 8_192,
            ProviderKind::OpenAi => 128_000,
            ProviderKind::Anthropic => 200_000,
        }
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(
        &self,
        text: &str,
        kind: ProviderKind,
        _model: &str,
        context_limit: Option<usize>,
    ) -> TokenEstimate {
        let tokens = text.chars().count().div_ceil(Self::CHARS_PER_TOKEN);
        let limit = context_limit.unwrap_or_else(|| Self::default_limit(kind));
        TokenEstimate {
            tokens,
            limit,
            within_limit: tokens <= limit,
        }
    }
}
