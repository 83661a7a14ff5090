//! The closed set of supported providers.
//!
//! Provider selection is a table lookup: parse the tag into a
//! [`ProviderKind`], then build the matching client. An unrecognized tag is
//! a configuration error surfaced before any session work starts.

use std::str::FromStr;
use std::sync::Arc;

use codeclaw_core::Provider;
use codeclaw_core::error::Error;
use codeclaw_core::session::ProviderOptions;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    OpenRouter,
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        Self::Ollama,
        Self::OpenAi,
        Self::OpenRouter,
        Self::Anthropic,
    ];

    /// The tag used in configuration and session files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::Anthropic => "anthropic",
        }
    }

    /// Default API endpoint when no `api_url` override is given.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    /// Whether a missing API key should be reported before the first request.
    pub fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }

    /// Build a client for these options.
    pub fn build(self, options: &ProviderOptions) -> Arc<dyn Provider> {
        let api_key = options.api_key.clone().unwrap_or_default();
        match self {
            Self::Ollama => Arc::new(OpenAiCompatProvider::ollama(options.api_url.as_deref())),
            Self::OpenAi => Arc::new(OpenAiCompatProvider::new(
                self.as_str(),
                self.base_url_for(options),
                api_key,
            )),
            Self::OpenRouter => Arc::new(OpenAiCompatProvider::new(
                self.as_str(),
                self.base_url_for(options),
                api_key,
            )),
            Self::Anthropic => {
                let mut provider = AnthropicProvider::new(api_key);
                if let Some(url) = &options.api_url {
                    provider = provider.with_base_url(url);
                }
                Arc::new(provider)
            }
        }
    }

    fn base_url_for(self, options: &ProviderOptions) -> String {
        options
            .api_url
            .clone()
            .unwrap_or_else(|| self.default_base_url().to_string())
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::Config {
                message: format!(
                    "Unknown provider \"{s}\". Supported providers: {}.",
                    Self::ALL.map(|k| k.as_str()).join(", ")
                ),
            })
    }
}
