use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Groq,
    Openai,
    Grok,
}

pub struct ProviderConfig {
    pub base_url: &'static str,
    pub env_var: &'static str,
    pub default_model: &'static str,
    pub models: &'static [&'static str],
}

const GROQ_MODELS: &[&str] = &[
    "llama3-70b-8192",
    "llama3-8b-8192",
    "llama3-groq-70b-8192-tool-use-preview",
    "llama-3.1-70b-versatile",
    "llama-3.1-8b-instant",
    "llama-3.2-3b-preview",
    "llama-3.2-90b-vision-preview",
    "gemma2-9b-it",
    "mixtral-8x7b-32768",
];

const OPENAI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4.1", "gpt-4.1-mini"];

const GROK_MODELS: &[&str] = &["grok-4-fast", "grok-3-mini"];

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Groq => ProviderConfig {
                base_url: "https://api.groq.com/openai/v1",
                env_var: "GROQ_API_KEY",
                default_model: GROQ_MODELS[0],
                models: GROQ_MODELS,
            },
            Provider::Openai => ProviderConfig {
                base_url: "https://api.openai.com/v1",
                env_var: "OPENAI_API_KEY",
                default_model: OPENAI_MODELS[0],
                models: OPENAI_MODELS,
            },
            Provider::Grok => ProviderConfig {
                base_url: "https://api.x.ai/v1",
                env_var: "XAI_API_KEY",
                default_model: GROK_MODELS[0],
                models: GROK_MODELS,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Groq => "Groq",
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
        }
    }

    pub fn is_known_model(&self, model: &str) -> bool {
        self.config().models.contains(&model)
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String> {
        let config = self.config();
        std::env::var(config.env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| DigestError::MissingApiKey {
                env_var: config.env_var.to_string(),
            })
    }
}
