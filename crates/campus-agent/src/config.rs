use serde::{Deserialize, Serialize};

/// Supported model providers. All speak the OpenAI chat-completions API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    OpenRouter,
    /// Groq cloud inference — OpenAI-compatible API, free tier with rate limits.
    Groq,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    pub api_key: String,
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serialization() {
        assert_eq!(serde_json::to_string(&LlmProvider::Groq).unwrap(), "\"groq\"");
        let parsed: LlmProvider = serde_json::from_str("\"openrouter\"").unwrap();
        assert!(matches!(parsed, LlmProvider::OpenRouter));
    }

    #[test]
    fn test_config_defaults() {
        let config: ModelConfig = serde_json::from_str(
            r#"{"provider":"openai","model_id":"gpt-4o","api_key":"sk-test","api_base_url":null}"#,
        )
        .unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.base_url(), "https://api.openai.com");
    }

    #[test]
    fn test_base_url_override() {
        let config = ModelConfig {
            provider: LlmProvider::OpenAi,
            model_id: "gpt-4o".into(),
            api_key: "sk-test".into(),
            api_base_url: Some("http://localhost:9999".into()),
            temperature: 0.7,
            max_tokens: 1024,
        };
        assert_eq!(config.base_url(), "http://localhost:9999");
    }
}
