//! Language-model seam and an OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{config::ModelTarget, error::ModelError};

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;
    /// Send one prompt, get the reply text back.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

pub struct ChatCompletionsModel {
    name: String,
    base_url: String,
    api_key: String,
    http: Client,
}

impl ChatCompletionsModel {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>, http: Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        }
    }

    /// Build from config; the API key comes from the environment variable it names.
    pub fn from_target(target: &ModelTarget) -> Result<Self, ModelError> {
        let env_var = target.api_key_env();
        let api_key = std::env::var(env_var)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ModelError::MissingApiKey { env_var: env_var.to_string() })?;

        let mut headers = reqwest::header::HeaderMap::new();
        for (k, v) in &target.extra_headers {
            let name = reqwest::header::HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| ModelError::InvalidConfig { message: format!("header {k}: {e}") })?;
            let value = reqwest::header::HeaderValue::from_str(v)
                .map_err(|e| ModelError::InvalidConfig { message: format!("header {k}: {e}") })?;
            headers.insert(name, value);
        }
        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = target.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self::new(target.name(), target.base_url(), api_key, builder.build()?))
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.name,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn reply_text(resp: ChatResponse) -> Result<String, ModelError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ModelError::MalformedReply { message: "no message content in first choice".into() })
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    fn model_id(&self) -> &str { &self.name }

    #[instrument(skip(self, prompt), fields(model = %self.name, prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let response = self.http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status { status: status.as_u16(), body });
        }
        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::MalformedReply { message: e.to_string() })?;
        let reply = reply_text(parsed)?;
        debug!(reply_len = reply.len(), "model replied");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_a_single_user_message() {
        let m = ChatCompletionsModel::new("gpt-test", "https://example.invalid/v1/", "k", Client::new());
        assert_eq!(m.base_url, "https://example.invalid/v1");
        let body = m.request_body("check these dates");
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "check these dates");
    }

    #[test]
    fn reply_is_first_choice_content() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"OK"}}]}"#).unwrap();
        assert_eq!(reply_text(resp).unwrap(), "OK");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(reply_text(empty), Err(ModelError::MalformedReply { .. })));
    }

    #[test]
    fn missing_api_key_is_reported_by_name() {
        let target = ModelTarget {
            api_key_env: Some("CONFDATA_TEST_KEY_THAT_IS_NEVER_SET".into()),
            ..Default::default()
        };
        let err = ChatCompletionsModel::from_target(&target).err().unwrap();
        assert!(matches!(err, ModelError::MissingApiKey { ref env_var } if env_var == "CONFDATA_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
