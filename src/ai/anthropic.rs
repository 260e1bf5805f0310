use reqwest::{Client, RequestBuilder, header::HeaderValue};
use serde::Deserialize;
use serde_json::{Value as Json, json};

use super::{ProviderBackend, ProviderPayload, ProviderResponse};
use crate::{
    config::Config,
    errors::{Result, UserFacingError},
};

/// Backend for the hosted Anthropic messages API
#[derive(Debug)]
pub struct AnthropicBackend {
    model: String,
    url: String,
    api_key: String,
}

impl AnthropicBackend {
    /// Builds the backend from the configuration, failing early when no API
    /// key can be resolved
    pub fn from_config(config: &Config) -> Result<Self> {
        let Some(api_key) = config.anthropic.resolved_api_key() else {
            return Err(UserFacingError::ProviderAuth(String::from(
                "no Anthropic API key configured, set anthropic.api_key or the ANTHROPIC_API_KEY environment variable",
            ))
            .into());
        };
        Ok(Self {
            model: config.default.model.clone(),
            url: config.anthropic.url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

impl ProviderBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    fn build_request(&self, client: &Client, payload: &ProviderPayload) -> Result<RequestBuilder> {
        // Request body
        // https://docs.anthropic.com/en/api/messages
        let mut request_body = json!({
            "model": self.model,
            "max_tokens": 4096,
            "messages": [
                {
                    "role": "user",
                    "content": payload.prompt
                }
            ],
        });
        if let Some(system) = &payload.system {
            request_body["system"] = json!(system);
        }

        tracing::trace!("Request:\n{request_body:#}");

        let mut api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| UserFacingError::ProviderAuth(String::from("the Anthropic API key contains invalid characters")))?;
        api_key.set_sensitive(true);

        Ok(client
            .post(format!("{}/messages", self.url))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body))
    }

    fn parse_response(&self, body: Json) -> Result<ProviderResponse> {
        let res: AnthropicResponse = serde_json::from_value(body)
            .map_err(|err| UserFacingError::ProviderMalformedResponse(err.to_string()))?;

        let text = res
            .content
            .iter()
            .filter(|block| block.r#type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            tracing::error!("Anthropic response got no text content: {res:?}");
            return Err(UserFacingError::ProviderMalformedResponse(String::from("response carried no text content")).into());
        }

        Ok(ProviderResponse {
            text,
            input_tokens: res.usage.as_ref().and_then(|u| u.input_tokens),
            output_tokens: res.usage.as_ref().and_then(|u| u.output_tokens),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    r#type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::errors::AppError;

    fn backend() -> AnthropicBackend {
        AnthropicBackend {
            model: String::from("claude-sonnet-4-20250514"),
            url: String::from("https://api.anthropic.com/v1"),
            api_key: String::from("sk-test"),
        }
    }

    #[test]
    fn test_build_request_shape() {
        let payload = ProviderPayload {
            system: Some(String::from("be brief")),
            prompt: String::from("hello"),
        };
        let req = backend()
            .build_request(&Client::new(), &payload)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(req.url().as_str(), "https://api.anthropic.com/v1/messages");
        assert_eq!(req.headers().get("anthropic-version").unwrap(), "2023-06-01");
        assert!(req.headers().contains_key("x-api-key"));

        let body: Json = serde_json::from_slice(req.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["system"], json!("be brief"));
        assert_eq!(body["messages"][0]["role"], json!("user"));
        assert_eq!(body["messages"][0]["content"], json!("hello"));
        assert_eq!(body["max_tokens"], json!(4096));
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "Hello, " },
                { "type": "text", "text": "world" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 12, "output_tokens": 4 }
        });
        let res = backend().parse_response(body).unwrap();
        assert_eq!(res.text, "Hello, world");
        assert_eq!(res.input_tokens, Some(12));
        assert_eq!(res.output_tokens, Some(4));
    }

    #[test]
    fn test_parse_response_without_text_is_malformed() {
        let body = json!({ "content": [], "stop_reason": "end_turn" });
        let err = backend().parse_response(body).unwrap_err();
        assert!(matches!(
            err,
            AppError::UserFacing(UserFacingError::ProviderMalformedResponse(_))
        ));
    }
}
