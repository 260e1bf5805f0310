use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value as Json, json};

use super::{ProviderBackend, ProviderPayload, ProviderResponse};
use crate::{
    config::Config,
    errors::{Result, UserFacingError},
};

/// Backend for a local Ollama server
#[derive(Debug)]
pub struct OllamaBackend {
    model: String,
    host: String,
}

impl OllamaBackend {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.ollama.model.clone(),
            host: config.ollama.host.trim_end_matches('/').to_string(),
        }
    }
}

impl ProviderBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn build_request(&self, client: &Client, payload: &ProviderPayload) -> Result<RequestBuilder> {
        // Request body
        // https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-completion
        let mut request_body = json!({
            "model": self.model,
            "prompt": payload.prompt,
            "stream": false,
            "options": {
                "num_predict": 4096
            }
        });
        if let Some(system) = &payload.system {
            request_body["system"] = json!(system);
        }

        tracing::trace!("Request:\n{request_body:#}");

        Ok(client.post(format!("{}/api/generate", self.host)).json(&request_body))
    }

    fn parse_response(&self, body: Json) -> Result<ProviderResponse> {
        let res: OllamaResponse = serde_json::from_value(body)
            .map_err(|err| UserFacingError::ProviderMalformedResponse(err.to_string()))?;
        if res.response.is_empty() {
            tracing::error!("Ollama response got no content");
            return Err(UserFacingError::ProviderMalformedResponse(String::from("response carried no content")).into());
        }
        Ok(ProviderResponse {
            text: res.response,
            input_tokens: res.prompt_eval_count,
            output_tokens: res.eval_count,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::errors::AppError;

    fn backend() -> OllamaBackend {
        OllamaBackend {
            model: String::from("codellama"),
            host: String::from("http://localhost:11434"),
        }
    }

    #[test]
    fn test_build_request_shape() {
        let payload = ProviderPayload {
            system: None,
            prompt: String::from("explain this"),
        };
        let req = backend()
            .build_request(&Client::new(), &payload)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(req.url().as_str(), "http://localhost:11434/api/generate");
        let body: Json = serde_json::from_slice(req.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["model"], json!("codellama"));
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["options"]["num_predict"], json!(4096));
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "response": "done",
            "prompt_eval_count": 7,
            "eval_count": 2,
            "done": true
        });
        let res = backend().parse_response(body).unwrap();
        assert_eq!(res.text, "done");
        assert_eq!(res.input_tokens, Some(7));
        assert_eq!(res.output_tokens, Some(2));
    }

    #[test]
    fn test_parse_empty_response_is_malformed() {
        let body = json!({ "response": "", "done": true });
        let err = backend().parse_response(body).unwrap_err();
        assert!(matches!(
            err,
            AppError::UserFacing(UserFacingError::ProviderMalformedResponse(_))
        ));
    }
}
