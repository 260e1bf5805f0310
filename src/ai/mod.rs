use std::time::Duration;

use color_eyre::eyre::Context;
use reqwest::{
    Client, ClientBuilder, RequestBuilder, StatusCode,
    header::{self, HeaderMap, HeaderValue},
};
use serde_json::Value as Json;
use tracing::instrument;

use crate::{
    config::Config,
    errors::{Result, UserFacingError},
};

mod anthropic;
mod ollama;

pub use anthropic::AnthropicBackend;
pub use ollama::OllamaBackend;

/// The prompt material sent to a provider, already assembled and budgeted
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPayload {
    /// Optional system prompt framing the task
    pub system: Option<String>,
    /// The user message, with any project context already inlined
    pub prompt: String,
}

/// A provider's answer to a generation request
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// The generated text
    pub text: String,
    /// Input token count, when the provider reports one
    pub input_tokens: Option<u64>,
    /// Output token count, when the provider reports one
    pub output_tokens: Option<u64>,
}

/// The provider-specific logic behind the generic [`ProviderClient`]
pub trait ProviderBackend {
    /// The name of the provider
    fn name(&self) -> &'static str;

    /// Builds the provider-specific request
    fn build_request(&self, client: &Client, payload: &ProviderPayload) -> Result<RequestBuilder>;

    /// Parses the provider-specific response body
    fn parse_response(&self, body: Json) -> Result<ProviderResponse>;
}

/// The supported provider backends
#[derive(Debug)]
pub enum Backend {
    Anthropic(AnthropicBackend),
    Ollama(OllamaBackend),
}

impl ProviderBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Anthropic(b) => b.name(),
            Backend::Ollama(b) => b.name(),
        }
    }

    fn build_request(&self, client: &Client, payload: &ProviderPayload) -> Result<RequestBuilder> {
        match self {
            Backend::Anthropic(b) => b.build_request(client, payload),
            Backend::Ollama(b) => b.build_request(client, payload),
        }
    }

    fn parse_response(&self, body: Json) -> Result<ProviderResponse> {
        match self {
            Backend::Anthropic(b) => b.parse_response(body),
            Backend::Ollama(b) => b.parse_response(body),
        }
    }
}

/// A generic client to communicate with LLM providers
#[derive(Debug)]
pub struct ProviderClient {
    inner: Client,
    backend: Backend,
    max_payload_bytes: usize,
}

impl ProviderClient {
    /// Creates a client for the provider selected by the configuration.
    ///
    /// Provider selection and credential checks happen here, before any
    /// network activity.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = match config.default.provider.as_str() {
            "anthropic" => Backend::Anthropic(AnthropicBackend::from_config(config)?),
            "ollama" => Backend::Ollama(OllamaBackend::from_config(config)),
            other => return Err(UserFacingError::UnknownProvider(other.to_string()).into()),
        };

        let mut headers = HeaderMap::new();
        headers.append(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let inner = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.default.timeout_secs))
            .user_agent("flow")
            .default_headers(headers)
            .build()
            .wrap_err("Couldn't build provider client")?;

        Ok(Self {
            inner,
            backend,
            max_payload_bytes: config.context.max_payload_bytes,
        })
    }

    /// The name of the selected provider
    pub fn provider_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Sends a prompt, with optional project context, and returns the
    /// generated text
    #[instrument(skip_all, fields(provider = self.backend.name()))]
    pub async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<ProviderResponse> {
        let payload = ProviderPayload {
            system: system.map(String::from),
            prompt: render_user_message(prompt, context, self.max_payload_bytes),
        };

        let req = self
            .backend
            .build_request(&self.inner, &payload)?
            .build()
            .wrap_err("Couldn't build api request")?;

        tracing::debug!("Calling {} API: {}", self.backend.name(), req.url());
        let res = self.inner.execute(req).await.map_err(|err| {
            if err.is_timeout() {
                tracing::error!("Request timeout: {err:?}");
                UserFacingError::ProviderNetwork(String::from("the request timed out"))
            } else if err.is_connect() {
                tracing::error!("Couldn't connect to the provider: {err:?}");
                UserFacingError::ProviderNetwork(String::from("couldn't connect to the provider"))
            } else {
                tracing::error!("Couldn't perform the request: {err:?}");
                UserFacingError::ProviderNetwork(err.to_string())
            }
        })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::debug!("Got response [{status}]:\n{body}");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    UserFacingError::ProviderAuth(format!("the {} API rejected the credentials", self.backend.name()))
                }
                StatusCode::TOO_MANY_REQUESTS => UserFacingError::ProviderRateLimit,
                _ => UserFacingError::ProviderNetwork(format!(
                    "received {status} response from the {} API",
                    self.backend.name()
                )),
            }
            .into());
        }

        let body: Json = res
            .json()
            .await
            .map_err(|err| UserFacingError::ProviderMalformedResponse(err.to_string()))?;
        tracing::trace!("Response:\n{body:#}");
        self.backend.parse_response(body)
    }
}

/// Assembles the user message from a prompt and optional context, keeping the
/// serialized size within the payload budget.
///
/// The context goes first, wrapped in `<context>` tags, so the instruction
/// arrives last. When the budget is exceeded the context is cut, never the
/// prompt; when there is no room left for any context it is dropped entirely.
fn render_user_message(prompt: &str, context: Option<&str>, max_payload_bytes: usize) -> String {
    const OPEN: &str = "<context>\n";
    const CLOSE: &str = "\n</context>\n\n";

    let Some(context) = context.filter(|c| !c.is_empty()) else {
        return prompt.to_string();
    };

    let wrapper = OPEN.len() + CLOSE.len();
    let budget = max_payload_bytes.saturating_sub(prompt.len() + wrapper);
    if budget == 0 {
        tracing::warn!("Payload budget leaves no room for context, sending the prompt alone");
        return prompt.to_string();
    }

    let mut context = context.to_string();
    if context.len() > budget {
        let mut index = budget;
        while !context.is_char_boundary(index) {
            index -= 1;
        }
        context.truncate(index);
        tracing::warn!("Context truncated to fit the payload budget ({max_payload_bytes} bytes)");
    }

    format!("{OPEN}{context}{CLOSE}{prompt}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::errors::AppError;

    #[test]
    fn test_unknown_provider_rejected_before_network() {
        let mut config = Config::default();
        config.default.provider = String::from("gpt5");
        let err = ProviderClient::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            AppError::UserFacing(UserFacingError::UnknownProvider(name)) if name == "gpt5"
        ));
    }

    #[test]
    fn test_missing_api_key_rejected_before_network() {
        let mut config = Config::default();
        config.anthropic.api_key = String::new();
        let err = ProviderClient::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::UserFacing(UserFacingError::ProviderAuth(_))));
    }

    #[test]
    fn test_user_message_context_precedes_prompt() {
        let message = render_user_message("do the thing", Some("fn main() {}"), 10_000);
        assert_eq!(message, "<context>\nfn main() {}\n</context>\n\ndo the thing");
    }

    #[test]
    fn test_user_message_without_context() {
        assert_eq!(render_user_message("just this", None, 10_000), "just this");
        assert_eq!(render_user_message("just this", Some(""), 10_000), "just this");
    }

    #[test]
    fn test_budget_cuts_context_not_prompt() {
        let prompt = "keep me whole";
        let context = "c".repeat(500);
        let cap = 100;
        let message = render_user_message(prompt, Some(&context), cap);
        assert!(message.len() <= cap);
        assert!(message.ends_with(prompt));
        assert!(message.starts_with("<context>\n"));
    }

    #[test]
    fn test_no_room_drops_context_entirely() {
        let prompt = "p".repeat(100);
        let message = render_user_message(&prompt, Some("some context"), 100);
        assert_eq!(message, prompt);
    }

    /// Serves a single canned HTTP response on a loopback socket and returns
    /// the base url to reach it
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use std::{
            io::{Read, Write},
            net::TcpListener,
        };

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: \
                     {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    fn client_against(url: String) -> ProviderClient {
        let mut config = Config::default();
        config.default.provider = String::from("ollama");
        config.ollama.host = url;
        ProviderClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_http_401_maps_to_auth_error() {
        let client = client_against(serve_once("401 Unauthorized", "{}"));
        let err = client.generate(None, "hi", None).await.unwrap_err();
        assert!(matches!(err, AppError::UserFacing(UserFacingError::ProviderAuth(_))));
    }

    #[tokio::test]
    async fn test_http_429_maps_to_rate_limit() {
        let client = client_against(serve_once("429 Too Many Requests", "{}"));
        let err = client.generate(None, "hi", None).await.unwrap_err();
        assert!(matches!(err, AppError::UserFacing(UserFacingError::ProviderRateLimit)));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_network_error() {
        use std::net::TcpListener;

        // Bind and drop to get an address nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_against(format!("http://{addr}"));
        let err = client.generate(None, "hi", None).await.unwrap_err();
        assert!(matches!(err, AppError::UserFacing(UserFacingError::ProviderNetwork(_))));
    }

    #[tokio::test]
    async fn test_generate_round_trip() {
        let client = client_against(serve_once(
            "200 OK",
            r#"{"response":"fn main() {}","prompt_eval_count":3,"eval_count":5,"done":true}"#,
        ));
        assert_eq!(client.provider_name(), "Ollama");
        let res = client.generate(Some("be brief"), "hi", None).await.unwrap();
        assert_eq!(res.text, "fn main() {}");
        assert_eq!(res.input_tokens, Some(3));
        assert_eq!(res.output_tokens, Some(5));
    }
}
