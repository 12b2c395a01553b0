//! Bedrock `InvokeModel` client and the classification of its failures.

use crate::core::error::Result;
use crate::core::{CommandResult, Config, FailureKind, InferenceFailure};
use crate::runtime::prompt::build_prompt;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Environment variable holding the Bedrock API key
pub const BEARER_TOKEN_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One inference call: built once per run and never modified
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub model_id: String,
    pub region: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl InferenceRequest {
    /// Build the request for a finished command
    pub fn new(config: &Config, result: &CommandResult) -> Self {
        Self {
            model_id: config.model_id().to_string(),
            region: config.region().to_string(),
            prompt: build_prompt(result),
            max_tokens: config.bedrock.max_tokens,
            temperature: config.bedrock.temperature,
            timeout: config.timeout(),
        }
    }

    /// Anthropic models on Bedrock take the messages format
    pub fn is_anthropic(&self) -> bool {
        let model = self.model_id.to_lowercase();
        model.contains("anthropic") || model.contains("claude")
    }

    /// JSON body for the invoke call
    pub fn body(&self) -> Value {
        if self.is_anthropic() {
            json!({
                "anthropic_version": ANTHROPIC_VERSION,
                "max_tokens": self.max_tokens,
                "messages": [{ "role": "user", "content": self.prompt }],
                "temperature": self.temperature,
                "top_p": 0.9,
            })
        } else {
            json!({
                "prompt": self.prompt,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
            })
        }
    }
}

/// A model endpoint that turns a prompt into commentary.
///
/// Implementations make exactly one attempt and classify their own failures.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn invoke(&self, request: &InferenceRequest) -> std::result::Result<String, InferenceFailure>;
}

/// Bedrock runtime client speaking the `InvokeModel` REST API
///
/// # Examples
///
/// ```rust,no_run
/// # use tern::{BedrockClient, Config};
/// # fn main() -> tern::Result<()> {
/// let client = BedrockClient::builder()
///     .config(&Config::default())
///     .bearer_token("my-api-key")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BedrockClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    token: Option<String>,
}

impl BedrockClient {
    /// Create a new client builder for fluent configuration
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// URL of the invoke call for `request`
    pub fn invoke_url(&self, request: &InferenceRequest) -> std::result::Result<Url, InferenceFailure> {
        let base = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", request.region),
        };
        let model: String = url::form_urlencoded::byte_serialize(request.model_id.as_bytes()).collect();
        let raw = format!("{}/model/{}/invoke", base, model);
        Url::parse(&raw).map_err(|e| {
            InferenceFailure::new(
                FailureKind::ConnectionError,
                format!("invalid endpoint URL '{}': {}", raw, e),
            )
        })
    }
}

#[async_trait]
impl InferenceBackend for BedrockClient {
    async fn invoke(&self, request: &InferenceRequest) -> std::result::Result<String, InferenceFailure> {
        let token = self.token.as_deref().ok_or_else(|| {
            InferenceFailure::new(
                FailureKind::AccessDenied,
                format!("no Bedrock credentials found ({} is not set)", BEARER_TOKEN_ENV),
            )
        })?;
        let url = self.invoke_url(request)?;
        debug!(%url, model = %request.model_id, "invoking model");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request.body())
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_type = response
                .headers()
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, error_type.as_deref(), &body));
        }

        let body: Value = response.json().await.map_err(classify_transport)?;
        Ok(extract_text(&body))
    }
}

/// Builder for creating `BedrockClient` instances
///
/// The bearer token defaults to the `AWS_BEARER_TOKEN_BEDROCK` environment
/// variable.
pub struct ClientBuilder {
    endpoint: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            token: std::env::var(BEARER_TOKEN_ENV)
                .ok()
                .filter(|t| !t.trim().is_empty()),
            timeout: None,
        }
    }

    /// Take the endpoint override and timeout from `config`
    pub fn config(mut self, config: &Config) -> Self {
        self.endpoint = config.bedrock.endpoint.clone();
        self.timeout = Some(config.timeout());
        self
    }

    /// Send requests to `endpoint` instead of the regional AWS host
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use an explicit bearer token
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Drop any bearer token, including one picked up from the environment
    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }

    /// Default timeout for requests that do not carry their own
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the final client instance
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn build(self) -> Result<BedrockClient> {
        let mut http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(format!("tern/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        Ok(BedrockClient {
            http: http.build()?,
            endpoint: self.endpoint,
            token: self.token,
        })
    }
}

/// Pull the generated text out of a model response
pub fn extract_text(body: &Value) -> String {
    if let Some(content) = body.get("content") {
        if let Some(items) = content.as_array() {
            return items
                .first()
                .and_then(|item| item.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }
        if let Some(text) = content.as_str() {
            return text.to_string();
        }
    }
    if let Some(text) = body.get("completion").and_then(Value::as_str) {
        return text.to_string();
    }
    if let Some(completions) = body.get("completions").and_then(Value::as_array) {
        return completions
            .first()
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
    }
    for key in ["text", "output", "generated_text"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    body.to_string()
}

/// Classify a failure that happened before a response was read
pub fn classify_transport(err: reqwest::Error) -> InferenceFailure {
    if err.is_timeout() {
        InferenceFailure::new(FailureKind::Timeout, err.to_string())
    } else if err.is_connect() {
        InferenceFailure::new(FailureKind::ConnectionError, err.to_string())
    } else if err.is_decode() {
        InferenceFailure::new(
            FailureKind::Unclassified,
            format!("malformed response from Bedrock: {}", err),
        )
    } else {
        InferenceFailure::new(FailureKind::Unclassified, err.to_string())
    }
}

/// Classify a non-success HTTP response from the endpoint
pub fn classify_response(
    status: StatusCode,
    error_type: Option<&str>,
    body: &str,
) -> InferenceFailure {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let code = error_type
        .map(|t| t.split(':').next().unwrap_or(t).trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| {
            let parsed = parsed.as_ref()?;
            let raw = parsed
                .get("__type")
                .or_else(|| parsed.get("code"))
                .and_then(Value::as_str)?;
            Some(raw.rsplit('#').next().unwrap_or(raw).to_string())
        });

    let message = parsed
        .as_ref()
        .and_then(|p| p.get("message").or_else(|| p.get("Message")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.to_string()
            }
        });

    let kind = failure_kind(code.as_deref(), status, &message);
    let message = match code {
        Some(code) => format!("{}: {}", code, message),
        None => message,
    };
    InferenceFailure::new(kind, message)
}

fn failure_kind(code: Option<&str>, status: StatusCode, message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    match code {
        Some("ExpiredTokenException") | Some("TokenRefreshRequired") => {
            FailureKind::ExpiredCredentials
        }
        Some("AccessDeniedException") | Some("UnrecognizedClientException")
            if lower.contains("expired") =>
        {
            FailureKind::ExpiredCredentials
        }
        Some("AccessDeniedException") | Some("UnrecognizedClientException") => {
            FailureKind::AccessDenied
        }
        Some("ResourceNotFoundException") => FailureKind::ModelNotFound,
        Some("ValidationException") if lower.contains("model identifier") => {
            FailureKind::ModelNotFound
        }
        Some("ModelTimeoutException") => FailureKind::Timeout,
        Some(_) => FailureKind::Unclassified,
        None => match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::AccessDenied,
            StatusCode::NOT_FOUND => FailureKind::ModelNotFound,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FailureKind::Timeout,
            _ => FailureKind::Unclassified,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(model: &str) -> InferenceRequest {
        InferenceRequest {
            model_id: model.to_string(),
            region: "us-east-2".to_string(),
            prompt: "explain".to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            timeout: Duration::from_secs(5),
        }
    }

    fn client_for(server: &MockServer) -> BedrockClient {
        BedrockClient::builder()
            .endpoint(server.uri())
            .bearer_token("test-token")
            .build()
            .unwrap()
    }

    #[test]
    fn test_request_from_config_and_result() {
        let mut config = Config::default();
        config.bedrock.model_id = Some("us.anthropic.claude-sonnet-4-20250514-v1:0".into());
        config.bedrock.region = Some("us-east-2".into());
        config.bedrock.timeout = 42;
        let result = CommandResult {
            command: "ls".into(),
            exit_code: 0,
            stdout_excerpt: "a\n".into(),
            stderr_excerpt: String::new(),
            truncated: false,
            partial_capture: false,
            stdout_bytes: 2,
            stderr_bytes: 0,
            started_at: Utc::now(),
            duration: Duration::from_millis(1),
        };

        let request = InferenceRequest::new(&config, &result);
        assert_eq!(request.region, "us-east-2");
        assert_eq!(request.timeout, Duration::from_secs(42));
        assert!(request.prompt.contains("Command: `ls`"));
        assert!(request.is_anthropic());
    }

    #[test]
    fn test_body_shapes() {
        let anthropic = request("anthropic.claude-v2").body();
        assert_eq!(anthropic["anthropic_version"], ANTHROPIC_VERSION);
        assert_eq!(anthropic["messages"][0]["role"], "user");
        assert_eq!(anthropic["messages"][0]["content"], "explain");
        assert_eq!(anthropic["max_tokens"], 2000);

        let generic = request("meta.llama3-70b-instruct-v1").body();
        assert_eq!(generic["prompt"], "explain");
        assert!(generic.get("messages").is_none());
    }

    #[test]
    fn test_invoke_url_encodes_model_id() {
        let client = BedrockClient::builder().without_token().build().unwrap();
        let url = client
            .invoke_url(&request("us.anthropic.claude-sonnet-4-20250514-v1:0"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://bedrock-runtime.us-east-2.amazonaws.com/model/us.anthropic.claude-sonnet-4-20250514-v1%3A0/invoke"
        );

        let client = BedrockClient::builder()
            .endpoint("http://localhost:9000/")
            .build()
            .unwrap();
        let url = client.invoke_url(&request("m")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/model/m/invoke");
    }

    #[test]
    fn test_extract_text_variants() {
        let cases = vec![
            (json!({"content": [{"type": "text", "text": "claude"}]}), "claude"),
            (json!({"content": "plain"}), "plain"),
            (json!({"completion": "legacy"}), "legacy"),
            (json!({"completions": [{"text": "first"}]}), "first"),
            (json!({"generated_text": "gen"}), "gen"),
            (json!({"output": "out"}), "out"),
        ];
        for (body, expected) in cases {
            assert_eq!(extract_text(&body), expected);
        }
        assert_eq!(extract_text(&json!({"odd": 1})), r#"{"odd":1}"#);
    }

    #[test]
    fn test_classify_by_error_code() {
        let cases = vec![
            ("AccessDeniedException", "not allowed", FailureKind::AccessDenied),
            ("UnrecognizedClientException", "bad key", FailureKind::AccessDenied),
            ("ResourceNotFoundException", "no such model", FailureKind::ModelNotFound),
            ("ExpiredTokenException", "expired", FailureKind::ExpiredCredentials),
            ("TokenRefreshRequired", "refresh", FailureKind::ExpiredCredentials),
            (
                "ValidationException",
                "The provided model identifier is invalid.",
                FailureKind::ModelNotFound,
            ),
            ("ValidationException", "max_tokens too big", FailureKind::Unclassified),
            ("ThrottlingException", "slow down", FailureKind::Unclassified),
        ];
        for (code, message, expected) in cases {
            let body = json!({ "message": message }).to_string();
            let failure = classify_response(StatusCode::BAD_REQUEST, Some(code), &body);
            assert_eq!(failure.kind, expected, "code {}", code);
            assert!(failure.message.contains(message));
            assert!(failure.message.starts_with(code));
        }
    }

    #[test]
    fn test_classify_reads_type_from_body_and_falls_back_to_status() {
        let body = r#"{"__type": "com.amazon.coral.service#AccessDeniedException", "Message": "nope"}"#;
        let failure = classify_response(StatusCode::BAD_REQUEST, None, body);
        assert_eq!(failure.kind, FailureKind::AccessDenied);
        assert_eq!(failure.message, "AccessDeniedException: nope");

        let failure = classify_response(StatusCode::NOT_FOUND, None, "");
        assert_eq!(failure.kind, FailureKind::ModelNotFound);
        let failure = classify_response(StatusCode::FORBIDDEN, None, "denied");
        assert_eq!(failure.kind, FailureKind::AccessDenied);
        assert_eq!(failure.message, "denied");
        let failure = classify_response(StatusCode::INTERNAL_SERVER_ERROR, None, "");
        assert_eq!(failure.kind, FailureKind::Unclassified);
    }

    #[test]
    fn test_header_error_type_strips_suffix() {
        let failure = classify_response(
            StatusCode::FORBIDDEN,
            Some("ExpiredTokenException:http://internal.amazon.com/coral/"),
            r#"{"message": "The security token included in the request is expired"}"#,
        );
        assert_eq!(failure.kind, FailureKind::ExpiredCredentials);
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/anthropic.claude-v2/invoke"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "All good."}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .invoke(&request("anthropic.claude-v2"))
            .await
            .unwrap();
        assert_eq!(text, "All good.");
    }

    #[tokio::test]
    async fn test_invoke_classifies_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("x-amzn-ErrorType", "ResourceNotFoundException:")
                    .set_body_json(json!({"message": "Model not found"})),
            )
            .mount(&server)
            .await;

        let failure = client_for(&server)
            .invoke(&request("anthropic.claude-v9"))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::ModelNotFound);
        assert_eq!(failure.message, "ResourceNotFoundException: Model not found");
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"completion": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut req = request("anthropic.claude-v2");
        req.timeout = Duration::from_millis(200);
        let failure = client_for(&server).invoke(&req).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_invoke_connection_refused() {
        let client = BedrockClient::builder()
            .endpoint("http://127.0.0.1:1")
            .bearer_token("t")
            .build()
            .unwrap();
        let failure = client.invoke(&request("m")).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::ConnectionError);
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = BedrockClient::builder()
            .endpoint(server.uri())
            .without_token()
            .build()
            .unwrap();
        let failure = client.invoke(&request("m")).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::AccessDenied);
        assert!(failure.message.contains(BEARER_TOKEN_ENV));
    }
}
