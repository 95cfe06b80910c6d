use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{InvokeRequest, ModelAdapter, ModelResponse, TokenSink};
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS,
    STREAM_TTFB,
};
use crate::sse::{StreamEvent, process_sse};
use crate::turn_logger::TurnLogger;
use crate::types::ResponseMetadata;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable consulted when no API key is passed explicitly.
pub const API_KEY_VARIABLE: &str = "CHATWINDOW_API_KEY";

/// Streaming client for a Messages-style backend.
#[derive(Clone)]
pub struct MessagesClient {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
    logger: Option<Arc<dyn TurnLogger>>,
}

impl fmt::Debug for MessagesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagesClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl MessagesClient {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the `CHATWINDOW_API_KEY`
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_VARIABLE).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_VARIABLE} environment variable not set"
                ))
            })?,
        };
        HeaderValue::from_str(&api_key)
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url::Url::parse(&base_url)
            .map_err(|e| Error::url(format!("Invalid base URL {base_url:?}: {e}"), Some(e)))?;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
            logger: None,
        })
    }

    /// Send every request body and stream event to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn TurnLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| Error::authentication("API key contains invalid header characters"))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_API_VERSION),
        );
        Ok(headers)
    }

    /// Build the JSON body for one streaming request.
    fn request_body(request: InvokeRequest<'_>) -> serde_json::Value {
        let parameters = request.parameters;
        let mut body = json!({
            "model": request.model.model_id,
            "max_tokens": parameters.max_tokens,
            "temperature": parameters.temperature,
            "top_p": parameters.top_p,
            "top_k": parameters.top_k,
            "messages": request.context,
            "stream": true,
        });
        if let Some(system) = parameters.system_prompt.as_deref()
            && !system.is_empty()
        {
            body["system"] = json!(system);
        }
        body
    }

    fn send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let request_id = response
            .headers()
            .get("request-id")
            .or_else(|| response.headers().get("x-request-id"))
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_message = detail
            .and_then(|e| e.message)
            .unwrap_or_else(|| error_body.clone());

        match status_code {
            401 => Error::authentication(error_message),
            408 => Error::timeout(error_message, None),
            _ => Error::api(status_code, error_type, error_message, request_id),
        }
    }
}

#[async_trait::async_trait]
impl ModelAdapter for MessagesClient {
    async fn invoke(
        &self,
        request: InvokeRequest<'_>,
        sink: &mut dyn TokenSink,
    ) -> Result<ModelResponse> {
        let body = Self::request_body(request);
        if let Some(logger) = &self.logger {
            logger.log_request(&body);
        }

        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let url = format!("{}messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.default_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.send_error(e)
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        let byte_stream = response.bytes_stream().inspect(|chunk| {
            if let Ok(bytes) = chunk {
                STREAM_BYTES.count(bytes.len() as u64);
            }
        });
        let mut events = Box::pin(process_sse(byte_stream));

        let mut text = String::new();
        let mut metadata = ResponseMetadata::default();
        let mut first_event = true;
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    STREAM_ERRORS.click();
                    return Err(err);
                }
            };
            if first_event {
                STREAM_TTFB.add(start.elapsed().as_secs_f64());
                first_event = false;
            }
            STREAM_EVENTS.click();
            if let Some(logger) = &self.logger {
                logger.log_stream_event(&event);
            }
            match event {
                StreamEvent::MessageStart {
                    model,
                    input_tokens,
                } => {
                    metadata.model = model;
                    metadata.input_tokens = input_tokens;
                }
                StreamEvent::TextDelta { text: fragment, .. } => {
                    sink.on_token(&fragment);
                    text.push_str(&fragment);
                }
                StreamEvent::MessageDelta {
                    stop_reason,
                    output_tokens,
                } => {
                    if stop_reason.is_some() {
                        metadata.stop_reason = stop_reason;
                    }
                    metadata.output_tokens = output_tokens;
                }
                StreamEvent::MessageStop => break,
                StreamEvent::Ping
                | StreamEvent::ContentBlockStart { .. }
                | StreamEvent::OtherDelta { .. }
                | StreamEvent::ContentBlockStop { .. } => {}
            }
        }

        let response = ModelResponse::text(text).with_metadata(metadata);
        if let Some(logger) = &self.logger {
            logger.log_response(&response);
        }
        Ok(response)
    }
}
