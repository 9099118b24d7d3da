use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::case::Method;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Setup(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: Url, message: String },

    #[error("response from {url} is not valid JSON")]
    Decode {
        url: Url,
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    fn transport(url: &Url, error: reqwest::Error) -> Self {
        ClientError::Transport {
            url: url.clone(),
            message: error_chain(&error),
        }
    }
}

/// Renders an error together with all of its sources on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

/// One round trip per call, no retries.
pub trait HttpClient {
    async fn get(&self, url: Url) -> Result<Value, ClientError>;

    async fn post(&self, url: Url, body: Value) -> Result<Value, ClientError>;

    async fn delete(&self, url: Url, body: Option<Value>) -> Result<Value, ClientError>;

    /// Bare GET that only observes whether the connection was established.
    ///
    /// Gives up after `timeout`, which overrides the client-wide request
    /// timeout.
    async fn probe(&self, url: &Url, timeout: Duration) -> Result<(), ClientError>;

    /// Dispatches on the request's method. A POST without a body sends `{}`.
    async fn execute(&self, request: ApiRequest) -> Result<Value, ClientError> {
        match request.method {
            Method::Get => self.get(request.url).await,
            Method::Post => {
                let body = request
                    .body
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                self.post(request.url, body).await
            }
            Method::Delete => self.delete(request.url, request.body).await,
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| ClientError::Setup(error_chain(&e)))?;

        Ok(Self { client })
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, ClientError> {
        debug!(%method, %url, "sending request");

        let mut request = self.client.request(method.into(), url.clone());

        if matches!(method, Method::Post | Method::Delete) {
            request = request.header(CONTENT_TYPE, "application/json");
        }

        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::transport(&url, e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| ClientError::transport(&url, e))?;

        debug!(%status, bytes = body_text.len(), "received response");

        serde_json::from_str(&body_text).map_err(|source| ClientError::Decode {
            url,
            body: body_text,
            source,
        })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: Url) -> Result<Value, ClientError> {
        self.send(Method::Get, url, None).await
    }

    async fn post(&self, url: Url, body: Value) -> Result<Value, ClientError> {
        self.send(Method::Post, url, Some(body)).await
    }

    async fn delete(&self, url: Url, body: Option<Value>) -> Result<Value, ClientError> {
        self.send(Method::Delete, url, body).await
    }

    async fn probe(&self, url: &Url, timeout: Duration) -> Result<(), ClientError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ClientError::transport(url, e))?;

        debug!(status = %response.status(), "probe connected");

        Ok(())
    }
}
