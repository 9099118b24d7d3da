use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::client::ApiRequest;

/// The HTTP methods a test case may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl FromStr for Method {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            _ => Err(CaseError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CaseError {
    #[error("unsupported HTTP method `{0}`, expected one of GET, POST or DELETE")]
    UnsupportedMethod(String),

    #[error("method POST requires a `data` body")]
    MissingBody,

    #[error("`wait` must be a non-negative number of seconds, got {0}")]
    InvalidWait(f64),

    #[error("`path` `{path}` can't be joined to the base URL: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// One declarative request/expected-response pair.
///
/// Fields are kept as they were written in the config file. Nothing is
/// checked when the file is loaded; the accessors below validate a case
/// when the runner reaches it.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub method: String,
    pub path: String,
    pub data: Option<serde_json::Value>,
    /// Seconds to sleep before the request is sent.
    pub wait: Option<f64>,
    pub response: serde_json::Value,
}

impl TestCase {
    pub fn method(&self) -> Result<Method, CaseError> {
        self.method.parse()
    }

    pub fn delay(&self) -> Result<Option<Duration>, CaseError> {
        match self.wait {
            None => Ok(None),
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|_| CaseError::InvalidWait(secs)),
        }
    }

    pub fn url(&self, base_url: &Url) -> Result<Url, CaseError> {
        base_url
            .join(&self.path)
            .map_err(|e| CaseError::InvalidPath {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Builds the request this case sends against `base_url`.
    pub fn request(&self, base_url: &Url) -> Result<ApiRequest, CaseError> {
        let method = self.method()?;
        let url = self.url(base_url)?;

        let body = match method {
            Method::Get => None,
            Method::Post => Some(self.data.clone().ok_or(CaseError::MissingBody)?),
            Method::Delete => self.data.clone(),
        };

        Ok(ApiRequest { method, url, body })
    }
}
