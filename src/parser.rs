use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::case::TestCase;

#[derive(Deserialize, Debug, Clone)]
pub struct TestFile {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub tests: Vec<TestCase>,
    pub setup: Option<Setup>,
    pub cleanup: Option<Cleanup>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Setup {
    pub command: String,
    pub args: Option<Vec<String>>,
    pub env: Option<HashMap<String, String>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Cleanup {
    pub path: String,
    pub method: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    pub fn from_path(path: &str) -> Self {
        match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Json,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML")]
    Toml(#[from] toml::de::Error),
}

pub fn from_str(contents: &str, format: Format) -> Result<TestFile, ParseError> {
    let test_file = match format {
        Format::Json => serde_json::from_str(contents)?,
        Format::Toml => toml::from_str(contents)?,
    };

    Ok(test_file)
}
