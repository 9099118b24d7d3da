use std::collections::HashMap;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use thiserror::Error;
use url::Url;

use crate::case::Method;
use crate::case::TestCase;
use crate::parser::Cleanup;
use crate::parser::Setup;
use crate::parser::TestFile;

/// Everything a run needs, built once by the entry point.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub tests: Vec<TestCase>,
    pub setup: Option<ServiceSetup>,
    pub cleanup: Option<CleanupAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSetup {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Reset call sent to the service after a failing run.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupAction {
    pub method: Method,
    pub url: Url,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid field `{field}`: {message}")]
pub struct ValidationError {
    field: String,
    message: String,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("invalid value here")]
    span: Option<SourceSpan>,
}

macro_rules! validation_err {
    ($field:expr, $msg:expr, $self:expr, $snippet:expr) => {
        ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
            src: Some(NamedSource::new(
                $self.file_name.clone(),
                $self.src.clone(),
            )),
            span: find_span($snippet, &$self.src),
        }
    };
}

fn find_span(needle: &str, src: &str) -> Option<SourceSpan> {
    if needle.is_empty() {
        return None;
    }

    src.find(needle)
        .map(|start| SourceSpan::new(start.into(), needle.len()))
}

/// Checks the run-wide settings of a test file.
///
/// Test cases pass through untouched. They are validated one by one when the
/// runner reaches them, so a bad case only stops the run at that case.
pub struct Validator {
    test_file: TestFile,
    src: String,
    file_name: String,
}

impl Validator {
    pub fn new(test_file: &TestFile, src: &str, file_name: &str) -> Self {
        Self {
            test_file: test_file.clone(),
            src: src.into(),
            file_name: file_name.into(),
        }
    }

    pub fn validate(&self) -> Result<Config, ValidationError> {
        let base_url = self.validate_base_url()?;
        let setup = self
            .test_file
            .setup
            .as_ref()
            .map(|setup| self.validate_setup(setup))
            .transpose()?;
        let cleanup = self
            .test_file
            .cleanup
            .as_ref()
            .map(|cleanup| self.validate_cleanup(cleanup, &base_url))
            .transpose()?;

        Ok(Config {
            base_url,
            tests: self.test_file.tests.clone(),
            setup,
            cleanup,
        })
    }

    fn validate_base_url(&self) -> Result<Url, ValidationError> {
        let TestFile {
            protocol,
            host,
            port,
            ..
        } = &self.test_file;

        if !matches!(protocol.as_str(), "http" | "https") {
            return Err(validation_err!(
                "protocol",
                format!("expected `http` or `https`, got `{protocol}`"),
                self,
                protocol
            ));
        }

        if host.trim().is_empty() {
            return Err(validation_err!("host", "the host can't be empty", self, "host"));
        }

        if host.contains(['/', '\\', '@', '?', '#']) {
            return Err(validation_err!(
                "host",
                "expected a bare host name or address, without path, user or query",
                self,
                host
            ));
        }

        Url::parse(&format!("{protocol}://{host}:{port}"))
            .map_err(|e| validation_err!("host", format!("not a valid base URL: {e}"), self, host))
    }

    fn validate_setup(&self, setup: &Setup) -> Result<ServiceSetup, ValidationError> {
        if setup.command.trim().is_empty() {
            return Err(validation_err!(
                "setup.command",
                "the command used to start the service can't be empty",
                self,
                "command"
            ));
        }

        Ok(ServiceSetup {
            command: setup.command.clone(),
            args: setup.args.clone().unwrap_or_default(),
            env: setup.env.clone().unwrap_or_default(),
        })
    }

    fn validate_cleanup(
        &self,
        cleanup: &Cleanup,
        base_url: &Url,
    ) -> Result<CleanupAction, ValidationError> {
        let method = match &cleanup.method {
            Some(method) => method
                .parse::<Method>()
                .map_err(|e| validation_err!("cleanup.method", e, self, method))?,
            None => Method::Post,
        };

        let url = base_url.join(&cleanup.path).map_err(|e| {
            validation_err!(
                "cleanup.path",
                format!("can't be joined to the base URL: {e}"),
                self,
                &cleanup.path
            )
        })?;

        Ok(CleanupAction {
            method,
            url,
            data: cleanup.data.clone(),
        })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::case::Method;
    use crate::parser::Format;
    use crate::parser::from_str;
    use crate::validator::Config;
    use crate::validator::ValidationError;
    use crate::validator::Validator;

    fn validate(src: &str) -> Result<Config, ValidationError> {
        let file = from_str(src, Format::Json).unwrap();
        Validator::new(&file, src, "config.json").validate()
    }

    #[test]
    fn base_url_is_composed_from_parts() {
        let config = validate(r#"{"protocol": "http", "host": "localhost", "port": 7777, "tests": []}"#)
            .unwrap();

        assert_eq!(config.base_url.as_str(), "http://localhost:7777/");
        assert!(config.setup.is_none());
        assert!(config.cleanup.is_none());
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let error = validate(r#"{"protocol": "ftp", "host": "localhost", "port": 21, "tests": []}"#)
            .unwrap_err();

        assert!(error.to_string().contains("`protocol`"));
    }

    #[test]
    fn host_must_not_reshape_the_base_url() {
        for host in ["localhost/x", "user@evil", "localhost?q=1", "localhost#top"] {
            let src = format!(
                r#"{{"protocol": "http", "host": "{host}", "port": 7777, "tests": []}}"#
            );

            let error = validate(&src).unwrap_err();

            assert!(error.to_string().contains("`host`"), "{host} was accepted");
        }
    }

    #[test]
    fn ip_hosts_are_accepted() {
        let config = validate(r#"{"protocol": "http", "host": "127.0.0.1", "port": 8080, "tests": []}"#)
            .unwrap();

        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/");

        let config = validate(r#"{"protocol": "http", "host": "[::1]", "port": 8080, "tests": []}"#)
            .unwrap();

        assert_eq!(config.base_url.host_str(), Some("[::1]"));
    }

    #[test]
    fn test_cases_are_not_validated_up_front() {
        let config = validate(
            r#"{"protocol": "http", "host": "localhost", "port": 1, "tests": [
                {"name": "later", "method": "PATCH", "path": "/", "wait": -4, "response": {}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(config.tests.len(), 1);
        assert_eq!(config.tests[0].method, "PATCH");
    }

    #[test]
    fn cleanup_defaults_to_post() {
        let config = validate(
            r#"{"protocol": "http", "host": "localhost", "port": 7777, "tests": [],
                "cleanup": {"path": "/api/clear", "data": {"all": true}}}"#,
        )
        .unwrap();

        let cleanup = config.cleanup.unwrap();
        assert_eq!(cleanup.method, Method::Post);
        assert_eq!(cleanup.url.as_str(), "http://localhost:7777/api/clear");
        assert_eq!(cleanup.data, Some(json!({"all": true})));
    }

    #[test]
    fn cleanup_method_is_checked_eagerly() {
        let error = validate(
            r#"{"protocol": "http", "host": "localhost", "port": 7777, "tests": [],
                "cleanup": {"path": "/api/clear", "method": "PUT"}}"#,
        )
        .unwrap_err();

        assert!(error.to_string().contains("`cleanup.method`"));
    }

    #[test]
    fn setup_needs_a_command() {
        let error = validate(
            r#"{"protocol": "http", "host": "localhost", "port": 7777, "tests": [],
                "setup": {"command": "  "}}"#,
        )
        .unwrap_err();

        assert!(error.to_string().contains("`setup.command`"));
    }

    #[test]
    fn setup_fills_defaults() {
        let config = validate(
            r#"{"protocol": "http", "host": "localhost", "port": 7777, "tests": [],
                "setup": {"command": "lein", "env": {"PORT": "7777"}}}"#,
        )
        .unwrap();

        let setup = config.setup.unwrap();
        assert_eq!(setup.command, "lein");
        assert!(setup.args.is_empty());
        assert_eq!(setup.env.get("PORT").map(String::as_str), Some("7777"));
    }
}
