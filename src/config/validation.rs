//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as a missing or malformed upstream URL, a zero timeout,
//! and invalid custom header rules. Returns a list of
//! [`ValidationError`] values with per-field suggestions.

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Validate the upstream origin URL. Returns `Ok(())` or a human-readable error.
pub fn validate_upstream_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err("url cannot be empty".into());
    }
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{url}' has no host"))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(msg) = validate_upstream_url(&config.upstream.url) {
        errors.push(ValidationError {
            section: "upstream".into(),
            field: "url".into(),
            message: msg,
            suggestion: if config.upstream.url.is_empty() {
                Some("e.g. http://localhost:8080".into())
            } else if !config.upstream.url.contains("://") {
                Some(format!("did you mean 'http://{}'?", config.upstream.url))
            } else {
                None
            },
        });
    }

    if config.forwarding.timeout == 0 {
        errors.push(ValidationError {
            section: "forwarding".into(),
            field: "timeout".into(),
            message: "timeout must be greater than zero".into(),
            suggestion: Some("omit the field for the 30000ms default".into()),
        });
    }

    for (key, value) in &config.forwarding.headers.add {
        if key.parse::<HeaderName>().is_err() {
            errors.push(ValidationError {
                section: "forwarding".into(),
                field: "headers.add".into(),
                message: format!("'{key}' is not a valid header name"),
                suggestion: None,
            });
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError {
                section: "forwarding".into(),
                field: "headers.add".into(),
                message: format!("value for '{key}' is not a valid header value"),
                suggestion: None,
            });
        }
    }

    for key in &config.forwarding.headers.strip {
        if key.parse::<HeaderName>().is_err() {
            errors.push(ValidationError {
                section: "forwarding".into(),
                field: "headers.strip".into(),
                message: format!("'{key}' is not a valid header name"),
                suggestion: None,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let auth = if config.auth.enforce {
        "authorization header required"
    } else {
        "disabled (all requests forwarded)"
    };

    let lines = [
        format!("  upstream: {}", config.upstream.url),
        format!("  auth:     {auth}"),
        format!("  timeout:  {}ms", config.forwarding.timeout),
        format!(
            "  headers:  {} added, {} stripped",
            config.forwarding.headers.add.len(),
            config.forwarding.headers.strip.len()
        ),
    ];

    format!("{} is valid\n{}", path, lines.join("\n"))
}
