//! Transport helpers shared by every connector: timeouts, failure
//! classification and status/body decoding.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::{LumenError, LumenResult};

/// Discovery budget for the default backend, which the UI polls.
pub const FAST_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(120);
pub const LONG_CHAT_TIMEOUT: Duration = Duration::from_secs(300);

const BODY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Refused,
    Timeout,
    HostNotFound,
    Unreachable,
    Other,
}

#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub kind: TransportKind,
    /// Error text with its cause chain. Never contains the request URL, which
    /// may carry an API key.
    pub detail: String,
}

impl TransportFailure {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let timed_out = err.is_timeout();
        let err = err.without_url();
        let mut detail = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }

        let lower = detail.to_lowercase();
        let kind = if timed_out || lower.contains("timed out") || lower.contains("deadline") {
            TransportKind::Timeout
        } else if lower.contains("connection refused") {
            TransportKind::Refused
        } else if lower.contains("dns error")
            || lower.contains("failed to lookup")
            || lower.contains("no such host")
            || lower.contains("name or service not known")
        {
            TransportKind::HostNotFound
        } else if lower.contains("network is unreachable") || lower.contains("no route to host") {
            TransportKind::Unreachable
        } else {
            TransportKind::Other
        };
        Self { kind, detail }
    }

    pub fn timed_out(&self) -> bool {
        self.kind == TransportKind::Timeout
    }
}

/// Fully read response.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

pub async fn read_reply(response: Response) -> Result<Reply, reqwest::Error> {
    let status = response.status();
    let body = response.text().await?;
    Ok(Reply { status, body })
}

impl Reply {
    /// `"404 Not Found"`.
    pub fn status_line(&self) -> String {
        status_line(self.status)
    }

    pub fn preview(&self) -> String {
        let trimmed = self.body.trim();
        if trimmed.chars().count() <= BODY_PREVIEW_CHARS {
            return trimmed.to_string();
        }
        let mut cut: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
        cut.push('…');
        cut
    }

    /// Parse the body as `T`. An error object embedded in the body wins over
    /// the HTTP status; a non-2xx status wins over a parse failure.
    pub fn decode<T, F>(&self, label: &str, embedded_error: F) -> LumenResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Option<String>,
    {
        match serde_json::from_str::<T>(&self.body) {
            Ok(parsed) => {
                if let Some(message) = embedded_error(&parsed).filter(|m| !m.is_empty()) {
                    return Err(LumenError::Api(format!("{label} error: {message}")));
                }
                if !self.status.is_success() {
                    return Err(self.protocol_error(label));
                }
                Ok(parsed)
            }
            Err(_) if !self.status.is_success() => Err(self.protocol_error(label)),
            Err(err) => Err(LumenError::Decode(format!(
                "failed to parse {label} response: {err}"
            ))),
        }
    }

    pub fn protocol_error(&self, label: &str) -> LumenError {
        LumenError::Protocol {
            status: self.status.as_u16(),
            message: format!(
                "{label} API error (HTTP {}): {}",
                self.status.as_u16(),
                self.preview()
            ),
        }
    }
}

/// `"2 minutes"`, `"10 seconds"`.
pub fn budget_text(budget: Duration) -> String {
    let secs = budget.as_secs();
    match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) if minutes > 0 => format!("{minutes} minutes"),
        _ if secs == 1 => "1 second".to_string(),
        _ => format!("{secs} seconds"),
    }
}

pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

/// GET `url` with a short budget; any transport failure or status >= 400 is
/// an error.
pub async fn check_connectivity(client: &Client, url: &str) -> LumenResult<()> {
    let response = client
        .get(url)
        .timeout(HEALTH_TIMEOUT)
        .send()
        .await
        .map_err(|err| {
            let failure = TransportFailure::from_reqwest(err);
            LumenError::Transport(format!("connection failed: {}", failure.detail))
        })?;
    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(LumenError::Protocol {
            status: status.as_u16(),
            message: format!("server returned HTTP {}", status.as_u16()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default)]
        text: String,
        #[serde(default)]
        error: Option<String>,
    }

    fn reply(status: u16, body: &str) -> Reply {
        Reply {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn embedded_error_wins_over_status() {
        let err = reply(500, r#"{"error":"model not loaded"}"#)
            .decode::<Body, _>("Backend", |b| b.error.clone())
            .unwrap_err();
        assert_eq!(err, LumenError::Api("Backend error: model not loaded".into()));

        let err = reply(200, r#"{"error":"quota"}"#)
            .decode::<Body, _>("Backend", |b| b.error.clone())
            .unwrap_err();
        assert!(matches!(err, LumenError::Api(_)));
    }

    #[test]
    fn status_wins_over_parse_failure() {
        let err = reply(502, "<html>bad gateway</html>")
            .decode::<Body, _>("Backend", |b| b.error.clone())
            .unwrap_err();
        assert!(matches!(err, LumenError::Protocol { status: 502, .. }));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn malformed_success_body_is_decode_error() {
        let err = reply(200, "not json")
            .decode::<Body, _>("Backend", |b| b.error.clone())
            .unwrap_err();
        assert!(matches!(err, LumenError::Decode(_)));
    }

    #[test]
    fn clean_success_decodes() {
        let body = reply(200, r#"{"text":"hi"}"#)
            .decode::<Body, _>("Backend", |b| b.error.clone())
            .unwrap();
        assert_eq!(body.text, "hi");
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let long = "x".repeat(2_000);
        let preview = reply(500, &long).preview();
        assert_eq!(preview.chars().count(), BODY_PREVIEW_CHARS + 1);
    }

    #[test]
    fn budgets_read_naturally() {
        assert_eq!(budget_text(CHAT_TIMEOUT), "2 minutes");
        assert_eq!(budget_text(LONG_CHAT_TIMEOUT), "5 minutes");
        assert_eq!(budget_text(DISCOVERY_TIMEOUT), "10 seconds");
        assert_eq!(budget_text(Duration::from_secs(90)), "90 seconds");
    }

    #[test]
    fn endpoint_avoids_double_slash() {
        assert_eq!(endpoint("http://h:1/", "/v1/models"), "http://h:1/v1/models");
    }

    #[test]
    fn status_line_matches_http_reason() {
        assert_eq!(status_line(StatusCode::NOT_FOUND), "404 Not Found");
    }
}
