//! Narrative Generator Client
//!
//! Blocking client for an OpenAI-compatible Responses endpoint.
//! One prompt in, plain text out.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompt::NarrativeRequest;
use crate::constants::MAX_NARRATIVE_BACKOFF_MS;
use crate::logic::config::NarrativeConfig;
use crate::logic::error::NarrativeError;

/// Longest error body kept in `NarrativeError::Status`
const ERROR_BODY_LIMIT: usize = 512;

pub trait NarrativeGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &NarrativeRequest) -> Result<String, NarrativeError>;
}

// ============================================================================
// DISABLED
// ============================================================================

/// Used when narration is switched off or no API key is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

impl NarrativeGenerator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    fn generate(&self, _request: &NarrativeRequest) -> Result<String, NarrativeError> {
        Err(NarrativeError::NotConfigured)
    }
}

// ============================================================================
// RESPONSES API
// ============================================================================

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct ResponsesClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ResponsesClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_retries: 0,
            retry_backoff: Duration::ZERO,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn from_config(config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let api_key = config.api_key.as_deref().ok_or(NarrativeError::NotConfigured)?;

        Ok(Self::new(
            &config.base_url,
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
        .with_retries(config.max_retries, Duration::from_millis(config.retry_backoff_ms)))
    }

    fn send(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        let url = format!("{}/responses", self.base_url);
        let body = serde_json::to_string(&ResponsesRequest {
            model: &self.model,
            input: &request.prompt,
            max_output_tokens: request.max_output_tokens,
        })
        .map_err(|e| NarrativeError::Parse(e.to_string()))?;

        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_string(&body);

        match response {
            Ok(resp) => {
                let text = resp.into_string().map_err(|e| NarrativeError::Network(e.to_string()))?;
                parse_output_text(&text)
            }
            Err(ureq::Error::Status(status, resp)) => {
                let body: String = resp.into_string().unwrap_or_default().chars().take(ERROR_BODY_LIMIT).collect();
                Err(NarrativeError::Status { status, body })
            }
            Err(ureq::Error::Transport(transport)) if is_timeout(&transport) => Err(NarrativeError::Timeout),
            Err(ureq::Error::Transport(transport)) => Err(NarrativeError::Network(transport.to_string())),
        }
    }

    /// Doubling backoff, capped at `MAX_NARRATIVE_BACKOFF_MS`
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(Duration::from_millis(MAX_NARRATIVE_BACKOFF_MS))
    }
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    if !matches!(transport.kind(), ureq::ErrorKind::Io) {
        return false;
    }
    std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .map_or(false, |io| {
            matches!(io.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock)
        })
}

impl NarrativeGenerator for ResponsesClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        let mut attempt = 0;
        loop {
            match self.send(request) {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_delay(attempt);
                    log::info!(
                        "Narrative request failed ({}), retry {}/{} in {}ms",
                        e,
                        attempt + 1,
                        self.max_retries,
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Aggregated `output_text`, else the `output_text` parts of `output[].content[]`
pub fn parse_output_text(body: &str) -> Result<String, NarrativeError> {
    let reply: ResponsesReply = serde_json::from_str(body).map_err(|e| NarrativeError::Parse(e.to_string()))?;

    if let Some(text) = reply.output_text.filter(|t| !t.trim().is_empty()) {
        return Ok(text.trim().to_string());
    }

    let text = reply
        .output
        .iter()
        .flat_map(|item| &item.content)
        .filter(|part| part.kind == "output_text")
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    let text = text.trim();
    if text.is_empty() {
        return Err(NarrativeError::Empty);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn request() -> NarrativeRequest {
        NarrativeRequest { prompt: "hello".into(), max_output_tokens: 42 }
    }

    /// Serve one canned response per connection; report each request head + body
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);

                let mut head = String::new();
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap();
                    }
                    head.push_str(&line);
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                }
                let mut payload = vec![0; content_length];
                reader.read_exact(&mut payload).unwrap();
                tx.send(head + &String::from_utf8(payload).unwrap()).unwrap();

                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                reader.get_mut().write_all(reply.as_bytes()).unwrap();
            }
        });

        (base_url, rx)
    }

    #[test]
    fn test_parse_aggregated_text() {
        let body = r#"{"output_text": "  - Talk to them\n"}"#;
        assert_eq!(parse_output_text(body).unwrap(), "- Talk to them");
    }

    #[test]
    fn test_parse_output_items() {
        let body = r#"{
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "- One"},
                    {"type": "refusal", "refusal": "no"},
                    {"type": "output_text", "text": "- Two"}
                ]}
            ]
        }"#;
        assert_eq!(parse_output_text(body).unwrap(), "- One\n- Two");
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(parse_output_text(r#"{"output": []}"#).unwrap_err(), NarrativeError::Empty);
        assert_eq!(parse_output_text(r#"{"output_text": "   "}"#).unwrap_err(), NarrativeError::Empty);
        assert!(matches!(parse_output_text("not json"), Err(NarrativeError::Parse(_))));
    }

    #[test]
    fn test_disabled_generator() {
        assert_eq!(DisabledGenerator.generate(&request()).unwrap_err(), NarrativeError::NotConfigured);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = NarrativeConfig { api_key: None, ..NarrativeConfig::default() };
        assert!(matches!(ResponsesClient::from_config(&config), Err(NarrativeError::NotConfigured)));
    }

    #[test]
    fn test_request_shape_and_success() {
        let (base_url, requests) = serve(vec![(200, r#"{"output_text": "- Rebalance workload"}"#)]);
        let client = ResponsesClient::new(&base_url, "sk-test", "test-model", Duration::from_secs(5));

        assert_eq!(client.generate(&request()).unwrap(), "- Rebalance workload");

        let seen = requests.recv().unwrap();
        assert!(seen.starts_with("POST /responses "));
        assert!(seen.contains("Bearer sk-test"));
        assert!(seen.contains(r#""model":"test-model""#));
        assert!(seen.contains(r#""input":"hello""#));
        assert!(seen.contains(r#""max_output_tokens":42"#));
    }

    #[test]
    fn test_transient_status_is_retried() {
        let (base_url, requests) = serve(vec![
            (503, r#"{"error": "overloaded"}"#),
            (200, r#"{"output_text": "- Offer flexible hours"}"#),
        ]);
        let client = ResponsesClient::new(&base_url, "sk-test", "test-model", Duration::from_secs(5))
            .with_retries(1, Duration::from_millis(1));

        assert_eq!(client.generate(&request()).unwrap(), "- Offer flexible hours");
        assert_eq!(requests.try_iter().count(), 2);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let (base_url, _requests) = serve(vec![(401, r#"{"error": "bad key"}"#)]);
        let client = ResponsesClient::new(&base_url, "sk-bad", "test-model", Duration::from_secs(5))
            .with_retries(3, Duration::from_millis(1));

        match client.generate(&request()) {
            Err(NarrativeError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        std::thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(3));
        });

        let client = ResponsesClient::new(&base_url, "sk-test", "test-model", Duration::from_millis(200));
        assert_eq!(client.generate(&request()).unwrap_err(), NarrativeError::Timeout);
    }

    #[test]
    fn test_refused_connection_is_network_error() {
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let client = ResponsesClient::new(
            &format!("http://127.0.0.1:{}", port),
            "sk-test",
            "test-model",
            Duration::from_secs(2),
        );
        assert!(matches!(client.generate(&request()), Err(NarrativeError::Network(_))));
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let client = ResponsesClient::new("http://localhost", "sk", "m", Duration::from_secs(1))
            .with_retries(40, Duration::from_millis(500));

        assert_eq!(client.retry_delay(0), Duration::from_millis(500));
        assert_eq!(client.retry_delay(2), Duration::from_millis(2000));
        assert_eq!(client.retry_delay(5), Duration::from_millis(MAX_NARRATIVE_BACKOFF_MS));
        assert_eq!(client.retry_delay(39), Duration::from_millis(MAX_NARRATIVE_BACKOFF_MS));
    }
}
