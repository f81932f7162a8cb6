use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kassa_core::{CandidateSet, Money};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ClassifierConfig;
use crate::history::HistoricalExample;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("No classifier token configured")]
    MissingToken,
    #[error("Classifier timed out after {0:?}")]
    Timeout(Duration),
    #[error("Classifier transport error: {0}")]
    Transport(String),
    #[error("Classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Could not parse classifier response: {0}")]
    Parse(String),
    #[error("Classifier suggested {category_id}/{sub_header_id}, which is not a candidate")]
    NotACandidate {
        category_id: String,
        sub_header_id: String,
    },
}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifierError::Transport(format!("request timed out: {e}"))
        } else {
            ClassifierError::Transport(e.to_string())
        }
    }
}

// ── Wire format ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSubHeader {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCategory {
    pub id: String,
    pub name: String,
    pub sub_headers: Vec<CandidateSubHeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextExample {
    pub description: String,
    pub amount: f64,
    pub category_id: String,
    pub sub_header_id: String,
}

/// Body sent to the remote classification function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    pub description: String,
    pub amount: f64,
    pub candidate_categories: Vec<CandidateCategory>,
    pub contextual_examples: Vec<ContextExample>,
}

impl ClassificationRequest {
    pub fn new(
        description: &str,
        amount: Money,
        candidates: &CandidateSet,
        examples: &[HistoricalExample],
    ) -> Self {
        let candidate_categories = candidates
            .categories()
            .iter()
            .map(|c| CandidateCategory {
                id: c.id.clone(),
                name: c.name.clone(),
                sub_headers: c
                    .sub_headers
                    .iter()
                    .map(|s| CandidateSubHeader {
                        id: s.id.clone(),
                        name: s.name.clone(),
                    })
                    .collect(),
            })
            .collect();

        let contextual_examples = examples
            .iter()
            .map(|e| ContextExample {
                description: e.description.clone(),
                amount: e.amount.to_f64(),
                category_id: e.target.category_id.clone(),
                sub_header_id: e.target.sub_header_id.clone(),
            })
            .collect();

        Self {
            description: description.to_string(),
            amount: amount.to_f64(),
            candidate_categories,
            contextual_examples,
        }
    }
}

/// Unvalidated answer from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSuggestion {
    pub category_id: String,
    pub sub_header_id: String,
}

impl RemoteSuggestion {
    pub fn new(category_id: &str, sub_header_id: &str) -> Self {
        Self {
            category_id: category_id.to_string(),
            sub_header_id: sub_header_id.to_string(),
        }
    }
}

/// Parses `{"categoryId": .., "subHeaderId": ..}`. Model-backed endpoints
/// sometimes wrap the object in prose or code fences, so the outermost
/// `{...}` span is tried as a fallback.
pub fn parse_suggestion(body: &str) -> Result<RemoteSuggestion, ClassifierError> {
    let direct = serde_json::from_str::<RemoteSuggestion>(body.trim());
    if let Ok(s) = direct {
        return Ok(s);
    }

    let start = body.find('{');
    let end = body.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<RemoteSuggestion>(&body[start..=end])
                .map_err(|e| ClassifierError::Parse(e.to_string()))
        }
        _ => Err(ClassifierError::Parse(format!(
            "no JSON object in response: {}",
            truncate(body, 120)
        ))),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

/// Abstraction over the remote text classifier.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn suggest(
        &self,
        request: &ClassificationRequest,
    ) -> Result<RemoteSuggestion, ClassifierError>;
}

// ── HTTP backend ──────────────────────────────────────────────────────────────

/// Calls a hosted classification function over HTTPS with a bearer token.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Reads the token from the environment variable named in `config`.
    /// A missing token leaves the classifier permanently disabled.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let token = std::env::var(&config.token_env).ok();
        if token.is_none() {
            tracing::warn!(
                token_env = %config.token_env,
                "classifier token not set; remote classification disabled"
            );
        }
        Self::new(
            config.endpoint.clone(),
            token,
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl RemoteClassifier for HttpClassifier {
    async fn suggest(
        &self,
        request: &ClassificationRequest,
    ) -> Result<RemoteSuggestion, ClassifierError> {
        let token = self.token.as_deref().ok_or(ClassifierError::MissingToken)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        parse_suggestion(&body)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

#[derive(Debug, Clone)]
pub enum MockBehavior {
    Suggest(RemoteSuggestion),
    Fail(String),
    MissingToken,
    /// Sleep, then suggest. Used to exercise timeouts.
    Slow(Duration, RemoteSuggestion),
}

/// Returns a preset answer and records what it was asked.
pub struct MockClassifier {
    behavior: MockBehavior,
    calls: AtomicUsize,
    last_request: Mutex<Option<ClassificationRequest>>,
}

impl MockClassifier {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn suggesting(category_id: &str, sub_header_id: &str) -> Self {
        let answer = RemoteSuggestion::new(category_id, sub_header_id);
        Self::new(MockBehavior::Suggest(answer))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(MockBehavior::Fail(message.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ClassificationRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl RemoteClassifier for MockClassifier {
    async fn suggest(
        &self,
        request: &ClassificationRequest,
    ) -> Result<RemoteSuggestion, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        match &self.behavior {
            MockBehavior::Suggest(s) => Ok(s.clone()),
            MockBehavior::Fail(message) => Err(ClassifierError::Transport(message.clone())),
            MockBehavior::MissingToken => Err(ClassifierError::MissingToken),
            MockBehavior::Slow(delay, s) => {
                tokio::time::sleep(*delay).await;
                Ok(s.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kassa_core::{CategoryOption, CategoryRef, SubHeaderOption};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn is_parse_error(body: &str) -> bool {
        matches!(parse_suggestion(body), Err(ClassifierError::Parse(_)))
    }

    fn client(endpoint: &str, token: Option<&str>) -> HttpClassifier {
        let token = token.map(str::to_string);
        let timeout = Duration::from_secs(2);
        HttpClassifier::new(endpoint, token, timeout).unwrap()
    }

    fn request() -> ClassificationRequest {
        ClassificationRequest::new("ICA KVANTUM", Money::zero(), &CandidateSet::empty(), &[])
    }

    /// Reads one HTTP request, headers and body, as text.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            let Some(end) = text.find("\r\n\r\n") else {
                continue;
            };
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answers a single request on a local port with a canned response. The
    /// handle yields the raw request that came in.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let head = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(body.as_bytes()).await.unwrap();
            stream.flush().await.unwrap();
            request
        });
        (format!("http://{addr}/classify"), handle)
    }

    #[test]
    fn parses_plain_json() {
        let body = r#"{"categoryId":"food","subHeaderId":"groceries"}"#;
        let s = parse_suggestion(body).unwrap();
        assert_eq!(s, RemoteSuggestion::new("food", "groceries"));
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let body = "Sure! ```json\n{\"categoryId\": \"food\", \"subHeaderId\": \"snacks\"}\n```";
        let s = parse_suggestion(body).unwrap();
        assert_eq!(s, RemoteSuggestion::new("food", "snacks"));
    }

    #[test]
    fn rejects_missing_fields_and_non_json() {
        assert!(is_parse_error(r#"{"categoryId":"food"}"#));
        assert!(is_parse_error("no idea"));
        assert!(is_parse_error(""));
    }

    #[test]
    fn request_serializes_in_camel_case() {
        let candidates = CandidateSet::new(vec![CategoryOption {
            id: "food".into(),
            name: "Mat".into(),
            sub_headers: vec![SubHeaderOption::new("groceries", "Livsmedel")],
        }]);
        let examples = vec![HistoricalExample {
            description: "ICA NARA".into(),
            amount: Money::from_cents(-4200),
            target: CategoryRef::new("food", "groceries"),
        }];
        let amount = Money::from_cents(-24550);
        let req = ClassificationRequest::new("ICA KVANTUM", amount, &candidates, &examples);
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["description"], "ICA KVANTUM");
        assert_eq!(json["amount"], -245.5);
        let sub_headers = &json["candidateCategories"][0]["subHeaders"];
        assert_eq!(sub_headers[0]["name"], "Livsmedel");
        assert_eq!(json["contextualExamples"][0]["subHeaderId"], "groceries");
    }

    #[tokio::test]
    async fn http_classifier_without_token_never_sends() {
        let c = client("http://127.0.0.1:9/classify", None);
        assert!(!c.is_enabled());
        let result = c.suggest(&request()).await;
        assert!(matches!(result, Err(ClassifierError::MissingToken)));
    }

    #[tokio::test]
    async fn sends_bearer_token_and_parses_answer() {
        let answer = r#"{"categoryId":"food","subHeaderId":"groceries"}"#;
        let (endpoint, server) = serve_once("200 OK", answer).await;
        let c = client(&endpoint, Some("secret-token"));

        let s = c.suggest(&request()).await.unwrap();
        assert_eq!(s, RemoteSuggestion::new("food", "groceries"));

        let received = server.await.unwrap();
        assert!(received.starts_with("POST /classify "), "{received}");
        let lowered = received.to_lowercase();
        let authorized = lowered.contains("authorization: bearer secret-token");
        assert!(authorized, "{received}");
        let has_body = received.contains(r#""description":"ICA KVANTUM""#);
        assert!(has_body, "{received}");
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let (endpoint, server) = serve_once("503 Service Unavailable", "overloaded").await;
        let c = client(&endpoint, Some("secret-token"));

        match c.suggest(&request()).await {
            Err(ClassifierError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected a status error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let c = client("http://localhost", Some("  "));
        assert!(!c.is_enabled());
    }

    #[tokio::test]
    async fn mock_counts_calls_and_keeps_last_request() {
        let mock = MockClassifier::suggesting("food", "groceries");
        mock.suggest(&request()).await.unwrap();
        mock.suggest(&request()).await.unwrap();
        assert_eq!(mock.calls(), 2);
        assert_eq!(mock.last_request().unwrap().description, "ICA KVANTUM");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("åäö", 2), "åä…");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
