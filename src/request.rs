//! Rate-limited access to the Sejm API.
//!
//! Every outbound request goes through [`ApiClient::fetch`], which waits
//! for the [`Pacer`] before sending, retries transient failures a bounded
//! number of times and classifies the final result as a [`FetchOutcome`].
//! The client owns the only "time of last request" marker in the process,
//! so there is exactly one pacing state per run.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::model::{Proceeding, StatementList, Term, TranscriptDay};
use crate::{Error, Result, Settings, TransportError};

/// What the caller expects a path to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedKind {
    Pdf,
    Json,
    Html,
}

impl fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pdf => "PDF",
            Self::Json => "JSON",
            Self::Html => "HTML",
        })
    }
}

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Pdf(Vec<u8>),
    Json(serde_json::Value),
    Html(String),
}

/// Result of one logical fetch, after retries.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Fetched(T),
    /// The API has nothing at this path yet. Not an error.
    NotYetAvailable,
    /// Retries were exhausted on timeouts, connection failures or 5xx.
    TransientError(Error),
    /// Malformed or unexpected response; never retried.
    FatalError(Error),
}

impl<T> FetchOutcome<T> {
    pub fn and_then<U>(self, f: impl FnOnce(T) -> FetchOutcome<U>) -> FetchOutcome<U> {
        match self {
            Self::Fetched(v) => f(v),
            Self::NotYetAvailable => FetchOutcome::NotYetAvailable,
            Self::TransientError(e) => FetchOutcome::TransientError(e),
            Self::FatalError(e) => FetchOutcome::FatalError(e),
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }
}

/// A response as seen by the client, independent of the HTTP library.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Sends a single GET for a path relative to the API root.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> core::result::Result<RawResponse, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(TransportError::from)?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> core::result::Result<RawResponse, TransportError> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("GET {url}");
        let res = self.client.get(&url).send().await?;
        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = res.bytes().await?.to_vec();
        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Time source used for pacing.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Enforces a minimum gap between the end of one request and the start of
/// the next.
pub struct Pacer<C> {
    clock: C,
    delay: Duration,
    last_request: Option<Instant>,
}

impl<C: Clock> Pacer<C> {
    pub fn new(clock: C, delay: Duration) -> Self {
        Self {
            clock,
            delay,
            last_request: None,
        }
    }

    /// Blocks until `delay` has passed since the last completed request.
    pub async fn wait_turn(&self) {
        let Some(last) = self.last_request else {
            return;
        };
        let elapsed = self.clock.now().saturating_duration_since(last);
        if elapsed < self.delay {
            self.clock.sleep(self.delay - elapsed).await;
        }
    }

    pub fn mark_done(&mut self) {
        self.last_request = Some(self.clock.now());
    }
}

enum RetryState {
    Waiting { attempt: u32 },
    Attempting { attempt: u32 },
    Exhausted(Error),
}

enum Step {
    Done(FetchOutcome<Payload>),
    Retry(Error),
}

pub struct ApiClient<T, C = TokioClock> {
    transport: T,
    pacer: Pacer<C>,
    max_retries: u32,
    requests: u64,
}

impl ApiClient<HttpTransport, TokioClock> {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            HttpTransport::new(settings)?,
            TokioClock,
            settings.request_delay(),
            settings.max_retries,
        ))
    }
}

impl<T: Transport, C: Clock> ApiClient<T, C> {
    pub fn new(transport: T, clock: C, delay: Duration, max_retries: u32) -> Self {
        Self {
            transport,
            pacer: Pacer::new(clock, delay),
            max_retries,
            requests: 0,
        }
    }

    /// Number of requests sent so far, retries included.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub async fn fetch(&mut self, path: &str, kind: ExpectedKind) -> FetchOutcome<Payload> {
        let attempts = self.max_retries.saturating_add(1);
        let mut state = RetryState::Waiting { attempt: 1 };
        loop {
            state = match state {
                RetryState::Waiting { attempt } => {
                    self.pacer.wait_turn().await;
                    RetryState::Attempting { attempt }
                }
                RetryState::Attempting { attempt } => {
                    let res = self.transport.get(path).await;
                    self.pacer.mark_done();
                    self.requests += 1;
                    match classify(path, kind, res) {
                        Step::Done(outcome) => return outcome,
                        Step::Retry(e) if attempt < attempts => {
                            log::warn!("{path}: {e} (attempt {attempt}/{attempts}), retrying");
                            RetryState::Waiting {
                                attempt: attempt + 1,
                            }
                        }
                        Step::Retry(e) => RetryState::Exhausted(e),
                    }
                }
                RetryState::Exhausted(e) => return FetchOutcome::TransientError(e),
            };
        }
    }

    async fn fetch_json<D: DeserializeOwned>(&mut self, path: &str) -> FetchOutcome<D> {
        self.fetch(path, ExpectedKind::Json)
            .await
            .and_then(|payload| match payload {
                Payload::Json(value) => match serde_json::from_value(value) {
                    Ok(v) => FetchOutcome::Fetched(v),
                    Err(source) => FetchOutcome::FatalError(Error::Schema {
                        path: path.to_owned(),
                        source,
                    }),
                },
                other => mismatch(path, ExpectedKind::Json, &other),
            })
    }

    pub async fn terms(&mut self) -> FetchOutcome<Vec<Term>> {
        self.fetch_json("/term").await
    }

    pub async fn proceedings(&mut self, term: u32) -> FetchOutcome<Vec<Proceeding>> {
        self.fetch_json(&format!("/term{term}/proceedings")).await
    }

    pub async fn proceeding(&mut self, term: u32, number: u32) -> FetchOutcome<Proceeding> {
        self.fetch_json(&format!("/term{term}/proceedings/{number}"))
            .await
    }

    pub async fn statement_list(&mut self, day: &TranscriptDay) -> FetchOutcome<StatementList> {
        self.fetch_json(&format!("{}/transcripts", day_path(day)))
            .await
    }

    pub async fn transcript_pdf(&mut self, day: &TranscriptDay) -> FetchOutcome<Vec<u8>> {
        let path = format!("{}/transcripts/pdf", day_path(day));
        self.fetch(&path, ExpectedKind::Pdf)
            .await
            .and_then(|payload| match payload {
                Payload::Pdf(bytes) => FetchOutcome::Fetched(bytes),
                other => mismatch(&path, ExpectedKind::Pdf, &other),
            })
    }

    pub async fn statement_html(&mut self, day: &TranscriptDay, num: u32) -> FetchOutcome<String> {
        let path = format!("{}/transcripts/{num}", day_path(day));
        self.fetch(&path, ExpectedKind::Html)
            .await
            .and_then(|payload| match payload {
                Payload::Html(html) => FetchOutcome::Fetched(html),
                other => mismatch(&path, ExpectedKind::Html, &other),
            })
    }
}

fn day_path(day: &TranscriptDay) -> String {
    format!(
        "/term{}/proceedings/{}/{}",
        day.term, day.proceeding, day.date
    )
}

fn mismatch<U>(path: &str, expected: ExpectedKind, got: &Payload) -> FetchOutcome<U> {
    let content_type = match got {
        Payload::Pdf(_) => "application/pdf",
        Payload::Json(_) => "application/json",
        Payload::Html(_) => "text/html",
    };
    FetchOutcome::FatalError(Error::UnexpectedContent {
        path: path.to_owned(),
        expected,
        content_type: Some(content_type.to_owned()),
    })
}

fn classify(
    path: &str,
    kind: ExpectedKind,
    res: core::result::Result<RawResponse, TransportError>,
) -> Step {
    let res = match res {
        Ok(res) => res,
        Err(e) if e.is_transient() => return Step::Retry(e.into()),
        Err(e) => return Step::Done(FetchOutcome::FatalError(e.into())),
    };

    let status_err = || Error::Status {
        path: path.to_owned(),
        status: res.status,
    };
    match res.status {
        404 | 410 => return Step::Done(FetchOutcome::NotYetAvailable),
        408 | 429 | 500..=599 => return Step::Retry(status_err()),
        200..=299 => {}
        _ => return Step::Done(FetchOutcome::FatalError(status_err())),
    }

    // An empty document means the transcript has not been committed yet.
    if res.body.is_empty() && kind != ExpectedKind::Json {
        return Step::Done(FetchOutcome::NotYetAvailable);
    }

    Step::Done(match decode(path, kind, res) {
        Ok(payload) => FetchOutcome::Fetched(payload),
        Err(e) => FetchOutcome::FatalError(e),
    })
}

fn decode(path: &str, kind: ExpectedKind, res: RawResponse) -> Result<Payload> {
    let ct = res.content_type.as_deref().map(str::to_ascii_lowercase);
    let accepted = match (kind, ct.as_deref()) {
        (ExpectedKind::Pdf, Some(ct)) => ct.contains("pdf") || ct.contains("octet-stream"),
        (ExpectedKind::Pdf, None) => res.body.starts_with(b"%PDF"),
        (ExpectedKind::Json, Some(ct)) => ct.contains("json"),
        (ExpectedKind::Html, Some(ct)) => ct.contains("html") || ct.starts_with("text/plain"),
        (ExpectedKind::Json | ExpectedKind::Html, None) => true,
    };
    let unexpected = || Error::UnexpectedContent {
        path: path.to_owned(),
        expected: kind,
        content_type: res.content_type.clone(),
    };
    if !accepted {
        return Err(unexpected());
    }

    match kind {
        ExpectedKind::Pdf => Ok(Payload::Pdf(res.body)),
        ExpectedKind::Json => serde_json::from_slice(&res.body)
            .map(Payload::Json)
            .map_err(|source| Error::Schema {
                path: path.to_owned(),
                source,
            }),
        ExpectedKind::Html => {
            let content_type = res.content_type.clone();
            String::from_utf8(res.body)
                .map(Payload::Html)
                .map_err(|_| Error::UnexpectedContent {
                    path: path.to_owned(),
                    expected: kind,
                    content_type,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeTransport, ManualClock, Reply};

    fn client(
        transport: &FakeTransport,
        clock: &ManualClock,
        max_retries: u32,
    ) -> ApiClient<FakeTransport, ManualClock> {
        ApiClient::new(
            transport.clone(),
            clock.clone(),
            Duration::from_secs(1),
            max_retries,
        )
    }

    #[tokio::test]
    async fn consecutive_requests_are_spaced_by_the_delay() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        transport.route("/term", [Reply::json("[]")]);
        let mut api = client(&transport, &clock, 0);

        for _ in 0..4 {
            assert!(api.fetch("/term", ExpectedKind::Json).await.is_fetched());
        }

        let starts = transport.call_times();
        assert_eq!(starts.len(), 4);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }

    #[tokio::test]
    async fn first_request_is_not_delayed() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        transport.route("/term", [Reply::json("[]")]);
        let mut api = client(&transport, &clock, 0);

        api.fetch("/term", ExpectedKind::Json).await;
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn unbounded_retry_setting_does_not_overflow() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        transport.route("/term", [Reply::status(503), Reply::json("[]")]);
        let mut api = client(&transport, &clock, u32::MAX);

        assert!(api.fetch("/term", ExpectedKind::Json).await.is_fetched());
        assert_eq!(api.requests(), 2);

        let outcome = api.fetch("/term10/proceedings/99", ExpectedKind::Json).await;
        assert!(matches!(outcome, FetchOutcome::NotYetAvailable));
        assert_eq!(api.requests(), 3);
    }

    #[tokio::test]
    async fn missing_resource_is_not_yet_available_without_retry() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        let mut api = client(&transport, &clock, 3);

        let outcome = api
            .fetch("/term10/proceedings/99/2030-01-01/transcripts/pdf", ExpectedKind::Pdf)
            .await;

        assert!(matches!(outcome, FetchOutcome::NotYetAvailable));
        assert_eq!(api.requests(), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        transport.route(
            "/term",
            [Reply::status(503), Reply::Timeout, Reply::json("[]")],
        );
        let mut api = client(&transport, &clock, 3);

        let outcome = api.fetch("/term", ExpectedKind::Json).await;

        assert!(outcome.is_fetched());
        assert_eq!(api.requests(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 2]);
    }

    #[tokio::test]
    async fn exhausted_retries_are_transient_errors() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        transport.route("/term", [Reply::Timeout]);
        let mut api = client(&transport, &clock, 2);

        let outcome = api.fetch("/term", ExpectedKind::Json).await;

        assert!(matches!(
            outcome,
            FetchOutcome::TransientError(Error::Transport(TransportError::Timeout(_)))
        ));
        assert_eq!(api.requests(), 3);
    }

    #[tokio::test]
    async fn malformed_json_is_fatal_and_not_retried() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        transport.route("/term", [Reply::json("[{\"num\": ")]);
        let mut api = client(&transport, &clock, 3);

        let outcome = api.fetch("/term", ExpectedKind::Json).await;

        assert!(matches!(outcome, FetchOutcome::FatalError(Error::Schema { .. })));
        assert_eq!(api.requests(), 1);
    }

    #[tokio::test]
    async fn missing_required_field_is_fatal() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        transport.route("/term", [Reply::json(r#"[{"num": 10, "current": true}]"#)]);
        let mut api = client(&transport, &clock, 3);

        assert!(matches!(api.terms().await, FetchOutcome::FatalError(Error::Schema { .. })));
    }

    #[tokio::test]
    async fn html_where_pdf_expected_is_fatal() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        let day = TranscriptDay {
            term: 10,
            proceeding: 1,
            date: chrono::NaiveDate::from_ymd_opt(2023, 11, 13).unwrap(),
        };
        transport.route(
            "/term10/proceedings/1/2023-11-13/transcripts/pdf",
            [Reply::html("<p>maintenance</p>")],
        );
        let mut api = client(&transport, &clock, 3);

        assert!(matches!(
            api.transcript_pdf(&day).await,
            FetchOutcome::FatalError(Error::UnexpectedContent { .. })
        ));
    }

    #[tokio::test]
    async fn client_errors_other_than_not_found_are_fatal() {
        let clock = ManualClock::new();
        let transport = FakeTransport::new(&clock);
        transport.route("/term", [Reply::status(403)]);
        let mut api = client(&transport, &clock, 3);

        assert!(matches!(
            api.fetch("/term", ExpectedKind::Json).await,
            FetchOutcome::FatalError(Error::Status { status: 403, .. })
        ));
        assert_eq!(api.requests(), 1);
    }
}
