//! Dataset fetch & cache: the only pipeline stage that touches the network.
//!
//! Responses are accepted in any of the recognized tabular shapes and
//! normalized to [`RawDataset`] rows. Transport, status, and schema problems
//! never escape this boundary: the caller receives a built-in representative
//! dataset for the chart's kind plus a non-blocking notice. Successful
//! responses are memoized in a session cache keyed by the canonical request
//! signature, so repeating an identical request returns the same dataset
//! identity and leaves downstream caches valid.

use crate::error::PipelineError;
use crate::models::{ChartKind, FieldMapping, FilterState, RawDataset, Record, Scalar};
use ahash::AHashMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

// Allow -, _, . unescaped in query values (common in field names and dates).
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn enc(s: &str) -> String {
    utf8_percent_encode(s.trim(), SAFE).to_string()
}

/// One fetchable source: endpoint, fixed query parameters, optional bearer
/// token, and whether the discrete filters are applied server-side (in which
/// case they are appended to the query string).
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
    pub token: Option<String>,
    pub server_side_filters: bool,
}

impl FetchRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            token: None,
            server_side_filters: false,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_server_side_filters(mut self) -> Self {
        self.server_side_filters = true;
        self
    }

    /// Full request URL. Parameters are sorted (BTreeMap order) so equal
    /// requests produce byte-equal URLs.
    pub fn url(&self, filters: &FilterState) -> String {
        let mut pairs: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", enc(k), enc(v)))
            .collect();
        if self.server_side_filters {
            pairs.extend(filters.iter().map(|(k, v)| format!("{}={}", enc(k), enc(v))));
        }
        if pairs.is_empty() {
            return self.endpoint.clone();
        }
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.endpoint, sep, pairs.join("&"))
    }

    /// Canonical session-cache key: endpoint + field-mapping description +
    /// serialized filter state.
    pub fn cache_key(&self, mapping: &FieldMapping, filters: &FilterState) -> String {
        format!(
            "{}|{}|{}",
            self.url(filters),
            enc(&mapping.describe()),
            enc(&filters.canonical())
        )
    }
}

/// What a fetch hands back: always a dataset, plus a user-visible notice
/// when that dataset is fallback data rather than the real response.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub dataset: RawDataset,
    pub notice: Option<String>,
}

/// Blocking HTTP client with a session-scoped response cache.
#[derive(Debug)]
pub struct Client {
    http: HttpClient,
    cache: AHashMap<String, RawDataset>,
}

impl Default for Client {
    fn default() -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("chartflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client build");
        Self {
            http,
            cache: AHashMap::new(),
        }
    }
}

impl Client {
    /// Fetch a dataset, consulting the session cache first.
    ///
    /// Never fails: fetch and schema errors are absorbed into a fallback
    /// dataset for `kind` with a notice. A cache hit returns a clone of the
    /// cached dataset, identity included, so downstream per-dataset caches
    /// stay valid across identical requests.
    pub fn fetch(
        &mut self,
        request: &FetchRequest,
        mapping: &FieldMapping,
        filters: &FilterState,
        kind: ChartKind,
    ) -> FetchOutcome {
        let key = request.cache_key(mapping, filters);
        if let Some(dataset) = self.cache.get(&key) {
            log::debug!("session cache hit for {}", request.endpoint);
            return FetchOutcome {
                dataset: dataset.clone(),
                notice: None,
            };
        }
        match self.fetch_rows(request, filters) {
            Ok(rows) => {
                let dataset = RawDataset::new(rows);
                self.cache.insert(key, dataset.clone());
                FetchOutcome {
                    dataset,
                    notice: None,
                }
            }
            Err(e) => {
                log::warn!("fetch from {} failed: {e}", request.endpoint);
                FetchOutcome {
                    dataset: fallback_dataset(kind),
                    notice: Some(format!("showing sample data: {e}")),
                }
            }
        }
    }

    /// Drop every cached response (e.g. on an explicit user refresh).
    pub fn evict_all(&mut self) {
        self.cache.clear();
    }

    fn fetch_rows(
        &self,
        request: &FetchRequest,
        filters: &FilterState,
    ) -> Result<Vec<Record>, PipelineError> {
        let url = request.url(filters);
        let body = self.get_json(&url, request.token.as_deref())?;
        normalize_rows(&body)
    }

    /// GET with a small retry for transient failures (5xx / network errors).
    fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value, PipelineError> {
        let mut last_err: Option<String> = None;
        for backoff_ms in [100u64, 300, 700] {
            let mut req = self.http.get(url);
            if let Some(t) = token {
                req = req.bearer_auth(t);
            }
            match req.send() {
                Ok(r) if r.status().is_success() => {
                    return r.json().map_err(|e| PipelineError::SchemaError {
                        detail: format!("response body is not JSON: {e}"),
                    });
                }
                Ok(r) if r.status().is_server_error() => {
                    last_err = Some(format!("HTTP {}", r.status()));
                }
                Ok(r) => {
                    return Err(PipelineError::FetchFailure {
                        reason: format!("request failed with HTTP {}", r.status()),
                    });
                }
                Err(e) => last_err = Some(e.to_string()),
            }
            std::thread::sleep(Duration::from_millis(backoff_ms));
        }
        Err(PipelineError::FetchFailure {
            reason: format!("network error: {}", last_err.unwrap_or_default()),
        })
    }
}

/// Normalize a response body into rows.
///
/// Recognized shapes: a bare array; `{data: [...]}`; `{rows: [...]}`;
/// `{results: [...]}`; the nested `{query_result: {data: {rows: [...]}}}`
/// form; and the explicit `{error: "..."}` form, which surfaces as a fetch
/// failure. Anything else is a schema error.
pub fn normalize_rows(body: &Value) -> Result<Vec<Record>, PipelineError> {
    if let Some(arr) = body.as_array() {
        return records_from(arr);
    }
    if let Some(obj) = body.as_object() {
        if let Some(message) = obj.get("error").and_then(Value::as_str) {
            return Err(PipelineError::FetchFailure {
                reason: format!("source reported an error: {message}"),
            });
        }
        for key in ["data", "rows", "results"] {
            if let Some(arr) = obj.get(key).and_then(Value::as_array) {
                return records_from(arr);
            }
        }
        if let Some(arr) = body
            .pointer("/query_result/data/rows")
            .and_then(Value::as_array)
        {
            return records_from(arr);
        }
    }
    Err(PipelineError::SchemaError {
        detail: format!("no recognized row container in response: {}", shape_of(body)),
    })
}

fn records_from(arr: &[Value]) -> Result<Vec<Record>, PipelineError> {
    arr.iter()
        .map(|v| match v.as_object() {
            Some(obj) => Ok(obj
                .iter()
                .map(|(k, value)| (k.clone(), Scalar::from(value)))
                .collect()),
            None => Err(PipelineError::SchemaError {
                detail: format!("row is not an object: {}", shape_of(v)),
            }),
        })
        .collect()
}

fn shape_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Built-in representative dataset per chart kind, used when a fetch fails.
/// A performance-neutral stand-in, never a system of record.
pub fn fallback_dataset(kind: ChartKind) -> RawDataset {
    fn row(pairs: &[(&str, Scalar)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
    let text = |s: &str| Scalar::Text(s.to_string());
    let num = |n: f64| Scalar::Number(n);

    let rows = match kind {
        ChartKind::Line | ChartKind::Area => vec![
            row(&[("date", text("2024-01-01")), ("value", num(120.0))]),
            row(&[("date", text("2024-01-02")), ("value", num(140.0))]),
            row(&[("date", text("2024-01-03")), ("value", num(135.0))]),
            row(&[("date", text("2024-01-04")), ("value", num(160.0))]),
            row(&[("date", text("2024-01-05")), ("value", num(155.0))]),
            row(&[("date", text("2024-01-06")), ("value", num(180.0))]),
        ],
        ChartKind::Bar => vec![
            row(&[("date", text("2024-01")), ("value", num(320.0))]),
            row(&[("date", text("2024-02")), ("value", num(410.0))]),
            row(&[("date", text("2024-03")), ("value", num(380.0))]),
            row(&[("date", text("2024-04")), ("value", num(450.0))]),
        ],
        ChartKind::Pie => vec![
            row(&[("segment", text("DEX")), ("value", num(55.0))]),
            row(&[("segment", text("Lending")), ("value", num(30.0))]),
            row(&[("segment", text("Other")), ("value", num(15.0))]),
        ],
        ChartKind::Table => vec![
            row(&[
                ("name", text("Alpha")),
                ("value", num(42.0)),
                ("change", num(1.5)),
            ]),
            row(&[
                ("name", text("Beta")),
                ("value", num(17.0)),
                ("change", num(-0.8)),
            ]),
        ],
    };
    RawDataset::new(rows)
}

/// Generation token for one in-flight fetch.
///
/// A chart issues a ticket before fetching and checks it before applying the
/// result; issuing a newer ticket invalidates every older one, so a
/// superseded fetch can never clobber state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

#[derive(Debug, Default)]
pub struct FetchGate {
    current: u64,
}

impl FetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new fetch generation, invalidating all earlier tickets.
    pub fn issue(&mut self) -> FetchTicket {
        self.current += 1;
        FetchTicket {
            generation: self.current,
        }
    }

    /// Whether a ticket is still the newest generation.
    pub fn admits(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.current
    }
}

/// Trailing-edge debouncer for filter-driven refetches.
///
/// Rapid repeated requests (a user scrubbing a control) collapse into one:
/// a request becomes ready only after the quiet period has elapsed with no
/// newer request. Purely local recomputation is cheap and must not go
/// through this.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending_since: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending_since: None,
        }
    }

    /// Record a request at `now`, restarting the quiet period.
    pub fn request_at(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    /// Consume the pending request if its quiet period has elapsed.
    pub fn take_ready_at(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if now.duration_since(since) >= self.quiet => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    pub fn request(&mut self) {
        self.request_at(Instant::now());
    }

    pub fn take_ready(&mut self) -> bool {
        self.take_ready_at(Instant::now())
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }
}
