// crates/outreach-gate-providers/src/http.rs
// ============================================================================
// Module: Shared Provider HTTP Machinery
// Description: Retrying JSON requests with candidate-path fallback.
// Purpose: Keep every adapter on one request/retry/classification contract.
// Dependencies: outreach-gate-core, reqwest, rand, serde_json
// ============================================================================

//! ## Overview
//! One request helper serves every adapter: it iterates a fixed ordered list
//! of candidate URLs (a workaround for vendors that shipped inconsistent URL
//! schemes), retries each with jittered exponential backoff on connection
//! errors and retryable statuses, and classifies failures into the provider
//! error envelope. Responses are parsed as JSON with common `{data: …}` and
//! `{items: …}` envelopes unwrapped by the shape helpers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use outreach_gate_core::ProviderError;
use outreach_gate_core::provider_error::ErrorCategory;
use rand::Rng;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum attempts per candidate URL.
const MAX_RETRY_ATTEMPTS: u32 = 3;
/// Exponential backoff base delay.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
/// Backoff ceiling per attempt.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(2);
/// HTTP statuses that warrant a retry.
const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];
/// Bytes of response body retained in error messages.
const ERROR_BODY_PREVIEW_BYTES: usize = 200;
/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(12);

// ============================================================================
// SECTION: Call Description
// ============================================================================

/// One provider call: endpoint candidates plus auth and payload material.
///
/// # Invariants
/// - `candidate_urls` is non-empty and tried strictly in order.
/// - `provider` and `operation` are stable labels for the error envelope.
pub struct ProviderCall<'a> {
    /// Provider slug for error labeling.
    pub provider: &'a str,
    /// Operation label for error labeling.
    pub operation: &'a str,
    /// HTTP method.
    pub method: Method,
    /// Ordered candidate URLs; the first non-404 response wins.
    pub candidate_urls: Vec<String>,
    /// Query parameters appended to every candidate.
    pub query: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Basic-auth credentials, when the vendor uses them.
    pub basic_auth: Option<(String, String)>,
    /// JSON request body.
    pub json_body: Option<Value>,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl<'a> ProviderCall<'a> {
    /// Builds a call with the shared defaults.
    #[must_use]
    pub fn new(provider: &'a str, operation: &'a str, method: Method, url: String) -> Self {
        Self {
            provider,
            operation,
            method,
            candidate_urls: vec![url],
            query: Vec::new(),
            headers: Vec::new(),
            basic_auth: None,
            json_body: None,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

// ============================================================================
// SECTION: Client Construction
// ============================================================================

/// Builds the blocking HTTP client shared by an adapter instance.
///
/// # Errors
///
/// Returns a terminal [`ProviderError`] when the client cannot be built.
pub fn build_client(provider: &str) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(DEFAULT_CALL_TIMEOUT)
        .build()
        .map_err(|err| ProviderError::terminal(provider, "client_init", err.to_string()))
}

// ============================================================================
// SECTION: Request Execution
// ============================================================================

/// Executes a provider call and parses the response as JSON.
///
/// Candidate URLs are tried in order; a 404 moves to the next candidate.
/// Within a candidate, connection errors and retryable statuses back off
/// with jitter for up to [`MAX_RETRY_ATTEMPTS`] attempts.
///
/// # Errors
///
/// Returns [`ProviderError`] classified per the envelope contract.
pub fn request_json(client: &Client, call: &ProviderCall<'_>) -> Result<Value, ProviderError> {
    let mut last_error: Option<ProviderError> = None;
    for url in &call.candidate_urls {
        match execute_candidate(client, call, url) {
            Ok(CandidateOutcome::Response(response)) => return parse_response(call, response),
            Ok(CandidateOutcome::NotFound) => {
                last_error = Some(ProviderError::terminal(
                    call.provider,
                    call.operation,
                    format!("endpoint not found: {url}"),
                ));
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        ProviderError::unknown(call.provider, call.operation, "no candidate urls")
    }))
}

/// Result of trying one candidate URL.
enum CandidateOutcome {
    /// A response that is not a 404.
    Response(Response),
    /// The candidate does not exist on this deployment.
    NotFound,
}

/// Runs the retry loop for one candidate URL.
fn execute_candidate(
    client: &Client,
    call: &ProviderCall<'_>,
    url: &str,
) -> Result<CandidateOutcome, ProviderError> {
    let mut last_error: Option<ProviderError> = None;
    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        let mut request = client.request(call.method.clone(), url).timeout(call.timeout);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        for (name, value) in &call.headers {
            request = request.header(name, value);
        }
        if let Some((user, password)) = &call.basic_auth {
            request = request.basic_auth(user, Some(password));
        }
        if let Some(body) = &call.json_body {
            request = request.json(body);
        }
        match request.send() {
            Ok(response) => {
                let status = response.status().as_u16();
                if status == 404 {
                    return Ok(CandidateOutcome::NotFound);
                }
                if RETRYABLE_STATUS_CODES.contains(&status) && attempt < MAX_RETRY_ATTEMPTS {
                    sleep_with_jitter(attempt);
                    continue;
                }
                return Ok(CandidateOutcome::Response(response));
            }
            Err(err) => {
                last_error = Some(ProviderError::transient(
                    call.provider,
                    call.operation,
                    format!("connectivity error: {err}"),
                ));
                if attempt < MAX_RETRY_ATTEMPTS {
                    sleep_with_jitter(attempt);
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        ProviderError::transient(call.provider, call.operation, "connectivity error")
    }))
}

/// Sleeps the exponential backoff delay plus up to 20% jitter.
fn sleep_with_jitter(attempt: u32) {
    let exponent = attempt.saturating_sub(1).min(8);
    let base = RETRY_BASE_DELAY.saturating_mul(1_u32 << exponent).min(RETRY_MAX_DELAY);
    let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..0.2));
    thread::sleep(base.saturating_add(jitter));
}

/// Classifies a non-2xx status and parses the JSON body on success.
fn parse_response(call: &ProviderCall<'_>, response: Response) -> Result<Value, ProviderError> {
    let status = response.status().as_u16();
    if matches!(status, 401 | 403) {
        return Err(ProviderError::terminal(
            call.provider,
            call.operation,
            format!("invalid {} api key", call.provider),
        ));
    }
    if status >= 400 {
        let body = response.text().unwrap_or_default();
        let preview: String = body.chars().take(ERROR_BODY_PREVIEW_BYTES).collect();
        let category = ProviderError::category_for_status(status);
        let message = format!("returned HTTP {status}: {preview}");
        return Err(match category {
            ErrorCategory::Transient => {
                ProviderError::transient(call.provider, call.operation, message)
            }
            ErrorCategory::Terminal => {
                ProviderError::terminal(call.provider, call.operation, message)
            }
            ErrorCategory::Unknown => {
                ProviderError::unknown(call.provider, call.operation, message)
            }
        });
    }
    response.json::<Value>().map_err(|_| {
        ProviderError::terminal(call.provider, call.operation, "non-JSON response")
    })
}

// ============================================================================
// SECTION: Shape Helpers
// ============================================================================

/// Unwraps a `{data: …}` envelope when one is present.
#[must_use]
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Coerces a response into an array, accepting `{data}`/`{items}` wrappers.
///
/// # Errors
///
/// Returns a terminal [`ProviderError`] when no array shape is found.
pub fn expect_array(
    value: Value,
    provider: &str,
    operation: &str,
) -> Result<Vec<Value>, ProviderError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in ["data", "items", "sequences"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return Ok(items);
                }
            }
            Err(ProviderError::terminal(
                provider,
                operation,
                format!("unexpected {provider} {operation} response shape"),
            ))
        }
        _ => Err(ProviderError::terminal(
            provider,
            operation,
            format!("unexpected {provider} {operation} response type"),
        )),
    }
}

/// Coerces a response into an object, unwrapping a `{data}` envelope.
///
/// # Errors
///
/// Returns a terminal [`ProviderError`] when the response is not an object.
pub fn expect_object(
    value: Value,
    provider: &str,
    operation: &str,
) -> Result<Value, ProviderError> {
    let unwrapped = unwrap_data(value);
    if unwrapped.is_object() {
        Ok(unwrapped)
    } else {
        Err(ProviderError::terminal(
            provider,
            operation,
            format!("unexpected {provider} {operation} response type"),
        ))
    }
}
