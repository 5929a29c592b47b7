// crates/outreach-gate-providers/src/lob.rs
// ============================================================================
// Module: Lob Adapter
// Description: Direct-mail producer client for the Lob API.
// Purpose: Expose postcard and letter lifecycle calls with idempotency keys.
// Dependencies: outreach-gate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Lob authenticates with basic auth (key as username, empty password).
//! Write calls accept idempotency material as either an `Idempotency-Key`
//! header or an `idempotency_key` query parameter; the two are mutually
//! exclusive and supplying both is a terminal contract violation. Key
//! retention upstream is 24 hours.

// ============================================================================
// SECTION: Imports
// ============================================================================

use outreach_gate_core::ProviderError;
use reqwest::Method;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::http::ProviderCall;
use crate::http::build_client;
use crate::http::expect_object;
use crate::http::request_json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default Lob API base URL.
const API_BASE: &str = "https://api.lob.com";
/// Provider slug used in error envelopes.
const PROVIDER: &str = "lob";
/// Postcards endpoint path.
const EP_POSTCARDS: &str = "/v1/postcards";
/// Letters endpoint path.
const EP_LETTERS: &str = "/v1/letters";

// ============================================================================
// SECTION: Idempotency Material
// ============================================================================

/// Idempotency key placement for Lob write calls.
///
/// # Invariants
/// - At most one of `header_key` / `query_key` may be set; both set is a
///   terminal contract violation surfaced before any request is sent.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyMaterial {
    /// Key sent as the `Idempotency-Key` header.
    pub header_key: Option<String>,
    /// Key sent as the `idempotency_key` query parameter.
    pub query_key: Option<String>,
}

impl IdempotencyMaterial {
    /// Material for a header-carried key.
    #[must_use]
    pub fn header(key: impl Into<String>) -> Self {
        Self {
            header_key: Some(key.into()),
            query_key: None,
        }
    }

    /// Material for a query-carried key.
    #[must_use]
    pub fn query(key: impl Into<String>) -> Self {
        Self {
            header_key: None,
            query_key: Some(key.into()),
        }
    }

    /// Splits the material into header and query pairs.
    ///
    /// # Errors
    ///
    /// Returns a terminal [`ProviderError`] when both placements are set or
    /// a provided key is empty.
    pub fn materialize(
        &self,
        operation: &str,
    ) -> Result<(Vec<(String, String)>, Vec<(String, String)>), ProviderError> {
        if self.header_key.is_some() && self.query_key.is_some() {
            return Err(ProviderError::terminal(
                PROVIDER,
                operation,
                "cannot send both header and query idempotency keys",
            ));
        }
        for key in [&self.header_key, &self.query_key].into_iter().flatten() {
            if key.trim().is_empty() {
                return Err(ProviderError::terminal(
                    PROVIDER,
                    operation,
                    "idempotency key must be non-empty when provided",
                ));
            }
        }
        let mut headers = Vec::new();
        let mut query = Vec::new();
        if let Some(key) = &self.header_key {
            headers.push(("Idempotency-Key".to_string(), key.clone()));
        }
        if let Some(key) = &self.query_key {
            query.push(("idempotency_key".to_string(), key.clone()));
        }
        Ok((headers, query))
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Stateless Lob adapter bound to one tenant's credentials.
pub struct LobClient {
    /// Tenant API key.
    api_key: String,
    /// API base URL (overridable for tests).
    base_url: String,
    /// Shared blocking HTTP client.
    http: Client,
}

impl LobClient {
    /// Creates an adapter for the given API key.
    ///
    /// # Errors
    ///
    /// Returns a terminal [`ProviderError`] when the key is empty or the
    /// HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, API_BASE)
    }

    /// Creates an adapter against a non-default base URL.
    ///
    /// # Errors
    ///
    /// Returns a terminal [`ProviderError`] when the key is empty or the
    /// HTTP client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ProviderError::terminal(PROVIDER, "client_init", "missing api key"));
        }
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: build_client(PROVIDER)?,
        })
    }

    /// Builds a basic-auth call.
    fn call(&self, operation: &'static str, method: Method, path: &str) -> ProviderCall<'_> {
        let mut call =
            ProviderCall::new(PROVIDER, operation, method, format!("{}{path}", self.base_url));
        call.basic_auth = Some((self.api_key.clone(), String::new()));
        call.headers.push(("Accept".to_string(), "application/json".to_string()));
        call
    }

    /// Attaches idempotency material to a call.
    fn with_idempotency<'a>(
        mut call: ProviderCall<'a>,
        idempotency: &IdempotencyMaterial,
    ) -> Result<ProviderCall<'a>, ProviderError> {
        let (headers, query) = idempotency.materialize(call.operation)?;
        call.headers.extend(headers);
        call.query.extend(query);
        Ok(call)
    }

    /// Validates the API key with a minimal postcards read.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the key is rejected or unreachable.
    pub fn validate_api_key(&self) -> Result<(), ProviderError> {
        let mut call = self.call("validate_api_key", Method::GET, EP_POSTCARDS);
        call.query.push(("limit".to_string(), "1".to_string()));
        request_json(&self.http, &call).map(|_| ())
    }

    /// Creates a postcard.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn create_postcard(
        &self,
        payload: &Value,
        idempotency: &IdempotencyMaterial,
    ) -> Result<Value, ProviderError> {
        let mut call = Self::with_idempotency(
            self.call("create_postcard", Method::POST, EP_POSTCARDS),
            idempotency,
        )?;
        call.json_body = Some(payload.clone());
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "create_postcard")
    }

    /// Lists postcards.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_postcards(
        &self,
        query: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        let mut call = self.call("list_postcards", Method::GET, EP_POSTCARDS);
        call.query.extend(query.iter().cloned());
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "list_postcards")
    }

    /// Fetches one postcard.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn get_postcard(&self, postcard_id: &str) -> Result<Value, ProviderError> {
        let path = format!("{EP_POSTCARDS}/{postcard_id}");
        let call = self.call("get_postcard", Method::GET, &path);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "get_postcard")
    }

    /// Cancels a postcard before mailing.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn cancel_postcard(
        &self,
        postcard_id: &str,
        idempotency: &IdempotencyMaterial,
    ) -> Result<Value, ProviderError> {
        let path = format!("{EP_POSTCARDS}/{postcard_id}");
        let call = Self::with_idempotency(
            self.call("cancel_postcard", Method::DELETE, &path),
            idempotency,
        )?;
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "cancel_postcard")
    }

    /// Creates a letter.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn create_letter(
        &self,
        payload: &Value,
        idempotency: &IdempotencyMaterial,
    ) -> Result<Value, ProviderError> {
        let mut call = Self::with_idempotency(
            self.call("create_letter", Method::POST, EP_LETTERS),
            idempotency,
        )?;
        call.json_body = Some(payload.clone());
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "create_letter")
    }

    /// Lists letters.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_letters(&self, query: &[(String, String)]) -> Result<Value, ProviderError> {
        let mut call = self.call("list_letters", Method::GET, EP_LETTERS);
        call.query.extend(query.iter().cloned());
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "list_letters")
    }

    /// Fetches one letter.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn get_letter(&self, letter_id: &str) -> Result<Value, ProviderError> {
        let path = format!("{EP_LETTERS}/{letter_id}");
        let call = self.call("get_letter", Method::GET, &path);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "get_letter")
    }

    /// Cancels a letter before mailing.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn cancel_letter(
        &self,
        letter_id: &str,
        idempotency: &IdempotencyMaterial,
    ) -> Result<Value, ProviderError> {
        let path = format!("{EP_LETTERS}/{letter_id}");
        let call = Self::with_idempotency(
            self.call("cancel_letter", Method::DELETE, &path),
            idempotency,
        )?;
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "cancel_letter")
    }
}
