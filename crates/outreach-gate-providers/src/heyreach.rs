// crates/outreach-gate-providers/src/heyreach.rs
// ============================================================================
// Module: HeyReach Adapter
// Description: LinkedIn-outreach provider client for the HeyReach API.
// Purpose: Expose campaign, lead, and conversation calls with retries.
// Dependencies: outreach-gate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! HeyReach wants the key in both an `Authorization: Bearer` header and an
//! `X-API-KEY` header; older deployments read one, newer read the other.
//! Endpoints exist under PascalCase action paths with plural fallbacks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use outreach_gate_core::ProviderError;
use reqwest::Method;
use reqwest::blocking::Client;
use serde_json::Value;
use serde_json::json;

use crate::http::ProviderCall;
use crate::http::build_client;
use crate::http::expect_array;
use crate::http::expect_object;
use crate::http::request_json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default HeyReach public API base URL.
const API_BASE: &str = "https://api.heyreach.io/api/public";
/// Provider slug used in error envelopes.
const PROVIDER: &str = "heyreach";

// ============================================================================
// SECTION: Client
// ============================================================================

/// Stateless HeyReach adapter bound to one tenant's credentials.
pub struct HeyReachClient {
    /// Tenant API key.
    api_key: String,
    /// API base URL (overridable for tests).
    base_url: String,
    /// Shared blocking HTTP client.
    http: Client,
}

impl HeyReachClient {
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

    /// Builds a call with both auth headers attached.
    fn call(&self, operation: &'static str, method: Method, paths: &[&str]) -> ProviderCall<'_> {
        let mut call = ProviderCall::new(
            PROVIDER,
            operation,
            method,
            format!("{}{}", self.base_url, paths[0]),
        );
        call.candidate_urls =
            paths.iter().map(|path| format!("{}{path}", self.base_url)).collect();
        call.headers
            .push(("Authorization".to_string(), format!("Bearer {}", self.api_key)));
        call.headers.push(("X-API-KEY".to_string(), self.api_key.clone()));
        call
    }

    /// Validates the API key with a campaigns read.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the key is rejected or unreachable.
    pub fn validate_api_key(&self) -> Result<(), ProviderError> {
        let call =
            self.call("validate_api_key", Method::GET, &["/campaign/GetAll", "/campaigns"]);
        request_json(&self.http, &call).map(|_| ())
    }

    /// Lists campaigns.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_campaigns(&self) -> Result<Vec<Value>, ProviderError> {
        let call = self.call("list_campaigns", Method::GET, &["/campaign/GetAll", "/campaigns"]);
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "list_campaigns")
    }

    /// Creates a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn create_campaign(&self, name: &str) -> Result<Value, ProviderError> {
        let mut call =
            self.call("create_campaign", Method::POST, &["/campaign/Create", "/campaigns"]);
        call.json_body = Some(json!({ "name": name }));
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "create_campaign")
    }

    /// Pauses a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn pause_campaign(&self, campaign_id: &str) -> Result<Value, ProviderError> {
        let action = format!("/campaign/Pause?campaignId={campaign_id}");
        let rest = format!("/campaigns/{campaign_id}/pause");
        let call =
            self.call("pause_campaign", Method::POST, &[action.as_str(), rest.as_str()]);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "pause_campaign")
    }

    /// Resumes a paused campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn resume_campaign(&self, campaign_id: &str) -> Result<Value, ProviderError> {
        let action = format!("/campaign/Resume?campaignId={campaign_id}");
        let rest = format!("/campaigns/{campaign_id}/resume");
        let call =
            self.call("resume_campaign", Method::POST, &[action.as_str(), rest.as_str()]);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "resume_campaign")
    }

    /// Lists leads within a campaign (paged).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn get_campaign_leads(
        &self,
        campaign_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Value>, ProviderError> {
        let mut call = self.call(
            "get_campaign_leads",
            Method::POST,
            &["/campaign/GetLeads", "/campaigns/leads"],
        );
        call.json_body = Some(json!({
            "campaignId": campaign_id,
            "page": page,
            "limit": limit,
        }));
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "get_campaign_leads")
    }

    /// Lists conversation messages for a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_conversations(
        &self,
        campaign_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, ProviderError> {
        let mut call = self.call(
            "list_conversations",
            Method::POST,
            &["/inbox/GetConversations", "/conversations"],
        );
        call.json_body = Some(json!({
            "campaignId": campaign_id,
            "limit": limit,
        }));
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "list_conversations")
    }
}
