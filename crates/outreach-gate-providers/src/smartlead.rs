// crates/outreach-gate-providers/src/smartlead.rs
// ============================================================================
// Module: Smartlead Adapter
// Description: Email-outreach provider client for the Smartlead API.
// Purpose: Expose campaign, lead, sequence, and inbox calls with retries.
// Dependencies: outreach-gate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Smartlead authenticates with an `api_key` query parameter. Several
//! endpoints shipped under two URL forms across deployments, so each call
//! carries its historical candidate pair. Responses arrive as bare arrays or
//! `{data}`/`{items}` envelopes depending on deployment age.

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

/// Default Smartlead API base URL.
const API_BASE: &str = "https://server.smartlead.ai/api/v1";
/// Provider slug used in error envelopes.
const PROVIDER: &str = "smartlead";

// ============================================================================
// SECTION: Client
// ============================================================================

/// Stateless Smartlead adapter bound to one tenant's credentials.
pub struct SmartleadClient {
    /// Tenant API key.
    api_key: String,
    /// API base URL (overridable for tests).
    base_url: String,
    /// Shared blocking HTTP client.
    http: Client,
}

impl SmartleadClient {
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

    /// Builds a call with the api-key query parameter attached.
    fn call(&self, operation: &'static str, method: Method, paths: &[&str]) -> ProviderCall<'_> {
        let mut call = ProviderCall::new(
            PROVIDER,
            operation,
            method,
            format!("{}{}", self.base_url, paths[0]),
        );
        call.candidate_urls =
            paths.iter().map(|path| format!("{}{path}", self.base_url)).collect();
        call.query.push(("api_key".to_string(), self.api_key.clone()));
        call
    }

    /// Validates the API key with a minimal campaigns read.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the key is rejected or unreachable.
    pub fn validate_api_key(&self) -> Result<(), ProviderError> {
        let mut call = self.call("validate_api_key", Method::GET, &["/campaigns"]);
        call.query.push(("limit".to_string(), "1".to_string()));
        request_json(&self.http, &call).map(|_| ())
    }

    /// Lists campaigns.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_campaigns(&self, limit: u32, offset: u32) -> Result<Vec<Value>, ProviderError> {
        let mut call =
            self.call("list_campaigns", Method::GET, &["/campaigns", "/campaign/list"]);
        call.query.push(("limit".to_string(), limit.to_string()));
        call.query.push(("offset".to_string(), offset.to_string()));
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "list_campaigns")
    }

    /// Creates a campaign, optionally scoped to a Smartlead client id.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn create_campaign(
        &self,
        name: &str,
        client_id: Option<&str>,
    ) -> Result<Value, ProviderError> {
        if name.is_empty() {
            return Err(ProviderError::terminal(
                PROVIDER,
                "create_campaign",
                "campaign name is required",
            ));
        }
        let mut call =
            self.call("create_campaign", Method::POST, &["/campaigns/create", "/campaigns"]);
        let mut body = json!({ "name": name });
        if let Some(client_id) = client_id
            && let Some(map) = body.as_object_mut()
        {
            map.insert("client_id".to_string(), Value::String(client_id.to_string()));
        }
        call.json_body = Some(body);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "create_campaign")
    }

    /// Updates a campaign status.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn update_campaign_status(
        &self,
        campaign_id: &str,
        status: &str,
    ) -> Result<Value, ProviderError> {
        let status_path = format!("/campaigns/{campaign_id}/status");
        let update_path = format!("/campaigns/{campaign_id}/update-status");
        let mut call = self.call(
            "update_campaign_status",
            Method::POST,
            &[status_path.as_str(), update_path.as_str()],
        );
        call.json_body = Some(json!({ "status": status }));
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "update_campaign_status")
    }

    /// Reads a campaign sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn get_campaign_sequence(&self, campaign_id: &str) -> Result<Vec<Value>, ProviderError> {
        let plural = format!("/campaigns/{campaign_id}/sequences");
        let singular = format!("/campaigns/{campaign_id}/sequence");
        let call = self.call(
            "get_campaign_sequence",
            Method::GET,
            &[plural.as_str(), singular.as_str()],
        );
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "get_campaign_sequence")
    }

    /// Saves a campaign sequence payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn save_campaign_sequence(
        &self,
        campaign_id: &str,
        sequence: &[Value],
    ) -> Result<Value, ProviderError> {
        let plural = format!("/campaigns/{campaign_id}/sequences");
        let singular = format!("/campaigns/{campaign_id}/sequence");
        let mut call = self.call(
            "save_campaign_sequence",
            Method::POST,
            &[plural.as_str(), singular.as_str()],
        );
        call.json_body = Some(json!({ "sequences": sequence }));
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "save_campaign_sequence")
    }

    /// Lists leads within a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_campaign_leads(
        &self,
        campaign_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Value>, ProviderError> {
        let path = format!("/campaigns/{campaign_id}/leads");
        let mut call = self.call("list_campaign_leads", Method::GET, &[path.as_str()]);
        call.query.push(("limit".to_string(), limit.to_string()));
        call.query.push(("offset".to_string(), offset.to_string()));
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "list_campaign_leads")
    }

    /// Adds leads to a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn add_campaign_leads(
        &self,
        campaign_id: &str,
        leads: &[Value],
    ) -> Result<Value, ProviderError> {
        let path = format!("/campaigns/{campaign_id}/leads");
        let mut call = self.call("add_campaign_leads", Method::POST, &[path.as_str()]);
        call.json_body = Some(json!({ "lead_list": leads }));
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "add_campaign_leads")
    }

    /// Updates one lead within a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn update_campaign_lead(
        &self,
        campaign_id: &str,
        lead_id: &str,
        fields: &Value,
    ) -> Result<Value, ProviderError> {
        let path = format!("/campaigns/{campaign_id}/leads/{lead_id}");
        let mut call = self.call("update_campaign_lead", Method::POST, &[path.as_str()]);
        call.json_body = Some(fields.clone());
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "update_campaign_lead")
    }

    /// Removes one lead from a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn remove_campaign_lead(
        &self,
        campaign_id: &str,
        lead_id: &str,
    ) -> Result<Value, ProviderError> {
        let path = format!("/campaigns/{campaign_id}/leads/{lead_id}");
        let call = self.call("remove_campaign_lead", Method::DELETE, &[path.as_str()]);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "remove_campaign_lead")
    }

    /// Fetches campaign analytics.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn campaign_analytics(&self, campaign_id: &str) -> Result<Value, ProviderError> {
        let path = format!("/campaigns/{campaign_id}/analytics");
        let call = self.call("campaign_analytics", Method::GET, &[path.as_str()]);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "campaign_analytics")
    }

    /// Lists sender email accounts.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_email_accounts(&self) -> Result<Vec<Value>, ProviderError> {
        let call = self.call(
            "list_email_accounts",
            Method::GET,
            &["/email-accounts", "/email-accounts/"],
        );
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "list_email_accounts")
    }
}
