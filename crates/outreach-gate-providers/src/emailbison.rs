// crates/outreach-gate-providers/src/emailbison.rs
// ============================================================================
// Module: EmailBison Adapter
// Description: Email-outreach provider client for per-tenant EmailBison deployments.
// Purpose: Expose campaign, lead, sender, and warmup calls with retries.
// Dependencies: outreach-gate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! EmailBison deployments are per-tenant: every organization carries its own
//! `instance_url`, so this adapter has no default base. Auth is a bearer
//! token. Responses wrap payloads in `{data: …}` envelopes.

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

/// Provider slug used in error envelopes.
const PROVIDER: &str = "emailbison";

// ============================================================================
// SECTION: Client
// ============================================================================

/// Stateless EmailBison adapter bound to one tenant's deployment.
pub struct EmailBisonClient {
    /// Tenant API key.
    api_key: String,
    /// Tenant deployment base URL.
    instance_url: String,
    /// Shared blocking HTTP client.
    http: Client,
}

impl EmailBisonClient {
    /// Creates an adapter for the given credentials and deployment.
    ///
    /// # Errors
    ///
    /// Returns a terminal [`ProviderError`] when the key or instance URL is
    /// empty, or when the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        instance_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        let instance_url = instance_url.into().trim_end_matches('/').to_string();
        if api_key.is_empty() {
            return Err(ProviderError::terminal(PROVIDER, "client_init", "missing api key"));
        }
        if instance_url.is_empty() {
            return Err(ProviderError::terminal(
                PROVIDER,
                "client_init",
                "missing instance url",
            ));
        }
        Ok(Self {
            api_key,
            instance_url,
            http: build_client(PROVIDER)?,
        })
    }

    /// Builds a call with bearer auth attached.
    fn call(&self, operation: &'static str, method: Method, path: &str) -> ProviderCall<'_> {
        let mut call = ProviderCall::new(
            PROVIDER,
            operation,
            method,
            format!("{}{path}", self.instance_url),
        );
        call.headers
            .push(("Authorization".to_string(), format!("Bearer {}", self.api_key)));
        call
    }

    /// Validates the API key with a campaigns read.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the key is rejected or unreachable.
    pub fn validate_api_key(&self) -> Result<(), ProviderError> {
        let call = self.call("validate_api_key", Method::GET, "/api/campaigns");
        request_json(&self.http, &call).map(|_| ())
    }

    /// Lists campaigns.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_campaigns(&self) -> Result<Vec<Value>, ProviderError> {
        let call = self.call("list_campaigns", Method::GET, "/api/campaigns");
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "list_campaigns")
    }

    /// Creates a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn create_campaign(&self, name: &str) -> Result<Value, ProviderError> {
        let mut call = self.call("create_campaign", Method::POST, "/api/campaigns");
        call.json_body = Some(json!({ "name": name }));
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "create_campaign")
    }

    /// Updates a campaign status (`start`, `pause`, `stop`).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn update_campaign_status(
        &self,
        campaign_id: &str,
        status: &str,
    ) -> Result<Value, ProviderError> {
        let path = format!("/api/campaigns/{campaign_id}/status");
        let mut call = self.call("update_campaign_status", Method::POST, &path);
        call.json_body = Some(json!({ "status": status }));
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "update_campaign_status")
    }

    /// Lists leads within a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_leads(&self, campaign_id: &str) -> Result<Vec<Value>, ProviderError> {
        let path = format!("/api/campaigns/{campaign_id}/leads");
        let call = self.call("list_leads", Method::GET, &path);
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "list_leads")
    }

    /// Adds leads to a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn add_leads(&self, campaign_id: &str, leads: &[Value]) -> Result<Value, ProviderError> {
        let path = format!("/api/campaigns/{campaign_id}/leads");
        let mut call = self.call("add_leads", Method::POST, &path);
        call.json_body = Some(json!({ "leads": leads }));
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "add_leads")
    }

    /// Removes one lead from a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn remove_lead(&self, campaign_id: &str, lead_id: &str) -> Result<Value, ProviderError> {
        let path = format!("/api/campaigns/{campaign_id}/leads/{lead_id}");
        let call = self.call("remove_lead", Method::DELETE, &path);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "remove_lead")
    }

    /// Lists sender email accounts.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn list_sender_emails(&self) -> Result<Vec<Value>, ProviderError> {
        let call = self.call("list_sender_emails", Method::GET, "/api/sender-emails");
        let value = request_json(&self.http, &call)?;
        expect_array(value, PROVIDER, "list_sender_emails")
    }

    /// Toggles warmup for a sender email account.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn set_warmup(
        &self,
        sender_email_id: &str,
        enabled: bool,
    ) -> Result<Value, ProviderError> {
        let action = if enabled { "enable" } else { "disable" };
        let path = format!("/api/sender-emails/{sender_email_id}/warmup/{action}");
        let call = self.call("set_warmup", Method::POST, &path);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "set_warmup")
    }

    /// Fetches campaign stats.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure or shape mismatch.
    pub fn campaign_stats(&self, campaign_id: &str) -> Result<Value, ProviderError> {
        let path = format!("/api/campaigns/{campaign_id}/stats");
        let call = self.call("campaign_stats", Method::GET, &path);
        let value = request_json(&self.http, &call)?;
        expect_object(value, PROVIDER, "campaign_stats")
    }
}
