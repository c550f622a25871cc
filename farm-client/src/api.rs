//! HTTP client for the farmdeck API surface.

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ClientError;

/// Per-request farm selector header; must match the server's.
pub const SELECTED_FARM_HEADER: &str = "x-selected-farm-id";

#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FarmSummary {
    pub farm_id: Uuid,
    pub farm_name: String,
    pub role_id: Uuid,
    pub role_name: String,
    pub joined_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentPermissions {
    pub farm_id: Uuid,
    pub role_id: Uuid,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationDetails {
    pub farm_id: Uuid,
    pub farm_name: String,
    pub invited_email: String,
    pub role_name: String,
    pub expires_at: DateTime<Utc>,
    pub already_member: bool,
    pub requires_registration: bool,
    pub caller_email_matches: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationAccepted {
    pub farm_id: Uuid,
    pub farm_name: String,
    pub role_id: Uuid,
    pub already_member: bool,
}

/// Thin typed wrapper over the service's HTTP API.
#[derive(Clone)]
pub struct FarmApiClient {
    client: Client,
    base_url: String,
}

impl FarmApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ==================== Auth ====================

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthTokens, ClientError> {
        let mut body = serde_json::json!({ "email": email, "password": password });
        if let Some(name) = display_name {
            body["display_name"] = Value::String(name.to_string());
        }
        let response = self
            .request(Method::POST, "/auth/register", None, None)
            .json(&body)
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, ClientError> {
        let response = self
            .request(Method::POST, "/auth/login", None, None)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn me(&self, token: &str) -> Result<UserProfile, ClientError> {
        let response = self
            .request(Method::GET, "/users/me", Some(token), None)
            .send()
            .await?;
        parse_json(response).await
    }

    // ==================== Farms ====================

    pub async fn list_farms(&self, token: &str) -> Result<Vec<FarmSummary>, ClientError> {
        let response = self
            .request(Method::GET, "/farms", Some(token), None)
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn create_farm(&self, token: &str, name: &str) -> Result<Value, ClientError> {
        let response = self
            .request(Method::POST, "/farms", Some(token), None)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        parse_json(response).await
    }

    /// Fetch the resolved permission set for (caller, farm). This is what
    /// the permission mirror refreshes from.
    pub async fn current_permissions(
        &self,
        token: &str,
        farm_id: Uuid,
    ) -> Result<CurrentPermissions, ClientError> {
        let response = self
            .request(
                Method::GET,
                "/farms/current/permissions",
                Some(token),
                Some(farm_id),
            )
            .send()
            .await?;
        parse_json(response).await
    }

    // ==================== Invitations ====================

    pub async fn invitation_details(
        &self,
        invite_token: &str,
        bearer: Option<&str>,
    ) -> Result<InvitationDetails, ClientError> {
        let path = format!("/invitations/{}/details", invite_token);
        let response = self
            .request(Method::GET, &path, bearer, None)
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn accept_invitation(
        &self,
        token: &str,
        invite_token: &str,
    ) -> Result<InvitationAccepted, ClientError> {
        let path = format!("/invitations/{}/accept", invite_token);
        let response = self
            .request(Method::POST, &path, Some(token), None)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn invite(
        &self,
        token: &str,
        farm_id: Uuid,
        email: &str,
        role_id: Uuid,
    ) -> Result<Value, ClientError> {
        let response = self
            .request(Method::POST, "/invitations", Some(token), Some(farm_id))
            .json(&serde_json::json!({ "email": email, "role_id": role_id }))
            .send()
            .await?;
        parse_json(response).await
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        farm_id: Option<Uuid>,
    ) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        if let Some(farm_id) = farm_id {
            req = req.header(SELECTED_FARM_HEADER, farm_id.to_string());
        }
        req
    }
}

/// Decode a success body, or lift the server's `{ error, reason }` body into
/// [`ClientError::Api`].
async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        let body: Value = response.json().await?;
        serde_json::from_value(body.clone())
            .map_err(|e| ClientError::UnexpectedResponse(format!("{} in {}", e, body)))
    } else {
        Err(api_error(status, response.json().await.ok()))
    }
}

fn api_error(status: StatusCode, body: Option<Value>) -> ClientError {
    let body = body.unwrap_or_default();
    let reason = body["reason"].as_str().unwrap_or("unknown").to_string();
    let message = body["error"]
        .as_str()
        .unwrap_or("Request failed")
        .to_string();
    tracing::debug!(status = %status, reason = %reason, "API request failed");
    ClientError::Api {
        status: status.as_u16(),
        reason,
        message,
    }
}
