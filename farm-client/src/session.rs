//! Session context: bearer token, farm selection, and mirror lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::api::{CurrentPermissions, FarmApiClient, FarmSummary, UserProfile};
use crate::error::ClientError;
use crate::mirror::PermissionMirror;

/// Source of resolved permission sets. [`FarmApiClient`] is the real one;
/// tests drive the mirror lifecycle with a stub.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn fetch_permissions(
        &self,
        token: &str,
        farm_id: Uuid,
    ) -> Result<CurrentPermissions, ClientError>;
}

#[async_trait]
impl PermissionSource for FarmApiClient {
    async fn fetch_permissions(
        &self,
        token: &str,
        farm_id: Uuid,
    ) -> Result<CurrentPermissions, ClientError> {
        self.current_permissions(token, farm_id).await
    }
}

/// One user's client session.
///
/// The mirror refreshes on login and on every farm switch. A switch is
/// atomic from the UI's point of view: the mirror drops to `Loading` first,
/// and the selected farm id only changes once the new set is installed, so
/// a set from the previous farm is never consulted for the next one.
pub struct Session {
    api: FarmApiClient,
    access_token: Option<String>,
    user: Option<UserProfile>,
    farms: Vec<FarmSummary>,
    selected_farm: Option<Uuid>,
    mirror: Arc<PermissionMirror>,
}

impl Session {
    pub fn new(api: FarmApiClient) -> Self {
        Self {
            api,
            access_token: None,
            user: None,
            farms: Vec::new(),
            selected_farm: None,
            mirror: Arc::new(PermissionMirror::new()),
        }
    }

    /// Log in, load the farm list, and select the default farm (the server
    /// lists farms earliest-joined first).
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        let tokens = self.api.login(email, password).await?;
        self.start(tokens.access_token).await
    }

    /// Register a new account and open a session for it. A fresh account
    /// has no farms; the mirror stays unloaded until one is joined.
    pub async fn register(
        &mut self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<(), ClientError> {
        let tokens = self.api.register(email, password, display_name).await?;
        self.start(tokens.access_token).await
    }

    async fn start(&mut self, access_token: String) -> Result<(), ClientError> {
        self.user = Some(self.api.me(&access_token).await?);
        self.farms = self.api.list_farms(&access_token).await?;
        self.access_token = Some(access_token);
        self.selected_farm = None;
        self.mirror.invalidate();

        if let Some(default) = self.farms.first().map(|f| f.farm_id) {
            self.switch_farm(default).await?;
        }
        Ok(())
    }

    /// Switch the session to another farm and refresh the mirror from the
    /// server. On failure the previous selection stays in place and the
    /// mirror reports loading, never the old farm's set.
    pub async fn switch_farm(&mut self, farm_id: Uuid) -> Result<(), ClientError> {
        let token = self.token()?.to_string();
        refresh_mirror(&self.api, &self.mirror, &token, farm_id).await?;
        self.selected_farm = Some(farm_id);
        Ok(())
    }

    /// Re-fetch the set for the current farm, e.g. after the UI is told a
    /// role changed.
    pub async fn refresh_permissions(&self) -> Result<(), ClientError> {
        let farm_id = self.selected_farm.ok_or(ClientError::NoFarmSelected)?;
        let token = self.token()?.to_string();
        refresh_mirror(&self.api, &self.mirror, &token, farm_id).await
    }

    /// Reload the farm list, e.g. after accepting an invitation.
    pub async fn reload_farms(&mut self) -> Result<(), ClientError> {
        let token = self.token()?.to_string();
        self.farms = self.api.list_farms(&token).await?;
        Ok(())
    }

    pub fn logout(&mut self) {
        self.access_token = None;
        self.user = None;
        self.farms.clear();
        self.selected_farm = None;
        self.mirror.invalidate();
    }

    pub fn token(&self) -> Result<&str, ClientError> {
        self.access_token
            .as_deref()
            .ok_or(ClientError::NotAuthenticated)
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn farms(&self) -> &[FarmSummary] {
        &self.farms
    }

    pub fn selected_farm(&self) -> Option<Uuid> {
        self.selected_farm
    }

    /// Shared handle for UI code to gate rendering with.
    pub fn mirror(&self) -> Arc<PermissionMirror> {
        self.mirror.clone()
    }

    pub fn api(&self) -> &FarmApiClient {
        &self.api
    }
}

/// Refresh a mirror from a source: drop to loading, fetch, install.
///
/// The installed set is only accepted if the server confirms it is for the
/// requested farm.
pub async fn refresh_mirror(
    source: &dyn PermissionSource,
    mirror: &PermissionMirror,
    token: &str,
    farm_id: Uuid,
) -> Result<(), ClientError> {
    mirror.invalidate();

    let payload = source.fetch_permissions(token, farm_id).await?;
    if payload.farm_id != farm_id {
        return Err(ClientError::UnexpectedResponse(format!(
            "Permission set for farm {} arrived while switching to {}",
            payload.farm_id, farm_id
        )));
    }

    mirror.install(&payload.permissions);
    Ok(())
}
