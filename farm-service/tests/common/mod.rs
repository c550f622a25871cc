//! Test helpers for farm-service integration tests.
//!
//! Spawns the real router on a random port with the in-memory store and the
//! recording email provider, so tests exercise the full middleware pipeline
//! over HTTP without external services.

#![allow(dead_code)]

use farm_core::permissions::Permission;
use farm_service::{
    config::{
        DatabaseConfig, Environment, FarmConfig, InvitationConfig, JwtConfig, SecurityConfig,
        SmtpConfig,
    },
    services::{JwtService, MemoryStore, MockEmailService, PermissionResolver},
    AppState,
};
use reqwest::StatusCode;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

pub const SELECTED_FARM_HEADER: &str = "x-selected-farm-id";

pub struct TestApp {
    pub address: String,
    pub state: AppState,
    pub email: Arc<MockEmailService>,
    client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application on a random local port.
    pub async fn spawn() -> Self {
        let config = create_test_config();

        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(MockEmailService::new());
        let jwt = JwtService::new(&config.jwt);
        let permissions =
            PermissionResolver::new(store.clone() as Arc<dyn farm_service::services::FarmStore>);

        let state = AppState {
            config,
            store,
            jwt,
            permissions,
            email: email.clone(),
        };

        let app = farm_service::build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().expect("Failed to read local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server crashed");
        });

        Self {
            address: format!("http://{}", addr),
            state,
            email,
            client: reqwest::Client::new(),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    // ==================== Request helpers ====================

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_authed(
        &self,
        path: &str,
        token: &str,
        farm_id: Option<Uuid>,
        body: &Value,
    ) -> reqwest::Response {
        let mut req = self
            .client
            .post(format!("{}{}", self.address, path))
            .bearer_auth(token)
            .json(body);
        if let Some(farm_id) = farm_id {
            req = req.header(SELECTED_FARM_HEADER, farm_id.to_string());
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn get_authed(
        &self,
        path: &str,
        token: &str,
        farm_id: Option<Uuid>,
    ) -> reqwest::Response {
        let mut req = self
            .client
            .get(format!("{}{}", self.address, path))
            .bearer_auth(token);
        if let Some(farm_id) = farm_id {
            req = req.header(SELECTED_FARM_HEADER, farm_id.to_string());
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn delete_authed(
        &self,
        path: &str,
        token: &str,
        farm_id: Option<Uuid>,
    ) -> reqwest::Response {
        let mut req = self
            .client
            .delete(format!("{}{}", self.address, path))
            .bearer_auth(token);
        if let Some(farm_id) = farm_id {
            req = req.header(SELECTED_FARM_HEADER, farm_id.to_string());
        }
        req.send().await.expect("Failed to execute request")
    }

    // ==================== Scenario helpers ====================

    /// Register an account and return its access token.
    pub async fn register(&self, email: &str, password: &str) -> String {
        let response = self
            .post_json(
                "/auth/register",
                &json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse response");
        body["access_token"]
            .as_str()
            .expect("Missing access_token")
            .to_string()
    }

    /// Create a farm as `token`'s user and return its id.
    pub async fn create_farm(&self, token: &str, name: &str) -> Uuid {
        let response = self
            .post_authed("/farms", token, None, &json!({ "name": name }))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse response");
        body["farm"]["farm_id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("Missing farm_id")
    }

    /// Look up a seeded role id by name in a farm.
    pub async fn role_id(&self, farm_id: Uuid, name: &str) -> Uuid {
        let roles = self
            .state
            .store
            .find_roles_for_farm(farm_id)
            .await
            .expect("Failed to list roles");
        roles
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.role_id)
            .unwrap_or_else(|| panic!("No role named '{}' in farm", name))
    }

    /// Create a custom role with an exact permission set, as `token`'s user.
    pub async fn create_role(
        &self,
        token: &str,
        farm_id: Uuid,
        name: &str,
        permissions: &[Permission],
    ) -> Uuid {
        let permissions: Vec<&str> = permissions.iter().map(|p| p.as_str()).collect();
        let response = self
            .post_authed(
                "/farms/current/roles",
                token,
                Some(farm_id),
                &json!({ "name": name, "permissions": permissions }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse response");
        body["role_id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("Missing role_id")
    }

    /// Issue an invitation and return the signed token from the response.
    pub async fn invite(&self, token: &str, farm_id: Uuid, email: &str, role_id: Uuid) -> String {
        let response = self
            .post_authed(
                "/invitations",
                token,
                Some(farm_id),
                &json!({ "email": email, "role_id": role_id }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse response");
        body["invite_token"]
            .as_str()
            .expect("Missing invite_token")
            .to_string()
    }
}

/// Assert that an error response carries the expected machine-readable
/// reason code.
pub async fn assert_reason(response: reqwest::Response, status: StatusCode, reason: &str) {
    assert_eq!(response.status(), status);
    let body: Value = response.json().await.expect("Failed to parse error body");
    assert_eq!(body["reason"], reason, "unexpected reason in {}", body);
}

fn create_test_config() -> FarmConfig {
    FarmConfig {
        common: farm_core::config::Config {
            host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 0,
        },
        environment: Environment::Dev,
        service_name: "farm-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "warn".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused-in-tests".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: Secret::new("integration-test-signing-secret".to_string()),
            access_token_expiry_minutes: 15,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            from_email: "noreply@test.local".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            public_base_url: "http://localhost:8080".to_string(),
        },
        invitation: InvitationConfig { expiry_days: 7 },
    }
}
