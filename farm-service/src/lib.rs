pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use farm_core::middleware::security_headers::security_headers_middleware;
use farm_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::FarmConfig;
use crate::middleware::SELECTED_FARM_HEADER;
use crate::services::{EmailProvider, FarmStore, JwtService, PermissionResolver};

#[derive(Clone)]
pub struct AppState {
    pub config: FarmConfig,
    pub store: Arc<dyn FarmStore>,
    pub jwt: JwtService,
    pub permissions: PermissionResolver,
    pub email: Arc<dyn EmailProvider>,
}

pub fn build_router(state: AppState) -> Router {
    // Routes needing only a verified identity.
    let authed_routes = Router::new()
        .route("/users/me", get(handlers::user::get_me))
        .route(
            "/farms",
            post(handlers::farm::create_farm).get(handlers::farm::list_farms),
        )
        .route(
            "/invitations/:token/accept",
            post(handlers::invitation::accept_invitation),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Routes evaluated inside a resolved farm scope. Layers run outermost
    // last, so auth runs before farm context resolution.
    let farm_routes = Router::new()
        .route(
            "/farms/current/permissions",
            get(handlers::permission::current_permissions),
        )
        .route("/farms/current/members", get(handlers::farm::list_members))
        .route(
            "/farms/current/members/:user_id",
            delete(handlers::farm::remove_member),
        )
        .route(
            "/farms/current/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/farms/current/roles/:role_id/permissions",
            post(handlers::role::grant_permission),
        )
        .route(
            "/farms/current/roles/:role_id/permissions/:permission",
            delete(handlers::role::revoke_permission),
        )
        .route(
            "/invitations",
            post(handlers::invitation::create_invitation),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::farm_context_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(SELECTED_FARM_HEADER),
        ]);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route(
            "/invitations/:token/details",
            get(handlers::invitation::invitation_details),
        )
        .merge(authed_routes)
        .merge(farm_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(farm_core::middleware::tracing::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}
