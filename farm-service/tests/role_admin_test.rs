//! Role administration tests.

mod common;

use common::{assert_reason, TestApp};
use farm_core::permissions::Permission;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn new_farms_start_with_the_seeded_roles() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    let response = app
        .get_authed("/farms/current/roles", &owner, Some(farm_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("parse");
    let roles = body.as_array().expect("array");
    let names: Vec<&str> = roles.iter().filter_map(|r| r["name"].as_str()).collect();
    assert!(names.contains(&"Owner"));
    assert!(names.contains(&"Manager"));
    assert!(names.contains(&"Worker"));

    let owner_role = roles.iter().find(|r| r["name"] == "Owner").expect("Owner");
    assert_eq!(
        owner_role["permissions"].as_array().expect("array").len(),
        Permission::ALL.len()
    );
}

#[tokio::test]
async fn creating_a_role_returns_its_permissions() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    let response = app
        .post_authed(
            "/farms/current/roles",
            &owner,
            Some(farm_id),
            &json!({ "name": "Agronomist", "permissions": ["FIELD_READ", "CROP_HEALTH_READ"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("parse");
    assert_eq!(body["name"], "Agronomist");
    assert_eq!(body["version"], 0);
    assert_eq!(body["permissions"], json!(["CROP_HEALTH_READ", "FIELD_READ"]));
}

#[tokio::test]
async fn duplicate_role_names_conflict_within_a_farm() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    let response = app
        .post_authed(
            "/farms/current/roles",
            &owner,
            Some(farm_id),
            &json!({ "name": "owner", "permissions": [] }),
        )
        .await;
    assert_reason(response, StatusCode::CONFLICT, "conflict").await;

    // The same name in a different farm is fine.
    let other_farm = app.create_farm(&owner, "Other Farm").await;
    let response = app
        .post_authed(
            "/farms/current/roles",
            &owner,
            Some(other_farm),
            &json!({ "name": "Agronomist", "permissions": [] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn unknown_permission_names_are_rejected() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    // Closed catalog: misspellings fail request parsing, they never produce
    // a phantom grant.
    let response = app
        .post_authed(
            "/farms/current/roles",
            &owner,
            Some(farm_id),
            &json!({ "name": "Typo", "permissions": ["FIELD_CRATE"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let role_id = app.role_id(farm_id, "Worker").await;
    let response = app
        .delete_authed(
            &format!("/farms/current/roles/{}/permissions/NOT_A_PERMISSION", role_id),
            &owner,
            Some(farm_id),
        )
        .await;
    assert_reason(response, StatusCode::BAD_REQUEST, "bad_request").await;
}

#[tokio::test]
async fn grant_and_revoke_bump_the_role_version() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;
    let role_id = app.role_id(farm_id, "Worker").await;

    let response = app
        .post_authed(
            &format!("/farms/current/roles/{}/permissions", role_id),
            &owner,
            Some(farm_id),
            &json!({ "permission": "REPORT_READ" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("parse");
    assert_eq!(body["version"], 1);
    assert!(body["permissions"]
        .as_array()
        .expect("array")
        .iter()
        .any(|p| p == "REPORT_READ"));

    let response = app
        .delete_authed(
            &format!("/farms/current/roles/{}/permissions/REPORT_READ", role_id),
            &owner,
            Some(farm_id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("parse");
    assert_eq!(body["version"], 2);
    assert!(!body["permissions"]
        .as_array()
        .expect("array")
        .iter()
        .any(|p| p == "REPORT_READ"));
}

#[tokio::test]
async fn roles_from_another_farm_are_invisible() {
    let app = TestApp::spawn().await;
    let alice = app.register("alice@example.com", "correct-horse-battery").await;
    let bob = app.register("bob@example.com", "correct-horse-battery").await;

    let farm_a = app.create_farm(&alice, "Farm A").await;
    let farm_b = app.create_farm(&bob, "Farm B").await;

    let role_in_b = app.role_id(farm_b, "Worker").await;

    // Alice manages roles in her own farm but names a role from Bob's.
    let response = app
        .post_authed(
            &format!("/farms/current/roles/{}/permissions", role_in_b),
            &alice,
            Some(farm_a),
            &json!({ "permission": "FIELD_READ" }),
        )
        .await;
    assert_reason(response, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn role_management_requires_the_permission() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    // Managers can invite but not manage roles.
    let manager_role = app.role_id(farm_id, "Manager").await;
    let invite = app
        .invite(&owner, farm_id, "manager@example.com", manager_role)
        .await;
    let manager = app.register("manager@example.com", "correct-horse-battery").await;
    let response = app
        .post_authed(
            &format!("/invitations/{}/accept", invite),
            &manager,
            None,
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .get_authed("/farms/current/roles", &manager, Some(farm_id))
        .await;
    assert_reason(response, StatusCode::FORBIDDEN, "missing_permission").await;
}
