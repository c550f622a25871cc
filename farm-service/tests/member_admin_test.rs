//! Member listing and removal tests, including the last-remover protection.

mod common;

use common::{assert_reason, TestApp};
use farm_core::permissions::Permission;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

async fn add_member(
    app: &TestApp,
    owner: &str,
    farm_id: Uuid,
    email: &str,
    role_id: Uuid,
) -> (String, Uuid) {
    let invite = app.invite(owner, farm_id, email, role_id).await;
    let token = app.register(email, "correct-horse-battery").await;
    let response = app
        .post_authed(
            &format!("/invitations/{}/accept", invite),
            &token,
            None,
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let user = app
        .state
        .store
        .find_user_by_email(email)
        .await
        .expect("store")
        .expect("user registered");
    (token, user.user_id)
}

#[tokio::test]
async fn members_list_shows_role_and_join_order() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    let worker_role = app.role_id(farm_id, "Worker").await;
    add_member(&app, &owner, farm_id, "worker@example.com", worker_role).await;

    let response = app
        .get_authed("/farms/current/members", &owner, Some(farm_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("parse");
    let members = body.as_array().expect("array");
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["email"], "owner@example.com");
    assert_eq!(members[0]["role_name"], "Owner");
    assert_eq!(members[1]["email"], "worker@example.com");
    assert_eq!(members[1]["role_name"], "Worker");
}

#[tokio::test]
async fn removing_a_member_revokes_their_access() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    let worker_role = app.role_id(farm_id, "Worker").await;
    let (worker, worker_id) =
        add_member(&app, &owner, farm_id, "worker@example.com", worker_role).await;

    let response = app
        .delete_authed(
            &format!("/farms/current/members/{}", worker_id),
            &owner,
            Some(farm_id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The ex-member can still authenticate but no longer enters the farm.
    let me = app.get_authed("/users/me", &worker, None).await;
    assert_eq!(me.status(), StatusCode::OK);

    let denied = app
        .get_authed("/farms/current/permissions", &worker, Some(farm_id))
        .await;
    assert_reason(denied, StatusCode::FORBIDDEN, "not_a_farm_member").await;
}

#[tokio::test]
async fn removal_requires_the_permission() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    // Manager can read and invite but not remove.
    let manager_role = app.role_id(farm_id, "Manager").await;
    let (manager, _) =
        add_member(&app, &owner, farm_id, "manager@example.com", manager_role).await;

    let owner_user = app
        .state
        .store
        .find_user_by_email("owner@example.com")
        .await
        .expect("store")
        .expect("owner");

    let response = app
        .delete_authed(
            &format!("/farms/current/members/{}", owner_user.user_id),
            &manager,
            Some(farm_id),
        )
        .await;
    assert_reason(response, StatusCode::FORBIDDEN, "missing_permission").await;
}

#[tokio::test]
async fn removing_an_unknown_member_is_not_found() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    let response = app
        .delete_authed(
            &format!("/farms/current/members/{}", Uuid::new_v4()),
            &owner,
            Some(farm_id),
        )
        .await;
    assert_reason(response, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn the_last_remover_cannot_be_removed() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    let owner_user = app
        .state
        .store
        .find_user_by_email("owner@example.com")
        .await
        .expect("store")
        .expect("owner");

    // The sole Owner removing themselves would leave no one able to manage
    // membership.
    let response = app
        .delete_authed(
            &format!("/farms/current/members/{}", owner_user.user_id),
            &owner,
            Some(farm_id),
        )
        .await;
    assert_reason(response, StatusCode::CONFLICT, "conflict").await;

    // With a second Owner aboard, the same removal goes through.
    let owner_role = app.role_id(farm_id, "Owner").await;
    add_member(&app, &owner, farm_id, "second-owner@example.com", owner_role).await;

    let response = app
        .delete_authed(
            &format!("/farms/current/members/{}", owner_user.user_id),
            &owner,
            Some(farm_id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn removing_a_non_remover_never_trips_the_protection() {
    let app = TestApp::spawn().await;
    let owner = app.register("owner@example.com", "correct-horse-battery").await;
    let farm_id = app.create_farm(&owner, "Willow Creek").await;

    let worker_role = app.role_id(farm_id, "Worker").await;
    let (_, worker_id) =
        add_member(&app, &owner, farm_id, "worker@example.com", worker_role).await;

    assert!(!app
        .state
        .store
        .get_role_permissions(worker_role)
        .await
        .expect("store")
        .contains(&Permission::FarmMemberRemove));

    let response = app
        .delete_authed(
            &format!("/farms/current/members/{}", worker_id),
            &owner,
            Some(farm_id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
