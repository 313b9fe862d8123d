mod common;

use axum::http::StatusCode;
use cms_backend::models::UserRole;
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

fn new_user(first: &str, last: &str, email: &str) -> serde_json::Value {
    json!({
        "firstName": first,
        "lastName": last,
        "email": email,
        "password": "password1",
        "isActive": true
    })
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let app = TestApp::new();
    let (_, user_token) = app.seed_user("user@example.com", UserRole::User).await;

    let (status, _) = app.send("GET", "/admin/pages", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send("GET", "/admin/pages", Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden");
}

#[tokio::test]
async fn test_create_get_update_delete_user() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let (status, created) = app
        .send(
            "POST",
            "/admin/users",
            Some(&token),
            Some(new_user(" Ann ", "Smith", "ANN@example.com")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["firstName"], "Ann");
    assert_eq!(created["email"], "ann@example.com");
    assert_eq!(created["role"], "USER");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = app
        .send("GET", &format!("/admin/users/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["email"], "ann@example.com");

    let (status, updated) = app
        .send(
            "PATCH",
            &format!("/admin/users/{id}"),
            Some(&token),
            Some(json!({"lastName": "Jones", "isActive": false})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["lastName"], "Jones");
    assert_eq!(updated["isActive"], false);

    let (status, deleted) = app
        .send("DELETE", &format!("/admin/users/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["id"], id);

    let (status, body) = app
        .send("GET", &format!("/admin/users/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], format!("User with id - {id} does not exist"));
}

#[tokio::test]
async fn test_user_id_must_be_uuid() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let (status, body) = app
        .send("GET", "/admin/users/42", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request");
}

#[tokio::test]
async fn test_duplicate_email_on_create_and_update() {
    let app = TestApp::new();
    let token = app.admin_token().await;
    let (other, _) = app.seed_user("other@example.com", UserRole::User).await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/users",
            Some(&token),
            Some(new_user("A", "B", "other@example.com")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "User with email - other@example.com already exists"
    );

    let (status, _) = app
        .send(
            "PATCH",
            &format!("/admin/users/{}", other.id),
            Some(&token),
            Some(json!({"email": "admin@admin.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Re-submitting one's own email is not a collision.
    let (status, _) = app
        .send(
            "PATCH",
            &format!("/admin/users/{}", other.id),
            Some(&token),
            Some(json!({"email": "other@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_unknown_user_is_not_found() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let (status, _) = app
        .send(
            "PATCH",
            &format!("/admin/users/{}", Uuid::new_v4()),
            Some(&token),
            Some(json!({"firstName": "X"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_find_users_search_sort_and_paging() {
    let app = TestApp::new();
    let token = app.admin_token().await;
    for (first, email) in [
        ("Charlie", "charlie@corp.com"),
        ("Alice", "alice@corp.com"),
        ("Bob", "bob@corp.com"),
        ("Zed", "zed@elsewhere.org"),
    ] {
        let (status, _) = app
            .send(
                "POST",
                "/admin/users",
                Some(&token),
                Some(new_user(first, "Member", email)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .send(
            "POST",
            "/admin/users/find",
            Some(&token),
            Some(json!({
                "search": "corp",
                "sort": {"firstName": "ASC"},
                "page": 1,
                "perPage": 2
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["page"], 1);
    assert_eq!(body["perPage"], 2);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["firstName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alice", "Bob"]);

    let (status, body) = app
        .send(
            "POST",
            "/admin/users/find",
            Some(&token),
            Some(json!({
                "filters": {"email": "zed@elsewhere.org"},
                "page": 1,
                "perPage": 10
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["firstName"], "Zed");
}

#[tokio::test]
async fn test_find_users_rejects_non_positive_page() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/users/find",
            Some(&token),
            Some(json!({"page": 0, "perPage": 10})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["validationErrors"][0]["property"], "page");
}

#[tokio::test]
async fn test_find_users_with_huge_paging_values() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/users/find",
            Some(&token),
            Some(json!({"page": i64::MAX, "perPage": i64::MAX})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["totalPages"], 1);
}
