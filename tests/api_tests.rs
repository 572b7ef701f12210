//! API integration tests.
//!
//! These run against a live server (`cargo run`) with a freshly migrated
//! database seeded through the fixtures below. Bearer tokens are minted by
//! the identity service in front of Folio; supply one admin and one member
//! token via FOLIO_TEST_ADMIN_TOKEN / FOLIO_TEST_MEMBER_TOKEN.
//!
//! Run with: cargo test -- --ignored

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn admin_token() -> String {
    std::env::var("FOLIO_TEST_ADMIN_TOKEN").expect("FOLIO_TEST_ADMIN_TOKEN not set")
}

fn member_token() -> String {
    std::env::var("FOLIO_TEST_MEMBER_TOKEN").expect("FOLIO_TEST_MEMBER_TOKEN not set")
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_borrow_requires_auth() {
    let client = Client::new();

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({ "book_id": 1 }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_borrow_without_book_id_is_rejected() {
    let client = Client::new();

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["message"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_borrow_then_approve_decrements_availability() {
    let client = Client::new();

    // Member requests a seeded book with known availability
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&json!({ "book_id": 1 }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(loan["status"], "PENDING");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    // Admin approves: this is the point inventory is withheld
    let response = client
        .post(format!("{}/loans/{}/approve", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    let approved: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(approved["status"], "ACTIVE");
    assert!(approved["approved_at"].is_string());

    // A second approval must conflict: the loan is no longer PENDING
    let response = client
        .post(format!("{}/loans/{}/approve", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);

    // Returning restores the copy
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", member_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["status"], "RETURNED");
}

#[tokio::test]
#[ignore]
async fn test_return_of_terminal_loan_conflicts() {
    let client = Client::new();

    // Borrow, approve, return, then return again
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&json!({ "book_id": 2 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.unwrap();
    let loan_id = loan["id"].as_i64().unwrap();

    client
        .post(format!("{}/loans/{}/approve", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");

    client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", member_token()))
        .send()
        .await
        .expect("Failed to send request");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", member_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_admin_create_loan_rejects_past_due_date() {
    let client = Client::new();

    let response = client
        .post(format!("{}/admin/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&json!({
            "user_id": 2,
            "book_id": 1,
            "due_date": "2020-01-01T00:00:00Z"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_book_request_needs_isbn_or_title_author() {
    let client = Client::new();

    let response = client
        .post(format!("{}/book-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&json!({ "title": "Only title" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_open_request_conflicts() {
    let client = Client::new();

    let body = json!({
        "title": "An Unstocked Book",
        "author": "Nobody Famous"
    });

    let response = client
        .post(format!("{}/book-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let request: Value = response.json().await.unwrap();
    assert_eq!(request["status"], "OPEN");

    // Same key, same user, still open: duplicate
    let response = client
        .post(format!("{}/book-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_auto_fulfill_is_idempotent() {
    let client = Client::new();

    // First pass fulfills whatever matches book 1
    let response = client
        .post(format!("{}/books/1/fulfill-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    // Second pass on unchanged state fulfills nothing
    let response = client
        .post(format!("{}/books/1/fulfill-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["fulfilled_count"], 0);
}

#[tokio::test]
#[ignore]
async fn test_approve_against_last_copy_conflicts_and_lost_never_restores() {
    let client = Client::new();

    // Book 3 is seeded with exactly one copy. Both users queue up while
    // the copy is still on the shelf; PENDING reserves nothing.
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&json!({ "book_id": 3 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let first: Value = response.json().await.unwrap();
    let first_id = first["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&json!({ "book_id": 3 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let second: Value = response.json().await.unwrap();
    let second_id = second["id"].as_i64().unwrap();

    // First approval takes the last copy
    let response = client
        .post(format!("{}/loans/{}/approve", BASE_URL, first_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    // Second approval finds zero copies
    let response = client
        .post(format!("{}/loans/{}/approve", BASE_URL, second_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "BookNotAvailable");

    // Writing the first loan off as lost must NOT put the copy back
    let response = client
        .post(format!("{}/admin/loans/{}/lost", BASE_URL, first_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/loans/{}/approve", BASE_URL, second_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "BookNotAvailable");
}

#[tokio::test]
#[ignore]
async fn test_return_restores_the_last_copy() {
    let client = Client::new();

    // Book 4 is seeded with exactly one copy
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&json!({ "book_id": 4 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let first: Value = response.json().await.unwrap();
    let first_id = first["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&json!({ "book_id": 4 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let second: Value = response.json().await.unwrap();
    let second_id = second["id"].as_i64().unwrap();

    client
        .post(format!("{}/loans/{}/approve", BASE_URL, first_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");

    let response = client
        .post(format!("{}/loans/{}/approve", BASE_URL, second_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // Returning the first loan frees the copy for the second
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, first_id))
        .header("Authorization", format!("Bearer {}", member_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/loans/{}/approve", BASE_URL, second_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let approved: Value = response.json().await.unwrap();
    assert_eq!(approved["status"], "ACTIVE");
}

#[tokio::test]
#[ignore]
async fn test_concurrent_identical_requests_have_one_winner() {
    let client = Client::new();

    let body = json!({
        "title": "A Book Nobody Stocked",
        "author": "A. N. Author"
    });

    // Fire both at once: the partial unique index on open requests
    // guarantees at most one lands OPEN
    let first = client
        .post(format!("{}/book-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&body)
        .send();
    let second = client
        .post(format!("{}/book-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .json(&body)
        .send();

    let (first, second) = tokio::join!(first, second);
    let statuses = [
        first.expect("Failed to send request").status().as_u16(),
        second.expect("Failed to send request").status().as_u16(),
    ];

    assert!(statuses.contains(&201), "no request was created: {:?}", statuses);
    assert!(statuses.contains(&409), "both requests landed: {:?}", statuses);
}

#[tokio::test]
#[ignore]
async fn test_settings_require_admin() {
    let client = Client::new();

    let response = client
        .get(format!("{}/settings", BASE_URL))
        .header("Authorization", format!("Bearer {}", member_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{}/settings", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(body["max_concurrent_loans"].is_number());
}
