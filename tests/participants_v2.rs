mod common;

use axum::http::{Method, StatusCode};
use common::{listed_ids, spawn_app};
use serde_json::json;

fn ada() -> serde_json::Value {
    json!({
        "name": { "first_name": "Ada", "last_name": "Lovelace" },
        "date_of_birth": { "date": "1924-12-05" },
        "social_security_number": { "number": "123-45-6789" },
        "addresses": [{ "name": "home", "street_1": "1 Main St", "city": "Chicago", "state": "IL", "zip": "60601", "primary": true }],
        "emails": [{ "email": "ada@example.com" }],
        "phones": [{ "name": "mobile", "number": "555-123-4567", "primary": true }],
        "medical_record_numbers": [{ "number": "MRN-1" }]
    })
}

#[tokio::test]
async fn create_then_show_returns_nested_record() {
    let app = spawn_app().await;
    let token = app.admin_token();

    let id = app.create_participant(&token, ada()).await;
    assert!(id.len() >= 8);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));

    let response = app.get(&format!("/v2/participants/{}", id), &token).await;
    assert_eq!(response.status, StatusCode::OK);

    let p = &response.body["participants"];
    assert_eq!(p["id"], json!(id));
    assert_eq!(p["name"]["first_name"], json!("Ada"));
    assert_eq!(p["date_of_birth"]["date"], json!("1924-12-05"));
    assert_eq!(p["social_security_number"]["number"], json!("123-45-6789"));
    assert_eq!(p["addresses"][0]["primary"], json!(true));
    assert_eq!(p["emails"], json!([{ "email": "ada@example.com" }]));
    assert_eq!(p["phones"][0]["number"], json!("555-123-4567"));
    assert_eq!(p["ip_address_numbers"], json!([]));
    assert!(p.get("participant_id").is_none());
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let app = spawn_app().await;
    let token = app.admin_token();
    let id = app.create_participant(&token, json!({})).await;

    for missing in ["baz", "gB0NV05eX", "zzzzzzzz"] {
        if missing == id {
            continue;
        }
        let response = app.get(&format!("/v2/participants/{}", missing), &token).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", missing);
        assert_eq!(response.body["errors"][0]["code"], json!("not_found"));
    }
}

#[tokio::test]
async fn listing_is_ordered_and_wrapped() {
    let app = spawn_app().await;
    let token = app.admin_token();

    let first = app.create_participant(&token, json!({})).await;
    let second = app.create_participant(&token, json!({})).await;
    let third = app.create_participant(&token, json!({})).await;

    let response = app.get("/v2/participants", &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(listed_ids(&response.body), vec![first, second, third]);
}

#[tokio::test]
async fn dotted_filters_select_by_sub_record() {
    let app = spawn_app().await;
    let token = app.admin_token();

    let ada = app.create_participant(&token, ada()).await;
    let grace = app
        .create_participant(
            &token,
            json!({
                "name": { "first_name": "Grace", "last_name": "Hopper" },
                "date_of_birth": { "date": "1906-12-09" },
                "emails": [{ "email": "grace@navy.example.org" }, { "email": "ghopper@example.com" }]
            }),
        )
        .await;

    let response = app
        .get("/v2/participants?participants.date_of_birth.date.eq=1924-12-05", &token)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(listed_ids(&response.body), vec![ada.clone()]);

    // any one matching email is enough
    let response = app
        .get("/v2/participants?participants.emails.email.cont=navy", &token)
        .await;
    assert_eq!(listed_ids(&response.body), vec![grace.clone()]);

    let response = app
        .get("/v2/participants?participants.name.last_name.start=Hop", &token)
        .await;
    assert_eq!(listed_ids(&response.body), vec![grace.clone()]);

    let response = app
        .get("/v2/participants?participants.emails.email.cont=example.com", &token)
        .await;
    assert_eq!(listed_ids(&response.body), vec![ada.clone(), grace.clone()]);

    let response = app
        .get(&format!("/v2/participants?participants.id.eq={}", grace), &token)
        .await;
    assert_eq!(listed_ids(&response.body), vec![grace.clone()]);

    let response = app
        .get("/v2/participants?participants.phones.primary.eq=true", &token)
        .await;
    assert_eq!(listed_ids(&response.body), vec![ada.clone()]);
}

#[tokio::test]
async fn filters_are_conjunctive() {
    let app = spawn_app().await;
    let token = app.admin_token();
    let ada = app.create_participant(&token, ada()).await;

    let response = app
        .get(
            "/v2/participants?participants.name.first_name.eq=Ada&participants.emails.email.start=ada",
            &token,
        )
        .await;
    assert_eq!(listed_ids(&response.body), vec![ada]);

    let response = app
        .get(
            "/v2/participants?participants.name.first_name.eq=Ada&participants.name.first_name.eq=Grace",
            &token,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(listed_ids(&response.body).is_empty());
}

#[tokio::test]
async fn like_wildcards_in_values_are_literal() {
    let app = spawn_app().await;
    let token = app.admin_token();
    app.create_participant(&token, ada()).await;

    let response = app
        .get("/v2/participants?participants.emails.email.cont=%25", &token)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(listed_ids(&response.body).is_empty());
}

#[tokio::test]
async fn invalid_filters_are_rejected_and_other_params_ignored() {
    let app = spawn_app().await;
    let token = app.admin_token();
    app.create_participant(&token, json!({})).await;

    for query in [
        "participants.emails.password.eq=x",
        "participants.secrets.value.eq=x",
        "participants.emails.email.gt=x",
        "participants.emails.eq=x",
    ] {
        let response = app.get(&format!("/v2/participants?{}", query), &token).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", query);
        assert_eq!(response.body["errors"][0]["code"], json!("invalid_filter"));
    }

    let response = app.get("/v2/participants?page=2&sort=name", &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(listed_ids(&response.body).len(), 1);
}

#[tokio::test]
async fn project_scope_limits_visibility() {
    let app = spawn_app().await;
    let alpha = app.project("alpha").await;
    let beta = app.project("beta").await;
    let alpha_token = app.token(Some(alpha.id));
    let beta_token = app.token(Some(beta.id));
    let admin = app.admin_token();

    let in_alpha = app.create_participant(&alpha_token, json!({})).await;
    let unscoped = app.create_participant(&admin, json!({})).await;

    assert_eq!(app.state.projects.count_participants(alpha.id).await.unwrap(), 1);
    assert_eq!(app.state.projects.count_participants(beta.id).await.unwrap(), 0);

    let response = app.get("/v2/participants", &alpha_token).await;
    assert_eq!(listed_ids(&response.body), vec![in_alpha.clone()]);

    let response = app.get("/v2/participants", &beta_token).await;
    assert!(listed_ids(&response.body).is_empty());

    let response = app.get("/v2/participants", &admin).await;
    assert_eq!(listed_ids(&response.body), vec![in_alpha.clone(), unscoped.clone()]);

    let response = app.get(&format!("/v2/participants/{}", in_alpha), &beta_token).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .put(
            &format!("/v2/participants/{}", in_alpha),
            &beta_token,
            json!({ "participants": { "emails": [] } }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.delete(&format!("/v2/participants/{}", unscoped), &alpha_token).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_replaces_submitted_kinds_only() {
    let app = spawn_app().await;
    let token = app.admin_token();
    let id = app.create_participant(&token, ada()).await;
    let uri = format!("/v2/participants/{}", id);

    let response = app
        .put(
            &uri,
            &token,
            json!({ "participants": {
                "emails": [{ "email": "countess@example.com" }, { "email": "ada@analytical.example.org" }],
                "name": null,
                "medical_record_numbers": []
            } }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let p = &response.body["participants"];
    assert_eq!(
        p["emails"],
        json!([{ "email": "countess@example.com" }, { "email": "ada@analytical.example.org" }])
    );
    assert!(p["name"].is_null());
    assert_eq!(p["medical_record_numbers"], json!([]));
    // untouched kinds survive
    assert_eq!(p["phones"][0]["number"], json!("555-123-4567"));
    assert_eq!(p["date_of_birth"]["date"], json!("1924-12-05"));
    assert_eq!(p["addresses"].as_array().unwrap().len(), 1);

    assert_eq!(app.count("emails").await, 2);
    assert_eq!(app.count("names").await, 0);
}

#[tokio::test]
async fn empty_update_is_a_no_op() {
    let app = spawn_app().await;
    let token = app.admin_token();
    let id = app.create_participant(&token, ada()).await;
    let uri = format!("/v2/participants/{}", id);

    let before = app.get(&uri, &token).await.body;
    let response = app.put(&uri, &token, json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, before);

    let response = app.request(Method::PUT, &uri, Some(&token), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, before);
}

#[tokio::test]
async fn invalid_create_writes_nothing() {
    let app = spawn_app().await;
    let token = app.admin_token();

    let response = app
        .post(
            "/v2/participants",
            &token,
            json!({ "participants": {
                "date_of_birth": { "date": "05/12/1924" },
                "emails": [{ "email": "not-an-email" }],
                "phones": [{ "number": "1" }]
            } }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let fields: Vec<&str> = response.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"date_of_birth.date"));
    assert!(fields.contains(&"emails[0].email"));
    assert!(fields.contains(&"phones[0].number"));

    assert_eq!(app.count("participants").await, 0);
    assert_eq!(app.count("emails").await, 0);
}

#[tokio::test]
async fn invalid_update_is_a_bad_request_and_changes_nothing() {
    let app = spawn_app().await;
    let token = app.admin_token();
    let id = app.create_participant(&token, ada()).await;
    let uri = format!("/v2/participants/{}", id);

    let response = app
        .put(
            &uri,
            &token,
            json!({ "participants": {
                "emails": [{ "email": "broken" }],
                "phones": [
                    { "number": "555-000-0001", "primary": true },
                    { "number": "555-000-0002", "primary": true }
                ]
            } }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errors"].as_array().unwrap().len(), 2);

    let after = app.get(&uri, &token).await;
    assert_eq!(after.body["participants"]["emails"], json!([{ "email": "ada@example.com" }]));
}

#[tokio::test]
async fn delete_cascades_and_is_not_repeatable() {
    let app = spawn_app().await;
    let project = app.project("alpha").await;
    let token = app.token(Some(project.id));
    let id = app.create_participant(&token, ada()).await;
    let uri = format!("/v2/participants/{}", id);

    let response = app.delete(&uri, &token).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_null());

    assert_eq!(app.get(&uri, &token).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri, &token).await.status, StatusCode::NOT_FOUND);

    for table in ["emails", "phones", "addresses", "names", "date_of_births", "project_participants"] {
        assert_eq!(app.count(table).await, 0, "{}", table);
    }
}

#[tokio::test]
async fn create_for_missing_project_is_rejected_and_rolled_back() {
    let app = spawn_app().await;
    let token = app.token(Some(9_999));

    let response = app
        .post("/v2/participants", &token, json!({ "participants": ada() }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errors"][0]["code"], json!("rejected"));

    assert_eq!(app.count("participants").await, 0);
    assert_eq!(app.count("emails").await, 0);
}

#[tokio::test]
async fn participant_alias_and_malformed_bodies() {
    let app = spawn_app().await;
    let token = app.admin_token();

    let response = app
        .post(
            "/v2/participants",
            &token,
            json!({ "participant": { "emails": [{ "email": "alias@example.com" }] } }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        response.body["participants"]["emails"],
        json!([{ "email": "alias@example.com" }])
    );

    let response = app
        .post("/v2/participants", &token, json!({ "participants": { "emails": "nope" } }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errors"][0]["code"], json!("malformed_body"));
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let app = spawn_app().await;

    let response = app.request(Method::GET, "/v2/participants", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["errors"][0]["code"], json!("unauthorized"));

    let response = app.get("/v2/participants", "not-a-token").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::POST, "/v2/participants", None, Some(json!({})))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.count("participants").await, 0);
}

#[tokio::test]
async fn health_reports_database() {
    let app = spawn_app().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], json!("ok"));
}

#[tokio::test]
async fn listing_covers_more_participants_than_one_statement_can_bind() {
    let app = spawn_app().await;
    let token = app.admin_token();

    sqlx::query(
        "INSERT INTO participants (external_id, created_at, updated_at)
         WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 40000)
         SELECT 'seeded-' || n, '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00' FROM seq",
    )
    .execute(&app.state.pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO emails (participant_id, email, created_at, updated_at)
         VALUES (40000, 'last@example.com', '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
    )
    .execute(&app.state.pool)
    .await
    .unwrap();

    let response = app.get("/v2/participants", &token).await;
    assert_eq!(response.status, StatusCode::OK);

    let listed = response.body["participants"].as_array().unwrap();
    assert_eq!(listed.len(), 40000);
    assert_eq!(listed[39999]["id"], json!("seeded-40000"));
    assert_eq!(listed[39999]["emails"][0]["email"], json!("last@example.com"));
    assert_eq!(listed[0]["emails"], json!([]));
}

#[tokio::test]
async fn not_found_errors_name_the_external_id() {
    let app = spawn_app().await;
    let project = app.project("alpha").await;
    let scoped = app.token(Some(project.id));
    let admin = app.admin_token();
    let outside = app.create_participant(&admin, json!({})).await;

    let response = app.delete(&format!("/v2/participants/{}", outside), &scoped).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let message = response.body["errors"][0]["message"].as_str().unwrap();
    assert!(message.contains(&outside), "{}", message);
    assert_eq!(app.count("participants").await, 1);
}
