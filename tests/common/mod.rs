#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use prim_engine::api;
use prim_engine::auth::JwtKeys;
use prim_engine::db_migration::{connect_pool, initialize_database};
use prim_engine::domains::project::{NewProject, Project};
use prim_engine::{AppState, Config};
use serde_json::Value;
use std::collections::HashMap;
use tower::ServiceExt;

pub const SALT: &str = "this is my salt";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub keys: JwtKeys,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub async fn spawn_app() -> TestApp {
    let vars: HashMap<String, String> = [
        ("PRIM_ENGINE_HASHID_SALT", SALT),
        ("PRIM_ENGINE_HASHID_MIN_LENGTH", "8"),
        ("PRIM_ENGINE_JWT_SECRET", "integration-secret"),
        ("PRIM_ENGINE_DATABASE_URL", "sqlite::memory:"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let config = Config::from_vars(&vars).unwrap();

    let pool = connect_pool(&config.database_url, 1).await.unwrap();
    initialize_database(&pool).await.unwrap();

    let keys = JwtKeys::new(&config.jwt_secret).unwrap();
    let state = AppState::new(config, pool).unwrap();
    let app = api::router(state.clone());

    TestApp { app, state, keys }
}

impl TestApp {
    /// Token with no project binding
    pub fn admin_token(&self) -> String {
        self.token(None)
    }

    pub fn token(&self, project_id: Option<i64>) -> String {
        self.keys
            .generate_token("integration", project_id, Duration::minutes(10))
            .unwrap()
            .0
    }

    pub async fn project(&self, name: &str) -> Project {
        self.state
            .projects
            .create(&NewProject { name: name.to_string() })
            .await
            .unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Create through v2 and return the external id
    pub async fn create_participant(&self, token: &str, attributes: Value) -> String {
        let response = self
            .post("/v2/participants", token, serde_json::json!({ "participants": attributes }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["participants"]["id"].as_str().unwrap().to_string()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.state.pool)
            .await
            .unwrap()
    }
}

/// External ids of a v2 listing, in response order
pub fn listed_ids(body: &Value) -> Vec<String> {
    body["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}
