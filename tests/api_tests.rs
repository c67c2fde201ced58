//! API integration tests
//!
//! The in-process tests drive the router over the in-memory lending store.
//! The `live_` tests expect a running server or a `DATABASE_URL`: `cargo test -- --ignored`

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use libris_server::{
    api,
    config::AppConfig,
    models::{
        permission::{default_rules, PermissionTable},
        user::{Role, UserClaims},
    },
    repository::memory::MemoryLendingStore,
    services::{audit::MemoryAuditSink, Services},
    AppState,
};

const PRIVATE: &str = "/api/v1/private";

struct TestApp {
    router: Router,
    secret: String,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::default();
        let secret = config.auth.jwt_secret.clone();
        let services = Services::new(
            Arc::new(MemoryLendingStore::with_catalog([1, 2])),
            Arc::new(MemoryAuditSink::new()),
            PermissionTable::from_rules(default_rules()),
        );
        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        };

        Self {
            router: api::router(state),
            secret,
        }
    }

    fn token(&self, user_id: i64, role: &str) -> String {
        UserClaims::new(user_id, Role::from(role), 1)
            .create_token(&self.secret)
            .expect("Failed to sign token")
    }

    async fn call(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Create an instance of `book_id` as a manager and return its id
    async fn create_instance(&self, book_id: i32) -> i64 {
        let manager = self.token(100, "MANAGER");
        let (status, body) = self
            .call(
                Method::POST,
                &format!("{}/book/{}/instance", PRIVATE, book_id),
                Some(&manager),
                Some(json!({ "language": "fr" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["book_instance"]["id"].as_i64().expect("No instance id")
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_private_route_requires_token() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, &format!("{}/borrow", PRIVATE), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);

    let (status, _) = app
        .call(Method::GET, &format!("{}/borrow", PRIVATE), Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_student_denied_admin_and_manager_routes() {
    let app = TestApp::new();
    let student = app.token(1, "STUDENT");

    let (status, body) = app
        .call(Method::GET, &format!("{}/system-logs", PRIVATE), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You are not authorized to do that");

    let (status, _) = app
        .call(Method::DELETE, &format!("{}/book/1/instance/1", PRIVATE), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::POST, &format!("{}/return/1", PRIVATE), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unrecognized_role_is_denied() {
    let app = TestApp::new();
    let janitor = app.token(5, "JANITOR");

    let (status, _) = app
        .call(Method::GET, &format!("{}/borrow", PRIVATE), Some(&janitor), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_checkout_then_checkout_again_conflicts() {
    let app = TestApp::new();
    let unit_id = app.create_instance(1).await;
    let alice = app.token(1, "STUDENT");
    let bob = app.token(2, "TEACHER");

    let (status, body) = app
        .call(Method::POST, &format!("{}/borrow/{}", PRIVATE, unit_id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "SUCCESS");
    assert_eq!(body["entry"]["user_id"], 1);
    assert!(body["entry"]["return_date"].is_null());

    let (status, body) = app
        .call(Method::POST, &format!("{}/borrow/{}", PRIVATE, unit_id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 7);

    let manager = app.token(100, "MANAGER");
    let (_, body) = app
        .call(Method::GET, &format!("{}/book/1/instance/{}", PRIVATE, unit_id), Some(&manager), None)
        .await;
    assert_eq!(body["book_instance"]["status"], "RESERVED");
}

#[tokio::test]
async fn test_return_then_return_again_conflicts() {
    let app = TestApp::new();
    let unit_id = app.create_instance(2).await;
    let alice = app.token(1, "STUDENT");
    let manager = app.token(100, "MANAGER");

    app.call(Method::POST, &format!("{}/borrow/{}", PRIVATE, unit_id), Some(&alice), None)
        .await;

    let (status, body) = app
        .call(Method::POST, &format!("{}/return/{}", PRIVATE, unit_id), Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "returned");
    assert_eq!(body["entry"]["user_id"], 1);
    assert!(body["entry"]["return_date"].is_string());

    let (status, body) = app
        .call(Method::POST, &format!("{}/return/{}", PRIVATE, unit_id), Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 8);

    let (_, body) = app
        .call(Method::GET, &format!("{}/book/2/instance/{}", PRIVATE, unit_id), Some(&manager), None)
        .await;
    assert_eq!(body["book_instance"]["status"], "AVAILABLE");
}

#[tokio::test]
async fn test_unknown_unit_is_not_found() {
    let app = TestApp::new();
    let alice = app.token(1, "STUDENT");
    let manager = app.token(100, "MANAGER");

    let (status, body) = app
        .call(Method::POST, &format!("{}/borrow/999", PRIVATE), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4);

    let (status, _) = app
        .call(Method::POST, &format!("{}/return/999", PRIVATE), Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_instance_lifecycle() {
    let app = TestApp::new();
    let manager = app.token(100, "MANAGER");
    let alice = app.token(1, "STUDENT");

    let (status, body) = app
        .call(
            Method::POST,
            &format!("{}/book/42/instance", PRIVATE),
            Some(&manager),
            Some(json!({ "language": "en" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5);

    let unit_id = app.create_instance(1).await;
    let path = format!("{}/book/1/instance/{}", PRIVATE, unit_id);

    let (status, body) = app
        .call(Method::PATCH, &path, Some(&manager), Some(json!({ "language": "de" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book_instance"]["language"], "de");

    let (status, _) = app
        .call(Method::PATCH, &path, Some(&manager), Some(json!({ "language": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.call(Method::POST, &format!("{}/borrow/{}", PRIVATE, unit_id), Some(&alice), None)
        .await;
    let (status, _) = app.call(Method::DELETE, &path, Some(&manager), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.call(Method::POST, &format!("{}/return/{}", PRIVATE, unit_id), Some(&manager), None)
        .await;
    let (status, body) = app.call(Method::DELETE, &path, Some(&manager), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "SUCCESS");

    let (status, _) = app.call(Method::GET, &path, Some(&manager), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(Method::POST, &format!("{}/borrow/{}", PRIVATE, unit_id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_active_loans_and_history() {
    let app = TestApp::new();
    let first = app.create_instance(1).await;
    let second = app.create_instance(2).await;
    let alice = app.token(1, "STUDENT");
    let manager = app.token(100, "MANAGER");

    app.call(Method::POST, &format!("{}/borrow/{}", PRIVATE, first), Some(&alice), None)
        .await;
    app.call(Method::POST, &format!("{}/return/{}", PRIVATE, first), Some(&manager), None)
        .await;
    app.call(Method::POST, &format!("{}/borrow/{}", PRIVATE, second), Some(&alice), None)
        .await;

    let (status, body) = app
        .call(Method::GET, &format!("{}/borrow", PRIVATE), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let open = body.as_array().expect("Expected a list");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["unit_id"].as_i64(), Some(second));
    assert_eq!(open[0]["book_id"], 2);

    let (status, body) = app
        .call(Method::GET, &format!("{}/history", PRIVATE), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = body.as_array().expect("Expected a list");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["unit_id"].as_i64(), Some(first));
    assert_eq!(history[0]["is_open"], false);
    assert_eq!(history[1]["is_open"], true);

    let bob = app.token(2, "STUDENT");
    let (_, body) = app
        .call(Method::GET, &format!("{}/history", PRIVATE), Some(&bob), None)
        .await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_system_logs_record_lending_events() {
    let app = TestApp::new();
    let unit_id = app.create_instance(1).await;
    let alice = app.token(1, "STUDENT");
    let admin = app.token(200, "ADMIN");

    app.call(Method::POST, &format!("{}/borrow/{}", PRIVATE, unit_id), Some(&alice), None)
        .await;

    let (status, body) = app
        .call(Method::GET, &format!("{}/system-logs?limit=10", PRIVATE), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().expect("Expected a list");
    assert_eq!(entries[0]["type"], "BORROW");
    assert_eq!(entries[0]["action"], "CHECKOUT");
    assert_eq!(entries[0]["user_id"], 1);
    assert!(entries.iter().any(|e| e["type"] == "BOOK"));
}

mod live {
    use std::sync::Arc;

    use reqwest::Client;
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;

    use libris_server::{
        error::LendingError,
        models::lending_unit::{CreateLendingUnit, UnitStatus},
        repository::{LendingStore, Repository},
        services::{audit::MemoryAuditSink, lending::LendingService},
    };

    const BASE_URL: &str = "http://localhost:8080/api/v1";

    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn live_health_check() {
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
    async fn live_private_route_without_token() {
        let client = Client::new();

        let response = client
            .get(format!("{}/private/history", BASE_URL))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), 401);
    }

    /// Needs DATABASE_URL pointing at a disposable PostgreSQL database
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore]
    async fn live_postgres_concurrent_checkouts() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .expect("Failed to connect");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let book_id: i32 = sqlx::query_scalar("INSERT INTO book (title) VALUES ('Concurrency test') RETURNING id")
            .fetch_one(&pool)
            .await
            .expect("Failed to insert book");

        let repository = Repository::new(pool);
        let store: Arc<dyn LendingStore> = Arc::new(repository.units.clone());
        let service = LendingService::new(store.clone(), Arc::new(MemoryAuditSink::new()));

        let unit = store
            .create_unit(book_id, &CreateLendingUnit::default())
            .await
            .expect("Failed to create unit");

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.checkout(unit.id, 1).await }
        });
        let second = tokio::spawn({
            let service = service.clone();
            async move { service.checkout(unit.id, 2).await }
        });
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(LendingError::Unavailable(id)) if *id == unit.id))
                .count(),
            1
        );

        let stored = store.get_unit(unit.id).await.unwrap().expect("Unit missing");
        assert_eq!(stored.status, UnitStatus::Reserved);

        let closed = service.return_unit(unit.id).await.expect("Return failed");
        assert!(closed.return_date.is_some());
        assert!(matches!(
            service.return_unit(unit.id).await,
            Err(LendingError::NoOpenLoan(_))
        ));

        let issues = store.inconsistent_units().await.unwrap();
        assert!(issues.iter().all(|issue| issue.unit_id != unit.id));
    }
}
