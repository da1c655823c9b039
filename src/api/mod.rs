mod attendance;
mod audit;
pub mod auth;
mod bills;
pub mod error;
mod leaves;
pub mod metrics;
mod plans;
mod sessions;
mod validation;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Plans
        .route("/plans", get(plans::list_plans).post(plans::create_plan))
        .route(
            "/plans/:id",
            get(plans::get_plan)
                .put(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route("/plans/:id/sessions", get(plans::list_plan_sessions))
        .route("/generate-sessions", post(plans::generate_sessions))
        // Sessions
        .route(
            "/sessions/:id",
            get(sessions::get_session)
                .put(sessions::update_session)
                .delete(sessions::delete_session),
        )
        .route("/update-session/:id", put(sessions::update_session))
        // Leave
        .route("/leave", get(leaves::list_leaves).post(leaves::create_leave))
        .route("/leave/:id", get(leaves::get_leave).put(leaves::decide_leave))
        // Attendance
        .route("/attendance", get(attendance::list_attendance))
        .route("/attendance/clock-in", post(attendance::clock_in))
        .route("/attendance/clock-out", post(attendance::clock_out))
        .route("/attendance/:id", put(attendance::edit_attendance))
        .route(
            "/staff/:staff_id/attendance/:date",
            get(attendance::day_attendance),
        )
        // Bills
        .route("/bill", post(bills::create_bill))
        .route("/bills", get(bills::list_bills).post(bills::create_bill))
        .route("/bills/:id", get(bills::get_bill))
        .route("/bills/:id/status", put(bills::update_bill_status))
        // Audit
        .route("/audit-logs", get(audit::list_logs))
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api", api_routes)
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-actor-id"),
        ])
        .allow_origin(allow_origin)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::init_in_memory;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    async fn app() -> Router {
        let mut config = Config::default();
        config.auth.admin_token = TOKEN.to_string();
        let db = init_in_memory().await.unwrap();
        create_router(Arc::new(AppState::new(config, db)))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", TOKEN))
            .header("X-Actor-Id", "manager-1");
        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_plan(app: &Router, plan_type: &str) -> String {
        let (status, plan) = call(
            app,
            "POST",
            "/api/plans",
            Some(json!({
                "client_id": "client-1",
                "trainer_id": "trainer-1",
                "plan_type": plan_type,
                "start_date": "2024-01-01",
                "end_date": "2024-01-07",
                "start_time": "07:00:00",
                "duration_minutes": 60,
                "amount": 120
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        plan["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_is_public() {
        let mut config = Config::default();
        config.auth.admin_token = TOKEN.to_string();
        let db = init_in_memory().await.unwrap();
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let app = create_router(Arc::new(AppState::new(config, db).with_metrics(handle)));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/plans").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/plans")
                    .header("X-API-Key", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_generate_with_leave() {
        let app = app().await;
        let plan_id = create_plan(&app, "5_days").await;

        let (status, leave) = call(
            &app,
            "POST",
            "/api/leave",
            Some(json!({
                "staff_id": "trainer-1",
                "leave_type": "sick",
                "start_date": "2024-01-03",
                "end_date": "2024-01-03"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let leave_id = leave["id"].as_str().unwrap().to_string();

        let (status, decided) = call(
            &app,
            "PUT",
            &format!("/api/leave/{}", leave_id),
            Some(json!({ "status": "Approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decided["success"], true);
        assert_eq!(decided["leave"]["reviewed_by"], "manager-1");

        let (status, generated) = call(
            &app,
            "POST",
            "/api/generate-sessions",
            Some(json!({ "plan_id": plan_id, "start_time": "07:00:00", "duration_minutes": 60 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(generated["success"], true);
        assert_eq!(generated["created_count"], 4);
        assert_eq!(generated["skipped_dates"], json!(["2024-01-03"]));

        let (_, sessions) = call(&app, "GET", &format!("/api/plans/{}/sessions", plan_id), None).await;
        let dates: Vec<&str> = sessions
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["session_date"].as_str().unwrap())
            .collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-04", "2024-01-05"]);

        // A second decision on the same leave is refused
        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/leave/{}", leave_id),
            Some(json!({ "status": "Rejected" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "invalid_transition");

        let (_, logs) = call(&app, "GET", "/api/audit-logs?resource_type=plan", None).await;
        let actions: Vec<&str> = logs["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["action"].as_str().unwrap())
            .collect();
        assert!(actions.contains(&"sessions.generate"));
    }

    #[tokio::test]
    async fn test_generate_unknown_plan() {
        let app = app().await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/generate-sessions",
            Some(json!({ "plan_id": "missing" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "plan_not_found");
    }

    #[tokio::test]
    async fn test_invalid_plan_range() {
        let app = app().await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/plans",
            Some(json!({
                "client_id": "client-1",
                "trainer_id": "trainer-1",
                "plan_type": "3_days",
                "start_date": "2024-01-07",
                "end_date": "2024-01-01",
                "start_time": "07:00:00",
                "duration_minutes": 60
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_range");
    }

    #[tokio::test]
    async fn test_update_session_route() {
        let app = app().await;
        let plan_id = create_plan(&app, "3_days").await;
        call(&app, "POST", "/api/generate-sessions", Some(json!({ "plan_id": plan_id }))).await;

        let (_, sessions) = call(&app, "GET", &format!("/api/plans/{}/sessions", plan_id), None).await;
        let session_id = sessions[0]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/update-session/{}", session_id),
            Some(json!({ "status": "completed", "start_time": "08:00:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["session"]["status"], "completed");
        assert_eq!(body["session"]["end_time"], "09:00:00");
    }

    #[tokio::test]
    async fn test_bill_flow() {
        let app = app().await;
        let plan_id = create_plan(&app, "3_days").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/bill",
            Some(json!({ "plan_id": plan_id, "subtotal": "100.00", "tax": 7.5, "notes": "Jan" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["bill"]["total_amount"], 107.5);
        assert_eq!(body["bill"]["bill_status"], "Pending");
        let bill_id = body["bill"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            "/api/bills",
            Some(json!({ "plan_id": plan_id, "subtotal": 50 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "duplicate_bill");
        assert!(body["message"].is_string());

        let (status, body) = call(
            &app,
            "POST",
            "/api/bill",
            Some(json!({ "plan_id": plan_id, "subtotal": "lots" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_amount");

        let (status, _) = call(
            &app,
            "PUT",
            &format!("/api/bills/{}/status", bill_id),
            Some(json!({ "bill_status": "Paid" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, plan) = call(&app, "GET", &format!("/api/plans/{}", plan_id), None).await;
        assert_eq!(plan["payment_status"], "paid");

        // A billed plan stays put
        let (status, _) = call(&app, "DELETE", &format!("/api/plans/{}", plan_id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_attendance_day() {
        let app = app().await;

        let (status, body) = call(&app, "GET", "/api/staff/staff-1/attendance/2024-01-02", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "absent");

        call(
            &app,
            "POST",
            "/api/attendance/clock-in",
            Some(json!({ "staff_id": "staff-1", "date": "2024-01-02", "time": "09:00:00" })),
        )
        .await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/attendance/clock-out",
            Some(json!({ "staff_id": "staff-1", "date": "2024-01-02", "time": "13:00:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "half_day");
        assert_eq!(body["worked_minutes"], 240);

        let id = body["id"].as_str().unwrap().to_string();
        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/attendance/{}", id),
            Some(json!({ "clock_in": "08:00:00", "clock_out": "17:00:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "present");

        let (_, list) = call(&app, "GET", "/api/attendance?staff_id=staff-1", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["status"], "present");
    }
}
