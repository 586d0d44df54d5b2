//! services/coach_api/tests/rest_api.rs
//!
//! Drives the router end to end with scripted ports.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chrono::{FixedOffset, NaiveDate};
use coach_api_lib::{
    config::Config,
    planner::PlanService,
    web::{router, state::AppState},
};
use run_coach_core::{
    domain::ReportedWorkout,
    ports::{
        PlanCompletionService, PortError, PortResult, WorkoutExtractionService,
    },
    request::{CompletionRequest, CompletionResponse},
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

struct UnreachableCompletion;

#[async_trait]
impl PlanCompletionService for UnreachableCompletion {
    async fn complete_plan(&self, _request: &CompletionRequest) -> PortResult<CompletionResponse> {
        Err(PortError::Unexpected("connection refused".to_string()))
    }
}

struct FixedVision {
    workout: ReportedWorkout,
    delay: Duration,
}

#[async_trait]
impl WorkoutExtractionService for FixedVision {
    async fn extract_workout(&self, image: &[u8], _content_type: &str) -> PortResult<ReportedWorkout> {
        tokio::time::sleep(self.delay).await;
        if image.is_empty() {
            return Err(PortError::Malformed("empty image".to_string()));
        }
        Ok(self.workout.clone())
    }
}

fn app(workout: ReportedWorkout) -> Router {
    app_with_vision(FixedVision {
        workout,
        delay: Duration::ZERO,
    })
}

fn app_with_vision(vision: FixedVision) -> Router {
    let mut config = Config::from_vars(|_| None).unwrap();
    config.completion_timeout = Duration::from_millis(50);
    let config = Arc::new(config);
    let planner = Arc::new(PlanService::new(
        Arc::new(UnreachableCompletion),
        Duration::from_secs(1),
        FixedOffset::east_opt(0).unwrap(),
    ));
    router(Arc::new(AppState {
        config,
        planner,
        vision_adapter: Arc::new(vision),
    }))
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    (status, value)
}

async fn starter_plan(app: &Router) -> Value {
    let (status, body) = post_json(
        app,
        "/plans",
        json!({"profile": {
            "age": "34",
            "goal_distance": "10 km",
            "preferred_training_days": "Monday, Wednesday, Friday",
            "training_days_per_week": 3
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn unreachable_completion_serves_the_starter_plan() {
    let app = app(ReportedWorkout::default());
    let body = starter_plan(&app).await;

    assert_eq!(body["source"], "fallback");
    assert_eq!(body["plan"]["name"], "Starter plan");
    let sessions = body["plan"]["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[0]["ordinal"], 1);
    assert_eq!(sessions[2]["type"], "Long run");
    assert_eq!(body["profile"]["age"], 34);
}

#[tokio::test]
async fn on_target_outcome_keeps_the_plan() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();

    let (status, body) = post_json(
        &app,
        "/plans/outcomes",
        json!({
            "plan": plan,
            "report": {"ordinal": 1, "status": "completed", "actual_distance_km": 5.0}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reconciliation"]["action"]["action"], "keep_plan");
    assert_eq!(body["reconciliation"]["progress"]["completed"], 1);
    assert!(body.get("revised_plan").is_none());
    let next: Vec<_> = body["next_sessions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["ordinal"].as_u64().unwrap())
        .collect();
    assert_eq!(next, vec![2, 3]);
}

#[tokio::test]
async fn large_deviation_without_completion_keeps_the_sessions() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();

    let (status, body) = post_json(
        &app,
        "/plans/outcomes",
        json!({
            "plan": plan,
            "report": {"ordinal": 1, "status": "completed", "actual_distance_km": 3.0}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reconciliation"]["action"]["action"], "adjust_remaining");
    assert_eq!(body["reconciliation"]["assessment"]["needs_adjustment"], true);
    assert_eq!(body["revised_source"], "fallback");
    assert_eq!(body["revised_plan"]["sessions"], plan["sessions"]);
}

#[tokio::test]
async fn unknown_session_is_rejected() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();

    let (status, body) = post_json(
        &app,
        "/plans/outcomes",
        json!({"plan": plan, "report": {"ordinal": 9, "status": "canceled"}}),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.as_str().unwrap().contains('9'));
}

#[tokio::test]
async fn ledger_with_foreign_or_unknown_sessions_is_rejected() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();
    let report = json!({"ordinal": 1, "status": "completed", "actual_distance_km": 5.0});

    let ledgers = [
        json!([{"plan_id": "6f1c2a8e-7a44-4b53-9d8e-1f2a3b4c5d6e", "ordinal": 1, "status": "completed", "actual_distance_km": 30.0}]),
        json!([{"plan_id": plan["id"], "ordinal": 9, "status": "completed", "actual_distance_km": 40.0}]),
        json!([{"plan_id": plan["id"], "ordinal": 2, "status": "completed"}]),
    ];
    for ledger in ledgers {
        let (status, _) = post_json(
            &app,
            "/plans/outcomes",
            json!({"plan": plan, "ledger": ledger, "report": report}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "ledger {ledger} was accepted");

        let (status, _) = post_json(
            &app,
            "/plans/continue",
            json!({"plan": plan, "ledger": ledger}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn exhaustion_summary_counts_only_recorded_plan_sessions() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();

    let (status, body) = post_json(
        &app,
        "/plans/outcomes",
        json!({
            "plan": plan,
            "ledger": [
                {"plan_id": plan["id"], "ordinal": 1, "status": "completed", "actual_distance_km": 5.0},
                {"plan_id": plan["id"], "ordinal": 2, "status": "canceled"}
            ],
            "report": {"ordinal": 3, "status": "completed", "actual_distance_km": 10.0}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let summary = &body["reconciliation"]["exhausted"];
    assert_eq!(summary["completed_sessions"], 2);
    assert_eq!(summary["canceled_sessions"], 1);
    assert_eq!(summary["completed_distance_km"], 15.0);
}

#[tokio::test]
async fn canceling_every_session_exhausts_the_plan() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();

    let mut ledger = json!([]);
    for ordinal in 1..=3 {
        let (status, body) = post_json(
            &app,
            "/plans/outcomes",
            json!({
                "plan": plan,
                "ledger": ledger,
                "report": {"ordinal": ordinal, "status": "canceled"}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        ledger = body["reconciliation"]["ledger"].clone();
        if ordinal == 3 {
            assert_eq!(body["reconciliation"]["action"]["action"], "keep_plan");
            assert_eq!(body["reconciliation"]["exhausted"]["canceled_sessions"], 3);
            assert!(body["next_sessions"].as_array().unwrap().is_empty());
        }
    }

    let (status, body) = post_json(
        &app,
        "/plans/continue",
        json!({"plan": plan, "ledger": ledger}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(body["plan"]["id"], plan["id"]);
}

#[tokio::test]
async fn reported_workout_matches_the_session_on_its_date() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();
    let second = &plan["sessions"][1];

    let (status, body) = post_json(
        &app,
        "/plans/match",
        json!({
            "plan": plan,
            "workout": {"date": second["date"], "distance": 7.0, "type": "Tempo run"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"]["ordinal"], 2);
    assert_eq!(body["matched"]["automatic"], true);
    assert_eq!(body["matched"]["session"]["type"], "Tempo run");
}

#[tokio::test]
async fn cycling_workout_cannot_be_matched() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();

    let (status, _) = post_json(
        &app,
        "/plans/match",
        json!({"plan": plan, "workout": {"distance": 30, "type": "Cycling"}}),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn markdown_rendering_marks_recorded_sessions() {
    let app = app(ReportedWorkout::default());
    let plan = starter_plan(&app).await["plan"].clone();
    let plan_id = plan["id"].clone();

    let (status, body) = post_json(
        &app,
        "/plans/render",
        json!({
            "plan": plan,
            "ledger": [{"plan_id": plan_id, "ordinal": 1, "status": "completed", "actual_distance_km": 5.0}],
            "format": "markdown"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("Starter plan"));
    assert!(text.contains('✅'));
    assert!(text.contains('⏳'));
}

#[tokio::test]
async fn screenshot_is_extracted_and_matched() {
    let workout = ReportedWorkout {
        date: None,
        distance_km: Some(10.2),
        workout_type: Some("Outdoor run".to_string()),
        source: Some("Strava".to_string()),
        ..ReportedWorkout::default()
    };
    let app = app(workout);
    let plan = starter_plan(&app).await["plan"].clone();

    let boundary = "coach-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"run.png\"\r\n\
         Content-Type: image/png\r\n\r\nPNGDATA\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"plan\"\r\n\r\n{plan}\r\n\
         --{b}--\r\n",
        b = boundary,
        plan = plan
    );
    let request = Request::builder()
        .method("POST")
        .uri("/workouts/screenshot")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["workout"]["source"], "Strava");
    assert_eq!(body["matched"]["ordinal"], 3);
}

#[tokio::test]
async fn stalled_vision_service_times_out() {
    let app = app_with_vision(FixedVision {
        workout: ReportedWorkout::default(),
        delay: Duration::from_secs(5),
    });
    let boundary = "coach-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"run.png\"\r\n\
         Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/workouts/screenshot")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn screenshot_without_image_is_a_bad_request() {
    let app = app(ReportedWorkout::default());
    let boundary = "coach-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"ledger\"\r\n\r\n[]\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/workouts/screenshot")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn session_dates_use_day_first_format() {
    let date = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
    assert_eq!(date.format(run_coach_core::domain::DATE_FORMAT).to_string(), "21.10.2026");
}
