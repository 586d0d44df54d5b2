//! services/coach_api/src/bin/api.rs

use async_openai::{config::OpenAIConfig, Client};
use axum::http::{header::CONTENT_TYPE, Method};
use coach_api_lib::{
    adapters::{OpenAiPlanAdapter, OpenAiWorkoutVisionAdapter},
    config::Config,
    error::ApiError,
    planner::PlanService,
    web::{router, state::AppState},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let mut openai_config = OpenAIConfig::new().with_api_key(config.require_api_key()?);
    if let Some(api_base) = &config.openai_api_base {
        openai_config = openai_config.with_api_base(api_base);
    }
    let openai_client = Client::with_config(openai_config);

    let plan_adapter = Arc::new(OpenAiPlanAdapter::new(
        openai_client.clone(),
        config.plan_model.clone(),
    ));
    let vision_adapter = Arc::new(OpenAiWorkoutVisionAdapter::new(
        openai_client,
        config.vision_model.clone(),
    ));
    info!(
        "Using {} for plans and {} for screenshots (timeout {:?}, timezone {})",
        config.plan_model, config.vision_model, config.completion_timeout, config.timezone
    );

    // --- 3. Build the Shared AppState ---
    let planner = Arc::new(PlanService::new(
        plan_adapter,
        config.completion_timeout,
        config.timezone,
    ));
    let app_state = Arc::new(AppState {
        config: config.clone(),
        planner,
        vision_adapter,
    });

    // --- 4. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);
    let app = router(app_state).layer(cors);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
