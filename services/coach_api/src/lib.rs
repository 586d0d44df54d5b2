//! services/coach_api/src/lib.rs
//!
//! The HTTP surface of the running coach: configuration, the OpenAI-backed
//! adapters, plan orchestration and the Axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod planner;
pub mod web;
