//! Scheduled job triggers
//!
//! Each endpoint answers 200 with `{"message": ...}` when there is nothing
//! to do (no matching event, or the event takes no reminders).

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::post,
};
use chrono::Utc;
use serde::Deserialize;

use teamhub_core::hub::{
    ConditioningCheck, FinalCall, ReportRequest, RsvpCheckOutcome, UnreportedOutcome,
};
use teamhub_core::{CustodySummary, EquipmentAllocation, TaskOutcome};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks/equips/remind-bring", post(remind_bring))
        .route("/tasks/equips/remind-report", post(remind_report))
        .route("/tasks/equips/scan-unreported", post(scan_unreported))
        .route("/tasks/equips/summary", post(custody_summary))
        .route("/tasks/rsvp/check", post(check_rsvp))
        .route("/tasks/final-call", post(final_call))
        .route("/tasks/conditioning", post(remind_conditioning))
}

/// POST /tasks/equips/remind-bring
async fn remind_bring(
    State(state): State<AppState>,
) -> Result<Json<TaskOutcome<EquipmentAllocation>>, AppError> {
    let outcome = state.run(|hub| hub.remind_bring(Utc::now())).await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct WindowQuery {
    pub from: String,
    pub to: String,
}

/// POST /tasks/equips/remind-report?from=HH:MM&to=HH:MM
async fn remind_report(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<TaskOutcome<ReportRequest>>, AppError> {
    let outcome = state
        .run(move |hub| hub.remind_report(Utc::now(), &query.from, &query.to))
        .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct ScanQuery {
    /// Offset in hours before now
    pub oh: i64,
    pub channel: Option<String>,
}

/// POST /tasks/equips/scan-unreported?oh=N&channel=C
async fn scan_unreported(
    State(state): State<AppState>,
    Query(query): Query<ScanQuery>,
) -> Result<Json<TaskOutcome<UnreportedOutcome>>, AppError> {
    let outcome = state
        .run(move |hub| hub.scan_unreported(Utc::now(), query.oh, query.channel.as_deref()))
        .await?;
    Ok(Json(outcome))
}

/// POST /tasks/equips/summary
async fn custody_summary(State(state): State<AppState>) -> Result<Json<CustodySummary>, AppError> {
    let summary = state.run(|hub| hub.custody_summary(Utc::now())).await?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
pub struct RsvpQuery {
    pub channel: Option<String>,
    /// Any non-empty value means dry run
    pub dry: Option<String>,
}

/// POST /tasks/rsvp/check?channel=C&dry=1
async fn check_rsvp(
    State(state): State<AppState>,
    Query(query): Query<RsvpQuery>,
) -> Result<Json<TaskOutcome<RsvpCheckOutcome>>, AppError> {
    let dry = query.dry.is_some_and(|d| !d.is_empty());
    let outcome = state
        .run(move |hub| hub.check_rsvp(Utc::now(), query.channel.as_deref(), dry))
        .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct FinalCallQuery {
    /// Comma-separated role patterns
    pub role: String,
    pub channel: Option<String>,
}

/// POST /tasks/final-call?role=a,b&channel=C
async fn final_call(
    State(state): State<AppState>,
    Query(query): Query<FinalCallQuery>,
) -> Result<Json<TaskOutcome<FinalCall>>, AppError> {
    let roles: Vec<String> = query
        .role
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect();
    let outcome = state
        .run(move |hub| hub.final_call(Utc::now(), &roles, query.channel.as_deref()))
        .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct ConditioningQuery {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub position: String,
    /// `before` or `after` the workout; passed through to the form
    #[serde(default)]
    pub label: String,
}

/// POST /tasks/conditioning?from=HH:MM&to=HH:MM&channel=C&position=P&label=L
async fn remind_conditioning(
    State(state): State<AppState>,
    Query(query): Query<ConditioningQuery>,
) -> Result<Json<TaskOutcome<ConditioningCheck>>, AppError> {
    let outcome = state
        .run(move |hub| {
            hub.remind_conditioning(
                Utc::now(),
                &query.from,
                &query.to,
                &query.channel,
                &query.position,
                &query.label,
            )
        })
        .await?;
    Ok(Json(outcome))
}
