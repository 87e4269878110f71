//! Event and RSVP endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use teamhub_core::Event;
use teamhub_core::hub::{AnswerOutcome, RsvpAnswer};

use crate::routes::{AppError, millis};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(sync_event))
        .route("/events/{id}", get(get_event).delete(delete_event))
        .route("/events/{id}/answer", post(answer_event))
}

/// Bounds in epoch milliseconds
#[derive(Deserialize)]
pub struct EventsQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

/// GET /events - Upcoming events, earliest first; or a window, latest first
async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let from = millis(query.from, "from")?;
    let to = millis(query.to, "to")?;
    let events = state
        .run(move |hub| hub.list_events(Utc::now(), from, to))
        .await?;
    Ok(Json(events))
}

/// POST /events - Create or replace an event from calendar sync
async fn sync_event(
    State(state): State<AppState>,
    Json(event): Json<Event>,
) -> Result<Json<Event>, AppError> {
    let event = state.run(move |hub| hub.sync_event(event)).await?;
    Ok(Json(event))
}

/// GET /events/:id
async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, AppError> {
    let event = state.run(move |hub| hub.get_event(&id)).await?;
    Ok(Json(event))
}

/// DELETE /events/:id
async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.run(move |hub| hub.delete_event(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for answering an event
#[derive(Deserialize)]
pub struct AnswerRequest {
    pub member_id: String,
    #[serde(flatten)]
    pub answer: RsvpAnswer,
}

/// POST /events/:id/answer - Record a member's answer
async fn answer_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<(StatusCode, Json<AnswerOutcome>), AppError> {
    let outcome = state
        .run(move |hub| hub.answer_event(&id, &req.member_id, req.answer, Utc::now()))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::routes::tests::{call, test_app};

    #[tokio::test]
    async fn test_answer_round_trip() {
        let app = test_app();
        let start = (Utc::now() + Duration::hours(5)).timestamp_millis();

        let (status, _) = call(
            &app,
            Method::POST,
            "/members",
            Some(json!({"id": "U1", "display_name": "Taro", "role_title": "QB"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::POST,
            "/events",
            Some(json!({"id": "p1", "title": "#練習", "start_time": start, "end_time": start + 3_600_000})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "p1");

        let (status, body) = call(
            &app,
            Method::POST,
            "/events/p1/answer",
            Some(json!({"member_id": "U1", "type": "join"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["announced"], false);

        let (status, body) = call(
            &app,
            Method::POST,
            "/events/p1/answer",
            Some(json!({"member_id": "U1", "type": "absent"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["announced"], true);

        let (_, body) = call(&app, Method::GET, "/events", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::DELETE, "/events/p1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, "/events/p1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_defaults_to_all_upcoming() {
        let app = test_app();
        let now = Utc::now();
        for (id, start) in [
            ("g1", now + Duration::days(3)),
            ("p1", now + Duration::hours(5)),
            ("old", now - Duration::days(1)),
        ] {
            let start = start.timestamp_millis();
            call(
                &app,
                Method::POST,
                "/events",
                Some(json!({"id": id, "title": "#練習", "start_time": start, "end_time": start + 3_600_000})),
            )
            .await;
        }

        let (status, body) = call(&app, Method::GET, "/events", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = body.as_array().unwrap().iter().map(|e| e["id"].clone()).collect();
        assert_eq!(ids, vec![json!("p1"), json!("g1")]);
    }

    #[tokio::test]
    async fn test_extreme_bounds_are_bad_requests() {
        let app = test_app();
        let min = chrono::DateTime::<Utc>::MIN_UTC.timestamp_millis();
        let (status, body) = call(&app, Method::GET, &format!("/events?to={min}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_time_range");
    }

    #[tokio::test]
    async fn test_reversed_window_is_rejected() {
        let app = test_app();
        let (status, body) = call(&app, Method::GET, "/events?from=2000&to=1000", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_time_range");
    }
}
