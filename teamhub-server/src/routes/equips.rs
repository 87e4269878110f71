//! Equipment and custody endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::Utc;
use serde::Deserialize;

use teamhub_core::{CustodyRecord, Equipment, TrackedEquipment};

use crate::routes::{AppError, millis};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/equips", get(list_equips).post(save_equip))
        .route("/equips/custody", post(report_custody))
        .route("/equips/{id}", get(get_equip).delete(delete_equip))
        .route("/equips/{id}/custody/{record_id}", delete(revoke_custody))
}

/// GET /equips - Every item with its latest custody record
async fn list_equips(State(state): State<AppState>) -> Result<Json<Vec<TrackedEquipment>>, AppError> {
    let items = state.run(|hub| hub.list_equipment()).await?;
    Ok(Json(items))
}

/// POST /equips - Create (id 0 or missing) or update an item
async fn save_equip(
    State(state): State<AppState>,
    Json(item): Json<Equipment>,
) -> Result<Json<Equipment>, AppError> {
    let item = state
        .run(move |hub| {
            if item.id == 0 {
                hub.store().create_equipment(item)
            } else {
                hub.store().update_equipment(item)
            }
        })
        .await?;
    Ok(Json(item))
}

/// GET /equips/:id - One item with its full custody history
async fn get_equip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TrackedEquipment>, AppError> {
    let item = state.run(move |hub| hub.get_equipment(id)).await?;
    Ok(Json(item))
}

/// DELETE /equips/:id - Remove an item and its custody history
async fn delete_equip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Equipment>, AppError> {
    let removed = state.run(move |hub| hub.store().delete_equipment(id)).await?;
    Ok(Json(removed))
}

/// Request body for a custody report
#[derive(Deserialize)]
pub struct CustodyReport {
    pub ids: Vec<i64>,
    pub member_id: String,
    /// Epoch milliseconds; defaults to now
    pub ts: Option<i64>,
    #[serde(default)]
    pub comment: String,
}

/// POST /equips/custody - Record one hand-off for several items
async fn report_custody(
    State(state): State<AppState>,
    Json(report): Json<CustodyReport>,
) -> Result<(StatusCode, Json<Vec<CustodyRecord>>), AppError> {
    let timestamp = millis(report.ts, "ts")?.unwrap_or_else(Utc::now);
    let records = state
        .run(move |hub| {
            hub.report_custody(&report.ids, &report.member_id, timestamp, &report.comment)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(records)))
}

/// DELETE /equips/:id/custody/:record_id - Revoke one custody record
async fn revoke_custody(
    State(state): State<AppState>,
    Path((id, record_id)): Path<(i64, i64)>,
) -> Result<Json<CustodyRecord>, AppError> {
    let record = state
        .run(move |hub| hub.revoke_custody(id, record_id))
        .await?;
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::tests::{call, test_app};

    #[tokio::test]
    async fn test_custody_lifecycle() {
        let app = test_app();
        let (_, bag) = call(
            &app,
            Method::POST,
            "/equips",
            Some(json!({"name": "Ball bag", "for_practice": true})),
        )
        .await;
        let id = bag["id"].as_i64().unwrap();
        assert!(id > 0);

        let (status, records) = call(
            &app,
            Method::POST,
            "/equips/custody",
            Some(json!({"ids": [id], "member_id": "U1", "ts": 1_700_000_000_000_i64})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let record_id = records[0]["id"].as_i64().unwrap();

        let (_, item) = call(&app, Method::GET, &format!("/equips/{id}"), None).await;
        assert_eq!(item["name"], "Ball bag");
        assert_eq!(item["history"][0]["member_id"], "U1");
        assert_eq!(item["history"][0]["ts"], 1_700_000_000_000_i64);

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/equips/{id}/custody/{record_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/equips/{id}/custody/{record_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::DELETE, &format!("/equips/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, list) = call(&app, Method::GET, "/equips", None).await;
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_for_unknown_item_is_404() {
        let app = test_app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/equips/custody",
            Some(json!({"ids": [5], "member_id": "U1"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
}
