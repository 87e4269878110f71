//! Member directory endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use teamhub_core::{Member, MemberFilter, MemberProfile, MemberProps};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/members", get(list_members).post(sync_member))
        .route("/members/{id}", get(get_member).patch(update_member_props))
}

#[derive(Deserialize)]
pub struct MembersQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

/// GET /members
async fn list_members(
    State(state): State<AppState>,
    Query(query): Query<MembersQuery>,
) -> Result<Json<Vec<Member>>, AppError> {
    let filter = MemberFilter {
        include_deleted: query.include_deleted,
    };
    let members = state.run(move |hub| hub.list_members(&filter)).await?;
    Ok(Json(members))
}

/// GET /members/:id
async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Member>, AppError> {
    let member = state.run(move |hub| hub.get_member(&id)).await?;
    Ok(Json(member))
}

/// POST /members - Upsert a profile from the chat directory
async fn sync_member(
    State(state): State<AppState>,
    Json(profile): Json<MemberProfile>,
) -> Result<Json<Member>, AppError> {
    let member = state.run(move |hub| hub.sync_member(profile)).await?;
    Ok(Json(member))
}

/// PATCH /members/:id - Set status and/or number
async fn update_member_props(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(props): Json<MemberProps>,
) -> Result<Json<Member>, AppError> {
    let member = state
        .run(move |hub| hub.update_member_props(&id, props))
        .await?;
    Ok(Json(member))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::tests::{call, test_app};

    #[tokio::test]
    async fn test_sync_is_visible_immediately() {
        let app = test_app();
        call(&app, Method::POST, "/members", Some(json!({"id": "U1", "display_name": "Taro"}))).await;
        let (_, member) = call(&app, Method::GET, "/members/U1", None).await;
        assert_eq!(member["display_name"], "Taro");

        call(
            &app,
            Method::POST,
            "/members",
            Some(json!({"id": "U1", "display_name": "Taro Y", "deleted": true})),
        )
        .await;
        let (_, member) = call(&app, Method::GET, "/members/U1", None).await;
        assert_eq!(member["display_name"], "Taro Y");

        let (_, listed) = call(&app, Method::GET, "/members", None).await;
        assert!(listed.as_array().unwrap().is_empty());
        let (_, listed) = call(&app, Method::GET, "/members?include_deleted=true", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resync_keeps_status_and_number() {
        let app = test_app();
        call(&app, Method::POST, "/members", Some(json!({"id": "U1", "display_name": "Taro"}))).await;
        let (status, member) = call(
            &app,
            Method::PATCH,
            "/members/U1",
            Some(json!({"status": "inactive", "number": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(member["status"], "inactive");

        let (_, member) = call(
            &app,
            Method::POST,
            "/members",
            Some(json!({"id": "U1", "display_name": "Taro Y", "role_title": "QB"})),
        )
        .await;
        assert_eq!(member["display_name"], "Taro Y");
        assert_eq!(member["status"], "inactive");
        assert_eq!(member["number"], 0);

        let (status, body) = call(&app, Method::PATCH, "/members/U9", Some(json!({"number": 3}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
}
