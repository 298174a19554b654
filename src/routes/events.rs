use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::db::{Event, EventInput, EventRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_event))
        .route("/:year/:month", get(list_events))
        .route(
            "/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
}

/// Create a new event. Reminders for it start disarmed.
async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(input): Json<EventInput>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let event = EventRepository::create(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// List all events in the given year/month.
async fn list_events(
    State(state): State<Arc<AppState>>,
    Path((year, month)): Path<(i32, u32)>,
) -> AppResult<Json<Vec<Event>>> {
    let events = EventRepository::list_by_period(&state.db, year, month).await?;
    Ok(Json(events))
}

/// Fetch a single event by id.
async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Event>> {
    match EventRepository::get(&state.db, id).await? {
        Some(event) => Ok(Json(event)),
        None => Err(AppError::NotFound(format!("Event {} not found", id))),
    }
}

/// Full replace of an event's mutable fields.
async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(input): Json<EventInput>,
) -> AppResult<Json<Event>> {
    let event = EventRepository::update(&state.db, id, &input).await?;
    Ok(Json(event))
}

/// Delete an event. Deleting an unknown id succeeds.
async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    EventRepository::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::services::hub::SessionHub;
    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let state = Arc::new(AppState {
            db: test_pool().await,
            config: Config::default(),
            hub: Arc::new(SessionHub::new()),
        });
        Router::new()
            .nest("/api/events", router())
            .with_state(state)
    }

    fn event_json(title: &str, month: u32) -> String {
        format!(
            r#"{{
                "title": "{title}",
                "year": 2026,
                "month": {month},
                "start_date": "2026-{month:02}-01T10:00:00",
                "end_date": "2026-{month:02}-01T11:00:00",
                "description": "desc",
                "participants": ["a", "b"]
            }}"#
        )
    }

    fn post_event(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/events")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_returns_created_event() {
        let app = test_app().await;

        let response = app.oneshot(post_event(event_json("Standup", 9))).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["title"], "Standup");
        assert_eq!(body["message_status"], false);
        assert!(body["id"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn list_returns_only_matching_period() {
        let app = test_app().await;

        for title in ["One", "Two", "Three"] {
            let response = app
                .clone()
                .oneshot(post_event(event_json(title, 9)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        app.clone()
            .oneshot(post_event(event_json("Elsewhere", 10)))
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/events/2026/9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let events = body.as_array().unwrap();
        assert_eq!(events.len(), 3);
        // Participants come back as a native list, not a serialized string.
        assert_eq!(events[0]["participants"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn list_with_month_13_is_a_validation_error() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/events/2026/13")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/events/999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/events/999")
                    .header("content-type", "application/json")
                    .body(Body::from(event_json("Ghost", 9)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_idempotent_over_http() {
        let app = test_app().await;

        let created = app
            .clone()
            .oneshot(post_event(event_json("Standup", 9)))
            .await
            .unwrap();
        let id = body_json(created).await["id"].as_i64().unwrap();

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("DELETE")
                        .uri(format!("/api/events/{}", id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
    }
}
