use crate::error::AppError;
use crate::state::AppState;
use crate::todos::persistence::{create_todo, delete_todo, get_todo, list_todos, update_todo};
use crate::todos::types::{parse_todo_id, Todo, TodoCreateArgs, TodoUpdateArgs};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Todo>>, AppError> {
    Ok(Json(list_todos(&state.db_pool).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TodoCreateArgs>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), AppError> {
    let new_todo = json_body(payload)?.normalize()?;
    let todo = create_todo(&state.db_pool, new_todo).await?;
    tracing::debug!(id = todo.id, "todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Todo>, AppError> {
    let id = parse_todo_id(&raw_id)?;
    Ok(Json(get_todo(&state.db_pool, id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    payload: Result<Json<TodoUpdateArgs>, JsonRejection>,
) -> Result<Json<Todo>, AppError> {
    let id = parse_todo_id(&raw_id)?;
    let patch = json_body(payload)?.normalize()?;
    Ok(Json(update_todo(&state.db_pool, id, patch).await?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_todo_id(&raw_id)?;
    let removed = delete_todo(&state.db_pool, id).await?;
    tracing::debug!(id, removed, "todo delete");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{body_json, empty_request, json_request, send, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn create_list_update_delete_flow() {
        let state = test_state().await;

        let created = send(&state, json_request("POST", "/todos", json!({"title": "  ship it "}))).await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let todo = body_json(created).await;
        assert_eq!(todo["title"], "ship it");
        assert_eq!(todo["completed"], false);
        let id = todo["id"].as_i64().expect("id is numeric");

        let listed = body_json(send(&state, empty_request("GET", "/todos")).await).await;
        assert_eq!(listed, json!([todo]));

        let patched = send(
            &state,
            json_request("PATCH", &format!("/todos/{id}"), json!({"completed": true})),
        )
        .await;
        assert_eq!(patched.status(), StatusCode::OK);
        assert_eq!(body_json(patched).await["completed"], true);

        let deleted = send(&state, empty_request("DELETE", &format!("/todos/{id}"))).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let again = send(&state, empty_request("DELETE", &format!("/todos/{id}"))).await;
        assert_eq!(again.status(), StatusCode::NO_CONTENT);

        let missing = send(&state, empty_request("GET", &format!("/todos/{id}"))).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(missing).await, json!({"error": "not found"}));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let state = test_state().await;
        for title in ["one", "two", "three"] {
            send(&state, json_request("POST", "/todos", json!({"title": title}))).await;
        }

        let listed = body_json(send(&state, empty_request("GET", "/todos")).await).await;
        let titles: Vec<&str> = listed
            .as_array()
            .expect("list is an array")
            .iter()
            .filter_map(|todo| todo["title"].as_str())
            .collect();
        assert_eq!(titles, vec!["three", "two", "one"]);
    }

    #[tokio::test]
    async fn create_requires_title() {
        let state = test_state().await;

        for body in [json!({}), json!({"title": "   "})] {
            let response = send(&state, json_request("POST", "/todos", body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await, json!({"error": "title required"}));
        }
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let state = test_state().await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/todos")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .expect("request should build");

        let response = send(&state, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn update_validates_id_body_and_existence() {
        let state = test_state().await;

        let invalid_id = send(&state, json_request("PATCH", "/todos/abc", json!({"completed": true}))).await;
        assert_eq!(invalid_id.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(invalid_id).await, json!({"error": "invalid id"}));

        let empty_patch = send(&state, json_request("PATCH", "/todos/1", json!({}))).await;
        assert_eq!(empty_patch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(empty_patch).await,
            json!({"error": "provide at least one of: title, completed"})
        );

        let missing = send(&state, json_request("PATCH", "/todos/404", json!({"title": "x"}))).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_rejects_invalid_id() {
        let state = test_state().await;
        let response = send(&state, empty_request("DELETE", "/todos/-1")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "invalid id"}));
    }
}
