use crate::error::AppError;
use crate::todos::types::{NewTodo, Todo, TodoPatch, NOT_FOUND};
use sqlx::{Row, SqlitePool};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis().min(i64::MAX as u128) as i64,
        Err(_) => 0,
    }
}

fn map_todo_row(row: &sqlx::sqlite::SqliteRow) -> Result<Todo, AppError> {
    let completed: i64 = row.try_get("completed")?;

    Ok(Todo {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        completed: completed != 0,
    })
}

pub async fn list_todos(pool: &SqlitePool) -> Result<Vec<Todo>, AppError> {
    let rows = sqlx::query("SELECT id, title, completed FROM todos ORDER BY id DESC")
        .fetch_all(pool)
        .await?;

    let mut todos = Vec::with_capacity(rows.len());
    for row in rows {
        todos.push(map_todo_row(&row)?);
    }

    Ok(todos)
}

pub async fn find_todo(pool: &SqlitePool, id: i64) -> Result<Option<Todo>, AppError> {
    let row = sqlx::query("SELECT id, title, completed FROM todos WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(map_todo_row).transpose()
}

pub async fn get_todo(pool: &SqlitePool, id: i64) -> Result<Todo, AppError> {
    find_todo(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))
}

pub async fn create_todo(pool: &SqlitePool, todo: NewTodo) -> Result<Todo, AppError> {
    let now_ms = now_unix_ms();
    let row = sqlx::query(
        "INSERT INTO todos (title, completed, created_at_ms, updated_at_ms) VALUES (?, 0, ?, ?) \
         RETURNING id, title, completed",
    )
    .bind(todo.title)
    .bind(now_ms)
    .bind(now_ms)
    .fetch_one(pool)
    .await?;

    map_todo_row(&row)
}

pub async fn update_todo(pool: &SqlitePool, id: i64, patch: TodoPatch) -> Result<Todo, AppError> {
    let completed = patch.completed.map(i64::from);
    let row = sqlx::query(
        "UPDATE todos SET \
           title = COALESCE(?, title), \
           completed = COALESCE(?, completed), \
           updated_at_ms = ? \
         WHERE id = ? \
         RETURNING id, title, completed",
    )
    .bind(patch.title)
    .bind(completed)
    .bind(now_unix_ms())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => map_todo_row(&row),
        None => Err(AppError::NotFound(NOT_FOUND.to_string())),
    }
}

/// Returns whether a row was removed; deleting a missing id is not an error.
pub async fn delete_todo(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM todos WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
