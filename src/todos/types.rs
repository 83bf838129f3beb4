use crate::error::AppError;
use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};

pub const TITLE_REQUIRED: &str = "title required";
pub const INVALID_ID: &str = "invalid id";
pub const NO_UPDATE_FIELDS: &str = "provide at least one of: title, completed";
pub const NOT_FOUND: &str = "not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoCreateArgs {
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
}

impl TodoCreateArgs {
    pub fn normalize(self) -> Result<NewTodo, AppError> {
        let title = normalize_title(self.title.as_deref())?;
        Ok(NewTodo { title })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoUpdateArgs {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl TodoUpdateArgs {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }

    pub fn normalize(self) -> Result<TodoPatch, AppError> {
        if self.is_empty() {
            return Err(AppError::InvalidArgument(NO_UPDATE_FIELDS.to_string()));
        }

        let title = match self.title {
            Some(raw) => Some(normalize_title(Some(&raw))?),
            None => None,
        };

        Ok(TodoPatch {
            title,
            completed: self.completed,
        })
    }
}

fn normalize_title(raw: Option<&str>) -> Result<String, AppError> {
    let title = raw.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(AppError::InvalidArgument(TITLE_REQUIRED.to_string()));
    }
    Ok(title.to_string())
}

pub fn validate_todo_id(id: i64) -> Result<i64, AppError> {
    if id <= 0 {
        return Err(AppError::InvalidArgument(INVALID_ID.to_string()));
    }
    Ok(id)
}

pub fn parse_todo_id(raw: &str) -> Result<i64, AppError> {
    let id = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::InvalidArgument(INVALID_ID.to_string()))?;
    validate_todo_id(id)
}
