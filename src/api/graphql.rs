use crate::state::AppState;
use crate::todos::persistence::{create_todo, delete_todo, find_todo, list_todos, update_todo};
use crate::todos::types::{validate_todo_id, Todo, TodoCreateArgs, TodoUpdateArgs};
use async_graphql::http::GraphiQLSource;
use async_graphql::{Context, EmptySubscription, Object, Result, Schema};
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use sqlx::SqlitePool;
use std::sync::Arc;

const NO_FIELDS: &str = "no fields";

pub type TodoSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(pool: SqlitePool) -> TodoSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(pool)
        .finish()
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn todos(&self, ctx: &Context<'_>) -> Result<Vec<Todo>> {
        let pool = ctx.data::<SqlitePool>()?;
        Ok(list_todos(pool).await?)
    }

    async fn todo(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Todo>> {
        let pool = ctx.data::<SqlitePool>()?;
        Ok(find_todo(pool, id).await?)
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_todo(&self, ctx: &Context<'_>, title: String) -> Result<Todo> {
        let pool = ctx.data::<SqlitePool>()?;
        let new_todo = TodoCreateArgs { title: Some(title) }.normalize()?;
        Ok(create_todo(pool, new_todo).await?)
    }

    async fn update_todo(
        &self,
        ctx: &Context<'_>,
        id: i64,
        title: Option<String>,
        completed: Option<bool>,
    ) -> Result<Todo> {
        let pool = ctx.data::<SqlitePool>()?;
        let id = validate_todo_id(id)?;
        let args = TodoUpdateArgs { title, completed };
        if args.is_empty() {
            return Err(NO_FIELDS.into());
        }
        let patch = args.normalize()?;
        Ok(update_todo(pool, id, patch).await?)
    }

    /// `true` once the delete was attempted, whether or not a row existed.
    async fn delete_todo(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        let pool = ctx.data::<SqlitePool>()?;
        let id = validate_todo_id(id)?;
        delete_todo(pool, id).await?;
        Ok(true)
    }
}

pub async fn graphql(
    State(state): State<Arc<AppState>>,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    Json(state.schema.execute(request).await)
}

pub async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}
