use crate::server::{Result, ServerError, ServerRouter, json::Json};
use axum::{
    Router,
    extract::{Query, State},
};
use axum_extra::{
    extract::WithRejection,
    routing::{RouterExt, TypedPath},
};
use ripple_common::model::{
    Id,
    post::{Page, Post, PostMarker},
    user::{User, UserMarker},
};
use ripple_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(get_user).typed_get(get_user_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct PageQuery {
    cursor: Option<Id<PostMarker>>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

/// The per-author listing does not check that the author exists: an
/// unknown author simply has an empty feed, like one who never posted.
async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    WithRejection(Query(PageQuery { cursor }), _): WithRejection<Query<PageQuery>, ServerError>,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Page<Post>>> {
    let page = db.fetch_posts_by_author(id, cursor).await?;

    Ok(Json(page))
}
