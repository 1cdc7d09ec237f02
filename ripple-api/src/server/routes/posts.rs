use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
};
use axum_extra::{
    extract::WithRejection,
    routing::{RouterExt, TypedPath},
};
use ripple_common::model::{
    Id,
    image::{ImageMarker, ImageView},
    post::{CreatePost, Page, Post, PostContent, PostMarker},
};
use ripple_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(get_feed)
        .typed_post(create_post)
        .typed_get(search_posts)
        .typed_get(get_post)
        .typed_delete(delete_post)
        .typed_put(add_heart)
        .typed_delete(remove_heart)
        .typed_post(create_repost)
        .typed_get(get_comments)
        .typed_post(create_comment)
        .typed_get(get_image)
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct PageQuery {
    cursor: Option<Id<PostMarker>>,
}

type PageParams = WithRejection<Query<PageQuery>, ServerError>;

#[derive(TypedPath)]
#[typed_path("/posts")]
struct FeedPath;

async fn get_feed(
    _: FeedPath,
    WithRejection(Query(PageQuery { cursor }), _): PageParams,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Page<Post>>> {
    let page = db.fetch_feed_page(cursor).await?;

    Ok(Json(page))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct CreatePostRequest {
    content: PostContent,
    /// Storage links produced by the upload handler, in display order.
    #[serde(default)]
    images: Vec<String>,
}

#[derive(TypedPath)]
#[typed_path("/posts")]
struct CreatePostPath;

async fn create_post(
    _: CreatePostPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>)> {
    let post = db
        .create_post(&CreatePost {
            author: user.user_id(),
            content: request.content,
            images: request.images,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct SearchQuery {
    q: String,
    cursor: Option<Id<PostMarker>>,
}

#[derive(TypedPath)]
#[typed_path("/posts/search")]
struct SearchPath;

async fn search_posts(
    _: SearchPath,
    WithRejection(Query(SearchQuery { q, cursor }), _): WithRejection<
        Query<SearchQuery>,
        ServerError,
    >,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Page<Post>>> {
    let page = db.search_posts(&q, cursor).await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Post>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct DeletePostPath {
    id: Id<PostMarker>,
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    _user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<StatusCode> {
    if db.soft_delete_post(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::PostByIdNotFound(id))
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/hearts", rejection(ServerError))]
struct HeartPath {
    id: Id<PostMarker>,
}

async fn add_heart(
    HeartPath { id }: HeartPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Post>> {
    let post = db
        .add_heart(id, user.user_id())
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

async fn remove_heart(
    HeartPath { id }: HeartPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Post>> {
    let post = db
        .remove_heart(id, user.user_id())
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/reposts", rejection(ServerError))]
struct RepostPath {
    id: Id<PostMarker>,
}

async fn create_repost(
    RepostPath { id }: RepostPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<(StatusCode, Json<Post>)> {
    let repost = db
        .create_repost(id, user.user_id())
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok((StatusCode::CREATED, Json(repost)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: Id<PostMarker>,
}

async fn get_comments(
    CommentsPath { id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Post>>> {
    let comments = db
        .fetch_comments(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(comments))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct CreateCommentRequest {
    content: PostContent,
    #[serde(default)]
    images: Vec<String>,
}

async fn create_comment(
    CommentsPath { id }: CommentsPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Post>)> {
    let comment = db
        .create_comment(
            id,
            &CreatePost {
                author: user.user_id(),
                content: request.content,
                images: request.images,
            },
        )
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/images/{image_id}", rejection(ServerError))]
struct GetImagePath {
    post_id: Id<PostMarker>,
    image_id: Id<ImageMarker>,
}

async fn get_image(
    GetImagePath { post_id, image_id }: GetImagePath,
    _user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<ImageView>> {
    let view = db
        .fetch_image_view(post_id, image_id)
        .await?
        .ok_or(ServerError::ImageByIdNotFound {
            post: post_id,
            image: image_id,
        })?;

    Ok(Json(view))
}
