use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use murmur_db::Database;
use murmur_db::models::PostRow;
use murmur_types::api::{CommentRequest, CreatePostRequest, LikeResponse, PostResponse};

use crate::auth::AppState;
use crate::convert::{self, PostParts};
use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::middleware::AuthUser;
use crate::with_db;

/// Fetch authors, likes and comments for `posts` in three batched queries.
fn load_parts(db: &Database, posts: Vec<PostRow>) -> anyhow::Result<PostParts> {
    let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
    let likes = db.get_likes_for_posts(&post_ids)?;
    let comments = db.get_comments_for_posts(&post_ids)?;

    let mut author_ids: Vec<String> = posts
        .iter()
        .map(|p| p.author_id.clone())
        .chain(comments.iter().map(|c| c.author_id.clone()))
        .collect();
    author_ids.sort();
    author_ids.dedup();
    let authors = db.get_users_by_ids(&author_ids)?;

    Ok(PostParts {
        posts,
        authors,
        likes,
        comments,
    })
}

fn render_one(db: &Database, post: PostRow) -> anyhow::Result<PostResponse> {
    let parts = load_parts(db, vec![post])?;
    convert::posts(parts)
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("post conversion produced nothing"))
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let image = req
        .image
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .ok_or_else(|| ApiError::Validation("Image is required".into()))?;
    let caption = req.caption.filter(|c| !c.trim().is_empty());

    let author = auth.id.to_string();
    let post_id = Uuid::new_v4().to_string();
    let post = with_db(&state, move |db| {
        let row = db.create_post(&post_id, &author, &image, caption.as_deref())?;
        render_one(db, row)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts: the feed, newest first.
pub async fn get_posts(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let parts = with_db(&state, |db| {
        let posts = db.list_posts()?;
        load_parts(db, posts)
    })
    .await?;

    Ok(Json(convert::posts(parts)))
}

/// POST /posts/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let pid = post_id.to_string();
    let caller = auth.id.to_string();

    let (liked, count) = with_db(&state, move |db| {
        if db.get_post(&pid)?.is_none() {
            return Ok(None);
        }
        Ok(Some(db.toggle_like(&pid, &caller)?))
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    Ok(Json(LikeResponse { liked, count }))
}

/// POST /posts/{id}/comment: returns the post with its updated comments.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::Validation("Comment text is required".into()));
    }

    let pid = post_id.to_string();
    let author = auth.id.to_string();
    let comment_id = Uuid::new_v4().to_string();

    let post = with_db(&state, move |db| {
        let Some(post) = db.get_post(&pid)? else {
            return Ok(None);
        };
        db.add_comment(&comment_id, &pid, &author, &text)?;
        Ok(Some(render_one(db, post)?))
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    Ok((StatusCode::CREATED, Json(post)))
}
