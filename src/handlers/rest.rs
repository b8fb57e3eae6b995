/// REST API handlers for accounts, the follow graph and photos.
///
/// Each handler opens one unit of work, calls exactly one service operation
/// and maps the outcome to JSON. Failures are rendered by `CoreError`.
use actix_web::{web, HttpResponse, Result as ActixResult};
use serde_json::json;

use super::identity::AuthenticatedUser;
use crate::config::ServiceSettings;
use crate::db::models::*;
use crate::db::{with_transaction, DbPool};
use crate::error::CoreError;
use crate::services::{accounts, Accounts, ContentLedger, FollowGraph};

type HandlerResult = Result<HttpResponse, CoreError>;

pub(crate) fn success() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true }))
}

/// Register a new account
/// POST /api/auth/signup
pub async fn sign_up(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    req: web::Json<SignUpRequest>,
) -> HandlerResult {
    let user = accounts::register(&pool, &settings.accounts, &req).await?;
    Ok(HttpResponse::Created().json(json!({ "user": user })))
}

/// Sign in and receive a bearer token
/// POST /api/auth/signin
pub async fn sign_in(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    req: web::Json<SignInRequest>,
) -> HandlerResult {
    let session = accounts::sign_in(&pool, &settings.accounts, &req.email, &req.password).await?;
    Ok(HttpResponse::Ok().json(session))
}

/// POST /api/auth/signout
pub async fn sign_out(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
) -> HandlerResult {
    with_transaction(&pool, |conn| {
        Accounts::new(conn, &settings.accounts).sign_out(&caller.token)
    })
    .await?;
    Ok(success())
}

/// GET /api/users/me
pub async fn get_me(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
) -> HandlerResult {
    let user = with_transaction(&pool, |conn| {
        Accounts::new(conn, &settings.accounts).get_user(&caller.user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

/// GET /api/users/{user_id}
pub async fn get_user(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    _caller: AuthenticatedUser,
    user_id: web::Path<String>,
) -> HandlerResult {
    let user = with_transaction(&pool, |conn| {
        Accounts::new(conn, &settings.accounts).get_user(&user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

/// PATCH /api/users/me
pub async fn update_profile(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    req: web::Json<UpdateProfileRequest>,
) -> HandlerResult {
    let user = with_transaction(&pool, |conn| {
        Accounts::new(conn, &settings.accounts).update_profile(&caller.user_id, &req)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

/// DELETE /api/users/me
pub async fn delete_account(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
) -> HandlerResult {
    with_transaction(&pool, |conn| {
        Accounts::new(conn, &settings.accounts).delete_account(&caller.user_id)
    })
    .await?;
    Ok(success())
}

/// POST /api/users/{user_id}/follow
pub async fn follow(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    user_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        FollowGraph::new(conn, policy).follow(&caller.user_id, &user_id)
    })
    .await?;
    Ok(success())
}

/// DELETE /api/users/{user_id}/follow
pub async fn unfollow(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    user_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        FollowGraph::new(conn, policy).unfollow(&caller.user_id, &user_id)
    })
    .await?;
    Ok(success())
}

/// GET /api/users/{user_id}/followers
pub async fn list_followers(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    _caller: AuthenticatedUser,
    user_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let followers = with_transaction(&pool, |conn| {
        FollowGraph::new(conn, policy).list_followers(&user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "followers": followers })))
}

/// GET /api/users/{user_id}/following
pub async fn list_following(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    _caller: AuthenticatedUser,
    user_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let following = with_transaction(&pool, |conn| {
        FollowGraph::new(conn, policy).list_following(&user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "following": following })))
}

/// GET /api/users/{user_id}/photos
pub async fn user_photos(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    _caller: AuthenticatedUser,
    user_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let photos = with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).get_user_photos(&user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "photos": photos })))
}

/// POST /api/photos
pub async fn publish_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    req: web::Json<PublishPhotoRequest>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let photo = with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).publish_photo(&caller.user_id, &req.file_name, &req.description)
    })
    .await?;
    Ok(HttpResponse::Created().json(json!({ "photo": photo })))
}

/// GET /api/photos/saved
pub async fn saved_photos(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
) -> HandlerResult {
    let policy = settings.list_policy;
    let photos = with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).get_saved_photos(&caller.user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "photos": photos })))
}

/// GET /api/photos/{photo_id}
pub async fn get_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    _caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let photo = with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).get_photo(&photo_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "photo": photo })))
}

/// DELETE /api/photos/{photo_id}
pub async fn delete_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).delete_photo(&photo_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// PATCH /api/photos/{photo_id}/description
pub async fn edit_description(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
    req: web::Json<DescriptionRequest>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).edit_description(&photo_id, &caller.user_id, &req.description)
    })
    .await?;
    Ok(success())
}

/// POST /api/photos/{photo_id}/archive
pub async fn archive_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).archive_photo(&photo_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// DELETE /api/photos/{photo_id}/archive
pub async fn unarchive_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).unarchive_photo(&photo_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// POST /api/photos/{photo_id}/share
pub async fn share_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    _caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| ContentLedger::new(conn, policy).share_photo(&photo_id)).await?;
    Ok(success())
}

/// POST /api/photos/{photo_id}/like
pub async fn like_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).like_photo(&photo_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// DELETE /api/photos/{photo_id}/like
pub async fn unlike_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).unlike_photo(&photo_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// POST /api/photos/{photo_id}/save
pub async fn save_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).save_photo(&photo_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// DELETE /api/photos/{photo_id}/save
pub async fn unsave_photo(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).unsave_photo(&photo_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// GET /api/photos/{photo_id}/marked
pub async fn marked_users(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    _caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let users = with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).get_marked_users(&photo_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "markedUsers": users })))
}

/// POST /api/photos/{photo_id}/marked
pub async fn mark_user(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
    req: web::Json<MarkUserRequest>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).mark_user(&photo_id, &caller.user_id, &req.user_id)
    })
    .await?;
    Ok(success())
}

/// DELETE /api/photos/{photo_id}/marked/{user_id}
pub async fn unmark_user(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let (photo_id, user_id) = path.into_inner();
    with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).unmark_user(&photo_id, &caller.user_id, &user_id)
    })
    .await?;
    Ok(success())
}

/// POST /api/photos/{photo_id}/marked/refresh
pub async fn refresh_marked_flag(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    photo_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let marked = with_transaction(&pool, |conn| {
        ContentLedger::new(conn, policy).refresh_marked_flag(&photo_id, &caller.user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "markedUsers": marked })))
}

/// Health check endpoint
/// GET /health
pub async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}
