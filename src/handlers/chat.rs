/// REST API handlers for chats, participants and messages.
use actix_web::{web, HttpResponse};
use serde_json::json;

use super::identity::AuthenticatedUser;
use super::rest::success;
use crate::config::ServiceSettings;
use crate::db::models::*;
use crate::db::{with_transaction, DbPool};
use crate::error::CoreError;
use crate::services::{ChatMembership, MessageLedger};

type HandlerResult = Result<HttpResponse, CoreError>;

/// GET /api/chats
pub async fn get_all_chats(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
) -> HandlerResult {
    let policy = settings.list_policy;
    let chats = with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).get_all_chats(&caller.user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "chats": chats })))
}

/// POST /api/chats/one-to-one
pub async fn create_one_to_one_chat(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    req: web::Json<CreateOneToOneChatRequest>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let chat = with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).create_one_to_one_chat(
            &caller.user_id,
            &req.recipient_id,
            &req.message,
        )
    })
    .await?;
    Ok(HttpResponse::Created().json(json!({ "chat": chat })))
}

/// POST /api/chats/group
pub async fn create_group_chat(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    req: web::Json<CreateGroupChatRequest>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let chat = with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).create_group_chat(&req.name, &caller.user_id)
    })
    .await?;
    Ok(HttpResponse::Created().json(json!({ "chat": chat })))
}

/// GET /api/chats/{chat_id}
pub async fn get_chat(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let chat = with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).accessible_chat(&chat_id, &caller.user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "chat": chat })))
}

/// DELETE /api/chats/{chat_id}
pub async fn delete_group_chat(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).delete_group_chat_permanently(&chat_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// PATCH /api/chats/{chat_id}/name
pub async fn edit_group_chat_name(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
    req: web::Json<ChatNameRequest>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).edit_group_chat_name(&chat_id, &caller.user_id, &req.name)
    })
    .await?;
    Ok(success())
}

/// PUT /api/chats/{chat_id}/cover
pub async fn change_chat_cover(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
    req: web::Json<ChatCoverRequest>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).change_chat_cover(&chat_id, &caller.user_id, &req.cover)
    })
    .await?;
    Ok(success())
}

/// DELETE /api/chats/{chat_id}/cover
pub async fn delete_chat_cover(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).delete_chat_cover(&chat_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// GET /api/chats/{chat_id}/participants
pub async fn get_participants(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let participants = with_transaction(&pool, |conn| {
        let chats = ChatMembership::new(conn, policy);
        match chats.accessible_chat(&chat_id, &caller.user_id) {
            Ok(_) => {}
            // A permanently deleted chat has no participants left.
            Err(CoreError::ChatNotFound) => {
                return policy.apply(Vec::new(), CoreError::NoParticipants);
            }
            Err(e) => return Err(e),
        }
        chats.get_chat_participants(&chat_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "participants": participants })))
}

/// POST /api/chats/{chat_id}/participants
pub async fn add_participant(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
    req: web::Json<ParticipantRequest>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).add_participant(&chat_id, &req.participant_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// DELETE /api/chats/{chat_id}/participants/{participant_id}
pub async fn delete_participant(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let (chat_id, participant_id) = path.into_inner();
    with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).delete_participant(&chat_id, &participant_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// POST /api/chats/{chat_id}/leave
pub async fn leave_group_chat(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        ChatMembership::new(conn, policy).leave_group_chat(&chat_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// GET /api/chats/{chat_id}/messages
pub async fn get_messages(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let messages = with_transaction(&pool, |conn| {
        MessageLedger::new(conn, policy).get_messages(&chat_id, &caller.user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "messages": messages })))
}

/// POST /api/chats/{chat_id}/messages
pub async fn send_message(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
    req: web::Json<NewMessage>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let message = with_transaction(&pool, |conn| {
        MessageLedger::new(conn, policy).send_message(&chat_id, &caller.user_id, &req)
    })
    .await?;
    Ok(HttpResponse::Created().json(json!({ "message": message })))
}

/// POST /api/chats/{chat_id}/read
pub async fn mark_messages_read(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    chat_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    let updated = with_transaction(&pool, |conn| {
        MessageLedger::new(conn, policy).mark_messages_read(&chat_id, &caller.user_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

/// DELETE /api/messages/{message_id}
pub async fn delete_message(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    message_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        MessageLedger::new(conn, policy).delete_message(&message_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// POST /api/messages/{message_id}/like
pub async fn like_message(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    message_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        MessageLedger::new(conn, policy).like_message(&message_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}

/// DELETE /api/messages/{message_id}/like
pub async fn unlike_message(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    caller: AuthenticatedUser,
    message_id: web::Path<String>,
) -> HandlerResult {
    let policy = settings.list_policy;
    with_transaction(&pool, |conn| {
        MessageLedger::new(conn, policy).unlike_message(&message_id, &caller.user_id)
    })
    .await?;
    Ok(success())
}
