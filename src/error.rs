/// Error types for the social graph and chat core.
/// Every core operation either succeeds or fails with exactly one of these.
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Already following this user")]
    AlreadyFollowing,

    #[error("Not following this user")]
    NotFollowing,

    #[error("Users cannot follow themselves")]
    SelfFollow,

    #[error("Chat already exists between these users")]
    ChatAlreadyExists,

    #[error("Chat not found")]
    ChatNotFound,

    #[error("User is already a participant of this chat")]
    AlreadyParticipant,

    #[error("User is not a participant of this chat")]
    NotParticipant,

    #[error("The creator cannot leave their own chat")]
    CreatorCannotLeave,

    #[error("No chats found")]
    NoChats,

    #[error("No followers found")]
    NoFollowers,

    #[error("No followings found")]
    NoFollowing,

    #[error("No messages found")]
    NoMessages,

    #[error("No photos found")]
    NoPhotos,

    #[error("No participants found")]
    NoParticipants,

    #[error("Counter update on {0} affected no rows")]
    CounterUpdateFailed(&'static str),

    #[error("Incorrect email or password")]
    Credentials,

    #[error("User must be at least {0} years old")]
    Underage(u32),

    #[error("User not found")]
    UserNotFound,

    #[error("Photo not found")]
    PhotoNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Not allowed: {0}")]
    Forbidden(&'static str),

    #[error("Already liked")]
    AlreadyLiked,

    #[error("Not liked")]
    NotLiked,

    #[error("Already saved")]
    AlreadySaved,

    #[error("Not saved")]
    NotSaved,

    #[error("User is already marked on this photo")]
    AlreadyMarked,

    #[error("User is not marked on this photo")]
    NotMarked,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("User name is already taken")]
    UserNameTaken,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing or expired session")]
    Unauthenticated,

    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl CoreError {
    /// Stable machine-readable code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::AlreadyFollowing => "ALREADY_FOLLOWING",
            CoreError::NotFollowing => "NOT_FOLLOWING",
            CoreError::SelfFollow => "SELF_FOLLOW",
            CoreError::ChatAlreadyExists => "CHAT_ALREADY_EXISTS",
            CoreError::ChatNotFound => "CHAT_NOT_FOUND",
            CoreError::AlreadyParticipant => "ALREADY_PARTICIPANT",
            CoreError::NotParticipant => "NOT_PARTICIPANT",
            CoreError::CreatorCannotLeave => "CREATOR_CANNOT_LEAVE",
            CoreError::NoChats => "NO_CHATS",
            CoreError::NoFollowers => "NO_FOLLOWERS",
            CoreError::NoFollowing => "NO_FOLLOWING",
            CoreError::NoMessages => "NO_MESSAGES",
            CoreError::NoPhotos => "NO_PHOTOS",
            CoreError::NoParticipants => "NO_PARTICIPANTS",
            CoreError::CounterUpdateFailed(_) => "COUNTER_UPDATE_FAILED",
            CoreError::Credentials => "INVALID_CREDENTIALS",
            CoreError::Underage(_) => "UNDERAGE",
            CoreError::UserNotFound => "USER_NOT_FOUND",
            CoreError::PhotoNotFound => "PHOTO_NOT_FOUND",
            CoreError::MessageNotFound => "MESSAGE_NOT_FOUND",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::AlreadyLiked => "ALREADY_LIKED",
            CoreError::NotLiked => "NOT_LIKED",
            CoreError::AlreadySaved => "ALREADY_SAVED",
            CoreError::NotSaved => "NOT_SAVED",
            CoreError::AlreadyMarked => "ALREADY_MARKED",
            CoreError::NotMarked => "NOT_MARKED",
            CoreError::EmailTaken => "EMAIL_TAKEN",
            CoreError::UserNameTaken => "USER_NAME_TAKEN",
            CoreError::InvalidInput(_) => "INVALID_INPUT",
            CoreError::Unauthenticated => "UNAUTHENTICATED",
            CoreError::Hashing(_) | CoreError::Blocking(_) | CoreError::Database(_) => "INTERNAL",
        }
    }

    /// A zero-row counter update is usually a lost race with a concurrent
    /// request, so the caller may retry the whole unit of work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::CounterUpdateFailed(_))
    }
}

impl ResponseError for CoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            CoreError::AlreadyFollowing
            | CoreError::ChatAlreadyExists
            | CoreError::AlreadyParticipant
            | CoreError::AlreadyLiked
            | CoreError::AlreadySaved
            | CoreError::AlreadyMarked
            | CoreError::EmailTaken
            | CoreError::UserNameTaken
            | CoreError::CounterUpdateFailed(_) => StatusCode::CONFLICT,
            CoreError::NotFollowing
            | CoreError::ChatNotFound
            | CoreError::NotParticipant
            | CoreError::NoChats
            | CoreError::NoFollowers
            | CoreError::NoFollowing
            | CoreError::NoMessages
            | CoreError::NoPhotos
            | CoreError::NoParticipants
            | CoreError::UserNotFound
            | CoreError::PhotoNotFound
            | CoreError::MessageNotFound
            | CoreError::NotLiked
            | CoreError::NotSaved
            | CoreError::NotMarked => StatusCode::NOT_FOUND,
            CoreError::SelfFollow | CoreError::InvalidInput(_) | CoreError::Underage(_) => {
                StatusCode::BAD_REQUEST
            }
            CoreError::CreatorCannotLeave | CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::Credentials | CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CoreError::Hashing(_) | CoreError::Blocking(_) | CoreError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            CoreError::Hashing(_) | CoreError::Blocking(_) | CoreError::Database(_) => {
                log::error!("Internal error: {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "code": self.code(),
            "message": message,
        }))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
