/// Data models for database operations.
/// Represents users, follow edges, photos, chats, participants and messages,
/// plus the typed request/response bodies of the REST surface.
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Public view of a user row. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub user_name: String,
    pub full_name: String,
    pub date_of_birth: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
    pub created_at: String,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, email, user_name, full_name, date_of_birth, avatar, bio, followers, following, posts, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            user_name: row.get(2)?,
            full_name: row.get(3)?,
            date_of_birth: row.get(4)?,
            avatar: row.get(5)?,
            bio: row.get(6)?,
            followers: row.get(7)?,
            following: row.get(8)?,
            posts: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub follower_id: String,
    pub followed_id: String,
    pub follow_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    pub description: String,
    pub likes: i64,
    pub sharings: i64,
    pub savings: i64,
    pub marked_users: bool,
    pub archived: bool,
    pub date_of_publishing: String,
}

impl Photo {
    pub const COLUMNS: &'static str =
        "id, user_id, file_name, description, likes, sharings, savings, marked_users, archived, date_of_publishing";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Photo {
            id: row.get(0)?,
            user_id: row.get(1)?,
            file_name: row.get(2)?,
            description: row.get(3)?,
            likes: row.get(4)?,
            sharings: row.get(5)?,
            savings: row.get(6)?,
            marked_users: row.get(7)?,
            archived: row.get(8)?,
            date_of_publishing: row.get(9)?,
        })
    }
}

/// Discriminates the two chat shapes stored in the `chats` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatType {
    #[serde(rename = "one-to-one")]
    OneToOne,
    #[serde(rename = "group")]
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::OneToOne => "one-to-one",
            ChatType::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one-to-one" => Some(ChatType::OneToOne),
            "group" => Some(ChatType::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub user1: Option<String>,
    pub user2: Option<String>,
    pub name: Option<String>,
    pub cover: Option<String>,
    pub creator_id: Option<String>,
    pub created_at: String,
}

impl Chat {
    pub const COLUMNS: &'static str = "id, type, user1, user2, name, cover, creator_id, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let type_str: String = row.get(1)?;
        let chat_type = ChatType::parse(&type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown chat type '{}'", type_str).into(),
            )
        })?;

        Ok(Chat {
            id: row.get(0)?,
            chat_type,
            user1: row.get(2)?,
            user2: row.get(3)?,
            name: row.get(4)?,
            cover: row.get(5)?,
            creator_id: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    /// Whether `user_id` is one of the two parties of a one-to-one chat
    /// or the creator of a group chat.
    pub fn is_owner_or_party(&self, user_id: &str) -> bool {
        match self.chat_type {
            ChatType::OneToOne => {
                self.user1.as_deref() == Some(user_id) || self.user2.as_deref() == Some(user_id)
            }
            ChatType::Group => self.creator_id.as_deref() == Some(user_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipant {
    pub chat_id: String,
    pub participant_id: String,
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text_content: Option<String>,
    pub media_url: Option<String>,
    pub shared_post_id: Option<String>,
    pub sent_at: String,
    pub read: bool,
    pub likes: i64,
}

impl Message {
    pub const COLUMNS: &'static str =
        "id, chat_id, sender_id, type, text_content, media_url, shared_post_id, sent_at, read, likes";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Message {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            sender_id: row.get(2)?,
            message_type: row.get(3)?,
            text_content: row.get(4)?,
            media_url: row.get(5)?,
            shared_post_id: row.get(6)?,
            sent_at: row.get(7)?,
            read: row.get(8)?,
            likes: row.get(9)?,
        })
    }
}

/// Body of a new message, shared by `sendMessage` and the first message of a
/// one-to-one chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(rename = "type", default = "NewMessage::default_type")]
    pub message_type: String,
    pub text_content: Option<String>,
    pub media_url: Option<String>,
    pub shared_post_id: Option<String>,
}

impl NewMessage {
    fn default_type() -> String {
        "text".to_string()
    }

    pub fn text(content: &str) -> Self {
        NewMessage {
            message_type: Self::default_type(),
            text_content: Some(content.to_string()),
            media_url: None,
            shared_post_id: None,
        }
    }
}

// Request/Response DTOs
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub user_name: String,
    pub full_name: String,
    pub date_of_birth: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOneToOneChatRequest {
    pub recipient_id: String,
    pub message: NewMessage,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupChatRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRequest {
    pub participant_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatNameRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCoverRequest {
    pub cover: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPhotoRequest {
    pub file_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRequest {
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkUserRequest {
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_type_round_trip() {
        assert_eq!(ChatType::parse("group"), Some(ChatType::Group));
        assert_eq!(ChatType::parse(ChatType::OneToOne.as_str()), Some(ChatType::OneToOne));
        assert_eq!(ChatType::parse("broadcast"), None);
    }

    #[test]
    fn test_chat_serializes_type_discriminator() {
        let chat = Chat {
            id: "c1".to_string(),
            chat_type: ChatType::OneToOne,
            user1: Some("a".to_string()),
            user2: Some("b".to_string()),
            name: None,
            cover: None,
            creator_id: None,
            created_at: "2025-10-20T10:00:00Z".to_string(),
        };

        let json = serde_json::to_value(&chat).expect("Serialization failed");
        assert_eq!(json["type"], "one-to-one");
        assert_eq!(json["creatorId"], serde_json::Value::Null);
    }

    #[test]
    fn test_chat_party_rules() {
        let group = Chat {
            id: "g1".to_string(),
            chat_type: ChatType::Group,
            user1: None,
            user2: None,
            name: Some("friends".to_string()),
            cover: None,
            creator_id: Some("carol".to_string()),
            created_at: "2025-10-20T10:00:00Z".to_string(),
        };

        assert!(group.is_owner_or_party("carol"));
        assert!(!group.is_owner_or_party("dave"));
    }

    #[test]
    fn test_new_message_defaults_to_text() {
        let msg: NewMessage =
            serde_json::from_str(r#"{"textContent":"hi"}"#).expect("Deserialization failed");
        assert_eq!(msg.message_type, "text");
        assert_eq!(msg.text_content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_sign_up_request_uses_camel_case() {
        let request: SignUpRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "secret123",
            "userName": "alice",
            "fullName": "Alice A",
            "dateOfBirth": "1990-01-01"
        }))
        .expect("Deserialization failed");

        assert_eq!(request.user_name, "alice");
        assert_eq!(request.date_of_birth, "1990-01-01");
    }
}
