/// Chat membership management.
///
/// Covers one-to-one chats (at most one per unordered user pair) and group
/// chats (a creator plus rows in `group_chats_participants`). The creator is
/// an implicit member and never appears as a participant row.
use rusqlite::{params, Connection, OptionalExtension};

use super::message::MessageLedger;
use super::{ensure_user_exists, new_id, now, EmptyListPolicy};
use crate::db::map_unique;
use crate::db::models::{Chat, ChatParticipant, ChatType, NewMessage};
use crate::error::{CoreError, Result};

const MAX_CHAT_NAME_LEN: usize = 100;

pub struct ChatMembership<'a> {
    conn: &'a Connection,
    policy: EmptyListPolicy,
}

impl<'a> ChatMembership<'a> {
    pub fn new(conn: &'a Connection, policy: EmptyListPolicy) -> Self {
        ChatMembership { conn, policy }
    }

    /// Get a chat by id
    pub fn get_chat(&self, chat_id: &str) -> Result<Chat> {
        let sql = format!("SELECT {} FROM chats WHERE id = ?1", Chat::COLUMNS);
        self.conn
            .query_row(&sql, params![chat_id], Chat::from_row)
            .optional()?
            .ok_or(CoreError::ChatNotFound)
    }

    /// Find the one-to-one chat between two users, in either direction
    pub fn find_one_to_one(&self, user_a: &str, user_b: &str) -> Result<Option<Chat>> {
        let sql = format!(
            "SELECT {} FROM chats
             WHERE type = 'one-to-one'
               AND ((user1 = ?1 AND user2 = ?2) OR (user1 = ?2 AND user2 = ?1))",
            Chat::COLUMNS
        );
        let chat = self
            .conn
            .query_row(&sql, params![user_a, user_b], Chat::from_row)
            .optional()?;
        Ok(chat)
    }

    /// Open a one-to-one chat anchored by its first message.
    ///
    /// The chat row goes in first so the message can reference it; both
    /// writes share the caller's transaction, so a failed message insert
    /// leaves no chat behind.
    pub fn create_one_to_one_chat(
        &self,
        sender_id: &str,
        recipient_id: &str,
        first_message: &NewMessage,
    ) -> Result<Chat> {
        if sender_id == recipient_id {
            return Err(CoreError::InvalidInput(
                "cannot open a chat with yourself".to_string(),
            ));
        }
        ensure_user_exists(self.conn, recipient_id)?;

        if self.find_one_to_one(sender_id, recipient_id)?.is_some() {
            return Err(CoreError::ChatAlreadyExists);
        }

        let chat_id = new_id();
        self.conn
            .execute(
                "INSERT INTO chats (id, type, user1, user2, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![chat_id, ChatType::OneToOne.as_str(), sender_id, recipient_id, now()],
            )
            .map_err(|e| map_unique(e, CoreError::ChatAlreadyExists))?;

        MessageLedger::new(self.conn, self.policy).insert_message(&chat_id, sender_id, first_message)?;

        log::info!("Created one-to-one chat {} between {} and {}", chat_id, sender_id, recipient_id);
        self.get_chat(&chat_id)
    }

    /// Create a group chat owned by `creator_id`
    pub fn create_group_chat(&self, name: &str, creator_id: &str) -> Result<Chat> {
        let name = validate_chat_name(name)?;
        ensure_user_exists(self.conn, creator_id)?;

        let chat_id = new_id();
        self.conn.execute(
            "INSERT INTO chats (id, type, name, creator_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![chat_id, ChatType::Group.as_str(), name, creator_id, now()],
        )?;

        log::info!("Created group chat {} by {}", chat_id, creator_id);
        self.get_chat(&chat_id)
    }

    pub fn is_participant(&self, chat_id: &str, user_id: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM group_chats_participants WHERE chat_id = ?1 AND participant_id = ?2",
                params![chat_id, user_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether `user_id` may read and act on messages of `chat`
    pub fn can_access(&self, chat: &Chat, user_id: &str) -> Result<bool> {
        if chat.is_owner_or_party(user_id) {
            return Ok(true);
        }
        match chat.chat_type {
            ChatType::Group => self.is_participant(&chat.id, user_id),
            ChatType::OneToOne => Ok(false),
        }
    }

    /// Load a chat and require that `user_id` may access it
    pub fn accessible_chat(&self, chat_id: &str, user_id: &str) -> Result<Chat> {
        let chat = self.get_chat(chat_id)?;
        if !self.can_access(&chat, user_id)? {
            return Err(CoreError::Forbidden("not a member of this chat"));
        }
        Ok(chat)
    }

    /// Add `participant_id` to a group chat. The requester must already be
    /// the creator or a participant.
    pub fn add_participant(
        &self,
        chat_id: &str,
        participant_id: &str,
        requesting_user_id: &str,
    ) -> Result<()> {
        let chat = self.group_chat(chat_id)?;
        if !self.can_access(&chat, requesting_user_id)? {
            return Err(CoreError::Forbidden("only members can add participants"));
        }
        if chat.creator_id.as_deref() == Some(participant_id) {
            return Err(CoreError::AlreadyParticipant);
        }
        ensure_user_exists(self.conn, participant_id)?;

        if self.is_participant(chat_id, participant_id)? {
            return Err(CoreError::AlreadyParticipant);
        }

        self.insert_participant(chat_id, participant_id)?;

        log::info!("{} added {} to chat {}", requesting_user_id, participant_id, chat_id);
        Ok(())
    }

    /// Remove `participant_id` from a group chat. Only the creator may remove
    /// others; any participant may remove themselves.
    pub fn delete_participant(
        &self,
        chat_id: &str,
        participant_id: &str,
        requesting_user_id: &str,
    ) -> Result<()> {
        let chat = self.group_chat(chat_id)?;
        let is_creator = chat.creator_id.as_deref() == Some(requesting_user_id);
        if !is_creator && requesting_user_id != participant_id {
            return Err(CoreError::Forbidden("only the creator can remove participants"));
        }

        self.remove_participant_row(chat_id, participant_id)?;
        log::info!("{} removed {} from chat {}", requesting_user_id, participant_id, chat_id);
        Ok(())
    }

    /// Leave a group chat. The creator cannot leave.
    pub fn leave_group_chat(&self, chat_id: &str, user_id: &str) -> Result<()> {
        let chat = self.group_chat(chat_id)?;
        if chat.creator_id.as_deref() == Some(user_id) {
            return Err(CoreError::CreatorCannotLeave);
        }

        self.remove_participant_row(chat_id, user_id)?;
        log::info!("{} left chat {}", user_id, chat_id);
        Ok(())
    }

    pub fn edit_group_chat_name(&self, chat_id: &str, requesting_user_id: &str, name: &str) -> Result<()> {
        let name = validate_chat_name(name)?;
        self.creator_chat(chat_id, requesting_user_id)?;
        self.conn.execute(
            "UPDATE chats SET name = ?1 WHERE id = ?2",
            params![name, chat_id],
        )?;
        Ok(())
    }

    pub fn change_chat_cover(&self, chat_id: &str, requesting_user_id: &str, cover: &str) -> Result<()> {
        if cover.trim().is_empty() {
            return Err(CoreError::InvalidInput("cover must not be empty".to_string()));
        }
        self.creator_chat(chat_id, requesting_user_id)?;
        self.conn.execute(
            "UPDATE chats SET cover = ?1 WHERE id = ?2",
            params![cover, chat_id],
        )?;
        Ok(())
    }

    pub fn delete_chat_cover(&self, chat_id: &str, requesting_user_id: &str) -> Result<()> {
        self.creator_chat(chat_id, requesting_user_id)?;
        self.conn.execute(
            "UPDATE chats SET cover = NULL WHERE id = ?1",
            params![chat_id],
        )?;
        Ok(())
    }

    /// Delete a group chat with all its participant rows and messages.
    /// Creator only.
    pub fn delete_group_chat_permanently(&self, chat_id: &str, requesting_user_id: &str) -> Result<()> {
        self.creator_chat(chat_id, requesting_user_id)?;
        self.purge_chat(chat_id)?;
        log::info!("{} deleted group chat {}", requesting_user_id, chat_id);
        Ok(())
    }

    /// One-to-one chats the user is a party of, plus group chats they created
    /// or participate in.
    pub fn get_all_chats(&self, user_id: &str) -> Result<Vec<Chat>> {
        let sql = format!(
            "SELECT {} FROM chats
             WHERE (type = 'one-to-one' AND (user1 = ?1 OR user2 = ?1))
                OR (type = 'group' AND (creator_id = ?1 OR id IN (
                    SELECT chat_id FROM group_chats_participants WHERE participant_id = ?1)))
             ORDER BY created_at DESC",
            Chat::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let chats = stmt
            .query_map(params![user_id], Chat::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.policy.apply(chats, CoreError::NoChats)
    }

    /// Participant rows of a chat; a deleted chat simply has none
    pub fn get_chat_participants(&self, chat_id: &str) -> Result<Vec<ChatParticipant>> {
        let mut stmt = self.conn.prepare(
            "SELECT chat_id, participant_id, joined_at FROM group_chats_participants
             WHERE chat_id = ?1 ORDER BY joined_at ASC",
        )?;
        let participants = stmt
            .query_map(params![chat_id], |row| {
                Ok(ChatParticipant {
                    chat_id: row.get(0)?,
                    participant_id: row.get(1)?,
                    joined_at: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.policy.apply(participants, CoreError::NoParticipants)
    }

    /// Remove every chat trace of `user_id`. Used by account deletion.
    pub(crate) fn remove_user_chats(&self, user_id: &str) -> Result<()> {
        let owned: Vec<String> = {
            let mut stmt = self.conn.prepare(
                "SELECT id FROM chats
                 WHERE (type = 'group' AND creator_id = ?1)
                    OR (type = 'one-to-one' AND (user1 = ?1 OR user2 = ?1))",
            )?;
            let ids = stmt
                .query_map(params![user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            ids
        };
        for chat_id in &owned {
            self.purge_chat(chat_id)?;
        }

        self.conn.execute(
            "DELETE FROM group_chats_participants WHERE participant_id = ?1",
            params![user_id],
        )?;

        MessageLedger::new(self.conn, self.policy).delete_messages_by_sender(user_id)?;
        Ok(())
    }

    fn group_chat(&self, chat_id: &str) -> Result<Chat> {
        let chat = self.get_chat(chat_id)?;
        if chat.chat_type != ChatType::Group {
            return Err(CoreError::InvalidInput("not a group chat".to_string()));
        }
        Ok(chat)
    }

    fn creator_chat(&self, chat_id: &str, requesting_user_id: &str) -> Result<Chat> {
        let chat = self.group_chat(chat_id)?;
        if chat.creator_id.as_deref() != Some(requesting_user_id) {
            return Err(CoreError::Forbidden("only the creator can manage this chat"));
        }
        Ok(chat)
    }

    /// The primary key catches a concurrent add that slipped past the check.
    fn insert_participant(&self, chat_id: &str, participant_id: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO group_chats_participants (chat_id, participant_id, joined_at) VALUES (?1, ?2, ?3)",
                params![chat_id, participant_id, now()],
            )
            .map_err(|e| map_unique(e, CoreError::AlreadyParticipant))?;
        Ok(())
    }

    fn remove_participant_row(&self, chat_id: &str, participant_id: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM group_chats_participants WHERE chat_id = ?1 AND participant_id = ?2",
            params![chat_id, participant_id],
        )?;
        if deleted == 0 {
            return Err(CoreError::NotParticipant);
        }
        Ok(())
    }

    fn purge_chat(&self, chat_id: &str) -> Result<()> {
        MessageLedger::new(self.conn, self.policy).delete_chat_messages(chat_id)?;
        self.conn.execute(
            "DELETE FROM group_chats_participants WHERE chat_id = ?1",
            params![chat_id],
        )?;
        self.conn.execute("DELETE FROM chats WHERE id = ?1", params![chat_id])?;
        Ok(())
    }
}

fn validate_chat_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_CHAT_NAME_LEN {
        return Err(CoreError::InvalidInput(format!(
            "chat name must be 1-{} characters",
            MAX_CHAT_NAME_LEN
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::services::testing::{count, seed_user};

    #[tokio::test]
    async fn test_one_to_one_chat_is_unique_per_pair() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "a");
        seed_user(&conn, "b");

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats
            .create_one_to_one_chat("a", "b", &NewMessage::text("hi"))
            .unwrap();
        assert_eq!(chat.chat_type, ChatType::OneToOne);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM messages"), 1);

        let again = chats.create_one_to_one_chat("b", "a", &NewMessage::text("hello"));
        assert!(matches!(again, Err(CoreError::ChatAlreadyExists)));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM chats"), 1);
    }

    #[tokio::test]
    async fn test_pair_index_rejects_reversed_duplicate() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "a");
        seed_user(&conn, "b");

        conn.execute(
            "INSERT INTO chats (id, type, user1, user2, created_at) VALUES ('c1', 'one-to-one', 'a', 'b', 'x')",
            [],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO chats (id, type, user1, user2, created_at) VALUES ('c2', 'one-to-one', 'b', 'a', 'x')",
                [],
            )
            .unwrap_err();
        assert!(crate::db::is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_one_to_one_with_unknown_recipient() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "a");

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let result = chats.create_one_to_one_chat("a", "ghost", &NewMessage::text("hi"));
        assert!(matches!(result, Err(CoreError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_creator_cannot_leave_but_participant_can() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "creator");
        seed_user(&conn, "member");

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats.create_group_chat("friends", "creator").unwrap();
        assert_eq!(chat.creator_id.as_deref(), Some("creator"));
        chats.add_participant(&chat.id, "member", "creator").unwrap();

        assert!(matches!(
            chats.leave_group_chat(&chat.id, "creator"),
            Err(CoreError::CreatorCannotLeave)
        ));

        chats.leave_group_chat(&chat.id, "member").unwrap();
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM group_chats_participants"), 0);
        assert!(matches!(
            chats.leave_group_chat(&chat.id, "member"),
            Err(CoreError::NotParticipant)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_participant_rejected() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "creator");
        seed_user(&conn, "member");

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats.create_group_chat("friends", "creator").unwrap();
        chats.add_participant(&chat.id, "member", "creator").unwrap();

        let again = chats.add_participant(&chat.id, "member", "creator");
        assert!(matches!(again, Err(CoreError::AlreadyParticipant)));
        assert_eq!(chats.get_chat_participants(&chat.id).unwrap().len(), 1);

        let creator_again = chats.add_participant(&chat.id, "creator", "creator");
        assert!(matches!(creator_again, Err(CoreError::AlreadyParticipant)));
    }

    #[tokio::test]
    async fn test_duplicate_participant_insert_maps_to_already_participant() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "creator");
        seed_user(&conn, "member");

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats.create_group_chat("friends", "creator").unwrap();
        conn.execute(
            "INSERT INTO group_chats_participants (chat_id, participant_id, joined_at) VALUES (?1, 'member', 'x')",
            params![chat.id],
        )
        .unwrap();

        let result = chats.insert_participant(&chat.id, "member");
        assert!(matches!(result, Err(CoreError::AlreadyParticipant)));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM group_chats_participants"), 1);
    }

    #[tokio::test]
    async fn test_outsider_cannot_add_participants() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        for id in ["creator", "outsider", "target"] {
            seed_user(&conn, id);
        }

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats.create_group_chat("friends", "creator").unwrap();

        let result = chats.add_participant(&chat.id, "target", "outsider");
        assert!(matches!(result, Err(CoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_participant_rules() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        for id in ["creator", "p1", "p2"] {
            seed_user(&conn, id);
        }

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats.create_group_chat("friends", "creator").unwrap();
        chats.add_participant(&chat.id, "p1", "creator").unwrap();
        chats.add_participant(&chat.id, "p2", "p1").unwrap();

        assert!(matches!(
            chats.delete_participant(&chat.id, "p2", "p1"),
            Err(CoreError::Forbidden(_))
        ));
        chats.delete_participant(&chat.id, "p2", "creator").unwrap();
        assert!(matches!(
            chats.delete_participant(&chat.id, "p2", "creator"),
            Err(CoreError::NotParticipant)
        ));
    }

    #[tokio::test]
    async fn test_creator_only_edits() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "creator");
        seed_user(&conn, "member");

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats.create_group_chat("friends", "creator").unwrap();
        chats.add_participant(&chat.id, "member", "creator").unwrap();

        assert!(matches!(
            chats.edit_group_chat_name(&chat.id, "member", "mine now"),
            Err(CoreError::Forbidden(_))
        ));
        chats.edit_group_chat_name(&chat.id, "creator", "best friends").unwrap();
        chats.change_chat_cover(&chat.id, "creator", "cover.png").unwrap();

        let updated = chats.get_chat(&chat.id).unwrap();
        assert_eq!(updated.name.as_deref(), Some("best friends"));
        assert_eq!(updated.cover.as_deref(), Some("cover.png"));

        chats.delete_chat_cover(&chat.id, "creator").unwrap();
        assert_eq!(chats.get_chat(&chat.id).unwrap().cover, None);

        assert!(matches!(
            chats.edit_group_chat_name(&chat.id, "creator", "   "),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_group_chat_cascades() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        for id in ["creator", "p1", "p2"] {
            seed_user(&conn, id);
        }

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats.create_group_chat("friends", "creator").unwrap();
        chats.add_participant(&chat.id, "p1", "creator").unwrap();
        chats.add_participant(&chat.id, "p2", "creator").unwrap();
        MessageLedger::new(&conn, EmptyListPolicy::Error)
            .send_message(&chat.id, "p1", &NewMessage::text("hello"))
            .unwrap();

        assert!(matches!(
            chats.delete_group_chat_permanently(&chat.id, "p1"),
            Err(CoreError::Forbidden(_))
        ));
        chats.delete_group_chat_permanently(&chat.id, "creator").unwrap();

        assert!(matches!(chats.get_chat(&chat.id), Err(CoreError::ChatNotFound)));
        assert!(matches!(
            chats.get_chat_participants(&chat.id),
            Err(CoreError::NoParticipants)
        ));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM messages"), 0);
    }

    #[tokio::test]
    async fn test_get_all_chats_union() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        for id in ["a", "b", "c"] {
            seed_user(&conn, id);
        }

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        chats.create_one_to_one_chat("b", "a", &NewMessage::text("hi")).unwrap();
        chats.create_group_chat("a's group", "a").unwrap();
        let other = chats.create_group_chat("c's group", "c").unwrap();
        chats.add_participant(&other.id, "a", "c").unwrap();
        chats.create_group_chat("private", "c").unwrap();

        assert_eq!(chats.get_all_chats("a").unwrap().len(), 3);
        assert_eq!(chats.get_all_chats("b").unwrap().len(), 1);
        assert_eq!(chats.get_all_chats("c").unwrap().len(), 2);

        seed_user(&conn, "loner");
        assert!(matches!(chats.get_all_chats("loner"), Err(CoreError::NoChats)));
    }

    #[tokio::test]
    async fn test_group_operations_reject_one_to_one_chats() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        for id in ["a", "b", "c"] {
            seed_user(&conn, id);
        }

        let chats = ChatMembership::new(&conn, EmptyListPolicy::Error);
        let chat = chats.create_one_to_one_chat("a", "b", &NewMessage::text("hi")).unwrap();

        assert!(matches!(
            chats.add_participant(&chat.id, "c", "a"),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            chats.add_participant("missing", "c", "a"),
            Err(CoreError::ChatNotFound)
        ));
    }
}
