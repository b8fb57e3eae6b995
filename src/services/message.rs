/// Chat messages.
/// A message always belongs to an existing chat, and only members of that
/// chat may read it or act on it.
use rusqlite::{params, Connection, OptionalExtension};

use super::chat::ChatMembership;
use super::content::{ContentLedger, LikeTarget};
use super::{new_id, now, EmptyListPolicy};
use crate::db::models::{Message, NewMessage};
use crate::error::{CoreError, Result};

pub struct MessageLedger<'a> {
    conn: &'a Connection,
    policy: EmptyListPolicy,
}

impl<'a> MessageLedger<'a> {
    pub fn new(conn: &'a Connection, policy: EmptyListPolicy) -> Self {
        MessageLedger { conn, policy }
    }

    /// Send a message into a chat the sender belongs to
    pub fn send_message(&self, chat_id: &str, sender_id: &str, message: &NewMessage) -> Result<Message> {
        self.chats().accessible_chat(chat_id, sender_id)?;
        let sent = self.insert_message(chat_id, sender_id, message)?;
        log::debug!("{} sent message {} to chat {}", sender_id, sent.id, chat_id);
        Ok(sent)
    }

    /// Insert a message row without membership checks.
    /// The chat row must already exist.
    pub(crate) fn insert_message(&self, chat_id: &str, sender_id: &str, message: &NewMessage) -> Result<Message> {
        validate_message(message)?;

        let id = new_id();
        self.conn.execute(
            "INSERT INTO messages (id, chat_id, sender_id, type, text_content, media_url, shared_post_id, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                chat_id,
                sender_id,
                message.message_type,
                message.text_content,
                message.media_url,
                message.shared_post_id,
                now(),
            ],
        )?;

        self.get_message(&id)
    }

    pub fn get_message(&self, message_id: &str) -> Result<Message> {
        let sql = format!("SELECT {} FROM messages WHERE id = ?1", Message::COLUMNS);
        self.conn
            .query_row(&sql, params![message_id], Message::from_row)
            .optional()?
            .ok_or(CoreError::MessageNotFound)
    }

    /// Messages of a chat, oldest first
    pub fn get_messages(&self, chat_id: &str, user_id: &str) -> Result<Vec<Message>> {
        self.chats().accessible_chat(chat_id, user_id)?;

        let sql = format!(
            "SELECT {} FROM messages WHERE chat_id = ?1 ORDER BY sent_at ASC, rowid ASC",
            Message::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let messages = stmt
            .query_map(params![chat_id], Message::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.policy.apply(messages, CoreError::NoMessages)
    }

    /// Mark every message from other senders as read. Returns how many changed.
    pub fn mark_messages_read(&self, chat_id: &str, user_id: &str) -> Result<usize> {
        self.chats().accessible_chat(chat_id, user_id)?;
        let updated = self.conn.execute(
            "UPDATE messages SET read = 1 WHERE chat_id = ?1 AND sender_id != ?2 AND read = 0",
            params![chat_id, user_id],
        )?;
        Ok(updated)
    }

    /// Delete a message. Sender only.
    pub fn delete_message(&self, message_id: &str, user_id: &str) -> Result<()> {
        let message = self.get_message(message_id)?;
        if message.sender_id != user_id {
            return Err(CoreError::Forbidden("only the sender can delete a message"));
        }

        self.conn.execute(
            "DELETE FROM likes WHERE content_kind = ?1 AND content_id = ?2",
            params![LikeTarget::Message.kind(), message_id],
        )?;
        self.conn
            .execute("DELETE FROM messages WHERE id = ?1", params![message_id])?;
        Ok(())
    }

    pub fn like_message(&self, message_id: &str, user_id: &str) -> Result<()> {
        let message = self.get_message(message_id)?;
        self.chats().accessible_chat(&message.chat_id, user_id)?;
        ContentLedger::new(self.conn, self.policy).like(LikeTarget::Message, message_id, user_id)
    }

    pub fn unlike_message(&self, message_id: &str, user_id: &str) -> Result<()> {
        let message = self.get_message(message_id)?;
        self.chats().accessible_chat(&message.chat_id, user_id)?;
        ContentLedger::new(self.conn, self.policy).unlike(LikeTarget::Message, message_id, user_id)
    }

    pub(crate) fn delete_chat_messages(&self, chat_id: &str) -> Result<usize> {
        self.conn.execute(
            "DELETE FROM likes WHERE content_kind = ?1
               AND content_id IN (SELECT id FROM messages WHERE chat_id = ?2)",
            params![LikeTarget::Message.kind(), chat_id],
        )?;
        let deleted = self
            .conn
            .execute("DELETE FROM messages WHERE chat_id = ?1", params![chat_id])?;
        Ok(deleted)
    }

    pub(crate) fn delete_messages_by_sender(&self, sender_id: &str) -> Result<usize> {
        self.conn.execute(
            "DELETE FROM likes WHERE content_kind = ?1
               AND content_id IN (SELECT id FROM messages WHERE sender_id = ?2)",
            params![LikeTarget::Message.kind(), sender_id],
        )?;
        let deleted = self
            .conn
            .execute("DELETE FROM messages WHERE sender_id = ?1", params![sender_id])?;
        Ok(deleted)
    }

    fn chats(&self) -> ChatMembership<'a> {
        ChatMembership::new(self.conn, self.policy)
    }
}

fn validate_message(message: &NewMessage) -> Result<()> {
    if message.message_type.trim().is_empty() {
        return Err(CoreError::InvalidInput("message type is required".to_string()));
    }
    let has_body = [&message.text_content, &message.media_url, &message.shared_post_id]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()));
    if !has_body {
        return Err(CoreError::InvalidInput("message has no content".to_string()));
    }
    Ok(())
}
