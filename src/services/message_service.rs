use crate::domain::message::{DirectMessageView, FileDescriptor, NewAttachment};
use crate::error::{AppError, Result};
use crate::realtime::{Broadcaster, ServerEvent};
use crate::storage::message_repo::MessageRepository;
use std::collections::HashMap;
use std::sync::Arc;

/// Direct-message operations of the conversation store.
///
/// This service is the single write path for direct messages; both the
/// request layer and the gateway route through it, so fan-out and
/// validation live in exactly one place.
#[derive(Clone, Debug)]
pub struct MessageService {
    repo: MessageRepository,
    broadcaster: Arc<dyn Broadcaster>,
    upload_public_base: String,
}

impl MessageService {
    #[must_use]
    pub fn new(
        repo: MessageRepository,
        broadcaster: Arc<dyn Broadcaster>,
        upload_public_base: String,
    ) -> Self {
        Self { repo, broadcaster, upload_public_base }
    }

    /// Persists a direct message and fans it out to both participants'
    /// personal channels.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if the content is empty after
    /// trimming.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, content, attachment),
        fields(sender_id = %sender_id, receiver_id = %receiver_id)
    )]
    pub async fn send_direct_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
        attachment: Option<FileDescriptor>,
    ) -> Result<DirectMessageView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Message content must not be empty".to_string()));
        }

        let attachment = attachment.map(|file| NewAttachment::resolve(&self.upload_public_base, file));
        let message_id = self.repo.create(sender_id, receiver_id, content, attachment.as_ref()).await?;

        let view = self
            .repo
            .find_view(message_id)
            .await?
            .ok_or_else(|| AppError::Internal("Stored message vanished before join".to_string()))?;

        let event = ServerEvent::NewDirectMessage(view.clone());
        self.broadcaster.emit_to_user(receiver_id, &event);
        if sender_id != receiver_id {
            self.broadcaster.emit_to_user(sender_id, &event);
        }

        Ok(view)
    }

    /// Messages between two users in either direction, oldest first.
    pub async fn get_conversation(
        &self,
        user_a: i64,
        user_b: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DirectMessageView>> {
        self.repo.conversation(user_a, user_b, limit.clamp(1, 200), offset.max(0)).await
    }

    /// Marks everything from `sender_id` to `receiver_id` as read.
    /// Idempotent; emits a read event to both participants only when rows
    /// actually flipped.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(receiver_id = %receiver_id, sender_id = %sender_id)
    )]
    pub async fn mark_messages_as_read(&self, receiver_id: i64, sender_id: i64) -> Result<()> {
        let changed = self.repo.mark_read(receiver_id, sender_id).await?;

        if changed > 0 {
            tracing::debug!(count = changed, "Messages marked as read");
            let event = ServerEvent::MessagesRead {};
            self.broadcaster.emit_to_user(receiver_id, &event);
            self.broadcaster.emit_to_user(sender_id, &event);
        }

        Ok(())
    }

    /// Unread direct-message counts keyed by counterpart sender id.
    pub async fn get_unread_counts(&self, user_id: i64) -> Result<HashMap<i64, i64>> {
        let counts = self.repo.unread_counts(user_id).await?;
        Ok(counts.into_iter().collect())
    }

    /// Hard-deletes a message. Only its sender may do this.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist and
    /// `AppError::Authorization` if the requester is not the sender.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(message_id = %message_id, requester_id = %requester_id)
    )]
    pub async fn delete_message(&self, message_id: i64, requester_id: i64) -> Result<()> {
        let sender_id = self.repo.sender_of(message_id).await?.ok_or(AppError::NotFound)?;

        if sender_id != requester_id {
            return Err(AppError::Authorization(
                "Only the sender can delete a message".to_string(),
            ));
        }

        self.repo.delete(message_id).await?;
        Ok(())
    }

    /// Substring search over conversations the user participates in.
    pub async fn search_messages(&self, user_id: i64, term: &str) -> Result<Vec<DirectMessageView>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        self.repo.search(user_id, term).await
    }
}
