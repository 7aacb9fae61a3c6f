use crate::domain::message::{FileDescriptor, NewAttachment};
use crate::domain::room::{GroupMessageView, RoomView};
use crate::error::{AppError, Result};
use crate::realtime::{Broadcaster, ServerEvent};
use crate::storage::room_repo::RoomRepository;
use std::collections::HashMap;
use std::sync::Arc;

/// Room and group-message operations of the conversation store.
#[derive(Clone, Debug)]
pub struct RoomService {
    repo: RoomRepository,
    broadcaster: Arc<dyn Broadcaster>,
    upload_public_base: String,
}

impl RoomService {
    #[must_use]
    pub fn new(
        repo: RoomRepository,
        broadcaster: Arc<dyn Broadcaster>,
        upload_public_base: String,
    ) -> Self {
        Self { repo, broadcaster, upload_public_base }
    }

    /// Creates a room with the deduplicated union of `member_ids` and the
    /// creator, atomically, and announces it to every member.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if the name is empty after trimming.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, name, member_ids),
        fields(creator_id = %creator_id, member_count = member_ids.len())
    )]
    pub async fn create_room(
        &self,
        name: &str,
        creator_id: i64,
        member_ids: &[i64],
    ) -> Result<RoomView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Room name must not be empty".to_string()));
        }

        let room_id = self.repo.create(name, creator_id, member_ids).await?;
        let view = self
            .repo
            .find_view(room_id)
            .await?
            .ok_or_else(|| AppError::Internal("Created room vanished before join".to_string()))?;

        let event = ServerEvent::RoomCreated(view.clone());
        for member in &view.members {
            self.broadcaster.emit_to_user(member.id, &event);
        }

        Ok(view)
    }

    /// Rooms the user is a member of, with member lists joined.
    pub async fn rooms_for_user(&self, user_id: i64) -> Result<Vec<RoomView>> {
        self.repo.rooms_for_user(user_id).await
    }

    /// Idempotent union insert; each genuinely new member gets an
    /// added-to-room event.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the room does not exist.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, user_ids),
        fields(room_id = %room_id, count = user_ids.len())
    )]
    pub async fn add_members(&self, room_id: i64, user_ids: &[i64]) -> Result<RoomView> {
        if !self.repo.exists(room_id).await? {
            return Err(AppError::NotFound);
        }

        let added = self.repo.add_members(room_id, user_ids).await?;
        let view = self
            .repo
            .find_view(room_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let event = ServerEvent::AddedToRoom(view.clone());
        for user_id in added {
            self.broadcaster.emit_to_user(user_id, &event);
        }

        Ok(view)
    }

    /// Idempotent removal; the user is told only when a row was actually
    /// deleted.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the room does not exist.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(room_id = %room_id, user_id = %user_id)
    )]
    pub async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<()> {
        if !self.repo.exists(room_id).await? {
            return Err(AppError::NotFound);
        }

        let removed = self.repo.remove_member(room_id, user_id).await?;
        if removed > 0 {
            self.broadcaster.emit_to_user(user_id, &ServerEvent::RemovedFromRoom { room_id });
        }

        Ok(())
    }

    /// Deletes a room; memberships and messages cascade. Former members
    /// are notified on their personal channels, from a member list
    /// captured before the rows disappear.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the room does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(room_id = %room_id))]
    pub async fn delete_room(&self, room_id: i64) -> Result<()> {
        let members = self.repo.member_ids(room_id).await?;
        let deleted = self.repo.delete(room_id).await?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }

        let event = ServerEvent::RoomDeleted { room_id };
        for user_id in members {
            self.broadcaster.emit_to_user(user_id, &event);
        }

        Ok(())
    }

    /// Fails unless the user is a current member. Room membership is the
    /// sole authorization boundary for posting and subscribing.
    pub async fn ensure_member(&self, room_id: i64, user_id: i64) -> Result<()> {
        if !self.repo.exists(room_id).await? {
            return Err(AppError::NotFound);
        }
        if !self.repo.is_member(room_id, user_id).await? {
            return Err(AppError::Authorization("Not a member of this room".to_string()));
        }
        Ok(())
    }

    /// Persists a group message and fans it out to the room channel.
    ///
    /// # Errors
    /// Returns `AppError::Authorization` if the sender is not a member and
    /// `AppError::Validation` if the content is empty after trimming.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, content, attachment),
        fields(room_id = %room_id, sender_id = %sender_id)
    )]
    pub async fn send_group_message(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
        attachment: Option<FileDescriptor>,
    ) -> Result<GroupMessageView> {
        self.ensure_member(room_id, sender_id).await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Message content must not be empty".to_string()));
        }

        let attachment = attachment.map(|file| NewAttachment::resolve(&self.upload_public_base, file));
        let message_id = self.repo.create_message(room_id, sender_id, content, attachment.as_ref()).await?;

        let view = self
            .repo
            .find_message_view(message_id)
            .await?
            .ok_or_else(|| AppError::Internal("Stored message vanished before join".to_string()))?;

        self.broadcaster.emit_to_room(room_id, &ServerEvent::NewGroupMessage(view.clone()));

        Ok(view)
    }

    /// Full room history, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the room does not exist.
    pub async fn get_room_messages(&self, room_id: i64) -> Result<Vec<GroupMessageView>> {
        if !self.repo.exists(room_id).await? {
            return Err(AppError::NotFound);
        }
        self.repo.room_messages(room_id).await
    }

    /// Flips the message-global read flag for everything in the room not
    /// authored by `user_id`. Last reader wins; see the group read-state
    /// note on `GroupMessageView`.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(room_id = %room_id, user_id = %user_id)
    )]
    pub async fn mark_group_messages_as_read(&self, room_id: i64, user_id: i64) -> Result<()> {
        self.ensure_member(room_id, user_id).await?;
        let changed = self.repo.mark_messages_read(room_id, user_id).await?;

        if changed > 0 {
            self.broadcaster.emit_to_room(room_id, &ServerEvent::GroupMessagesRead { room_id, user_id });
        }

        Ok(())
    }

    /// Unread group-message counts keyed by room id, for rooms the user is
    /// a member of.
    pub async fn get_unread_group_counts(&self, user_id: i64) -> Result<HashMap<i64, i64>> {
        let counts = self.repo.unread_counts(user_id).await?;
        Ok(counts.into_iter().collect())
    }
}
