use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A stored file descriptor handed over by the attachment collaborator.
///
/// Byte storage and size/MIME validation happen before this reaches the
/// conversation store; only the descriptor is persisted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub stored_name: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// Attachment row contents ready for insertion alongside a message, with
/// the public path already resolved.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub stored_name: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub public_path: String,
}

impl NewAttachment {
    /// Resolves a stored descriptor against the public serving base.
    #[must_use]
    pub fn resolve(public_base: &str, file: FileDescriptor) -> Self {
        let public_path = format!("{}/{}", public_base, file.stored_name);
        Self {
            stored_name: file.stored_name,
            original_name: file.original_name,
            content_type: file.content_type,
            size_bytes: file.size_bytes,
            public_path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: i64,
    pub stored_name: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub public_path: String,
}

/// A direct message joined with both participants' display identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageView {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub receiver_id: i64,
    pub receiver_name: String,
    pub content: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub attachment: Option<Attachment>,
}
