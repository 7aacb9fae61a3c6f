use serde::{Deserialize, Serialize};

/// Display identity of a platform user, as joined into message and room
/// payloads. The user directory itself is owned by the enclosing platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: i64,
    pub display_name: String,
}
