//! The user entity.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Maximum length of a user name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// A user as persisted by a [`crate::domain::store::UserStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Time of the latest change.
    pub updated_at: DateTime<Utc>,
}
