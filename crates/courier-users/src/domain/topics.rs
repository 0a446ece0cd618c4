//! Topic names for user events.

use crate::domain::events::UserEvent;

/// Destination topic per user event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTopics {
    /// Topic for `UserCreated`.
    pub created: String,
    /// Topic for `UserUpdated`.
    pub updated: String,
    /// Topic for `UserDeleted`.
    pub deleted: String,
}

impl Default for UserTopics {
    fn default() -> Self {
        Self {
            created: "users.created".to_owned(),
            updated: "users.updated".to_owned(),
            deleted: "users.deleted".to_owned(),
        }
    }
}

impl UserTopics {
    /// The topic `event` is published to.
    #[must_use]
    pub fn for_event(&self, event: &UserEvent) -> &str {
        match event {
            UserEvent::Created(_) => &self.created,
            UserEvent::Updated(_) => &self.updated,
            UserEvent::Deleted(_) => &self.deleted,
        }
    }

    /// Every configured topic.
    #[must_use]
    pub fn all(&self) -> Vec<String> {
        vec![
            self.created.clone(),
            self.updated.clone(),
            self.deleted.clone(),
        ]
    }
}
