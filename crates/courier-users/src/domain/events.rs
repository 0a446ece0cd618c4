//! Domain events for the user service.

use courier_core::event::DomainEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted when a user is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    /// The user identifier.
    pub user_id: Uuid,
    /// The user's name.
    pub name: String,
}

/// Emitted when a user is renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdated {
    /// The user identifier.
    pub user_id: Uuid,
    /// The new name.
    pub name: String,
}

/// Emitted when a user is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleted {
    /// The user identifier.
    pub user_id: Uuid,
}

/// Events of the user service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// A user has been created.
    Created(UserCreated),
    /// A user has been renamed.
    Updated(UserUpdated),
    /// A user has been deleted.
    Deleted(UserDeleted),
}

impl DomainEvent for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => "users.created",
            Self::Updated(_) => "users.updated",
            Self::Deleted(_) => "users.deleted",
        }
    }

    fn entity_id(&self) -> Uuid {
        match self {
            Self::Created(e) => e.user_id,
            Self::Updated(e) => e.user_id,
            Self::Deleted(e) => e.user_id,
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        match self {
            Self::Created(e) => serde_json::json!({ "user_id": e.user_id, "name": e.name }),
            Self::Updated(e) => serde_json::json!({ "user_id": e.user_id, "name": e.name }),
            Self::Deleted(e) => serde_json::json!({ "user_id": e.user_id }),
        }
    }
}
