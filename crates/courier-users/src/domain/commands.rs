//! Commands for the user service.

use uuid::Uuid;

/// Command to create a user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user identifier.
    pub user_id: Uuid,
    /// The user's name.
    pub name: String,
}

/// Command to rename a user.
#[derive(Debug, Clone)]
pub struct UpdateUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user identifier.
    pub user_id: Uuid,
    /// The new name.
    pub name: String,
}

/// Command to delete a user.
#[derive(Debug, Clone)]
pub struct DeleteUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user identifier.
    pub user_id: Uuid,
}
