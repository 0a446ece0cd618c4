//! Persistence port for users.

use async_trait::async_trait;
use courier_core::error::DomainError;
use courier_core::outbox::NewOutboxMessage;
use uuid::Uuid;

use crate::domain::user::User;

/// Stores user mutations together with their outbox row.
///
/// Every method applies the mutation and records `outbox` in one atomic unit
/// of work: either both are committed or neither is.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user.
    async fn insert(&self, user: &User, outbox: &NewOutboxMessage) -> Result<(), DomainError>;

    /// Renames an existing user.
    ///
    /// Returns `DomainError::NotFound` when the user does not exist, in which
    /// case no outbox row is recorded.
    async fn update(&self, user: &User, outbox: &NewOutboxMessage) -> Result<(), DomainError>;

    /// Deletes an existing user.
    ///
    /// Returns `DomainError::NotFound` when the user does not exist, in which
    /// case no outbox row is recorded.
    async fn delete(&self, user_id: Uuid, outbox: &NewOutboxMessage) -> Result<(), DomainError>;
}
