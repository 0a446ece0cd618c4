//! Command handlers for the user service.
//!
//! Each handler validates its command, builds the domain event and the outbox
//! row carrying it, and hands both to the `UserStore` so they commit together.

use courier_core::clock::Clock;
use courier_core::error::DomainError;
use courier_core::outbox::NewOutboxMessage;
use tracing::info;

use crate::domain::commands::{CreateUser, DeleteUser, UpdateUser};
use crate::domain::events::{UserCreated, UserDeleted, UserEvent, UserUpdated};
use crate::domain::store::UserStore;
use crate::domain::topics::UserTopics;
use crate::domain::user::{MAX_NAME_LEN, User};

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation("user name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::Validation(format!(
            "user name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn outbox_message(event: &UserEvent, topics: &UserTopics, clock: &dyn Clock) -> NewOutboxMessage {
    NewOutboxMessage::from_event(topics.for_event(event), event, clock)
}

/// Handles the `CreateUser` command: inserts the user and records a
/// `UserCreated` event in the same unit of work.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an invalid name, or the store's
/// error if the unit of work fails.
pub async fn handle_create_user(
    command: &CreateUser,
    clock: &dyn Clock,
    topics: &UserTopics,
    store: &dyn UserStore,
) -> Result<NewOutboxMessage, DomainError> {
    validate_name(&command.name)?;

    let user = User {
        id: command.user_id,
        name: command.name.clone(),
        updated_at: clock.now(),
    };
    let event = UserEvent::Created(UserCreated {
        user_id: user.id,
        name: user.name.clone(),
    });
    let message = outbox_message(&event, topics, clock);

    store.insert(&user, &message).await?;

    info!(
        user_id = %user.id,
        outbox_id = %message.id,
        correlation_id = %command.correlation_id,
        "user created"
    );
    Ok(message)
}

/// Handles the `UpdateUser` command: renames the user and records a
/// `UserUpdated` event in the same unit of work.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an invalid name,
/// `DomainError::NotFound` if the user does not exist, or the store's error.
pub async fn handle_update_user(
    command: &UpdateUser,
    clock: &dyn Clock,
    topics: &UserTopics,
    store: &dyn UserStore,
) -> Result<NewOutboxMessage, DomainError> {
    validate_name(&command.name)?;

    let user = User {
        id: command.user_id,
        name: command.name.clone(),
        updated_at: clock.now(),
    };
    let event = UserEvent::Updated(UserUpdated {
        user_id: user.id,
        name: user.name.clone(),
    });
    let message = outbox_message(&event, topics, clock);

    store.update(&user, &message).await?;

    info!(
        user_id = %user.id,
        outbox_id = %message.id,
        correlation_id = %command.correlation_id,
        "user updated"
    );
    Ok(message)
}

/// Handles the `DeleteUser` command: deletes the user and records a
/// `UserDeleted` event in the same unit of work.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user does not exist, or the
/// store's error.
pub async fn handle_delete_user(
    command: &DeleteUser,
    clock: &dyn Clock,
    topics: &UserTopics,
    store: &dyn UserStore,
) -> Result<NewOutboxMessage, DomainError> {
    let event = UserEvent::Deleted(UserDeleted {
        user_id: command.user_id,
    });
    let message = outbox_message(&event, topics, clock);

    store.delete(command.user_id, &message).await?;

    info!(
        user_id = %command.user_id,
        outbox_id = %message.id,
        correlation_id = %command.correlation_id,
        "user deleted"
    );
    Ok(message)
}
