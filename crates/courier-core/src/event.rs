//! Domain event abstractions.

use uuid::Uuid;

/// Trait that all domain events recorded in the outbox implement.
///
/// Events are flat, versionless records: the identifying key of the entity
/// plus the fields subscribers care about.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (e.g. `users.created`).
    fn event_type(&self) -> &'static str;

    /// Identifier of the entity the event is about.
    fn entity_id(&self) -> Uuid;

    /// Serializes the event payload to JSON.
    fn to_payload(&self) -> serde_json::Value;
}
