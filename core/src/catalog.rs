//! Seams to the host platform.
//!
//! The migration engine does not own forms, fields or users; it asks the
//! platform through these traits. `formshift-pg` ships Postgres-backed
//! implementations; tests use static fakes.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Failure while consulting the host platform.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("form {0} not found")]
    FormNotFound(Uuid),
    #[error("sub-form {0} not found")]
    SubformNotFound(Uuid),
    #[error("actor {0} not found")]
    ActorNotFound(Uuid),
    #[error("lookup failed: {0}")]
    Backend(String),
}

/// Read access to the form-definition subsystem.
#[async_trait]
pub trait FieldCatalog: Send + Sync {
    /// Physical dynamic-table name for a form, or for one of its sub-forms
    /// when `subform_id` is set.
    async fn table_name(
        &self,
        form_id: Uuid,
        subform_id: Option<Uuid>,
    ) -> Result<String, LookupError>;

    /// Whether the field record still exists. Gates rollback of ADD_COLUMN:
    /// dropping the column out from under a live field is not allowed.
    async fn field_exists(&self, field_id: Uuid) -> Result<bool, LookupError>;
}

/// Role flags of an actor, as the authz subsystem reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorRoles {
    pub is_super_admin: bool,
    pub is_admin: bool,
    pub is_moderator: bool,
}

impl ActorRoles {
    /// Admin-or-above: preview, history, enqueue, listings.
    pub fn admin_or_above(&self) -> bool {
        self.is_super_admin || self.is_admin
    }
}

/// Role lookup, implemented by the authz subsystem.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    async fn roles(&self, actor_id: Uuid) -> Result<ActorRoles, LookupError>;
}
