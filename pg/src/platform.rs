//! Postgres-backed implementations of the platform seams.
//!
//! The host platform keeps forms, sub-forms, fields and users in its own
//! tables; these adapters read just the columns the migration engine needs.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use formshift_core::{ActorRoles, FieldCatalog, LookupError, RoleProvider};

fn backend(e: sqlx::Error) -> LookupError {
    LookupError::Backend(e.to_string())
}

/// Reads dynamic-table names and field existence from the platform's
/// `forms` / `sub_forms` / `form_fields` tables.
#[derive(Clone)]
pub struct PgFieldCatalog {
    pool: PgPool,
}

impl PgFieldCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FieldCatalog for PgFieldCatalog {
    async fn table_name(
        &self,
        form_id: Uuid,
        subform_id: Option<Uuid>,
    ) -> Result<String, LookupError> {
        match subform_id {
            Some(subform_id) => {
                let row: Option<(String,)> =
                    sqlx::query_as("SELECT table_name FROM sub_forms WHERE id = $1 AND form_id = $2")
                        .bind(subform_id)
                        .bind(form_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(backend)?;
                row.map(|(name,)| name)
                    .ok_or(LookupError::SubformNotFound(subform_id))
            }
            None => {
                let row: Option<(String,)> =
                    sqlx::query_as("SELECT table_name FROM forms WHERE id = $1")
                        .bind(form_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(backend)?;
                row.map(|(name,)| name)
                    .ok_or(LookupError::FormNotFound(form_id))
            }
        }
    }

    async fn field_exists(&self, field_id: Uuid) -> Result<bool, LookupError> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM form_fields WHERE id = $1)")
                .bind(field_id)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.0)
    }
}

/// Reads role flags from the platform's `users` table.
#[derive(Clone)]
pub struct PgRoleProvider {
    pool: PgPool,
}

impl PgRoleProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleProvider for PgRoleProvider {
    async fn roles(&self, actor_id: Uuid) -> Result<ActorRoles, LookupError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id = $1")
            .bind(actor_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        let (role,) = row.ok_or(LookupError::ActorNotFound(actor_id))?;
        Ok(ActorRoles {
            is_super_admin: role == "super_admin",
            is_admin: role == "super_admin" || role == "admin",
            is_moderator: role == "moderator",
        })
    }
}
