use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::auth::Role;
use crate::repository::{RepositoryError, UserDirectory};
use crate::user::UserProfile;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    role: i16,
    position: Option<String>,
    employee_number: Option<String>,
    signature_image: Option<String>,
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, role, position, employee_number, signature_image FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<UserProfile, RepositoryError> {
            let role = Role::try_from(row.role)
                .map_err(|e| RepositoryError::InvalidRow(e.to_string()))?;
            Ok(UserProfile {
                id: row.id,
                name: row.name,
                role,
                position: row.position,
                employee_number: row.employee_number,
                signature_image: row.signature_image,
            })
        })
        .transpose()
    }
}
