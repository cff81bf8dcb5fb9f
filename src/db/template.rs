//! Template database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PgStore;
use crate::repository::{RepositoryError, TemplateRepository};
use crate::template::model::{CreateTemplateRequest, Template, TemplateField, TemplateSummary};

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: i64,
    name: String,
    path: String,
    margin_top: f64,
    margin_bottom: f64,
    margin_left: f64,
    margin_right: f64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TemplateRow {
    fn into_template(self, fields: Vec<TemplateField>) -> Template {
        Template {
            id: self.id,
            name: self.name,
            path: self.path,
            margin_top: self.margin_top,
            margin_bottom: self.margin_bottom,
            margin_left: self.margin_left,
            margin_right: self.margin_right,
            active: self.active,
            fields,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl TemplateRepository for PgStore {
    async fn insert_template(
        &self,
        request: &CreateTemplateRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Template, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: TemplateRow = sqlx::query_as(
            r#"
            INSERT INTO templates (name, path, margin_top, margin_bottom, margin_left, margin_right, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, path, margin_top, margin_bottom, margin_left, margin_right, active, created_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.path)
        .bind(request.margin_top)
        .bind(request.margin_bottom)
        .bind(request.margin_left)
        .bind(request.margin_right)
        .bind(request.active)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;

        let mut fields = Vec::with_capacity(request.fields.len());
        for (position, key) in request.fields.iter().enumerate() {
            let field_id: i64 = sqlx::query_scalar(
                "INSERT INTO template_fields (template_id, key, position) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(row.id)
            .bind(key)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await?;
            fields.push(TemplateField {
                id: field_id,
                template_id: row.id,
                key: key.clone(),
            });
        }

        tx.commit().await?;
        Ok(row.into_template(fields))
    }

    async fn find_template(&self, id: i64) -> Result<Option<Template>, RepositoryError> {
        let row: Option<TemplateRow> = sqlx::query_as(
            "SELECT id, name, path, margin_top, margin_bottom, margin_left, margin_right, active, created_at FROM templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fields: Vec<(i64, i64, String)> = sqlx::query_as(
            "SELECT id, template_id, key FROM template_fields WHERE template_id = $1 ORDER BY position, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let fields = fields
            .into_iter()
            .map(|(id, template_id, key)| TemplateField {
                id,
                template_id,
                key,
            })
            .collect();
        Ok(Some(row.into_template(fields)))
    }

    async fn list_templates(
        &self,
        active_only: bool,
    ) -> Result<Vec<TemplateSummary>, RepositoryError> {
        let rows: Vec<(i64, String, bool, i64)> = sqlx::query_as(
            r#"
            SELECT t.id, t.name, t.active, COUNT(f.id) AS field_count
            FROM templates t
            LEFT JOIN template_fields f ON f.template_id = t.id
            WHERE ($1 = FALSE OR t.active)
            GROUP BY t.id
            ORDER BY t.name
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, active, field_count)| TemplateSummary {
                id,
                name,
                active,
                field_count,
            })
            .collect())
    }
}
